use tracing::debug;

use super::KvStore;
use crate::core::{ModelError, Record, Result, Value};

/// String successor: bump the rightmost alphanumeric with carry, so
/// zero-padded numbers keep their lexical order (`"c0009"` -> `"c0010"`).
pub fn successor(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    let Some(last) = chars.len().checked_sub(1) else {
        return String::new();
    };

    let Some(mut i) = chars.iter().rposition(char::is_ascii_alphanumeric) else {
        chars[last] = char::from_u32(chars[last] as u32 + 1).unwrap_or(chars[last]);
        return chars.into_iter().collect();
    };

    loop {
        let (next, carry) = match chars[i] {
            '9' => ('0', Some('1')),
            'z' => ('a', Some('a')),
            'Z' => ('A', Some('A')),
            c => (((c as u8) + 1) as char, None),
        };
        chars[i] = next;
        let Some(carry) = carry else {
            break;
        };
        match chars[..i].iter().rposition(char::is_ascii_alphanumeric) {
            Some(j) => i = j,
            None => {
                chars.insert(i, carry);
                break;
            }
        }
    }

    chars.into_iter().collect()
}

fn counter_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        other => Err(ModelError::Corrupt(format!(
            "Counter '{}' holds {} instead of a number",
            key,
            other.type_name()
        ))),
    }
}

fn counter_integer(key: &str, text: &str) -> Result<i64> {
    text.trim().parse().map_err(|_| {
        ModelError::Corrupt(format!("Counter '{}' holds non-numeric '{}'", key, text))
    })
}

/// Hand out the counter's current value and advance it by string successor.
///
/// Every attempt is a read followed by a conditional write; a lost race
/// retries from the read with no cap and no backoff.
pub async fn atomic_increment(
    store: &dyn KvStore,
    key: &str,
    field: &str,
    initial: i64,
) -> Result<i64> {
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        let record = store.get(key).await?;
        let current = record.as_ref().and_then(|r| r.get(field));

        let attempt = match (&record, current) {
            (_, Some(current)) => {
                let text = counter_text(key, current)?;
                let handed_out = counter_integer(key, &text)?;
                store
                    .update_if_equals(key, field, Some(current), Value::Text(successor(&text)))
                    .await
                    .map(|()| handed_out)
            }
            // Record exists without the counter attribute: claim the attribute.
            (Some(_), None) => store
                .update_if_equals(key, field, None, Value::Text(successor(&initial.to_string())))
                .await
                .map(|()| initial),
            (None, None) => store
                .put_if_absent(Record::new(key).with(field, successor(&initial.to_string())))
                .await
                .map(|()| initial),
        };

        match attempt {
            Ok(value) => {
                if attempts > 1 {
                    debug!("counter '{}' settled after {} attempts", key, attempts);
                }
                return Ok(value);
            }
            Err(err) if err.is_condition_failed() => {
                debug!("counter '{}' contended, retrying", key);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_successor_digits() {
        assert_eq!(successor("1"), "2");
        assert_eq!(successor("9"), "10");
        assert_eq!(successor("99"), "100");
        assert_eq!(successor("0009"), "0010");
        assert_eq!(successor("c0001"), "c0002");
        assert_eq!(successor("c0999"), "c1000");
    }

    #[test]
    fn test_successor_letters_and_edges() {
        assert_eq!(successor("az"), "ba");
        assert_eq!(successor("zz"), "aaa");
        assert_eq!(successor("a9"), "b0");
        assert_eq!(successor("Zz"), "AAa");
        assert_eq!(successor("1.9"), "2.0");
        assert_eq!(successor("-9"), "-10");
        assert_eq!(successor("**"), "*+");
        assert_eq!(successor(""), "");
    }

    #[tokio::test]
    async fn test_fresh_counter_hands_out_initial() {
        let store = InMemoryStore::new();
        assert_eq!(atomic_increment(&store, "$next", "n", 1).await.unwrap(), 1);
        assert_eq!(atomic_increment(&store, "$next", "n", 1).await.unwrap(), 2);
        assert_eq!(atomic_increment(&store, "$next", "n", 1).await.unwrap(), 3);

        let record = store.get("$next").await.unwrap().unwrap();
        assert_eq!(record.get("n"), Some(&Value::from("4")));
    }

    #[tokio::test]
    async fn test_existing_record_without_counter_field() {
        let store = InMemoryStore::with_records([Record::new("$next").with("other", "x")]).unwrap();
        assert_eq!(atomic_increment(&store, "$next", "n", 10).await.unwrap(), 10);
        assert_eq!(atomic_increment(&store, "$next", "n", 10).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_non_numeric_counter_is_corrupt() {
        let store = InMemoryStore::with_records([Record::new("$next").with("n", "abc")]).unwrap();
        assert!(matches!(
            atomic_increment(&store, "$next", "n", 1).await,
            Err(ModelError::Corrupt(_))
        ));
    }
}
