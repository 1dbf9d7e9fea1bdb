pub mod error;
pub mod record;
pub mod value;

pub use error::{ErrorClass, ModelError, Result};
pub use record::{Fields, PK, Record};
pub use value::{Value, now, timestamp_from_secs};
