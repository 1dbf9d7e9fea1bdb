use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Field '{field}' already defined on {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("Unrecognized constructor args for {entity}: {}", names.join(", "))]
    UnrecognizedArguments { entity: String, names: Vec<String> },

    #[error("Missing identity value(s) for {entity}: {}", fields.join(", "))]
    MissingIdentity { entity: String, fields: Vec<String> },

    #[error("Immutable field {field}: already set to {current} (can't set to {attempted})")]
    ImmutableField {
        field: String,
        current: String,
        attempted: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid pk format for {entity}: {pk}")]
    InvalidKey { entity: String, pk: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conditional check failed for '{0}'")]
    ConditionFailed(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How a failure surfaces once it leaves the model layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    /// The request itself was wrong: bad arguments, failed validation.
    Rejected,
    Internal,
}

impl ErrorClass {
    pub fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Rejected => 400,
            Self::Internal => 500,
        }
    }
}

impl ModelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::UnrecognizedArguments { .. }
            | Self::MissingIdentity { .. }
            | Self::ImmutableField { .. }
            | Self::Validation(_)
            | Self::TypeMismatch(_)
            | Self::InvalidKey { .. } => ErrorClass::Rejected,
            Self::DuplicateField { .. }
            | Self::ConditionFailed(_)
            | Self::Corrupt(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Lock(_)
            | Self::Config(_) => ErrorClass::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
