use thiserror::Error;

/// Anchor alarm error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlarmError {
    /// Missing or malformed argument; engine state unchanged
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted in the current state; engine state unchanged
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal consistency check failed; the engine has reset itself to DISABLED
    #[error("Anchor alarm DISABLED. {0}")]
    FatalInvariant(String),

    #[error("Collaborator {name} failed: {reason}")]
    CollaboratorFault { name: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type AlarmResult<T> = Result<T, AlarmError>;

/// Settings store errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<SettingsError> for AlarmError {
    fn from(e: SettingsError) -> Self {
        AlarmError::Settings(e.to_string())
    }
}
