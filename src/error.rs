use std::fmt;

/// Errors raised by the simulation host. The MAC strategies themselves never
/// fail: lost frames are retried or absorbed inside their loops.
#[derive(Debug)]
pub enum SimError {
    /// A configuration value is out of range.
    InvalidConfig(String),
    /// Reading a config file or writing a report failed.
    Io(std::io::Error),
    /// A config file or report could not be (de)serialized.
    Json(serde_json::Error),
    /// A simulation thread panicked or could not be spawned.
    Thread(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Json(err) => write!(f, "json error: {}", err),
            Self::Thread(msg) => write!(f, "thread error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
