use thiserror::Error;

/// Keepalive module errors
#[derive(Error, Debug)]
pub enum KeepaliveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("setsockopt({option}, {value}) failed: {source}")]
    SocketOption {
        option: &'static str,
        value: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown directive \"{0}\"")]
    UnknownDirective(String),

    #[error("\"{0}\" directive is duplicate")]
    DuplicateDirective(&'static str),

    #[error("Invalid value \"{value}\" in \"{directive}\" directive")]
    InvalidValue {
        directive: &'static str,
        value: String,
    },

    #[error("Configuration error at line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Watcher error: {0}")]
    Watch(String),
}

impl KeepaliveError {
    /// Name of the socket option that failed, if this is an apply-time error
    pub fn option(&self) -> Option<&'static str> {
        match self {
            KeepaliveError::SocketOption { option, .. } => Some(option),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, KeepaliveError>;
