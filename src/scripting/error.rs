use thiserror::Error as ThisError;

/// Failures surfaced by the script engine and the function registry. The `Display` output is the
/// reply sent to the client, code prefix included.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum ScriptError {
    #[error("NOSCRIPT No matching script. Please use EVAL")]
    NoScript,
    #[error("ERR library '{0}' already exists")]
    LibraryExists(String),
    #[error("ERR library '{0}' not found")]
    LibraryNotFound(String),
    #[error("ERR function '{function}' not found in library '{library}'")]
    FunctionNotFound { library: String, function: String },
    #[error("ERR {0}")]
    InvalidLibrary(String),
    #[error("{0}")]
    Execution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any side effect.
    Argument,
    /// Unknown digest, library or function. Callers may retry with the source.
    Lookup,
    /// The script failed to compile or raised while running.
    Execution,
}

impl ScriptError {
    /// Builds an execution error, prefixing `ERR` unless the message already carries an error
    /// code such as `WRONGTYPE`.
    pub fn execution(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if has_error_code(&msg) {
            ScriptError::Execution(msg)
        } else {
            ScriptError::Execution(format!("ERR {}", msg))
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::InvalidLibrary(_) => ErrorKind::Argument,
            ScriptError::NoScript
            | ScriptError::LibraryNotFound(_)
            | ScriptError::FunctionNotFound { .. } => ErrorKind::Lookup,
            ScriptError::LibraryExists(_) | ScriptError::Execution(_) => ErrorKind::Execution,
        }
    }
}

/// Whether `msg` starts with an upper case code word (`ERR`, `WRONGTYPE`, `NOSCRIPT`, ...).
pub(crate) fn has_error_code(msg: &str) -> bool {
    let code = msg.split(' ').next().unwrap_or_default();
    code.len() >= 2 && code.bytes().all(|b| b.is_ascii_uppercase())
}
