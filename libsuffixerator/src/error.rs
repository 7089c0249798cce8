use std::{error::Error, fmt, io};

// --------------------------------------------------
/// Tagged failures surfaced by index construction.
///
/// Library functions return `anyhow::Result`; callers that need to react
/// to the kind of failure recover it with `err.downcast_ref::<SfxError>()`.
#[derive(Debug)]
pub enum SfxError {
    /// Invalid or contradictory options, caught before any I/O
    Configuration(String),

    /// Read/write/open failure on the named file
    Io { path: String, source: io::Error },

    /// A counting or ordering check failed; indicates a logic defect
    InternalConsistency(String),

    /// The memory ceiling cannot hold even one suffix
    ResourceLimit(String),
}

impl SfxError {
    pub fn io(path: impl fmt::Display, source: io::Error) -> Self {
        SfxError::Io {
            path: path.to_string(),
            source,
        }
    }
}

impl fmt::Display for SfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SfxError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            SfxError::Io { path, source } => write!(f, "{path}: {source}"),
            SfxError::InternalConsistency(msg) => {
                write!(f, "internal consistency error: {msg}")
            }
            SfxError::ResourceLimit(msg) => write!(f, "resource limit: {msg}"),
        }
    }
}

impl Error for SfxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SfxError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// --------------------------------------------------
/// Tag the error of an I/O operation with the file it touched
pub trait IoContext<T> {
    fn with_path(self, path: impl fmt::Display) -> Result<T, SfxError>;
}

impl<T> IoContext<T> for Result<T, io::Error> {
    fn with_path(self, path: impl fmt::Display) -> Result<T, SfxError> {
        self.map_err(|e| SfxError::io(path, e))
    }
}
