use libc::c_int;
use thiserror::Error;

/// Failures of the embedded index.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures reported by a metadata extraction collaborator.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: std::process::ExitStatus },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a virtual path could not be answered.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The first segment names no known attribute.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The trailing file name matches no indexed file.
    #[error("no such entry: {0}")]
    NotFound(String),

    /// A listing was requested on a leaf.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// The errno handed back across the filesystem boundary.
    pub fn errno(&self) -> c_int {
        match self {
            ResolveError::InvalidPath(_) | ResolveError::NotFound(_) => libc::ENOENT,
            ResolveError::NotADirectory(_) => libc::ENOTDIR,
            ResolveError::Store(_) => libc::EIO,
        }
    }
}

impl From<rusqlite::Error> for ResolveError {
    fn from(err: rusqlite::Error) -> Self {
        ResolveError::Store(StoreError::Sqlite(err))
    }
}
