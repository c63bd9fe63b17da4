//! Error types for the resource system.
//!
//! Only expected runtime failures are reported through [`ResourceError`].
//! Misuse of the API (unknown ids, double registration, illegal state
//! transitions) panics instead.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while creating or loading a resource.
#[derive(Debug)]
pub enum ResourceError {
    /// The requested location does not exist.
    NotFound {
        /// Location of the resource.
        location: String,
    },

    /// Reading resource data failed.
    Io {
        /// The path that failed to load, empty if unknown.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// No attached loader accepted the resource.
    NoLoader {
        /// Location of the resource.
        location: String,
        /// Name of the resource kind.
        kind: &'static str,
    },

    /// A loader accepted the resource but failed to populate it.
    Loader {
        /// Location of the resource.
        location: String,
        /// Description of the error.
        message: String,
    },

    /// Every slot of the pool is in use.
    PoolExhausted {
        /// Type of the exhausted pool.
        resource_type: u16,
        /// Pool capacity.
        capacity: usize,
    },

    /// The request was dropped before it completed.
    Cancelled {
        /// Location of the resource.
        location: String,
    },

    /// Resource data could not be decoded.
    InvalidData {
        /// Description of the problem.
        message: String,
    },
}

impl ResourceError {
    /// Shorthand for a [`ResourceError::Loader`] error.
    pub fn loader(location: impl Into<String>, message: impl Into<String>) -> Self {
        ResourceError::Loader {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ResourceError::InvalidData`] error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ResourceError::InvalidData {
            message: message.into(),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { location } => {
                write!(f, "Resource not found: {}", location)
            }
            ResourceError::Io { path, source } => {
                if path.as_os_str().is_empty() {
                    write!(f, "IO error: {}", source)
                } else {
                    write!(f, "IO error loading '{}': {}", path.display(), source)
                }
            }
            ResourceError::NoLoader { location, kind } => {
                write!(f, "No {} loader accepted '{}'", kind, location)
            }
            ResourceError::Loader { location, message } => {
                write!(f, "Failed to load '{}': {}", location, message)
            }
            ResourceError::PoolExhausted {
                resource_type,
                capacity,
            } => {
                write!(
                    f,
                    "Resource pool of type {} exhausted ({} slots)",
                    resource_type, capacity
                )
            }
            ResourceError::Cancelled { location } => {
                write!(f, "Load of '{}' was cancelled", location)
            }
            ResourceError::InvalidData { message } => {
                write!(f, "Invalid resource data: {}", message)
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
