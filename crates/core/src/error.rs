use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Faults raised while lexing, parsing or evaluating a descriptor body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("evaluation error at line {line}: {message}")]
    Eval { line: usize, message: String },
}

impl ScriptError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn eval(line: usize, message: impl Into<String>) -> Self {
        Self::Eval {
            line,
            message: message.into(),
        }
    }
}

/// Failure to produce a descriptor for a single buildpath.
///
/// Cloneable so the cache can hand the same failure back on every lookup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DescriptorError {
    #[error("cannot read descriptor for '{buildpath}' ({}): {source}", path.display())]
    Read {
        buildpath: String,
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("descriptor for '{buildpath}' failed: {source}")]
    Parse {
        buildpath: String,
        #[source]
        source: ScriptError,
    },
}

impl DescriptorError {
    pub fn buildpath(&self) -> &str {
        match self {
            DescriptorError::Read { buildpath, .. } | DescriptorError::Parse { buildpath, .. } => {
                buildpath
            }
        }
    }
}

/// Errors that can occur during buildgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("unresolved dependency reference '{reference}' declared in '{declared_in}'")]
    UnresolvedDependencyReference {
        reference: String,
        declared_in: String,
    },

    #[error("no repository root found above {} (looked for {})", start.display(), markers.join(", "))]
    NoRepositoryRootFound { start: PathBuf, markers: Vec<String> },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Filesystem walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type alias for buildgraph operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_error_keeps_buildpath() {
        let err = DescriptorError::Parse {
            buildpath: "finagle/finagle-mux".to_string(),
            source: ScriptError::syntax(3, 7, "unexpected ')'"),
        };
        assert_eq!(err.buildpath(), "finagle/finagle-mux");
        assert!(err.to_string().contains("line 3, column 7"));
    }

    #[test]
    fn test_read_error_is_cloneable() {
        let err = DescriptorError::Read {
            buildpath: "missing".to_string(),
            path: PathBuf::from("/repo/missing/BUILD"),
            source: Arc::new(io::Error::new(io::ErrorKind::NotFound, "gone")),
        };
        let copy = err.clone();
        assert_eq!(copy.buildpath(), "missing");
        assert!(copy.to_string().contains("/repo/missing/BUILD"));
    }
}
