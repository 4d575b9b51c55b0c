//! Error Module
//!
//! Typed failures of the integron assembly core. Readers and the binary wrap
//! these in `anyhow` with file context; callers that need to tell one failure
//! from another can downcast.

use thiserror::Error;

/// Failures raised by grouping, projection and functional annotation.
#[derive(Debug, Error)]
pub enum IntegronError {
    /// Rejected before any replicon is processed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// External tool ran but exited with a non-zero code (-1 when killed by a signal).
    #[error("{tool} failed return code = {code}")]
    ToolFailed { tool: String, code: i32 },

    /// External tool could not be started at all.
    #[error("{tool} failed : {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No protein sequence extracted for {integron} of replicon {replicon}, cannot perform functional annotation")]
    EmptyProteinSubset { replicon: String, integron: String },

    #[error("No sequence found for protein '{0}' in the protein file")]
    MissingSequence(String),

    #[error("Protein identifier '{id}' is ambiguous: {count} sequences share it")]
    AmbiguousSequence { id: String, count: usize },

    /// Malformed line in a tool output table.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IntegronError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failed_message() {
        let err = IntegronError::ToolFailed { tool: "hmmsearch".into(), code: 1 };
        assert!(err.to_string().ends_with("failed return code = 1"));
    }

    #[test]
    fn test_spawn_message_names_tool() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let err = IntegronError::ToolSpawn { tool: "foo".into(), source: io };
        assert!(err.to_string().starts_with("foo failed : "));
    }
}
