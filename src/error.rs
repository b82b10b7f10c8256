use thiserror::Error;

/// Errors that abort a visualize request. Each one renders as the single
/// message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Malformed flow document: {message}")]
    MalformedDocument {
        message: String,
        position: Option<u64>,
    },

    #[error("Invalid Flow XML: no <{expected}> element found (root is <{found}>)")]
    Structure { expected: String, found: String },

    #[error("Connector '{edge_id}' from '{source_id}' points at undeclared element '{target_id}'")]
    DanglingReference {
        edge_id: String,
        source_id: String,
        target_id: String,
    },

    #[error("Please open a {expected_suffix} file to visualize (got '{file_name}')")]
    UnsupportedFile {
        file_name: String,
        expected_suffix: &'static str,
    },

    #[error("Unrecognized message from render surface: {0}")]
    InvalidMessage(String),
}

impl FlowError {
    pub(crate) fn malformed(message: impl Into<String>, position: Option<u64>) -> Self {
        FlowError::MalformedDocument {
            message: message.into(),
            position,
        }
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
