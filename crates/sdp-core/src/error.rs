use thiserror::Error;

/// Result type for SDP operations
pub type SdpResult<T> = std::result::Result<T, SdpError>;

/// Errors raised while reading a session description
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// A line could not be parsed
    #[error("SDP parse error in '{line}': {message}")]
    Parse {
        line: String,
        message: String,
    },

    /// The description does not start with a version line
    #[error("SDP must start with a v= line")]
    MissingVersion,

    /// An m= line is malformed
    #[error("Invalid media line '{line}': {message}")]
    InvalidMediaLine {
        line: String,
        message: String,
    },

    /// A known attribute carries a malformed value
    #[error("Invalid a={name} attribute '{value}': {message}")]
    InvalidAttribute {
        name: String,
        value: String,
        message: String,
    },
}

impl SdpError {
    pub fn parse(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line: line.into(),
            message: message.into(),
        }
    }

    pub fn media_line(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMediaLine {
            line: line.into(),
            message: message.into(),
        }
    }

    pub fn attribute(
        name: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}
