use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Blank or malformed input, raised before any I/O happens.
    #[error("{0}")]
    Validation(String),

    /// The API client or the transfer tool could not be built.
    #[error("{context}: {source}")]
    Construction {
        context: String,
        #[source]
        source: BoxError,
    },

    /// A request or a transfer tool invocation failed.
    #[error("{step} failed: {source}")]
    Transport {
        step: String,
        #[source]
        source: BoxError,
    },

    #[error("{operation} timeout after {}", format_duration(.after))]
    Timeout { operation: String, after: Duration },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn construction(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Construction {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn transport(step: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Transport {
            step: step.into(),
            source: source.into(),
        }
    }

    /// Fails with `Validation(message)` when `value` is blank.
    pub(crate) fn require(value: &str, message: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::validation(message));
        }
        Ok(())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Whole seconds read as "300 seconds", anything finer as "1.5s".
pub(crate) fn format_duration(duration: &Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{:?}", duration)
    }
}

/// Non-2xx response of the registry API. Displayed without method and URL,
/// which the wrapping [`Error::Transport`] step already names.
#[derive(Debug, Error)]
#[error("status {status}: {body}")]
pub struct HttpStatusError {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Transfer tool exited unsuccessfully
#[derive(Debug, Error)]
#[error("exited with {status}: {stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: ExitStatus,
    pub stderr: String,
}
