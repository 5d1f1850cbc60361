//! Error types returned by the control connection and the response parsers.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Boxed cause attached to a [`ParseError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors from a control-interface connection.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Socket I/O failed, or the connection is closed.
    #[error("control socket error: {0}")]
    Transport(#[from] std::io::Error),

    /// The daemon did not reply in time.
    #[error("timed out after {after:?} waiting for reply to {command}")]
    Timeout { command: String, after: Duration },

    /// The reply did not match the expected grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The daemon answered `FAIL`.
    #[error("daemon rejected {command}")]
    Failure { command: String },
}

impl ControlError {
    pub(crate) fn closed() -> Self {
        Self::Transport(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "control connection closed",
        ))
    }

    /// Whether this error is a reply timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A daemon response that could not be parsed.
///
/// `line` holds the offending text; it is empty when there was no data to
/// parse at all (for example a tabular response without a header row).
#[derive(Debug)]
pub struct ParseError {
    line: String,
    source: Option<BoxError>,
}

impl ParseError {
    /// A parse failure for `line` with no further cause.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            source: None,
        }
    }

    /// A parse failure with nothing to point at.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    /// A parse failure for `line` caused by `source`.
    pub fn with_source(line: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            line: line.into(),
            source: Some(source.into()),
        }
    }

    /// The line that failed to parse (possibly empty).
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to parse wpa_supplicant response")?;
        if !self.line.is_empty() {
            write!(f, ": {:?}", self.line)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}
