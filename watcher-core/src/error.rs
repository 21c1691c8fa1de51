use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("browser process error: {0}")]
    Browser(#[from] std::io::Error),
    #[error("browser exited with {status}: {stderr}")]
    BrowserExit { status: String, stderr: String },
    #[error("fetch timed out after {0} seconds")]
    Timeout(u64),
    #[error("no content found in the response")]
    EmptyContent,
    #[error("access denied or forbidden error detected")]
    AccessDenied,
    #[error("No <pre> tag found — RSS feed not formatted as expected")]
    MissingMarker,
    #[error("malformed feed XML: {0}")]
    MalformedXml(#[from] ParseError),
    #[error("notification rejected with HTTP {status}: {body}")]
    NotifyStatus { status: u16, body: String },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, WatchError>;

/// Diagnostic for XML that could not be parsed, with the position when the
/// parser reported one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub source_line: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            source_line: None,
        }
    }

    /// Attaches the 1-based line/column of byte offset `pos` in `text`.
    pub fn at(mut self, text: &str, pos: usize) -> Self {
        let mut pos = pos.min(text.len());
        while !text.is_char_boundary(pos) {
            pos -= 1;
        }
        let before = &text[..pos];
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_no = before.matches('\n').count() + 1;
        self.line = Some(line_no);
        self.column = Some(before[line_start..].chars().count() + 1);
        self.source_line = text.lines().nth(line_no - 1).map(ToOwned::to_owned);
        self
    }

    /// Marker line pointing at the column, aligned with a `{:4}: ` line prefix.
    pub fn caret(&self) -> Option<String> {
        self.column
            .map(|col| format!("      {}^", " ".repeat(col.saturating_sub(1))))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "{} (line {}, column {})", self.message, line, column)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
