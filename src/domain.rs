use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::io::Error;
use std::path::PathBuf;
use tracing_error::SpanTrace;

#[derive(Debug)]
pub enum TSError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String, SpanTrace),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    UnknownFileType(PathBuf),
    UnknownColumn(String),
}

impl From<Error> for TSError {
    fn from(err: Error) -> Self {
        TSError::IoError(err)
    }
}

impl From<PolarsError> for TSError {
    fn from(err: PolarsError) -> Self {
        TSError::PolarsError(err)
    }
}

impl std::fmt::Display for TSError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TSError::IoError(e) => write!(f, "io error: {e}"),
            TSError::PolarsError(e) => write!(f, "could not read data: {e}"),
            TSError::LoadingFailed(msg, span_trace) => {
                write!(f, "loading failed: {msg}\n{span_trace}")
            }
            TSError::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            TSError::PermissionDenied(p) => write!(f, "permission denied: {}", p.display()),
            TSError::UnknownFileType(p) => write!(f, "unknown file type: {}", p.display()),
            TSError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
        }
    }
}

impl std::error::Error for TSError {}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TSConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Columns named `<label><suffix>` hold sort values for column `<label>`.
    #[setters(into)]
    pub timestamp_suffix: String,
    /// Headers that get no indicator and therefore ignore sort requests.
    pub inert_columns: Vec<String>,
}

impl Default for TSConfig {
    fn default() -> Self {
        TSConfig {
            event_poll_time: 100,
            max_column_width: 40,
            timestamp_suffix: "@timestamp".to_string(),
            inert_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    SearchTable,
    FilterByColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    SortColumn,
    Search,
    SearchNext,
    SearchPrev,
    Filter,
    CopyCell,
    CopyRow,
    CopyTable,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
 s                     sort selected column (again to reverse)
 ↑ ↓ ← → / h j k l     move selection
 PgUp PgDn g G         page up / down, first / last row
 Enter                 show selected row
 /  n  N               search, next match, previous match
 f                     filter rows by selected column
 Esc                   close popup, leave filtered view
 y  Y  T               copy cell, row, whole table
 ?                     this help
 q                     quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters_chain() {
        let cfg = TSConfig::default()
            .with_max_column_width(12)
            .with_timestamp_suffix(":ts")
            .with_inert_columns(vec!["Notes".to_string()]);
        assert_eq!(cfg.max_column_width, 12);
        assert_eq!(cfg.timestamp_suffix, ":ts");
        assert_eq!(cfg.inert_columns, vec!["Notes".to_string()]);
        assert_eq!(cfg.event_poll_time, 100);
    }

    #[test]
    fn errors_render_readable() {
        let err = TSError::UnknownColumn("Amount".into());
        assert_eq!(err.to_string(), "unknown column: Amount");
    }
}
