use std::io::Error;

use polars::error::PolarsError;
use thiserror::Error;

use crate::account::IntakePage;

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_TRIGGER_OFFSET: u16 = 10;
pub const DEFAULT_EVENT_POLL_TIME: u64 = 100;
pub const DEFAULT_MAX_COLUMN_WIDTH: usize = 32;

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        next account
  k / Up          previous account
  h / Left        previous column
  l / Right       next column
  PageUp/PageDown move one page
  g / Home        first account
  G / End         last loaded account

Table
  s               toggle sort on the selected column
                  (unsorted -> ascending -> descending)
  Enter           show account details
  L               cycle preferred location filter
  a               cycle auth status filter
  r               reload from the first page

Details
  j / k           scroll
  h / l           previous / next account
  g / Home        back to the top

General
  ?               this help
  Esc             close popup
  q               quit";

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("I/O error: {0}")]
    IoError(#[from] Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type, expected csv, parquet or arrow")]
    UnknownFileType,
    #[error("data file has no column \"{0}\"")]
    MissingColumn(String),
    #[error("malformed record in row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveLeft,
    MoveRight,
    ToggleSort,
    Enter,
    Exit,
    Help,
    CycleLocation,
    CycleAuthStatus,
    Reload,
    Resize(usize, usize),
    LoadMore,
    PageLoaded {
        generation: u64,
        result: Result<IntakePage, IntakeError>,
    },
}

#[derive(Debug, Clone)]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub trigger_offset: u16,
    pub latency_ms: u64,
    pub max_column_width: usize,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: DEFAULT_EVENT_POLL_TIME,
            page_size: DEFAULT_PAGE_SIZE,
            trigger_offset: DEFAULT_TRIGGER_OFFSET,
            latency_ms: 0,
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
        }
    }
}
