use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

// Crate wide error type. Loader problems get their own variants so the
// cli can tell the user what went wrong before the terminal is taken over.
#[derive(Debug)]
pub enum RVError {
    IoError(Error),
    ParseError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for RVError {
    fn from(err: Error) -> Self {
        RVError::IoError(err)
    }
}

impl From<serde_json::Error> for RVError {
    fn from(err: serde_json::Error) -> Self {
        RVError::ParseError(err)
    }
}

// Messages the controller derives from terminal events. The model decides
// what they mean for the currently active view.
#[derive(Debug, Clone, Copy)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveTop,
    MoveBottom,
    SortColumn,
    SwitchView,
    Filter,
    Enter,
    Exit,
    Copy,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RVConfig {
    /// Terminal event poll timeout in ms. Doubles as the tick cadence for
    /// deadline based state like the copy flash.
    pub event_poll_time: u64,
    /// Hard cap on rendered column width.
    pub max_column_width: usize,
    /// How long the copied-marker stays on a section, in ms.
    pub copy_flash_time: u64,
}

impl Default for RVConfig {
    fn default() -> Self {
        RVConfig {
            event_poll_time: 100,
            max_column_width: 80,
            copy_flash_time: 2000,
        }
    }
}

pub const HELP_TEXT: &str = "rv - analysis report viewer

 q          quit
 Tab        switch between functions table and sections
 j/k ↓/↑    move selection up/down
 h/l ←/→    move column selection (table)
 PgUp/PgDn  page up / down
 g / G      jump to top / bottom
 s          sort by the selected column (repeat to flip direction)
 /          filter by function name
 Enter      open section (table) / expand or collapse section
 y          copy selected cell (table) / code block (sections)
 Y          copy selected row as csv (table)
 ?          this help
 Esc        back / close
";
