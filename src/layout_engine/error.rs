use thiserror::Error;

use crate::model::window::WindowId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Layout index {index} out of range for {len} layouts")]
    LayoutIndexOutOfRange { index: i64, len: usize },
    #[error("Duplicate section name: {0}")]
    DuplicateSection(String),
    #[error("Section name not found: {0}")]
    SectionNotFound(String),
    #[error("Can't delete last section")]
    LastSection,
    #[error("A tree tab layout needs at least one section")]
    NoSections,
    #[error("Panel width {panel_width} does not fit a screen {screen_width} pixels wide")]
    PanelTooWide { panel_width: i32, screen_width: i32 },
    #[error("Window {0} is not tracked by the layout")]
    UntrackedWindow(WindowId),
    #[error("Layout {layout} does not support the {command} command")]
    UnsupportedCommand { layout: &'static str, command: &'static str },
    #[error("Invalid sort rule: {0}")]
    InvalidRule(String),
}

/// Failures of operations that span groups and screens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("No such group: {0}")]
    NoSuchGroup(String),
    #[error("Group {0} already exists")]
    DuplicateGroup(String),
    #[error("No such screen: {0}")]
    NoSuchScreen(usize),
    #[error("Can't delete all groups")]
    LastGroup,
    #[error("No window is focused")]
    NoFocusedWindow,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
