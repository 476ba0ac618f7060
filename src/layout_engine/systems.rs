use enum_dispatch::enum_dispatch;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LayoutError;
use crate::common::config::LayoutConfig;
use crate::ipc::commands::CommandSpec;
use crate::model::window::{Window, WindowId, WindowSet};
use crate::sys::backend::Core;
use crate::sys::geometry::Rect;

/// Lifecycle of a layout instance.
///
/// Templates built from the configuration stay `Unconfigured`; every group
/// gets its own instance which starts `Hidden` and toggles with
/// [`LayoutSystem::show`] / [`LayoutSystem::hide`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutState {
    #[default]
    Unconfigured,
    Hidden,
    Showing,
}

/// Commands understood by one or more layouts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[serde(tag = "command", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayoutCommand {
    Next,
    Previous,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    AddSection {
        name: String,
    },
    DelSection {
        name: String,
    },
    SectionUp,
    SectionDown,
    SortWindows {
        rules: Vec<SectionRule>,
        #[serde(default = "yes")]
        create_sections: bool,
    },
    ExpandBranch,
    CollapseBranch,
    IncreaseRatio,
    DecreaseRatio,
}

fn yes() -> bool { true }

impl LayoutCommand {
    pub fn name(&self) -> &'static str { self.into() }
}

/// What the owning group has to do after a layout handled a command.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResponse {
    pub focus: Option<WindowId>,
    pub relayout: bool,
}

/// Maps windows to a section by title regex or window class.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SectionRule {
    #[serde(default)]
    pub title_regex: Option<String>,
    #[serde(default)]
    pub wm_class: Option<String>,
    pub section: String,
}

pub(crate) struct CompiledSectionRule<'a> {
    title: Option<Regex>,
    rule: &'a SectionRule,
}

impl SectionRule {
    pub(crate) fn compile(&self) -> Result<CompiledSectionRule<'_>, LayoutError> {
        if self.title_regex.is_none() && self.wm_class.is_none() {
            return Err(LayoutError::InvalidRule(format!(
                "rule for section {:?} matches nothing",
                self.section
            )));
        }
        let title = self
            .title_regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| LayoutError::InvalidRule(e.to_string()))?;
        Ok(CompiledSectionRule { title, rule: self })
    }
}

impl CompiledSectionRule<'_> {
    pub(crate) fn section_for(&self, window: &Window) -> Option<&str> {
        if let Some(re) = &self.title {
            if !re.is_match(&window.name) {
                return None;
            }
        }
        if let Some(class) = &self.rule.wm_class {
            if window.wm_class.as_deref() != Some(class.as_str()) {
                return None;
            }
        }
        Some(&self.rule.section)
    }
}

#[enum_dispatch]
pub trait LayoutSystem {
    fn name(&self) -> &'static str;
    fn state(&self) -> LayoutState;

    fn add_client(&mut self, window: &Window);
    /// Forgets `wid` and returns the window the layout would like focused
    /// next, if it has an opinion.
    fn remove(&mut self, wid: WindowId) -> Option<WindowId>;
    fn contains(&self, wid: WindowId) -> bool;

    fn focus(&mut self, wid: WindowId);
    fn blur(&mut self);
    fn focused(&self) -> Option<WindowId>;
    fn focus_first(&self) -> Option<WindowId>;
    fn focus_last(&self) -> Option<WindowId>;
    fn focus_next(&self, wid: WindowId) -> Option<WindowId>;
    fn focus_previous(&self, wid: WindowId) -> Option<WindowId>;

    /// Places (or hides) a single window inside `rect`.
    fn configure(&mut self, window: &Window, rect: Rect, core: &mut dyn Core);

    /// Positions `tiled` inside `rect`. Every window must be tracked by the
    /// layout; the untracked ones are skipped and reported.
    fn layout(
        &mut self,
        windows: &WindowSet,
        tiled: &[WindowId],
        rect: Rect,
        core: &mut dyn Core,
    ) -> Result<(), LayoutError> {
        configure_all(self, windows, tiled, rect, core)
    }

    fn show(&mut self, windows: &WindowSet, rect: Rect, core: &mut dyn Core);
    fn hide(&mut self, core: &mut dyn Core);
    /// Releases backend resources before the layout is dropped.
    fn finalize(&mut self, _core: &mut dyn Core) {}

    fn info(&self, windows: &WindowSet) -> Value;
    fn draw_tree(&self, windows: &WindowSet) -> String;

    fn commands(&self) -> &'static [CommandSpec];
    fn handle_command(
        &mut self,
        command: LayoutCommand,
        windows: &WindowSet,
        core: &mut dyn Core,
    ) -> Result<LayoutResponse, LayoutError>;

    /// Window under a click at panel-local `(x, y)`, for layouts that draw
    /// a panel.
    fn button_press(&self, _x: i32, _y: i32) -> Option<WindowId> { None }

    /// Asks the layout to redraw any decorations, e.g. after a window title
    /// changed.
    fn refresh(&mut self, _windows: &WindowSet, _core: &mut dyn Core) {}
}

pub(crate) fn configure_all<L: LayoutSystem + ?Sized>(
    layout: &mut L,
    windows: &WindowSet,
    tiled: &[WindowId],
    rect: Rect,
    core: &mut dyn Core,
) -> Result<(), LayoutError> {
    let mut first_err = None;
    for &wid in tiled {
        match windows.get(wid) {
            Some(window) if layout.contains(wid) => layout.configure(window, rect, core),
            _ => {
                first_err.get_or_insert(LayoutError::UntrackedWindow(wid));
            }
        }
    }
    first_err.map_or(Ok(()), Err)
}

// Must stay externally tagged: `ron` cannot restore the tree's node kinds
// from behind an internal tag.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[enum_dispatch(LayoutSystem)]
pub enum LayoutSystemKind {
    TreeTab(TreeTab),
    Max(MaxLayout),
}

impl LayoutSystemKind {
    /// Builds the template for a configured layout.
    pub fn from_config(config: &LayoutConfig) -> Result<Self, LayoutError> {
        Ok(match config {
            LayoutConfig::TreeTab(settings) => TreeTab::new(settings.clone())?.into(),
            LayoutConfig::Max(settings) => MaxLayout::new(settings.clone()).into(),
        })
    }

    /// A fresh, empty instance for one group.
    pub fn instantiate(&self) -> Result<Self, LayoutError> {
        Ok(match self {
            LayoutSystemKind::TreeTab(t) => t.instantiate()?.into(),
            LayoutSystemKind::Max(m) => m.instantiate().into(),
        })
    }

    pub fn as_tree_tab(&self) -> Option<&TreeTab> {
        match self {
            LayoutSystemKind::TreeTab(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tree_tab_mut(&mut self) -> Option<&mut TreeTab> {
        match self {
            LayoutSystemKind::TreeTab(t) => Some(t),
            _ => None,
        }
    }
}

mod max;
mod tree_tab;

pub use max::MaxLayout;
pub use tree_tab::TreeTab;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_snake_case() {
        assert_eq!(LayoutCommand::MoveUp.name(), "move_up");
        assert_eq!(
            LayoutCommand::SortWindows { rules: vec![], create_sections: true }.name(),
            "sort_windows"
        );
    }

    #[test]
    fn section_rules_match_on_title_and_class() {
        let rule = SectionRule {
            title_regex: Some("^Mail".into()),
            wm_class: Some("thunderbird".into()),
            section: "Mail".into(),
        };
        let compiled = rule.compile().unwrap();
        let window = Window::new(WindowId(1), "Mail - Inbox").with_class("thunderbird");
        assert_eq!(compiled.section_for(&window), Some("Mail"));
        let other = Window::new(WindowId(2), "Mail - Inbox").with_class("firefox");
        assert_eq!(compiled.section_for(&other), None);

        let empty = SectionRule { title_regex: None, wm_class: None, section: "x".into() };
        assert!(matches!(empty.compile(), Err(LayoutError::InvalidRule(_))));
        let bad = SectionRule { title_regex: Some("(".into()), wm_class: None, section: "x".into() };
        assert!(matches!(bad.compile(), Err(LayoutError::InvalidRule(_))));
    }
}
