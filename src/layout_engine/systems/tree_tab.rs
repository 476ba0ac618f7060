use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    LayoutCommand, LayoutResponse, LayoutState, LayoutSystem, SectionRule, configure_all,
};
use crate::common::config::TreeTabSettings;
use crate::ipc::commands::{CommandSpec, TREE_TAB_COMMANDS};
use crate::layout_engine::LayoutError;
use crate::model::window::{Window, WindowId, WindowSet};
use crate::sys::backend::{Core, PanelId};
use crate::sys::geometry::Rect;

mod nodes;
mod panel;

pub use nodes::{NodeKind, TabTree, superscript};
use panel::HitRow;

/// Behaves like a max layout, with a side panel listing every window as a
/// tree grouped into named sections.
#[derive(Serialize, Deserialize)]
pub struct TreeTab {
    settings: TreeTabSettings,
    tree: TabTree,
    focused: Option<WindowId>,
    #[serde(default)]
    state: LayoutState,
    #[serde(skip)]
    panel: Option<PanelId>,
    #[serde(skip)]
    rows: Vec<HitRow>,
}

impl TreeTab {
    pub fn new(settings: TreeTabSettings) -> Result<Self, LayoutError> {
        let tree = TabTree::new(&settings.sections, settings.default_section.as_deref())?;
        Ok(TreeTab {
            settings,
            tree,
            focused: None,
            state: LayoutState::Unconfigured,
            panel: None,
            rows: Vec::new(),
        })
    }

    pub(super) fn instantiate(&self) -> Result<Self, LayoutError> {
        let mut fresh = TreeTab::new(self.settings.clone())?;
        fresh.state = LayoutState::Hidden;
        Ok(fresh)
    }

    pub fn tree(&self) -> &TabTree { &self.tree }

    pub fn settings(&self) -> &TreeTabSettings { &self.settings }

    pub fn panel_width(&self) -> i32 { self.settings.panel_width }

    /// Splits `rect` into `(panel, body)`.
    pub fn split(&self, rect: Rect) -> Result<(Rect, Rect), LayoutError> {
        let width = self.settings.panel_width;
        let too_wide = || LayoutError::PanelTooWide {
            panel_width: width,
            screen_width: rect.width,
        };
        if width <= 0 {
            return Err(too_wide());
        }
        if self.settings.place_right {
            let (body, panel) = rect.hsplit(rect.width - width).ok_or_else(too_wide)?;
            Ok((panel, body))
        } else {
            rect.hsplit(width).ok_or_else(too_wide)
        }
    }

    fn draw_panel(&mut self, windows: &WindowSet, core: &mut dyn Core) {
        let Some(panel) = self.panel else { return };
        let rendered = panel::render(&self.tree, windows, self.focused, &self.settings);
        self.rows = rendered.rows;
        core.draw_panel(panel, rendered.ops);
    }

    fn resize_panel(&mut self, rect: Rect, windows: &WindowSet, core: &mut dyn Core) {
        if let Some(panel) = self.panel {
            core.place_panel(panel, rect);
            self.draw_panel(windows, core);
        }
    }

    /// Files section-level windows into the section `sorter` names.
    pub fn sort_windows(
        &mut self,
        windows: &WindowSet,
        mut sorter: impl FnMut(&Window) -> Option<String>,
        create_sections: bool,
    ) -> Result<bool, LayoutError> {
        self.tree.sort(|wid| windows.get(wid).and_then(&mut sorter), create_sections)
    }

    fn sort_by_rules(
        &mut self,
        windows: &WindowSet,
        rules: &[SectionRule],
        create_sections: bool,
    ) -> Result<bool, LayoutError> {
        let compiled = rules.iter().map(SectionRule::compile).collect::<Result<Vec<_>, _>>()?;
        self.sort_windows(
            windows,
            |w| compiled.iter().find_map(|r| r.section_for(w)).map(str::to_owned),
            create_sections,
        )
    }

    fn on_focused(&mut self, f: impl FnOnce(&mut TabTree, WindowId) -> bool) -> bool {
        match self.focused {
            Some(wid) => f(&mut self.tree, wid),
            None => false,
        }
    }

    fn step(&mut self, forward: bool) -> LayoutResponse {
        let next = self
            .focused
            .and_then(|f| {
                if forward {
                    self.tree.next_window(f)
                } else {
                    self.tree.prev_window(f)
                }
            })
            .or_else(|| {
                if forward {
                    self.tree.first_window()
                } else {
                    self.tree.last_window()
                }
            });
        self.focused = next;
        LayoutResponse { focus: next, relayout: false }
    }
}

impl LayoutSystem for TreeTab {
    fn name(&self) -> &'static str { "treetab" }

    fn state(&self) -> LayoutState { self.state }

    fn add_client(&mut self, window: &Window) {
        self.tree.add_window(window, self.focused);
    }

    fn remove(&mut self, wid: WindowId) -> Option<WindowId> {
        if !self.tree.contains(wid) {
            return None;
        }
        if self.focused == Some(wid) {
            self.focused = if self.settings.previous_on_rm {
                self.tree.prev_window(wid)
            } else {
                self.tree.first_window()
            }
            .filter(|&f| f != wid);
        }
        self.tree.remove_window(wid);
        debug_assert_eq!(self.tree.check_invariants(), Ok(()));
        if self.settings.previous_on_rm { self.focused } else { None }
    }

    fn contains(&self, wid: WindowId) -> bool { self.tree.contains(wid) }

    fn focus(&mut self, wid: WindowId) {
        if self.tree.contains(wid) {
            self.focused = Some(wid);
        }
    }

    // The focused window is kept so focus returns here after a floating
    // window had it.
    fn blur(&mut self) {}

    fn focused(&self) -> Option<WindowId> { self.focused }

    fn focus_first(&self) -> Option<WindowId> { self.tree.first_window() }

    fn focus_last(&self) -> Option<WindowId> { self.tree.last_window() }

    fn focus_next(&self, wid: WindowId) -> Option<WindowId> { self.tree.next_window(wid) }

    fn focus_previous(&self, wid: WindowId) -> Option<WindowId> { self.tree.prev_window(wid) }

    fn configure(&mut self, window: &Window, rect: Rect, core: &mut dyn Core) {
        if self.focused == Some(window.id) && self.tree.contains(window.id) {
            core.place(window.id, rect, 0);
        } else {
            core.hide(window.id);
        }
    }

    fn layout(
        &mut self,
        windows: &WindowSet,
        tiled: &[WindowId],
        rect: Rect,
        core: &mut dyn Core,
    ) -> Result<(), LayoutError> {
        let (panel, body) = self.split(rect)?;
        self.resize_panel(panel, windows, core);
        configure_all(self, windows, tiled, body, core)
    }

    fn show(&mut self, windows: &WindowSet, rect: Rect, core: &mut dyn Core) {
        self.state = LayoutState::Showing;
        let panel = *self.panel.get_or_insert_with(|| core.create_panel());
        match self.split(rect) {
            Ok((panel_rect, _)) => {
                core.place_panel(panel, panel_rect);
                self.draw_panel(windows, core);
            }
            Err(e) => warn!("not showing tree tab panel: {e}"),
        }
    }

    fn hide(&mut self, core: &mut dyn Core) {
        self.state = LayoutState::Hidden;
        if let Some(panel) = self.panel {
            core.hide_panel(panel);
        }
    }

    fn finalize(&mut self, core: &mut dyn Core) {
        if let Some(panel) = self.panel.take() {
            core.destroy_panel(panel);
        }
        self.rows.clear();
    }

    fn info(&self, windows: &WindowSet) -> Value {
        let mut clients: Vec<&str> = self.tree.window_ids().map(|w| windows.name_of(w)).collect();
        clients.sort_unstable();
        json!({
            "name": self.name(),
            "clients": clients,
            "focused": self.focused.map(|f| windows.name_of(f)),
            "sections": self.tree.section_titles(),
            "client_trees": self.tree.client_trees(windows),
            "panel_width": self.settings.panel_width,
        })
    }

    fn draw_tree(&self, windows: &WindowSet) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        _ = ascii_tree::write_tree(&mut out, &self.tree.ascii_tree(windows));
        out
    }

    fn commands(&self) -> &'static [CommandSpec] { TREE_TAB_COMMANDS }

    fn handle_command(
        &mut self,
        command: LayoutCommand,
        windows: &WindowSet,
        core: &mut dyn Core,
    ) -> Result<LayoutResponse, LayoutError> {
        debug!(command = command.name(), "tree tab command");
        match command {
            LayoutCommand::Next => return Ok(self.step(true)),
            LayoutCommand::Previous => return Ok(self.step(false)),
            LayoutCommand::MoveUp => _ = self.on_focused(TabTree::move_up),
            LayoutCommand::MoveDown => _ = self.on_focused(TabTree::move_down),
            LayoutCommand::MoveLeft => _ = self.on_focused(TabTree::move_left),
            LayoutCommand::MoveRight => _ = self.on_focused(TabTree::move_right),
            LayoutCommand::SectionUp => _ = self.on_focused(TabTree::section_up),
            LayoutCommand::SectionDown => _ = self.on_focused(TabTree::section_down),
            LayoutCommand::ExpandBranch => _ = self.on_focused(|t, w| t.set_expanded(w, true)),
            LayoutCommand::CollapseBranch => _ = self.on_focused(|t, w| t.set_expanded(w, false)),
            LayoutCommand::AddSection { name } => self.tree.add_section(&name)?,
            LayoutCommand::DelSection { name } => self.tree.del_section(&name)?,
            LayoutCommand::SortWindows { rules, create_sections } => {
                self.sort_by_rules(windows, &rules, create_sections)?;
            }
            LayoutCommand::IncreaseRatio => {
                self.settings.panel_width += 10;
                return Ok(LayoutResponse { focus: None, relayout: true });
            }
            LayoutCommand::DecreaseRatio => {
                self.settings.panel_width = (self.settings.panel_width - 10).max(0);
                return Ok(LayoutResponse { focus: None, relayout: true });
            }
        }
        self.draw_panel(windows, core);
        Ok(LayoutResponse::default())
    }

    fn button_press(&self, _x: i32, y: i32) -> Option<WindowId> { panel::hit_test(&self.rows, y) }

    fn refresh(&mut self, windows: &WindowSet, core: &mut dyn Core) { self.draw_panel(windows, core) }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::backend::DrawOp;
    use crate::sys::headless::HeadlessCore;

    fn w(n: u32) -> WindowId { WindowId(n) }

    fn screen() -> Rect { Rect::new(0, 0, 1000, 800) }

    fn setup(settings: TreeTabSettings, names: &[&str]) -> (TreeTab, WindowSet) {
        let mut layout = TreeTab::new(settings).unwrap().instantiate().unwrap();
        let mut windows = WindowSet::new();
        for (i, name) in names.iter().enumerate() {
            let window = Window::new(w(i as u32 + 1), *name);
            layout.add_client(&window);
            layout.focus(window.id);
            windows.insert(window);
        }
        (layout, windows)
    }

    #[test]
    fn only_the_focused_window_is_mapped() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &["a", "b", "c"]);
        let mut core = HeadlessCore::new();
        layout.show(&windows, screen(), &mut core);
        let tiled: Vec<_> = windows.ids().collect();
        layout.layout(&windows, &tiled, screen(), &mut core).unwrap();

        assert_eq!(core.placement(w(3)), Some(Rect::new(150, 0, 850, 800)));
        assert!(!core.is_visible(w(1)));
        assert!(!core.is_visible(w(2)));
        let (_, panel) = core.visible_panel().unwrap();
        assert_eq!(panel.rect, Some(Rect::new(0, 0, 150, 800)));
    }

    #[test]
    fn panel_on_the_right() {
        let settings = TreeTabSettings { place_right: true, ..Default::default() };
        let (layout, _) = setup(settings, &[]);
        let (panel, body) = layout.split(screen()).unwrap();
        assert_eq!(panel, Rect::new(850, 0, 150, 800));
        assert_eq!(body, Rect::new(0, 0, 850, 800));
    }

    #[test]
    fn panel_wider_than_screen_fails_the_layout() {
        let settings = TreeTabSettings { panel_width: 1200, ..Default::default() };
        let (mut layout, windows) = setup(settings, &["a"]);
        let mut core = HeadlessCore::new();
        assert_eq!(
            layout.layout(&windows, &[w(1)], screen(), &mut core),
            Err(LayoutError::PanelTooWide { panel_width: 1200, screen_width: 1000 })
        );
    }

    #[test]
    fn untracked_windows_are_reported() {
        let (mut layout, mut windows) = setup(TreeTabSettings::default(), &["a"]);
        windows.insert(Window::new(w(9), "stray"));
        let mut core = HeadlessCore::new();
        assert_eq!(
            layout.layout(&windows, &[w(1), w(9)], screen(), &mut core),
            Err(LayoutError::UntrackedWindow(w(9)))
        );
        assert!(core.is_visible(w(1)));
    }

    #[test]
    fn next_and_previous_wrap() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &["a", "b", "c"]);
        let mut core = HeadlessCore::new();
        assert_eq!(layout.focused(), Some(w(3)));
        let r = layout.handle_command(LayoutCommand::Next, &windows, &mut core).unwrap();
        assert_eq!(r.focus, Some(w(1)));
        let r = layout.handle_command(LayoutCommand::Previous, &windows, &mut core).unwrap();
        assert_eq!(r.focus, Some(w(3)));
        let r = layout.handle_command(LayoutCommand::Previous, &windows, &mut core).unwrap();
        assert_eq!(r.focus, Some(w(2)));
    }

    #[test]
    fn remove_picks_previous_only_when_configured() {
        let (mut layout, _) = setup(TreeTabSettings::default(), &["a", "b", "c"]);
        assert_eq!(layout.remove(w(3)), None);
        assert_eq!(layout.focused(), Some(w(1)));

        let settings = TreeTabSettings { previous_on_rm: true, ..Default::default() };
        let (mut layout, _) = setup(settings, &["a", "b", "c"]);
        assert_eq!(layout.remove(w(3)), Some(w(2)));
        assert_eq!(layout.remove(w(1)), Some(w(2)));
        assert_eq!(layout.remove(w(2)), None);
        assert_eq!(layout.remove(w(2)), None);
    }

    #[test]
    fn panel_draws_sections_and_highlights_focus() {
        let settings = TreeTabSettings {
            sections: vec!["Work".into(), "Play".into()],
            ..Default::default()
        };
        let (mut layout, windows) = setup(settings, &["a", "b"]);
        let mut core = HeadlessCore::new();
        layout.show(&windows, screen(), &mut core);
        let (_, panel) = core.visible_panel().unwrap();

        let texts: Vec<(&str, &str)> = panel
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, color, .. } => Some((text.as_str(), color.as_str())),
                DrawOp::FramedText { text, fill, .. } => Some((text.as_str(), fill.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec![
            ("Work", "ffffff"),
            ("a", "606060"),
            ("b", "000080"),
            ("Play", "ffffff"),
        ]);
        assert!(matches!(panel.ops[0], DrawOp::Clear { .. }));
    }

    #[test]
    fn clicks_map_to_window_rows() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &["a", "b"]);
        let mut core = HeadlessCore::new();
        layout.show(&windows, screen(), &mut core);
        // Section header takes 11 + 4 + 4 pixels, each row 14 + 2*2 + 2 + 2.
        assert_eq!(layout.button_press(10, 5), None);
        assert_eq!(layout.button_press(10, 19), Some(w(1)));
        assert_eq!(layout.button_press(10, 40), Some(w(1)));
        assert_eq!(layout.button_press(10, 41), Some(w(2)));
        assert_eq!(layout.button_press(10, 63), None);
    }

    #[test]
    fn structural_commands_redraw_and_validate() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &["a", "b"]);
        let mut core = HeadlessCore::new();
        layout.show(&windows, screen(), &mut core);
        core.clear();

        layout.handle_command(LayoutCommand::MoveRight, &windows, &mut core).unwrap();
        assert_eq!(
            layout.info(&windows)["client_trees"],
            json!({"Default": [["a", ["b"]]]})
        );
        layout.handle_command(LayoutCommand::CollapseBranch, &windows, &mut core).unwrap();
        layout.focus(w(1));
        layout.handle_command(LayoutCommand::CollapseBranch, &windows, &mut core).unwrap();
        assert_eq!(layout.info(&windows)["client_trees"], json!({"Default": [["a"]]}));
        assert!(core.calls.iter().any(|c| matches!(
            c,
            crate::sys::headless::BackendCall::DrawPanel { .. }
        )));

        let err = layout
            .handle_command(LayoutCommand::DelSection { name: "Default".into() }, &windows, &mut core)
            .unwrap_err();
        assert_eq!(err, LayoutError::LastSection);
        layout
            .handle_command(LayoutCommand::AddSection { name: "Other".into() }, &windows, &mut core)
            .unwrap();
        assert_eq!(layout.info(&windows)["sections"], json!(["Default", "Other"]));
    }

    #[test]
    fn ratio_commands_ask_for_relayout() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &[]);
        let mut core = HeadlessCore::new();
        let r = layout.handle_command(LayoutCommand::IncreaseRatio, &windows, &mut core).unwrap();
        assert!(r.relayout);
        assert_eq!(layout.panel_width(), 160);
        layout.handle_command(LayoutCommand::DecreaseRatio, &windows, &mut core).unwrap();
        layout.handle_command(LayoutCommand::DecreaseRatio, &windows, &mut core).unwrap();
        assert_eq!(layout.panel_width(), 140);
    }

    #[test]
    fn sort_by_rules() {
        let (mut layout, mut windows) = setup(TreeTabSettings::default(), &["Inbox - Mail", "b"]);
        windows.get_mut(w(2)).unwrap().wm_class = Some("term".into());
        let mut core = HeadlessCore::new();
        let rules = vec![
            SectionRule { title_regex: Some("Mail$".into()), wm_class: None, section: "Mail".into() },
            SectionRule { title_regex: None, wm_class: Some("term".into()), section: "Shell".into() },
        ];
        layout
            .handle_command(
                LayoutCommand::SortWindows { rules: rules.clone(), create_sections: false },
                &windows,
                &mut core,
            )
            .unwrap();
        assert_eq!(layout.info(&windows)["sections"], json!(["Default"]));
        layout
            .handle_command(
                LayoutCommand::SortWindows { rules, create_sections: true },
                &windows,
                &mut core,
            )
            .unwrap();
        assert_eq!(
            layout.info(&windows)["client_trees"],
            json!({"Default": [], "Mail": [["Inbox - Mail"]], "Shell": [["b"]]})
        );
    }

    #[test]
    fn finalize_destroys_the_panel() {
        let (mut layout, windows) = setup(TreeTabSettings::default(), &["a"]);
        let mut core = HeadlessCore::new();
        layout.show(&windows, screen(), &mut core);
        assert_eq!(core.panels.len(), 1);
        layout.hide(&mut core);
        assert_eq!(layout.state(), LayoutState::Hidden);
        layout.finalize(&mut core);
        assert!(core.panels.is_empty());
    }
}
