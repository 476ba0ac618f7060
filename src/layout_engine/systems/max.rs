use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{LayoutCommand, LayoutResponse, LayoutState, LayoutSystem};
use crate::common::config::MaxSettings;
use crate::ipc::commands::{CommandSpec, MAX_COMMANDS};
use crate::layout_engine::LayoutError;
use crate::model::window::{Window, WindowId, WindowSet};
use crate::sys::backend::Core;
use crate::sys::geometry::Rect;

/// Shows the focused window over the whole area and hides the rest.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MaxLayout {
    settings: MaxSettings,
    clients: Vec<WindowId>,
    focused: Option<WindowId>,
    #[serde(default)]
    state: LayoutState,
}

impl MaxLayout {
    pub fn new(settings: MaxSettings) -> Self {
        MaxLayout {
            settings,
            clients: Vec::new(),
            focused: None,
            state: LayoutState::Unconfigured,
        }
    }

    pub(super) fn instantiate(&self) -> Self {
        MaxLayout {
            state: LayoutState::Hidden,
            ..MaxLayout::new(self.settings.clone())
        }
    }

    fn index_of(&self, wid: WindowId) -> Option<usize> { self.clients.iter().position(|&c| c == wid) }

    fn current(&self) -> Option<WindowId> { self.focused.or_else(|| self.clients.first().copied()) }
}

impl LayoutSystem for MaxLayout {
    fn name(&self) -> &'static str { "max" }

    fn state(&self) -> LayoutState { self.state }

    fn add_client(&mut self, window: &Window) {
        if self.index_of(window.id).is_some() {
            return;
        }
        match self.focused.and_then(|f| self.index_of(f)) {
            Some(idx) => self.clients.insert(idx + 1, window.id),
            None => self.clients.push(window.id),
        }
    }

    fn remove(&mut self, wid: WindowId) -> Option<WindowId> {
        let idx = self.index_of(wid)?;
        self.clients.remove(idx);
        if self.focused == Some(wid) {
            self.focused = self.clients.get(idx).or(self.clients.last()).copied();
        }
        self.focused
    }

    fn contains(&self, wid: WindowId) -> bool { self.index_of(wid).is_some() }

    fn focus(&mut self, wid: WindowId) {
        if self.contains(wid) {
            self.focused = Some(wid);
        }
    }

    fn blur(&mut self) {}

    fn focused(&self) -> Option<WindowId> { self.focused }

    fn focus_first(&self) -> Option<WindowId> { self.clients.first().copied() }

    fn focus_last(&self) -> Option<WindowId> { self.clients.last().copied() }

    fn focus_next(&self, wid: WindowId) -> Option<WindowId> {
        self.index_of(wid).and_then(|i| self.clients.get(i + 1)).copied()
    }

    fn focus_previous(&self, wid: WindowId) -> Option<WindowId> {
        let idx = self.index_of(wid)?;
        idx.checked_sub(1).map(|i| self.clients[i])
    }

    fn configure(&mut self, window: &Window, rect: Rect, core: &mut dyn Core) {
        if self.current() == Some(window.id) {
            let margin = self.settings.margin;
            let rect = Rect::new(
                rect.x + margin,
                rect.y + margin,
                rect.width - 2 * margin,
                rect.height - 2 * margin,
            );
            core.place(window.id, rect.inset_for_border(self.settings.border_width), self.settings.border_width);
        } else {
            core.hide(window.id);
        }
    }

    fn show(&mut self, _windows: &WindowSet, _rect: Rect, _core: &mut dyn Core) {
        self.state = LayoutState::Showing;
    }

    fn hide(&mut self, _core: &mut dyn Core) { self.state = LayoutState::Hidden; }

    fn info(&self, windows: &WindowSet) -> Value {
        json!({
            "name": self.name(),
            "clients": self.clients.iter().map(|&c| windows.name_of(c)).collect::<Vec<_>>(),
            "current": self.focused.and_then(|f| self.index_of(f)),
        })
    }

    fn draw_tree(&self, windows: &WindowSet) -> String {
        let leaves = self
            .clients
            .iter()
            .map(|&c| {
                let mark = if Some(c) == self.focused { "*" } else { "" };
                ascii_tree::Tree::Leaf(vec![format!("{mark}{} {c}", windows.name_of(c))])
            })
            .collect();
        let mut out = String::new();
        _ = ascii_tree::write_tree(&mut out, &ascii_tree::Tree::Node("max".into(), leaves));
        out
    }

    fn commands(&self) -> &'static [CommandSpec] { MAX_COMMANDS }

    fn handle_command(
        &mut self,
        command: LayoutCommand,
        _windows: &WindowSet,
        _core: &mut dyn Core,
    ) -> Result<LayoutResponse, LayoutError> {
        let target = match command {
            LayoutCommand::Next => self
                .current()
                .and_then(|c| self.focus_next(c))
                .or_else(|| self.focus_first()),
            LayoutCommand::Previous => self
                .current()
                .and_then(|c| self.focus_previous(c))
                .or_else(|| self.focus_last()),
            other => {
                return Err(LayoutError::UnsupportedCommand {
                    layout: self.name(),
                    command: other.name(),
                });
            }
        };
        self.focused = target;
        Ok(LayoutResponse { focus: target, relayout: false })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::headless::HeadlessCore;

    fn w(n: u32) -> WindowId { WindowId(n) }

    fn setup(count: u32) -> (MaxLayout, WindowSet) {
        let mut layout = MaxLayout::new(MaxSettings::default()).instantiate();
        let mut windows = WindowSet::new();
        for id in 1..=count {
            let window = Window::new(w(id), format!("w{id}"));
            layout.add_client(&window);
            layout.focus(window.id);
            windows.insert(window);
        }
        (layout, windows)
    }

    #[test]
    fn new_windows_go_after_the_focused_one() {
        let (mut layout, windows) = setup(3);
        layout.focus(w(1));
        layout.add_client(&Window::new(w(4), "w4"));
        assert_eq!(layout.clients, vec![w(1), w(4), w(2), w(3)]);
        assert_eq!(layout.info(&windows)["current"], json!(0));
    }

    #[test]
    fn removing_the_focused_window_moves_to_its_successor() {
        let (mut layout, _) = setup(3);
        layout.focus(w(2));
        assert_eq!(layout.remove(w(2)), Some(w(3)));
        assert_eq!(layout.remove(w(3)), Some(w(1)));
        assert_eq!(layout.remove(w(1)), None);
        assert_eq!(layout.remove(w(1)), None);
    }

    #[test]
    fn next_and_previous_wrap() {
        let (mut layout, windows) = setup(3);
        let mut core = HeadlessCore::new();
        let r = layout.handle_command(LayoutCommand::Next, &windows, &mut core).unwrap();
        assert_eq!(r.focus, Some(w(1)));
        let r = layout.handle_command(LayoutCommand::Previous, &windows, &mut core).unwrap();
        assert_eq!(r.focus, Some(w(3)));
    }

    #[test]
    fn tree_commands_are_rejected() {
        let (mut layout, windows) = setup(1);
        let mut core = HeadlessCore::new();
        assert_eq!(
            layout.handle_command(LayoutCommand::MoveUp, &windows, &mut core),
            Err(LayoutError::UnsupportedCommand { layout: "max", command: "move_up" })
        );
    }

    #[test]
    fn only_current_window_is_placed() {
        let (mut layout, windows) = setup(2);
        let mut core = HeadlessCore::new();
        let area = Rect::new(0, 0, 100, 100);
        layout.layout(&windows, &[w(1), w(2)], area, &mut core).unwrap();
        assert!(!core.is_visible(w(1)));
        assert_eq!(core.placement(w(2)), Some(area));
    }
}
