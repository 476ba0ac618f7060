//! A [`Core`] that keeps the results of every request in memory.
//!
//! Used by `arbor replay` and throughout the tests in place of a display
//! server.

use serde::Serialize;
use tracing::trace;

use super::backend::{Core, DrawOp, PanelId};
use super::geometry::Rect;
use super::hooks::HookEvent;
use crate::actor;
use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::model::window::WindowId;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BackendCall {
    Place { wid: WindowId, rect: Rect, border_width: i32 },
    Hide { wid: WindowId },
    Focus { wid: Option<WindowId>, warp: bool },
    FocusScreen { index: usize },
    CreatePanel { panel: PanelId },
    PlacePanel { panel: PanelId, rect: Rect },
    HidePanel { panel: PanelId },
    DrawPanel { panel: PanelId, ops: usize },
    DestroyPanel { panel: PanelId },
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub rect: Option<Rect>,
    pub visible: bool,
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Default)]
pub struct HeadlessCore {
    pub calls: Vec<BackendCall>,
    pub placed: HashMap<WindowId, Rect>,
    pub hidden: HashSet<WindowId>,
    pub focused: Option<WindowId>,
    pub current_screen: Option<usize>,
    pub dragging: bool,
    pub hooks: Vec<HookEvent>,
    pub panels: BTreeMap<PanelId, PanelState>,
    next_panel: u32,
    hook_tx: Option<actor::Sender<HookEvent>>,
}

impl HeadlessCore {
    pub fn new() -> Self {
        HeadlessCore {
            current_screen: Some(0),
            ..Default::default()
        }
    }

    /// Also forwards every fired hook to `tx`.
    pub fn with_hook_sender(tx: actor::Sender<HookEvent>) -> Self {
        HeadlessCore { hook_tx: Some(tx), ..Self::new() }
    }

    pub fn is_visible(&self, wid: WindowId) -> bool {
        self.placed.contains_key(&wid) && !self.hidden.contains(&wid)
    }

    pub fn placement(&self, wid: WindowId) -> Option<Rect> {
        self.is_visible(wid).then(|| self.placed[&wid])
    }

    pub fn take_hooks(&mut self) -> Vec<HookEvent> { std::mem::take(&mut self.hooks) }

    pub fn hook_count(&self, name: &str) -> usize {
        self.hooks.iter().filter(|h| h.name() == name).count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.hooks.clear();
    }

    /// The single visible panel, if there is exactly one.
    pub fn visible_panel(&self) -> Option<(&PanelId, &PanelState)> {
        let mut visible = self.panels.iter().filter(|(_, p)| p.visible);
        let first = visible.next()?;
        visible.next().is_none().then_some(first)
    }
}

impl Core for HeadlessCore {
    fn place(&mut self, wid: WindowId, rect: Rect, border_width: i32) {
        self.placed.insert(wid, rect);
        self.hidden.remove(&wid);
        self.calls.push(BackendCall::Place { wid, rect, border_width });
    }

    fn hide(&mut self, wid: WindowId) {
        self.hidden.insert(wid);
        self.calls.push(BackendCall::Hide { wid });
    }

    fn focus_window(&mut self, wid: Option<WindowId>, warp: bool) {
        self.focused = wid;
        self.calls.push(BackendCall::Focus { wid, warp });
    }

    fn current_screen(&self) -> Option<usize> { self.current_screen }

    fn focus_screen(&mut self, index: usize) {
        self.current_screen = Some(index);
        self.calls.push(BackendCall::FocusScreen { index });
    }

    fn dragging(&self) -> bool { self.dragging }

    fn fire(&mut self, event: HookEvent) {
        trace!(hook = event.name(), "fire");
        if let Some(tx) = &self.hook_tx {
            tx.send(event.clone());
        }
        self.hooks.push(event);
    }

    fn create_panel(&mut self) -> PanelId {
        self.next_panel += 1;
        let panel = PanelId(self.next_panel);
        self.panels.insert(panel, PanelState::default());
        self.calls.push(BackendCall::CreatePanel { panel });
        panel
    }

    fn place_panel(&mut self, panel: PanelId, rect: Rect) {
        if let Some(state) = self.panels.get_mut(&panel) {
            state.rect = Some(rect);
            state.visible = true;
        }
        self.calls.push(BackendCall::PlacePanel { panel, rect });
    }

    fn hide_panel(&mut self, panel: PanelId) {
        if let Some(state) = self.panels.get_mut(&panel) {
            state.visible = false;
        }
        self.calls.push(BackendCall::HidePanel { panel });
    }

    fn draw_panel(&mut self, panel: PanelId, ops: Vec<DrawOp>) {
        self.calls.push(BackendCall::DrawPanel { panel, ops: ops.len() });
        if let Some(state) = self.panels.get_mut(&panel) {
            state.ops = ops;
        }
    }

    fn destroy_panel(&mut self, panel: PanelId) {
        self.panels.remove(&panel);
        self.calls.push(BackendCall::DestroyPanel { panel });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_windows_are_not_visible() {
        let mut core = HeadlessCore::new();
        core.place(WindowId(1), Rect::new(0, 0, 10, 10), 0);
        assert_eq!(core.placement(WindowId(1)), Some(Rect::new(0, 0, 10, 10)));
        core.hide(WindowId(1));
        assert!(!core.is_visible(WindowId(1)));
        core.place(WindowId(1), Rect::new(5, 5, 10, 10), 0);
        assert!(core.is_visible(WindowId(1)));
    }

    #[test]
    fn hooks_reach_the_channel() {
        let (tx, mut rx) = actor::channel();
        let mut core = HeadlessCore::with_hook_sender(tx);
        core.fire(HookEvent::FocusChange);
        core.fire(HookEvent::SetGroup);
        assert_eq!(actor::drain(&mut rx), vec![HookEvent::FocusChange, HookEvent::SetGroup]);
        assert_eq!(core.hook_count("focus_change"), 1);
    }
}
