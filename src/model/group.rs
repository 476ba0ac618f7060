//! A group is one workspace: its windows, a list of layouts with one in use,
//! the floating layer and the focus history.
//!
//! Every operation that can have visible effects takes the backend as
//! `&mut dyn Core`; the group never holds on to it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::screen::ScreenRef;
use super::window::{Window, WindowId, WindowInfo, WindowSet};
use crate::common::collections::BTreeSet;
use crate::common::config::{GroupConfig, GroupKind, Settings};
use crate::layout_engine::floating::FloatingLayout;
use crate::layout_engine::{LayoutCommand, LayoutError, LayoutSystem, LayoutSystemKind};
use crate::sys::backend::Core;
use crate::sys::hooks::HookEvent;

#[derive(Serialize, Deserialize)]
pub struct Group {
    name: String,
    label: Option<String>,
    kind: GroupKind,
    screen_affinity: Option<usize>,
    persist: bool,
    windows: WindowSet,
    tiled_windows: BTreeSet<WindowId>,
    /// Oldest first; the last entry is the current window.
    focus_history: Vec<WindowId>,
    layouts: Vec<LayoutSystemKind>,
    current_layout: usize,
    floating: FloatingLayout,
    screen: Option<ScreenRef>,
    last_focused: Option<WindowId>,
    settings: Settings,
}

impl Group {
    /// Builds a group with a fresh instance of every layout template.
    pub fn new(
        config: &GroupConfig,
        templates: &[LayoutSystemKind],
        floating: FloatingLayout,
        settings: Settings,
    ) -> Result<Self, LayoutError> {
        if templates.is_empty() {
            return Err(LayoutError::LayoutIndexOutOfRange { index: 0, len: 0 });
        }
        let layouts = templates.iter().map(|t| t.instantiate()).collect::<Result<Vec<_>, _>>()?;
        let current_layout = match &config.layout {
            Some(name) => layouts.iter().position(|l| l.name() == name).unwrap_or_else(|| {
                warn!(group = %config.name, "unknown layout {name:?}, using the first one");
                0
            }),
            None => 0,
        };
        Ok(Group {
            name: config.name.clone(),
            label: config.label.clone(),
            kind: config.kind,
            screen_affinity: config.screen_affinity,
            persist: config.persist,
            windows: WindowSet::new(),
            tiled_windows: BTreeSet::new(),
            focus_history: Vec::new(),
            layouts,
            current_layout,
            floating,
            screen: None,
            last_focused: None,
            settings,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    /// The label if set, otherwise the name.
    pub fn label(&self) -> &str { self.label.as_deref().unwrap_or(&self.name) }

    pub fn kind(&self) -> GroupKind { self.kind }

    pub fn screen_affinity(&self) -> Option<usize> { self.screen_affinity }

    pub fn persist(&self) -> bool { self.persist }

    pub fn windows(&self) -> &WindowSet { &self.windows }

    pub fn window(&self, wid: WindowId) -> Option<&Window> { self.windows.get(wid) }

    pub fn contains(&self, wid: WindowId) -> bool { self.windows.contains(wid) }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn tiled_windows(&self) -> &BTreeSet<WindowId> { &self.tiled_windows }

    pub fn focus_history(&self) -> &[WindowId] { &self.focus_history }

    pub fn current_window(&self) -> Option<WindowId> { self.focus_history.last().copied() }

    pub fn screen(&self) -> Option<ScreenRef> { self.screen }

    pub fn floating(&self) -> &FloatingLayout { &self.floating }

    pub fn layouts(&self) -> &[LayoutSystemKind] { &self.layouts }

    pub fn current_layout(&self) -> usize { self.current_layout }

    pub fn layout(&self) -> &LayoutSystemKind { &self.layouts[self.current_layout] }

    fn layout_mut(&mut self) -> &mut LayoutSystemKind { &mut self.layouts[self.current_layout] }

    fn on_active_screen(&self, core: &dyn Core) -> bool {
        self.screen.is_some_and(|s| core.current_screen() == Some(s.index))
    }

    /// Takes ownership of `window` and files it under the tiled layouts or
    /// the floating layer.
    pub fn add(&mut self, window: Window, force: bool, core: &mut dyn Core) {
        let wid = window.id;
        core.fire(HookEvent::GroupWindowAdd { group: self.name.clone(), window: wid });
        if self.windows.contains(wid) {
            debug!(group = %self.name, %wid, "window already in group");
            return;
        }
        self.windows.insert(window);
        let Some(w) = self.windows.get_mut(wid) else { return };
        if self.settings.auto_fullscreen && w.wants_to_fullscreen {
            w.fullscreen = true;
        } else if !w.fullscreen && self.floating.matches(w) {
            w.floating = true;
        }
        let (floating, fullscreen, steals) = (w.is_floating(), w.fullscreen, w.can_steal_focus);

        if floating && !fullscreen {
            self.floating.add_client(wid);
        } else {
            self.tiled_windows.insert(wid);
            for layout in &mut self.layouts {
                if let Some(w) = self.windows.get(wid) {
                    layout.add_client(w);
                }
            }
        }
        debug!(group = %self.name, %wid, floating, fullscreen, "window added");

        if steals {
            self.focus(Some(wid), true, force, core);
        } else {
            self.layout_all(false, false, core);
        }
        debug_assert_eq!(self.check_invariants(), Ok(()));
    }

    /// Releases `wid` and hands focus to the best remaining candidate.
    pub fn remove(&mut self, wid: WindowId, force: bool, core: &mut dyn Core) -> Option<Window> {
        if !self.windows.contains(wid) {
            return None;
        }
        core.fire(HookEvent::GroupWindowRemove { group: self.name.clone(), window: wid });

        let previous_win = if self.settings.focus_previous_on_window_remove {
            self.focus_history
                .iter()
                .position(|&w| w == wid)
                .filter(|&i| i > 0)
                .map(|i| self.focus_history[i - 1])
                .filter(|&p| self.windows.contains(p))
        } else {
            None
        };

        let window = self.windows.remove(wid)?;
        let had_focus = self.remove_from_focus_history(wid);

        let mut next = None;
        if window.is_floating() {
            let candidate = self.floating.remove(wid);
            next = previous_win
                .or(candidate)
                .or_else(|| self.current_window())
                .or_else(|| self.layout().focus_first())
                .or_else(|| self.floating.focus_first(&self.windows));
        }
        if !window.is_floating() || window.fullscreen {
            let current = self.current_layout;
            let mut candidate = None;
            for (i, layout) in self.layouts.iter_mut().enumerate() {
                let c = layout.remove(wid);
                if i == current {
                    candidate = c;
                }
            }
            next = previous_win
                .or(candidate)
                .or_else(|| self.floating.focus_first(&self.windows))
                .or_else(|| self.current_window())
                .or_else(|| self.layout().focus_first());
            self.tiled_windows.remove(&wid);
        }
        if self.last_focused == Some(wid) {
            self.last_focused = None;
        }
        debug!(group = %self.name, %wid, had_focus, next = ?next, "window removed");

        if had_focus {
            self.focus(next, true, force, core);
            if next.is_none() {
                core.fire(HookEvent::FocusChange);
            }
        } else if self.screen.is_some() {
            self.layout_all(false, true, core);
        }
        debug_assert_eq!(self.check_invariants(), Ok(()));
        Some(window)
    }

    /// Drops `wid` from the history; true if it was the current window.
    fn remove_from_focus_history(&mut self, wid: WindowId) -> bool {
        let Some(idx) = self.focus_history.iter().position(|&w| w == wid) else {
            return false;
        };
        self.focus_history.remove(idx);
        idx == self.focus_history.len()
    }

    pub fn focus(&mut self, win: Option<WindowId>, warp: bool, force: bool, core: &mut dyn Core) {
        if core.dragging() && !force {
            return;
        }
        let Some(wid) = win else {
            self.floating.blur();
            for layout in &mut self.layouts {
                layout.blur();
            }
            self.layout_all(false, true, core);
            return;
        };
        let Some(window) = self.windows.get(wid) else { return };
        let floating = window.is_floating();
        let warp = warp && self.last_focused != Some(wid);

        self.focus_history.retain(|&w| w != wid);
        self.focus_history.push(wid);
        self.last_focused = Some(wid);

        if floating {
            for layout in &mut self.layouts {
                layout.blur();
            }
            self.floating.focus(wid);
        } else {
            self.floating.blur();
            for layout in &mut self.layouts {
                layout.focus(wid);
            }
        }
        core.fire(HookEvent::FocusChange);
        self.layout_all(warp, true, core);
    }

    /// Positions every window of the group on its screen. Does nothing while
    /// the group is hidden or empty. With `focus` set the current window also
    /// gets input focus.
    pub fn layout_all(&mut self, warp: bool, focus: bool, core: &mut dyn Core) {
        let Some(screen) = self.screen else { return };
        if self.windows.is_empty() {
            return;
        }
        let mut normal = Vec::new();
        let mut floating = Vec::new();
        for w in self.windows.iter() {
            if !w.is_floating() {
                normal.push(w.id);
            } else if w.minimized {
                core.hide(w.id);
            } else {
                floating.push(w.id);
            }
        }
        if !normal.is_empty() {
            let layout = &mut self.layouts[self.current_layout];
            if let Err(e) = layout.layout(&self.windows, &normal, screen.rect, core) {
                error!(group = %self.name, layout = layout.name(), "layout failed: {e}");
            }
        }
        if !floating.is_empty() {
            self.floating.layout(&self.windows, &floating, screen.rect, core);
        }

        if !focus {
            return;
        }
        match self.current_window() {
            Some(current) if self.on_active_screen(core) => {
                core.focus_window(Some(current), warp && self.settings.cursor_warp);
            }
            _ => self.last_focused = None,
        }
    }

    /// Switches to layout `index`; negative values count from the end.
    pub fn use_layout(&mut self, index: i64, core: &mut dyn Core) -> Result<(), LayoutError> {
        let len = self.layouts.len();
        if index < -(len as i64) || index >= len as i64 {
            return Err(LayoutError::LayoutIndexOutOfRange { index, len });
        }
        self.layout_mut().hide(core);
        self.current_layout = index.rem_euclid(len as i64) as usize;
        core.fire(HookEvent::LayoutChange {
            group: self.name.clone(),
            layout: self.layout().name().to_string(),
        });
        self.layout_all(false, true, core);
        if let Some(screen) = self.screen {
            let layout = &mut self.layouts[self.current_layout];
            layout.show(&self.windows, screen.rect, core);
        }
        Ok(())
    }

    pub fn use_next_layout(&mut self, core: &mut dyn Core) {
        let next = (self.current_layout + 1) % self.layouts.len();
        // In range by construction.
        _ = self.use_layout(next as i64, core);
    }

    pub fn use_previous_layout(&mut self, core: &mut dyn Core) {
        let len = self.layouts.len();
        _ = self.use_layout(((self.current_layout + len - 1) % len) as i64, core);
    }

    pub fn set_layout_by_name(&mut self, name: &str, core: &mut dyn Core) {
        match self.layouts.iter().position(|l| l.name() == name) {
            Some(idx) => {
                _ = self.use_layout(idx as i64, core);
            }
            None => warn!(group = %self.name, "no layout named {name:?}"),
        }
    }

    /// Moves a window between the tiled layouts and the floating layer.
    ///
    /// Floating a window the floating layer already holds only relayouts;
    /// un-floating always clears it from the floating layer.
    pub fn mark_floating(&mut self, wid: WindowId, floating: bool, core: &mut dyn Core) {
        let is_current = self.current_window() == Some(wid);
        let Some(window) = self.windows.get_mut(wid) else { return };
        window.floating = floating;
        let fullscreen = window.fullscreen;

        if floating {
            if !self.floating.contains(wid) && !fullscreen {
                self.tiled_windows.remove(&wid);
                for layout in &mut self.layouts {
                    layout.remove(wid);
                    if is_current {
                        layout.blur();
                    }
                }
                let previous = self.floating.focused();
                self.floating.add_client(wid);
                match (is_current, previous) {
                    (true, _) => self.floating.focus(wid),
                    (false, Some(p)) => self.floating.focus(p),
                    (false, None) => self.floating.blur(),
                }
            }
        } else {
            self.floating.remove(wid);
            self.floating.blur();
            if self.tiled_windows.insert(wid) {
                for layout in &mut self.layouts {
                    if let Some(w) = self.windows.get(wid) {
                        layout.add_client(w);
                    }
                }
            }
            if is_current {
                for layout in &mut self.layouts {
                    layout.focus(wid);
                }
            }
        }
        self.layout_all(false, true, core);
        debug_assert_eq!(self.check_invariants(), Ok(()));
    }

    /// Focuses the next window of the current layer, moving on to the other
    /// layer once this one is exhausted.
    pub fn next_window(&mut self, core: &mut dyn Core) {
        if self.windows.is_empty() {
            return;
        }
        let next = match self.current_window().and_then(|c| self.windows.get(c)) {
            Some(cur) if cur.is_floating() => self
                .floating
                .focus_next(&self.windows, cur.id)
                .or_else(|| self.layout().focus_first())
                .or_else(|| self.floating.focus_first(&self.windows)),
            Some(cur) => self
                .layout()
                .focus_next(cur.id)
                .or_else(|| self.floating.focus_first(&self.windows))
                .or_else(|| self.layout().focus_first()),
            None => self.layout().focus_first().or_else(|| self.floating.focus_first(&self.windows)),
        };
        self.focus(next, true, false, core);
    }

    pub fn prev_window(&mut self, core: &mut dyn Core) {
        if self.windows.is_empty() {
            return;
        }
        let prev = match self.current_window().and_then(|c| self.windows.get(c)) {
            Some(cur) if cur.is_floating() => self
                .floating
                .focus_previous(&self.windows, cur.id)
                .or_else(|| self.layout().focus_last())
                .or_else(|| self.floating.focus_last(&self.windows)),
            Some(cur) => self
                .layout()
                .focus_previous(cur.id)
                .or_else(|| self.floating.focus_last(&self.windows))
                .or_else(|| self.layout().focus_last()),
            None => self.layout().focus_last().or_else(|| self.floating.focus_last(&self.windows)),
        };
        self.focus(prev, true, false, core);
    }

    fn neighbour<'a>(
        &self,
        groups: &'a [Group],
        forward: bool,
        skip_empty: bool,
        skip_managed: bool,
    ) -> Option<&'a Group> {
        // The calling group always stays in the walk, even a scratchpad.
        let candidates: Vec<&Group> = groups
            .iter()
            .filter(|g| {
                g.name == self.name
                    || (g.kind != GroupKind::ScratchPad
                        && (!skip_empty || !g.is_empty())
                        && (!skip_managed || g.screen.is_none()))
            })
            .collect();
        let idx = candidates.iter().position(|g| g.name == self.name)?;
        let len = candidates.len();
        let target = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        Some(candidates[target])
    }

    pub fn get_next_group<'a>(
        &self,
        groups: &'a [Group],
        skip_empty: bool,
        skip_managed: bool,
    ) -> Option<&'a Group> {
        self.neighbour(groups, true, skip_empty, skip_managed)
    }

    pub fn get_previous_group<'a>(
        &self,
        groups: &'a [Group],
        skip_empty: bool,
        skip_managed: bool,
    ) -> Option<&'a Group> {
        self.neighbour(groups, false, skip_empty, skip_managed)
    }

    /// Binds the group to `screen`, or hides it when `None`.
    pub fn set_screen(&mut self, screen: Option<ScreenRef>, warp: bool, core: &mut dyn Core) {
        if screen == self.screen {
            return;
        }
        let Some(new) = screen else {
            self.hide(core);
            return;
        };
        self.screen = Some(new);
        self.floating.to_screen(&mut self.windows, new.rect);
        self.layout_all(warp && self.settings.cursor_warp, true, core);
        let layout = &mut self.layouts[self.current_layout];
        layout.show(&self.windows, new.rect, core);
    }

    /// Pushes the whole group to the backend again, e.g. after a restore.
    pub fn redraw(&mut self, core: &mut dyn Core) {
        let Some(screen) = self.screen else { return };
        self.layout_all(false, true, core);
        let layout = &mut self.layouts[self.current_layout];
        layout.show(&self.windows, screen.rect, core);
        self.floating.show(&self.windows, screen.rect, core);
    }

    pub fn hide(&mut self, core: &mut dyn Core) {
        self.screen = None;
        for wid in self.windows.ids() {
            core.hide(wid);
        }
        self.floating.hide(core);
        self.layout_mut().hide(core);
    }

    pub fn info(&self) -> Value {
        let names = |ids: &mut dyn Iterator<Item = WindowId>| -> Vec<String> {
            ids.map(|w| self.windows.name_of(w).to_owned()).collect()
        };
        json!({
            "name": self.name,
            "label": self.label(),
            "kind": self.kind,
            "focus": self.current_window().map(|w| self.windows.name_of(w)),
            "windows": names(&mut self.windows.ids()),
            "tiled_windows": names(&mut self.tiled_windows.iter().copied()),
            "focus_history": names(&mut self.focus_history.iter().copied()),
            "layout": self.layout().name(),
            "layouts": self.layouts.iter().map(|l| l.name()).collect::<Vec<_>>(),
            "floating_info": self.floating.info(&self.windows),
            "screen": self.screen.map(|s| s.index),
        })
    }

    /// Info for one layout, defaulting to the one in use.
    pub fn layout_info(&self, index: Option<usize>) -> Result<Value, LayoutError> {
        let layout = self.layout_at(index)?;
        let mut info = layout.info(&self.windows);
        if let Value::Object(map) = &mut info {
            map.insert("group".into(), json!(self.name));
        }
        Ok(info)
    }

    pub fn layout_at(&self, index: Option<usize>) -> Result<&LayoutSystemKind, LayoutError> {
        let idx = index.unwrap_or(self.current_layout);
        self.layouts.get(idx).ok_or(LayoutError::LayoutIndexOutOfRange {
            index: idx as i64,
            len: self.layouts.len(),
        })
    }

    pub fn draw_tree(&self) -> String { self.layout().draw_tree(&self.windows) }

    pub fn set_label(&mut self, label: Option<String>, core: &mut dyn Core) {
        self.label = label;
        core.fire(HookEvent::ChangeGroup);
    }

    pub fn unminimize_all(&mut self, core: &mut dyn Core) {
        let mut changed = false;
        for w in self.windows.iter_mut().filter(|w| w.minimized) {
            w.minimized = false;
            changed = true;
        }
        if changed {
            self.layout_all(false, true, core);
        }
    }

    /// Focuses the window that had focus before the current one.
    pub fn focus_back(&mut self, core: &mut dyn Core) {
        let len = self.focus_history.len();
        if len >= 2 {
            let win = self.focus_history[len - 2];
            self.focus(Some(win), true, false, core);
        }
    }

    pub fn focus_by_name(&mut self, name: &str, core: &mut dyn Core) {
        if let Some(wid) = self.windows.find_by_name(name).map(|w| w.id) {
            self.focus(Some(wid), true, false, core);
        }
    }

    pub fn info_by_name(&self, name: &str) -> Option<WindowInfo> {
        self.windows.find_by_name(name).map(|w| w.info(Some(&self.name)))
    }

    pub fn focus_by_index(&mut self, index: usize, core: &mut dyn Core) {
        if let Some(wid) = self.windows.at(index).map(|w| w.id) {
            self.focus(Some(wid), true, false, core);
        }
    }

    /// Swaps the current window with the window at `new_location` in the
    /// group's window order.
    pub fn swap_window_order(&mut self, new_location: usize) {
        let Some(current) = self.current_window() else { return };
        if new_location >= self.windows.len() {
            return;
        }
        if let Some(idx) = self.windows.position(current) {
            self.windows.swap(idx, new_location);
        }
    }

    /// Runs a command on layout `index` (the current one by default) and
    /// applies the focus change or relayout it asks for.
    pub fn handle_layout_command(
        &mut self,
        index: Option<usize>,
        command: LayoutCommand,
        core: &mut dyn Core,
    ) -> Result<(), LayoutError> {
        let idx = index.unwrap_or(self.current_layout);
        let len = self.layouts.len();
        let layout = self
            .layouts
            .get_mut(idx)
            .ok_or(LayoutError::LayoutIndexOutOfRange { index: idx as i64, len })?;
        let response = layout.handle_command(command, &self.windows, core)?;
        if let Some(target) = response.focus {
            self.focus(Some(target), false, false, core);
        }
        if response.relayout {
            self.layout_all(false, true, core);
        }
        Ok(())
    }

    /// A click at panel-local `(x, y)` on the current layout's panel.
    pub fn button_press(&mut self, x: i32, y: i32, core: &mut dyn Core) {
        if let Some(wid) = self.layout().button_press(x, y) {
            self.focus(Some(wid), false, false, core);
        }
    }

    /// Records new window properties and lets the layouts redraw.
    pub fn update_window(
        &mut self,
        wid: WindowId,
        name: Option<String>,
        urgent: Option<bool>,
        core: &mut dyn Core,
    ) {
        let Some(window) = self.windows.get_mut(wid) else { return };
        if let Some(name) = name {
            window.name = name;
            core.fire(HookEvent::ClientNameUpdated { window: wid });
        }
        if let Some(urgent) = urgent {
            window.urgent = urgent;
        }
        if self.screen.is_some() {
            let layout = &mut self.layouts[self.current_layout];
            layout.refresh(&self.windows, core);
        }
    }

    /// Releases backend resources held by the layouts before the group is
    /// dropped.
    pub fn finalize(&mut self, core: &mut dyn Core) {
        for layout in &mut self.layouts {
            layout.finalize(core);
        }
    }

    /// Checks the membership invariants between the window set, the focus
    /// history, the tiled set and the layers.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for &wid in &self.focus_history {
            if !self.windows.contains(wid) {
                return Err(format!("{wid} in focus history but not in the group"));
            }
            if !seen.insert(wid) {
                return Err(format!("{wid} appears twice in the focus history"));
            }
        }
        for &wid in &self.tiled_windows {
            if !self.windows.contains(wid) {
                return Err(format!("tiled window {wid} is not in the group"));
            }
        }
        for w in self.windows.iter() {
            let tiled = self.tiled_windows.contains(&w.id);
            let floating = self.floating.contains(w.id);
            if w.fullscreen {
                continue;
            }
            if tiled == floating {
                return Err(format!(
                    "{} must be in exactly one layer (tiled: {tiled}, floating: {floating})",
                    w.id
                ));
            }
            if tiled && !self.layouts.iter().all(|l| l.contains(w.id)) {
                return Err(format!("tiled window {} is missing from a layout", w.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::common::config::{FloatRule, FloatingConfig, LayoutConfig, MaxSettings, TreeTabSettings};
    use crate::sys::geometry::Rect;
    use crate::sys::headless::{BackendCall, HeadlessCore};

    fn w(n: u32) -> WindowId { WindowId(n) }

    fn templates() -> Vec<LayoutSystemKind> {
        [
            LayoutConfig::TreeTab(TreeTabSettings::default()),
            LayoutConfig::Max(MaxSettings::default()),
        ]
        .iter()
        .map(|c| LayoutSystemKind::from_config(c).unwrap())
        .collect()
    }

    fn group_with(settings: Settings, rules: Vec<FloatRule>) -> Group {
        let floating = FloatingLayout::new(&FloatingConfig { rules, ..Default::default() });
        Group::new(&GroupConfig::named("g"), &templates(), floating, settings).unwrap()
    }

    fn group() -> Group { group_with(Settings::default(), vec![]) }

    fn screen() -> ScreenRef { ScreenRef { index: 0, rect: Rect::new(0, 0, 1000, 800) } }

    fn shown() -> (Group, HeadlessCore) {
        let mut g = group();
        let mut core = HeadlessCore::new();
        g.set_screen(Some(screen()), false, &mut core);
        (g, core)
    }

    fn add(g: &mut Group, core: &mut HeadlessCore, id: u32, name: &str) {
        g.add(Window::new(w(id), name), false, core);
    }

    fn history(g: &Group) -> Vec<&str> {
        g.focus_history().iter().map(|&wid| g.windows().name_of(wid)).collect()
    }

    fn abc() -> (Group, HeadlessCore) {
        let (mut g, mut core) = shown();
        add(&mut g, &mut core, 1, "A");
        add(&mut g, &mut core, 2, "B");
        add(&mut g, &mut core, 3, "C");
        (g, core)
    }

    #[test]
    fn added_windows_steal_focus_in_order() {
        let (g, core) = abc();
        assert_eq!(history(&g), vec!["A", "B", "C"]);
        assert_eq!(g.current_window(), Some(w(3)));
        assert_eq!(core.focused, Some(w(3)));
        assert_eq!(core.hook_count("group_window_add"), 3);
        assert_eq!(g.tiled_windows().len(), 3);
    }

    #[test]
    fn prev_window_twice_reaches_the_first_window() {
        let (mut g, mut core) = abc();
        g.prev_window(&mut core);
        g.prev_window(&mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        assert_eq!(history(&g), vec!["C", "B", "A"]);
    }

    #[test]
    fn focus_by_name_moves_window_to_end_of_history() {
        let (mut g, mut core) = abc();
        g.focus_by_name("B", &mut core);
        assert_eq!(history(&g), vec!["A", "C", "B"]);
        g.focus_by_name("nope", &mut core);
        assert_eq!(history(&g), vec!["A", "C", "B"]);
    }

    #[test]
    fn next_window_wraps_within_the_tiled_layer() {
        let (mut g, mut core) = abc();
        g.next_window(&mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        g.next_window(&mut core);
        assert_eq!(g.current_window(), Some(w(2)));
    }

    #[test]
    fn navigation_moves_between_layers_without_interleaving() {
        let (mut g, mut core) = abc();
        let mut float = Window::new(w(4), "F");
        float.floating = true;
        g.add(float, false, &mut core);
        assert_eq!(g.floating().clients(), &[w(4)]);
        assert!(!g.tiled_windows().contains(&w(4)));

        // From the floating window, next goes to the first tiled window.
        g.next_window(&mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        g.focus(Some(w(3)), true, false, &mut core);
        g.next_window(&mut core);
        assert_eq!(g.current_window(), Some(w(4)));
        g.prev_window(&mut core);
        assert_eq!(g.current_window(), Some(w(3)));
    }

    #[test]
    fn removing_the_focused_window_fires_one_focus_change() {
        let (mut g, mut core) = shown();
        add(&mut g, &mut core, 1, "A");
        core.clear();
        let removed = g.remove(w(1), false, &mut core).unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(core.hook_count("focus_change"), 1);
        assert_eq!(core.hook_count("group_window_remove"), 1);
        assert_eq!(g.current_window(), None);
        assert!(g.is_empty());
    }

    #[test]
    fn removing_a_background_window_keeps_focus() {
        let (mut g, mut core) = abc();
        core.clear();
        g.remove(w(1), false, &mut core);
        assert_eq!(g.current_window(), Some(w(3)));
        assert_eq!(core.hook_count("focus_change"), 0);
        assert_eq!(history(&g), vec!["B", "C"]);
    }

    #[test]
    fn removal_focus_falls_back_to_layout_first() {
        let (mut g, mut core) = abc();
        g.remove(w(3), false, &mut core);
        // The tree tab layout offers no candidate; the remaining history wins.
        assert_eq!(g.current_window(), Some(w(2)));
    }

    #[test]
    fn removal_can_prefer_the_previous_window() {
        let settings = Settings { focus_previous_on_window_remove: true, ..Default::default() };
        let mut g = group_with(settings, vec![]);
        let mut core = HeadlessCore::new();
        g.set_screen(Some(screen()), false, &mut core);
        for (id, name) in [(1, "A"), (2, "B"), (3, "C")] {
            add(&mut g, &mut core, id, name);
        }
        g.focus(Some(w(1)), true, false, &mut core);
        g.focus(Some(w(3)), true, false, &mut core);
        // History is now B, A, C.
        g.remove(w(3), false, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));

        // The oldest entry has no predecessor.
        g.remove(w(2), false, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));
    }

    #[test]
    fn float_rules_and_fullscreen_classification() {
        let rules = vec![FloatRule { wm_class: Some("dialog".into()), ..Default::default() }];
        let mut g = group_with(Settings::default(), rules);
        let mut core = HeadlessCore::new();
        g.set_screen(Some(screen()), false, &mut core);

        g.add(Window::new(w(1), "d").with_class("dialog"), false, &mut core);
        let mut fs = Window::new(w(2), "video").with_class("dialog");
        fs.wants_to_fullscreen = true;
        g.add(fs, false, &mut core);

        assert!(g.window(w(1)).unwrap().floating);
        assert!(g.floating().contains(w(1)));
        let fs = g.window(w(2)).unwrap();
        assert!(fs.fullscreen && !fs.floating);
        assert!(g.tiled_windows().contains(&w(2)));
        assert_eq!(core.placement(w(2)), Some(screen().rect));
        g.check_invariants().unwrap();
    }

    #[test]
    fn windows_that_cannot_steal_focus_are_only_laid_out() {
        let (mut g, mut core) = abc();
        core.clear();
        let mut quiet = Window::new(w(4), "quiet");
        quiet.can_steal_focus = false;
        g.add(quiet, false, &mut core);
        assert_eq!(g.current_window(), Some(w(3)));
        assert!(g.layout().contains(w(4)));
        assert!(!core.calls.iter().any(|c| matches!(c, BackendCall::Focus { .. })));
        assert_eq!(core.hook_count("focus_change"), 0);
    }

    #[test]
    fn quiet_windows_on_an_inactive_screen_keep_last_focused() {
        let (mut g, mut core) = abc();
        core.current_screen = Some(1);
        let mut quiet = Window::new(w(4), "quiet");
        quiet.can_steal_focus = false;
        g.add(quiet, false, &mut core);
        assert_eq!(g.last_focused, Some(w(3)));
    }

    #[test]
    fn re_adding_a_member_only_fires_the_hook() {
        let (mut g, mut core) = abc();
        core.clear();
        add(&mut g, &mut core, 2, "B");
        assert_eq!(core.hook_count("group_window_add"), 1);
        assert_eq!(g.windows().len(), 3);
        assert_eq!(history(&g), vec!["A", "B", "C"]);
        g.check_invariants().unwrap();
    }

    #[test]
    fn failing_layout_still_places_floating_windows() {
        let wide = TreeTabSettings { panel_width: 2000, ..TreeTabSettings::default() };
        let templates = vec![LayoutSystemKind::from_config(&LayoutConfig::TreeTab(wide)).unwrap()];
        let floating = FloatingLayout::new(&FloatingConfig::default());
        let mut g =
            Group::new(&GroupConfig::named("g"), &templates, floating, Settings::default()).unwrap();
        let mut core = HeadlessCore::new();
        g.set_screen(Some(screen()), false, &mut core);

        add(&mut g, &mut core, 1, "A");
        let mut float = Window::new(w(2), "F");
        float.floating = true;
        g.add(float, false, &mut core);

        assert!(core.placement(w(1)).is_none());
        assert!(core.is_visible(w(2)));
        assert_eq!(core.focused, Some(w(2)));

        g.focus(Some(w(1)), true, false, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        assert_eq!(core.focused, Some(w(1)));
    }

    #[test]
    fn use_layout_bounds() {
        let (mut g, mut core) = abc();
        assert_eq!(
            g.use_layout(2, &mut core),
            Err(LayoutError::LayoutIndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            g.use_layout(-3, &mut core),
            Err(LayoutError::LayoutIndexOutOfRange { index: -3, len: 2 })
        );
        assert_eq!(g.current_layout(), 0);
        assert_eq!(core.hook_count("layout_change"), 0);

        g.use_layout(-1, &mut core).unwrap();
        assert_eq!(g.layout().name(), "max");
        assert_eq!(core.hook_count("layout_change"), 1);
        // The tree tab panel went away with its layout.
        assert!(core.visible_panel().is_none());
        assert_eq!(core.placement(w(3)), Some(screen().rect));

        g.use_next_layout(&mut core);
        assert_eq!(g.layout().name(), "treetab");
        g.set_layout_by_name("max", &mut core);
        assert_eq!(g.current_layout(), 1);
        g.set_layout_by_name("columns", &mut core);
        assert_eq!(g.current_layout(), 1);
    }

    #[test]
    fn mark_floating_round_trip() {
        let (mut g, mut core) = abc();
        g.mark_floating(w(3), true, &mut core);
        assert!(g.floating().contains(w(3)));
        assert!(!g.layout().contains(w(3)));
        assert_eq!(g.floating().focused(), Some(w(3)));
        // Already floating: nothing moves.
        g.mark_floating(w(3), true, &mut core);
        assert_eq!(g.floating().clients(), &[w(3)]);

        g.mark_floating(w(3), false, &mut core);
        assert!(!g.floating().contains(w(3)));
        assert!(g.layouts().iter().all(|l| l.contains(w(3))));
        assert_eq!(g.layout().focused(), Some(w(3)));
        g.check_invariants().unwrap();
    }

    #[test]
    fn floating_a_background_window_keeps_floating_focus() {
        let (mut g, mut core) = abc();
        let mut float = Window::new(w(4), "F");
        float.floating = true;
        g.add(float, false, &mut core);
        assert_eq!(g.floating().focused(), Some(w(4)));

        g.mark_floating(w(1), true, &mut core);
        assert_eq!(g.current_window(), Some(w(4)));
        assert_eq!(g.floating().focused(), Some(w(4)));
        assert_eq!(g.floating().clients(), &[w(4), w(1)]);

        // With a tiled window current, the floating layer stays blurred.
        g.focus(Some(w(2)), true, false, &mut core);
        g.mark_floating(w(3), true, &mut core);
        assert_eq!(g.floating().focused(), None);
        g.check_invariants().unwrap();
    }

    #[test]
    fn group_cycling_skips_scratchpads() {
        let floating = || FloatingLayout::new(&FloatingConfig::default());
        let mk = |name: &str, kind| {
            let config = GroupConfig { kind, ..GroupConfig::named(name) };
            Group::new(&config, &templates(), floating(), Settings::default()).unwrap()
        };
        let mut core = HeadlessCore::new();
        let mut groups = vec![
            mk("a", GroupKind::Normal),
            mk("b", GroupKind::Normal),
            mk("s", GroupKind::ScratchPad),
            mk("c", GroupKind::Normal),
        ];
        groups[3].add(Window::new(w(1), "x"), false, &mut core);
        groups[1].set_screen(Some(screen()), false, &mut core);

        let name = |g: Option<&Group>| g.map(|g| g.name().to_owned());
        assert_eq!(name(groups[0].get_next_group(&groups, false, false)), Some("b".into()));
        assert_eq!(name(groups[0].get_previous_group(&groups, false, false)), Some("c".into()));
        assert_eq!(name(groups[0].get_next_group(&groups, true, false)), Some("c".into()));
        assert_eq!(name(groups[0].get_next_group(&groups, false, true)), Some("c".into()));
        assert_eq!(name(groups[3].get_next_group(&groups, true, false)), Some("c".into()));
        // Walking from a scratchpad still works; it just never lands on one.
        assert_eq!(name(groups[2].get_next_group(&groups, false, false)), Some("c".into()));
        assert_eq!(name(groups[2].get_previous_group(&groups, false, false)), Some("b".into()));
    }

    #[test]
    fn hidden_groups_do_not_lay_out() {
        let mut g = group();
        let mut core = HeadlessCore::new();
        add(&mut g, &mut core, 1, "A");
        assert!(core.placed.is_empty());
        assert_eq!(g.current_window(), Some(w(1)));

        g.set_screen(Some(screen()), false, &mut core);
        assert!(core.is_visible(w(1)));
        g.set_screen(None, false, &mut core);
        assert!(!core.is_visible(w(1)));
        assert!(core.visible_panel().is_none());
        assert_eq!(g.screen(), None);
    }

    #[test]
    fn focus_is_ignored_while_dragging() {
        let (mut g, mut core) = abc();
        core.dragging = true;
        g.focus(Some(w(1)), true, false, &mut core);
        assert_eq!(g.current_window(), Some(w(3)));
        g.focus(Some(w(1)), true, true, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));
    }

    #[test]
    fn misc_commands() {
        let (mut g, mut core) = abc();
        g.focus_back(&mut core);
        assert_eq!(g.current_window(), Some(w(2)));

        g.focus_by_index(0, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        g.focus_by_index(7, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));

        g.swap_window_order(2);
        assert_eq!(g.windows().ids().collect::<Vec<_>>(), vec![w(3), w(2), w(1)]);

        assert_eq!(g.info_by_name("B").map(|i| i.group), Some(Some("g".to_owned())));
        assert!(g.info_by_name("Z").is_none());

        g.set_label(Some("web".into()), &mut core);
        assert_eq!(g.label(), "web");
        assert_eq!(core.hook_count("changegroup"), 1);

        let info = g.info();
        assert_eq!(info["focus"], json!("A"));
        assert_eq!(info["layouts"], json!(["treetab", "max"]));
        assert_eq!(info["screen"], json!(0));
    }

    #[test]
    fn unminimize_all_shows_floating_windows_again() {
        let (mut g, mut core) = shown();
        let mut float = Window::new(w(1), "F");
        float.floating = true;
        float.minimized = true;
        g.add(float, false, &mut core);
        assert!(!core.is_visible(w(1)));
        g.unminimize_all(&mut core);
        assert!(core.is_visible(w(1)));
    }

    #[test]
    fn layout_commands_apply_their_response() {
        let (mut g, mut core) = abc();
        g.handle_layout_command(None, LayoutCommand::Next, &mut core).unwrap();
        assert_eq!(g.current_window(), Some(w(1)));
        assert_eq!(core.placement(w(1)), Some(Rect::new(150, 0, 850, 800)));

        g.handle_layout_command(None, LayoutCommand::IncreaseRatio, &mut core).unwrap();
        assert_eq!(core.placement(w(1)), Some(Rect::new(160, 0, 840, 800)));

        assert_eq!(
            g.handle_layout_command(Some(1), LayoutCommand::MoveUp, &mut core),
            Err(LayoutError::UnsupportedCommand { layout: "max", command: "move_up" })
        );
        assert!(matches!(
            g.handle_layout_command(Some(5), LayoutCommand::Next, &mut core),
            Err(LayoutError::LayoutIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn panel_clicks_focus_windows() {
        let (mut g, mut core) = abc();
        // Rows start below the 19 pixel section header and are 22 pixels tall.
        g.button_press(10, 20, &mut core);
        assert_eq!(g.current_window(), Some(w(1)));
        g.button_press(10, 45, &mut core);
        assert_eq!(g.current_window(), Some(w(2)));
    }

    #[test]
    fn history_stays_consistent_under_churn() {
        let (mut g, mut core) = shown();
        let mut seed = 7u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (seed >> 16) % 8
        };
        for step in 0..200 {
            let id = next() + 1;
            match next() % 3 {
                0 => {
                    let mut win = Window::new(w(id), format!("w{id}"));
                    win.floating = step % 5 == 0;
                    win.can_steal_focus = step % 7 != 0;
                    g.add(win, false, &mut core);
                }
                1 => {
                    g.remove(w(id), false, &mut core);
                }
                _ => g.focus(Some(w(id)), true, false, &mut core),
            }
            g.check_invariants().unwrap();
            let history = g.focus_history();
            assert!(history.iter().all(|&wid| g.contains(wid)));
            let unique: BTreeSet<_> = history.iter().collect();
            assert_eq!(unique.len(), history.len());
        }
    }
}
