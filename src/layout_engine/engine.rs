use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{EngineError, FloatingLayout, LayoutSystem, LayoutSystemKind};
use crate::common::config::{Config, FloatingConfig, GroupConfig, GroupKind, Settings};
use crate::model::group::Group;
use crate::model::screen::Screen;
use crate::model::window::{Window, WindowId};
use crate::sys::backend::Core;
use crate::sys::geometry::Rect;
use crate::sys::hooks::HookEvent;

/// Things the backend tells the core about.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEvent {
    /// The full set of outputs, in screen index order.
    ScreensChanged(Vec<Rect>),
    ScreenFocused(usize),
    /// A new client; `group` defaults to the group on the current screen.
    WindowAdded {
        window: Window,
        #[serde(default)]
        group: Option<String>,
    },
    WindowRemoved(WindowId),
    WindowFocused(WindowId),
    WindowUpdated {
        id: WindowId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        urgent: Option<bool>,
    },
    /// A click on a layout panel, in panel coordinates.
    PanelClicked { group: String, x: i32, y: i32 },
}

/// Owns every group and screen and routes backend events to them.
#[derive(Serialize, Deserialize)]
pub struct LayoutEngine {
    groups: Vec<Group>,
    screens: Vec<Screen>,
    current_screen: usize,
    templates: Vec<LayoutSystemKind>,
    floating: FloatingConfig,
    settings: Settings,
}

impl LayoutEngine {
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let templates = config
            .layouts
            .iter()
            .map(LayoutSystemKind::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        let mut engine = LayoutEngine {
            groups: Vec::new(),
            screens: Vec::new(),
            current_screen: 0,
            templates,
            floating: config.floating.clone(),
            settings: config.settings.clone(),
        };
        for group in &config.groups {
            let group = engine.build_group(group)?;
            engine.groups.push(group);
        }
        Ok(engine)
    }

    fn build_group(&self, config: &GroupConfig) -> Result<Group, EngineError> {
        let floating = FloatingLayout::new(&self.floating);
        Ok(Group::new(config, &self.templates, floating, self.settings.clone())?)
    }

    pub fn groups(&self) -> &[Group] { &self.groups }

    pub fn screens(&self) -> &[Screen] { &self.screens }

    pub fn current_screen(&self) -> usize { self.current_screen }

    pub fn group(&self, name: &str) -> Option<&Group> { self.groups.iter().find(|g| g.name() == name) }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name() == name)
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name() == name)
    }

    fn require_group(&self, name: &str) -> Result<usize, EngineError> {
        self.group_index(name).ok_or_else(|| EngineError::NoSuchGroup(name.to_owned()))
    }

    fn current_group_index(&self) -> Option<usize> {
        let name = self.screens.get(self.current_screen)?.group.as_deref()?;
        self.group_index(name)
    }

    /// The group shown on the focused screen.
    pub fn current_group(&self) -> Option<&Group> {
        self.current_group_index().map(|i| &self.groups[i])
    }

    pub fn current_group_mut(&mut self) -> Option<&mut Group> {
        self.current_group_index().map(|i| &mut self.groups[i])
    }

    /// The group owning `wid`.
    pub fn window_group(&self, wid: WindowId) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(wid))
    }

    fn window_group_index(&self, wid: WindowId) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(wid))
    }

    pub fn handle_event(&mut self, event: LayoutEvent, core: &mut dyn Core) {
        debug!(?event, "layout event");
        match event {
            LayoutEvent::ScreensChanged(rects) => self.set_screens(rects, core),
            LayoutEvent::ScreenFocused(index) => {
                if let Err(e) = self.focus_screen(index, true, core) {
                    warn!("ignoring screen focus: {e}");
                }
            }
            LayoutEvent::WindowAdded { window, group } => self.add_window(window, group, core),
            LayoutEvent::WindowRemoved(wid) => match self.window_group_index(wid) {
                Some(g) => {
                    self.groups[g].remove(wid, false, core);
                    self.drop_if_vacant(g, core);
                }
                None => debug!(%wid, "removed window is not managed"),
            },
            LayoutEvent::WindowFocused(wid) => self.focus_window(wid, core),
            LayoutEvent::WindowUpdated { id, name, urgent } => match self.window_group_index(id) {
                Some(g) => self.groups[g].update_window(id, name, urgent, core),
                None => debug!(%id, "update for unmanaged window"),
            },
            LayoutEvent::PanelClicked { group, x, y } => match self.group_index(&group) {
                Some(g) => self.groups[g].button_press(x, y, core),
                None => debug!(%group, "click on a panel of an unknown group"),
            },
        }
    }

    fn add_window(&mut self, window: Window, group: Option<String>, core: &mut dyn Core) {
        if let Some(owner) = self.window_group(window.id) {
            warn!(wid = %window.id, group = owner.name(), "window is already managed");
            return;
        }
        let target = match group {
            Some(name) => self.group_index(&name),
            None => self.current_group_index(),
        };
        match target {
            Some(g) => self.groups[g].add(window, false, core),
            None => warn!(wid = %window.id, "no group to put the window in"),
        }
    }

    fn focus_window(&mut self, wid: WindowId, core: &mut dyn Core) {
        let Some(g) = self.window_group_index(wid) else {
            debug!(%wid, "focus on unmanaged window");
            return;
        };
        match self.groups[g].screen() {
            Some(screen) if screen.index != self.current_screen => {
                self.current_screen = screen.index;
                core.focus_screen(screen.index);
                core.fire(HookEvent::CurrentScreenChange);
            }
            Some(_) => {}
            None if self.current_screen < self.screens.len() => {
                self.set_screen_group(self.current_screen, g, true, false, core);
            }
            None => {}
        }
        self.groups[g].focus(Some(wid), false, false, core);
    }

    /// Replaces the set of screens. Surviving screens keep their groups;
    /// new screens get a free group, preferring one with affinity for them.
    pub fn set_screens(&mut self, rects: Vec<Rect>, core: &mut dyn Core) {
        if self.screens.len() > rects.len() {
            for screen in self.screens.split_off(rects.len()) {
                if let Some(g) = screen.group.as_deref().and_then(|n| self.group_index(n)) {
                    self.groups[g].set_screen(None, false, core);
                }
            }
        }
        for (index, rect) in rects.into_iter().enumerate() {
            if index < self.screens.len() {
                self.screens[index].rect = rect;
                let binding = self.screens[index].binding();
                let shown = self.screens[index].group.clone();
                if let Some(g) = shown.and_then(|n| self.group_index(&n)) {
                    self.groups[g].set_screen(Some(binding), false, core);
                }
                continue;
            }
            self.screens.push(Screen::new(index, rect));
            match self.free_group_for(index) {
                Some(g) => self.set_screen_group(index, g, false, false, core),
                None => warn!(screen = index, "no free group for screen"),
            }
        }
        if self.current_screen >= self.screens.len() {
            self.current_screen = 0;
        }
        info!(screens = self.screens.len(), "screens configured");
    }

    fn free_group_for(&self, index: usize) -> Option<usize> {
        let free = |g: &Group| g.screen().is_none() && g.kind() != GroupKind::ScratchPad;
        self.groups
            .iter()
            .position(|g| free(g) && g.screen_affinity() == Some(index))
            .or_else(|| self.groups.iter().position(|g| free(g) && g.screen_affinity().is_none()))
            .or_else(|| self.groups.iter().position(free))
    }

    pub fn focus_screen(
        &mut self,
        index: usize,
        warp: bool,
        core: &mut dyn Core,
    ) -> Result<(), EngineError> {
        if index >= self.screens.len() {
            return Err(EngineError::NoSuchScreen(index));
        }
        if index == self.current_screen && core.current_screen() == Some(index) {
            return Ok(());
        }
        self.current_screen = index;
        core.focus_screen(index);
        core.fire(HookEvent::CurrentScreenChange);
        if let Some(g) = self.current_group_index()
            && let Some(current) = self.groups[g].current_window()
        {
            self.groups[g].focus(Some(current), warp, false, core);
        }
        Ok(())
    }

    /// Shows group `group` on screen `screen`. A group already shown on
    /// another screen trades places with the one on `screen`; otherwise the
    /// old group is hidden.
    fn set_screen_group(
        &mut self,
        screen: usize,
        group: usize,
        save_prev: bool,
        warp: bool,
        core: &mut dyn Core,
    ) {
        let Some(target) = self.screens.get(screen) else { return };
        let name = self.groups[group].name().to_owned();
        if target.group.as_deref() == Some(name.as_str()) {
            return;
        }
        let old = target.group.clone();
        let old_index = old.as_deref().and_then(|n| self.group_index(n));
        if save_prev && old.is_some() {
            self.screens[screen].previous_group = old.clone();
        }

        match self.groups[group].screen() {
            Some(other) if other.index != screen && other.index < self.screens.len() => {
                debug!(group = %name, from = other.index, to = screen, "swapping screens");
                self.screens[other.index].group = old;
                if let Some(g) = old_index {
                    let binding = self.screens[other.index].binding();
                    self.groups[g].set_screen(Some(binding), warp, core);
                }
                self.screens[screen].group = Some(name.clone());
                let binding = self.screens[screen].binding();
                self.groups[group].set_screen(Some(binding), warp, core);
            }
            _ => {
                self.screens[screen].group = Some(name.clone());
                let binding = self.screens[screen].binding();
                self.groups[group].set_screen(Some(binding), warp, core);
                if let Some(g) = old_index {
                    self.groups[g].set_screen(None, warp, core);
                }
            }
        }

        core.fire(HookEvent::SetGroup);
        core.fire(HookEvent::FocusChange);
        core.fire(HookEvent::LayoutChange {
            group: name,
            layout: self.groups[group].layout().name().to_string(),
        });
    }

    /// Info for every group, keyed by name.
    pub fn get_groups(&self) -> Value {
        let groups: Map<String, Value> =
            self.groups.iter().map(|g| (g.name().to_owned(), g.info())).collect();
        Value::Object(groups)
    }

    fn group_or_current(&self, name: Option<&str>) -> Result<usize, EngineError> {
        match name {
            Some(name) => self.require_group(name),
            None => self
                .current_group_index()
                .ok_or_else(|| EngineError::NoSuchGroup("<current>".into())),
        }
    }

    pub fn next_layout(&mut self, group: Option<&str>, core: &mut dyn Core) -> Result<(), EngineError> {
        let g = self.group_or_current(group)?;
        self.groups[g].use_next_layout(core);
        Ok(())
    }

    pub fn prev_layout(&mut self, group: Option<&str>, core: &mut dyn Core) -> Result<(), EngineError> {
        let g = self.group_or_current(group)?;
        self.groups[g].use_previous_layout(core);
        Ok(())
    }

    fn cycle_group(&mut self, forward: bool, skip_empty: bool, skip_managed: bool, core: &mut dyn Core) {
        let Some(current) = self.current_group_index() else { return };
        let group = &self.groups[current];
        let neighbour = if forward {
            group.get_next_group(&self.groups, skip_empty, skip_managed)
        } else {
            group.get_previous_group(&self.groups, skip_empty, skip_managed)
        };
        if let Some(target) = neighbour.and_then(|g| self.group_index(g.name())) {
            self.set_screen_group(self.current_screen, target, true, true, core);
        }
    }

    pub fn next_group(&mut self, skip_empty: bool, skip_managed: bool, core: &mut dyn Core) {
        self.cycle_group(true, skip_empty, skip_managed, core);
    }

    pub fn prev_group(&mut self, skip_empty: bool, skip_managed: bool, core: &mut dyn Core) {
        self.cycle_group(false, skip_empty, skip_managed, core);
    }

    pub fn add_group(&mut self, config: GroupConfig, core: &mut dyn Core) -> Result<(), EngineError> {
        if self.group_index(&config.name).is_some() {
            return Err(EngineError::DuplicateGroup(config.name));
        }
        let group = self.build_group(&config)?;
        self.groups.push(group);
        core.fire(HookEvent::ChangeGroup);
        Ok(())
    }

    /// Deletes a group after moving its windows to the group shown before
    /// it on its screen, or to the nearest group that is not on a screen.
    pub fn del_group(&mut self, name: &str, core: &mut dyn Core) -> Result<(), EngineError> {
        let g = self.require_group(name)?;
        if self.groups.len() <= self.screens.len().max(1) {
            return Err(EngineError::LastGroup);
        }
        let target = self.deletion_target(g).ok_or(EngineError::LastGroup)?;
        let target_name = self.groups[target].name().to_owned();

        for wid in self.groups[g].windows().ids().collect::<Vec<_>>() {
            self.move_window(wid, g, target, core);
        }
        if let Some(screen) = self.groups[g].screen() {
            self.set_screen_group(screen.index, target, false, true, core);
        }

        let mut removed = self.groups.remove(g);
        removed.finalize(core);
        for screen in &mut self.screens {
            if screen.previous_group.as_deref() == Some(name) {
                screen.previous_group = None;
            }
        }
        info!(group = name, into = %target_name, "group deleted");
        core.fire(HookEvent::ChangeGroup);
        Ok(())
    }

    fn deletion_target(&self, g: usize) -> Option<usize> {
        let group = &self.groups[g];
        let usable = |i: usize| i != g && self.groups[i].kind() != GroupKind::ScratchPad;
        let previous = group
            .screen()
            .and_then(|s| self.screens.get(s.index))
            .and_then(|s| s.previous_group.as_deref())
            .and_then(|n| self.group_index(n))
            .filter(|&i| usable(i) && self.groups[i].screen().is_none());
        if previous.is_some() {
            return previous;
        }
        // Walk backwards from the deleted group to the first one off-screen.
        let len = self.groups.len();
        (1..len)
            .map(|step| (g + len - step) % len)
            .find(|&i| usable(i) && self.groups[i].screen().is_none())
    }

    /// Deletes a group without `persist` once its last window has left.
    fn drop_if_vacant(&mut self, g: usize, core: &mut dyn Core) {
        let group = &self.groups[g];
        if group.persist() || !group.is_empty() {
            return;
        }
        let name = group.name().to_owned();
        if let Err(e) = self.del_group(&name, core) {
            debug!(group = %name, "keeping empty group: {e}");
        }
    }

    fn move_window(&mut self, wid: WindowId, from: usize, to: usize, core: &mut dyn Core) {
        if from == to {
            return;
        }
        core.hide(wid);
        if let Some(window) = self.groups[from].remove(wid, true, core) {
            self.groups[to].add(window, true, core);
        }
    }

    /// The focused window of the current group.
    fn focused_window(&self) -> Result<(usize, WindowId), EngineError> {
        let g = self.current_group_index().ok_or(EngineError::NoFocusedWindow)?;
        let wid = self.groups[g].current_window().ok_or(EngineError::NoFocusedWindow)?;
        Ok((g, wid))
    }

    pub fn toggle_floating(&mut self, core: &mut dyn Core) -> Result<(), EngineError> {
        let (g, wid) = self.focused_window()?;
        let floating = self.groups[g].window(wid).is_some_and(|w| w.floating);
        self.groups[g].mark_floating(wid, !floating, core);
        Ok(())
    }

    /// Moves the focused window to `group`, optionally showing that group.
    pub fn togroup(
        &mut self,
        group: &str,
        switch_group: bool,
        core: &mut dyn Core,
    ) -> Result<(), EngineError> {
        let to = self.require_group(group)?;
        let (from, wid) = self.focused_window()?;
        self.move_window(wid, from, to, core);
        self.drop_if_vacant(from, core);
        if switch_group {
            self.toscreen(group, None, false, core)?;
        }
        Ok(())
    }

    /// Shows `group` on `screen` (the current screen by default). With
    /// `toggle`, a group that is already there gives way to the screen's
    /// previous group.
    pub fn toscreen(
        &mut self,
        group: &str,
        screen: Option<usize>,
        toggle: bool,
        core: &mut dyn Core,
    ) -> Result<(), EngineError> {
        let g = self.require_group(group)?;
        let index = screen.unwrap_or(self.current_screen);
        let target = self.screens.get(index).ok_or(EngineError::NoSuchScreen(index))?;
        if target.group.as_deref() == Some(group) {
            if toggle
                && let Some(previous) = target.previous_group.clone()
                && let Some(p) = self.group_index(&previous)
            {
                self.set_screen_group(index, p, true, true, core);
            }
        } else {
            self.set_screen_group(index, g, true, true, core);
        }
        Ok(())
    }

    /// Swaps the positions of two groups in the group order.
    pub fn switch_groups(&mut self, a: &str, b: &str, core: &mut dyn Core) -> Result<(), EngineError> {
        let ia = self.require_group(a)?;
        let ib = self.require_group(b)?;
        self.groups.swap(ia, ib);
        core.fire(HookEvent::SetGroup);
        Ok(())
    }

    /// Re-applies every visible group, e.g. after [`LayoutEngine::load`].
    pub fn redraw(&mut self, core: &mut dyn Core) {
        for group in &mut self.groups {
            group.redraw(core);
        }
        if let Some(current) = self.screens.get(self.current_screen) {
            core.focus_screen(current.index);
        }
    }

    pub fn draw_tree(&self) -> String {
        let mut out = String::new();
        for screen in &self.screens {
            let Some(group) = screen.group.as_deref().and_then(|n| self.group(n)) else { continue };
            out.push_str(&format!("screen {} [{}]\n", screen.index, group.name()));
            out.push_str(&group.draw_tree());
        }
        out
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(ron::from_str(&buf)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(path)?.write_all(self.serialize_to_string()?.as_bytes())?;
        Ok(())
    }

    pub fn serialize_to_string(&self) -> anyhow::Result<String> { Ok(ron::ser::to_string(&self)?) }
}
