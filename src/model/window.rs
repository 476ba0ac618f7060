use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl WindowId {
    pub const fn new(raw: u32) -> Self { WindowId(raw) }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

/// A managed client as the layout core sees it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Window {
    pub id: WindowId,
    pub name: String,
    #[serde(default)]
    pub wm_class: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub floating: bool,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub wants_to_fullscreen: bool,
    #[serde(default = "yes")]
    pub can_steal_focus: bool,
    /// Section a tree-tab layout should file this window under, if present.
    #[serde(default)]
    pub tree_section: Option<String>,
    /// Floating placement relative to the screen origin.
    #[serde(default)]
    pub float_geometry: Option<Rect>,
}

fn yes() -> bool { true }

impl Window {
    pub fn new(id: WindowId, name: impl Into<String>) -> Self {
        Window {
            id,
            name: name.into(),
            wm_class: None,
            role: None,
            floating: false,
            fullscreen: false,
            minimized: false,
            urgent: false,
            wants_to_fullscreen: false,
            can_steal_focus: true,
            tree_section: None,
            float_geometry: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.wm_class = Some(class.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.tree_section = Some(section.into());
        self
    }

    /// Fullscreen windows are placed by the floating layer even though they
    /// stay registered with the tiled layouts.
    pub fn is_floating(&self) -> bool { self.floating || self.fullscreen }

    pub fn info(&self, group: Option<&str>) -> WindowInfo {
        WindowInfo {
            id: self.id,
            name: self.name.clone(),
            wm_class: self.wm_class.clone(),
            group: group.map(str::to_owned),
            floating: self.floating,
            fullscreen: self.fullscreen,
            minimized: self.minimized,
            urgent: self.urgent,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub name: String,
    pub wm_class: Option<String>,
    pub group: Option<String>,
    pub floating: bool,
    pub fullscreen: bool,
    pub minimized: bool,
    pub urgent: bool,
}

/// Windows of one group in insertion order.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WindowSet {
    windows: Vec<Window>,
}

impl WindowSet {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn contains(&self, wid: WindowId) -> bool { self.position(wid).is_some() }

    pub fn position(&self, wid: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id == wid)
    }

    pub fn get(&self, wid: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == wid)
    }

    pub fn get_mut(&mut self, wid: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == wid)
    }

    pub fn at(&self, index: usize) -> Option<&Window> { self.windows.get(index) }

    /// Appends `window` unless a window with the same id is already present,
    /// in which case the stored record is replaced in place.
    pub fn insert(&mut self, window: Window) {
        match self.get_mut(window.id) {
            Some(existing) => *existing = window,
            None => self.windows.push(window),
        }
    }

    pub fn remove(&mut self, wid: WindowId) -> Option<Window> {
        let idx = self.position(wid)?;
        Some(self.windows.remove(idx))
    }

    pub fn swap(&mut self, a: usize, b: usize) { self.windows.swap(a, b) }

    pub fn iter(&self) -> impl Iterator<Item = &Window> + '_ { self.windows.iter() }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Window> + '_ { self.windows.iter_mut() }

    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ { self.windows.iter().map(|w| w.id) }

    pub fn find_by_name(&self, name: &str) -> Option<&Window> {
        self.windows.iter().find(|w| w.name == name)
    }

    /// Display name of `wid`, or an empty string for unknown windows.
    pub fn name_of(&self, wid: WindowId) -> &str {
        self.get(wid).map(|w| w.name.as_str()).unwrap_or("")
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Window> + '_ { self.windows.drain(..) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_record_in_place() {
        let mut set = WindowSet::new();
        set.insert(Window::new(WindowId(1), "a"));
        set.insert(Window::new(WindowId(2), "b"));
        set.insert(Window::new(WindowId(1), "a2"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![WindowId(1), WindowId(2)]);
        assert_eq!(set.name_of(WindowId(1)), "a2");
    }

    #[test]
    fn remove_and_lookup() {
        let mut set = WindowSet::new();
        set.insert(Window::new(WindowId(1), "a"));
        set.insert(Window::new(WindowId(2), "b"));
        assert_eq!(set.find_by_name("b").map(|w| w.id), Some(WindowId(2)));
        assert_eq!(set.remove(WindowId(1)).map(|w| w.name), Some("a".to_owned()));
        assert!(set.remove(WindowId(1)).is_none());
        assert_eq!(set.position(WindowId(2)), Some(0));
        assert_eq!(set.name_of(WindowId(9)), "");
    }

    #[test]
    fn fullscreen_counts_as_floating() {
        let mut w = Window::new(WindowId(1), "a");
        assert!(!w.is_floating());
        w.fullscreen = true;
        assert!(w.is_floating());
    }
}
