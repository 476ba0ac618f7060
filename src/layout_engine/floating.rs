use once_cell::unsync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::common::config::{FloatRule, FloatingConfig};
use crate::model::window::{Window, WindowId, WindowSet};
use crate::sys::backend::Core;
use crate::sys::geometry::Rect;

/// The layer that keeps floating and fullscreen windows out of the tiling
/// layouts.
///
/// Geometry is stored on the windows themselves, relative to the screen the
/// group is shown on, so switching screens only needs a clamp.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FloatingLayout {
    rules: Vec<FloatRule>,
    #[serde(skip)]
    compiled: OnceCell<Vec<Option<Regex>>>,
    clients: Vec<WindowId>,
    focused: Option<WindowId>,
    border_width: i32,
    fullscreen_border_width: i32,
}

impl FloatingLayout {
    pub fn new(config: &FloatingConfig) -> Self {
        FloatingLayout {
            rules: config.rules.clone(),
            compiled: OnceCell::new(),
            clients: Vec::new(),
            focused: None,
            border_width: config.border_width,
            fullscreen_border_width: config.fullscreen_border_width,
        }
    }

    fn title_patterns(&self) -> &[Option<Regex>] {
        self.compiled.get_or_init(|| {
            self.rules
                .iter()
                .map(|rule| {
                    let pattern = rule.title_regex.as_deref()?;
                    Regex::new(pattern)
                        .inspect_err(|e| warn!("ignoring float rule with bad regex {pattern:?}: {e}"))
                        .ok()
                })
                .collect()
        })
    }

    /// Whether any float rule claims `window`.
    pub fn matches(&self, window: &Window) -> bool {
        let patterns = self.title_patterns();
        self.rules.iter().zip(patterns).any(|(rule, pattern)| {
            if rule.is_empty() || (rule.title_regex.is_some() && pattern.is_none()) {
                return false;
            }
            let eq = |want: &Option<String>, have: &Option<String>| {
                want.as_ref().is_none_or(|w| have.as_ref() == Some(w))
            };
            eq(&rule.wm_class, &window.wm_class)
                && eq(&rule.role, &window.role)
                && pattern.as_ref().is_none_or(|re| re.is_match(&window.name))
                && rule.title_substring.as_ref().is_none_or(|s| window.name.contains(s.as_str()))
        })
    }

    pub fn clients(&self) -> &[WindowId] { &self.clients }

    pub fn contains(&self, wid: WindowId) -> bool { self.clients.contains(&wid) }

    pub fn add_client(&mut self, wid: WindowId) {
        if !self.contains(wid) {
            self.clients.push(wid);
        }
        self.focused = Some(wid);
    }

    /// Drops `wid`, returning the floating window that followed it.
    pub fn remove(&mut self, wid: WindowId) -> Option<WindowId> {
        let idx = self.clients.iter().position(|&c| c == wid)?;
        let next = self.clients.get(idx + 1).copied();
        if self.focused == Some(wid) {
            self.blur();
        }
        self.clients.remove(idx);
        next
    }

    pub fn focus(&mut self, wid: WindowId) { self.focused = Some(wid); }

    pub fn blur(&mut self) { self.focused = None; }

    pub fn focused(&self) -> Option<WindowId> { self.focused }

    /// Floating windows of the group, in group order.
    pub fn find_clients(&self, windows: &WindowSet) -> Vec<WindowId> {
        windows.iter().filter(|w| w.is_floating()).map(|w| w.id).collect()
    }

    pub fn focus_first(&self, windows: &WindowSet) -> Option<WindowId> {
        self.find_clients(windows).first().copied()
    }

    pub fn focus_last(&self, windows: &WindowSet) -> Option<WindowId> {
        self.find_clients(windows).last().copied()
    }

    pub fn focus_next(&self, windows: &WindowSet, wid: WindowId) -> Option<WindowId> {
        let clients = self.find_clients(windows);
        let idx = clients.iter().position(|&c| c == wid)?;
        clients.get(idx + 1).copied()
    }

    pub fn focus_previous(&self, windows: &WindowSet, wid: WindowId) -> Option<WindowId> {
        let clients = self.find_clients(windows);
        let idx = clients.iter().position(|&c| c == wid)?;
        idx.checked_sub(1).map(|i| clients[i])
    }

    /// Where `window` ends up on a screen covering `screen`.
    pub fn geometry(&self, window: &Window, screen: Rect) -> (Rect, i32) {
        if window.fullscreen {
            return (screen, self.fullscreen_border_width);
        }
        let rect = match window.float_geometry {
            Some(g) => g.translate(screen.x, screen.y),
            None => screen.centered(screen.width / 2, screen.height / 2),
        };
        (rect.inset_for_border(self.border_width), self.border_width)
    }

    pub fn configure(&self, window: &Window, screen: Rect, core: &mut dyn Core) {
        let (rect, border) = self.geometry(window, screen);
        core.place(window.id, rect, border);
    }

    pub fn layout(&self, windows: &WindowSet, visible: &[WindowId], screen: Rect, core: &mut dyn Core) {
        for window in visible.iter().filter_map(|&wid| windows.get(wid)) {
            self.configure(window, screen, core);
        }
    }

    /// Keeps every floating window of the group inside a screen of the new
    /// size.
    pub fn to_screen(&self, windows: &mut WindowSet, screen: Rect) {
        let bounds = Rect::new(0, 0, screen.width, screen.height);
        for window in windows.iter_mut().filter(|w| self.clients.contains(&w.id)) {
            if let Some(g) = window.float_geometry {
                window.float_geometry = Some(g.clamp_into(&bounds));
            }
        }
    }

    /// Places every client that is not minimized.
    pub fn show(&self, windows: &WindowSet, screen: Rect, core: &mut dyn Core) {
        for window in self.clients.iter().filter_map(|&wid| windows.get(wid)) {
            if !window.minimized {
                self.configure(window, screen, core);
            }
        }
    }

    pub fn hide(&self, core: &mut dyn Core) {
        for &wid in &self.clients {
            core.hide(wid);
        }
    }

    pub fn info(&self, windows: &WindowSet) -> Value {
        json!({
            "name": "floating",
            "clients": self.clients.iter().map(|&c| windows.name_of(c)).collect::<Vec<_>>(),
            "focused": self.focused.map(|f| windows.name_of(f)),
        })
    }
}
