//! The contract between the layout core and whatever actually talks to the
//! display server.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use super::hooks::HookEvent;
use crate::model::window::WindowId;

/// Handle of an internal window the core draws into (the tree-tab panel).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u32);

/// Drawing primitives for internal panels, in panel-local coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Clear {
        color: String,
    },
    HBar {
        color: String,
        x1: i32,
        x2: i32,
        y: i32,
        line_width: i32,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        font: String,
        size: i32,
        color: String,
    },
    /// Text inside a filled, bordered box `width` pixels wide.
    FramedText {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        border_width: i32,
        fill: String,
        padding_x: i32,
        padding_y: i32,
        text: String,
        font: String,
        size: i32,
        color: String,
    },
}

pub trait Core {
    /// Maps `wid` at `rect` with a border of `border_width` pixels.
    fn place(&mut self, wid: WindowId, rect: Rect, border_width: i32);
    fn hide(&mut self, wid: WindowId);
    /// Gives input focus to `wid`, or to nothing.
    fn focus_window(&mut self, wid: Option<WindowId>, warp: bool);

    fn current_screen(&self) -> Option<usize>;
    fn focus_screen(&mut self, index: usize);
    /// Whether a pointer drag is in progress.
    fn dragging(&self) -> bool { false }

    fn fire(&mut self, event: HookEvent);

    fn create_panel(&mut self) -> PanelId;
    fn place_panel(&mut self, panel: PanelId, rect: Rect);
    fn hide_panel(&mut self, panel: PanelId);
    fn draw_panel(&mut self, panel: PanelId, ops: Vec<DrawOp>);
    fn destroy_panel(&mut self, panel: PanelId);
}
