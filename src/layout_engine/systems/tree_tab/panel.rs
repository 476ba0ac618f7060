//! Turns the tab tree into panel draw calls.
//!
//! Text is measured as one line of `fontsize` pixels; the same geometry is
//! used to build the rows that clicks are tested against.

use super::nodes::{NodeKind, TabTree};
use crate::common::config::TreeTabSettings;
use crate::model::tree::NodeId;
use crate::model::window::{WindowId, WindowSet};
use crate::sys::backend::DrawOp;

/// Vertical extent of one window title in the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRow {
    pub top: i32,
    pub bottom: i32,
    pub wid: WindowId,
}

pub struct Rendered {
    pub ops: Vec<DrawOp>,
    pub rows: Vec<HitRow>,
}

struct Painter<'a> {
    tree: &'a TabTree,
    windows: &'a WindowSet,
    focused: Option<WindowId>,
    s: &'a TreeTabSettings,
    ops: Vec<DrawOp>,
    rows: Vec<HitRow>,
}

pub fn render(
    tree: &TabTree,
    windows: &WindowSet,
    focused: Option<WindowId>,
    settings: &TreeTabSettings,
) -> Rendered {
    let mut p = Painter {
        tree,
        windows,
        focused,
        s: settings,
        ops: vec![DrawOp::Clear { color: settings.bg_color.clone() }],
        rows: Vec::new(),
    };
    let mut top = 0;
    for section in tree.section_ids() {
        top = p.section(section, top);
    }
    Rendered { ops: p.ops, rows: p.rows }
}

impl Painter<'_> {
    fn section(&mut self, node: NodeId, mut top: i32) -> i32 {
        let s = self.s;
        self.ops.push(DrawOp::HBar {
            color: s.section_fg.clone(),
            x1: 0,
            x2: s.panel_width,
            y: top,
            line_width: 1,
        });
        self.ops.push(DrawOp::Text {
            x: s.section_left,
            y: top + s.section_top,
            text: self.tree.label(node, self.windows),
            font: s.font.clone(),
            size: s.section_fontsize,
            color: s.section_fg.clone(),
        });
        top += s.section_fontsize + s.section_top + s.section_padding;
        if self.tree.is_expanded(node) {
            for child in self.tree.children(node) {
                top = self.window(child, top, 0);
            }
        }
        top + s.section_bottom
    }

    fn window(&mut self, node: NodeId, mut top: i32, level: i32) -> i32 {
        let Some(NodeKind::Window(wid)) = self.tree.kind(node).cloned() else {
            return top;
        };
        let s = self.s;
        let urgent = self.windows.get(wid).is_some_and(|w| w.urgent);
        let (fg, bg) = if Some(wid) == self.focused {
            (&s.active_fg, &s.active_bg)
        } else if urgent {
            (&s.urgent_fg, &s.urgent_bg)
        } else {
            (&s.inactive_fg, &s.inactive_bg)
        };
        let left = s.padding_left + level * s.level_shift;
        let height = s.fontsize + 2 * s.padding_y;
        self.ops.push(DrawOp::FramedText {
            x: left,
            y: top,
            width: s.panel_width - left,
            height,
            border_width: s.border_width,
            fill: bg.clone(),
            padding_x: s.padding_x,
            padding_y: s.padding_y,
            text: self.tree.label(node, self.windows),
            font: s.font.clone(),
            size: s.fontsize,
            color: fg.clone(),
        });
        let title_top = top;
        top += height + s.vspace + s.border_width;
        self.rows.push(HitRow { top: title_top, bottom: top, wid });
        if self.tree.is_expanded(node) {
            for child in self.tree.children(node) {
                top = self.window(child, top, level + 1);
            }
        }
        top
    }
}

pub fn hit_test(rows: &[HitRow], y: i32) -> Option<WindowId> {
    rows.iter().find(|r| r.top <= y && y < r.bottom).map(|r| r.wid)
}
