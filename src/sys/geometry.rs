//! Integer screen geometry shared by layouts and the backend.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    /// Splits at `columns` pixels from the left edge. Returns `None` when the
    /// left part would not leave a non-empty right part.
    pub fn hsplit(&self, columns: i32) -> Option<(Rect, Rect)> {
        if columns < 0 || columns >= self.width {
            return None;
        }
        let left = Rect { width: columns, ..*self };
        let right = Rect {
            x: self.x + columns,
            width: self.width - columns,
            ..*self
        };
        Some((left, right))
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Size left for the client once a border of `border` pixels is drawn on
    /// every side.
    pub fn inset_for_border(&self, border: i32) -> Rect {
        Rect {
            width: (self.width - 2 * border).max(1),
            height: (self.height - 2 * border).max(1),
            ..*self
        }
    }

    /// Moves (and if needed shrinks) `self` so it lies inside `bounds`.
    pub fn clamp_into(&self, bounds: &Rect) -> Rect {
        let width = self.width.min(bounds.width);
        let height = self.height.min(bounds.height);
        let x = self.x.clamp(bounds.x, bounds.max_x() - width);
        let y = self.y.clamp(bounds.y, bounds.max_y() - height);
        Rect { x, y, width, height }
    }

    /// A rect of the given size centered in `self`.
    pub fn centered(&self, width: i32, height: i32) -> Rect {
        let width = width.min(self.width);
        let height = height.min(self.height);
        Rect {
            x: self.x + (self.width - width) / 2,
            y: self.y + (self.height - height) / 2,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsplit_keeps_both_halves_on_the_same_row() {
        let r = Rect::new(10, 20, 800, 600);
        let (left, right) = r.hsplit(150).unwrap();
        assert_eq!(left, Rect::new(10, 20, 150, 600));
        assert_eq!(right, Rect::new(160, 20, 650, 600));
        assert!(r.hsplit(800).is_none());
        assert!(r.hsplit(-1).is_none());
    }

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains(0, 0));
        assert!(r.contains(9, 9));
        assert!(!r.contains(10, 5));
        assert!(!r.contains(-1, 5));
    }

    #[test]
    fn clamp_into_pulls_windows_back_on_screen() {
        let screen = Rect::new(0, 0, 1000, 800);
        assert_eq!(
            Rect::new(900, 700, 300, 200).clamp_into(&screen),
            Rect::new(700, 600, 300, 200)
        );
        assert_eq!(
            Rect::new(-50, 10, 2000, 100).clamp_into(&screen),
            Rect::new(0, 10, 1000, 100)
        );
    }

    #[test]
    fn centered_rect() {
        let screen = Rect::new(100, 0, 1000, 800);
        assert_eq!(screen.centered(400, 200), Rect::new(400, 300, 400, 200));
    }
}
