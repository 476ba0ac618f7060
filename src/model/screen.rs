use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::sys::geometry::Rect;

/// What a group knows about the screen showing it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRef {
    pub index: usize,
    pub rect: Rect,
}

/// A display output and the group bound to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Screen {
    pub index: usize,
    pub rect: Rect,
    pub group: Option<String>,
    pub previous_group: Option<String>,
}

impl Screen {
    pub fn new(index: usize, rect: Rect) -> Self {
        Screen {
            index,
            rect,
            group: None,
            previous_group: None,
        }
    }

    pub fn binding(&self) -> ScreenRef { ScreenRef { index: self.index, rect: self.rect } }

    pub fn info(&self) -> Value {
        json!({
            "index": self.index,
            "x": self.rect.x,
            "y": self.rect.y,
            "width": self.rect.width,
            "height": self.rect.height,
            "group": self.group,
        })
    }
}
