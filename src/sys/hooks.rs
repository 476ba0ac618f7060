use serde::{Deserialize, Serialize};

use crate::model::window::WindowId;

/// Named notifications fired towards the hook bus.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[serde(tag = "hook", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HookEvent {
    GroupWindowAdd { group: String, window: WindowId },
    GroupWindowRemove { group: String, window: WindowId },
    FocusChange,
    LayoutChange { group: String, layout: String },
    #[serde(rename = "changegroup")]
    #[strum(serialize = "changegroup")]
    ChangeGroup,
    #[serde(rename = "setgroup")]
    #[strum(serialize = "setgroup")]
    SetGroup,
    CurrentScreenChange,
    ClientNameUpdated { window: WindowId },
}

impl HookEvent {
    pub fn name(&self) -> &'static str { self.into() }
}
