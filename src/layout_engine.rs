pub mod engine;
mod error;
pub mod floating;
pub mod replay;
pub mod systems;

pub use engine::{LayoutEngine, LayoutEvent};
pub use error::{EngineError, LayoutError};
pub use floating::FloatingLayout;
pub use systems::{
    LayoutCommand, LayoutResponse, LayoutState, LayoutSystem, LayoutSystemKind, MaxLayout, TreeTab,
};
