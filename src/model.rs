pub mod group;
pub mod screen;
pub mod tree;
pub mod window;

pub use group::Group;
pub use screen::{Screen, ScreenRef};
pub use window::{Window, WindowId, WindowInfo, WindowSet};
