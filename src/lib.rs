//! Window and group layout core for a tiling window manager.
//!
//! Groups own windows, an ordered set of layouts and a floating layer. The
//! [`layout_engine::LayoutEngine`] binds groups to screens and routes backend
//! events into them; everything that touches the display goes through the
//! [`sys::backend::Core`] trait.

pub mod actor;
pub mod common;
pub mod ipc;
pub mod layout_engine;
pub mod model;
pub mod sys;
