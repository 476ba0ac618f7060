pub mod backend;
pub mod geometry;
pub mod headless;
pub mod hooks;
