pub mod editor;
pub mod engine;
pub mod graph;
pub mod lint;
pub mod session;
pub mod surface;
pub mod variables;
