pub mod condition;
pub mod inspector;
pub mod node;
pub mod story;
