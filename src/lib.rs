//! Dialogue Engine: branching visual-novel dialogue for games.
//!
//! A story is a graph of Dialogue, Setter and Switch nodes connected by
//! choices. The runtime walks it from the session's current node, reading
//! and writing a small store of integer fields, and hands each line of
//! dialogue to a presentation surface supplied by the game.

pub mod core;
pub mod schema;
