//! Plain data: identifiers, entities and the graph that owns them.

pub mod entity;
pub mod ids;
pub mod tree;
