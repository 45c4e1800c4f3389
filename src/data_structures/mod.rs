//! Plain data models shared by the decoders and their consumers.
//!
//! - `accessor` describes how a byte range of a buffer is interpreted (accessor / buffer view)
//! - `attribute` holds materialized attribute arrays and the attribute tables built from them
//! - `mesh` contains the decoded geometry handed to scene assembly

pub mod accessor;
pub mod attribute;
pub mod mesh;
