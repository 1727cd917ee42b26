//! Path-addressed TTL tree.
//!
//! - [`path`] - Dotted key path parsing
//! - [`tree`] - Nested entry tree with expiry sweep

pub mod path;
pub mod tree;
