//! Cross-process synchronization plumbing.
//!
//! - [`event`] - Wire events exchanged between siblings
//! - [`channel`] - Group transport seam and in-process implementation
//! - [`election`] - Leader election seam

pub mod channel;
pub mod election;
pub mod event;
