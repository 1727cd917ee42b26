//! Nested entry tree with expiry sweep.
//!
//! The tree is the in-memory heart of the store: leaves are [`Entry`]
//! values carrying their own optional absolute expiry, branches are plain
//! string-keyed maps created on demand while writing. Expiry travels with
//! its value at every leaf — there is no secondary path→expiry index to
//! keep in sync — and the sweep is a single recursive walk.
//!
//! A path resolves to at most one entry. Writing through an existing leaf
//! replaces it with a branch, and writing a leaf over an existing branch
//! discards the subtree: last write wins.

use crate::core::time::now_ms;
use crate::store::path::KeyPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A stored value and its optional absolute expiry.
///
/// Serialized as the inlined tuple `[expires_at, value]` so a snapshot
/// leaf is self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Option<u64>, Value)", into = "(Option<u64>, Value)")]
pub struct Entry {
    /// Absolute expiry in epoch milliseconds; `None` means permanent.
    pub expires_at: Option<u64>,

    /// The stored JSON value.
    pub value: Value,
}

impl Entry {
    /// Create an entry with an optional absolute expiry.
    pub fn new(value: Value, expires_at: Option<u64>) -> Self {
        Self { expires_at, value }
    }

    /// Create a permanent entry.
    pub fn permanent(value: Value) -> Self {
        Self::new(value, None)
    }

    /// Check if this entry has expired at the given time.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Check if this entry is live at the given time.
    pub fn is_live_at(&self, now: u64) -> bool {
        !self.is_expired_at(now)
    }
}

impl From<(Option<u64>, Value)> for Entry {
    fn from((expires_at, value): (Option<u64>, Value)) -> Self {
        Self { expires_at, value }
    }
}

impl From<Entry> for (Option<u64>, Value) {
    fn from(entry: Entry) -> Self {
        (entry.expires_at, entry.value)
    }
}

/// A node in the tree: either a leaf entry or a branch of child nodes.
///
/// Untagged serde representation keeps the snapshot readable: leaves are
/// two-element arrays, branches are objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// A leaf holding a stored entry.
    Leaf(Entry),
    /// An intermediate node keyed by path segment.
    Branch(BTreeMap<String, Node>),
}

impl Node {
    fn empty_branch() -> Self {
        Node::Branch(BTreeMap::new())
    }
}

/// The path-addressed tree of entries owned by one store instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreTree {
    root: BTreeMap<String, Node>,
}

impl StoreTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry at `path`, creating intermediate branches as needed.
    pub fn set(&mut self, path: &KeyPath, entry: Entry) {
        Self::insert_into(&mut self.root, path.segments(), entry);
    }

    fn insert_into(children: &mut BTreeMap<String, Node>, segments: &[String], entry: Entry) {
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return,
        };

        if rest.is_empty() {
            children.insert(first.clone(), Node::Leaf(entry));
            return;
        }

        let child = children
            .entry(first.clone())
            .and_modify(|node| {
                if matches!(node, Node::Leaf(_)) {
                    *node = Node::empty_branch();
                }
            })
            .or_insert_with(Node::empty_branch);

        if let Node::Branch(grandchildren) = child {
            Self::insert_into(grandchildren, rest, entry);
        }
    }

    /// The entry at `path`, live or not.
    pub fn entry(&self, path: &KeyPath) -> Option<&Entry> {
        let segments = path.segments();
        let mut current = &self.root;

        for (depth, segment) in segments.iter().enumerate() {
            let is_last = depth + 1 == segments.len();
            match current.get(segment)? {
                Node::Leaf(entry) => return is_last.then_some(entry),
                Node::Branch(children) => {
                    if is_last {
                        return None;
                    }
                    current = children;
                }
            }
        }

        None
    }

    /// The entry at `path`, only if it is live at `now`.
    pub fn live(&self, path: &KeyPath, now: u64) -> Option<&Entry> {
        self.entry(path).filter(|entry| entry.is_live_at(now))
    }

    /// Remove whatever is at `path` — an entry or a whole subtree.
    ///
    /// Ancestors emptied by the removal are pruned. Returns whether
    /// anything was removed.
    pub fn remove(&mut self, path: &KeyPath) -> bool {
        Self::remove_from(&mut self.root, path.segments())
    }

    fn remove_from(children: &mut BTreeMap<String, Node>, segments: &[String]) -> bool {
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return false,
        };

        if rest.is_empty() {
            return children.remove(first).is_some();
        }

        let (removed, prune) = match children.get_mut(first) {
            Some(Node::Branch(grandchildren)) => {
                let removed = Self::remove_from(grandchildren, rest);
                (removed, grandchildren.is_empty())
            }
            _ => (false, false),
        };

        if removed && prune {
            children.remove(first);
        }
        removed
    }

    /// Remove every expired leaf, pruning branches emptied on the way.
    ///
    /// Visits the whole tree; returns the number of entries removed.
    pub fn sweep_expired(&mut self, now: u64) -> usize {
        Self::sweep(&mut self.root, now)
    }

    fn sweep(children: &mut BTreeMap<String, Node>, now: u64) -> usize {
        let mut removed = 0;

        children.retain(|_, node| match node {
            Node::Leaf(entry) => {
                if entry.is_expired_at(now) {
                    removed += 1;
                    false
                } else {
                    true
                }
            }
            Node::Branch(grandchildren) => {
                removed += Self::sweep(grandchildren, now);
                !grandchildren.is_empty()
            }
        });

        removed
    }

    /// Replace the whole tree with `other`.
    pub fn replace(&mut self, other: StoreTree) {
        self.root = other.root;
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Total number of entries, expired ones included.
    pub fn total_count(&self) -> usize {
        Self::count(&self.root, None)
    }

    /// Number of entries live at `now`.
    pub fn live_count(&self, now: u64) -> usize {
        Self::count(&self.root, Some(now))
    }

    fn count(children: &BTreeMap<String, Node>, live_at: Option<u64>) -> usize {
        children
            .values()
            .map(|node| match node {
                Node::Leaf(entry) => match live_at {
                    Some(now) => usize::from(entry.is_live_at(now)),
                    None => 1,
                },
                Node::Branch(grandchildren) => Self::count(grandchildren, live_at),
            })
            .sum()
    }

    /// Whether the tree holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl std::fmt::Display for StoreTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StoreTree({} entries, {} live)",
            self.total_count(),
            self.live_count(now_ms())
        )
    }
}
