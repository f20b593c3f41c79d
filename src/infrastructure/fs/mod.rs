//! Local filesystem helpers for materialized trees.

pub mod tree;

pub use tree::{diff_indexes, diff_trees, scan_source, scan_tree, sync_tree, SyncStats, TreeDiff, TreeIndex};
