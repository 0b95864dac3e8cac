// Core modules: on-disk layout, metadata, pruning, planning, cursors and scans.
pub mod cursor;
pub mod error;
pub mod estimate;
#[cfg(test)]
pub mod fixture;
pub mod format;
pub mod meta;
pub mod prune;
pub mod scan;
pub mod value;
