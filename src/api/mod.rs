//! Purpose: Define the public Rust API boundary for the db721 engine.
//! Exports: Table handles, planning types, scans, values and errors.
//! Role: Surface consumed by the host executor; hides internal module layout.
//! Invariants: This module is the only public path to engine primitives.
//! Invariants: Additive-only; internal modules are not directly exposed.

mod table;

pub use crate::core::cursor::{ColumnCursor, CursorStats};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::estimate::{ColumnPlan, Estimate, estimate};
pub use crate::core::format::{ColumnType, STR_SLOT_LEN};
pub use crate::core::meta::{BlockStat, ColumnDescriptor, TableDescriptor, TableOptions};
pub use crate::core::prune::{CompareOp, Filter, SkipSet, apply_filter, skip_set_for};
pub use crate::core::scan::{Row, Scan, ScanState, ScanStats};
pub use crate::core::value::{Datum, Value, compare};
pub use table::{Table, open_table};
