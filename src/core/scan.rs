//! Purpose: Drive one scan: align per-column cursors on a common row-id and emit rows.
//! Exports: `Scan`, `ScanState`, `ScanStats`, `Row`.
//! Role: Owns the scan's reader and cursors; consumes an `Estimate` produced per query.
//! Invariants: Emitted row-ids strictly increase; every cursor sits on the emitted row-id.
//! Invariants: Any error or exhaustion moves the scan to `Exhausted`; no partial rows.
//! Invariants: The reader is owned by exactly one scan; descriptors are shared read-only.
use std::io::{Read, Seek};
use std::sync::Arc;

use tracing::debug;

use crate::core::cursor::{ColumnCursor, CursorStats};
use crate::core::error::{Error, ErrorKind};
use crate::core::estimate::{self, ColumnPlan, Estimate};
use crate::core::meta::TableDescriptor;
use crate::core::value::{Datum, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    Active,
    Exhausted,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanStats {
    pub rows_emitted: u64,
    pub blocks_read: u64,
    pub blocks_skipped: u64,
    pub bytes_read: u64,
}

/// One output tuple; values borrow from the scan's block buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct Row<'s> {
    row_id: u64,
    values: Vec<Option<Value<'s>>>,
}

impl<'s> Row<'s> {
    pub fn row_id(&self) -> u64 {
        self.row_id
    }

    /// Value at 1-based table `position`; `None` for null or unrequested columns.
    pub fn get(&self, position: usize) -> Option<Value<'s>> {
        position
            .checked_sub(1)
            .and_then(|idx| self.values.get(idx))
            .copied()
            .flatten()
    }

    pub fn values(&self) -> &[Option<Value<'s>>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copies the row out of the scan's buffers.
    pub fn to_datums(&self) -> Vec<Option<Datum>> {
        self.values
            .iter()
            .map(|value| value.map(|v| v.to_datum()))
            .collect()
    }
}

pub struct Scan<R> {
    table: Arc<TableDescriptor>,
    reader: R,
    cursors: Vec<ColumnCursor>,
    outputs: Vec<Option<usize>>,
    state: ScanState,
    rows_emitted: u64,
}

impl<R: Read + Seek> Scan<R> {
    /// Starts a scan over `reader` using the plans and order in `estimate`.
    ///
    /// `requested` lists the 1-based columns to materialize; every other output
    /// position is null. Requested columns without a plan are read unfiltered.
    pub fn new(
        table: Arc<TableDescriptor>,
        reader: R,
        estimate: &Estimate,
        requested: &[usize],
    ) -> Result<Self, Error> {
        let mut plans: Vec<ColumnPlan> = Vec::with_capacity(estimate.order.len());
        for column in &estimate.order {
            let plan = estimate.plans.get(column).ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("scan order names column {column} without a plan"))
            })?;
            if plans.iter().any(|p| p.column == *column) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("scan order repeats column {column}")));
            }
            plans.push(plan.clone());
        }
        if plans.len() != estimate.plans.len() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("scan order does not cover every planned column"));
        }
        for &column in requested {
            let descriptor = table.require_column(column)?;
            if !plans.iter().any(|p| p.column == column) {
                plans.push(ColumnPlan::unfiltered(column, descriptor));
            }
        }
        if plans.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("scan has no columns"));
        }

        let mut cursors = Vec::with_capacity(plans.len());
        for plan in &plans {
            let descriptor = table.require_column(plan.column)?;
            for filter in &plan.filters {
                estimate::check_comparable(filter, descriptor)?;
            }
            if plan.skip_set.block_count() != descriptor.block_count() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("plan was built for a different table")
                    .with_column(descriptor.name()));
            }
            cursors.push(ColumnCursor::new(plan, descriptor, table.max_block_size()));
        }

        let mut outputs = vec![None; table.column_count()];
        for &column in requested {
            outputs[column - 1] = cursors.iter().position(|c| c.column() == column);
        }

        debug!(
            order = ?cursors.iter().map(|c| c.column()).collect::<Vec<_>>(),
            requested = ?requested,
            "began scan"
        );
        Ok(Self {
            table,
            reader,
            cursors,
            outputs,
            state: ScanState::Active,
            rows_emitted: 0,
        })
    }

    /// Next matching row, or `None` once the scan is exhausted.
    pub fn next(&mut self) -> Result<Option<Row<'_>>, Error> {
        if self.state == ScanState::Exhausted {
            return Ok(None);
        }
        let row_id = match self.align() {
            Ok(Some(row_id)) => row_id,
            Ok(None) => {
                self.state = ScanState::Exhausted;
                debug!(rows = self.rows_emitted, "scan exhausted");
                return Ok(None);
            }
            Err(err) => {
                self.state = ScanState::Exhausted;
                return Err(err.or_path(self.table.path_buf()));
            }
        };
        self.rows_emitted += 1;

        let values = self
            .outputs
            .iter()
            .map(|slot| slot.and_then(|idx| self.cursors[idx].value()))
            .collect();
        Ok(Some(Row { row_id, values }))
    }

    /// Rewinds every cursor to before the first row; plans are kept.
    pub fn rescan(&mut self) {
        for cursor in &mut self.cursors {
            let descriptor = &self.table.columns()[cursor.column() - 1];
            cursor.reset(descriptor);
        }
        self.state = ScanState::Active;
        debug!("rescan");
    }

    /// Advances cursors until all agree on one row-id.
    fn align(&mut self) -> Result<Option<u64>, Error> {
        let Self {
            table,
            reader,
            cursors,
            ..
        } = self;
        let mut target = cursors[0].row_id() + 1;
        let mut idx = 0;
        while idx < cursors.len() {
            let cursor = &mut cursors[idx];
            let current = cursor.row_id();
            if current < target {
                let descriptor = &table.columns()[cursor.column() - 1];
                match cursor.advance(descriptor, reader, target - current)? {
                    None => return Ok(None),
                    Some(row) if row > target => {
                        target = row;
                        idx = 0;
                        continue;
                    }
                    Some(_) => {}
                }
            }
            idx += 1;
        }
        Ok(Some(target))
    }
}

impl<R> Scan<R> {
    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    /// Column positions in processing order.
    pub fn order(&self) -> Vec<usize> {
        self.cursors.iter().map(|c| c.column()).collect()
    }

    pub fn stats(&self) -> ScanStats {
        let mut io = CursorStats::default();
        for cursor in &self.cursors {
            io.add(cursor.stats());
        }
        ScanStats {
            rows_emitted: self.rows_emitted,
            blocks_read: io.blocks_read,
            blocks_skipped: io.blocks_skipped,
            bytes_read: io.bytes_read,
        }
    }

    /// Ends the scan, releasing its buffers and reader.
    pub fn finish(self) -> ScanStats {
        let stats = self.stats();
        debug!(
            rows = stats.rows_emitted,
            blocks_read = stats.blocks_read,
            blocks_skipped = stats.blocks_skipped,
            bytes_read = stats.bytes_read,
            "finished scan"
        );
        stats
    }
}
