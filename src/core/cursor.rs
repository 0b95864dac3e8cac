// Block-at-a-time column reader that advances by row-id and steps over pruned blocks.
use std::io::{Read, Seek, SeekFrom};

use tracing::trace;

use crate::core::error::{Error, ErrorKind};
use crate::core::estimate::ColumnPlan;
use crate::core::format::{self, ColumnType};
use crate::core::meta::ColumnDescriptor;
use crate::core::prune::{Filter, SkipSet};
use crate::core::value::Value;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CursorStats {
    pub blocks_read: u64,
    /// Blocks stepped over without I/O: pruned, or entirely behind the target row.
    pub blocks_skipped: u64,
    pub bytes_read: u64,
}

impl CursorStats {
    pub(crate) fn add(&mut self, other: CursorStats) {
        self.blocks_read += other.blocks_read;
        self.blocks_skipped += other.blocks_skipped;
        self.bytes_read += other.bytes_read;
    }
}

#[derive(Debug)]
pub struct ColumnCursor {
    column: usize,
    column_type: ColumnType,
    filters: Vec<Filter>,
    skip_set: SkipSet,
    estimate: u64,
    buffer: Vec<u8>,
    block: Option<usize>,
    next_block: usize,
    pos: usize,
    row_id: u64,
    file_offset: u64,
    exhausted: bool,
    stats: CursorStats,
}

enum BlockStep {
    Skip(usize),
    Read(usize),
    Exhausted,
}

impl ColumnCursor {
    pub fn new(plan: &ColumnPlan, descriptor: &ColumnDescriptor, max_block_size: u16) -> Self {
        let capacity = usize::from(max_block_size) * descriptor.value_width();
        Self {
            column: plan.column,
            column_type: descriptor.column_type(),
            filters: plan.filters.clone(),
            skip_set: plan.skip_set.clone(),
            estimate: plan.estimate,
            buffer: vec![0u8; capacity],
            block: None,
            next_block: 0,
            pos: 0,
            row_id: 0,
            file_offset: u64::from(descriptor.start_offset()),
            exhausted: false,
            stats: CursorStats::default(),
        }
    }

    /// 1-based table position of this cursor's column.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Row-id of the current value; 0 before the first advance.
    pub fn row_id(&self) -> u64 {
        self.row_id
    }

    pub fn estimate(&self) -> u64 {
        self.estimate
    }

    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn stats(&self) -> CursorStats {
        self.stats
    }

    /// Moves `row_delta` rows forward, then on to the first row passing this column's filters.
    ///
    /// Returns the landing row-id, or `None` once the column has no further matching row.
    pub fn advance<R: Read + Seek>(
        &mut self,
        descriptor: &ColumnDescriptor,
        reader: &mut R,
        row_delta: u64,
    ) -> Result<Option<u64>, Error> {
        if self.exhausted {
            return Ok(None);
        }
        let mut target = self.row_id.saturating_add(row_delta);
        loop {
            let Some(row) = self.position_at(descriptor, reader, target)? else {
                self.exhausted = true;
                return Ok(None);
            };
            self.row_id = row;
            if self.current_passes() {
                return Ok(Some(row));
            }
            target = row + 1;
        }
    }

    /// Current value, borrowed from the block buffer.
    pub fn value(&self) -> Option<Value<'_>> {
        self.block?;
        if self.row_id == 0 {
            return None;
        }
        let width = self.column_type.value_width();
        let start = self.pos * width;
        Some(format::decode_value(
            self.column_type,
            &self.buffer[start..start + width],
        ))
    }

    /// Rewinds to before the first row. A buffered first block is kept.
    pub fn reset(&mut self, descriptor: &ColumnDescriptor) {
        if self.block == Some(0) {
            self.next_block = 1;
        } else {
            self.block = None;
            self.next_block = 0;
            self.file_offset = u64::from(descriptor.start_offset());
        }
        self.pos = 0;
        self.row_id = 0;
        self.exhausted = false;
    }

    fn current_passes(&self) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.value() {
            Some(value) => self.filters.iter().all(|filter| filter.matches(value)),
            None => false,
        }
    }

    /// Buffers the block holding the first readable row at or after `target`.
    fn position_at<R: Read + Seek>(
        &mut self,
        descriptor: &ColumnDescriptor,
        reader: &mut R,
        target: u64,
    ) -> Result<Option<u64>, Error> {
        let target = target.max(1);
        if let Some(block) = self.block {
            if target <= descriptor.block_last_row(block) {
                return Ok(Some(self.place(descriptor, block, target)));
            }
            self.block = None;
        }

        loop {
            match self.next_step(descriptor, target) {
                BlockStep::Exhausted => return Ok(None),
                BlockStep::Skip(block) => {
                    trace!(column = descriptor.name(), block, "skipping block");
                    self.stats.blocks_skipped += 1;
                    self.next_block = block + 1;
                }
                BlockStep::Read(block) => {
                    self.read_block(descriptor, reader, block)?;
                    self.next_block = block + 1;
                    return Ok(Some(self.place(descriptor, block, target)));
                }
            }
        }
    }

    fn next_step(&self, descriptor: &ColumnDescriptor, target: u64) -> BlockStep {
        let block = self.next_block;
        if block >= descriptor.block_count() {
            BlockStep::Exhausted
        } else if self.skip_set.contains(block) || descriptor.block_last_row(block) < target {
            BlockStep::Skip(block)
        } else {
            BlockStep::Read(block)
        }
    }

    fn place(&mut self, descriptor: &ColumnDescriptor, block: usize, target: u64) -> u64 {
        let first = descriptor.block_first_row(block);
        let row = target.max(first);
        self.pos = (row - first) as usize;
        row
    }

    fn read_block<R: Read + Seek>(
        &mut self,
        descriptor: &ColumnDescriptor,
        reader: &mut R,
        block: usize,
    ) -> Result<(), Error> {
        let offset = descriptor.block_offset(block);
        let len = descriptor.block_len(block);
        let read = reader
            .seek(SeekFrom::Start(offset))
            .and_then(|_| reader.read_exact(&mut self.buffer[..len]));
        if let Err(err) = read {
            self.block = None;
            self.exhausted = true;
            return Err(Error::new(ErrorKind::Io)
                .with_message("failed to read column block")
                .with_column(descriptor.name())
                .with_block(block)
                .with_offset(offset)
                .with_source(err));
        }
        trace!(column = descriptor.name(), block, offset, len, "read block");
        self.block = Some(block);
        self.file_offset = offset + len as u64;
        self.stats.blocks_read += 1;
        self.stats.bytes_read += len as u64;
        Ok(())
    }
}
