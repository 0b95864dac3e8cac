//! Purpose: Owned table handle tying a shared descriptor to per-scan file handles.
//! Exports: `Table`, `open_table`.
//! Role: Entry point for hosts: open once, estimate per query, one file handle per scan.
//! Invariants: The descriptor is immutable and shared via `Arc`; readers are never shared.
//! Invariants: No registry; callers cache `Table` values themselves if they want to.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::core::estimate::{self, Estimate};
use crate::core::meta::{TableDescriptor, TableOptions};
use crate::core::prune::Filter;
use crate::core::scan::Scan;

#[derive(Clone, Debug)]
pub struct Table {
    descriptor: Arc<TableDescriptor>,
}

/// Opens `path` with default [`TableOptions`].
pub fn open_table(path: impl AsRef<Path>) -> Result<Table, Error> {
    Table::open(path)
}

impl Table {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, &TableOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &TableOptions) -> Result<Self, Error> {
        let descriptor = TableDescriptor::open(path, options)?;
        Ok(Self::from_descriptor(Arc::new(descriptor)))
    }

    pub fn from_descriptor(descriptor: Arc<TableDescriptor>) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &Arc<TableDescriptor> {
        &self.descriptor
    }

    pub fn total_rows(&self) -> u64 {
        self.descriptor.total_rows()
    }

    /// Plans a query: skip-sets, row estimates and column order.
    pub fn estimate(&self, filters: &[Filter], used_columns: &[usize]) -> Result<Estimate, Error> {
        estimate::estimate(&self.descriptor, filters, used_columns)
    }

    /// Starts a scan on a fresh handle to the table's file.
    pub fn begin_scan(
        &self,
        estimate: &Estimate,
        requested: &[usize],
    ) -> Result<Scan<File>, Error> {
        let Some(path) = self.descriptor.path() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table was not opened from a path")
                .with_hint("Use Table::begin_scan_with to supply a reader."));
        };
        let file = File::open(path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        self.begin_scan_with(file, estimate, requested)
    }

    /// Starts a scan over a caller-supplied reader positioned anywhere.
    pub fn begin_scan_with<R: Read + Seek>(
        &self,
        reader: R,
        estimate: &Estimate,
        requested: &[usize],
    ) -> Result<Scan<R>, Error> {
        Scan::new(Arc::clone(&self.descriptor), reader, estimate, requested)
    }
}
