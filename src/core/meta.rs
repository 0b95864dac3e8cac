// Table metadata: trailer decoding, column/block statistics, and layout validation.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{self, ColumnType, META_SIZE_LEN, STR_SLOT_LEN};
use crate::core::value::{self, Datum};

const DEFAULT_MAX_METADATA_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct TableOptions {
    pub max_metadata_size: u32,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_metadata_size(mut self, max_metadata_size: u32) -> Self {
        self.max_metadata_size = max_metadata_size;
        self
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_metadata_size: DEFAULT_MAX_METADATA_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockStat {
    pub count: u16,
    pub min: Datum,
    pub max: Datum,
    /// Byte lengths before padding; zero for numeric columns.
    pub min_len: u8,
    pub max_len: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct BlockSpan {
    first_row: u64,
    offset: u64,
}

#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    name: String,
    column_type: ColumnType,
    start_offset: u32,
    blocks: Vec<BlockStat>,
    spans: Vec<BlockSpan>,
    total_rows: u64,
}

impl ColumnDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn start_offset(&self) -> u32 {
        self.start_offset
    }

    pub fn blocks(&self) -> &[BlockStat] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn value_width(&self) -> usize {
        self.column_type.value_width()
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Row-id (1-based) of the first value in `block`.
    pub fn block_first_row(&self, block: usize) -> u64 {
        self.spans[block].first_row
    }

    /// Row-id of the last value in `block`.
    pub fn block_last_row(&self, block: usize) -> u64 {
        self.spans[block].first_row + u64::from(self.blocks[block].count) - 1
    }

    /// Absolute file offset of `block`.
    pub fn block_offset(&self, block: usize) -> u64 {
        self.spans[block].offset
    }

    /// Byte length of `block` on disk.
    pub fn block_len(&self, block: usize) -> usize {
        usize::from(self.blocks[block].count) * self.value_width()
    }
}

#[derive(Clone, Debug)]
pub struct TableDescriptor {
    path: Option<PathBuf>,
    max_block_size: u16,
    columns: Vec<ColumnDescriptor>,
    total_rows: u64,
    data_len: u64,
}

impl TableDescriptor {
    pub fn open(path: impl AsRef<Path>, options: &TableOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;
        let mut table = Self::load(&mut file, options).map_err(|err| err.with_path(&path))?;
        debug!(
            path = %path.display(),
            columns = table.columns.len(),
            rows = table.total_rows,
            "opened db721 table"
        );
        table.path = Some(path);
        Ok(table)
    }

    /// Reads the trailer and metadata document from any seekable source.
    pub fn load<R: Read + Seek>(reader: &mut R, options: &TableOptions) -> Result<Self, Error> {
        let file_len = reader.seek(SeekFrom::End(0)).map_err(io_error)?;
        if file_len < META_SIZE_LEN {
            return Err(Error::new(ErrorKind::Format)
                .with_message("file too small for metadata trailer"));
        }

        let mut trailer = [0u8; META_SIZE_LEN as usize];
        reader
            .seek(SeekFrom::Start(file_len - META_SIZE_LEN))
            .map_err(io_error)?;
        reader.read_exact(&mut trailer).map_err(io_error)?;
        let meta_size = u32::from_le_bytes(trailer);

        if meta_size > options.max_metadata_size {
            return Err(Error::new(ErrorKind::Format)
                .with_message(format!(
                    "metadata size {meta_size} exceeds limit {}",
                    options.max_metadata_size
                ))
                .with_hint("Raise TableOptions::max_metadata_size if the file is trusted."));
        }
        let available = file_len - META_SIZE_LEN;
        if u64::from(meta_size) > available {
            return Err(Error::new(ErrorKind::Format).with_message(format!(
                "metadata size {meta_size} exceeds {available} available bytes"
            )));
        }
        let data_len = available - u64::from(meta_size);

        let mut doc = vec![0u8; meta_size as usize];
        reader.seek(SeekFrom::Start(data_len)).map_err(io_error)?;
        reader.read_exact(&mut doc).map_err(io_error)?;

        let table = Self::from_metadata(&doc, data_len)?;
        debug!(
            columns = table.columns.len(),
            rows = table.total_rows,
            max_block_size = table.max_block_size,
            data_len,
            "loaded db721 metadata"
        );
        Ok(table)
    }

    /// Parses a metadata document describing `data_len` bytes of column blocks.
    pub fn from_metadata(doc: &[u8], data_len: u64) -> Result<Self, Error> {
        let raw: RawTable = serde_json::from_slice(doc).map_err(|err| {
            Error::new(ErrorKind::Format)
                .with_message("metadata is not a valid db721 document")
                .with_source(err)
        })?;

        let max_block_size = raw.max_values_per_block;
        let mut columns = Vec::with_capacity(raw.columns.len());
        for (name, raw_column) in raw.columns {
            let raw_column: RawColumn = serde_json::from_value(raw_column).map_err(|err| {
                Error::new(ErrorKind::Format)
                    .with_message("malformed column entry")
                    .with_column(&name)
                    .with_source(err)
            })?;
            let column = build_column(name, raw_column, max_block_size, data_len)?;
            columns.push(column);
        }

        let Some(first) = columns.first() else {
            return Err(Error::new(ErrorKind::Format).with_message("table has no columns"));
        };
        let total_rows = first.total_rows;
        if let Some(column) = columns.iter().find(|c| c.total_rows != total_rows) {
            return Err(Error::new(ErrorKind::Format)
                .with_message(format!(
                    "column holds {} rows, expected {total_rows}",
                    column.total_rows
                ))
                .with_column(&column.name));
        }

        Ok(Self {
            path: None,
            max_block_size,
            columns,
            total_rows,
            data_len,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn path_buf(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn max_block_size(&self) -> u16 {
        self.max_block_size
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column at 1-based `position`.
    pub fn column(&self, position: usize) -> Option<&ColumnDescriptor> {
        position
            .checked_sub(1)
            .and_then(|idx| self.columns.get(idx))
    }

    /// 1-based position of `name`, compared ASCII case-insensitively.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .map(|idx| idx + 1)
    }

    pub(crate) fn require_column(&self, position: usize) -> Result<&ColumnDescriptor, Error> {
        self.column(position).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!(
                "column position {position} outside 1..={}",
                self.columns.len()
            ))
        })
    }
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(rename = "Max Values Per Block")]
    max_values_per_block: u16,
    #[serde(rename = "Columns")]
    columns: Map<String, JsonValue>,
}

#[derive(Deserialize)]
struct RawColumn {
    #[serde(rename = "type")]
    type_tag: String,
    start_offset: u32,
    num_blocks: u32,
    #[serde(default)]
    block_stats: Map<String, JsonValue>,
}

#[derive(Deserialize)]
struct RawBlockStat {
    num: u16,
    min: JsonValue,
    max: JsonValue,
    #[serde(default)]
    min_len: Option<u8>,
    #[serde(default)]
    max_len: Option<u8>,
}

fn build_column(
    name: String,
    raw: RawColumn,
    max_block_size: u16,
    data_len: u64,
) -> Result<ColumnDescriptor, Error> {
    let column_type = ColumnType::from_tag(&raw.type_tag);
    let format_error = |message: String| {
        Error::new(ErrorKind::Format)
            .with_message(message)
            .with_column(&name)
    };

    if raw.num_blocks as usize != raw.block_stats.len() {
        return Err(format_error(format!(
            "num_blocks is {} but {} block stats are present",
            raw.num_blocks,
            raw.block_stats.len()
        )));
    }

    let mut slots: Vec<Option<BlockStat>> = vec![None; raw.block_stats.len()];
    for (key, raw_stat) in raw.block_stats {
        let idx: usize = key
            .parse()
            .map_err(|_| format_error(format!("block index {key:?} is not an integer")))?;
        let Some(slot) = slots.get_mut(idx) else {
            return Err(format_error(format!("block index {idx} out of range")));
        };
        if slot.is_some() {
            return Err(format_error(format!("duplicate stats for block {idx}")));
        }
        let raw_stat: RawBlockStat = serde_json::from_value(raw_stat).map_err(|err| {
            format_error("malformed block stats".to_string())
                .with_block(idx)
                .with_source(err)
        })?;
        let stat = decode_stat(column_type, raw_stat, max_block_size)
            .map_err(|message| format_error(message).with_block(idx))?;
        *slot = Some(stat);
    }
    // Every slot is filled: keys are unique, in range, and equal in number to the slots.
    let blocks: Vec<BlockStat> = slots.into_iter().flatten().collect();

    let width = column_type.value_width() as u64;
    let mut spans = Vec::with_capacity(blocks.len());
    let mut offset = u64::from(raw.start_offset);
    let mut next_row = 1u64;
    for stat in &blocks {
        spans.push(BlockSpan {
            first_row: next_row,
            offset,
        });
        offset += u64::from(stat.count) * width;
        next_row += u64::from(stat.count);
    }
    if offset > data_len {
        return Err(format_error(format!(
            "blocks end at byte {offset}, past the {data_len}-byte data region"
        ))
        .with_offset(u64::from(raw.start_offset)));
    }

    Ok(ColumnDescriptor {
        name,
        column_type,
        start_offset: raw.start_offset,
        blocks,
        spans,
        total_rows: next_row - 1,
    })
}

fn decode_stat(
    column_type: ColumnType,
    raw: RawBlockStat,
    max_block_size: u16,
) -> Result<BlockStat, String> {
    if raw.num == 0 || raw.num > max_block_size {
        return Err(format!(
            "block count {} outside 1..={max_block_size}",
            raw.num
        ));
    }
    let min = decode_bound(column_type, &raw.min)?;
    let max = decode_bound(column_type, &raw.max)?;
    if value::compare(min.as_value(), max.as_value()) == Some(std::cmp::Ordering::Greater) {
        return Err(format!("block min {min} exceeds max {max}"));
    }

    let (min_len, max_len) = match (&min, &max) {
        (Datum::Str(lo), Datum::Str(hi)) => {
            let min_len = raw.min_len.unwrap_or(lo.len() as u8);
            let max_len = raw.max_len.unwrap_or(hi.len() as u8);
            if usize::from(min_len) > STR_SLOT_LEN || usize::from(max_len) > STR_SLOT_LEN {
                return Err(format!(
                    "string lengths {min_len}/{max_len} exceed {STR_SLOT_LEN}"
                ));
            }
            (min_len, max_len)
        }
        _ => (0, 0),
    };

    Ok(BlockStat {
        count: raw.num,
        min,
        max,
        min_len,
        max_len,
    })
}

fn decode_bound(column_type: ColumnType, raw: &JsonValue) -> Result<Datum, String> {
    match column_type {
        ColumnType::Float32 => raw
            .as_f64()
            .map(|v| Datum::Float32(v as f32))
            .ok_or_else(|| format!("float stat {raw} is not a number")),
        ColumnType::Int32 => raw
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Datum::Int32)
            .ok_or_else(|| format!("int stat {raw} is not a 32-bit integer")),
        ColumnType::FixedString32 => {
            let text = raw
                .as_str()
                .ok_or_else(|| format!("string stat {raw} is not a string"))?;
            let bytes = text.as_bytes();
            let capped = &bytes[..bytes.len().min(STR_SLOT_LEN)];
            Ok(Datum::Str(format::string_slot(capped).to_vec()))
        }
    }
}

fn io_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to read metadata trailer")
        .with_source(err)
}
