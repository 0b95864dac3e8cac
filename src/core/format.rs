//! Purpose: Centralize the db721 on-disk layout: trailer size, value widths, slot decoding.
//! Exports: `ColumnType`, `META_SIZE_LEN`, `STR_SLOT_LEN`, `NUMERIC_WIDTH`, `decode_value`.
//! Role: Shared by the metadata loader (stat decoding) and column cursors (block decoding).
//! Invariants: Numeric values are 4-byte little-endian; strings are 32-byte NUL-padded slots.
//! Invariants: A string slot with no NUL is a full 32-byte value.

use crate::core::value::Value;

/// Width of the trailing little-endian `u32` holding the metadata length.
pub const META_SIZE_LEN: u64 = 4;
pub const STR_SLOT_LEN: usize = 32;
pub const NUMERIC_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Float32,
    Int32,
    FixedString32,
}

impl ColumnType {
    /// Maps the metadata `type` tag; unknown tags are strings.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "float" => ColumnType::Float32,
            "int" => ColumnType::Int32,
            _ => ColumnType::FixedString32,
        }
    }

    pub fn value_width(self) -> usize {
        match self {
            ColumnType::Float32 | ColumnType::Int32 => NUMERIC_WIDTH,
            ColumnType::FixedString32 => STR_SLOT_LEN,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnType::FixedString32)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Float32 => "float",
            ColumnType::Int32 => "int",
            ColumnType::FixedString32 => "str",
        }
    }
}

/// Decodes one value slot. `slot.len()` must equal `column_type.value_width()`.
pub fn decode_value(column_type: ColumnType, slot: &[u8]) -> Value<'_> {
    match column_type {
        ColumnType::Float32 => Value::Float32(f32::from_le_bytes(read_4(slot))),
        ColumnType::Int32 => Value::Int32(i32::from_le_bytes(read_4(slot))),
        ColumnType::FixedString32 => Value::Str(string_slot(slot)),
    }
}

/// Bytes of a string slot up to the first NUL, or the whole slot when unterminated.
pub fn string_slot(slot: &[u8]) -> &[u8] {
    match slot.iter().position(|&b| b == 0) {
        Some(end) => &slot[..end],
        None => slot,
    }
}

pub(crate) fn read_4(buf: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[..4]);
    out
}
