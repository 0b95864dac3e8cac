//! Purpose: Build db721 files for tests.
//! Exports: `FixtureTable`, `FixtureColumn`, `assemble`, `init_tracing`.
//! Role: Test-only writer; the engine itself never writes db721 files.
//! Invariants: Uses only std, serde_json and tracing-subscriber; integration tests `#[path]` it in.
//! Invariants: Generated stats are exact min/max per block, keys emitted in declaration order.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

const SLOT: usize = 32;

#[derive(Clone, Debug)]
pub enum FixtureColumn {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Str(Vec<Vec<u8>>),
}

impl FixtureColumn {
    fn len(&self) -> usize {
        match self {
            FixtureColumn::Float(values) => values.len(),
            FixtureColumn::Int(values) => values.len(),
            FixtureColumn::Str(values) => values.len(),
        }
    }

    fn width(&self) -> usize {
        match self {
            FixtureColumn::Str(_) => SLOT,
            _ => 4,
        }
    }

    fn type_tag(&self) -> &'static str {
        match self {
            FixtureColumn::Float(_) => "float",
            FixtureColumn::Int(_) => "int",
            FixtureColumn::Str(_) => "str",
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            FixtureColumn::Float(values) => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            FixtureColumn::Int(values) => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            FixtureColumn::Str(values) => {
                for v in values {
                    let mut slot = [0u8; SLOT];
                    let len = v.len().min(SLOT);
                    slot[..len].copy_from_slice(&v[..len]);
                    out.extend_from_slice(&slot);
                }
            }
        }
    }

    fn block_stats(&self, start: usize, end: usize) -> Value {
        let num = end - start;
        match self {
            FixtureColumn::Float(values) => {
                let block = &values[start..end];
                let min = block.iter().cloned().fold(f32::INFINITY, f32::min);
                let max = block.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                json!({"num": num, "min": min, "max": max})
            }
            FixtureColumn::Int(values) => {
                let block = &values[start..end];
                let min = block.iter().min().copied().unwrap_or_default();
                let max = block.iter().max().copied().unwrap_or_default();
                json!({"num": num, "min": min, "max": max})
            }
            FixtureColumn::Str(values) => {
                let block: Vec<&[u8]> = values[start..end]
                    .iter()
                    .map(|v| &v[..v.len().min(SLOT)])
                    .collect();
                let min = block.iter().min().copied().unwrap_or_default();
                let max = block.iter().max().copied().unwrap_or_default();
                let min_len = block.iter().map(|v| v.len()).min().unwrap_or_default();
                let max_len = block.iter().map(|v| v.len()).max().unwrap_or_default();
                json!({
                    "num": num,
                    "min": String::from_utf8_lossy(min),
                    "max": String::from_utf8_lossy(max),
                    "min_len": min_len,
                    "max_len": max_len,
                })
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FixtureTable {
    max_block: u16,
    columns: Vec<(String, FixtureColumn)>,
}

impl FixtureTable {
    pub fn new(max_block: u16) -> Self {
        Self {
            max_block,
            columns: Vec::new(),
        }
    }

    pub fn int(mut self, name: &str, values: &[i32]) -> Self {
        self.columns
            .push((name.to_string(), FixtureColumn::Int(values.to_vec())));
        self
    }

    pub fn float(mut self, name: &str, values: &[f32]) -> Self {
        self.columns
            .push((name.to_string(), FixtureColumn::Float(values.to_vec())));
        self
    }

    pub fn str(mut self, name: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.as_bytes().to_vec()).collect();
        self.columns
            .push((name.to_string(), FixtureColumn::Str(values)));
        self
    }

    pub fn str_bytes(mut self, name: &str, values: Vec<Vec<u8>>) -> Self {
        self.columns.push((name.to_string(), FixtureColumn::Str(values)));
        self
    }

    /// Column blocks, concatenated in declaration order.
    pub fn data(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, column) in &self.columns {
            column.encode(&mut out);
        }
        out
    }

    /// Exact metadata document for `data()`.
    pub fn metadata(&self) -> Value {
        let block = self.max_block.max(1) as usize;
        let mut columns = Map::new();
        let mut offset = 0usize;
        for (name, column) in &self.columns {
            let len = column.len();
            let mut stats = Map::new();
            let mut start = 0usize;
            let mut idx = 0usize;
            while start < len {
                let end = (start + block).min(len);
                stats.insert(idx.to_string(), column.block_stats(start, end));
                start = end;
                idx += 1;
            }
            columns.insert(
                name.clone(),
                json!({
                    "type": column.type_tag(),
                    "block_stats": Value::Object(stats),
                    "num_blocks": idx,
                    "start_offset": offset,
                }),
            );
            offset += len * column.width();
        }
        json!({
            "Max Values Per Block": self.max_block,
            "Columns": Value::Object(columns),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_metadata(&self.metadata())
    }

    pub fn to_bytes_with_metadata(&self, metadata: &Value) -> Vec<u8> {
        let doc = serde_json::to_vec(metadata).expect("encode metadata");
        assemble(&self.data(), &doc)
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        write_bytes(dir, name, &self.to_bytes())
    }
}

/// Concatenates data, metadata and the little-endian metadata length.
pub fn assemble(data: &[u8], metadata: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + metadata.len() + 4);
    out.extend_from_slice(data);
    out.extend_from_slice(metadata);
    out.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    out
}

pub fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
