//! Purpose: Decide which blocks of a column cannot satisfy pushed-down comparisons.
//! Exports: `CompareOp`, `Filter`, `SkipSet`, `apply_filter`, `skip_set_for`.
//! Role: Pure planning over block statistics; never touches the file.
//! Invariants: Pruning is sound: a skipped block holds no row satisfying the filter.
//! Invariants: `Ne` never prunes; incomparable bounds (NaN) never prune.
//! Invariants: A stored NaN value matches no operator, `Ne` included.
use std::cmp::Ordering;
use std::fmt;

use crate::core::meta::{BlockStat, ColumnDescriptor};
use crate::core::value::{self, Datum, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
        }
    }

    /// Whether `ordering` (of value relative to constant) satisfies the operator.
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        }
    }
}

/// `column <op> constant`, with `column` a 1-based table position.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: usize,
    pub op: CompareOp,
    pub constant: Datum,
}

impl Filter {
    pub fn new(column: usize, op: CompareOp, constant: impl Into<Datum>) -> Self {
        Self {
            column,
            op,
            constant: constant.into(),
        }
    }

    /// Exact per-value check. Incomparable values never match.
    pub fn matches(&self, value: Value<'_>) -> bool {
        value::compare(value, self.constant.as_value())
            .is_some_and(|ordering| self.op.holds(ordering))
    }

    /// True when `stat` proves no value in the block satisfies this filter.
    pub fn excludes(&self, stat: &BlockStat) -> bool {
        let constant = self.constant.as_value();
        let against_min = || value::compare(constant, stat.min.as_value());
        let against_max = || value::compare(constant, stat.max.as_value());
        // Each arm states when the block may hold a match; unknown orderings keep the block.
        let may_match = match self.op {
            CompareOp::Lt => against_min().is_none_or(|o| o == Ordering::Greater),
            CompareOp::Le => against_min().is_none_or(|o| o != Ordering::Less),
            CompareOp::Gt => against_max().is_none_or(|o| o == Ordering::Less),
            CompareOp::Ge => against_max().is_none_or(|o| o != Ordering::Greater),
            CompareOp::Eq => {
                against_min().is_none_or(|o| o != Ordering::Less)
                    && against_max().is_none_or(|o| o != Ordering::Greater)
            }
            CompareOp::Ne => true,
        };
        !may_match
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.column, self.op.symbol(), self.constant)
    }
}

/// Block indices of one column that a scan never reads.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SkipSet {
    skipped: Vec<bool>,
    len: usize,
}

impl SkipSet {
    pub fn empty(block_count: usize) -> Self {
        Self {
            skipped: vec![false; block_count],
            len: 0,
        }
    }

    pub fn contains(&self, block: usize) -> bool {
        self.skipped.get(block).copied().unwrap_or(false)
    }

    pub fn insert(&mut self, block: usize) {
        if let Some(slot) = self.skipped.get_mut(block) {
            if !*slot {
                *slot = true;
                self.len += 1;
            }
        }
    }

    pub fn union_with(&mut self, other: &SkipSet) {
        for block in other.iter() {
            self.insert(block);
        }
    }

    /// Number of skipped blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn block_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.skipped
            .iter()
            .enumerate()
            .filter_map(|(idx, skipped)| skipped.then_some(idx))
    }
}

/// Blocks of `column` that `filter` excludes.
pub fn apply_filter(column: &ColumnDescriptor, filter: &Filter) -> SkipSet {
    let mut skip = SkipSet::empty(column.block_count());
    for (idx, stat) in column.blocks().iter().enumerate() {
        if filter.excludes(stat) {
            skip.insert(idx);
        }
    }
    skip
}

/// Union of `apply_filter` over every filter on `column`.
pub fn skip_set_for<'f>(
    column: &ColumnDescriptor,
    filters: impl IntoIterator<Item = &'f Filter>,
) -> SkipSet {
    let mut skip = SkipSet::empty(column.block_count());
    for filter in filters {
        skip.union_with(&apply_filter(column, filter));
    }
    skip
}
