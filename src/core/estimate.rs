//! Purpose: Turn pushed-down filters into per-column plans, row estimates and a scan order.
//! Exports: `ColumnPlan`, `Estimate`, `estimate`.
//! Role: Planning step run once per query; its output drives `Scan`.
//! Invariants: `matching_rows` never undercounts rows that satisfy every filter.
//! Invariants: `order` is ascending by per-column estimate, ties in table order.
use std::collections::BTreeMap;

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::meta::{ColumnDescriptor, TableDescriptor};
use crate::core::prune::{self, Filter, SkipSet};

/// Everything a scan needs to know about one participating column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnPlan {
    pub column: usize,
    pub filters: Vec<Filter>,
    pub skip_set: SkipSet,
    /// Rows in blocks outside `skip_set`.
    pub estimate: u64,
}

impl ColumnPlan {
    pub(crate) fn unfiltered(column: usize, descriptor: &ColumnDescriptor) -> Self {
        Self {
            column,
            filters: Vec::new(),
            skip_set: SkipSet::empty(descriptor.block_count()),
            estimate: descriptor.total_rows(),
        }
    }

    fn finalize(&mut self, descriptor: &ColumnDescriptor) {
        self.skip_set = prune::skip_set_for(descriptor, &self.filters);
        self.estimate = surviving_rows(descriptor, &self.skip_set);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Estimate {
    pub total_rows: u64,
    pub matching_rows: u64,
    pub plans: BTreeMap<usize, ColumnPlan>,
    /// Column positions, most selective first.
    pub order: Vec<usize>,
}

impl Estimate {
    pub fn plan(&self, column: usize) -> Option<&ColumnPlan> {
        self.plans.get(&column)
    }

    pub fn skipped_blocks(&self) -> usize {
        self.plans.values().map(|plan| plan.skip_set.len()).sum()
    }
}

/// Plans a scan of `table` for `filters`, reading `used_columns` (1-based).
///
/// Every filtered or used column gets a [`ColumnPlan`]. When neither names a
/// column, column 1 participates so rows can still be counted.
pub fn estimate(
    table: &TableDescriptor,
    filters: &[Filter],
    used_columns: &[usize],
) -> Result<Estimate, Error> {
    let mut plans: BTreeMap<usize, ColumnPlan> = BTreeMap::new();

    for filter in filters {
        let descriptor = table.require_column(filter.column)?;
        check_comparable(filter, descriptor)?;
        plans
            .entry(filter.column)
            .or_insert_with(|| ColumnPlan::unfiltered(filter.column, descriptor))
            .filters
            .push(filter.clone());
    }
    for &column in used_columns {
        let descriptor = table.require_column(column)?;
        plans
            .entry(column)
            .or_insert_with(|| ColumnPlan::unfiltered(column, descriptor));
    }
    if plans.is_empty() {
        let descriptor = table.require_column(1)?;
        plans.insert(1, ColumnPlan::unfiltered(1, descriptor));
    }

    for (column, plan) in plans.iter_mut() {
        let descriptor = table.require_column(*column)?;
        plan.finalize(descriptor);
        debug!(
            column = descriptor.name(),
            filters = plan.filters.len(),
            skipped_blocks = plan.skip_set.len(),
            blocks = descriptor.block_count(),
            estimate = plan.estimate,
            "planned column"
        );
    }

    let total_rows = table.total_rows();
    let matching_rows = plans
        .values()
        .filter(|plan| !plan.filters.is_empty())
        .map(|plan| plan.estimate)
        .min()
        .unwrap_or(total_rows);

    let mut order: Vec<usize> = plans.keys().copied().collect();
    order.sort_by_key(|column| plans[column].estimate);

    debug!(total_rows, matching_rows, ?order, "estimated scan");
    Ok(Estimate {
        total_rows,
        matching_rows,
        plans,
        order,
    })
}

pub(crate) fn check_comparable(
    filter: &Filter,
    descriptor: &ColumnDescriptor,
) -> Result<(), Error> {
    if filter.constant.comparable_with(descriptor.column_type()) {
        return Ok(());
    }
    Err(Error::new(ErrorKind::TypeMismatch)
        .with_message(format!(
            "cannot compare {} constant with {} column",
            filter.constant.type_name(),
            descriptor.column_type().as_str()
        ))
        .with_column(descriptor.name()))
}

fn surviving_rows(descriptor: &ColumnDescriptor, skip: &SkipSet) -> u64 {
    descriptor
        .blocks()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !skip.contains(*idx))
        .map(|(_, stat)| u64::from(stat.count))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::estimate;
    use crate::core::error::ErrorKind;
    use crate::core::fixture::FixtureTable;
    use crate::core::meta::{TableDescriptor, TableOptions};
    use crate::core::prune::{CompareOp, Filter};
    use std::io::Cursor;

    fn table(fixture: &FixtureTable) -> TableDescriptor {
        TableDescriptor::load(&mut Cursor::new(fixture.to_bytes()), &TableOptions::default())
            .expect("load")
    }

    fn id_name_table() -> TableDescriptor {
        table(
            &FixtureTable::new(3)
                .int("id", &[1, 2, 3, 4, 5, 6])
                .str("name", &["a", "b", "c", "d", "e", "f"]),
        )
    }

    #[test]
    fn gt_filter_estimates_surviving_block() {
        let table = id_name_table();
        let est = estimate(&table, &[Filter::new(1, CompareOp::Gt, 3)], &[1, 2]).expect("estimate");
        assert_eq!(est.total_rows, 6);
        assert_eq!(est.matching_rows, 3);
        let id = est.plan(1).expect("id plan");
        assert_eq!(id.skip_set.iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(id.estimate, 3);
        assert_eq!(est.plan(2).expect("name plan").estimate, 6);
        assert_eq!(est.order, vec![1, 2]);
    }

    #[test]
    fn most_selective_column_comes_first() {
        let table = id_name_table();
        let filters = [
            Filter::new(1, CompareOp::Ge, 1),
            Filter::new(2, CompareOp::Eq, "e"),
        ];
        let est = estimate(&table, &filters, &[1, 2]).expect("estimate");
        assert_eq!(est.plan(2).expect("name").estimate, 3);
        assert_eq!(est.plan(1).expect("id").estimate, 6);
        assert_eq!(est.order, vec![2, 1]);
        assert_eq!(est.matching_rows, 3);
    }

    #[test]
    fn without_filters_estimate_is_total() {
        let table = id_name_table();
        let est = estimate(&table, &[], &[2]).expect("estimate");
        assert_eq!(est.matching_rows, 6);
        assert_eq!(est.order, vec![2]);
        assert_eq!(est.skipped_blocks(), 0);
    }

    #[test]
    fn count_only_query_uses_first_column() {
        let table = id_name_table();
        let est = estimate(&table, &[], &[]).expect("estimate");
        assert_eq!(est.order, vec![1]);
        assert_eq!(est.matching_rows, 6);
    }

    #[test]
    fn filters_on_same_column_share_one_plan() {
        let table = id_name_table();
        let filters = [
            Filter::new(1, CompareOp::Gt, 3),
            Filter::new(1, CompareOp::Lt, 3),
        ];
        let est = estimate(&table, &filters, &[]).expect("estimate");
        assert_eq!(est.plans.len(), 1);
        let plan = est.plan(1).expect("id");
        assert_eq!(plan.filters.len(), 2);
        assert_eq!(plan.estimate, 0);
        assert_eq!(est.matching_rows, 0);
    }

    #[test]
    fn incomparable_constant_is_type_mismatch() {
        let table = id_name_table();
        let err = estimate(&table, &[Filter::new(1, CompareOp::Eq, "one")], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.column(), Some("id"));

        let err = estimate(&table, &[Filter::new(2, CompareOp::Lt, 4)], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn unknown_column_is_usage_error() {
        let table = id_name_table();
        let err = estimate(&table, &[Filter::new(3, CompareOp::Eq, 1)], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = estimate(&table, &[], &[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn estimate_never_undercounts() {
        let ids: Vec<i32> = (0..40).map(|i| (i * 7) % 23).collect();
        let scores: Vec<f32> = (0..40).map(|i| i as f32 * 0.5).collect();
        let table = table(&FixtureTable::new(6).int("id", &ids).float("score", &scores));
        for threshold in [0, 5, 11, 22, 30] {
            let filters = [
                Filter::new(1, CompareOp::Le, threshold),
                Filter::new(2, CompareOp::Gt, 4.0f32),
            ];
            let est = estimate(&table, &filters, &[]).expect("estimate");
            let actual = ids
                .iter()
                .zip(&scores)
                .filter(|(id, score)| **id <= threshold && **score > 4.0)
                .count() as u64;
            assert!(est.matching_rows >= actual, "threshold {threshold}");
        }
    }
}
