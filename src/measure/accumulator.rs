use crate::engine::ShimmerKind;

use super::{MeasurementRecord, Metric};

/// Six lock-step metric columns, one row per measured recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShimmerAccumulator {
    columns: [Vec<Metric>; 6],
}

impl ShimmerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to every column.
    pub(crate) fn push(&mut self, record: &MeasurementRecord) {
        for (column, metric) in self.columns.iter_mut().zip(record.metrics()) {
            column.push(metric);
        }
        debug_assert!(self.is_aligned());
    }

    /// Number of recordings accumulated so far.
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, kind: ShimmerKind) -> &[Metric] {
        &self.columns[kind.column()]
    }

    /// Metrics of recording `index` in [`ShimmerKind::ALL`] order.
    pub fn row(&self, index: usize) -> Option<[Metric; 6]> {
        if index >= self.len() {
            return None;
        }
        Some(std::array::from_fn(|col| self.columns[col][index]))
    }

    pub fn rows(&self) -> impl Iterator<Item = [Metric; 6]> + '_ {
        (0..self.len()).filter_map(|index| self.row(index))
    }

    pub(crate) fn is_aligned(&self) -> bool {
        let len = self.columns[0].len();
        self.columns.iter().all(|column| column.len() == len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_records_keep_columns_aligned() {
        let mut acc = ShimmerAccumulator::new();
        acc.push(&MeasurementRecord::from_values([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        acc.push(&MeasurementRecord::failed());
        acc.push(&MeasurementRecord::from_values([0.5; 6]));
        assert_eq!(acc.len(), 3);
        for kind in ShimmerKind::ALL {
            assert_eq!(acc.column(kind).len(), 3);
            assert!(acc.column(kind)[1].is_failed());
        }
        assert_eq!(acc.row(0).unwrap()[5], Metric::Value(6.0));
        assert!(acc.row(3).is_none());
        assert_eq!(acc.rows().count(), 3);
    }
}
