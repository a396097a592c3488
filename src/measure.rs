//! Per-recording shimmer measurement and its batch accumulator.

mod accumulator;
mod stage;

use serde::{Serialize, Serializer};

use crate::engine::ShimmerKind;

pub use accumulator::ShimmerAccumulator;
pub use stage::{ShimmerStage, measure_recording};

/// Marker written in place of a metric whose measurement failed.
pub const MEASUREMENT_FAILED: &str = "Shimmer measurement failed";

/// One shimmer value, or the failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    Failed,
}

impl Metric {
    /// The numeric value when it is present and finite.
    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) if v.is_finite() => Some(v),
            _ => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Metric::Failed)
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64(*v),
            Metric::Failed => serializer.serialize_str(MEASUREMENT_FAILED),
        }
    }
}

/// The six shimmer fields for one recording: all values or all failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementRecord {
    #[serde(rename = "local_shimmer")]
    local: Metric,
    #[serde(rename = "localdb_shimmer")]
    local_db: Metric,
    #[serde(rename = "apq3_shimmer")]
    apq3: Metric,
    #[serde(rename = "apq5_shimmer")]
    apq5: Metric,
    #[serde(rename = "apq11_shimmer")]
    apq11: Metric,
    #[serde(rename = "dda_shimmer")]
    dda: Metric,
}

impl MeasurementRecord {
    /// Build a record from six values in [`ShimmerKind::ALL`] order.
    pub fn from_values(values: [f64; 6]) -> Self {
        let [local, local_db, apq3, apq5, apq11, dda] = values.map(Metric::Value);
        Self {
            local,
            local_db,
            apq3,
            apq5,
            apq11,
            dda,
        }
    }

    /// The all-failed record.
    pub fn failed() -> Self {
        Self {
            local: Metric::Failed,
            local_db: Metric::Failed,
            apq3: Metric::Failed,
            apq5: Metric::Failed,
            apq11: Metric::Failed,
            dda: Metric::Failed,
        }
    }

    pub fn get(&self, kind: ShimmerKind) -> Metric {
        match kind {
            ShimmerKind::Local => self.local,
            ShimmerKind::LocalDb => self.local_db,
            ShimmerKind::Apq3 => self.apq3,
            ShimmerKind::Apq5 => self.apq5,
            ShimmerKind::Apq11 => self.apq11,
            ShimmerKind::Dda => self.dda,
        }
    }

    /// Metrics in [`ShimmerKind::ALL`] order.
    pub fn metrics(&self) -> [Metric; 6] {
        ShimmerKind::ALL.map(|kind| self.get(kind))
    }

    pub fn is_failed(&self) -> bool {
        self.local.is_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_serializes_markers() {
        let json = serde_json::to_value(MeasurementRecord::failed()).unwrap();
        assert_eq!(json["local_shimmer"], MEASUREMENT_FAILED);
        assert_eq!(json["dda_shimmer"], MEASUREMENT_FAILED);
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn value_record_serializes_numbers_in_kind_order() {
        let record = MeasurementRecord::from_values([0.1, 0.9, 0.03, 0.04, 0.05, 0.09]);
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["localdb_shimmer"], 0.9);
        assert_eq!(json["apq11_shimmer"], 0.05);
        assert_eq!(record.get(ShimmerKind::Apq3), Metric::Value(0.03));
        assert!(!record.is_failed());
        assert!(record.metrics().iter().all(|m| m.value().is_some()));
    }

    #[test]
    fn non_finite_value_is_not_numeric() {
        assert_eq!(Metric::Value(f64::NAN).value(), None);
        assert_eq!(Metric::Failed.value(), None);
    }
}
