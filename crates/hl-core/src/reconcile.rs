//! Reconciliation of a day's local measurements with the external store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::measurement::{Measurement, MeasurementSet, MeasurementSource};
use crate::metric::{MetricType, Unit};
use crate::types::ExternalId;

/// A measurement as reported by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMeasurement {
    pub external_id: ExternalId,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: Unit,
    /// Local ID echoed back from export metadata, if this record was
    /// exported from here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<Uuid>,
}

/// A local measurement to write to the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMeasurement {
    pub metric: MetricType,
    pub local_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: Unit,
}

impl ExportMeasurement {
    pub fn new(metric: MetricType, measurement: &Measurement) -> Self {
        Self {
            metric,
            local_id: measurement.id,
            timestamp: measurement.date_time,
            value: measurement.value,
            unit: metric.canonical_unit(),
        }
    }
}

/// Outcome of reconciling one metric on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The reconciled measurement set.
    pub set: MeasurementSet,
    /// Number of external measurements imported.
    pub imported: usize,
    /// Number of externally sourced measurements dropped because the store
    /// no longer has them.
    pub removed: usize,
    /// External IDs to delete at the store.
    pub to_delete_external: Vec<ExternalId>,
    /// Local measurements to export.
    pub to_export: Vec<ExportMeasurement>,
    /// Number of local measurements whose export was seen for the first time.
    pub echoes_recorded: usize,
}

impl Reconciliation {
    /// Whether the measurement set differs from the input.
    pub const fn changed(&self) -> bool {
        self.imported > 0 || self.removed > 0 || self.echoes_recorded > 0
    }
}

/// Reconciles `set` against the store's measurements of `metric` for the
/// same day.
///
/// User-entered and equation-derived measurements are never removed here.
/// Reconciling the result again with the same external input schedules the
/// same deletes and exports and changes nothing.
pub fn reconcile(
    set: &MeasurementSet,
    metric: MetricType,
    external: &[ExternalMeasurement],
) -> Reconciliation {
    let mut set = set.clone();

    let normalized: Vec<(&ExternalMeasurement, f64)> = external
        .iter()
        .filter_map(|record| match record.unit.to_canonical(metric, record.value) {
            Some(value) => Some((record, value)),
            None => {
                tracing::warn!(
                    %metric,
                    unit = %record.unit,
                    external_id = %record.external_id,
                    "skipping external measurement with incompatible unit"
                );
                None
            }
        })
        .collect();

    // Exports echoing back: remember the ID the store assigned.
    let mut echoes_recorded = 0;
    for (record, _) in &normalized {
        let Some(local_id) = record.local_id else {
            continue;
        };
        if let Some(local) = set
            .measurements
            .iter_mut()
            .find(|m| m.id == local_id && m.is_local() && m.exported_as.is_none())
        {
            local.exported_as = Some(record.external_id.clone());
            echoes_recorded += 1;
        }
    }

    let present = |id: &ExternalId| normalized.iter().any(|(record, _)| &record.external_id == id);

    let before = set.measurements.len();
    set.measurements.retain(|m| match &m.source {
        MeasurementSource::ExternalSync { external_id } => present(external_id),
        _ => true,
    });
    let removed = before - set.measurements.len();

    let mut to_delete_external = Vec::new();
    let mut imported = 0;
    for (record, value) in &normalized {
        let id = &record.external_id;
        if set.deleted_external.iter().any(|m| m.external_id() == Some(id)) {
            to_delete_external.push(id.clone());
            continue;
        }
        if set.knows_external_id(id) {
            continue;
        }
        if record.local_id.is_some() {
            // A stale or duplicate copy of one of our own exports.
            to_delete_external.push(id.clone());
            continue;
        }
        set.measurements
            .push(Measurement::external(id.clone(), record.timestamp, *value));
        imported += 1;
    }
    if imported > 0 {
        set.sort();
    }

    let to_export = set
        .measurements
        .iter()
        .filter(|m| m.is_local() && m.exported_as.is_none())
        .map(|m| ExportMeasurement::new(metric, m))
        .collect();

    Reconciliation {
        set,
        imported,
        removed,
        to_delete_external,
        to_export,
        echoes_recorded,
    }
}
