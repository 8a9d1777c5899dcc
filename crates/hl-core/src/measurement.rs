//! Timestamped measurements and the per-day measurement set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{self, AggregationPolicy};
use crate::equation::BodyCompositionEquation;
use crate::types::{ExternalId, ValidationError};

/// Where a measurement came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementSource {
    /// Entered by the user.
    Manual,
    /// Derived from a body composition equation and recomputed on every
    /// recalculation.
    Equation { equation: BodyCompositionEquation },
    /// Imported from the external health store.
    ExternalSync { external_id: ExternalId },
}

/// A single timestamped value of one metric, in the metric's canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    pub value: f64,
    pub source: MeasurementSource,

    /// External ID of this locally created measurement's exported copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_as: Option<ExternalId>,

    /// The other body composition quantity implied by this measurement and
    /// the day's weight (fat % for lean body mass, kg for fat %).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<f64>,
}

impl Measurement {
    fn with_source(date_time: DateTime<Utc>, value: f64, source: MeasurementSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            date_time,
            value,
            source,
            exported_as: None,
            counterpart: None,
        }
    }

    /// A user-entered measurement.
    pub fn manual(date_time: DateTime<Utc>, value: f64) -> Self {
        Self::with_source(date_time, value, MeasurementSource::Manual)
    }

    /// An equation-derived measurement.
    pub fn from_equation(
        date_time: DateTime<Utc>,
        value: f64,
        equation: BodyCompositionEquation,
    ) -> Self {
        Self::with_source(date_time, value, MeasurementSource::Equation { equation })
    }

    /// A measurement imported from the external store.
    pub fn external(external_id: ExternalId, date_time: DateTime<Utc>, value: f64) -> Self {
        Self::with_source(
            date_time,
            value,
            MeasurementSource::ExternalSync { external_id },
        )
    }

    /// Checks that `value` can be stored as a measurement.
    pub fn validate_value(field: &'static str, value: f64) -> Result<f64, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(ValidationError::InvalidValue { field, value })
        }
    }

    /// The external ID this measurement corresponds to, if any: its source ID
    /// when imported, or the ID of its exported copy when created locally.
    pub fn external_id(&self) -> Option<&ExternalId> {
        match &self.source {
            MeasurementSource::ExternalSync { external_id } => Some(external_id),
            _ => self.exported_as.as_ref(),
        }
    }

    /// Whether this measurement originated locally (manual or equation).
    pub const fn is_local(&self) -> bool {
        !matches!(self.source, MeasurementSource::ExternalSync { .. })
    }

    /// The equation behind this measurement, if equation-sourced.
    pub const fn equation(&self) -> Option<BodyCompositionEquation> {
        match self.source {
            MeasurementSource::Equation { equation } => Some(equation),
            _ => None,
        }
    }
}

/// A day's measurements of one metric, plus tombstones for deleted
/// measurements that exist in the external store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    /// Live measurements, sorted by timestamp.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measurements: Vec<Measurement>,

    /// Measurements the user deleted that also exist externally. Their
    /// external IDs are never imported again.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_external: Vec<Measurement>,
}

impl MeasurementSet {
    /// Whether there are no live measurements.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Adds a measurement, keeping the list sorted by timestamp.
    pub fn add(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
        self.sort();
    }

    /// Stable sort by timestamp; equal timestamps keep their relative order.
    pub fn sort(&mut self) {
        self.measurements.sort_by_key(|m| m.date_time);
    }

    /// Removes the measurement with `id`.
    ///
    /// Measurements with an external counterpart are tombstoned so the next
    /// sync deletes them externally instead of importing them again.
    pub fn remove(&mut self, id: Uuid) -> Option<Measurement> {
        let index = self.measurements.iter().position(|m| m.id == id)?;
        let removed = self.measurements.remove(index);
        if removed.external_id().is_some() {
            self.deleted_external.push(removed.clone());
        }
        Some(removed)
    }

    /// Finds a live measurement by ID or unambiguous ID prefix.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Measurement> {
        let mut matches = self
            .measurements
            .iter()
            .filter(|m| m.id.to_string().starts_with(prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Whether a live measurement or tombstone carries `external_id`.
    pub fn knows_external_id(&self, external_id: &ExternalId) -> bool {
        self.measurements
            .iter()
            .chain(&self.deleted_external)
            .any(|m| m.external_id() == Some(external_id))
    }

    /// Whether `self` and `other` agree on everything the external store
    /// sees: each measurement's identity, timestamp, value, source and
    /// exported copy, and the tombstoned IDs. Derived counterparts are
    /// ignored.
    pub fn same_synced_state(&self, other: &Self) -> bool {
        fn synced(m: &Measurement) -> (Uuid, DateTime<Utc>, f64, &MeasurementSource, Option<&ExternalId>) {
            (m.id, m.date_time, m.value, &m.source, m.exported_as.as_ref())
        }
        let tombstones = |set: &Self| set.deleted_external.iter().map(|m| m.id).collect::<Vec<_>>();
        self.measurements.len() == other.measurements.len()
            && self
                .measurements
                .iter()
                .zip(&other.measurements)
                .all(|(a, b)| synced(a) == synced(b))
            && tombstones(self) == tombstones(other)
    }

    /// The daily value under `policy`.
    pub fn daily_value(&self, policy: AggregationPolicy) -> Option<f64> {
        aggregate::reduce(&self.measurements, policy)
    }

    /// The daily value of the measurements' counterparts under `policy`.
    pub fn counterpart_value(&self, policy: AggregationPolicy) -> Option<f64> {
        aggregate::reduce_by(&self.measurements, policy, |m| m.counterpart)
    }
}
