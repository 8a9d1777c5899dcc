//! Core domain logic for the health log.
//!
//! This crate contains the fundamental types and logic for:
//! - Equations: resting energy and body composition estimates
//! - Aggregation: reducing a day's measurements to a daily value
//! - Reconciliation: diffing local measurements against the external store
//! - Recalculation: deriving each day's state, one day or the whole timeline

pub mod adaptive;
pub mod aggregate;
pub mod equation;
pub mod health;
pub mod measurement;
pub mod metric;
pub mod recalc;
pub mod reconcile;
pub mod settings;
pub mod timeline;
pub mod types;

pub use aggregate::{AggregationPolicy, AggregationSettings};
pub use equation::{ActivityLevel, BodyCompositionEquation, EquationInputs, RestingEnergyEquation};
pub use health::{
    ActiveEnergySource, Characteristics, Day, DietaryEnergyPoint, DietaryEnergySource,
    HealthDetails, Maintenance, MaintenanceConfig, RestingEnergySource,
};
pub use measurement::{Measurement, MeasurementSet, MeasurementSource};
pub use metric::{MetricType, Unit};
pub use recalc::{DailyValues, LatestKnown, recalculate_day};
pub use reconcile::{ExportMeasurement, ExternalMeasurement, Reconciliation, reconcile};
pub use settings::{Settings, SyncSettings};
pub use timeline::{DayStore, TimelineReport, TimelineState, recalculate_date, run_timeline};
pub use types::{BiologicalSex, ExternalId, PregnancyStatus, SmokingStatus, ValidationError};
