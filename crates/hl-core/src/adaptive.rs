//! Adaptive maintenance via energy balance.
//!
//! Maintenance is the average dietary intake over the window preceding a day,
//! corrected by the energy stored or released by the weight change over the
//! same window.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::health::{
    AdaptiveMaintenance, DietaryEnergyPoint, DietaryEnergySource, DietaryEnergyWindow,
    MaintenanceConfig, MovingAverage, WeightChange, WeightChangePoint, WindowPoint,
};

/// Energy content of one kilogram of body weight change.
pub const KCAL_PER_KG: f64 = 7700.0;

/// Days of history a recalculation can look back: the longest window plus
/// the longest moving average span.
pub const HISTORY_SPAN_DAYS: i64 = 28 + 7;

/// What one earlier day contributes to a later day's recalculation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub weight_kg: Option<f64>,
    pub dietary_energy_point: Option<DietaryEnergyPoint>,
}

/// Daily weights and dietary points of the days preceding the one being
/// recalculated.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: BTreeMap<NaiveDate, HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, entry: HistoryEntry) {
        self.entries.insert(date, entry);
    }

    pub fn weight(&self, date: NaiveDate) -> Option<f64> {
        self.entries.get(&date).and_then(|entry| entry.weight_kg)
    }

    pub fn dietary_energy_point(&self, date: NaiveDate) -> Option<&DietaryEnergyPoint> {
        self.entries
            .get(&date)
            .and_then(|entry| entry.dietary_energy_point.as_ref())
    }

    /// Drops entries no later recalculation than `date` can reach.
    pub fn prune_for(&mut self, date: NaiveDate) {
        let oldest = date - Duration::days(HISTORY_SPAN_DAYS);
        self.entries = self.entries.split_off(&oldest);
    }
}

/// Dietary intake over the `window_days` days before `date`.
///
/// Days without a point count as excluded. Excluded points are left out of
/// the average and display it as their value. A window with no counted
/// point has no average.
pub fn dietary_window(date: NaiveDate, window_days: u32, history: &History) -> DietaryEnergyWindow {
    let dates: Vec<NaiveDate> = (1..=i64::from(window_days))
        .rev()
        .map(|offset| date - Duration::days(offset))
        .collect();

    let counted: Vec<Option<f64>> = dates
        .iter()
        .map(|d| history.dietary_energy_point(*d).and_then(DietaryEnergyPoint::counted_kcal))
        .collect();

    let (sum, count) = counted
        .iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, count), kcal| (sum + kcal, count + 1));
    let kcal_per_day = (count > 0).then(|| sum / f64::from(count));

    let points = dates
        .iter()
        .zip(counted)
        .map(|(d, kcal)| WindowPoint {
            date: *d,
            kcal: kcal.or(kcal_per_day),
            source: history
                .dietary_energy_point(*d)
                .map_or(DietaryEnergySource::ExcludedUseAverage, |point| point.source),
        })
        .collect();

    DietaryEnergyWindow {
        points,
        kcal_per_day,
    }
}

fn weight_point<F>(date: NaiveDate, moving_average_days: Option<u32>, weight_on: &F) -> WeightChangePoint
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    let Some(days) = moving_average_days else {
        return WeightChangePoint {
            date,
            kg: weight_on(date),
            moving_average: None,
        };
    };

    let points: Vec<(NaiveDate, f64)> = (0..i64::from(days))
        .rev()
        .map(|offset| date - Duration::days(offset))
        .filter_map(|d| weight_on(d).map(|kg| (d, kg)))
        .collect();
    let kg = if points.is_empty() {
        None
    } else {
        let total: f64 = points.iter().map(|(_, kg)| kg).sum();
        #[allow(clippy::cast_precision_loss)]
        Some(total / points.len() as f64)
    };

    WeightChangePoint {
        date,
        kg,
        moving_average: Some(MovingAverage { days, points }),
    }
}

/// Weight change over the window ending on `date`.
///
/// `day_weight_kg` is the day's own daily weight; earlier weights come from
/// `history`.
pub fn weight_change(
    date: NaiveDate,
    day_weight_kg: Option<f64>,
    config: &MaintenanceConfig,
    override_kg: Option<f64>,
    history: &History,
) -> WeightChange {
    if let Some(kg) = override_kg {
        return WeightChange::Manual { kg };
    }

    let weight_on = |d: NaiveDate| {
        if d == date {
            day_weight_kg
        } else {
            history.weight(d)
        }
    };
    let start_date = date - Duration::days(i64::from(config.window_days));
    let start = weight_point(start_date, config.weight_moving_average_days, &weight_on);
    let end = weight_point(date, config.weight_moving_average_days, &weight_on);
    let kg = start.kg.zip(end.kg).map(|(start, end)| end - start);

    WeightChange::Points { start, end, kg }
}

/// Adaptive maintenance for `date`.
pub fn adaptive_maintenance(
    date: NaiveDate,
    day_weight_kg: Option<f64>,
    config: &MaintenanceConfig,
    override_kg: Option<f64>,
    history: &History,
) -> AdaptiveMaintenance {
    let dietary_energy = dietary_window(date, config.window_days, history);
    let weight_change = weight_change(date, day_weight_kg, config, override_kg, history);
    let kcal = dietary_energy
        .kcal_per_day
        .zip(weight_change.kg())
        .map(|(intake, delta)| intake - delta * KCAL_PER_KG / f64::from(config.window_days));

    AdaptiveMaintenance {
        dietary_energy,
        weight_change,
        kcal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn point(day: u32, kcal: Option<f64>, source: DietaryEnergySource) -> HistoryEntry {
        HistoryEntry {
            weight_kg: None,
            dietary_energy_point: Some(DietaryEnergyPoint::new(date(day), kcal, source)),
        }
    }

    fn weight(kg: f64) -> HistoryEntry {
        HistoryEntry {
            weight_kg: Some(kg),
            dietary_energy_point: None,
        }
    }

    #[test]
    fn excluded_points_leave_the_average() {
        let mut history = History::new();
        history.record(date(1), point(1, Some(2000.0), DietaryEnergySource::Log));
        history.record(
            date(2),
            point(2, Some(3500.0), DietaryEnergySource::ExcludedUseAverage),
        );
        history.record(date(3), point(3, Some(1800.0), DietaryEnergySource::Log));

        let window = dietary_window(date(4), 3, &history);

        assert_eq!(window.kcal_per_day, Some(1900.0));
        assert_eq!(window.points[1].kcal, Some(1900.0));
        assert_eq!(window.points[1].source, DietaryEnergySource::ExcludedUseAverage);
    }

    #[test]
    fn missing_days_count_as_excluded() {
        let mut history = History::new();
        history.record(date(3), point(3, None, DietaryEnergySource::FastedZero));
        history.record(date(2), point(2, Some(3000.0), DietaryEnergySource::ManualEntry));

        let window = dietary_window(date(4), 3, &history);

        assert_eq!(window.kcal_per_day, Some(1500.0));
        assert_eq!(window.points[0].source, DietaryEnergySource::ExcludedUseAverage);
    }

    #[test]
    fn all_excluded_window_has_no_average() {
        let window = dietary_window(date(10), 7, &History::new());
        assert_eq!(window.kcal_per_day, None);
        assert_eq!(window.points.len(), 7);
        assert!(window.points.iter().all(|p| p.kcal.is_none()));
    }

    #[test]
    fn weight_change_uses_raw_endpoints() {
        let mut history = History::new();
        history.record(date(1), weight(81.0));
        let config = MaintenanceConfig {
            window_days: 7,
            ..MaintenanceConfig::default()
        };

        let change = weight_change(date(8), Some(80.0), &config, None, &history);

        assert_eq!(change.kg(), Some(-1.0));
    }

    #[test]
    fn weight_change_with_moving_average() {
        let mut history = History::new();
        history.record(date(1), weight(82.0));
        history.record(date(2), weight(80.0));
        history.record(date(8), weight(78.0));
        let config = MaintenanceConfig {
            window_days: 7,
            weight_moving_average_days: Some(2),
            ..MaintenanceConfig::default()
        };

        let change = weight_change(date(9), Some(76.0), &config, None, &history);

        let WeightChange::Points { start, end, kg } = change else {
            panic!("expected points");
        };
        assert_eq!(start.kg, Some(81.0));
        assert_eq!(end.kg, Some(77.0));
        assert_eq!(kg, Some(-4.0));
        assert_eq!(end.moving_average.unwrap().points.len(), 2);
    }

    #[test]
    fn manual_override_wins() {
        let config = MaintenanceConfig::default();
        let change = weight_change(date(9), Some(76.0), &config, Some(0.5), &History::new());
        assert_eq!(change, WeightChange::Manual { kg: 0.5 });
    }

    #[test]
    fn adaptive_kcal_from_energy_balance() {
        let mut history = History::new();
        for day in 1..=7 {
            history.record(
                date(day),
                HistoryEntry {
                    weight_kg: (day == 1).then_some(80.0),
                    dietary_energy_point: Some(DietaryEnergyPoint::new(
                        date(day),
                        Some(2000.0),
                        DietaryEnergySource::Log,
                    )),
                },
            );
        }
        let config = MaintenanceConfig::default();

        let adaptive = adaptive_maintenance(date(8), Some(79.3), &config, None, &history);

        let kcal = adaptive.kcal.unwrap();
        assert!((kcal - 2770.0).abs() < 1e-6, "got {kcal}");
    }

    #[test]
    fn prune_keeps_reachable_days() {
        let mut history = History::new();
        history.record(date(1), weight(80.0));
        history.record(date(20), weight(79.0));
        history.prune_for(NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        assert_eq!(history.weight(date(1)), None);
        assert_eq!(history.weight(date(20)), Some(79.0));
    }
}
