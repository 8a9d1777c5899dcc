//! Resting energy and body composition equations.
//!
//! Every equation declares the variables it needs. If any one of them is
//! missing the equation yields `None`; there are no partial estimates.
//! Energy results are clamped to be non-negative.

use chrono::{Datelike, NaiveDate};

use crate::metric::MetricType;
use crate::types::{BiologicalSex, define_string_enum};

/// An input variable an equation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationVariable {
    BiologicalSex,
    Weight,
    Height,
    Age,
    LeanBodyMass,
}

/// Inputs available to the equations for one day.
///
/// Weight and lean body mass are in kilograms, height in centimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EquationInputs {
    pub biological_sex: Option<BiologicalSex>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub age_years: Option<u32>,
    pub lean_body_mass_kg: Option<f64>,
}

impl EquationInputs {
    /// Whether every variable in `variables` is present.
    #[must_use]
    pub fn satisfies(&self, variables: &[EquationVariable]) -> bool {
        variables.iter().all(|variable| match variable {
            EquationVariable::BiologicalSex => self.biological_sex.is_some(),
            EquationVariable::Weight => self.weight_kg.is_some(),
            EquationVariable::Height => self.height_cm.is_some(),
            EquationVariable::Age => self.age_years.is_some(),
            EquationVariable::LeanBodyMass => self.lean_body_mass_kg.is_some(),
        })
    }
}

/// Age in whole years on `date` for someone born on `date_of_birth`.
///
/// Returns `None` if `date` is before the date of birth.
#[must_use]
pub fn age_on(date_of_birth: NaiveDate, date: NaiveDate) -> Option<u32> {
    let mut years = date.year() - date_of_birth.year();
    if (date.month(), date.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

const SEX_AND_ANTHROPOMETRICS: &[EquationVariable] = &[
    EquationVariable::BiologicalSex,
    EquationVariable::Weight,
    EquationVariable::Height,
    EquationVariable::Age,
];
const SEX_WEIGHT_AGE: &[EquationVariable] = &[
    EquationVariable::BiologicalSex,
    EquationVariable::Weight,
    EquationVariable::Age,
];
const LEAN_BODY_MASS_ONLY: &[EquationVariable] = &[EquationVariable::LeanBodyMass];
const SEX_WEIGHT_HEIGHT: &[EquationVariable] = &[
    EquationVariable::BiologicalSex,
    EquationVariable::Weight,
    EquationVariable::Height,
];

define_string_enum!(
    /// Equations estimating resting energy expenditure in kcal/day.
    RestingEnergyEquation, "resting energy equation" {
        MifflinStJeor => "mifflin_st_jeor",
        HarrisBenedict => "harris_benedict",
        RevisedHarrisBenedict => "revised_harris_benedict",
        HenryOxford => "henry_oxford",
        Schofield => "schofield",
        KatchMcArdle => "katch_mcardle",
        Cunningham => "cunningham",
    }
);

impl RestingEnergyEquation {
    /// The variables this equation requires.
    #[must_use]
    pub const fn variables(&self) -> &'static [EquationVariable] {
        match self {
            Self::MifflinStJeor | Self::HarrisBenedict | Self::RevisedHarrisBenedict => {
                SEX_AND_ANTHROPOMETRICS
            }
            Self::HenryOxford | Self::Schofield => SEX_WEIGHT_AGE,
            Self::KatchMcArdle | Self::Cunningham => LEAN_BODY_MASS_ONLY,
        }
    }

    /// Resting energy in kcal, or `None` if a required variable is missing.
    #[must_use]
    pub fn calculate(&self, inputs: &EquationInputs) -> Option<f64> {
        if !inputs.satisfies(self.variables()) {
            return None;
        }
        let kcal = match self {
            Self::MifflinStJeor => {
                let (sex, weight, height, age) = anthropometrics(inputs)?;
                let offset = match sex {
                    BiologicalSex::Male => 5.0,
                    BiologicalSex::Female => -161.0,
                };
                10.0 * weight + 6.25 * height - 5.0 * age + offset
            }
            Self::HarrisBenedict => {
                let (sex, weight, height, age) = anthropometrics(inputs)?;
                match sex {
                    BiologicalSex::Male => {
                        66.473 + 13.7516 * weight + 5.0033 * height - 6.755 * age
                    }
                    BiologicalSex::Female => {
                        655.0955 + 9.5634 * weight + 1.8496 * height - 4.6756 * age
                    }
                }
            }
            Self::RevisedHarrisBenedict => {
                let (sex, weight, height, age) = anthropometrics(inputs)?;
                match sex {
                    BiologicalSex::Male => {
                        88.362 + 13.397 * weight + 4.799 * height - 5.677 * age
                    }
                    BiologicalSex::Female => {
                        447.593 + 9.247 * weight + 3.098 * height - 4.330 * age
                    }
                }
            }
            Self::HenryOxford => {
                let (slope, intercept) = henry_oxford(inputs.biological_sex?, inputs.age_years?);
                slope * inputs.weight_kg? + intercept
            }
            Self::Schofield => {
                let (slope, intercept) = schofield(inputs.biological_sex?, inputs.age_years?);
                slope * inputs.weight_kg? + intercept
            }
            Self::KatchMcArdle => 370.0 + 21.6 * inputs.lean_body_mass_kg?,
            Self::Cunningham => 500.0 + 22.0 * inputs.lean_body_mass_kg?,
        };
        Some(kcal.max(0.0))
    }
}

fn anthropometrics(inputs: &EquationInputs) -> Option<(BiologicalSex, f64, f64, f64)> {
    Some((
        inputs.biological_sex?,
        inputs.weight_kg?,
        inputs.height_cm?,
        f64::from(inputs.age_years?),
    ))
}

/// Index into the shared age bands: 0–3, 3–10, 10–18, 18–30, 30–60, 60+.
const fn age_band(age: u32) -> usize {
    match age {
        0..3 => 0,
        3..10 => 1,
        10..18 => 2,
        18..30 => 3,
        30..60 => 4,
        _ => 5,
    }
}

/// (kcal per kg, kcal intercept) per age band.
const HENRY_OXFORD_MALE: [(f64, f64); 6] = [
    (61.0, -33.7),
    (23.3, 514.0),
    (18.4, 581.0),
    (16.0, 545.0),
    (14.2, 593.0),
    (13.5, 514.0),
];
const HENRY_OXFORD_FEMALE: [(f64, f64); 6] = [
    (58.9, -23.1),
    (20.1, 507.0),
    (11.1, 761.0),
    (13.1, 558.0),
    (9.74, 694.0),
    (10.1, 569.0),
];
const SCHOFIELD_MALE: [(f64, f64); 6] = [
    (59.512, -30.4),
    (22.706, 504.3),
    (17.686, 658.2),
    (15.057, 692.2),
    (11.472, 873.1),
    (11.711, 587.7),
];
const SCHOFIELD_FEMALE: [(f64, f64); 6] = [
    (58.317, -31.1),
    (20.315, 485.9),
    (13.384, 692.6),
    (14.818, 486.6),
    (8.126, 845.6),
    (9.082, 658.5),
];

const fn henry_oxford(sex: BiologicalSex, age: u32) -> (f64, f64) {
    match sex {
        BiologicalSex::Male => HENRY_OXFORD_MALE[age_band(age)],
        BiologicalSex::Female => HENRY_OXFORD_FEMALE[age_band(age)],
    }
}

const fn schofield(sex: BiologicalSex, age: u32) -> (f64, f64) {
    match sex {
        BiologicalSex::Male => SCHOFIELD_MALE[age_band(age)],
        BiologicalSex::Female => SCHOFIELD_FEMALE[age_band(age)],
    }
}

define_string_enum!(
    /// Equations estimating body composition from anthropometrics.
    BodyCompositionEquation, "body composition equation" {
        Boer => "boer",
        James => "james",
        Hume => "hume",
        Deurenberg => "deurenberg",
    }
);

/// The quantity a body composition equation produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyComposition {
    LeanBodyMassKg(f64),
    FatPercentage(f64),
}

impl BodyCompositionEquation {
    /// The variables this equation requires.
    #[must_use]
    pub const fn variables(&self) -> &'static [EquationVariable] {
        match self {
            Self::Boer | Self::James | Self::Hume => SEX_WEIGHT_HEIGHT,
            Self::Deurenberg => SEX_AND_ANTHROPOMETRICS,
        }
    }

    /// Evaluates the equation in its native output quantity.
    #[must_use]
    pub fn calculate(&self, inputs: &EquationInputs) -> Option<BodyComposition> {
        if !inputs.satisfies(self.variables()) {
            return None;
        }
        let sex = inputs.biological_sex?;
        let weight = inputs.weight_kg?;
        let height = inputs.height_cm?;
        let male = sex == BiologicalSex::Male;
        let result = match self {
            Self::Boer => BodyComposition::LeanBodyMassKg(if male {
                0.407 * weight + 0.267 * height - 19.2
            } else {
                0.252 * weight + 0.473 * height - 48.3
            }),
            Self::James => {
                if height <= 0.0 {
                    return None;
                }
                let ratio = (weight / height).powi(2);
                BodyComposition::LeanBodyMassKg(if male {
                    1.1 * weight - 128.0 * ratio
                } else {
                    1.07 * weight - 148.0 * ratio
                })
            }
            Self::Hume => BodyComposition::LeanBodyMassKg(if male {
                0.328_10 * weight + 0.339_29 * height - 29.5336
            } else {
                0.295_69 * weight + 0.418_13 * height - 43.2933
            }),
            Self::Deurenberg => {
                if height <= 0.0 {
                    return None;
                }
                let meters = height / 100.0;
                let bmi = weight / (meters * meters);
                let sex_term = if male { 10.8 } else { 0.0 };
                let age = f64::from(inputs.age_years?);
                BodyComposition::FatPercentage(1.2 * bmi + 0.23 * age - sex_term - 5.4)
            }
        };
        Some(result)
    }

    /// Evaluates the equation and expresses the result as `metric`.
    ///
    /// Conversions between lean body mass and fat percentage use the
    /// supplied weight. Returns `None` for metrics other than the two body
    /// composition metrics.
    #[must_use]
    pub fn value_for(&self, metric: MetricType, inputs: &EquationInputs) -> Option<f64> {
        let weight = inputs.weight_kg?;
        match (metric, self.calculate(inputs)?) {
            (MetricType::LeanBodyMass, BodyComposition::LeanBodyMassKg(lbm)) => {
                Some(lbm.clamp(0.0, weight))
            }
            (MetricType::LeanBodyMass, BodyComposition::FatPercentage(fat)) => {
                lean_body_mass_from_fat_percentage(fat, weight)
            }
            (MetricType::FatPercentage, BodyComposition::FatPercentage(fat)) => {
                Some(fat.clamp(0.0, 100.0))
            }
            (MetricType::FatPercentage, BodyComposition::LeanBodyMassKg(lbm)) => {
                fat_percentage_from_lean_body_mass(lbm, weight)
            }
            _ => None,
        }
    }
}

/// `fat% = (weight - lbm) / weight * 100`, clamped to 0–100.
#[must_use]
pub fn fat_percentage_from_lean_body_mass(lean_body_mass_kg: f64, weight_kg: f64) -> Option<f64> {
    if weight_kg <= 0.0 || !lean_body_mass_kg.is_finite() {
        return None;
    }
    Some(((weight_kg - lean_body_mass_kg) / weight_kg * 100.0).clamp(0.0, 100.0))
}

/// `lbm = weight * (1 - fat% / 100)`, clamped to 0–weight.
#[must_use]
pub fn lean_body_mass_from_fat_percentage(fat_percentage: f64, weight_kg: f64) -> Option<f64> {
    if weight_kg <= 0.0 || !fat_percentage.is_finite() {
        return None;
    }
    let fat_percentage = fat_percentage.clamp(0.0, 100.0);
    Some((weight_kg * (1.0 - fat_percentage / 100.0)).clamp(0.0, weight_kg))
}

define_string_enum!(
    /// Activity level used to derive active energy from resting energy.
    ActivityLevel, "activity level" {
        Sedentary => "sedentary",
        LightlyActive => "lightly_active",
        ModeratelyActive => "moderately_active",
        Active => "active",
        VeryActive => "very_active",
    }
);

impl ActivityLevel {
    /// Multiplier applied to resting energy to get active energy.
    ///
    /// Equivalent to the physical activity level minus one, so resting plus
    /// active energy equals the usual PAL-scaled total.
    #[must_use]
    pub const fn factor(&self) -> f64 {
        match self {
            Self::Sedentary => 0.2,
            Self::LightlyActive => 0.375,
            Self::ModeratelyActive => 0.55,
            Self::Active => 0.725,
            Self::VeryActive => 0.9,
        }
    }

    /// Active energy in kcal for the given resting energy.
    #[must_use]
    pub fn active_energy(&self, resting_kcal: f64) -> f64 {
        (self.factor() * resting_kcal).max(0.0)
    }
}
