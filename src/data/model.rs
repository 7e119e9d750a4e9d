use std::fmt;

use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reserved dataset names
// ---------------------------------------------------------------------------

/// Compressive strength (MPa), one value per sample row of a group.
pub const LABEL: &str = "Label";
/// Curing age in days.
pub const AGE: &str = "Age";
/// Specimen temperature in °C.
pub const TEMP: &str = "Temp";

/// Real-time sweep, imaginary part.
pub const CON_SENSOR_I: &str = "con_sensor_I";
/// Real-time sweep, real part.
pub const CON_SENSOR_R: &str = "con_sensor_R";
/// Baseline sweep, imaginary part.
pub const CON_SENSOR_IB: &str = "con_sensor_IB";
/// Baseline sweep, real part.
pub const CON_SENSOR_RB: &str = "con_sensor_RB";

/// Names of the 1-D per-sample series reported by store inspection.
pub const SCALAR_SERIES: [&str; 3] = [AGE, LABEL, TEMP];

pub const SWEEP_START_KHZ: f64 = 10.0;
pub const SWEEP_END_KHZ: f64 = 1000.0;

/// Frequency (kHz) of each column in a channel array with `n_points` columns.
pub fn frequency_axis(n_points: usize) -> Array1<f64> {
    Array1::linspace(SWEEP_START_KHZ, SWEEP_END_KHZ, n_points)
}

// ---------------------------------------------------------------------------
// FeatureLayout – canonical channel orders for feature matrices
// ---------------------------------------------------------------------------

/// Which channels make up a feature row, and in which column order.
///
/// The order is part of the contract: the first half of every feature row
/// comes from the first channel, the second half from the second. Both
/// layouts exist in the measurement campaigns and are *not* interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureLayout {
    /// `[con_sensor_I, con_sensor_R]`: real-time imaginary part, then real part.
    #[default]
    ImaginaryReal,
    /// `[con_sensor_RB, con_sensor_R]`: baseline real part, then real-time real part.
    BaselineRealtimeReal,
}

impl FeatureLayout {
    pub fn channels(self) -> [&'static str; 2] {
        match self {
            FeatureLayout::ImaginaryReal => [CON_SENSOR_I, CON_SENSOR_R],
            FeatureLayout::BaselineRealtimeReal => [CON_SENSOR_RB, CON_SENSOR_R],
        }
    }

    /// Dataset names a group must carry to contribute to this layout.
    pub fn required_names(self) -> Vec<String> {
        self.channels().iter().map(|c| c.to_string()).collect()
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [first, second] = self.channels();
        write!(f, "[{first}, {second}]")
    }
}

// ---------------------------------------------------------------------------
// Per-group arrays as produced by the reader
// ---------------------------------------------------------------------------

/// One group's copy of a named array.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupArray {
    pub group: String,
    pub array: ArrayD<f64>,
}

impl GroupArray {
    pub fn rows(&self) -> usize {
        self.array.shape().first().copied().unwrap_or(0)
    }
}

/// Where one group's rows sit inside a merged array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSegment {
    pub group: String,
    pub offset: usize,
    pub rows: usize,
}

// ---------------------------------------------------------------------------
// Load report
// ---------------------------------------------------------------------------

/// What the reader did with a single group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GroupOutcome {
    Included,
    SkippedMissingKeys(Vec<String>),
}

/// Per-group outcomes in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub outcomes: Vec<(String, GroupOutcome)>,
}

impl LoadReport {
    pub fn record(&mut self, group: &str, outcome: GroupOutcome) {
        self.outcomes.push((group.to_string(), outcome));
    }

    pub fn inspected(&self) -> usize {
        self.outcomes.len()
    }

    pub fn matched(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == GroupOutcome::Included)
            .count()
    }

    /// Groups that were skipped, with the names they were missing.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.outcomes.iter().filter_map(|(g, o)| match o {
            GroupOutcome::SkippedMissingKeys(missing) => Some((g.as_str(), missing.as_slice())),
            GroupOutcome::Included => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_fix_column_order() {
        assert_eq!(FeatureLayout::ImaginaryReal.channels(), [CON_SENSOR_I, CON_SENSOR_R]);
        assert_eq!(
            FeatureLayout::BaselineRealtimeReal.channels(),
            [CON_SENSOR_RB, CON_SENSOR_R]
        );
        assert_eq!(FeatureLayout::default(), FeatureLayout::ImaginaryReal);
    }

    #[test]
    fn frequency_axis_spans_sweep() {
        let f = frequency_axis(100);
        assert_eq!(f.len(), 100);
        assert!((f[0] - 10.0).abs() < 1e-12);
        assert!((f[99] - 1000.0).abs() < 1e-9);
        assert!((f[1] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = LoadReport::default();
        report.record("a", GroupOutcome::Included);
        report.record("b", GroupOutcome::SkippedMissingKeys(vec![LABEL.to_string()]));
        report.record("c", GroupOutcome::Included);

        assert_eq!(report.inspected(), 3);
        assert_eq!(report.matched(), 2);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped, vec![("b", &[LABEL.to_string()][..])]);
    }
}
