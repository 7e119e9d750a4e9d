use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::model::FeatureLayout;

/// Settings shared by the `pca` and `split` commands.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```json
/// { "layout": "baseline-realtime-real", "n_components": 3, "seed": 7 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub layout: FeatureLayout,
    pub n_components: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub projection_out: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: FeatureLayout::ImaginaryReal,
            n_components: 2,
            test_fraction: 0.2,
            seed: 42,
            projection_out: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing pipeline config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(PipelineConfig::from_json_str("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn partial_override() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "layout": "baseline-realtime-real", "seed": 7, "projection_out": "pca.csv" }"#,
        )
        .unwrap();
        assert_eq!(cfg.layout, FeatureLayout::BaselineRealtimeReal);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.n_components, 2);
        assert_eq!(cfg.projection_out, Some(PathBuf::from("pca.csv")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{ "seeed": 1 }"#).is_err());
    }
}
