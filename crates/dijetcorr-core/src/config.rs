//! Run configuration: dijet selection, slice generation, and aggregation.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command-line flags override file values. The closeness axis is
//! the one default that depends on another setting: unless a file sets it,
//! it spans `[0, π − selection.min_dphi)`.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cone::ParticleAcceptance;
use crate::entropy::EntropyEstimator;
use crate::error::ConfigError;
use crate::histogram::Axis;
use crate::selection::DEFAULT_MIN_DPHI;

const CLOSENESS_BINS: usize = 32;

/// Jet and particle acceptance plus the back-to-back requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Jet clustering radius R, also the background cone radius.
    pub jet_radius: f64,
    /// Minimum |Δφ| for a pair to count as back-to-back.
    pub min_dphi: f64,
    pub jet_pt_min: f64,
    pub jet_eta_max: f64,
    pub particle_pt_min: f64,
    pub particle_eta_max: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            jet_radius: 0.4,
            min_dphi: DEFAULT_MIN_DPHI,
            jet_pt_min: 3.0,
            jet_eta_max: 1.0 - 0.4,
            particle_pt_min: 0.15,
            particle_eta_max: 1.0,
        }
    }
}

impl SelectionConfig {
    pub fn particle_acceptance(&self) -> ParticleAcceptance {
        ParticleAcceptance {
            pt_min: self.particle_pt_min,
            eta_max: self.particle_eta_max,
        }
    }
}

/// Per-slice generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Generator attempts per slice.
    pub n_events: u64,
    pub seed: u64,
    /// Slice directories are named `<output_prefix>_pThat_<min>_<max>`.
    pub output_prefix: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            n_events: 50_000,
            seed: 12345,
            output_prefix: PathBuf::from("pp200"),
        }
    }
}

/// Histogram binning of the aggregated distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Charged multiplicity axes (jets and background cones).
    pub multiplicity: Axis,
    /// Lead-jet pt axis of the 3D distributions.
    pub lead_pt: Axis,
    /// Jet pt spectra and the lead−sub pt difference.
    pub pt_spectrum: Axis,
    pub closeness: Axis,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            multiplicity: Axis::new(30, 0.0, 30.0),
            lead_pt: Axis::new(20, 0.0, 100.0),
            pt_spectrum: Axis::new(100, 0.0, 100.0),
            closeness: Self::closeness_for(DEFAULT_MIN_DPHI),
        }
    }
}

impl BinningConfig {
    /// Closeness axis covering every pair that passes a `min_dphi` cut.
    pub fn closeness_for(min_dphi: f64) -> Axis {
        Axis::new(CLOSENESS_BINS, 0.0, (PI - min_dphi).max(1e-6))
    }
}

/// Slice merging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Pairs with `sub_pt / lead_pt` below this are discarded.
    pub balance_cut: f64,
    pub estimator: EntropyEstimator,
    pub binning: BinningConfig,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            balance_cut: 0.2,
            estimator: EntropyEstimator::Plugin,
            binning: BinningConfig::default(),
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selection: SelectionConfig,
    pub generation: GenerationConfig,
    pub aggregation: AggregationConfig,
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |e: serde_json::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(parse_err)?;
        let closeness_given = value.pointer("/aggregation/binning/closeness").is_some();
        let mut config: Config = serde_json::from_value(value).map_err(parse_err)?;
        if !closeness_given {
            config.aggregation.binning.closeness =
                BinningConfig::closeness_for(config.selection.min_dphi);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the selection or weighting meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.selection;
        let positive = [
            ("selection.jet_radius", s.jet_radius),
            ("selection.jet_eta_max", s.jet_eta_max),
            ("selection.particle_eta_max", s.particle_eta_max),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("selection.jet_pt_min", s.jet_pt_min),
            ("selection.particle_pt_min", s.particle_pt_min),
            ("aggregation.balance_cut", self.aggregation.balance_cut),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if !(s.min_dphi >= 0.0 && s.min_dphi <= PI) {
            return Err(ConfigError::Invalid(format!(
                "selection.min_dphi must be in [0, π], got {}",
                s.min_dphi
            )));
        }
        let b = &self.aggregation.binning;
        let axes = [
            ("multiplicity", b.multiplicity),
            ("lead_pt", b.lead_pt),
            ("pt_spectrum", b.pt_spectrum),
            ("closeness", b.closeness),
        ];
        for (name, axis) in axes {
            if !axis.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "aggregation.binning.{name} is not a valid axis: {axis:?}"
                )));
            }
        }
        let widest = PI - s.min_dphi;
        if b.closeness.max < widest - 1e-9 {
            log::warn!(
                "closeness axis ends at {:.4} but pairs reach {:.4}; wider pairs are not histogrammed",
                b.closeness.max,
                widest
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_analysis() {
        let c = Config::default();
        assert_eq!(c.selection.jet_radius, 0.4);
        assert!((c.selection.min_dphi - 0.75 * PI).abs() < 1e-15);
        assert_eq!(c.selection.jet_pt_min, 3.0);
        assert!((c.selection.jet_eta_max - 0.6).abs() < 1e-12);
        assert_eq!(c.selection.particle_pt_min, 0.15);
        assert_eq!(c.aggregation.balance_cut, 0.2);
        assert_eq!(c.generation.n_events, 50_000);
        assert_eq!(c.generation.seed, 12345);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: Config =
            serde_json::from_str(r#"{"selection": {"jet_radius": 0.6}, "aggregation": {"estimator": "miller_madow"}}"#)
                .unwrap();
        assert_eq!(c.selection.jet_radius, 0.6);
        assert_eq!(c.selection.jet_pt_min, 3.0);
        assert_eq!(c.aggregation.estimator, EntropyEstimator::MillerMadow);
        assert_eq!(c.aggregation.binning, BinningConfig::default());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut c = Config::default();
        c.selection.jet_radius = 0.0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.aggregation.balance_cut = -0.1;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.selection.min_dphi = 4.0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.aggregation.binning.lead_pt = Axis::new(0, 0.0, 100.0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"generation": {"n_events": 10, "seed": 7}}"#).unwrap();
        let c = Config::load(&path).unwrap();
        assert_eq!(c.generation.n_events, 10);
        assert_eq!(c.generation.seed, 7);

        std::fs::write(&path, r#"{"selection": {"jet_radius": -1.0}}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));

        let missing = tmp.path().join("absent.json");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn closeness_axis_follows_min_dphi() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"selection": {"min_dphi": 1.5707963267948966}}"#).unwrap();
        let c = Config::load(&path).unwrap();
        assert!((c.aggregation.binning.closeness.max - PI / 2.0).abs() < 1e-12);
        assert_eq!(c.aggregation.binning.closeness.bins, CLOSENESS_BINS);

        std::fs::write(
            &path,
            r#"{"selection": {"min_dphi": 1.5707963267948966},
                "aggregation": {"binning": {"closeness": {"bins": 10, "min": 0.0, "max": 0.5}}}}"#,
        )
        .unwrap();
        let c = Config::load(&path).unwrap();
        assert_eq!(c.aggregation.binning.closeness, Axis::new(10, 0.0, 0.5));
    }

    #[test]
    fn default_closeness_axis_is_quarter_pi() {
        let axis = BinningConfig::default().closeness;
        assert!((axis.max - PI / 4.0).abs() < 1e-12);
        assert!(BinningConfig::closeness_for(PI).is_valid());
    }
}
