//! Machine-readable result of an aggregation run.
//!
//! The report is what the plotting layer consumes: every weighted
//! distribution, the inclusive multiplicity correlation, and the covariance
//! profiles versus lead-jet pt with the background cones subtracted.

use std::path::Path;

use serde::Serialize;

use crate::aggregate::{Aggregator, Distributions, SkippedSlice, SliceContribution};
use crate::config::AggregationConfig;
use crate::error::MergeError;
use crate::entropy::{
    InclusiveCorrelation, SubtractedProfile, background_subtracted_profile, inclusive_correlation,
};

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub dijetcorr_version: String,
    pub settings: AggregationConfig,
    /// Σ sigma_gen of the slices used, mb.
    pub total_cross_section_mb: f64,
    pub slices: Vec<SliceContribution>,
    pub skipped: Vec<SkippedSlice>,
    /// Lead versus sub charged multiplicity, integrated over lead pt.
    pub inclusive: InclusiveCorrelation,
    /// Covariance versus lead pt: dijet multiplicities, background cones,
    /// and their difference.
    pub covariance_vs_lead_pt: SubtractedProfile,
    pub distributions: Distributions,
}

impl AggregateReport {
    pub fn build(agg: &Aggregator) -> Result<Self, MergeError> {
        let estimator = agg.config().estimator;
        let d = agg.distributions();
        let covariance_vs_lead_pt =
            background_subtracted_profile(&d.mult_3d, &d.background_3d, estimator)?;
        Ok(Self {
            dijetcorr_version: crate::VERSION.to_string(),
            settings: agg.config().clone(),
            total_cross_section_mb: agg.total_cross_section(),
            slices: agg.contributions().to_vec(),
            skipped: agg.skipped().to_vec(),
            inclusive: inclusive_correlation(&d.mult_lead_vs_sub, estimator),
            covariance_vs_lead_pt,
            distributions: d.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
    }
}
