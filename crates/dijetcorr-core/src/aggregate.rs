//! Cross-section-weighted merging of kinematic slices.
//!
//! Each slice is an independent sample of one pt-hat range. Every record in
//! it is weighted by `sigma_gen / n_events` of its slice, so that the merged
//! distributions are proportional to the physical cross section across the
//! whole pt-hat spectrum.
//!
//! The [`Aggregator`] is an owned object built once per run. Partial
//! aggregators (one per worker thread) combine with [`Aggregator::merge`],
//! which adds per-bin accumulators.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{AggregationConfig, BinningConfig};
use crate::error::{MergeError, SliceError};
use crate::histogram::{Hist1D, Hist2D, Hist3D};
use crate::record::PairRecord;
use crate::slice::{KinematicSlice, SUMMARY_FILE};

/// All weighted distributions filled from pair records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distributions {
    /// Lead N_ch × sub N_ch × lead pt.
    pub mult_3d: Hist3D,
    /// Cone A N_ch × cone B N_ch × lead pt.
    pub background_3d: Hist3D,
    pub mult_lead_vs_sub: Hist2D,
    pub mult_lead: Hist1D,
    pub mult_sub: Hist1D,
    /// Lead and sub jets together.
    pub pt_all: Hist1D,
    pub pt_lead: Hist1D,
    pub pt_sub: Hist1D,
    /// lead pt − sub pt.
    pub pt_diff: Hist1D,
    pub closeness: Hist1D,
}

impl Distributions {
    pub fn new(binning: &BinningConfig) -> Self {
        let m = binning.multiplicity;
        let pt = binning.pt_spectrum;
        Self {
            mult_3d: Hist3D::new(m, m, binning.lead_pt),
            background_3d: Hist3D::new(m, m, binning.lead_pt),
            mult_lead_vs_sub: Hist2D::new(m, m),
            mult_lead: Hist1D::new(m),
            mult_sub: Hist1D::new(m),
            pt_all: Hist1D::new(pt),
            pt_lead: Hist1D::new(pt),
            pt_sub: Hist1D::new(pt),
            pt_diff: Hist1D::new(pt),
            closeness: Hist1D::new(binning.closeness),
        }
    }

    /// Fill every distribution with one record.
    pub fn fill(&mut self, r: &PairRecord, weight: f64) {
        let lead_n = f64::from(r.lead_n_charged);
        let sub_n = f64::from(r.sub_n_charged);
        let bkg_a = f64::from(r.background_mult_a);
        let bkg_b = f64::from(r.background_mult_b);

        self.mult_3d.fill(lead_n, sub_n, r.lead_pt, weight);
        self.background_3d.fill(bkg_a, bkg_b, r.lead_pt, weight);
        self.mult_lead_vs_sub.fill(lead_n, sub_n, weight);
        self.mult_lead.fill(lead_n, weight);
        self.mult_sub.fill(sub_n, weight);
        self.pt_all.fill(r.lead_pt, weight);
        self.pt_all.fill(r.sub_pt, weight);
        self.pt_lead.fill(r.lead_pt, weight);
        self.pt_sub.fill(r.sub_pt, weight);
        self.pt_diff.fill(r.lead_pt - r.sub_pt, weight);
        self.closeness.fill(r.closeness, weight);
    }

    pub fn merge(&mut self, other: &Distributions) -> Result<(), MergeError> {
        self.mult_3d.merge(&other.mult_3d)?;
        self.background_3d.merge(&other.background_3d)?;
        self.mult_lead_vs_sub.merge(&other.mult_lead_vs_sub)?;
        self.mult_lead.merge(&other.mult_lead)?;
        self.mult_sub.merge(&other.mult_sub)?;
        self.pt_all.merge(&other.pt_all)?;
        self.pt_lead.merge(&other.pt_lead)?;
        self.pt_sub.merge(&other.pt_sub)?;
        self.pt_diff.merge(&other.pt_diff)?;
        self.closeness.merge(&other.closeness)?;
        Ok(())
    }
}

/// What one slice added to the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceContribution {
    pub dir: PathBuf,
    pub label: String,
    pub n_events: u64,
    pub n_accepted: u64,
    pub n_records: usize,
    /// Records that passed the balance cut.
    pub n_used: usize,
    pub sigma_gen_mb: f64,
    pub weight: f64,
}

/// A slice that could not be used, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSlice {
    pub dir: PathBuf,
    pub reason: String,
}

/// Owns the merged distributions of one aggregation run.
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: AggregationConfig,
    distributions: Distributions,
    total_sigma_mb: f64,
    contributions: Vec<SliceContribution>,
    skipped: Vec<SkippedSlice>,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        let distributions = Distributions::new(&config.binning);
        Self {
            config,
            distributions,
            total_sigma_mb: 0.0,
            contributions: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Whether a record survives the dijet balance requirement.
    pub fn passes_balance_cut(&self, record: &PairRecord) -> bool {
        record
            .balance()
            .is_some_and(|ratio| ratio >= self.config.balance_cut)
    }

    /// Weight and fill every record of an already loaded slice.
    ///
    /// A slice with zero generated events or an unusable cross section is
    /// rejected; nothing is filled and the total cross section is unchanged.
    pub fn add_slice(&mut self, slice: &KinematicSlice) -> Result<SliceContribution, SliceError> {
        let summary = &slice.summary;
        let Some(weight) = summary.event_weight() else {
            return Err(SliceError::Summary {
                path: slice.dir.join(SUMMARY_FILE),
                reason: format!(
                    "unusable weight: {} events, sigma_gen {} mb",
                    summary.n_events, summary.sigma_gen_mb
                ),
            });
        };

        let mut n_used = 0;
        for record in &slice.records {
            if self.passes_balance_cut(record) {
                self.distributions.fill(record, weight);
                n_used += 1;
            }
        }
        self.total_sigma_mb += summary.sigma_gen_mb;

        let contribution = SliceContribution {
            dir: slice.dir.clone(),
            label: summary.label.clone(),
            n_events: summary.n_events,
            n_accepted: summary.n_accepted,
            n_records: slice.records.len(),
            n_used,
            sigma_gen_mb: summary.sigma_gen_mb,
            weight,
        };
        log::info!(
            "slice {}: {} of {} pairs used, weight {:.4e}",
            contribution.label,
            n_used,
            contribution.n_records,
            weight
        );
        self.contributions.push(contribution.clone());
        Ok(contribution)
    }

    /// Load a slice directory and add it.
    pub fn add_slice_dir(&mut self, dir: &Path) -> Result<SliceContribution, SliceError> {
        let slice = KinematicSlice::load(dir)?;
        self.add_slice(&slice)
    }

    /// Add every slice in `dirs`, skipping (and logging) the ones that fail.
    ///
    /// With `threads > 1` the directories are split into contiguous chunks,
    /// each loaded by a private aggregator on a scoped thread; the partials
    /// merge back in input order. Returns the number of slices added.
    pub fn load_slices(&mut self, dirs: &[PathBuf], threads: usize) -> usize {
        let before = self.contributions.len();
        let threads = threads.clamp(1, dirs.len().max(1));
        if threads == 1 {
            for dir in dirs {
                self.add_or_skip(dir);
            }
            return self.contributions.len() - before;
        }

        let chunk_size = dirs.len().div_ceil(threads);
        let config = &self.config;
        let partials: Vec<(usize, Option<Aggregator>)> = std::thread::scope(|s| {
            let handles: Vec<_> = dirs
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        let mut partial = Aggregator::new(config.clone());
                        for dir in chunk {
                            partial.add_or_skip(dir);
                        }
                        partial
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(i, handle)| (i, handle.join().ok()))
                .collect()
        });

        for (i, partial) in partials {
            match partial {
                Some(partial) => {
                    if let Err(e) = self.merge(&partial) {
                        log::error!("failed to merge partial aggregate: {e}");
                    }
                }
                None => {
                    let start = i * chunk_size;
                    let end = (start + chunk_size).min(dirs.len());
                    for dir in &dirs[start..end] {
                        log::warn!("worker loading {} panicked", dir.display());
                        self.skipped.push(SkippedSlice {
                            dir: dir.clone(),
                            reason: "worker thread panicked".to_string(),
                        });
                    }
                }
            }
        }
        self.contributions.len() - before
    }

    fn add_or_skip(&mut self, dir: &Path) {
        if let Err(e) = self.add_slice_dir(dir) {
            log::warn!("skipping slice {}: {e}", dir.display());
            self.skipped.push(SkippedSlice {
                dir: dir.to_path_buf(),
                reason: e.to_string(),
            });
        }
    }

    /// Add another aggregator's accumulators, cross section and bookkeeping.
    pub fn merge(&mut self, other: &Aggregator) -> Result<(), MergeError> {
        if self.config != other.config {
            return Err(MergeError::Settings);
        }
        self.distributions.merge(&other.distributions)?;
        self.total_sigma_mb += other.total_sigma_mb;
        self.contributions.extend(other.contributions.iter().cloned());
        self.skipped.extend(other.skipped.iter().cloned());
        Ok(())
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn distributions(&self) -> &Distributions {
        &self.distributions
    }

    /// Σ sigma_gen over the slices that were added, in mb.
    pub fn total_cross_section(&self) -> f64 {
        self.total_sigma_mb
    }

    pub fn contributions(&self) -> &[SliceContribution] {
        &self.contributions
    }

    pub fn skipped(&self) -> &[SkippedSlice] {
        &self.skipped
    }
}
