//! Shannon entropy of weighted distributions and the entropy-based
//! "covariance" between two discrete variables.
//!
//! The quantity reported as covariance, `COV(X,Y) = S(X) + S(Y) − S(X,Y)`, is
//! the mutual information of X and Y in nats. It is not a product-moment
//! covariance; the name follows the analysis literature this pipeline feeds.
//! It is non-negative and vanishes when X and Y are independent under the
//! chosen binning.
//!
//! Plug-in entropies are biased low at small statistics, so the mutual
//! information is biased high. [`EntropyEstimator::MillerMadow`] applies the
//! first-order correction on request; the default performs no correction.

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::histogram::{Axis, BinStore, Hist2D, Hist3D};

/// How bin probabilities are turned into an entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyEstimator {
    /// `−Σ p ln p` with no finite-sample correction.
    #[default]
    Plugin,
    /// Plug-in plus `(m − 1) / 2N`, m = occupied bins, N = entries.
    MillerMadow,
}

impl std::fmt::Display for EntropyEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin => write!(f, "plugin"),
            Self::MillerMadow => write!(f, "miller_madow"),
        }
    }
}

impl std::str::FromStr for EntropyEstimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plugin" | "none" => Ok(Self::Plugin),
            "miller_madow" | "miller-madow" | "mm" => Ok(Self::MillerMadow),
            _ => Err(format!("unknown entropy estimator '{s}'")),
        }
    }
}

/// Shannon entropy (nats) of a weighted distribution.
///
/// Bins with non-positive weight contribute nothing; an empty distribution
/// has zero entropy.
pub fn entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|&&w| w > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut h = 0.0;
    for &w in weights {
        if w > 0.0 {
            let p = w / total;
            h -= p * p.ln();
        }
    }
    h
}

fn estimate(bins: &BinStore, estimator: EntropyEstimator) -> f64 {
    let h = entropy(&bins.sumw);
    match estimator {
        EntropyEstimator::Plugin => h,
        EntropyEstimator::MillerMadow => {
            let n = bins.total_entries();
            if n == 0 {
                return h;
            }
            let occupied = bins.sumw.iter().filter(|&&w| w > 0.0).count();
            h + occupied.saturating_sub(1) as f64 / (2.0 * n as f64)
        }
    }
}

/// Entropies of a 2D joint and its marginals, and the derived correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InclusiveCorrelation {
    /// S(X) of the x marginal.
    pub s_x: f64,
    /// S(Y) of the y marginal.
    pub s_y: f64,
    /// S(X,Y) of the joint.
    pub s_xy: f64,
    /// S(X) + S(Y) − S(X,Y).
    pub covariance: f64,
    /// covariance / sqrt(S(X)·S(Y)), zero when either marginal entropy is zero.
    pub correlation: f64,
    pub entries: u64,
}

/// Entropies and mutual-information covariance of a 2D joint distribution.
pub fn inclusive_correlation(h: &Hist2D, estimator: EntropyEstimator) -> InclusiveCorrelation {
    let s_x = estimate(&h.projection_x().bins, estimator);
    let s_y = estimate(&h.projection_y().bins, estimator);
    let s_xy = estimate(&h.bins, estimator);
    let covariance = s_x + s_y - s_xy;
    let denom = (s_x * s_y).sqrt();
    let correlation = if denom > 0.0 { covariance / denom } else { 0.0 };
    InclusiveCorrelation {
        s_x,
        s_y,
        s_xy,
        covariance,
        correlation,
        entries: h.entries(),
    }
}

/// `S(X) + S(Y) − S(X,Y)` of a 2D joint distribution.
pub fn covariance(h: &Hist2D, estimator: EntropyEstimator) -> f64 {
    inclusive_correlation(h, estimator).covariance
}

/// A binned 1D result with per-bin errors, e.g. covariance versus lead pt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub axis: Axis,
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
    /// Unweighted entries behind each bin.
    pub entries: Vec<u64>,
}

impl Profile {
    pub fn zeros(axis: Axis) -> Self {
        Self {
            axis,
            values: vec![0.0; axis.bins],
            errors: vec![0.0; axis.bins],
            entries: vec![0; axis.bins],
        }
    }

    /// Bin-wise `self − other`, errors added in quadrature.
    pub fn subtract(&self, other: &Profile) -> Result<Profile, MergeError> {
        if self.axis != other.axis {
            return Err(MergeError::Binning {
                ours: vec![self.axis],
                theirs: vec![other.axis],
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a - b)
            .collect();
        let errors = self
            .errors
            .iter()
            .zip(&other.errors)
            .map(|(a, b)| a.hypot(*b))
            .collect();
        let entries = self
            .entries
            .iter()
            .zip(&other.entries)
            .map(|(a, b)| (*a).min(*b))
            .collect();
        Ok(Profile {
            axis: self.axis,
            values,
            errors,
            entries,
        })
    }
}

/// Covariance of the (x, y) distribution in every z bin of `h`.
///
/// The error of a bin is `1/sqrt(N)` with N the number of entries in that z
/// slice; bins without entries keep value and error zero.
pub fn covariance_profile(h: &Hist3D, estimator: EntropyEstimator) -> Profile {
    let mut profile = Profile::zeros(h.z);
    for iz in 0..h.z.bins {
        let slice = h.slice_z(iz);
        let n = slice.entries();
        profile.entries[iz] = n;
        profile.values[iz] = covariance(&slice, estimator);
        if n != 0 {
            profile.errors[iz] = 1.0 / (n as f64).sqrt();
        }
    }
    profile
}

/// Signal, background, and background-subtracted covariance profiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtractedProfile {
    pub signal: Profile,
    pub background: Profile,
    pub subtracted: Profile,
}

/// Covariance profile of `signal` minus that of `background`, bin by bin.
pub fn background_subtracted_profile(
    signal: &Hist3D,
    background: &Hist3D,
    estimator: EntropyEstimator,
) -> Result<SubtractedProfile, MergeError> {
    let signal = covariance_profile(signal, estimator);
    let background = covariance_profile(background, estimator);
    let subtracted = signal.subtract(&background)?;
    Ok(SubtractedProfile {
        signal,
        background,
        subtracted,
    })
}
