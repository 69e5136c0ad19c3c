//! Event sources: the boundary to the generator and jet clustering.
//!
//! Every source implements the [`EventSource`] trait. Two are provided:
//! - [`JsonlEventSource`] reads externally generated, already clustered events
//!   (one JSON [`Event`] per line).
//! - [`ToyDijetSource`] is a seeded toy that emits back-to-back jets with
//!   Poisson constituent multiplicities and a flat underlying event. It is not
//!   a physics generator; it exists so slices can be produced without
//!   external tools.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Poisson};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::event::{Event, JetCandidate, Particle};
use crate::kinematics::wrap_phi;
use crate::slice::PtHatRange;

/// Generated cross section of one slice, in millibarn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    pub sigma_gen_mb: f64,
    pub sigma_err_mb: f64,
}

/// Trait that every event source must implement.
pub trait EventSource: Send {
    /// Short identifier stored in the slice summary.
    fn name(&self) -> &str;

    /// Next generator attempt.
    ///
    /// `None` means the source is exhausted. `Some(Err(_))` is a failed
    /// attempt; it still counts as a generated event.
    fn next_event(&mut self) -> Option<Result<Event, SourceError>>;

    /// Cross section of everything produced so far.
    fn cross_section(&self) -> CrossSection;

    /// Seed, for sources that have one.
    fn seed(&self) -> Option<u64> {
        None
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Reads one [`Event`] per line from a JSON-lines file. Blank lines are
/// skipped. The cross section comes from the producer of the file.
pub struct JsonlEventSource {
    path: PathBuf,
    name: String,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    cross_section: CrossSection,
}

impl JsonlEventSource {
    pub fn open(path: &Path, cross_section: CrossSection) -> Result<Self, SourceError> {
        if !(cross_section.sigma_gen_mb.is_finite() && cross_section.sigma_gen_mb >= 0.0) {
            return Err(SourceError::Init(format!(
                "cross section must be a non-negative number, got {}",
                cross_section.sigma_gen_mb
            )));
        }
        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            name: format!("jsonl:{}", path.display()),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            cross_section,
        })
    }
}

impl EventSource for JsonlEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event(&mut self) -> Option<Result<Event, SourceError>> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(l) => l,
                Err(source) => {
                    return Some(Err(SourceError::Io {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str::<Event>(&line).map_err(|e| SourceError::Parse {
                    line: self.line_no,
                    reason: e.to_string(),
                }),
            );
        }
    }

    fn cross_section(&self) -> CrossSection {
        self.cross_section
    }
}

// ---------------------------------------------------------------------------
// Toy dijet source
// ---------------------------------------------------------------------------

/// √s / 2 for 200 GeV collisions; caps an open pt-hat range.
pub const TOY_PT_HAT_CAP: f64 = 100.0;
/// Lowest pt-hat the power law is sampled from.
const TOY_PT_HAT_FLOOR: f64 = 1.0;
/// dσ/dpT̂ ∝ pT̂^-k.
const TOY_POWER: f64 = 5.0;
/// Normalization of the toy spectrum, mb·GeV^(k-1).
const TOY_NORM_MB: f64 = 1000.0;
const TOY_JET_RADIUS: f64 = 0.4;
const TOY_JET_ETA_SPREAD: f64 = 0.9;
const TOY_UE_MEAN: f64 = 6.0;
/// Underlying-event particle pt is exponential with mean 1/rate GeV.
const TOY_UE_PT_RATE: f64 = 2.0;
const TOY_UE_ETA_SPREAD: f64 = 1.2;
const TOY_THIRD_JET_PROB: f64 = 0.15;

/// Seeded toy producer of clustered dijet events in one pt-hat slice.
pub struct ToyDijetSource {
    rng: StdRng,
    seed: u64,
    lo: f64,
    hi: f64,
    sigma_mb: f64,
    n_generated: u64,
    remaining: Option<u64>,
    ue_count: Poisson<f64>,
    ue_pt: Exp<f64>,
}

impl ToyDijetSource {
    /// Toy source for `range`. An open upper bound is capped at
    /// [`TOY_PT_HAT_CAP`].
    pub fn new(range: PtHatRange, seed: u64) -> Result<Self, SourceError> {
        let lo = range.min.max(TOY_PT_HAT_FLOOR);
        let hi = range.max.unwrap_or(TOY_PT_HAT_CAP).min(TOY_PT_HAT_CAP);
        if hi <= lo {
            return Err(SourceError::Init(format!(
                "toy pThat range [{lo}, {hi}) is empty"
            )));
        }
        let ue_count = Poisson::new(TOY_UE_MEAN)
            .map_err(|e| SourceError::Init(format!("underlying event multiplicity: {e}")))?;
        let ue_pt = Exp::new(TOY_UE_PT_RATE)
            .map_err(|e| SourceError::Init(format!("underlying event pt: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            lo,
            hi,
            sigma_mb: toy_cross_section(lo, hi),
            n_generated: 0,
            remaining: None,
            ue_count,
            ue_pt,
        })
    }

    /// Stop after `n` events instead of producing forever.
    pub fn with_limit(mut self, n: u64) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Inverse CDF of the truncated power law on `[lo, hi)`.
    fn sample_pt_hat(&mut self) -> f64 {
        let u: f64 = self.rng.random();
        let e = 1.0 - TOY_POWER;
        let a = self.lo.powf(e);
        let b = self.hi.powf(e);
        (a - u * (a - b)).powf(1.0 / e)
    }

    fn generate(&mut self) -> Event {
        let pt_hat = self.sample_pt_hat();
        let mut event = Event::default();

        let phi_lead = wrap_phi(self.rng.random_range(-PI..PI));
        let phi_sub = wrap_phi(phi_lead + PI + self.rng.random_range(-0.4..0.4));
        let eta_lead = self.rng.random_range(-TOY_JET_ETA_SPREAD..TOY_JET_ETA_SPREAD);
        let eta_sub = self.rng.random_range(-TOY_JET_ETA_SPREAD..TOY_JET_ETA_SPREAD);
        let pt_lead = pt_hat * self.rng.random_range(0.85..1.15);
        let pt_sub = pt_hat * self.rng.random_range(0.6..1.1);

        self.push_jet(&mut event, pt_lead, eta_lead, phi_lead);
        self.push_jet(&mut event, pt_sub, eta_sub, phi_sub);
        if self.rng.random::<f64>() < TOY_THIRD_JET_PROB {
            let pt = pt_hat * self.rng.random_range(0.1..0.4);
            let eta = self.rng.random_range(-TOY_JET_ETA_SPREAD..TOY_JET_ETA_SPREAD);
            let phi = wrap_phi(self.rng.random_range(-PI..PI));
            self.push_jet(&mut event, pt, eta, phi);
        }

        // Underlying event, plus the odd invisible particle.
        let n_ue = self.ue_count.sample(&mut self.rng) as u64;
        for _ in 0..n_ue {
            let pt = self.ue_pt.sample(&mut self.rng);
            let eta = self.rng.random_range(-TOY_UE_ETA_SPREAD..TOY_UE_ETA_SPREAD);
            let phi = self.rng.random_range(-PI..PI);
            let mut p = if self.rng.random::<f64>() < 0.65 {
                Particle::charged_final(pt, eta, phi)
            } else {
                Particle::neutral_final(pt, eta, phi)
            };
            if self.rng.random::<f64>() < 0.02 {
                p.charged = false;
                p.visible = false;
            }
            event.particles.push(p);
        }
        event
    }

    /// Append a jet and its constituents, spread within R/2 of the axis.
    fn push_jet(&mut self, event: &mut Event, pt: f64, eta: f64, phi: f64) {
        let mean_charged = 1.0 + 0.6 * pt.sqrt();
        let n_charged = sample_count(&mut self.rng, mean_charged).max(1);
        let n_neutral = sample_count(&mut self.rng, 0.5 * mean_charged);
        let n = n_charged + n_neutral;
        let half = 0.5 * TOY_JET_RADIUS;

        let mut fractions: Vec<f64> = (0..n)
            .map(|_| self.rng.random_range(0.05..1.0))
            .collect();
        let total: f64 = fractions.iter().sum();
        for f in &mut fractions {
            *f /= total;
        }

        let mut constituents = Vec::with_capacity(n as usize);
        for (i, frac) in fractions.into_iter().enumerate() {
            let c_eta = eta + self.rng.random_range(-half..half);
            let c_phi = wrap_phi(phi + self.rng.random_range(-half..half));
            let p = if (i as u64) < n_charged {
                Particle::charged_final(pt * frac, c_eta, c_phi)
            } else {
                Particle::neutral_final(pt * frac, c_eta, c_phi)
            };
            constituents.push(event.particles.len());
            event.particles.push(p);
        }

        event.jets.push(JetCandidate {
            pt,
            eta,
            phi,
            constituents,
        });
    }
}

impl EventSource for ToyDijetSource {
    fn name(&self) -> &str {
        "toy"
    }

    fn next_event(&mut self) -> Option<Result<Event, SourceError>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        self.n_generated += 1;
        Some(Ok(self.generate()))
    }

    fn cross_section(&self) -> CrossSection {
        let sigma_err_mb = if self.n_generated > 0 {
            self.sigma_mb / (self.n_generated as f64).sqrt()
        } else {
            self.sigma_mb
        };
        CrossSection {
            sigma_gen_mb: self.sigma_mb,
            sigma_err_mb,
        }
    }

    fn seed(&self) -> Option<u64> {
        Some(self.seed)
    }
}

/// Integral of the toy spectrum over `[lo, hi)`.
fn toy_cross_section(lo: f64, hi: f64) -> f64 {
    let e = 1.0 - TOY_POWER;
    TOY_NORM_MB / (TOY_POWER - 1.0) * (lo.powf(e) - hi.powf(e))
}

/// Poisson count with the given mean; zero for a non-positive mean.
fn sample_count(rng: &mut StdRng, mean: f64) -> u64 {
    match Poisson::new(mean) {
        Ok(dist) => dist.sample(rng) as u64,
        Err(_) => 0,
    }
}
