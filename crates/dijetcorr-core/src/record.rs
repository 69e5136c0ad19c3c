//! Per-pair observables persisted for downstream aggregation.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::cone::{Cone, ParticleAcceptance, count_charged_in_cone};
use crate::event::{JetCandidate, Particle};
use crate::kinematics::wrap_phi;
use crate::selection::DijetPair;

/// Column order of `pairs.csv`.
pub const CSV_HEADER: &str = "lead_pt,sub_pt,lead_eta,sub_eta,lead_phi,sub_phi,\
lead_n_charged,sub_n_charged,closeness,background_mult_A,background_mult_B";

const CSV_FIELDS: usize = 11;

/// Observables of one selected dijet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub lead_pt: f64,
    pub sub_pt: f64,
    pub lead_eta: f64,
    pub sub_eta: f64,
    pub lead_phi: f64,
    pub sub_phi: f64,
    pub lead_n_charged: u32,
    pub sub_n_charged: u32,
    pub closeness: f64,
    /// Charged multiplicity in the cone at lead φ + π/2.
    pub background_mult_a: u32,
    /// Charged multiplicity in the cone at lead φ − π/2.
    pub background_mult_b: u32,
}

impl PairRecord {
    /// `sub_pt / lead_pt`, or `None` when the lead momentum is not positive.
    pub fn balance(&self) -> Option<f64> {
        if self.lead_pt > 0.0 {
            Some(self.sub_pt / self.lead_pt)
        } else {
            None
        }
    }

    /// One `pairs.csv` row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.lead_pt,
            self.sub_pt,
            self.lead_eta,
            self.sub_eta,
            self.lead_phi,
            self.sub_phi,
            self.lead_n_charged,
            self.sub_n_charged,
            self.closeness,
            self.background_mult_a,
            self.background_mult_b,
        )
    }

    /// Parse one `pairs.csv` row.
    pub fn from_csv_row(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != CSV_FIELDS {
            return Err(format!(
                "expected {CSV_FIELDS} fields, found {}",
                fields.len()
            ));
        }
        let float = |i: usize| -> Result<f64, String> {
            let v: f64 = fields[i]
                .parse()
                .map_err(|e| format!("column {}: {e}", i + 1))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(format!("column {}: non-finite value", i + 1))
            }
        };
        // Multiplicities were written as doubles by older producers.
        let count = |i: usize| -> Result<u32, String> {
            let raw = fields[i];
            if let Ok(n) = raw.parse::<u32>() {
                return Ok(n);
            }
            let v: f64 = raw.parse().map_err(|e| format!("column {}: {e}", i + 1))?;
            if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
                Ok(v as u32)
            } else {
                Err(format!("column {}: not a multiplicity: {raw}", i + 1))
            }
        };
        Ok(Self {
            lead_pt: float(0)?,
            sub_pt: float(1)?,
            lead_eta: float(2)?,
            sub_eta: float(3)?,
            lead_phi: float(4)?,
            sub_phi: float(5)?,
            lead_n_charged: count(6)?,
            sub_n_charged: count(7)?,
            closeness: float(8)?,
            background_mult_a: count(9)?,
            background_mult_b: count(10)?,
        })
    }
}

/// The two underlying-event cones transverse to the lead jet, (A, B).
pub fn background_cones(lead_eta: f64, lead_phi: f64, radius: f64) -> (Cone, Cone) {
    (
        Cone::new(lead_eta, wrap_phi(lead_phi + FRAC_PI_2), radius),
        Cone::new(lead_eta, wrap_phi(lead_phi - FRAC_PI_2), radius),
    )
}

/// Build the record of one selected pair.
///
/// `particles` is the event's full particle list (jet constituents index into
/// it); `cone_particles` are the detector-level particles used for the
/// background cones.
pub fn build_record(
    pair: &DijetPair,
    jets: &[JetCandidate],
    particles: &[Particle],
    cone_particles: &[Particle],
    jet_radius: f64,
    acceptance: ParticleAcceptance,
) -> PairRecord {
    let lead = &jets[pair.lead];
    let sub = &jets[pair.sub];
    let lead_phi = wrap_phi(lead.phi);
    let (cone_a, cone_b) = background_cones(lead.eta, lead_phi, jet_radius);

    PairRecord {
        lead_pt: lead.pt,
        sub_pt: sub.pt,
        lead_eta: lead.eta,
        sub_eta: sub.eta,
        lead_phi,
        sub_phi: wrap_phi(sub.phi),
        lead_n_charged: lead.charged_constituents(particles),
        sub_n_charged: sub.charged_constituents(particles),
        closeness: pair.closeness,
        background_mult_a: count_charged_in_cone(cone_particles, cone_a, acceptance),
        background_mult_b: count_charged_in_cone(cone_particles, cone_b, acceptance),
    }
}
