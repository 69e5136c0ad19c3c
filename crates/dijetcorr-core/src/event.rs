//! Per-event inputs handed over by the generator and clustering stages.
//!
//! A [`Particle`] is one final-state (or intermediate) particle reported by the
//! generator. A [`JetCandidate`] is one clustered jet; its constituents are
//! indices into the owning [`Event`]'s particle list.

use serde::{Deserialize, Serialize};

/// One generated particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Transverse momentum (GeV/c).
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    #[serde(default = "default_true")]
    pub final_state: bool,
    pub charged: bool,
    /// False for neutrinos.
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// One clustered jet candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetCandidate {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    /// Indices into [`Event::particles`].
    #[serde(default)]
    pub constituents: Vec<usize>,
}

/// Everything the selection stage sees for one collision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub particles: Vec<Particle>,
    pub jets: Vec<JetCandidate>,
}

fn default_true() -> bool {
    true
}

impl Particle {
    /// Final-state charged particle that is visible to the detector.
    pub fn charged_final(pt: f64, eta: f64, phi: f64) -> Self {
        Self {
            pt,
            eta,
            phi,
            final_state: true,
            charged: true,
            visible: true,
        }
    }

    /// Final-state neutral particle that is visible to the detector.
    pub fn neutral_final(pt: f64, eta: f64, phi: f64) -> Self {
        Self {
            charged: false,
            ..Self::charged_final(pt, eta, phi)
        }
    }
}

impl JetCandidate {
    /// Number of charged constituents. Indices outside `particles` are ignored.
    pub fn charged_constituents(&self, particles: &[Particle]) -> u32 {
        self.constituents
            .iter()
            .filter_map(|&i| particles.get(i))
            .filter(|p| p.charged)
            .count() as u32
    }
}
