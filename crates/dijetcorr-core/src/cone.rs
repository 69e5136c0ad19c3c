//! Charged-particle counting inside an (η, φ) cone.
//!
//! Used for the underlying-event estimate transverse to the dijet axis. A cone
//! that is not fully contained in the particle acceptance yields a count of
//! zero rather than a biased partial count.

use crate::event::Particle;
use crate::kinematics::delta_r;

/// Cone center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    pub eta: f64,
    pub phi: f64,
    pub radius: f64,
}

/// Particle-level acceptance applied inside the cone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleAcceptance {
    pub pt_min: f64,
    pub eta_max: f64,
}

impl Cone {
    pub fn new(eta: f64, phi: f64, radius: f64) -> Self {
        Self { eta, phi, radius }
    }

    /// Whether the whole cone lies inside `|eta| <= eta_max`.
    pub fn is_contained(&self, eta_max: f64) -> bool {
        self.eta.abs() <= eta_max - self.radius
    }
}

/// Count charged particles with `pt >= pt_min`, `|eta| <= eta_max` and
/// `ΔR < radius` from the cone center.
///
/// Returns 0 without looking at the particles when the cone is not contained.
pub fn count_charged_in_cone(
    particles: &[Particle],
    cone: Cone,
    acceptance: ParticleAcceptance,
) -> u32 {
    if !cone.is_contained(acceptance.eta_max) {
        return 0;
    }
    particles
        .iter()
        .filter(|p| p.charged)
        .filter(|p| p.pt >= acceptance.pt_min)
        .filter(|p| p.eta.abs() <= acceptance.eta_max)
        .filter(|p| delta_r(p.eta, p.phi, cone.eta, cone.phi) < cone.radius)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const ACC: ParticleAcceptance = ParticleAcceptance {
        pt_min: 0.15,
        eta_max: 1.0,
    };

    #[test]
    fn counts_charged_inside_radius() {
        let particles = vec![
            Particle::charged_final(1.0, 0.0, 0.0),
            Particle::charged_final(1.0, 0.1, 0.1),
            Particle::charged_final(1.0, 0.0, 0.5), // outside R = 0.4
            Particle::neutral_final(1.0, 0.0, 0.0),
        ];
        assert_eq!(count_charged_in_cone(&particles, Cone::new(0.0, 0.0, 0.4), ACC), 2);
    }

    #[test]
    fn applies_pt_threshold_and_eta_acceptance() {
        let particles = vec![
            Particle::charged_final(0.1, 0.0, 0.0),  // below threshold
            Particle::charged_final(0.15, 0.0, 0.0), // exactly at threshold
            Particle::charged_final(1.0, 0.55, 0.0),
        ];
        let cone = Cone::new(0.3, 0.0, 0.4);
        let acc = ParticleAcceptance {
            pt_min: 0.15,
            eta_max: 0.8,
        };
        assert_eq!(count_charged_in_cone(&particles, cone, acc), 2);
    }

    #[test]
    fn cone_crossing_phi_boundary() {
        let particles = vec![
            Particle::charged_final(1.0, 0.0, PI - 0.05),
            Particle::charged_final(1.0, 0.0, -PI + 0.05),
        ];
        let cone = Cone::new(0.0, PI, 0.2);
        assert_eq!(count_charged_in_cone(&particles, cone, ACC), 2);
    }

    #[test]
    fn uncontained_cone_is_zero_regardless_of_content() {
        let particles: Vec<Particle> = (0..50)
            .map(|i| Particle::charged_final(2.0, 0.7, i as f64 * 0.001))
            .collect();
        // eta_max - R = 0.6 < 0.7
        let cone = Cone::new(0.7, 0.0, 0.4);
        assert_eq!(count_charged_in_cone(&particles, cone, ACC), 0);
        let cone = Cone::new(-0.61, 0.0, 0.4);
        assert_eq!(count_charged_in_cone(&particles, cone, ACC), 0);
    }

    #[test]
    fn cone_inside_acceptance_is_contained() {
        let cone = Cone::new(-0.5, 1.0, 0.4);
        assert!(cone.is_contained(1.0));
        assert!(!cone.is_contained(0.8));
    }
}
