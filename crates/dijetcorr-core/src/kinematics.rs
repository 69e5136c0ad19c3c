//! Angular helpers shared by the cone counter, pair selector, and record builder.

use std::f64::consts::PI;

/// Signed azimuthal difference `phi1 - phi2` wrapped into (-π, π].
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let mut dphi = (phi1 - phi2) % (2.0 * PI);
    if dphi > PI {
        dphi -= 2.0 * PI;
    } else if dphi <= -PI {
        dphi += 2.0 * PI;
    }
    dphi
}

/// Wrap an azimuthal angle into (-π, π].
pub fn wrap_phi(phi: f64) -> f64 {
    delta_phi(phi, 0.0)
}

/// Angular distance `sqrt(Δη² + Δφ²)` with Δφ wrapped.
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let dphi = delta_phi(phi1, phi2);
    let deta = eta1 - eta2;
    (deta * deta + dphi * dphi).sqrt()
}
