//! `dijetcorr slices` — list generated slices in a directory.

use std::path::PathBuf;

use dijetcorr_core::discover_slices;

use super::fmt_upper;

/// Run the slices command.
pub fn run(dir: &str) {
    let root = PathBuf::from(dir);
    if !root.is_dir() {
        println!("No directory found at {dir}");
        return;
    }
    let slices = discover_slices(&root);
    if slices.is_empty() {
        println!("No slices found in {dir}/");
        println!("Generate some first: dijetcorr generate --bins default");
        return;
    }

    println!(
        "{:<34} {:>7} {:>7} {:>9} {:>9} {:>9} {:>11} {:<20}",
        "directory", "pThat>", "pThat<", "events", "accepted", "pairs", "sigma [mb]", "ended"
    );
    println!("{}", "-".repeat(112));

    let mut total_sigma = 0.0;
    let mut total_pairs = 0u64;
    for (path, s) in &slices {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "{:<34} {:>7} {:>7} {:>9} {:>9} {:>9} {:>11.4e} {:<20}",
            name,
            s.pt_hat_min,
            fmt_upper(s.pt_hat_max),
            s.n_events,
            s.n_accepted,
            s.n_pairs,
            s.sigma_gen_mb,
            s.ended_at
        );
        if s.event_weight().is_some() {
            total_sigma += s.sigma_gen_mb;
        }
        total_pairs += s.n_pairs;
    }
    println!();
    println!(
        "{} slice(s), {} pairs, usable cross section {:.4e} mb",
        slices.len(),
        total_pairs,
        total_sigma
    );
}
