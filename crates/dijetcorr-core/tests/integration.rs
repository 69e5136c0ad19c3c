//! Integration tests for dijetcorr-core.
//!
//! These tests exercise the full chain:
//! toy source → pipeline → slices on disk → aggregation → report.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use dijetcorr_core::{
    AggregateReport, AggregationConfig, Aggregator, PtHatRange, SelectionConfig, SliceConfig,
    SliceWriter, ToyDijetSource, discover_slices, run_slice, slice_dir,
};

const LABELS: [&str; 4] = ["5_7", "11_15", "20_25", "55_-1"];

fn generate(prefix: &Path, label: &str, seed: u64, n_events: u64) -> PathBuf {
    let range = PtHatRange::parse_label(label).unwrap();
    let dir = slice_dir(prefix, &range);
    let selection = SelectionConfig::default();
    let mut source = ToyDijetSource::new(range, seed).unwrap();
    let writer = SliceWriter::new(SliceConfig {
        dir: dir.clone(),
        pt_hat: range,
        source: "toy".to_string(),
        seed: Some(seed),
        selection: selection.clone(),
    })
    .unwrap();
    let stop = AtomicBool::new(false);
    run_slice(&mut source, n_events, &selection, writer, &stop).unwrap();
    dir
}

fn generate_all(prefix: &Path) -> Vec<PathBuf> {
    LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| generate(prefix, label, 100 + i as u64, 300))
        .collect()
}

#[test]
fn generate_then_aggregate() {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = generate_all(&tmp.path().join("pp200"));

    let found = discover_slices(tmp.path());
    assert_eq!(found.len(), LABELS.len());
    assert_eq!(found[0].1.label, "5_7");
    assert_eq!(found[3].1.pt_hat_max, None);

    let mut agg = Aggregator::new(AggregationConfig::default());
    assert_eq!(agg.load_slices(&dirs, 2), LABELS.len());
    assert!(agg.skipped().is_empty());

    let expected_sigma: f64 = found.iter().map(|(_, s)| s.sigma_gen_mb).sum();
    assert!((agg.total_cross_section() - expected_sigma).abs() < 1e-9 * expected_sigma);

    let report = AggregateReport::build(&agg).unwrap();
    assert!(report.distributions.mult_3d.entries() > 0);
    assert!(report.inclusive.covariance >= -1e-9);
    assert_eq!(
        report.covariance_vs_lead_pt.subtracted.values.len(),
        AggregationConfig::default().binning.lead_pt.bins
    );
}

#[test]
fn toy_generation_is_reproducible() {
    let tmp = tempfile::tempdir().unwrap();
    let a = generate(&tmp.path().join("a"), "11_15", 7, 200);
    let b = generate(&tmp.path().join("b"), "11_15", 7, 200);
    let pairs_a = std::fs::read_to_string(a.join("pairs.csv")).unwrap();
    let pairs_b = std::fs::read_to_string(b.join("pairs.csv")).unwrap();
    assert_eq!(pairs_a, pairs_b);
}

#[test]
fn aggregating_twice_gives_identical_distributions() {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = generate_all(&tmp.path().join("pp200"));

    let mut first = Aggregator::new(AggregationConfig::default());
    first.load_slices(&dirs, 1);
    let mut second = Aggregator::new(AggregationConfig::default());
    second.load_slices(&dirs, 1);
    assert_eq!(first.distributions(), second.distributions());
    assert_eq!(first.total_cross_section(), second.total_cross_section());
}

#[test]
fn corrupt_and_missing_slices_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dirs = generate_all(&tmp.path().join("pp200"));

    // Truncate one slice's summary and point at a slice that was never made.
    std::fs::write(dirs[1].join("summary.json"), "{\"n_events\": ").unwrap();
    dirs.push(tmp.path().join("pp200_pThat_99_-1"));

    let mut agg = Aggregator::new(AggregationConfig::default());
    assert_eq!(agg.load_slices(&dirs, 1), LABELS.len() - 1);
    assert_eq!(agg.skipped().len(), 2);

    let used: Vec<&str> = agg
        .contributions()
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(used, vec!["5_7", "20_25", "55_-1"]);
}

#[test]
fn stricter_balance_cut_uses_fewer_pairs() {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = generate_all(&tmp.path().join("pp200"));

    let mut loose = Aggregator::new(AggregationConfig {
        balance_cut: 0.0,
        ..AggregationConfig::default()
    });
    loose.load_slices(&dirs, 1);
    let mut strict = Aggregator::new(AggregationConfig {
        balance_cut: 0.9,
        ..AggregationConfig::default()
    });
    strict.load_slices(&dirs, 1);

    let used = |agg: &Aggregator| -> usize { agg.contributions().iter().map(|c| c.n_used).sum() };
    assert!(used(&strict) < used(&loose));
    assert_eq!(loose.total_cross_section(), strict.total_cross_section());
}
