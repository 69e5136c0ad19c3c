//! `dijetcorr aggregate` — merge slices and measure multiplicity correlations.

use std::path::{Path, PathBuf};

use dijetcorr_core::{AggregateReport, Aggregator, Config, EntropyEstimator, PtHatRange};

use super::{EXIT_FAILURE, EXIT_INIT};

pub struct AggregateCommandConfig<'a> {
    /// Explicit slice directories.
    pub dirs: &'a [String],
    /// Use every slice named `<prefix>_pThat_*` instead.
    pub prefix: Option<&'a str>,
    pub balance_cut: Option<f64>,
    pub estimator: Option<&'a str>,
    pub threads: usize,
    pub output: Option<&'a str>,
}

/// Run the aggregate command.
pub fn run(cmd: AggregateCommandConfig<'_>, mut config: Config) {
    if let Some(cut) = cmd.balance_cut {
        config.aggregation.balance_cut = cut;
    }
    if let Some(name) = cmd.estimator {
        match name.parse::<EntropyEstimator>() {
            Ok(est) => config.aggregation.estimator = est,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_INIT);
            }
        }
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(EXIT_INIT);
    }

    let prefix = cmd
        .prefix
        .map(PathBuf::from)
        .unwrap_or_else(|| config.generation.output_prefix.clone());
    let dirs: Vec<PathBuf> = if cmd.dirs.is_empty() {
        slices_with_prefix(&prefix)
    } else {
        cmd.dirs.iter().map(PathBuf::from).collect()
    };
    if dirs.is_empty() {
        eprintln!(
            "Error: no slices found for prefix {} (expected {}_pThat_<min>_<max>/)",
            prefix.display(),
            prefix.display()
        );
        std::process::exit(EXIT_FAILURE);
    }

    let mut agg = Aggregator::new(config.aggregation.clone());
    let used = agg.load_slices(&dirs, cmd.threads);
    if used == 0 {
        eprintln!("Error: none of the {} slice(s) could be used", dirs.len());
        print_skipped(&agg);
        std::process::exit(EXIT_FAILURE);
    }

    let report = match AggregateReport::build(&agg) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    print_report(&report);
    print_skipped(&agg);

    if let Some(path) = cmd.output {
        match report.write_json(Path::new(path)) {
            Ok(()) => println!("\nReport written to {path}"),
            Err(e) => {
                eprintln!("Error writing {path}: {e}");
                std::process::exit(EXIT_FAILURE);
            }
        }
    }
}

/// Every directory named `<prefix>_pThat_*`, ordered by the pt-hat of its
/// label. Directories are not opened here: an unreadable slice still goes to
/// the aggregator, which reports it as skipped.
fn slices_with_prefix(prefix: &Path) -> Vec<PathBuf> {
    let parent = match prefix.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(stem) = prefix.file_name().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let wanted = format!("{stem}_pThat_");
    let entries = match std::fs::read_dir(&parent) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot list {}: {e}", parent.display());
            return Vec::new();
        }
    };

    let mut found: Vec<(Option<f64>, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let label = name.strip_prefix(&wanted)?;
            let min = PtHatRange::parse_label(label).ok().map(|r| r.min);
            Some((min, path))
        })
        .collect();
    // Unparseable labels sort last.
    found.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.1.cmp(&b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    found.into_iter().map(|(_, dir)| dir).collect()
}

fn print_report(report: &AggregateReport) {
    println!(
        "{:>10} {:>10} {:>10} {:>8} {:>12} {:>12}",
        "slice", "events", "pairs", "used", "sigma [mb]", "weight"
    );
    println!("{}", "-".repeat(67));
    for s in &report.slices {
        println!(
            "{:>10} {:>10} {:>10} {:>8} {:>12.4e} {:>12.4e}",
            s.label, s.n_events, s.n_records, s.n_used, s.sigma_gen_mb, s.weight
        );
    }
    println!();
    println!("Total cross section: {:.4e} mb", report.total_cross_section_mb);
    println!(
        "Balance cut:         sub/lead >= {}",
        report.settings.balance_cut
    );
    println!("Estimator:           {}", report.settings.estimator);

    let inc = &report.inclusive;
    println!();
    println!("Lead vs sub charged multiplicity ({} entries)", inc.entries);
    println!("  S(lead)      = {:.6}", inc.s_x);
    println!("  S(sub)       = {:.6}", inc.s_y);
    println!("  S(lead,sub)  = {:.6}", inc.s_xy);
    println!("  covariance   = {:.6}", inc.covariance);
    println!("  correlation  = {:.6}", inc.correlation);

    let p = &report.covariance_vs_lead_pt;
    println!();
    println!("Covariance vs lead pt");
    println!(
        "{:>14} {:>8} {:>10} {:>10} {:>10} {:>10}",
        "lead pt", "entries", "dijet", "bkg", "dijet-bkg", "error"
    );
    for i in 0..p.signal.axis.bins {
        if p.signal.entries[i] == 0 && p.background.entries[i] == 0 {
            continue;
        }
        let lo = p.signal.axis.lower_edge(i);
        let hi = p.signal.axis.lower_edge(i + 1);
        println!(
            "{:>6.1}-{:<7.1} {:>8} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            lo,
            hi,
            p.signal.entries[i],
            p.signal.values[i],
            p.background.values[i],
            p.subtracted.values[i],
            p.subtracted.errors[i]
        );
    }
}

fn print_skipped(agg: &Aggregator) {
    if agg.skipped().is_empty() {
        return;
    }
    eprintln!();
    eprintln!("Skipped {} slice(s):", agg.skipped().len());
    for s in agg.skipped() {
        eprintln!("  {}: {}", s.dir.display(), s.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dijetcorr_core::source::CrossSection;
    use dijetcorr_core::{PairRecord, SelectionConfig, SliceConfig, SliceWriter};

    fn write_slice(prefix: &Path, range: PtHatRange) -> PathBuf {
        let dir = dijetcorr_core::slice_dir(prefix, &range);
        let mut writer = SliceWriter::new(SliceConfig {
            dir: dir.clone(),
            pt_hat: range,
            source: "test".to_string(),
            seed: None,
            selection: SelectionConfig::default(),
        })
        .unwrap();
        writer
            .write_records(&[PairRecord {
                lead_pt: 10.0,
                sub_pt: 8.0,
                lead_eta: 0.1,
                sub_eta: -0.2,
                lead_phi: 0.0,
                sub_phi: 3.0,
                lead_n_charged: 3,
                sub_n_charged: 2,
                closeness: 0.14,
                background_mult_a: 1,
                background_mult_b: 0,
            }])
            .unwrap();
        writer
            .finish(
                100,
                1,
                CrossSection {
                    sigma_gen_mb: 1.0,
                    sigma_err_mb: 0.0,
                },
            )
            .unwrap();
        dir
    }

    #[test]
    fn test_slices_with_prefix_filters_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("pp200");
        write_slice(&prefix, PtHatRange::new(3.0, Some(4.0)).unwrap());
        write_slice(&prefix, PtHatRange::new(2.0, Some(3.0)).unwrap());
        write_slice(
            &tmp.path().join("other"),
            PtHatRange::new(2.0, Some(3.0)).unwrap(),
        );
        let found = slices_with_prefix(&prefix);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("pp200_pThat_2_3"));
        assert!(found[1].ends_with("pp200_pThat_3_4"));
        assert!(slices_with_prefix(&tmp.path().join("absent")).is_empty());
    }

    #[test]
    fn test_broken_prefix_slices_are_reported_as_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("pp200");
        write_slice(&prefix, PtHatRange::new(2.0, Some(3.0)).unwrap());

        let truncated = write_slice(&prefix, PtHatRange::new(3.0, Some(4.0)).unwrap());
        std::fs::write(truncated.join("summary.json"), "{\"version\": 1, \"id\"").unwrap();

        let no_summary = write_slice(&prefix, PtHatRange::new(4.0, Some(5.0)).unwrap());
        std::fs::remove_file(no_summary.join("summary.json")).unwrap();

        let dirs = slices_with_prefix(&prefix);
        assert_eq!(dirs.len(), 3);

        let mut agg = Aggregator::new(Config::default().aggregation);
        assert_eq!(agg.load_slices(&dirs, 1), 1);
        let skipped: Vec<&PathBuf> = agg.skipped().iter().map(|s| &s.dir).collect();
        assert_eq!(skipped, vec![&truncated, &no_summary]);
    }

    #[test]
    fn test_unparseable_labels_sort_last() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("pp200");
        std::fs::create_dir_all(tmp.path().join("pp200_pThat_junk")).unwrap();
        write_slice(&prefix, PtHatRange::new(55.0, None).unwrap());
        write_slice(&prefix, PtHatRange::new(5.0, Some(7.0)).unwrap());
        let found = slices_with_prefix(&prefix);
        assert_eq!(found.len(), 3);
        assert!(found[0].ends_with("pp200_pThat_5_7"));
        assert!(found[1].ends_with("pp200_pThat_55_-1"));
        assert!(found[2].ends_with("pp200_pThat_junk"));
    }
}
