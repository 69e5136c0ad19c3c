//! `dijetcorr generate` — produce one slice directory per pt-hat bin.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dijetcorr_core::source::{CrossSection, EventSource, JsonlEventSource, ToyDijetSource};
use dijetcorr_core::{Config, PtHatRange, SliceConfig, SliceSummary, SliceWriter, run_slice};

use super::{EXIT_FAILURE, EXIT_INIT, fmt_upper, parse_bins};

pub struct GenerateCommandConfig<'a> {
    pub bins: &'a str,
    pub events: Option<u64>,
    pub seed: Option<u64>,
    pub output_prefix: Option<&'a str>,
    /// JSON-lines event file instead of the toy source.
    pub input: Option<&'a str>,
    pub sigma_mb: Option<f64>,
    pub sigma_err_mb: Option<f64>,
}

/// Run the generate command.
pub fn run(cmd: GenerateCommandConfig<'_>, mut config: Config) {
    if let Some(n) = cmd.events {
        config.generation.n_events = n;
    }
    if let Some(seed) = cmd.seed {
        config.generation.seed = seed;
    }
    if let Some(prefix) = cmd.output_prefix {
        config.generation.output_prefix = PathBuf::from(prefix);
    }

    let bins = match parse_bins(cmd.bins) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_INIT);
        }
    };
    if cmd.input.is_some() && bins.len() != 1 {
        eprintln!("Error: --input reads one slice; pass exactly one bin with --bins");
        std::process::exit(EXIT_INIT);
    }

    // Every source is opened before the first slice is written.
    let sources = match open_sources(&cmd, &bins, config.generation.seed) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_INIT);
        }
    };

    // Set up Ctrl+C handler
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    }) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    let gen_cfg = &config.generation;
    println!("Generating {} slice(s)", bins.len());
    println!("  Source:  {}", cmd.input.unwrap_or("toy"));
    println!("  Events:  {} per slice", gen_cfg.n_events);
    println!("  Seed:    {}", gen_cfg.seed);
    println!("  Prefix:  {}", gen_cfg.output_prefix.display());
    println!();

    let mut summaries: Vec<SliceSummary> = Vec::new();
    for (range, mut source) in bins.iter().zip(sources) {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let dir = dijetcorr_core::slice_dir(&gen_cfg.output_prefix, range);

        let writer = match SliceWriter::new(SliceConfig {
            dir: dir.clone(),
            pt_hat: *range,
            source: source.name().to_string(),
            seed: source.seed(),
            selection: config.selection.clone(),
        }) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Error creating slice {}: {e}", dir.display());
                std::process::exit(EXIT_FAILURE);
            }
        };

        match run_slice(
            source.as_mut(),
            gen_cfg.n_events,
            &config.selection,
            writer,
            &stop,
        ) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                eprintln!("Error writing slice {}: {e}", dir.display());
                std::process::exit(EXIT_FAILURE);
            }
        }
    }

    print_summaries(&summaries);
    if stop.load(Ordering::SeqCst) {
        println!();
        println!("Interrupted: the last slice records only the events actually attempted.");
    }
}

/// One source per bin: the toy (bin `i` seeded with `seed + i`), or the
/// JSON-lines reader when `--input` was given.
fn open_sources(
    cmd: &GenerateCommandConfig<'_>,
    bins: &[PtHatRange],
    seed: u64,
) -> Result<Vec<Box<dyn EventSource>>, String> {
    bins.iter()
        .enumerate()
        .map(|(i, range)| open_source(cmd, *range, seed.wrapping_add(i as u64)))
        .collect()
}

fn open_source(
    cmd: &GenerateCommandConfig<'_>,
    range: PtHatRange,
    seed: u64,
) -> Result<Box<dyn EventSource>, String> {
    let opened: Result<Box<dyn EventSource>, _> = match cmd.input {
        Some(path) => {
            let sigma_gen_mb = cmd.sigma_mb.ok_or_else(|| {
                "--input needs --sigma-mb (generated cross section of the file)".to_string()
            })?;
            let xs = CrossSection {
                sigma_gen_mb,
                sigma_err_mb: cmd.sigma_err_mb.unwrap_or(0.0),
            };
            JsonlEventSource::open(std::path::Path::new(path), xs)
                .map(|s| Box::new(s) as Box<dyn EventSource>)
        }
        None => ToyDijetSource::new(range, seed).map(|s| Box::new(s) as Box<dyn EventSource>),
    };
    opened.map_err(|e| format!("pThat bin {}: {e}", range.label()))
}

fn print_summaries(summaries: &[SliceSummary]) {
    if summaries.is_empty() {
        println!("No slices written.");
        return;
    }
    println!(
        "{:>8} {:>8} {:>10} {:>10} {:>10} {:>12} {:>12}",
        "pThat>", "pThat<", "events", "accepted", "pairs", "sigma [mb]", "weight"
    );
    println!("{}", "-".repeat(76));
    for s in summaries {
        let weight = s
            .event_weight()
            .map_or_else(|| "-".to_string(), |w| format!("{w:.4e}"));
        println!(
            "{:>8} {:>8} {:>10} {:>10} {:>10} {:>12.4e} {:>12}",
            s.pt_hat_min,
            fmt_upper(s.pt_hat_max),
            s.n_events,
            s.n_accepted,
            s.n_pairs,
            s.sigma_gen_mb,
            weight
        );
    }
}
