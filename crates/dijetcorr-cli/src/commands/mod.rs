pub mod aggregate;
pub mod config;
pub mod generate;
pub mod slices;

use std::path::Path;

use dijetcorr_core::{Config, PtHatRange};

/// Exit status for failures before any event is processed.
pub const EXIT_INIT: i32 = 2;
/// Exit status for every other fatal error.
pub const EXIT_FAILURE: i32 = 1;

/// pt-hat slices of the 200 GeV reference production.
pub const DEFAULT_BINS: &str = "2_3,3_4,4_5,5_7,7_9,9_11,11_15,15_20,20_25,25_35,35_45,45_55,55_-1";

/// Load the config file if one was given, otherwise the defaults.
/// Exits with [`EXIT_INIT`] when the file is unreadable or invalid.
pub fn load_config(path: Option<&str>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    match Config::load(Path::new(path)) {
        Ok(config) => {
            log::info!("loaded config from {path}");
            config
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_INIT);
        }
    }
}

/// Parse a comma-separated list of slice labels (`2_3,3_4,55_-1`), or
/// `default` for [`DEFAULT_BINS`].
pub fn parse_bins(list: &str) -> Result<Vec<PtHatRange>, String> {
    let list = list.trim();
    let list = if list == "default" { DEFAULT_BINS } else { list };
    let bins: Vec<PtHatRange> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PtHatRange::parse_label)
        .collect::<Result<_, _>>()?;
    if bins.is_empty() {
        return Err("no pThat bins given".to_string());
    }
    Ok(bins)
}

/// Format an optional pt-hat upper bound for tables.
pub fn fmt_upper(max: Option<f64>) -> String {
    max.map_or_else(|| "inf".to_string(), |v| format!("{v}"))
}
