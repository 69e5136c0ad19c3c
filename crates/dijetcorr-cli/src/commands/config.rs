//! `dijetcorr config` — print or write the effective configuration.

use dijetcorr_core::Config;

use super::EXIT_FAILURE;

/// Run the config command.
pub fn run(config: &Config, output: Option<&str>) {
    let json = match serde_json::to_string_pretty(config) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing config: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, format!("{json}\n")) {
                eprintln!("Error writing {path}: {e}");
                std::process::exit(EXIT_FAILURE);
            }
            println!("Config written to {path}");
        }
        None => println!("{json}"),
    }
}
