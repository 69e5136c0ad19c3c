//! CLI for dijetcorr — dijet multiplicity correlations from simulated collisions.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dijetcorr")]
#[command(about = "dijetcorr — generate dijet slices and measure multiplicity correlations")]
#[command(version = dijetcorr_core::VERSION)]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event loop for each pt-hat bin and write one slice directory per bin
    Generate {
        /// Comma-separated pt-hat bins as <min>_<max> (-1 or inf = open), or "default"
        #[arg(long, default_value = "default")]
        bins: String,

        /// Generator attempts per slice
        #[arg(long)]
        events: Option<u64>,

        /// Base seed; bin i uses seed + i
        #[arg(long)]
        seed: Option<u64>,

        /// Slice directories are named <output>_pThat_<min>_<max>
        #[arg(long)]
        output: Option<String>,

        /// Read clustered events from a JSON-lines file instead of the toy source
        #[arg(long)]
        input: Option<String>,

        /// Generated cross section of --input, in mb
        #[arg(long)]
        sigma_mb: Option<f64>,

        /// Uncertainty of --sigma-mb, in mb
        #[arg(long)]
        sigma_err_mb: Option<f64>,
    },

    /// Merge slices with cross-section weights and compute entropy correlations
    Aggregate {
        /// Slice directories (default: every <prefix>_pThat_* directory)
        dirs: Vec<String>,

        /// Slice name prefix to search for when no directories are given
        #[arg(long)]
        prefix: Option<String>,

        /// Minimum sub/lead pt ratio
        #[arg(long)]
        balance_cut: Option<f64>,

        /// Entropy estimator: plugin (default) or miller_madow
        #[arg(long, value_parser = ["plugin", "none", "miller_madow", "miller-madow", "mm"])]
        estimator: Option<String>,

        /// Worker threads for loading slices
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// List generated slices
    Slices {
        /// Directory containing slice directories
        #[arg(default_value = ".")]
        dir: String,
    },

    /// Print the effective configuration (defaults plus --config) as JSON
    Config {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Generate {
            bins,
            events,
            seed,
            output,
            input,
            sigma_mb,
            sigma_err_mb,
        } => commands::generate::run(
            commands::generate::GenerateCommandConfig {
                bins: &bins,
                events,
                seed,
                output_prefix: output.as_deref(),
                input: input.as_deref(),
                sigma_mb,
                sigma_err_mb,
            },
            config,
        ),
        Commands::Aggregate {
            dirs,
            prefix,
            balance_cut,
            estimator,
            threads,
            output,
        } => commands::aggregate::run(
            commands::aggregate::AggregateCommandConfig {
                dirs: &dirs,
                prefix: prefix.as_deref(),
                balance_cut,
                estimator: estimator.as_deref(),
                threads,
                output: output.as_deref(),
            },
            config,
        ),
        Commands::Slices { dir } => commands::slices::run(&dir),
        Commands::Config { output } => commands::config::run(&config, output.as_deref()),
    }
}
