//! # dijetcorr-core
//!
//! Dijet multiplicity correlations from simulated collisions.
//!
//! Events come from an [`EventSource`] (an external generator plus jet
//! clustering, or the built-in toy). Each event goes through the selection
//! pipeline and yields one [`PairRecord`] per back-to-back jet pair. Records
//! are persisted per kinematic slice (one pt-hat range) and later merged into
//! cross-section-weighted distributions by an [`Aggregator`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use dijetcorr_core::{AggregateReport, AggregationConfig, Aggregator};
//! use std::path::PathBuf;
//!
//! let mut agg = Aggregator::new(AggregationConfig::default());
//! agg.load_slices(&[PathBuf::from("pp200_pThat_20_25")], 1);
//! let report = AggregateReport::build(&agg).unwrap();
//! println!("covariance = {:.4}", report.inclusive.covariance);
//! ```
//!
//! ## Architecture
//!
//! Source → pipeline (acceptance, pair selection, cones) → slice on disk →
//! aggregator (weighted histograms) → entropy estimator → report
//!
//! "Covariance" throughout is the mutual information `S(X) + S(Y) − S(X,Y)`
//! in nats, not a product-moment covariance.

pub mod aggregate;
pub mod cone;
pub mod config;
pub mod entropy;
pub mod error;
pub mod event;
pub mod histogram;
pub mod kinematics;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod selection;
pub mod slice;
pub mod source;

pub use aggregate::{Aggregator, Distributions, SkippedSlice, SliceContribution};
pub use cone::{Cone, ParticleAcceptance, count_charged_in_cone};
pub use config::{AggregationConfig, BinningConfig, Config, GenerationConfig, SelectionConfig};
pub use entropy::{
    EntropyEstimator, InclusiveCorrelation, Profile, SubtractedProfile,
    background_subtracted_profile, covariance, covariance_profile, entropy, inclusive_correlation,
};
pub use error::{ConfigError, MergeError, SliceError, SourceError};
pub use event::{Event, JetCandidate, Particle};
pub use histogram::{Axis, Hist1D, Hist2D, Hist3D};
pub use pipeline::{process_event, run_slice};
pub use record::{CSV_HEADER, PairRecord, build_record};
pub use report::AggregateReport;
pub use selection::{DEFAULT_MIN_DPHI, DijetPair, select_dijets};
pub use slice::{
    KinematicSlice, PtHatRange, SliceConfig, SliceSummary, SliceWriter, discover_slices,
    slice_dir,
};
pub use source::{CrossSection, EventSource, JsonlEventSource, ToyDijetSource};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
