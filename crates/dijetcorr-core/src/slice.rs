//! Kinematic slice persistence.
//!
//! Each slice (one generator hardness bin) is a directory:
//! - `pairs.csv`: one row per selected dijet, header [`CSV_HEADER`]
//! - `summary.json`: event counts, pt-hat range, generated cross section
//!
//! Directory names follow `<prefix>_pThat_<min>_<max>`, with trailing zeros
//! trimmed from the bounds and `-1` standing for an open upper bound.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SelectionConfig;
use crate::error::SliceError;
use crate::record::{CSV_HEADER, PairRecord};
use crate::source::CrossSection;

pub const SUMMARY_FILE: &str = "summary.json";
pub const PAIRS_FILE: &str = "pairs.csv";
const SUMMARY_VERSION: u32 = 1;

/// pt-hat bounds of a slice. `max == None` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PtHatRange {
    pub min: f64,
    pub max: Option<f64>,
}

impl PtHatRange {
    pub fn new(min: f64, max: Option<f64>) -> Result<Self, String> {
        if !(min.is_finite() && min >= 0.0) {
            return Err(format!("pThat min must be a non-negative number, got {min}"));
        }
        if let Some(max) = max {
            if !max.is_finite() || max < min {
                return Err(format!("pThat max {max} is below pThat min {min}"));
            }
        }
        Ok(Self { min, max })
    }

    /// `"<min>_<max>"`, e.g. `"2_3"`, `"2.5_3"`, `"55_-1"`.
    pub fn label(&self) -> String {
        let max = self
            .max
            .map_or_else(|| "-1".to_string(), trim_trailing_zeros);
        format!("{}_{max}", trim_trailing_zeros(self.min))
    }

    /// Parse a label written by [`PtHatRange::label`]. Upper bounds `-1`,
    /// `inf` and any negative value mean "open".
    pub fn parse_label(label: &str) -> Result<Self, String> {
        let (lo, hi) = label
            .split_once('_')
            .ok_or_else(|| format!("pThat label '{label}' is not <min>_<max>"))?;
        let min: f64 = lo
            .parse()
            .map_err(|_| format!("bad pThat min '{lo}' in '{label}'"))?;
        Self::new(min, parse_upper_bound(hi)?)
    }
}

/// Parse a pt-hat upper bound: `inf` or a negative number means open.
pub fn parse_upper_bound(s: &str) -> Result<Option<f64>, String> {
    if s.eq_ignore_ascii_case("inf") {
        return Ok(None);
    }
    let v: f64 = s.parse().map_err(|_| format!("bad pThat max '{s}'"))?;
    if v < 0.0 { Ok(None) } else { Ok(Some(v)) }
}

/// Fixed three decimals, then strip trailing zeros and a trailing dot.
fn trim_trailing_zeros(x: f64) -> String {
    let s = format!("{x:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Directory of the slice covering `range` under `prefix`.
pub fn slice_dir(prefix: &Path, range: &PtHatRange) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!("_pThat_{}", range.label()));
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Summary (summary.json)
// ---------------------------------------------------------------------------

/// Per-slice metadata written once the event loop finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceSummary {
    pub version: u32,
    pub id: String,
    pub label: String,
    pub pt_hat_min: f64,
    pub pt_hat_max: Option<f64>,
    /// Generator attempts, including failed ones.
    pub n_events: u64,
    /// Events that produced at least one dijet.
    pub n_accepted: u64,
    pub n_pairs: u64,
    pub sigma_gen_mb: f64,
    pub sigma_err_mb: f64,
    pub source: String,
    pub seed: Option<u64>,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub selection: SelectionConfig,
    pub dijetcorr_version: String,
}

impl SliceSummary {
    pub fn pt_hat(&self) -> PtHatRange {
        PtHatRange {
            min: self.pt_hat_min,
            max: self.pt_hat_max,
        }
    }

    /// Cross section per generated event, or `None` when it would not be a
    /// finite, non-negative number.
    pub fn event_weight(&self) -> Option<f64> {
        if self.n_events == 0 || !self.sigma_gen_mb.is_finite() || self.sigma_gen_mb < 0.0 {
            return None;
        }
        Some(self.sigma_gen_mb / self.n_events as f64)
    }
}

/// Read `summary.json` from a slice directory.
pub fn load_summary(dir: &Path) -> Result<SliceSummary, SliceError> {
    let path = dir.join(SUMMARY_FILE);
    if !path.is_file() {
        return Err(SliceError::Missing { path });
    }
    let raw = fs::read_to_string(&path).map_err(|source| SliceError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| SliceError::Summary {
        path,
        reason: e.to_string(),
    })
}

/// Read every row of `pairs.csv` from a slice directory.
pub fn load_records(dir: &Path) -> Result<Vec<PairRecord>, SliceError> {
    let path = dir.join(PAIRS_FILE);
    if !path.is_file() {
        return Err(SliceError::Missing { path });
    }
    let file = File::open(&path).map_err(|source| SliceError::Io {
        path: path.clone(),
        source,
    })?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|source| SliceError::Io {
            path: path.clone(),
            source,
        })?;
        if line_no == 1 {
            if line.trim() != CSV_HEADER {
                return Err(SliceError::Records {
                    path,
                    line: line_no,
                    reason: format!("unexpected header '{}'", line.trim()),
                });
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let record = PairRecord::from_csv_row(&line).map_err(|reason| SliceError::Records {
            path: path.clone(),
            line: line_no,
            reason,
        })?;
        records.push(record);
    }
    if records.is_empty() && fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(false) {
        return Err(SliceError::Records {
            path,
            line: 0,
            reason: "empty file, header missing".to_string(),
        });
    }
    Ok(records)
}

/// A loaded slice: its summary and every pair record produced in it.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicSlice {
    pub dir: PathBuf,
    pub summary: SliceSummary,
    pub records: Vec<PairRecord>,
}

impl KinematicSlice {
    pub fn load(dir: &Path) -> Result<Self, SliceError> {
        if !dir.is_dir() {
            return Err(SliceError::Missing {
                path: dir.to_path_buf(),
            });
        }
        let summary = load_summary(dir)?;
        let records = load_records(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            summary,
            records,
        })
    }
}

/// Slice directories directly under `parent`, sorted by pt-hat minimum.
///
/// Directories whose summary cannot be read are skipped.
pub fn discover_slices(parent: &Path) -> Vec<(PathBuf, SliceSummary)> {
    let entries = match fs::read_dir(parent) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot list {}: {e}", parent.display());
            return Vec::new();
        }
    };
    let mut slices: Vec<(PathBuf, SliceSummary)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join(SUMMARY_FILE).is_file())
        .filter_map(|path| match load_summary(&path) {
            Ok(summary) => Some((path, summary)),
            Err(e) => {
                log::warn!("skipping {}: {e}", path.display());
                None
            }
        })
        .collect();
    slices.sort_by(|a, b| {
        a.1.pt_hat_min
            .total_cmp(&b.1.pt_hat_min)
            .then_with(|| a.0.cmp(&b.0))
    });
    slices
}

// ---------------------------------------------------------------------------
// Slice writer
// ---------------------------------------------------------------------------

/// Settings fixed when a slice starts recording.
#[derive(Debug, Clone)]
pub struct SliceConfig {
    pub dir: PathBuf,
    pub pt_hat: PtHatRange,
    pub source: String,
    pub seed: Option<u64>,
    pub selection: SelectionConfig,
}

/// Incremental writer for one slice directory.
pub struct SliceWriter {
    dir: PathBuf,
    pairs_writer: BufWriter<File>,
    n_pairs: u64,
    started_at: SystemTime,
    started_instant: Instant,
    id: String,
    config: SliceConfig,
}

impl SliceWriter {
    /// Create the slice directory and `pairs.csv` with its header.
    ///
    /// Any previous `summary.json` in the directory is removed so a crashed
    /// run never leaves a stale summary next to fresh records.
    pub fn new(config: SliceConfig) -> std::io::Result<Self> {
        let dir = config.dir.clone();
        fs::create_dir_all(&dir)?;
        let stale = dir.join(SUMMARY_FILE);
        if stale.exists() {
            fs::remove_file(&stale)?;
        }

        let file = File::create(dir.join(PAIRS_FILE))?;
        let mut pairs_writer = BufWriter::new(file);
        writeln!(pairs_writer, "{CSV_HEADER}")?;

        Ok(Self {
            dir,
            pairs_writer,
            n_pairs: 0,
            started_at: SystemTime::now(),
            started_instant: Instant::now(),
            id: Uuid::new_v4().to_string(),
            config,
        })
    }

    /// Append the records of one event.
    pub fn write_records(&mut self, records: &[PairRecord]) -> std::io::Result<()> {
        for record in records {
            writeln!(self.pairs_writer, "{}", record.to_csv_row())?;
        }
        self.n_pairs += records.len() as u64;
        Ok(())
    }

    /// Flush the records and write `summary.json`.
    pub fn finish(
        mut self,
        n_events: u64,
        n_accepted: u64,
        cross_section: CrossSection,
    ) -> std::io::Result<SliceSummary> {
        self.pairs_writer.flush()?;

        let summary = SliceSummary {
            version: SUMMARY_VERSION,
            id: self.id,
            label: self.config.pt_hat.label(),
            pt_hat_min: self.config.pt_hat.min,
            pt_hat_max: self.config.pt_hat.max,
            n_events,
            n_accepted,
            n_pairs: self.n_pairs,
            sigma_gen_mb: cross_section.sigma_gen_mb,
            sigma_err_mb: cross_section.sigma_err_mb,
            source: self.config.source.clone(),
            seed: self.config.seed,
            started_at: UtcTime::from_system_time(self.started_at).to_string(),
            ended_at: UtcTime::from_system_time(SystemTime::now()).to_string(),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            selection: self.config.selection.clone(),
            dijetcorr_version: crate::VERSION.to_string(),
        };

        let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?;
        fs::write(self.dir.join(SUMMARY_FILE), json)?;
        Ok(summary)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pairs written so far.
    pub fn n_pairs(&self) -> u64 {
        self.n_pairs
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Calendar time in UTC, printed as `2026-02-15T01:30:00Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UtcTime {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl UtcTime {
    fn from_system_time(t: SystemTime) -> Self {
        let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        Self::from_unix(secs)
    }

    /// Proleptic Gregorian date of `secs` after the Unix epoch, using the
    /// 400-year era decomposition with March as the first month.
    fn from_unix(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let of_day = (secs % 86_400) as u32;

        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
        let year = yoe + era * 400 + i64::from(month <= 2);

        Self {
            year,
            month,
            day,
            hour: of_day / 3600,
            minute: of_day / 60 % 60,
            second: of_day % 60,
        }
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
