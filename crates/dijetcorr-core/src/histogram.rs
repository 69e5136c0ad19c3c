//! Weighted 1D/2D/3D histograms used as joint distributions.
//!
//! Every bin keeps three accumulators: the sum of weights, the sum of squared
//! weights (for the statistical variance), and the unweighted number of
//! entries. Values outside an axis range (or NaN) are dropped silently; there
//! are no under/overflow bins.

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Uniform binning of `[min, max)` into `bins` bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub const fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.bins > 0 && self.min.is_finite() && self.max.is_finite() && self.max > self.min
    }

    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Bin index of `value`, or `None` when it falls outside `[min, max)`.
    pub fn index(&self, value: f64) -> Option<usize> {
        if !(value >= self.min && value < self.max) {
            return None;
        }
        let i = ((value - self.min) / self.width()) as usize;
        // Rounding can push values just below max into a nonexistent bin.
        Some(i.min(self.bins - 1))
    }

    pub fn lower_edge(&self, i: usize) -> f64 {
        self.min + i as f64 * self.width()
    }

    pub fn center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.width()
    }
}

/// Per-bin accumulators shared by all dimensionalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStore {
    pub sumw: Vec<f64>,
    pub sumw2: Vec<f64>,
    pub entries: Vec<u64>,
}

impl BinStore {
    fn zeros(len: usize) -> Self {
        Self {
            sumw: vec![0.0; len],
            sumw2: vec![0.0; len],
            entries: vec![0; len],
        }
    }

    fn fill(&mut self, i: usize, weight: f64) {
        self.sumw[i] += weight;
        self.sumw2[i] += weight * weight;
        self.entries[i] += 1;
    }

    fn add_bin(&mut self, i: usize, other: &BinStore, j: usize) {
        self.sumw[i] += other.sumw[j];
        self.sumw2[i] += other.sumw2[j];
        self.entries[i] += other.entries[j];
    }

    fn merge(&mut self, other: &BinStore) {
        for i in 0..self.sumw.len() {
            self.add_bin(i, other, i);
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.sumw.iter().sum()
    }

    pub fn total_entries(&self) -> u64 {
        self.entries.iter().sum()
    }
}

fn check_compatible(ours: &[Axis], theirs: &[Axis]) -> Result<(), MergeError> {
    if ours == theirs {
        Ok(())
    } else {
        Err(MergeError::Binning {
            ours: ours.to_vec(),
            theirs: theirs.to_vec(),
        })
    }
}

/// One-dimensional weighted histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub x: Axis,
    pub bins: BinStore,
}

impl Hist1D {
    pub fn new(x: Axis) -> Self {
        Self {
            x,
            bins: BinStore::zeros(x.bins),
        }
    }

    /// Returns false when the value was dropped as out of range.
    pub fn fill(&mut self, x: f64, weight: f64) -> bool {
        match self.x.index(x) {
            Some(i) => {
                self.bins.fill(i, weight);
                true
            }
            None => false,
        }
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.bins.sumw[i]
    }

    /// Statistical error of bin `i`, `sqrt(Σw²)`.
    pub fn error(&self, i: usize) -> f64 {
        self.bins.sumw2[i].sqrt()
    }

    pub fn weights(&self) -> &[f64] {
        &self.bins.sumw
    }

    pub fn total_weight(&self) -> f64 {
        self.bins.total_weight()
    }

    pub fn entries(&self) -> u64 {
        self.bins.total_entries()
    }

    pub fn merge(&mut self, other: &Hist1D) -> Result<(), MergeError> {
        check_compatible(&[self.x], &[other.x])?;
        self.bins.merge(&other.bins);
        Ok(())
    }
}

/// Two-dimensional weighted histogram, stored x-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    pub x: Axis,
    pub y: Axis,
    pub bins: BinStore,
}

impl Hist2D {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            bins: BinStore::zeros(x.bins * y.bins),
        }
    }

    fn offset(&self, ix: usize, iy: usize) -> usize {
        ix * self.y.bins + iy
    }

    pub fn fill(&mut self, x: f64, y: f64, weight: f64) -> bool {
        match (self.x.index(x), self.y.index(y)) {
            (Some(ix), Some(iy)) => {
                let k = self.offset(ix, iy);
                self.bins.fill(k, weight);
                true
            }
            _ => false,
        }
    }

    pub fn weight(&self, ix: usize, iy: usize) -> f64 {
        self.bins.sumw[self.offset(ix, iy)]
    }

    pub fn weights(&self) -> &[f64] {
        &self.bins.sumw
    }

    pub fn total_weight(&self) -> f64 {
        self.bins.total_weight()
    }

    pub fn entries(&self) -> u64 {
        self.bins.total_entries()
    }

    /// Marginal over y, indexed by x bin.
    pub fn projection_x(&self) -> Hist1D {
        let mut h = Hist1D::new(self.x);
        for ix in 0..self.x.bins {
            for iy in 0..self.y.bins {
                h.bins.add_bin(ix, &self.bins, self.offset(ix, iy));
            }
        }
        h
    }

    /// Marginal over x, indexed by y bin.
    pub fn projection_y(&self) -> Hist1D {
        let mut h = Hist1D::new(self.y);
        for ix in 0..self.x.bins {
            for iy in 0..self.y.bins {
                h.bins.add_bin(iy, &self.bins, self.offset(ix, iy));
            }
        }
        h
    }

    pub fn merge(&mut self, other: &Hist2D) -> Result<(), MergeError> {
        check_compatible(&[self.x, self.y], &[other.x, other.y])?;
        self.bins.merge(&other.bins);
        Ok(())
    }
}

/// Three-dimensional weighted histogram, stored x-major then y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist3D {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
    pub bins: BinStore,
}

impl Hist3D {
    pub fn new(x: Axis, y: Axis, z: Axis) -> Self {
        Self {
            x,
            y,
            z,
            bins: BinStore::zeros(x.bins * y.bins * z.bins),
        }
    }

    fn offset(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (ix * self.y.bins + iy) * self.z.bins + iz
    }

    pub fn fill(&mut self, x: f64, y: f64, z: f64, weight: f64) -> bool {
        match (self.x.index(x), self.y.index(y), self.z.index(z)) {
            (Some(ix), Some(iy), Some(iz)) => {
                let k = self.offset(ix, iy, iz);
                self.bins.fill(k, weight);
                true
            }
            _ => false,
        }
    }

    pub fn weight(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.bins.sumw[self.offset(ix, iy, iz)]
    }

    pub fn total_weight(&self) -> f64 {
        self.bins.total_weight()
    }

    pub fn entries(&self) -> u64 {
        self.bins.total_entries()
    }

    /// The (x, y) distribution restricted to z bin `iz`.
    pub fn slice_z(&self, iz: usize) -> Hist2D {
        let mut h = Hist2D::new(self.x, self.y);
        for ix in 0..self.x.bins {
            for iy in 0..self.y.bins {
                let k = h.offset(ix, iy);
                h.bins.add_bin(k, &self.bins, self.offset(ix, iy, iz));
            }
        }
        h
    }

    /// The (x, y) distribution summed over all z bins.
    pub fn project_xy(&self) -> Hist2D {
        let mut h = Hist2D::new(self.x, self.y);
        for iz in 0..self.z.bins {
            let slice = self.slice_z(iz);
            h.bins.merge(&slice.bins);
        }
        h
    }

    pub fn merge(&mut self, other: &Hist3D) -> Result<(), MergeError> {
        check_compatible(&[self.x, self.y, self.z], &[other.x, other.y, other.z])?;
        self.bins.merge(&other.bins);
        Ok(())
    }
}
