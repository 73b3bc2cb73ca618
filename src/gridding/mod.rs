// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolutional gridding.
//!
//! Re-projects the irregularly sampled, noise-weighted fluxes of a
//! [`ScanSet`] onto a uniform sky grid. Every valid sample distributes its
//! flux to all grid cells within the kernel's truncation radius, weighted by
//! a Gaussian kernel evaluated at the cell-to-sample distance; the image is
//! the per-cell weighted mean.
//!
//! Accumulation is the one shared-mutable-state operation of the whole
//! reduction, so it is structured as per-scan private accumulators merged by
//! element-wise addition in scan order: the merge is commutative and
//! associative, and the fixed order makes the result bit-identical no matter
//! how the per-scan work was scheduled.

mod error;

pub use error::GridError;

use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;

use crate::constants::{DEFAULT_CELLS_PER_FWHM, DEFAULT_KERNEL_TRUNCATION_FWHM, FWHM_TO_SIGMA};
use crate::scan::Scan;
use crate::scanset::ScanSet;

/// Geometry of the output grid and of the gridding kernel.
///
/// Cell (0, 0) is the bottom-left corner of the map; `origin` is the sky
/// position of that cell's centre. Arrays derived from the grid are indexed
/// `[iy, ix]`.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Number of cells along x and y.
    pub shape: (usize, usize),

    /// Sky position of the centre of cell (0, 0), in the same units as the
    /// sample positions.
    pub origin: (f64, f64),

    /// Cell side length.
    pub cell_size: f64,

    /// FWHM of the gridding kernel, matched to the instrument beam.
    pub kernel_fwhm: f64,

    /// Kernel contributions beyond this distance are dropped.
    pub truncation_radius: f64,
}

impl GridConfig {
    /// A grid with the default cell size (FWHM / 3, Nyquist-adequate) and
    /// kernel truncation (3 FWHM).
    pub fn new(shape: (usize, usize), origin: (f64, f64), kernel_fwhm: f64) -> GridConfig {
        GridConfig {
            shape,
            origin,
            cell_size: kernel_fwhm / DEFAULT_CELLS_PER_FWHM,
            kernel_fwhm,
            truncation_radius: DEFAULT_KERNEL_TRUNCATION_FWHM * kernel_fwhm,
        }
    }

    /// Sky position of the centre of cell (ix, iy).
    pub fn cell_centre(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.origin.0 + ix as f64 * self.cell_size,
            self.origin.1 + iy as f64 * self.cell_size,
        )
    }

    /// The sky extent of the map: ((x_min, x_max), (y_min, y_max)), cell
    /// edges included.
    pub fn sky_extent(&self) -> ((f64, f64), (f64, f64)) {
        let half = 0.5 * self.cell_size;
        (
            (
                self.origin.0 - half,
                self.origin.0 + (self.shape.0 - 1) as f64 * self.cell_size + half,
            ),
            (
                self.origin.1 - half,
                self.origin.1 + (self.shape.1 - 1) as f64 * self.cell_size + half,
            ),
        )
    }

    /// Does any valid sample of the scan fall close enough to the map to
    /// contribute? The extent is padded by the truncation radius: a sample
    /// just off the map edge still reaches the outermost cells.
    pub fn overlaps(&self, scan: &Scan) -> bool {
        let ((x_min, x_max), (y_min, y_max)) = self.sky_extent();
        let r = self.truncation_radius;
        scan.flags().iter().enumerate().any(|(i, flag)| {
            flag.is_valid()
                && scan.sky_x()[i] >= x_min - r
                && scan.sky_x()[i] <= x_max + r
                && scan.sky_y()[i] >= y_min - r
                && scan.sky_y()[i] <= y_max + r
        })
    }
}

/// A truncated Gaussian gridding kernel. `value(0)` is 1; the value at half
/// a FWHM from the centre is 0.5.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    two_sigma_squared: f64,
    radius: f64,
}

impl GaussianKernel {
    pub fn new(fwhm: f64, truncation_radius: f64) -> GaussianKernel {
        let sigma = fwhm / FWHM_TO_SIGMA;
        GaussianKernel {
            two_sigma_squared: 2.0 * sigma * sigma,
            radius: truncation_radius,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The kernel value at a given distance from its centre; zero beyond the
    /// truncation radius.
    pub fn value(&self, distance: f64) -> f64 {
        if distance > self.radius {
            0.0
        } else {
            (-distance * distance / self.two_sigma_squared).exp()
        }
    }
}

/// Accumulated flux, weight and coverage over one grid.
///
/// `flux` and `weight` hold the running sums of `f*w*k` and `w*k`; coverage
/// counts the samples that contributed to each cell. Arrays are `[iy, ix]`.
#[derive(Debug, Clone)]
pub struct GridAccumulator {
    flux: Array2<f64>,
    weight: Array2<f64>,
    coverage: Array2<u64>,
}

impl GridAccumulator {
    pub fn new(config: &GridConfig) -> GridAccumulator {
        let dim = (config.shape.1, config.shape.0);
        GridAccumulator {
            flux: Array2::zeros(dim),
            weight: Array2::zeros(dim),
            coverage: Array2::from_elem(dim, 0),
        }
    }

    /// Distribute one sample's flux over all cells within the kernel radius.
    ///
    /// A sample exactly on a cell boundary needs no special casing: the
    /// kernel is continuous, so every bordering cell receives the value at
    /// its own centre-to-sample distance.
    pub(crate) fn accumulate_sample(
        &mut self,
        config: &GridConfig,
        kernel: &GaussianKernel,
        x: f64,
        y: f64,
        flux: f64,
        weight: f64,
    ) {
        let (num_x, num_y) = config.shape;
        let radius_cells = kernel.radius() / config.cell_size;
        let fx = (x - config.origin.0) / config.cell_size;
        let fy = (y - config.origin.1) / config.cell_size;

        let ix_first = (fx - radius_cells).ceil().max(0.0) as usize;
        let iy_first = (fy - radius_cells).ceil().max(0.0) as usize;
        let ix_last = (fx + radius_cells).floor().min((num_x - 1) as f64);
        let iy_last = (fy + radius_cells).floor().min((num_y - 1) as f64);
        if ix_last < 0.0 || iy_last < 0.0 {
            return;
        }
        let (ix_last, iy_last) = (ix_last as usize, iy_last as usize);

        for iy in iy_first..=iy_last {
            for ix in ix_first..=ix_last {
                let (cx, cy) = config.cell_centre(ix, iy);
                let distance = (cx - x).hypot(cy - y);
                if distance <= kernel.radius() {
                    let k = kernel.value(distance);
                    self.flux[(iy, ix)] += flux * weight * k;
                    self.weight[(iy, ix)] += weight * k;
                    self.coverage[(iy, ix)] += 1;
                }
            }
        }
    }

    /// Grid every valid sample of a calibrated scan. Returns the number of
    /// samples used.
    pub(crate) fn accumulate_scan(
        &mut self,
        scan: &Scan,
        config: &GridConfig,
        kernel: &GaussianKernel,
    ) -> usize {
        // The ScanSet only admits calibrated scans.
        let flux = scan
            .flux()
            .expect("only calibrated scans can reach the gridder");
        let uncertainty = scan
            .flux_uncertainty()
            .expect("only calibrated scans can reach the gridder");

        let mut num_used = 0;
        for (i, flag) in scan.flags().iter().enumerate() {
            if !flag.is_valid() {
                continue;
            }
            let weight = 1.0 / (uncertainty[i] * uncertainty[i]);
            if !flux[i].is_finite() || !weight.is_finite() || weight <= 0.0 {
                debug!(
                    "Scan {}: sample {i} has unusable flux or weight; skipped",
                    scan.scan_id
                );
                continue;
            }
            self.accumulate_sample(config, kernel, scan.sky_x()[i], scan.sky_y()[i], flux[i], weight);
            num_used += 1;
        }
        num_used
    }

    /// Element-wise addition of another accumulator over the same grid.
    pub(crate) fn merge(&mut self, other: GridAccumulator) {
        self.flux += &other.flux;
        self.weight += &other.weight;
        self.coverage += &other.coverage;
    }

    pub fn flux(&self) -> &Array2<f64> {
        &self.flux
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    pub fn coverage(&self) -> &Array2<u64> {
        &self.coverage
    }

    pub fn total_weight(&self) -> f64 {
        self.weight.sum()
    }

    /// The noise-weighted mean image: accumulated flux over accumulated
    /// weight per cell. Cells never reached by any sample are NaN, never
    /// zero.
    pub fn image(&self) -> Array2<f64> {
        let mut image = self.flux.clone();
        image.zip_mut_with(&self.weight, |f, &w| {
            *f = if w > 0.0 { *f / w } else { f64::NAN };
        });
        image
    }
}

/// Grid all scans of a [`ScanSet`].
///
/// Each scan is gridded into its own accumulator in parallel; the partial
/// grids are then merged in scan order. Fails with [`GridError::EmptyGrid`]
/// if no sample contributed anywhere.
pub fn grid_scanset(scan_set: &ScanSet, config: &GridConfig) -> Result<GridAccumulator, GridError> {
    let kernel = GaussianKernel::new(config.kernel_fwhm, config.truncation_radius);
    let scans: Vec<&Scan> = scan_set.scans().collect();

    let partials: Vec<(GridAccumulator, usize)> = scans
        .par_iter()
        .map(|&scan| {
            let mut acc = GridAccumulator::new(config);
            let num_used = acc.accumulate_scan(scan, config, &kernel);
            (acc, num_used)
        })
        .collect();

    let mut total = GridAccumulator::new(config);
    let mut num_used = 0;
    for (partial, n) in partials {
        total.merge(partial);
        num_used += n;
    }
    info!(
        "Gridded {num_used} samples from {} scans onto a {}x{} grid",
        scans.len(),
        config.shape.0,
        config.shape.1
    );

    if total.total_weight() > 0.0 {
        Ok(total)
    } else {
        Err(GridError::EmptyGrid)
    }
}
