//! Frame and filter transforms: from the integrated template buffer to the
//! per-channel grid the metallicity interpolation consumes.
//!
//! Channels are template wavelengths in spectrum mode and filters in
//! photometry mode. Flux leaves this stage in Jansky at the 10 pc reference
//! distance. Observed-frame handling differs by mode: a spectrum is a
//! per-wavelength density and divides by (1+z), while photometry feeds
//! per-frequency flux into the filter integrals and multiplies by (1+z);
//! both apply the absorption curve on the template grid.

use crate::common::constants::luminosity_to_jansky;
use crate::domain::{Frame, SynthesisError, SynthesisResult};
use crate::library::{FilterCurve, FilterSet, TemplateLibrary};
use crate::numerics::integrate_filter;

/// What the output channels hold.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChannelPlan<'a> {
    Spectrum { frame: Frame },
    Photometry { filters: &'a FilterSet },
}

/// Transform prepared against one (windowed) library: per-wavelength Jansky
/// factors, the observed-frame attachments, and per-filter resampling
/// brackets.
pub(crate) struct TransformContext<'a> {
    library: &'a TemplateLibrary,
    jansky: Vec<f64>,
    mode: PreparedMode<'a>,
}

enum PreparedMode<'a> {
    Spectrum {
        observed: Option<ObservedTransform<'a>>,
    },
    Photometry {
        filters: Vec<PreparedFilter<'a>>,
        observed: Option<ObservedTransform<'a>>,
    },
}

struct ObservedTransform<'a> {
    dilation: f64,
    absorption: &'a [f64],
}

struct PreparedFilter<'a> {
    curve: &'a FilterCurve,
    /// (lower index, fraction) bracket of each filter sample on the
    /// template grid, in the grid frame the filter samples.
    brackets: Vec<(usize, f64)>,
}

/// Channel values per (channel, age bucket, metallicity), metallicity
/// contiguous so bin interpolation reads straight runs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChannelGrid {
    pub values: Vec<f64>,
    pub channels: usize,
    pub buckets: usize,
    pub z: usize,
}

impl ChannelGrid {
    pub(crate) fn zeroed(channels: usize, buckets: usize, z: usize) -> Self {
        Self {
            values: vec![0.0; channels * buckets * z],
            channels,
            buckets,
            z,
        }
    }

    pub(crate) fn z_series(&self, channel: usize, bucket: usize) -> &[f64] {
        let start = (channel * self.buckets + bucket) * self.z;
        &self.values[start..start + self.z]
    }
}

/// Reusable per-worker rows for the photometry path.
pub(crate) struct TransformScratch {
    rest: Vec<f64>,
    observed: Vec<f64>,
    resampled: Vec<f64>,
}

impl<'a> TransformContext<'a> {
    pub(crate) fn new(
        library: &'a TemplateLibrary,
        plan: ChannelPlan<'a>,
        redshift: f64,
    ) -> SynthesisResult<Self> {
        let dilation = 1.0 + redshift;
        let jansky = library
            .wavelengths()
            .iter()
            .map(|wave| luminosity_to_jansky(*wave, 1.0))
            .collect();

        let mode = match plan {
            ChannelPlan::Spectrum { frame } => PreparedMode::Spectrum {
                observed: match frame {
                    Frame::Rest => None,
                    Frame::Observed => Some(observed_transform(library, dilation)?),
                },
            },
            ChannelPlan::Photometry { filters } => {
                let prepared = filters
                    .filters()
                    .iter()
                    .map(|curve| prepare_filter(library, curve, dilation))
                    .collect::<SynthesisResult<Vec<_>>>()?;
                let observed = if filters.has_observed() {
                    Some(observed_transform(library, dilation)?)
                } else {
                    None
                };
                PreparedMode::Photometry {
                    filters: prepared,
                    observed,
                }
            }
        };

        Ok(Self {
            library,
            jansky,
            mode,
        })
    }

    pub(crate) fn channel_count(&self) -> usize {
        match &self.mode {
            PreparedMode::Spectrum { .. } => self.library.wavelength_count(),
            PreparedMode::Photometry { filters, .. } => filters.len(),
        }
    }

    pub(crate) fn scratch(&self) -> TransformScratch {
        let wavelengths = self.library.wavelength_count();
        let samples = match &self.mode {
            PreparedMode::Spectrum { .. } => 0,
            PreparedMode::Photometry { filters, .. } => filters
                .iter()
                .map(|filter| filter.brackets.len())
                .max()
                .unwrap_or(0),
        };
        TransformScratch {
            rest: vec![0.0; wavelengths],
            observed: vec![0.0; wavelengths],
            resampled: vec![0.0; samples],
        }
    }

    pub(crate) fn grid(&self, buckets: usize) -> ChannelGrid {
        ChannelGrid::zeroed(self.channel_count(), buckets, self.library.metallicity_count())
    }

    /// Natural log of each channel's quoted wavelength, for slope fits.
    pub(crate) fn channel_log_wavelengths(&self) -> SynthesisResult<Vec<f64>> {
        match &self.mode {
            PreparedMode::Spectrum { observed } => {
                let dilation = observed.as_ref().map_or(1.0, |transform| transform.dilation);
                Ok(self
                    .library
                    .wavelengths()
                    .iter()
                    .map(|wave| (wave * dilation).ln())
                    .collect())
            }
            PreparedMode::Photometry { filters, .. } => filters
                .iter()
                .map(|filter| Ok(filter.curve.pivot_wavelength()?.ln()))
                .collect(),
        }
    }

    /// Fills `out` from the integrated (and possibly dust-attenuated)
    /// buffer, visiting only the flagged age buckets.
    pub(crate) fn apply(
        &self,
        ready: &[f64],
        buckets_used: &[bool],
        scratch: &mut TransformScratch,
        out: &mut ChannelGrid,
    ) -> SynthesisResult<()> {
        let wavelengths = self.library.wavelength_count();
        let z_count = self.library.metallicity_count();
        let buckets = buckets_used.len();
        debug_assert_eq!(ready.len(), z_count * buckets * wavelengths);
        debug_assert_eq!(out.channels, self.channel_count());
        debug_assert_eq!(out.buckets, buckets);
        debug_assert_eq!(out.z, z_count);

        for metallicity_index in 0..z_count {
            for (bucket, used) in buckets_used.iter().enumerate() {
                if !used {
                    continue;
                }
                let row_start = (metallicity_index * buckets + bucket) * wavelengths;
                let row = &ready[row_start..row_start + wavelengths];

                match &self.mode {
                    PreparedMode::Spectrum { observed } => {
                        for (channel, raw) in row.iter().enumerate() {
                            let mut value = raw * self.jansky[channel];
                            if let Some(transform) = observed {
                                value =
                                    value / transform.dilation * transform.absorption[channel];
                            }
                            out.values[(channel * buckets + bucket) * z_count
                                + metallicity_index] = value;
                        }
                    }
                    PreparedMode::Photometry { filters, observed } => {
                        for (index, raw) in row.iter().enumerate() {
                            scratch.rest[index] = raw * self.jansky[index];
                        }
                        if let Some(transform) = observed {
                            for index in 0..wavelengths {
                                scratch.observed[index] = scratch.rest[index]
                                    * transform.dilation
                                    * transform.absorption[index];
                            }
                        }
                        for (channel, filter) in filters.iter().enumerate() {
                            let source = match filter.curve.frame {
                                Frame::Rest => &scratch.rest,
                                Frame::Observed => &scratch.observed,
                            };
                            for (sample, (lo, fraction)) in
                                filter.brackets.iter().enumerate()
                            {
                                scratch.resampled[sample] = source[*lo]
                                    + fraction * (source[lo + 1] - source[*lo]);
                            }
                            let samples = filter.brackets.len();
                            let flux = integrate_filter(
                                &filter.curve.response,
                                &scratch.resampled[..samples],
                                &filter.curve.wavelengths,
                            )?;
                            out.values[(channel * buckets + bucket) * z_count
                                + metallicity_index] = flux;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn observed_transform(
    library: &TemplateLibrary,
    dilation: f64,
) -> SynthesisResult<ObservedTransform<'_>> {
    let absorption = library
        .absorption()
        .ok_or(SynthesisError::AbsorptionMissing)?;
    Ok(ObservedTransform {
        dilation,
        absorption,
    })
}

fn prepare_filter<'a>(
    library: &TemplateLibrary,
    curve: &'a FilterCurve,
    dilation: f64,
) -> SynthesisResult<PreparedFilter<'a>> {
    let grid = library.wavelengths();
    let scale = match curve.frame {
        Frame::Rest => 1.0,
        Frame::Observed => dilation,
    };

    let mut brackets = Vec::with_capacity(curve.wavelengths.len());
    for sample in &curve.wavelengths {
        let target = sample / scale;
        match bracket(grid, target) {
            Some(found) => brackets.push(found),
            None => {
                return Err(SynthesisError::FilterCoverage {
                    name: curve.name.clone(),
                    band_lo: curve.band_lo(),
                    band_hi: curve.band_hi(),
                    grid_lo: grid[0] * scale,
                    grid_hi: grid[grid.len() - 1] * scale,
                });
            }
        }
    }
    Ok(PreparedFilter { curve, brackets })
}

/// Interval bracket of `target` on a strictly increasing grid; exact hits on
/// the last point fold into the final interval with fraction one.
fn bracket(grid: &[f64], target: f64) -> Option<(usize, f64)> {
    if target < grid[0] || target > grid[grid.len() - 1] {
        return None;
    }
    match grid.binary_search_by(|probe| probe.total_cmp(&target)) {
        Ok(index) => {
            if index == grid.len() - 1 {
                Some((index - 1, 1.0))
            } else {
                Some((index, 0.0))
            }
        }
        Err(insertion) => {
            let hi = insertion;
            let lo = hi - 1;
            Some((lo, (target - grid[lo]) / (grid[hi] - grid[lo])))
        }
    }
}
