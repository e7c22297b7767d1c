//! Per-metallicity-bin working buffer.
//!
//! Burst metallicities are quantised to bins of 0.001; each bin's channel
//! values come from interpolating the channel grid along the metallicity
//! axis at the bin centre `(bin + 1) / 1000`. Rows are indexed relative to
//! the library's lowest bin, and only the (bin, bucket) pairs a galaxy's
//! history touches are recomputed on its behalf.

use super::transform::ChannelGrid;
use crate::common::constants::METALLICITY_BINS_PER_UNIT;
use crate::domain::StarFormationHistory;

/// Working-buffer bin of a burst metallicity, clamped to the library range.
pub(crate) fn metallicity_bin(metallicity: f64, min_bin: usize, max_bin: usize) -> usize {
    let raw = (metallicity * METALLICITY_BINS_PER_UNIT - 0.5).floor();
    if raw <= min_bin as f64 {
        min_bin
    } else if raw >= max_bin as f64 {
        max_bin
    } else {
        raw as usize
    }
}

/// Which working rows a single galaxy's history touches.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UsageFlags {
    pub bins: Vec<bool>,
    pub buckets: Vec<bool>,
}

impl UsageFlags {
    pub(crate) fn from_history(
        history: &StarFormationHistory,
        min_bin: usize,
        max_bin: usize,
        buckets: usize,
    ) -> Self {
        let mut flags = Self {
            bins: vec![false; max_bin - min_bin + 1],
            buckets: vec![false; buckets],
        };
        for burst in &history.bursts {
            if burst.sfr > 0.0 {
                flags.bins[metallicity_bin(burst.metallicity, min_bin, max_bin) - min_bin] = true;
                flags.buckets[burst.age_index] = true;
            }
        }
        flags
    }

    pub(crate) fn dense(bins: usize, buckets: usize) -> Self {
        Self {
            bins: vec![true; bins],
            buckets: vec![true; buckets],
        }
    }
}

/// Channel values per (relative bin, age bucket), channel contiguous.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorkingBuffer {
    pub values: Vec<f64>,
    pub bins: usize,
    pub buckets: usize,
    pub channels: usize,
}

impl WorkingBuffer {
    pub(crate) fn zeroed(bins: usize, buckets: usize, channels: usize) -> Self {
        Self {
            values: vec![0.0; bins * buckets * channels],
            bins,
            buckets,
            channels,
        }
    }

    pub(crate) fn series(&self, bin: usize, bucket: usize) -> &[f64] {
        let start = (bin * self.buckets + bucket) * self.channels;
        &self.values[start..start + self.channels]
    }
}

/// Fills the flagged (bin, bucket) rows of `out` from the channel grid.
///
/// Bin centres past the metallicity axis ends are clamped onto the axis, so
/// the extreme bins evaluate to the endpoint templates.
pub(crate) fn interpolate_into(
    grid: &ChannelGrid,
    metallicities: &[f64],
    min_bin: usize,
    flags: &UsageFlags,
    out: &mut WorkingBuffer,
) {
    debug_assert_eq!(grid.z, metallicities.len());
    debug_assert_eq!(out.bins, flags.bins.len());
    debug_assert_eq!(out.buckets, flags.buckets.len());
    debug_assert_eq!(out.channels, grid.channels);

    let lower = metallicities[0];
    let upper = metallicities[metallicities.len() - 1];

    for (bin, bin_used) in flags.bins.iter().enumerate() {
        if !bin_used {
            continue;
        }
        let centre = (min_bin + bin + 1) as f64 / METALLICITY_BINS_PER_UNIT;
        let (lo, fraction) = bin_bracket(metallicities, centre.clamp(lower, upper));

        for (bucket, bucket_used) in flags.buckets.iter().enumerate() {
            if !bucket_used {
                continue;
            }
            let row_start = (bin * out.buckets + bucket) * out.channels;
            for channel in 0..grid.channels {
                let series = grid.z_series(channel, bucket);
                out.values[row_start + channel] =
                    series[lo] + fraction * (series[lo + 1] - series[lo]);
            }
        }
    }
}

/// Interval bracket of an in-domain target; endpoint hits fold into the
/// adjacent interval.
fn bin_bracket(grid: &[f64], target: f64) -> (usize, f64) {
    match grid.binary_search_by(|probe| probe.total_cmp(&target)) {
        Ok(index) => {
            if index == grid.len() - 1 {
                (index - 1, 1.0)
            } else {
                (index, 0.0)
            }
        }
        Err(insertion) => {
            let lo = insertion - 1;
            (lo, (target - grid[lo]) / (grid[insertion] - grid[lo]))
        }
    }
}
