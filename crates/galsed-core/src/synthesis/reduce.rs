//! Parallel reduction of galaxies onto output flux rows.
//!
//! Galaxies are partitioned across the rayon pool. The integrated template
//! buffer stays shared read-only. Without dust the channel grid and a dense
//! working buffer are computed once up front and shared the same way; with
//! dust every galaxy attenuates the integrated buffer with its own
//! parameters, so each worker carries a private ready buffer, channel grid,
//! and working buffer, refilled per galaxy over the (bin, bucket) rows its
//! history touches.

use rayon::prelude::*;

use super::dust;
use super::integrate::{BirthCloudSplit, IntegratedGrid};
use super::transform::{ChannelGrid, TransformContext, TransformScratch};
use super::working::{self, UsageFlags, WorkingBuffer};
use crate::common::constants::FLUX_FLOOR;
use crate::domain::{DustModel, StarFormationHistory, SynthesisError, SynthesisResult};
use crate::library::TemplateLibrary;

/// Validated, windowed inputs of one reduction run.
pub(crate) struct ReduceInputs<'a> {
    pub library: &'a TemplateLibrary,
    pub integrated: &'a IntegratedGrid,
    pub split: Option<&'a BirthCloudSplit>,
    pub transform: &'a TransformContext<'a>,
    pub age_buckets: &'a [f64],
    pub histories: &'a [StarFormationHistory],
    pub dust: Option<&'a DustModel>,
    pub min_bin: usize,
    pub max_bin: usize,
}

/// Runs `task` on a dedicated pool of `threads` workers; zero keeps the
/// current pool.
pub(crate) fn run_with_pool<T, F>(threads: usize, task: F) -> SynthesisResult<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if threads == 0 {
        return Ok(task());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|error| SynthesisError::ThreadPool {
            message: error.to_string(),
        })?;
    Ok(pool.install(task))
}

/// Reduces every history onto a flux row, one row per galaxy in input order.
pub(crate) fn reduce(inputs: &ReduceInputs<'_>) -> SynthesisResult<Vec<Vec<f64>>> {
    for (galaxy, history) in inputs.histories.iter().enumerate() {
        if history.is_silent() {
            tracing::warn!(
                galaxy,
                "history carries no star formation, row stays at the flux floor"
            );
        }
    }
    match inputs.dust {
        None => reduce_shared(inputs),
        Some(dust) => reduce_attenuated(inputs, dust),
    }
}

fn reduce_shared(inputs: &ReduceInputs<'_>) -> SynthesisResult<Vec<Vec<f64>>> {
    let buckets = inputs.integrated.buckets;
    let bins = inputs.max_bin - inputs.min_bin + 1;

    let buckets_used = vec![true; buckets];
    let mut scratch = inputs.transform.scratch();
    let mut grid = inputs.transform.grid(buckets);
    inputs
        .transform
        .apply(&inputs.integrated.values, &buckets_used, &mut scratch, &mut grid)?;

    let mut shared = WorkingBuffer::zeroed(bins, buckets, grid.channels);
    working::interpolate_into(
        &grid,
        inputs.library.metallicities(),
        inputs.min_bin,
        &UsageFlags::dense(bins, buckets),
        &mut shared,
    );

    Ok(inputs
        .histories
        .par_iter()
        .map(|history| reduce_row(history, &shared, inputs.min_bin, inputs.max_bin))
        .collect())
}

fn reduce_attenuated(
    inputs: &ReduceInputs<'_>,
    dust: &DustModel,
) -> SynthesisResult<Vec<Vec<f64>>> {
    let buckets = inputs.integrated.buckets;
    let bins = inputs.max_bin - inputs.min_bin + 1;
    let channels = inputs.transform.channel_count();

    let rows: Vec<SynthesisResult<Vec<f64>>> = inputs
        .histories
        .par_iter()
        .enumerate()
        .map_init(
            || WorkerScratch {
                ready: vec![0.0; inputs.integrated.values.len()],
                transform: inputs.transform.scratch(),
                grid: inputs.transform.grid(buckets),
                working: WorkingBuffer::zeroed(bins, buckets, channels),
            },
            |scratch, (galaxy, history)| {
                let flags =
                    UsageFlags::from_history(history, inputs.min_bin, inputs.max_bin, buckets);
                tracing::debug!(
                    galaxy,
                    bins = flags.bins.iter().filter(|used| **used).count(),
                    buckets = flags.buckets.iter().filter(|used| **used).count(),
                    "recomputing working rows"
                );
                scratch.ready.copy_from_slice(&inputs.integrated.values);
                dust::attenuate(
                    &mut scratch.ready,
                    inputs.library,
                    inputs.age_buckets,
                    dust.birth_cloud_age,
                    inputs.split,
                    &dust.galaxies[galaxy],
                    &flags.buckets,
                );
                inputs.transform.apply(
                    &scratch.ready,
                    &flags.buckets,
                    &mut scratch.transform,
                    &mut scratch.grid,
                )?;
                working::interpolate_into(
                    &scratch.grid,
                    inputs.library.metallicities(),
                    inputs.min_bin,
                    &flags,
                    &mut scratch.working,
                );
                Ok(reduce_row(
                    history,
                    &scratch.working,
                    inputs.min_bin,
                    inputs.max_bin,
                ))
            },
        )
        .collect();
    rows.into_iter().collect::<SynthesisResult<Vec<_>>>()
}

struct WorkerScratch {
    ready: Vec<f64>,
    transform: TransformScratch,
    grid: ChannelGrid,
    working: WorkingBuffer,
}

/// Sums `sfr * working[bin, bucket, channel]` over the history's bursts on
/// top of the flux floor. Zero-rate bursts are skipped, so only rows the
/// usage flags marked are ever read.
fn reduce_row(
    history: &StarFormationHistory,
    working: &WorkingBuffer,
    min_bin: usize,
    max_bin: usize,
) -> Vec<f64> {
    let mut row = vec![FLUX_FLOOR; working.channels];
    for burst in &history.bursts {
        if burst.sfr <= 0.0 {
            continue;
        }
        let bin = working::metallicity_bin(burst.metallicity, min_bin, max_bin) - min_bin;
        let series = working.series(bin, burst.age_index);
        for (value, contribution) in row.iter_mut().zip(series) {
            *value += burst.sfr * contribution;
        }
    }
    row
}
