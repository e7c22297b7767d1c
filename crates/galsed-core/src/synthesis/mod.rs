//! The synthesis pipeline: time integration, dust, frame and filter
//! transforms, metallicity interpolation, and the parallel reduction onto
//! per-galaxy output rows.
//!
//! Three entry points share one engine. The tree-mode pair flattens merger
//! trees into star formation histories first; the composite entry takes the
//! histories directly and exposes the output-mode choice.

pub(crate) mod dust;
pub mod history;
pub(crate) mod integrate;
pub(crate) mod postprocess;
pub(crate) mod reduce;
pub(crate) mod transform;
pub(crate) mod working;

pub use history::flatten_forest;

use crate::domain::{
    DustModel, Frame, MergerTreeTables, OutputMode, StarFormationHistory, SynthesisError,
    SynthesisResult,
};
use crate::library::{FilterSet, TemplateLibrary, window_to_filters};
use reduce::ReduceInputs;
use transform::{ChannelPlan, TransformContext};

/// Full-spectrum synthesis over merger-tree histories.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumRequest<'a> {
    pub library: &'a TemplateLibrary,
    pub tree: &'a MergerTreeTables,
    pub target_snapshot: usize,
    pub galaxies: &'a [usize],
    pub redshift: f64,
    pub frame: Frame,
    pub age_buckets: &'a [f64],
    pub dust: Option<&'a DustModel>,
    pub threads: usize,
}

/// Broadband AB magnitudes over merger-tree histories.
#[derive(Debug, Clone, Copy)]
pub struct PhotometryRequest<'a> {
    pub library: &'a TemplateLibrary,
    pub filters: &'a FilterSet,
    pub tree: &'a MergerTreeTables,
    pub target_snapshot: usize,
    pub galaxies: &'a [usize],
    pub redshift: f64,
    pub age_buckets: &'a [f64],
    pub dust: Option<&'a DustModel>,
    pub threads: usize,
}

/// Synthesis over caller-supplied histories with a selectable output mode.
#[derive(Debug, Clone)]
pub struct CompositeRequest<'a> {
    pub library: &'a TemplateLibrary,
    /// Filter channels; `None` keeps every template wavelength as a channel.
    pub filters: Option<&'a FilterSet>,
    pub histories: Vec<StarFormationHistory>,
    pub redshift: f64,
    /// Spectrum-channel frame; ignored when filters are present, since each
    /// filter quotes its own frame.
    pub frame: Frame,
    pub age_buckets: &'a [f64],
    pub dust: Option<&'a DustModel>,
    pub output_mode: OutputMode,
    pub threads: usize,
}

/// One output row per galaxy, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub galaxies: usize,
    pub columns: usize,
    /// Leading flux channels; slope-fit rows carry three more columns.
    pub flux_channels: usize,
    pub mode: OutputMode,
    pub values: Vec<f64>,
}

impl OutputTable {
    pub fn row(&self, galaxy: usize) -> &[f64] {
        let start = galaxy * self.columns;
        &self.values[start..start + self.columns]
    }

    fn from_rows(rows: Vec<Vec<f64>>, flux_channels: usize, mode: OutputMode) -> Self {
        let galaxies = rows.len();
        let columns = match mode {
            OutputMode::SlopeFit => flux_channels + 3,
            OutputMode::Magnitudes | OutputMode::Flux => flux_channels,
        };
        let mut values = Vec::with_capacity(galaxies * columns);
        for row in rows {
            debug_assert_eq!(row.len(), columns);
            values.extend(row);
        }
        Self {
            galaxies,
            columns,
            flux_channels,
            mode,
            values,
        }
    }
}

/// Flattens each requested galaxy's merger tree and synthesises its rest or
/// observed frame spectrum, one flux row per galaxy.
pub fn synthesize_spectrum(request: SpectrumRequest<'_>) -> SynthesisResult<OutputTable> {
    let histories =
        history::flatten_forest(request.tree, request.target_snapshot, request.galaxies)?;
    synthesize_composite(CompositeRequest {
        library: request.library,
        filters: None,
        histories,
        redshift: request.redshift,
        frame: request.frame,
        age_buckets: request.age_buckets,
        dust: request.dust,
        output_mode: OutputMode::Flux,
        threads: request.threads,
    })
}

/// Flattens each requested galaxy's merger tree and synthesises its AB
/// magnitude in every filter.
pub fn synthesize_photometry(request: PhotometryRequest<'_>) -> SynthesisResult<OutputTable> {
    let histories =
        history::flatten_forest(request.tree, request.target_snapshot, request.galaxies)?;
    synthesize_composite(CompositeRequest {
        library: request.library,
        filters: Some(request.filters),
        histories,
        redshift: request.redshift,
        frame: Frame::Rest,
        age_buckets: request.age_buckets,
        dust: request.dust,
        output_mode: OutputMode::Magnitudes,
        threads: request.threads,
    })
}

/// Runs the synthesis engine over already-flattened histories.
pub fn synthesize_composite(mut request: CompositeRequest<'_>) -> SynthesisResult<OutputTable> {
    if !request.redshift.is_finite() || request.redshift < 0.0 {
        return Err(SynthesisError::Redshift {
            value: request.redshift,
        });
    }
    let ages = request.library.ages();
    integrate::validate_age_buckets(request.age_buckets, ages[ages.len() - 1])?;
    validate_histories(&request.histories, request.age_buckets.len())?;
    if let Some(dust) = request.dust {
        validate_dust(dust, request.histories.len())?;
    }

    let flux_channels = match request.filters {
        Some(filters) => filters.len(),
        None => request.library.wavelength_count(),
    };
    if request.output_mode == OutputMode::SlopeFit && flux_channels < 3 {
        return Err(SynthesisError::SlopeChannels {
            channels: flux_channels,
        });
    }

    tracing::info!(
        galaxies = request.histories.len(),
        channels = flux_channels,
        buckets = request.age_buckets.len(),
        mode = %request.output_mode,
        "starting synthesis"
    );

    // Photometric runs only ever read the template spectrum inside the
    // filter pass-bands and below the last age bucket.
    let windowed;
    let library = match request.filters {
        Some(filters) => {
            let max_age = request.age_buckets[request.age_buckets.len() - 1];
            windowed = window_to_filters(request.library, filters, request.redshift, max_age)?;
            &windowed
        }
        None => request.library,
    };

    let min_bin = library.min_bin();
    let max_bin = library.max_bin();
    history::trim_to_bin_range(&mut request.histories, min_bin, max_bin);

    let integrated = integrate::integrate_templates(library, request.age_buckets)?;
    let split = match request.dust {
        Some(model) => {
            integrate::birth_cloud_split(library, request.age_buckets, model.birth_cloud_age)?
        }
        None => None,
    };

    let plan = match request.filters {
        Some(filters) => ChannelPlan::Photometry { filters },
        None => ChannelPlan::Spectrum {
            frame: request.frame,
        },
    };
    let context = TransformContext::new(library, plan, request.redshift)?;
    let log_wavelengths = match request.output_mode {
        OutputMode::SlopeFit => context.channel_log_wavelengths()?,
        OutputMode::Magnitudes | OutputMode::Flux => Vec::new(),
    };

    let inputs = ReduceInputs {
        library,
        integrated: &integrated,
        split: split.as_ref(),
        transform: &context,
        age_buckets: request.age_buckets,
        histories: &request.histories,
        dust: request.dust,
        min_bin,
        max_bin,
    };
    let rows = reduce::run_with_pool(request.threads, || reduce::reduce(&inputs))??;
    let rows = postprocess::finalize(rows, request.output_mode, &log_wavelengths)?;

    let table = OutputTable::from_rows(rows, flux_channels, request.output_mode);
    tracing::info!(
        galaxies = table.galaxies,
        columns = table.columns,
        "synthesis finished"
    );
    Ok(table)
}

fn validate_histories(
    histories: &[StarFormationHistory],
    buckets: usize,
) -> SynthesisResult<()> {
    for (galaxy, history) in histories.iter().enumerate() {
        for (index, burst) in history.bursts.iter().enumerate() {
            if !burst.sfr.is_finite()
                || burst.sfr < 0.0
                || !burst.metallicity.is_finite()
                || burst.metallicity < 0.0
            {
                return Err(SynthesisError::BurstValue {
                    galaxy,
                    burst: index,
                });
            }
            if burst.age_index >= buckets {
                return Err(SynthesisError::AgeIndexRange {
                    galaxy,
                    burst: index,
                    age_index: burst.age_index,
                    buckets,
                });
            }
        }
    }
    Ok(())
}

fn validate_dust(dust: &DustModel, histories: usize) -> SynthesisResult<()> {
    if !dust.birth_cloud_age.is_finite() || dust.birth_cloud_age < 0.0 {
        return Err(SynthesisError::BirthCloudAge {
            value: dust.birth_cloud_age,
        });
    }
    if dust.galaxies.len() != histories {
        return Err(SynthesisError::DustCount {
            histories,
            dust: dust.galaxies.len(),
        });
    }
    for (galaxy, params) in dust.galaxies.iter().enumerate() {
        if !params.is_finite() {
            return Err(SynthesisError::DustValue { galaxy });
        }
    }
    Ok(())
}
