use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use galsed_core::domain::{DustModel, Frame, MergerTreeTables, OutputMode, StarFormationHistory};
use galsed_core::library::{LoadedLibrary, load_library};
use galsed_core::synthesis::{
    CompositeRequest, OutputTable, PhotometryRequest, SpectrumRequest, synthesize_composite,
    synthesize_photometry, synthesize_spectrum,
};

use super::CliError;

#[derive(clap::Args)]
pub(super) struct RunIo {
    /// Template library manifest path
    #[arg(long)]
    library: PathBuf,

    /// Run description JSON path
    #[arg(long)]
    run: PathBuf,

    /// Output table path
    #[arg(long)]
    output: PathBuf,

    /// Worker threads, zero keeps the default pool
    #[arg(long, default_value = "0")]
    threads: usize,
}

/// Tree-mode run description: the merger tree, the output epoch, and the
/// galaxies to synthesize.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeRun {
    redshift: f64,
    age_buckets: Vec<f64>,
    /// Spectrum channel frame; photometry ignores it.
    #[serde(default)]
    frame: Frame,
    target_snapshot: usize,
    galaxies: Vec<usize>,
    tree: MergerTreeTables,
    #[serde(default)]
    dust: Option<DustModel>,
}

/// Flattened-mode run description: per-galaxy burst lists in place of a tree.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompositeRun {
    redshift: f64,
    age_buckets: Vec<f64>,
    #[serde(default)]
    frame: Frame,
    histories: Vec<StarFormationHistory>,
    #[serde(default)]
    dust: Option<DustModel>,
    #[serde(default = "default_output_mode")]
    output_mode: OutputMode,
    /// Integrate the manifest's filter curves instead of keeping one channel
    /// per template wavelength.
    #[serde(default)]
    use_filters: bool,
}

fn default_output_mode() -> OutputMode {
    OutputMode::Flux
}

pub(super) fn run_spectrum_command(io: RunIo) -> Result<i32, CliError> {
    let loaded = load_manifest(&io.library)?;
    let run: TreeRun = read_description(&io.run)?;

    let table = synthesize_spectrum(SpectrumRequest {
        library: &loaded.library,
        tree: &run.tree,
        target_snapshot: run.target_snapshot,
        galaxies: &run.galaxies,
        redshift: run.redshift,
        frame: run.frame,
        age_buckets: &run.age_buckets,
        dust: run.dust.as_ref(),
        threads: io.threads,
    })?;

    write_output_table(&io.output, &table)?;
    report_written(&table, &io.output);
    Ok(0)
}

pub(super) fn run_photometry_command(io: RunIo) -> Result<i32, CliError> {
    let loaded = load_manifest(&io.library)?;
    let filters = loaded
        .filters
        .as_ref()
        .ok_or_else(|| CliError::MissingFilters {
            path: io.library.clone(),
        })?;
    let run: TreeRun = read_description(&io.run)?;

    let table = synthesize_photometry(PhotometryRequest {
        library: &loaded.library,
        filters,
        tree: &run.tree,
        target_snapshot: run.target_snapshot,
        galaxies: &run.galaxies,
        redshift: run.redshift,
        age_buckets: &run.age_buckets,
        dust: run.dust.as_ref(),
        threads: io.threads,
    })?;

    write_output_table(&io.output, &table)?;
    report_written(&table, &io.output);
    Ok(0)
}

pub(super) fn run_composite_command(io: RunIo) -> Result<i32, CliError> {
    let loaded = load_manifest(&io.library)?;
    let run: CompositeRun = read_description(&io.run)?;
    let filters = if run.use_filters {
        Some(
            loaded
                .filters
                .as_ref()
                .ok_or_else(|| CliError::MissingFilters {
                    path: io.library.clone(),
                })?,
        )
    } else {
        None
    };

    let table = synthesize_composite(CompositeRequest {
        library: &loaded.library,
        filters,
        histories: run.histories,
        redshift: run.redshift,
        frame: run.frame,
        age_buckets: &run.age_buckets,
        dust: run.dust.as_ref(),
        output_mode: run.output_mode,
        threads: io.threads,
    })?;

    write_output_table(&io.output, &table)?;
    report_written(&table, &io.output);
    Ok(0)
}

fn load_manifest(path: &Path) -> Result<LoadedLibrary, CliError> {
    let loaded = load_library(path)?;
    tracing::debug!(
        library = %path.display(),
        metallicities = loaded.library.metallicity_count(),
        wavelengths = loaded.library.wavelength_count(),
        ages = loaded.library.age_count(),
        "library loaded"
    );
    Ok(loaded)
}

fn read_description<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read run description '{}'", path.display()))?;
    serde_json::from_str(&text).map_err(|error| CliError::Description {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

/// Output format: `u32` row and column counts, then the row-major values,
/// all little-endian.
fn write_output_table(path: &Path, table: &OutputTable) -> Result<(), CliError> {
    let mut bytes = Vec::with_capacity(8 + table.values.len() * 8);
    bytes.extend_from_slice(&(table.galaxies as u32).to_le_bytes());
    bytes.extend_from_slice(&(table.columns as u32).to_le_bytes());
    for value in &table.values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write output table '{}'", path.display()))?;
    Ok(())
}

fn report_written(table: &OutputTable, path: &Path) {
    println!(
        "Wrote {} rows x {} columns ({}) to '{}'.",
        table.galaxies,
        table.columns,
        table.mode,
        path.display()
    );
}
