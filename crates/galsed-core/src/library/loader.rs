//! Template library ingestion.
//!
//! A JSON manifest names the binary table files, all little-endian: axis
//! files carry a `u32` element count followed by that many `f64` values; the
//! flux grid carries its three `u32` dimensions (metallicities, wavelengths,
//! ages) followed by the flat grid. Filter curves come from a JSON file of
//! [`FilterCurve`] records. Paths in the manifest are resolved relative to
//! the manifest's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::TemplateLibrary;
use super::filters::{FilterCurve, FilterSet};
use crate::domain::{SynthesisError, SynthesisResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryManifest {
    pub metallicities: PathBuf,
    pub wavelengths: PathBuf,
    pub ages: PathBuf,
    pub flux: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorption: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<PathBuf>,
}

/// A fully loaded library plus whatever filters the manifest attached.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLibrary {
    pub library: TemplateLibrary,
    pub filters: Option<FilterSet>,
}

pub fn load_library(manifest_path: &Path) -> SynthesisResult<LoadedLibrary> {
    let text = fs::read_to_string(manifest_path)
        .map_err(|error| SynthesisError::io("read", manifest_path, &error))?;
    let manifest: LibraryManifest =
        serde_json::from_str(&text).map_err(|error| SynthesisError::Manifest {
            path: manifest_path.to_path_buf(),
            message: error.to_string(),
        })?;

    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let metallicities = read_axis_table(&base.join(&manifest.metallicities))?;
    let wavelengths = read_axis_table(&base.join(&manifest.wavelengths))?;
    let ages = read_axis_table(&base.join(&manifest.ages))?;
    let (dimensions, flux) = read_flux_grid(&base.join(&manifest.flux))?;

    // The grid header must agree with the axis files before the flat grid
    // is trusted at all.
    let [grid_z, grid_w, grid_a] = dimensions;
    if grid_z != metallicities.len() || grid_w != wavelengths.len() || grid_a != ages.len() {
        return Err(SynthesisError::GridSize {
            metallicities: metallicities.len(),
            wavelengths: wavelengths.len(),
            ages: ages.len(),
            values: flux.len(),
        });
    }

    let absorption = match &manifest.absorption {
        Some(path) => Some(read_axis_table(&base.join(path))?),
        None => None,
    };

    let library = TemplateLibrary::new(metallicities, wavelengths, ages, flux, absorption)?;

    let filters = match &manifest.filters {
        Some(path) => Some(read_filter_file(&base.join(path))?),
        None => None,
    };

    Ok(LoadedLibrary { library, filters })
}

/// One axis file: `u32` count, then the values.
pub fn read_axis_table(path: &Path) -> SynthesisResult<Vec<f64>> {
    let bytes = fs::read(path).map_err(|error| SynthesisError::io("read", path, &error))?;
    let count = read_u32_le(&bytes, 0).ok_or_else(|| truncated(path, 0))? as usize;
    let values = read_f64_run(&bytes, 4, count, path)?;
    expect_consumed(&bytes, 4 + count * 8, path)?;
    Ok(values)
}

/// The flux grid file: three `u32` dimensions, then the flat grid.
pub fn read_flux_grid(path: &Path) -> SynthesisResult<([usize; 3], Vec<f64>)> {
    let bytes = fs::read(path).map_err(|error| SynthesisError::io("read", path, &error))?;
    let mut dimensions = [0_usize; 3];
    for (slot, dimension) in dimensions.iter_mut().enumerate() {
        *dimension =
            read_u32_le(&bytes, slot * 4).ok_or_else(|| truncated(path, slot * 4))? as usize;
    }
    let count = dimensions[0] * dimensions[1] * dimensions[2];
    let values = read_f64_run(&bytes, 12, count, path)?;
    expect_consumed(&bytes, 12 + count * 8, path)?;
    Ok((dimensions, values))
}

pub fn read_filter_file(path: &Path) -> SynthesisResult<FilterSet> {
    let text = fs::read_to_string(path).map_err(|error| SynthesisError::io("read", path, &error))?;
    let curves: Vec<FilterCurve> =
        serde_json::from_str(&text).map_err(|error| SynthesisError::Manifest {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
    FilterSet::from_curves(curves)
}

/// Writes an axis file in the format [`read_axis_table`] expects.
pub fn write_axis_table(path: &Path, values: &[f64]) -> SynthesisResult<()> {
    let mut bytes = Vec::with_capacity(4 + values.len() * 8);
    bytes.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|error| SynthesisError::io("write", path, &error))
}

/// Writes a flux grid file in the format [`read_flux_grid`] expects.
pub fn write_flux_grid(path: &Path, dimensions: [usize; 3], values: &[f64]) -> SynthesisResult<()> {
    let mut bytes = Vec::with_capacity(12 + values.len() * 8);
    for dimension in dimensions {
        bytes.extend_from_slice(&(dimension as u32).to_le_bytes());
    }
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|error| SynthesisError::io("write", path, &error))
}

fn read_f64_run(
    bytes: &[u8],
    start: usize,
    count: usize,
    path: &Path,
) -> SynthesisResult<Vec<f64>> {
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let offset = start + index * 8;
        values.push(read_f64_le(bytes, offset).ok_or_else(|| truncated(path, offset))?);
    }
    Ok(values)
}

fn expect_consumed(bytes: &[u8], expected: usize, path: &Path) -> SynthesisResult<()> {
    if bytes.len() != expected {
        return Err(SynthesisError::TrailingBytes {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn truncated(path: &Path, offset: usize) -> SynthesisError {
    SynthesisError::Truncated {
        path: path.to_path_buf(),
        offset,
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    let mut value = [0_u8; 4];
    value.copy_from_slice(slice);
    Some(u32::from_le_bytes(value))
}

fn read_f64_le(bytes: &[u8], offset: usize) -> Option<f64> {
    let slice = bytes.get(offset..offset + 8)?;
    let mut value = [0_u8; 8];
    value.copy_from_slice(slice);
    Some(f64::from_le_bytes(value))
}
