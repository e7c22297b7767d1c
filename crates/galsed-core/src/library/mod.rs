//! Stellar population template library: the (metallicity x wavelength x age)
//! raw flux grid, its axes, and the optional transmission/filter attachments.

pub mod filters;
pub mod loader;
pub mod window;

pub use filters::{FilterCurve, FilterSet};
pub use loader::{LoadedLibrary, load_library};
pub use window::window_to_filters;

use crate::domain::{SynthesisError, SynthesisResult};

/// Raw template grid plus its three axes, validated on construction.
///
/// Flux values are erg/s/AA per solar mass of stars formed, laid out flat in
/// (metallicity, wavelength, age) order so the age series of one
/// (metallicity, wavelength) cell is contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLibrary {
    metallicities: Vec<f64>,
    wavelengths: Vec<f64>,
    ages: Vec<f64>,
    flux: Vec<f64>,
    absorption: Option<Vec<f64>>,
}

impl TemplateLibrary {
    pub fn new(
        metallicities: Vec<f64>,
        wavelengths: Vec<f64>,
        ages: Vec<f64>,
        flux: Vec<f64>,
        absorption: Option<Vec<f64>>,
    ) -> SynthesisResult<Self> {
        validate_axis("metallicities", &metallicities)?;
        validate_axis("wavelengths", &wavelengths)?;
        validate_axis("ages", &ages)?;

        let expected = metallicities.len() * wavelengths.len() * ages.len();
        if flux.len() != expected {
            return Err(SynthesisError::GridSize {
                metallicities: metallicities.len(),
                wavelengths: wavelengths.len(),
                ages: ages.len(),
                values: flux.len(),
            });
        }
        for (index, value) in flux.iter().enumerate() {
            if !value.is_finite() {
                return Err(SynthesisError::AxisValue {
                    axis: "flux",
                    index,
                    value: *value,
                });
            }
        }

        if let Some(curve) = &absorption {
            if curve.len() != wavelengths.len() {
                return Err(SynthesisError::AbsorptionSize {
                    wavelengths: wavelengths.len(),
                    actual: curve.len(),
                });
            }
            for (index, value) in curve.iter().enumerate() {
                if !value.is_finite() {
                    return Err(SynthesisError::AxisValue {
                        axis: "absorption",
                        index,
                        value: *value,
                    });
                }
            }
        }

        Ok(Self {
            metallicities,
            wavelengths,
            ages,
            flux,
            absorption,
        })
    }

    pub fn metallicities(&self) -> &[f64] {
        &self.metallicities
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn ages(&self) -> &[f64] {
        &self.ages
    }

    pub fn absorption(&self) -> Option<&[f64]> {
        self.absorption.as_deref()
    }

    pub fn metallicity_count(&self) -> usize {
        self.metallicities.len()
    }

    pub fn wavelength_count(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn age_count(&self) -> usize {
        self.ages.len()
    }

    /// Age series of one (metallicity, wavelength) cell.
    pub fn age_series(&self, metallicity_index: usize, wavelength_index: usize) -> &[f64] {
        let ages = self.ages.len();
        let start = (metallicity_index * self.wavelengths.len() + wavelength_index) * ages;
        &self.flux[start..start + ages]
    }

    /// Lowest working-buffer bin covered by the metallicity axis.
    pub fn min_bin(&self) -> usize {
        axis_bin(self.metallicities[0])
    }

    /// Highest working-buffer bin covered by the metallicity axis.
    pub fn max_bin(&self) -> usize {
        axis_bin(self.metallicities[self.metallicities.len() - 1]).max(self.min_bin())
    }

    pub fn bin_count(&self) -> usize {
        self.max_bin() - self.min_bin() + 1
    }
}

/// Working-buffer bin of an axis endpoint; half a bin below the nominal
/// value, floored at bin zero.
fn axis_bin(metallicity: f64) -> usize {
    let raw = (metallicity * crate::common::constants::METALLICITY_BINS_PER_UNIT - 0.5).floor();
    if raw <= 0.0 { 0 } else { raw as usize }
}

fn validate_axis(axis: &'static str, values: &[f64]) -> SynthesisResult<()> {
    if values.len() < 2 {
        return Err(SynthesisError::AxisTooShort {
            axis,
            minimum: 2,
            actual: values.len(),
        });
    }
    for (index, value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(SynthesisError::AxisValue {
                axis,
                index,
                value: *value,
            });
        }
        if index > 0 && values[index - 1] >= *value {
            return Err(SynthesisError::AxisOrder {
                axis,
                index,
                previous: values[index - 1],
                current: *value,
            });
        }
    }
    Ok(())
}
