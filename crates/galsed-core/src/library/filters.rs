//! Broadband filter transmission curves.

use serde::{Deserialize, Serialize};

use crate::domain::{Frame, SynthesisError, SynthesisResult};
use crate::numerics::{integrate_filter, integrate_trapezoid};

/// One transmission curve: ordered wavelength/response pairs plus the frame
/// its wavelengths are quoted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCurve {
    pub name: String,
    #[serde(default)]
    pub frame: Frame,
    pub wavelengths: Vec<f64>,
    pub response: Vec<f64>,
}

impl FilterCurve {
    pub fn validate(&self) -> SynthesisResult<()> {
        if self.wavelengths.len() != self.response.len() {
            return Err(SynthesisError::FilterShape {
                name: self.name.clone(),
                wavelengths: self.wavelengths.len(),
                responses: self.response.len(),
            });
        }
        if self.wavelengths.len() < 2 {
            return Err(SynthesisError::FilterTooShort {
                name: self.name.clone(),
                samples: self.wavelengths.len(),
            });
        }
        for (index, value) in self.wavelengths.iter().enumerate() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(SynthesisError::FilterOrder {
                    name: self.name.clone(),
                    index,
                    previous: if index > 0 {
                        self.wavelengths[index - 1]
                    } else {
                        0.0
                    },
                    current: *value,
                });
            }
            if index > 0 && self.wavelengths[index - 1] >= *value {
                return Err(SynthesisError::FilterOrder {
                    name: self.name.clone(),
                    index,
                    previous: self.wavelengths[index - 1],
                    current: *value,
                });
            }
        }
        for (index, value) in self.response.iter().enumerate() {
            if !value.is_finite() || *value < 0.0 {
                return Err(SynthesisError::FilterResponse {
                    name: self.name.clone(),
                    index,
                    value: *value,
                });
            }
        }
        if !self.response.iter().any(|value| *value > 0.0) {
            return Err(SynthesisError::FilterFlat {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn band_lo(&self) -> f64 {
        self.wavelengths[0]
    }

    pub fn band_hi(&self) -> f64 {
        self.wavelengths[self.wavelengths.len() - 1]
    }

    /// Response-weighted mean wavelength; the wavelength the filter channel
    /// is quoted at in slope fits.
    pub fn pivot_wavelength(&self) -> SynthesisResult<f64> {
        let weighted = integrate_filter(&self.response, &self.wavelengths, &self.wavelengths)?;
        let area = integrate_trapezoid(
            &self.response,
            &self.wavelengths,
            self.band_lo(),
            self.band_hi(),
        )?;
        Ok(weighted / area)
    }
}

/// Validated filter collection, rest-frame curves ordered before
/// observed-frame ones. Channel order in photometric output follows this
/// ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSet {
    filters: Vec<FilterCurve>,
    rest_count: usize,
}

impl FilterSet {
    pub fn from_curves(curves: Vec<FilterCurve>) -> SynthesisResult<Self> {
        if curves.is_empty() {
            return Err(SynthesisError::FilterSetEmpty);
        }
        for curve in &curves {
            curve.validate()?;
        }

        let mut filters = Vec::with_capacity(curves.len());
        for curve in &curves {
            if curve.frame == Frame::Rest {
                filters.push(curve.clone());
            }
        }
        let rest_count = filters.len();
        for curve in curves {
            if curve.frame == Frame::Observed {
                filters.push(curve);
            }
        }

        Ok(Self {
            filters,
            rest_count,
        })
    }

    pub fn filters(&self) -> &[FilterCurve] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn rest_count(&self) -> usize {
        self.rest_count
    }

    pub fn observed_count(&self) -> usize {
        self.filters.len() - self.rest_count
    }

    pub fn has_observed(&self) -> bool {
        self.observed_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterCurve, FilterSet};
    use crate::domain::{Frame, SynthesisError};

    fn tophat(name: &str, frame: Frame, lo: f64, hi: f64) -> FilterCurve {
        FilterCurve {
            name: name.to_owned(),
            frame,
            wavelengths: vec![lo, hi],
            response: vec![1.0, 1.0],
        }
    }

    #[test]
    fn rest_filters_are_ordered_before_observed_ones() {
        let set = FilterSet::from_curves(vec![
            tophat("obs_b", Frame::Observed, 4000.0, 5000.0),
            tophat("rest_uv", Frame::Rest, 1500.0, 1700.0),
            tophat("obs_r", Frame::Observed, 6000.0, 7000.0),
            tophat("rest_v", Frame::Rest, 5000.0, 6000.0),
        ])
        .expect("valid curves");

        let names: Vec<&str> = set.filters().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["rest_uv", "rest_v", "obs_b", "obs_r"]);
        assert_eq!(set.rest_count(), 2);
        assert_eq!(set.observed_count(), 2);
    }

    #[test]
    fn an_empty_set_is_rejected() {
        assert_eq!(
            FilterSet::from_curves(Vec::new()).expect_err("no curves"),
            SynthesisError::FilterSetEmpty
        );
    }

    #[test]
    fn a_zero_response_curve_is_rejected() {
        let mut curve = tophat("dead", Frame::Rest, 1000.0, 2000.0);
        curve.response = vec![0.0, 0.0];
        let error = FilterSet::from_curves(vec![curve]).expect_err("flat response");
        assert!(matches!(error, SynthesisError::FilterFlat { .. }));
    }

    #[test]
    fn pivot_of_a_tophat_is_its_band_centre() {
        let curve = FilterCurve {
            name: "box".to_owned(),
            frame: Frame::Rest,
            wavelengths: vec![1000.0, 1500.0, 2000.0],
            response: vec![1.0, 1.0, 1.0],
        };
        let pivot = curve.pivot_wavelength().expect("well formed curve");
        assert!((pivot - 1500.0).abs() < 1.0e-9);
    }

    #[test]
    fn serde_round_trips_a_curve() {
        let curve = tophat("u", Frame::Observed, 3000.0, 4000.0);
        let json = serde_json::to_string(&curve).expect("serialize");
        let back: FilterCurve = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, curve);
    }
}
