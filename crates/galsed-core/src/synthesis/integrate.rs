//! Time integration of the raw template grid onto caller age buckets.
//!
//! Bucket `i` covers `[age_buckets[i-1], age_buckets[i]]`, with bucket 0
//! starting at zero. The raw grid is treated as constant-valued before its
//! first tabulated age, so bucket 0 picks up `flux[0] * ages[0]` ahead of
//! its trapezoid part.

use crate::domain::{SynthesisError, SynthesisResult};
use crate::library::TemplateLibrary;
use crate::numerics::integrate_trapezoid;

/// Raw flux integrated per (metallicity, age bucket, wavelength), flat in
/// that order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IntegratedGrid {
    pub values: Vec<f64>,
    pub buckets: usize,
}

/// Straddle-bucket partial integrals for the dust stage: the share of the
/// straddling bucket formed inside the birth cloud and the share outside,
/// each per (metallicity, wavelength).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BirthCloudSplit {
    pub bucket: usize,
    pub in_cloud: Vec<f64>,
    pub out_cloud: Vec<f64>,
}

pub(crate) fn validate_age_buckets(age_buckets: &[f64], age_limit: f64) -> SynthesisResult<()> {
    if age_buckets.is_empty() {
        return Err(SynthesisError::AxisTooShort {
            axis: "age_buckets",
            minimum: 1,
            actual: 0,
        });
    }
    let mut previous = 0.0;
    for (index, boundary) in age_buckets.iter().enumerate() {
        if !boundary.is_finite() {
            return Err(SynthesisError::AxisValue {
                axis: "age_buckets",
                index,
                value: *boundary,
            });
        }
        if *boundary <= previous {
            return Err(SynthesisError::AxisOrder {
                axis: "age_buckets",
                index,
                previous,
                current: *boundary,
            });
        }
        if *boundary > age_limit {
            return Err(SynthesisError::BucketBeyondAges {
                index,
                boundary: *boundary,
                age_limit,
            });
        }
        previous = *boundary;
    }
    Ok(())
}

pub(crate) fn integrate_templates(
    library: &TemplateLibrary,
    age_buckets: &[f64],
) -> SynthesisResult<IntegratedGrid> {
    let ages = library.ages();
    validate_age_buckets(age_buckets, ages[ages.len() - 1])?;

    let buckets = age_buckets.len();
    let wavelengths = library.wavelength_count();
    let mut values = vec![0.0; library.metallicity_count() * buckets * wavelengths];

    for metallicity_index in 0..library.metallicity_count() {
        for wavelength_index in 0..wavelengths {
            let series = library.age_series(metallicity_index, wavelength_index);
            let mut start = 0.0;
            for (bucket, end) in age_buckets.iter().enumerate() {
                let cell = (metallicity_index * buckets + bucket) * wavelengths + wavelength_index;
                values[cell] = span_integral(series, ages, start, *end)?;
                start = *end;
            }
        }
    }

    Ok(IntegratedGrid { values, buckets })
}

pub(crate) fn birth_cloud_split(
    library: &TemplateLibrary,
    age_buckets: &[f64],
    birth_cloud_age: f64,
) -> SynthesisResult<Option<BirthCloudSplit>> {
    let ages = library.ages();
    validate_age_buckets(age_buckets, ages[ages.len() - 1])?;

    let Some(bucket) = straddling_bucket(age_buckets, birth_cloud_age) else {
        return Ok(None);
    };
    let start = if bucket == 0 {
        0.0
    } else {
        age_buckets[bucket - 1]
    };
    let end = age_buckets[bucket];

    let wavelengths = library.wavelength_count();
    let cells = library.metallicity_count() * wavelengths;
    let mut in_cloud = vec![0.0; cells];
    let mut out_cloud = vec![0.0; cells];

    for metallicity_index in 0..library.metallicity_count() {
        for wavelength_index in 0..wavelengths {
            let series = library.age_series(metallicity_index, wavelength_index);
            let cell = metallicity_index * wavelengths + wavelength_index;
            in_cloud[cell] = span_integral(series, ages, start, birth_cloud_age)?;
            out_cloud[cell] = span_integral(series, ages, birth_cloud_age, end)?;
        }
    }

    Ok(Some(BirthCloudSplit {
        bucket,
        in_cloud,
        out_cloud,
    }))
}

/// Bucket whose interior contains `birth_cloud_age`, if any. A lifetime
/// sitting exactly on a bucket boundary needs no split.
pub(crate) fn straddling_bucket(age_buckets: &[f64], birth_cloud_age: f64) -> Option<usize> {
    let mut start = 0.0;
    for (bucket, end) in age_buckets.iter().enumerate() {
        if start < birth_cloud_age && birth_cloud_age < *end {
            return Some(bucket);
        }
        start = *end;
    }
    None
}

/// Integral of the age series over `[lower, upper]`, extending the series as
/// constant before its first tabulated age.
fn span_integral(series: &[f64], ages: &[f64], lower: f64, upper: f64) -> SynthesisResult<f64> {
    let first_age = ages[0];
    if upper <= first_age {
        return Ok(series[0] * (upper - lower));
    }
    if lower >= first_age {
        return Ok(integrate_trapezoid(series, ages, lower, upper)?);
    }
    let head = series[0] * (first_age - lower);
    Ok(head + integrate_trapezoid(series, ages, first_age, upper)?)
}

#[cfg(test)]
mod tests {
    use super::{birth_cloud_split, integrate_templates, straddling_bucket, validate_age_buckets};
    use crate::domain::SynthesisError;
    use crate::library::TemplateLibrary;

    #[test]
    fn bucket_zero_extends_the_series_back_to_age_zero() {
        // Series f(t) = t on ages [2, 10]: bucket [0, 6] integrates as
        // 2 * 2 (constant head) + (2 + 6)/2 * 4 (trapezoid) = 20.
        let library = ramp_library(&[2.0, 10.0]);
        let grid = integrate_templates(&library, &[6.0]).expect("integrate");
        assert_scalar_close("bucket zero", 20.0, grid.values[0], 1.0e-12, 1.0e-12);
    }

    #[test]
    fn later_buckets_are_plain_trapezoids() {
        let library = ramp_library(&[2.0, 10.0]);
        let grid = integrate_templates(&library, &[4.0, 8.0]).expect("integrate");
        // Bucket 1 of (z 0, wavelength 0) = integral of t over [4, 8] = 24.
        let cell = grid_cell(&library, 0, 1, grid.buckets);
        assert_scalar_close("bucket one", 24.0, grid.values[cell], 1.0e-12, 1.0e-12);
    }

    #[test]
    fn buckets_partition_the_integrated_mass() {
        let library = ramp_library(&[2.0, 5.0, 10.0, 20.0]);
        let whole = integrate_templates(&library, &[18.0]).expect("single bucket");
        let parts = integrate_templates(&library, &[3.0, 7.0, 18.0]).expect("three buckets");
        let sum: f64 = (0..3)
            .map(|bucket| parts.values[grid_cell(&library, 0, bucket, parts.buckets)])
            .sum();
        assert_scalar_close("partition", whole.values[0], sum, 1.0e-12, 1.0e-12);
    }

    #[test]
    fn a_bucket_beyond_the_age_axis_is_rejected() {
        let library = ramp_library(&[2.0, 10.0]);
        let error = integrate_templates(&library, &[4.0, 12.0]).expect_err("beyond last age");
        assert_eq!(
            error,
            SynthesisError::BucketBeyondAges {
                index: 1,
                boundary: 12.0,
                age_limit: 10.0,
            }
        );
    }

    #[test]
    fn non_increasing_buckets_are_rejected() {
        let error = validate_age_buckets(&[4.0, 4.0], 10.0).expect_err("duplicate boundary");
        assert!(matches!(
            error,
            SynthesisError::AxisOrder {
                axis: "age_buckets",
                index: 1,
                ..
            }
        ));
        let error = validate_age_buckets(&[-1.0], 10.0).expect_err("negative boundary");
        assert!(matches!(error, SynthesisError::AxisOrder { index: 0, .. }));
    }

    #[test]
    fn straddle_split_preserves_the_bucket_integral() {
        let library = ramp_library(&[2.0, 5.0, 10.0, 20.0]);
        let buckets = [4.0, 16.0];
        let grid = integrate_templates(&library, &buckets).expect("integrate");
        let split = birth_cloud_split(&library, &buckets, 9.0)
            .expect("split")
            .expect("9 straddles [4, 16]");

        assert_eq!(split.bucket, 1);
        for cell in 0..split.in_cloud.len() {
            let total = split.in_cloud[cell] + split.out_cloud[cell];
            let bucket_value = grid.values[grid_cell(&library, cell, 1, grid.buckets)];
            assert_scalar_close("in + out", bucket_value, total, 1.0e-12, 1.0e-12);
        }
    }

    #[test]
    fn a_lifetime_on_a_bucket_boundary_needs_no_split() {
        assert_eq!(straddling_bucket(&[4.0, 16.0], 4.0), None);
        assert_eq!(straddling_bucket(&[4.0, 16.0], 16.0), None);
        assert_eq!(straddling_bucket(&[4.0, 16.0], 2.0), Some(0));
        assert_eq!(straddling_bucket(&[4.0, 16.0], 20.0), None);
    }

    #[test]
    fn a_lifetime_inside_bucket_zero_splits_through_the_constant_head() {
        // Series f(t) = t on ages [2, 10]; bucket [0, 6] split at 1 yields
        // in = 2 * 1 = 2 (fully inside the constant head) and
        // out = 2 * 1 + (2 + 6)/2 * 4 = 18.
        let library = ramp_library(&[2.0, 10.0]);
        let split = birth_cloud_split(&library, &[6.0], 1.0)
            .expect("split")
            .expect("1 straddles [0, 6]");
        assert_eq!(split.bucket, 0);
        assert_scalar_close("in cloud", 2.0, split.in_cloud[0], 1.0e-12, 1.0e-12);
        assert_scalar_close("out of cloud", 18.0, split.out_cloud[0], 1.0e-12, 1.0e-12);
    }

    /// 2x2xN library whose flux equals the age value at every wavelength.
    fn ramp_library(ages: &[f64]) -> TemplateLibrary {
        let metallicities = vec![0.001, 0.002];
        let wavelengths = vec![1000.0, 2000.0];
        let mut flux = Vec::new();
        for _ in 0..metallicities.len() * wavelengths.len() {
            flux.extend_from_slice(ages);
        }
        TemplateLibrary::new(metallicities, wavelengths, ages.to_vec(), flux, None)
            .expect("consistent grid")
    }

    fn grid_cell(library: &TemplateLibrary, flat: usize, bucket: usize, buckets: usize) -> usize {
        let wavelengths = library.wavelength_count();
        let metallicity_index = flat / wavelengths;
        let wavelength_index = flat % wavelengths;
        (metallicity_index * buckets + bucket) * wavelengths + wavelength_index
    }

    fn assert_scalar_close(label: &str, expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) {
        let abs_diff = (actual - expected).abs();
        let rel_diff = abs_diff / expected.abs().max(1.0);
        assert!(
            abs_diff <= abs_tol || rel_diff <= rel_tol,
            "{label} expected={expected:.15e} actual={actual:.15e} abs_diff={abs_diff:.15e} rel_diff={rel_diff:.15e}"
        );
    }
}
