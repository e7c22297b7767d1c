//! Two-component power-law dust attenuation, applied per galaxy to the
//! integrated template buffer before any frame transform.
//!
//! Populations younger than the birth-cloud lifetime see both the
//! birth-cloud and the diffuse ISM component; older populations see the ISM
//! alone. The bucket straddling the lifetime is rebuilt from its two partial
//! integrals so only its in-cloud share picks up the birth-cloud factor.

use super::integrate::BirthCloudSplit;
use crate::common::constants::ATTENUATION_PIVOT_ANGSTROM;
use crate::domain::DustParams;
use crate::library::TemplateLibrary;

pub(crate) fn attenuate(
    ready: &mut [f64],
    library: &TemplateLibrary,
    age_buckets: &[f64],
    birth_cloud_age: f64,
    split: Option<&BirthCloudSplit>,
    params: &DustParams,
    buckets_used: &[bool],
) {
    let waves = library.wavelengths();
    let wavelengths = waves.len();
    let buckets = age_buckets.len();
    debug_assert_eq!(buckets_used.len(), buckets);
    debug_assert_eq!(
        ready.len(),
        library.metallicity_count() * buckets * wavelengths
    );

    let ism = transmission(waves, params.tau_uv_ism, params.ism_exponent);
    let cloud = transmission(waves, params.tau_uv_birth_cloud, params.birth_cloud_exponent);

    for metallicity_index in 0..library.metallicity_count() {
        for (bucket, end) in age_buckets.iter().enumerate() {
            if !buckets_used[bucket] {
                continue;
            }
            let row_start = (metallicity_index * buckets + bucket) * wavelengths;
            let row = &mut ready[row_start..row_start + wavelengths];
            match split {
                Some(split) if split.bucket == bucket => {
                    let base = metallicity_index * wavelengths;
                    for (index, value) in row.iter_mut().enumerate() {
                        *value = ism[index]
                            * (cloud[index] * split.in_cloud[base + index]
                                + split.out_cloud[base + index]);
                    }
                }
                _ if *end <= birth_cloud_age => {
                    for (index, value) in row.iter_mut().enumerate() {
                        *value *= ism[index] * cloud[index];
                    }
                }
                _ => {
                    for (index, value) in row.iter_mut().enumerate() {
                        *value *= ism[index];
                    }
                }
            }
        }
    }
}

fn transmission(waves: &[f64], tau_uv: f64, exponent: f64) -> Vec<f64> {
    waves
        .iter()
        .map(|wave| (-tau_uv * (wave / ATTENUATION_PIVOT_ANGSTROM).powf(exponent)).exp())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::attenuate;
    use crate::domain::DustParams;
    use crate::library::TemplateLibrary;
    use crate::synthesis::integrate::{birth_cloud_split, integrate_templates};

    const BUCKETS: [f64; 3] = [4.0, 8.0, 16.0];

    #[test]
    fn zero_optical_depth_leaves_the_buffer_unchanged() {
        let library = flat_library();
        let grid = integrate_templates(&library, &BUCKETS).expect("integrate");
        let mut ready = grid.values.clone();

        attenuate(
            &mut ready,
            &library,
            &BUCKETS,
            8.0,
            None,
            &params(0.0, 0.0),
            &[true; 3],
        );
        assert_eq!(ready, grid.values);
    }

    #[test]
    fn age_regimes_pick_their_components() {
        let library = flat_library();
        let grid = integrate_templates(&library, &BUCKETS).expect("integrate");
        let mut ready = grid.values.clone();

        // Lifetime on the bucket 1 boundary: buckets 0 and 1 are embedded,
        // bucket 2 sees the ISM alone.
        attenuate(
            &mut ready,
            &library,
            &BUCKETS,
            8.0,
            None,
            &params(0.5, 1.2),
            &[true; 3],
        );

        // At the 1600 AA pivot the factors are exactly exp(-tau).
        let ism = (-0.5_f64).exp();
        let cloud = (-1.2_f64).exp();
        for (bucket, factor) in [(0, ism * cloud), (1, ism * cloud), (2, ism)] {
            let cell = bucket * library.wavelength_count();
            assert_close(grid.values[cell] * factor, ready[cell]);
        }
    }

    #[test]
    fn wavelength_dependence_follows_the_power_law() {
        let library = flat_library();
        let grid = integrate_templates(&library, &BUCKETS).expect("integrate");
        let mut ready = grid.values.clone();

        attenuate(
            &mut ready,
            &library,
            &BUCKETS,
            20.0,
            None,
            &params(0.5, 0.0),
            &[true; 3],
        );

        // Wavelength 3200 AA doubles the pivot ratio; exponent -0.7 on the
        // ISM component only (birth-cloud tau is zero).
        let factor = (-0.5 * 2.0_f64.powf(-0.7)).exp();
        assert_close(grid.values[1] * factor, ready[1]);
    }

    #[test]
    fn the_straddling_bucket_shields_only_its_in_cloud_share() {
        let library = flat_library();
        let grid = integrate_templates(&library, &BUCKETS).expect("integrate");
        let split = birth_cloud_split(&library, &BUCKETS, 6.0)
            .expect("split")
            .expect("6 straddles [4, 8]");
        let mut ready = grid.values.clone();

        attenuate(
            &mut ready,
            &library,
            &BUCKETS,
            6.0,
            Some(&split),
            &params(0.5, 1.2),
            &[true; 3],
        );

        let ism = (-0.5_f64).exp();
        let cloud = (-1.2_f64).exp();
        let wavelengths = library.wavelength_count();
        for metallicity_index in 0..library.metallicity_count() {
            let cell = (metallicity_index * 3 + 1) * wavelengths;
            let base = metallicity_index * wavelengths;
            let expected = ism * (cloud * split.in_cloud[base] + split.out_cloud[base]);
            assert_close(expected, ready[cell]);
        }
    }

    #[test]
    fn unused_buckets_are_left_untouched() {
        let library = flat_library();
        let grid = integrate_templates(&library, &BUCKETS).expect("integrate");
        let mut ready = grid.values.clone();

        attenuate(
            &mut ready,
            &library,
            &BUCKETS,
            8.0,
            None,
            &params(0.5, 1.2),
            &[false, true, false],
        );

        let wavelengths = library.wavelength_count();
        assert_eq!(ready[..wavelengths], grid.values[..wavelengths]);
        assert_ne!(
            ready[wavelengths..2 * wavelengths],
            grid.values[wavelengths..2 * wavelengths]
        );
        assert_eq!(
            ready[2 * wavelengths..3 * wavelengths],
            grid.values[2 * wavelengths..3 * wavelengths]
        );
    }

    /// Constant-flux library with the pivot wavelength first.
    fn flat_library() -> TemplateLibrary {
        let metallicities = vec![0.001, 0.002];
        let wavelengths = vec![1600.0, 3200.0];
        let ages = vec![1.0, 20.0];
        let flux = vec![1.0; 8];
        TemplateLibrary::new(metallicities, wavelengths, ages, flux, None)
            .expect("consistent grid")
    }

    fn params(tau_ism: f64, tau_cloud: f64) -> DustParams {
        DustParams {
            tau_uv_ism: tau_ism,
            ism_exponent: -0.7,
            tau_uv_birth_cloud: tau_cloud,
            birth_cloud_exponent: -0.7,
        }
    }

    fn assert_close(expected: f64, actual: f64) {
        assert!(
            (expected - actual).abs() <= 1.0e-12 * expected.abs().max(1.0),
            "expected={expected:.15e} actual={actual:.15e}"
        );
    }
}
