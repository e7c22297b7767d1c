//! Windowing of a template library to the wavelengths its filters can see
//! and the ages its run can reach.
//!
//! Filter convolution only ever reads the template spectrum inside a filter
//! pass-band, and time integration never reads past the last age bucket, so
//! a photometric run shrinks its library copy up front. Each kept wavelength
//! run retains one bracketing sample on each side so boundary interpolation
//! stays exact; the age axis keeps one sample at or past the cutoff.

use super::TemplateLibrary;
use super::filters::FilterSet;
use crate::domain::{Frame, SynthesisError, SynthesisResult};

pub fn window_to_filters(
    library: &TemplateLibrary,
    filters: &FilterSet,
    redshift: f64,
    max_age: f64,
) -> SynthesisResult<TemplateLibrary> {
    let waves = library.wavelengths();
    let ages = library.ages();
    let scale = 1.0 + redshift;
    let grid_lo = waves[0];
    let grid_hi = waves[waves.len() - 1];

    let mut keep = vec![false; waves.len()];
    for filter in filters.filters() {
        // Observed-frame filters sample the dilated grid, so their band maps
        // onto the rest grid blueshifted by (1+z).
        let (lo, hi) = match filter.frame {
            Frame::Rest => (filter.band_lo(), filter.band_hi()),
            Frame::Observed => (filter.band_lo() / scale, filter.band_hi() / scale),
        };
        if lo < grid_lo || hi > grid_hi {
            let frame_scale = match filter.frame {
                Frame::Rest => 1.0,
                Frame::Observed => scale,
            };
            return Err(SynthesisError::FilterCoverage {
                name: filter.name.clone(),
                band_lo: filter.band_lo(),
                band_hi: filter.band_hi(),
                grid_lo: grid_lo * frame_scale,
                grid_hi: grid_hi * frame_scale,
            });
        }

        let first = waves.partition_point(|wave| *wave < lo);
        let last = waves.partition_point(|wave| *wave <= hi);
        let run_lo = first.saturating_sub(1);
        let run_hi = last.min(waves.len() - 1);
        for flag in &mut keep[run_lo..=run_hi] {
            *flag = true;
        }
    }

    let kept_waves: Vec<usize> = (0..waves.len()).filter(|index| keep[*index]).collect();

    let age_cut = ages.partition_point(|age| *age < max_age);
    let kept_ages = (age_cut + 1).min(ages.len());

    let wavelengths: Vec<f64> = kept_waves.iter().map(|index| waves[*index]).collect();
    let windowed_ages: Vec<f64> = ages[..kept_ages].to_vec();
    let absorption = library
        .absorption()
        .map(|curve| kept_waves.iter().map(|index| curve[*index]).collect());

    let mut flux = Vec::with_capacity(library.metallicity_count() * kept_waves.len() * kept_ages);
    for metallicity_index in 0..library.metallicity_count() {
        for wave_index in &kept_waves {
            let series = library.age_series(metallicity_index, *wave_index);
            flux.extend_from_slice(&series[..kept_ages]);
        }
    }

    TemplateLibrary::new(
        library.metallicities().to_vec(),
        wavelengths,
        windowed_ages,
        flux,
        absorption,
    )
}

#[cfg(test)]
mod tests {
    use super::window_to_filters;
    use crate::domain::{Frame, SynthesisError};
    use crate::library::TemplateLibrary;
    use crate::library::filters::{FilterCurve, FilterSet};

    #[test]
    fn kept_runs_carry_one_bracketing_sample_each_side() {
        let library = grid_library();
        let filters = set(vec![tophat("mid", Frame::Rest, 3400.0, 5600.0)]);

        let windowed = window_to_filters(&library, &filters, 0.0, 5.0e7).expect("window");
        assert_eq!(windowed.wavelengths(), &[3000.0, 4000.0, 5000.0, 6000.0]);
    }

    #[test]
    fn observed_bands_are_blueshifted_before_matching() {
        let library = grid_library();
        let filters = set(vec![tophat("obs", Frame::Observed, 8200.0, 9800.0)]);

        // z = 1 halves the band onto the rest grid: [4100, 4900].
        let windowed = window_to_filters(&library, &filters, 1.0, 5.0e7).expect("window");
        assert_eq!(windowed.wavelengths(), &[4000.0, 5000.0]);
    }

    #[test]
    fn disjoint_bands_keep_disjoint_runs() {
        let library = grid_library();
        let filters = set(vec![
            tophat("blue", Frame::Rest, 1900.0, 2100.0),
            tophat("red", Frame::Rest, 6900.0, 7100.0),
        ]);

        let windowed = window_to_filters(&library, &filters, 0.0, 5.0e7).expect("window");
        assert_eq!(
            windowed.wavelengths(),
            &[1000.0, 2000.0, 3000.0, 6000.0, 7000.0, 8000.0]
        );
    }

    #[test]
    fn ages_keep_one_sample_at_or_past_the_cutoff() {
        let library = grid_library();
        let filters = set(vec![tophat("mid", Frame::Rest, 3400.0, 5600.0)]);

        let windowed = window_to_filters(&library, &filters, 0.0, 1.8e7).expect("window");
        assert_eq!(windowed.ages(), &[1.0e6, 5.0e6, 2.0e7]);
    }

    #[test]
    fn flux_and_absorption_follow_the_kept_subset() {
        let library = grid_library();
        let filters = set(vec![tophat("mid", Frame::Rest, 3400.0, 5600.0)]);

        let windowed = window_to_filters(&library, &filters, 0.0, 1.8e7).expect("window");
        // Cell value is 100*z_index + 10*wave_index + age_index.
        assert_eq!(windowed.age_series(0, 0), &[20.0, 21.0, 22.0]);
        assert_eq!(windowed.age_series(1, 3), &[150.0, 151.0, 152.0]);
        let absorption = windowed.absorption().expect("curve kept");
        assert_eq!(absorption, &[0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn a_band_outside_the_grid_is_rejected() {
        let library = grid_library();
        let filters = set(vec![tophat("uv", Frame::Rest, 200.0, 900.0)]);

        let error = window_to_filters(&library, &filters, 0.0, 5.0e7).expect_err("no coverage");
        assert!(matches!(error, SynthesisError::FilterCoverage { .. }));
    }

    fn grid_library() -> TemplateLibrary {
        let metallicities = vec![0.001, 0.004];
        let wavelengths: Vec<f64> = (1..=9).map(|step| f64::from(step) * 1000.0).collect();
        let ages = vec![1.0e6, 5.0e6, 2.0e7, 5.0e7];
        let mut flux = Vec::new();
        for z in 0..metallicities.len() {
            for w in 0..wavelengths.len() {
                for a in 0..ages.len() {
                    flux.push((100 * z + 10 * w + a) as f64);
                }
            }
        }
        let absorption = (0..wavelengths.len()).map(|w| w as f64 / 10.0).collect();
        TemplateLibrary::new(metallicities, wavelengths, ages, flux, Some(absorption))
            .expect("consistent grid")
    }

    fn tophat(name: &str, frame: Frame, lo: f64, hi: f64) -> FilterCurve {
        FilterCurve {
            name: name.to_owned(),
            frame,
            wavelengths: vec![lo, hi],
            response: vec![1.0, 1.0],
        }
    }

    fn set(curves: Vec<FilterCurve>) -> FilterSet {
        FilterSet::from_curves(curves).expect("valid curves")
    }
}
