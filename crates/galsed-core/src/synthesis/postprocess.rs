//! Output-mode post-processing of the reduced flux rows.

use crate::common::constants::jansky_to_ab_magnitude;
use crate::domain::{OutputMode, SynthesisResult};
use crate::numerics::linear_fit;

/// Applies the output mode to every reduced row.
///
/// Magnitude mode converts each channel to an AB magnitude. Slope-fit mode
/// regresses log flux against log wavelength over the first `n - 1`
/// channels, appends slope, intercept, and correlation columns, and
/// converts the last flux channel to a magnitude; the leading channels stay
/// in Jansky for the caller's own continuum work.
pub(crate) fn finalize(
    mut rows: Vec<Vec<f64>>,
    mode: OutputMode,
    log_wavelengths: &[f64],
) -> SynthesisResult<Vec<Vec<f64>>> {
    match mode {
        OutputMode::Flux => {}
        OutputMode::Magnitudes => {
            for row in &mut rows {
                for value in row.iter_mut() {
                    *value = jansky_to_ab_magnitude(*value);
                }
            }
        }
        OutputMode::SlopeFit => {
            for row in &mut rows {
                let channels = row.len();
                debug_assert_eq!(log_wavelengths.len(), channels);
                let fitted = channels - 1;
                let log_flux: Vec<f64> = row[..fitted].iter().map(|flux| flux.ln()).collect();
                let fit = linear_fit(&log_wavelengths[..fitted], &log_flux)?;
                row[fitted] = jansky_to_ab_magnitude(row[fitted]);
                row.push(fit.slope);
                row.push(fit.intercept);
                row.push(fit.correlation);
            }
        }
    }
    Ok(rows)
}
