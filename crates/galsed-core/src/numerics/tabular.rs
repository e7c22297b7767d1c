#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TabularError {
    #[error("table requires at least 2 grid points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("table length mismatch: grid={grid}, values={values}")]
    LengthMismatch { grid: usize, values: usize },
    #[error(
        "table grid must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingGrid {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("table vector '{field}' must contain finite values, index {index} got {value}")]
    NonFiniteValue {
        field: &'static str,
        index: usize,
        value: f64,
    },
    #[error("interpolation target {value} is outside the table domain [{lower}, {upper}]")]
    OutOfRange { value: f64, lower: f64, upper: f64 },
    #[error("integration bound {bound} is outside the table domain [{lower}, {upper}]")]
    BoundOutsideTable { bound: f64, lower: f64, upper: f64 },
    #[error("integration bounds are inverted: lower {lower} exceeds upper {upper}")]
    InvertedBounds { lower: f64, upper: f64 },
}

/// Linear interpolation on a strictly increasing grid. Exact grid hits return
/// the tabulated value; targets outside the grid domain are rejected.
pub fn interpolate(target: f64, grid: &[f64], values: &[f64]) -> Result<f64, TabularError> {
    validate_table(grid, values)?;

    let lower = grid[0];
    let upper = grid[grid.len() - 1];
    if !target.is_finite() || target < lower || target > upper {
        return Err(TabularError::OutOfRange {
            value: target,
            lower,
            upper,
        });
    }

    match grid.binary_search_by(|probe| probe.total_cmp(&target)) {
        Ok(index) => Ok(values[index]),
        Err(insertion) => {
            // In-domain and not an exact hit, so 1 <= insertion <= len - 1.
            let hi = insertion;
            let lo = hi - 1;
            let fraction = (target - grid[lo]) / (grid[hi] - grid[lo]);
            Ok(values[lo] + fraction * (values[hi] - values[lo]))
        }
    }
}

/// Trapezoid integral of tabulated `(grid, values)` over `[lower, upper]`.
/// Partial first and last intervals are closed by linear interpolation of the
/// boundary value; `lower == upper` yields zero.
pub fn integrate_trapezoid(
    values: &[f64],
    grid: &[f64],
    lower: f64,
    upper: f64,
) -> Result<f64, TabularError> {
    validate_table(grid, values)?;

    let domain_lo = grid[0];
    let domain_hi = grid[grid.len() - 1];
    for bound in [lower, upper] {
        if !bound.is_finite() || bound < domain_lo || bound > domain_hi {
            return Err(TabularError::BoundOutsideTable {
                bound,
                lower: domain_lo,
                upper: domain_hi,
            });
        }
    }
    if lower > upper {
        return Err(TabularError::InvertedBounds { lower, upper });
    }
    if lower == upper {
        return Ok(0.0);
    }

    let start = interval_below(grid, lower);
    let value_at_lower = lerp_in_interval(grid, values, start, lower);
    if upper <= grid[start + 1] {
        let value_at_upper = lerp_in_interval(grid, values, start, upper);
        return Ok(0.5 * (value_at_lower + value_at_upper) * (upper - lower));
    }

    let mut area = 0.5 * (value_at_lower + values[start + 1]) * (grid[start + 1] - lower);
    let mut segment = start + 1;
    while grid[segment + 1] < upper {
        area += 0.5 * (values[segment] + values[segment + 1]) * (grid[segment + 1] - grid[segment]);
        segment += 1;
    }
    let value_at_upper = lerp_in_interval(grid, values, segment, upper);
    area += 0.5 * (values[segment] + value_at_upper) * (upper - grid[segment]);

    Ok(area)
}

/// Trapezoid integral of the pointwise product `response * values` over the
/// full shared grid; the broadband flux of a spectrum through a filter curve.
pub fn integrate_filter(
    response: &[f64],
    values: &[f64],
    grid: &[f64],
) -> Result<f64, TabularError> {
    validate_table(grid, response)?;
    if values.len() != grid.len() {
        return Err(TabularError::LengthMismatch {
            grid: grid.len(),
            values: values.len(),
        });
    }
    validate_vector("values", values)?;

    let mut area = 0.0;
    let mut left = response[0] * values[0];
    for segment in 1..grid.len() {
        let right = response[segment] * values[segment];
        area += 0.5 * (left + right) * (grid[segment] - grid[segment - 1]);
        left = right;
    }

    Ok(area)
}

fn validate_table(grid: &[f64], values: &[f64]) -> Result<(), TabularError> {
    let grid_len = grid.len();
    if grid_len < 2 {
        return Err(TabularError::InsufficientPoints { actual: grid_len });
    }
    if values.len() != grid_len {
        return Err(TabularError::LengthMismatch {
            grid: grid_len,
            values: values.len(),
        });
    }

    for (index, point) in grid.iter().copied().enumerate() {
        if !point.is_finite() {
            return Err(TabularError::NonFiniteValue {
                field: "grid",
                index,
                value: point,
            });
        }
        if index > 0 {
            let previous = grid[index - 1];
            if point <= previous {
                return Err(TabularError::NonIncreasingGrid {
                    index,
                    previous,
                    current: point,
                });
            }
        }
    }

    validate_vector("values", values)
}

fn validate_vector(field: &'static str, values: &[f64]) -> Result<(), TabularError> {
    for (index, value) in values.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(TabularError::NonFiniteValue {
                field,
                index,
                value,
            });
        }
    }

    Ok(())
}

/// Index of the grid interval whose left edge sits at or below `target`,
/// clamped so the interval `[i, i + 1]` stays inside the grid.
fn interval_below(grid: &[f64], target: f64) -> usize {
    match grid.binary_search_by(|probe| probe.total_cmp(&target)) {
        Ok(index) => index.min(grid.len() - 2),
        Err(insertion) => insertion - 1,
    }
}

fn lerp_in_interval(grid: &[f64], values: &[f64], interval: usize, target: f64) -> f64 {
    let width = grid[interval + 1] - grid[interval];
    let fraction = (target - grid[interval]) / width;
    values[interval] + fraction * (values[interval + 1] - values[interval])
}

#[cfg(test)]
mod tests {
    use super::{TabularError, integrate_filter, integrate_trapezoid, interpolate};

    #[test]
    fn interpolate_returns_exact_grid_point_values() {
        let grid = [1.0, 2.5, 4.0, 7.0];
        let values = [10.0, -3.0, 0.5, 2.0];

        for (point, value) in grid.iter().zip(values.iter()) {
            let actual = interpolate(*point, &grid, &values).expect("in-domain target");
            assert_eq!(actual, *value);
        }
    }

    #[test]
    fn interpolate_matches_linear_segments_between_points() {
        let grid = [0.0, 1.0, 3.0, 6.0];
        let values: Vec<f64> = grid.iter().map(|x| 2.0 * x - 1.0).collect();

        for target in [0.25, 0.9, 1.7, 2.999, 4.5, 5.9] {
            let actual = interpolate(target, &grid, &values).expect("in-domain target");
            assert_scalar_close("linear segment", 2.0 * target - 1.0, actual, 1.0e-12, 1.0e-12);
        }
    }

    #[test]
    fn interpolate_rejects_targets_outside_the_domain() {
        let grid = [1.0, 2.0, 3.0];
        let values = [0.0, 1.0, 4.0];

        for target in [0.999, 3.001, f64::NAN] {
            let error = interpolate(target, &grid, &values).expect_err("target outside domain");
            assert!(matches!(error, TabularError::OutOfRange { .. }));
        }
    }

    #[test]
    fn interpolate_rejects_non_increasing_grid() {
        let grid = [1.0, 2.0, 2.0, 3.0];
        let values = [0.0; 4];

        let error = interpolate(1.5, &grid, &values).expect_err("duplicate grid point");
        assert_eq!(
            error,
            TabularError::NonIncreasingGrid {
                index: 2,
                previous: 2.0,
                current: 2.0,
            }
        );
    }

    #[test]
    fn trapezoid_matches_analytic_integral_of_a_line() {
        let grid = [0.0, 0.7, 1.1, 2.0, 3.5, 5.0];
        let values: Vec<f64> = grid.iter().map(|x| 2.0 * x + 1.0).collect();

        let actual = integrate_trapezoid(&values, &grid, 0.3, 4.2).expect("integration");
        let expected = line_integral(0.3, 4.2);
        assert_scalar_close("line integral", expected, actual, 1.0e-12, 1.0e-12);
    }

    #[test]
    fn trapezoid_integrates_within_a_single_interval() {
        let grid = [0.0, 10.0, 20.0];
        let values = [1.0, 3.0, 5.0];

        let actual = integrate_trapezoid(&values, &grid, 2.0, 6.0).expect("integration");
        // Between 2 and 6 the tabulated curve is the line 1 + 0.2 x.
        let expected = 0.5 * ((1.0 + 0.2 * 2.0) + (1.0 + 0.2 * 6.0)) * 4.0;
        assert_scalar_close("single interval", expected, actual, 1.0e-12, 1.0e-12);
    }

    #[test]
    fn trapezoid_is_additive_across_a_split_point() {
        let grid = [0.0, 1.0, 2.0, 4.0, 8.0];
        let values = [3.0, -1.0, 0.5, 2.0, 7.0];

        let whole = integrate_trapezoid(&values, &grid, 0.4, 7.3).expect("whole range");
        let first = integrate_trapezoid(&values, &grid, 0.4, 2.9).expect("first part");
        let second = integrate_trapezoid(&values, &grid, 2.9, 7.3).expect("second part");

        assert_scalar_close("additivity", whole, first + second, 1.0e-12, 1.0e-12);
    }

    #[test]
    fn trapezoid_returns_zero_for_degenerate_bounds() {
        let grid = [0.0, 1.0, 2.0];
        let values = [5.0, 6.0, 7.0];

        let actual = integrate_trapezoid(&values, &grid, 1.3, 1.3).expect("degenerate bounds");
        assert_eq!(actual, 0.0);
    }

    #[test]
    fn trapezoid_rejects_inverted_bounds() {
        let grid = [0.0, 1.0, 2.0];
        let values = [5.0, 6.0, 7.0];

        let error = integrate_trapezoid(&values, &grid, 1.5, 0.5).expect_err("inverted bounds");
        assert_eq!(
            error,
            TabularError::InvertedBounds {
                lower: 1.5,
                upper: 0.5,
            }
        );
    }

    #[test]
    fn trapezoid_rejects_bounds_outside_the_table() {
        let grid = [1.0, 2.0, 3.0];
        let values = [0.0, 0.0, 0.0];

        for (lower, upper) in [(0.5, 2.0), (1.5, 3.5)] {
            let error =
                integrate_trapezoid(&values, &grid, lower, upper).expect_err("bound outside table");
            assert!(matches!(error, TabularError::BoundOutsideTable { .. }));
        }
    }

    #[test]
    fn filter_integral_matches_constant_response_area() {
        let grid = [100.0, 150.0, 250.0, 400.0];
        let values: Vec<f64> = grid.iter().map(|x| 0.01 * x).collect();
        let response = [0.5; 4];

        let actual = integrate_filter(&response, &values, &grid).expect("filter integral");
        // 0.5 * integral of 0.01 x over [100, 400], exact for the trapezoid rule.
        let expected = 0.5 * 0.005 * (400.0_f64.powi(2) - 100.0_f64.powi(2));
        assert_scalar_close("constant response", expected, actual, 1.0e-9, 1.0e-12);
    }

    #[test]
    fn filter_integral_rejects_mismatched_lengths() {
        let grid = [100.0, 200.0, 300.0];
        let values = [1.0, 1.0];
        let response = [1.0, 1.0, 1.0];

        let error = integrate_filter(&response, &values, &grid).expect_err("length mismatch");
        assert_eq!(
            error,
            TabularError::LengthMismatch {
                grid: 3,
                values: 2,
            }
        );
    }

    fn line_integral(lower: f64, upper: f64) -> f64 {
        // Antiderivative of 2x + 1.
        (upper * upper + upper) - (lower * lower + lower)
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
