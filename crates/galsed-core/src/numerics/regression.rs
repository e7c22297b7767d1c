#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegressionError {
    #[error("linear fit requires at least 2 points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("linear fit length mismatch: abscissas={abscissas}, ordinates={ordinates}")]
    LengthMismatch { abscissas: usize, ordinates: usize },
    #[error("linear fit vector '{field}' must contain finite values, index {index} got {value}")]
    NonFiniteValue {
        field: &'static str,
        index: usize,
        value: f64,
    },
    #[error("linear fit abscissas have zero spread around {value}")]
    ZeroSpread { value: f64 },
}

/// Least-squares line through `(xs, ys)`. The correlation coefficient is
/// reported as zero when the ordinates have no spread.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Result<LineFit, RegressionError> {
    if xs.len() < 2 {
        return Err(RegressionError::InsufficientPoints { actual: xs.len() });
    }
    if ys.len() != xs.len() {
        return Err(RegressionError::LengthMismatch {
            abscissas: xs.len(),
            ordinates: ys.len(),
        });
    }
    validate_vector("abscissas", xs)?;
    validate_vector("ordinates", ys)?;

    let count = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / count;
    let mean_y = ys.iter().sum::<f64>() / count;

    let mut spread_xx = 0.0;
    let mut spread_xy = 0.0;
    let mut spread_yy = 0.0;
    for (x, y) in xs.iter().copied().zip(ys.iter().copied()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        spread_xx += dx * dx;
        spread_xy += dx * dy;
        spread_yy += dy * dy;
    }

    if spread_xx == 0.0 {
        return Err(RegressionError::ZeroSpread { value: mean_x });
    }

    let slope = spread_xy / spread_xx;
    let intercept = mean_y - slope * mean_x;
    let correlation = if spread_yy > 0.0 {
        spread_xy / (spread_xx * spread_yy).sqrt()
    } else {
        0.0
    };

    Ok(LineFit {
        slope,
        intercept,
        correlation,
    })
}

fn validate_vector(field: &'static str, values: &[f64]) -> Result<(), RegressionError> {
    for (index, value) in values.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(RegressionError::NonFiniteValue {
                field,
                index,
                value,
            });
        }
    }

    Ok(())
}
