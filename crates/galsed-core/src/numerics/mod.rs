pub mod regression;
pub mod tabular;

pub use regression::{LineFit, RegressionError, linear_fit};
pub use tabular::{TabularError, integrate_filter, integrate_trapezoid, interpolate};
