use std::path::PathBuf;

use crate::numerics::{RegressionError, TabularError};

pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Coarse failure classes, each with a stable process exit code so callers
/// can tell bad inputs from broken files from numerical failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InputValidation,
    IoSystem,
    Computation,
    Internal,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidation",
            Self::IoSystem => "IoSystem",
            Self::Computation => "Computation",
            Self::Internal => "Internal",
        }
    }
}

/// Every failure the synthesis stack can report.
///
/// File-level variants carry the offending path; in-memory validation
/// variants carry the offending indices and values instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("failed to {action} '{path}': {message}")]
    Io {
        action: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("manifest '{path}' is not valid JSON: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error("binary table '{path}' is truncated at byte {offset}")]
    Truncated { path: PathBuf, offset: usize },
    #[error("binary table '{path}' holds {actual} bytes where {expected} were declared")]
    TrailingBytes {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("axis '{axis}' must hold at least {minimum} values, got {actual}")]
    AxisTooShort {
        axis: &'static str,
        minimum: usize,
        actual: usize,
    },
    #[error("axis '{axis}' must be strictly increasing, index {index} has {current} after {previous}")]
    AxisOrder {
        axis: &'static str,
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("axis '{axis}' must contain finite values, index {index} got {value}")]
    AxisValue {
        axis: &'static str,
        index: usize,
        value: f64,
    },
    #[error(
        "template grid holds {values} values, axes demand {metallicities} x {wavelengths} x {ages}"
    )]
    GridSize {
        metallicities: usize,
        wavelengths: usize,
        ages: usize,
        values: usize,
    },
    #[error("absorption curve holds {actual} values for {wavelengths} wavelengths")]
    AbsorptionSize { wavelengths: usize, actual: usize },

    #[error("filter '{name}' pairs {wavelengths} wavelengths with {responses} responses")]
    FilterShape {
        name: String,
        wavelengths: usize,
        responses: usize,
    },
    #[error("filter '{name}' needs at least 2 samples, got {samples}")]
    FilterTooShort { name: String, samples: usize },
    #[error(
        "filter '{name}' wavelengths must be strictly increasing, index {index} has {current} after {previous}"
    )]
    FilterOrder {
        name: String,
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("filter '{name}' band [{band_lo}, {band_hi}] leaves the template grid [{grid_lo}, {grid_hi}]")]
    FilterCoverage {
        name: String,
        band_lo: f64,
        band_hi: f64,
        grid_lo: f64,
        grid_hi: f64,
    },
    #[error("filter '{name}' response must be finite and non-negative, index {index} got {value}")]
    FilterResponse {
        name: String,
        index: usize,
        value: f64,
    },
    #[error("filter '{name}' response is zero everywhere")]
    FilterFlat { name: String },
    #[error("filter set is empty")]
    FilterSetEmpty,
    #[error("observed-frame output needs an absorption curve in the template library")]
    AbsorptionMissing,

    #[error("redshift must be finite and non-negative, got {value}")]
    Redshift { value: f64 },
    #[error("age bucket {index} ends at {boundary}, beyond the last template age {age_limit}")]
    BucketBeyondAges {
        index: usize,
        boundary: f64,
        age_limit: f64,
    },

    #[error("galaxy {galaxy} burst {burst} carries a non-finite or negative value")]
    BurstValue { galaxy: usize, burst: usize },
    #[error("galaxy {galaxy} burst {burst} sits in age bucket {age_index}, run has {buckets}")]
    AgeIndexRange {
        galaxy: usize,
        burst: usize,
        age_index: usize,
        buckets: usize,
    },
    #[error("galaxy {galaxy} merger tree exceeds {limit} star-forming nodes")]
    BurstCapacity { galaxy: usize, limit: usize },
    #[error("dust model lists {dust} galaxies where the run has {histories}")]
    DustCount { histories: usize, dust: usize },
    #[error("galaxy {galaxy} dust parameters must be finite")]
    DustValue { galaxy: usize },
    #[error("birth cloud age must be finite and non-negative, got {value}")]
    BirthCloudAge { value: f64 },
    #[error("slope fit needs at least 3 flux channels, got {channels}")]
    SlopeChannels { channels: usize },

    #[error(
        "merger tree tables disagree on snapshot count: sfr={snapshots}, first_progenitor={first_progenitor}, next_progenitor={next_progenitor}, metallicity={metallicity}"
    )]
    TreeShape {
        snapshots: usize,
        first_progenitor: usize,
        next_progenitor: usize,
        metallicity: usize,
    },
    #[error("merger tree tables disagree on galaxy count at snapshot {snapshot} ({galaxies} in sfr)")]
    TreeRowShape { snapshot: usize, galaxies: usize },
    #[error("{relation} link {link} of galaxy {galaxy} at snapshot {snapshot} leaves its target snapshot")]
    TreeLink {
        relation: &'static str,
        snapshot: usize,
        galaxy: usize,
        link: i32,
    },
    #[error("target snapshot {snapshot} is outside the {snapshots}-snapshot tree")]
    TreeSnapshotRange { snapshot: usize, snapshots: usize },
    #[error("galaxy {galaxy} is outside snapshot {snapshot} ({galaxies} galaxies)")]
    TreeGalaxyRange {
        snapshot: usize,
        galaxy: usize,
        galaxies: usize,
    },

    #[error(transparent)]
    Table(#[from] TabularError),
    #[error(transparent)]
    Regression(#[from] RegressionError),
    #[error("worker pool could not be built: {message}")]
    ThreadPool { message: String },
}

impl SynthesisError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } | Self::Truncated { .. } | Self::TrailingBytes { .. } => {
                ErrorCategory::IoSystem
            }
            Self::Table(_) | Self::Regression(_) => ErrorCategory::Computation,
            Self::ThreadPool { .. } => ErrorCategory::Internal,
            _ => ErrorCategory::InputValidation,
        }
    }

    pub const fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}
