pub mod errors;

pub use errors::{ErrorCategory, SynthesisError, SynthesisResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Post-processing applied to the reduced flux rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Every channel converted to an AB magnitude.
    Magnitudes,
    /// Raw channel fluxes in Jansky.
    Flux,
    /// Flux channels plus fitted UV slope columns; the last flux channel is
    /// still converted to a magnitude.
    SlopeFit,
}

impl OutputMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Magnitudes => "magnitudes",
            Self::Flux => "flux",
            Self::SlopeFit => "slope_fit",
        }
    }
}

impl Display for OutputMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Reference frame of spectrum channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    #[default]
    Rest,
    Observed,
}

impl Frame {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Observed => "observed",
        }
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One quantum of star formation: a simple stellar population born inside a
/// single age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Burst {
    /// Age bucket the burst falls into, counted back from the output epoch.
    pub age_index: usize,
    /// Stellar mass fraction of metals at formation.
    pub metallicity: f64,
    /// Star formation rate, solar masses per year.
    pub sfr: f64,
}

/// Composite stellar population of one galaxy: its bursts in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarFormationHistory {
    pub bursts: Vec<Burst>,
}

impl StarFormationHistory {
    pub fn new(bursts: Vec<Burst>) -> Self {
        Self { bursts }
    }

    /// True when no burst carries a positive star formation rate.
    pub fn is_silent(&self) -> bool {
        !self.bursts.iter().any(|burst| burst.sfr > 0.0)
    }
}

/// Two-component power-law attenuation parameters of one galaxy.
///
/// Each component attenuates by `exp(-tau * (wavelength / 1600 AA)^exponent)`;
/// the birth-cloud component applies only to populations younger than the
/// run-level birth-cloud lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DustParams {
    pub tau_uv_ism: f64,
    pub ism_exponent: f64,
    pub tau_uv_birth_cloud: f64,
    pub birth_cloud_exponent: f64,
}

impl DustParams {
    pub(crate) fn is_finite(&self) -> bool {
        self.tau_uv_ism.is_finite()
            && self.ism_exponent.is_finite()
            && self.tau_uv_birth_cloud.is_finite()
            && self.birth_cloud_exponent.is_finite()
    }
}

/// Per-run dust model: one shared birth-cloud lifetime plus per-galaxy
/// attenuation parameters, ordered like the galaxy list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustModel {
    /// Age below which a population is still embedded in its birth cloud, yr.
    pub birth_cloud_age: f64,
    pub galaxies: Vec<DustParams>,
}

/// Read-only merger tree relations, indexed `[snapshot][galaxy]`.
///
/// Progenitor links hold a galaxy index or a negative sentinel for "none":
/// `first_progenitor` points into the previous snapshot, `next_progenitor`
/// into the same snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergerTreeTables {
    pub first_progenitor: Vec<Vec<i32>>,
    pub next_progenitor: Vec<Vec<i32>>,
    pub sfr: Vec<Vec<f64>>,
    pub metallicity: Vec<Vec<f64>>,
}

impl MergerTreeTables {
    pub fn snapshot_count(&self) -> usize {
        self.sfr.len()
    }

    pub fn galaxy_count(&self, snapshot: usize) -> usize {
        self.sfr.get(snapshot).map_or(0, Vec::len)
    }

    /// Checks that the four tables agree on shape and that every progenitor
    /// link lands inside its target snapshot.
    pub fn validate(&self) -> SynthesisResult<()> {
        let snapshots = self.sfr.len();
        if self.first_progenitor.len() != snapshots
            || self.next_progenitor.len() != snapshots
            || self.metallicity.len() != snapshots
        {
            return Err(SynthesisError::TreeShape {
                snapshots,
                first_progenitor: self.first_progenitor.len(),
                next_progenitor: self.next_progenitor.len(),
                metallicity: self.metallicity.len(),
            });
        }

        for snapshot in 0..snapshots {
            let galaxies = self.sfr[snapshot].len();
            if self.first_progenitor[snapshot].len() != galaxies
                || self.next_progenitor[snapshot].len() != galaxies
                || self.metallicity[snapshot].len() != galaxies
            {
                return Err(SynthesisError::TreeRowShape { snapshot, galaxies });
            }

            for galaxy in 0..galaxies {
                let first = self.first_progenitor[snapshot][galaxy];
                if first >= 0 {
                    let target = snapshot.checked_sub(1);
                    let in_bounds =
                        target.is_some_and(|prev| (first as usize) < self.sfr[prev].len());
                    if !in_bounds {
                        return Err(SynthesisError::TreeLink {
                            relation: "first_progenitor",
                            snapshot,
                            galaxy,
                            link: first,
                        });
                    }
                }
                let next = self.next_progenitor[snapshot][galaxy];
                if next >= 0 && next as usize >= galaxies {
                    return Err(SynthesisError::TreeLink {
                        relation: "next_progenitor",
                        snapshot,
                        galaxy,
                        link: next,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Burst, Frame, MergerTreeTables, OutputMode, StarFormationHistory, SynthesisError};

    #[test]
    fn output_mode_names_are_stable() {
        assert_eq!(OutputMode::Magnitudes.to_string(), "magnitudes");
        assert_eq!(OutputMode::Flux.to_string(), "flux");
        assert_eq!(OutputMode::SlopeFit.to_string(), "slope_fit");
        assert_eq!(Frame::Observed.to_string(), "observed");
    }

    #[test]
    fn silent_history_detection_ignores_zero_rate_bursts() {
        let silent = StarFormationHistory::new(vec![Burst {
            age_index: 0,
            metallicity: 0.004,
            sfr: 0.0,
        }]);
        assert!(silent.is_silent());
        assert!(StarFormationHistory::default().is_silent());

        let active = StarFormationHistory::new(vec![Burst {
            age_index: 1,
            metallicity: 0.004,
            sfr: 0.5,
        }]);
        assert!(!active.is_silent());
    }

    #[test]
    fn tree_validation_accepts_a_consistent_forest() {
        let tables = MergerTreeTables {
            first_progenitor: vec![vec![-1, -1], vec![0, 1]],
            next_progenitor: vec![vec![1, -1], vec![-1, -1]],
            sfr: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            metallicity: vec![vec![0.001, 0.002], vec![0.003, 0.004]],
        };
        tables.validate().expect("consistent tables");
    }

    #[test]
    fn tree_validation_rejects_a_dangling_first_progenitor() {
        let tables = MergerTreeTables {
            first_progenitor: vec![vec![-1], vec![5]],
            next_progenitor: vec![vec![-1], vec![-1]],
            sfr: vec![vec![0.1], vec![0.2]],
            metallicity: vec![vec![0.001], vec![0.002]],
        };
        let error = tables.validate().expect_err("dangling link");
        assert!(matches!(
            error,
            SynthesisError::TreeLink {
                relation: "first_progenitor",
                snapshot: 1,
                galaxy: 0,
                link: 5,
            }
        ));
    }

    #[test]
    fn tree_validation_rejects_a_first_progenitor_at_snapshot_zero() {
        let tables = MergerTreeTables {
            first_progenitor: vec![vec![0]],
            next_progenitor: vec![vec![-1]],
            sfr: vec![vec![0.1]],
            metallicity: vec![vec![0.001]],
        };
        let error = tables.validate().expect_err("no earlier snapshot");
        assert!(matches!(error, SynthesisError::TreeLink { snapshot: 0, .. }));
    }
}
