//! Photometric conversion constants shared across the synthesis stages.
//!
//! Template fluxes enter as erg/s/AA per solar mass of stars formed;
//! everything downstream works in Jansky at the 10 pc reference distance.

/// Surface area of a sphere of radius 10 pc, `4 pi (10 pc)^2`, in cm^2.
pub const TEN_PARSEC_SPHERE_CM2: f64 = 1.1965e40;

/// Per-wavelength to per-frequency prefactor, `1e23 / c` with c in AA/s.
pub const JANSKY_PREFACTOR: f64 = 3.34e4;

/// AB magnitude zero point for fluxes expressed in Jansky.
pub const AB_ZERO_POINT: f64 = 8.9;

/// Floor for accumulated fluxes; keeps magnitudes finite for galaxies whose
/// history carries no star formation.
pub const FLUX_FLOOR: f64 = 1e-30;

/// One metallicity bin spans 0.001 in stellar mass fraction.
pub const METALLICITY_BINS_PER_UNIT: f64 = 1000.0;

/// Pivot wavelength of the dust attenuation power law, in AA.
pub const ATTENUATION_PIVOT_ANGSTROM: f64 = 1600.0;

/// Hard cap on the bursts emitted while flattening one merger tree.
pub const MAX_TREE_BURSTS: usize = 100_000;

/// Convert an erg/s/AA luminosity density at wavelength `wavelength_angstrom`
/// to Jansky as observed from 10 pc.
pub fn luminosity_to_jansky(wavelength_angstrom: f64, luminosity: f64) -> f64 {
    JANSKY_PREFACTOR * wavelength_angstrom * wavelength_angstrom * luminosity
        / TEN_PARSEC_SPHERE_CM2
}

/// AB magnitude of a flux in Jansky.
pub fn jansky_to_ab_magnitude(flux: f64) -> f64 {
    -2.5 * flux.log10() + AB_ZERO_POINT
}

/// Flux in Jansky of an AB magnitude.
pub fn ab_magnitude_to_jansky(magnitude: f64) -> f64 {
    10.0_f64.powf((AB_ZERO_POINT - magnitude) / 2.5)
}
