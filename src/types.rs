//! Physical constants and unit helpers for the cascade core.

use std::f64::consts::PI;

// Physical constants (SI units)

/// Gravitational constant (m³·kg⁻¹·s⁻²)
pub const G: f64 = 6.67430e-11;

/// Speed of light in vacuum (m/s)
pub const C_LIGHT: f64 = 2.99792458e8;

/// Stefan-Boltzmann constant (W·m⁻²·K⁻⁴)
pub const SIGMA_SB: f64 = 5.670374419e-8;

/// Mass of Mars (kg)
pub const M_MARS: f64 = 6.4171e23;

/// Radius of Mars (m)
pub const R_MARS: f64 = 3.3895e6;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Seconds per Julian year
pub const SECONDS_PER_YEAR: f64 = 365.25 * SECONDS_PER_DAY;

/// Mass of a homogeneous sphere: m = (4π/3) ρ s³
#[inline]
pub fn sphere_mass(radius: f64, density: f64) -> f64 {
    (4.0 / 3.0) * PI * density * radius * radius * radius
}

/// Radius of a homogeneous sphere of the given mass (inverse of [`sphere_mass`]).
#[inline]
pub fn sphere_radius(mass: f64, density: f64) -> f64 {
    if mass <= 0.0 || density <= 0.0 {
        return 0.0;
    }
    (3.0 * mass / (4.0 * PI * density)).cbrt()
}

/// Keplerian angular velocity Ω = sqrt(GM/r³) about a central mass.
#[inline]
pub fn keplerian_omega(central_mass: f64, radius: f64) -> f64 {
    if radius <= 0.0 {
        return 0.0;
    }
    (G * central_mass / radius.powi(3)).sqrt()
}
