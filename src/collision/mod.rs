//! Pairwise collision physics.
//!
//! Two pieces feed the integrator:
//! - [`kernel`]: how often bins `i` and `j` collide, `C_ij`
//! - [`fragments`]: where the colliding mass ends up, `Y[k; i, j]`

pub mod fragments;
pub mod kernel;

pub use fragments::{
    CATASTROPHIC_THRESHOLD, CollisionRates, CollisionRegime, FragmentConfig, FragmentTensor,
    largest_remnant_fraction, specific_impact_energy,
};
pub use kernel::{CollisionMatrix, build_collision_matrix};
