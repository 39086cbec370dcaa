//! Smolcascade - size-resolved collisional cascade core
//!
//! Evolves the particle size distribution of a debris disk cell under
//! collisional fragmentation, radiation-pressure blow-out and external
//! sources and sinks, using a mass-checked IMEX integrator.

pub mod cells;
pub mod collision;
pub mod dynamics;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod loss;
pub mod psd;
pub mod radiation;
pub mod strength;
pub mod types;

pub use error::{CascadeError, Result};

#[cfg(test)]
pub mod test_utils;
