//! Independent spatial cells stepped in parallel.
//!
//! Cells share the integrator (grid, strength law, settings) read-only and
//! own their population and forcing, so stepping needs no synchronization.

use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::integrator::{CascadeIntegrator, StepForcing, StepReport};
use crate::psd::PsdState;

/// One spatial cell: its population and the forcing of the current outer step.
#[derive(Clone, Debug)]
pub struct Cell {
    pub psd: PsdState,
    pub forcing: StepForcing,
}

impl Cell {
    pub fn new(psd: PsdState, forcing: StepForcing) -> Self {
        Self { psd, forcing }
    }
}

/// Collection of independent cells, e.g. radial annuli of a disk.
#[derive(Clone, Debug, Default)]
pub struct CellSet {
    cells: Vec<Cell>,
}

impl CellSet {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Step every cell by `dt`, failing on the first cell error.
    ///
    /// Cells that succeeded before the failure keep their advanced state.
    pub fn step_all(&mut self, integrator: &CascadeIntegrator, dt: f64) -> Result<Vec<StepReport>> {
        let reports = self
            .cells
            .par_iter_mut()
            .map(|cell| integrator.step(&mut cell.psd, &cell.forcing, dt))
            .collect::<Result<Vec<_>>>()?;
        info!(cells = reports.len(), dt, "all cells stepped");
        Ok(reports)
    }

    /// Step every cell by `dt`, keeping per-cell outcomes.
    pub fn step_each(&mut self, integrator: &CascadeIntegrator, dt: f64) -> Vec<Result<StepReport>> {
        self.cells
            .par_iter_mut()
            .map(|cell| integrator.step(&mut cell.psd, &cell.forcing, dt))
            .collect()
    }

    /// Total areal mass per cell (kg/m²).
    pub fn masses(&self, integrator: &CascadeIntegrator) -> Vec<f64> {
        self.cells
            .iter()
            .map(|cell| cell.psd.total_mass(integrator.grid()))
            .collect()
    }
}
