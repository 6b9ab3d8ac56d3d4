//! C4 — Power Flow Core: six solvers sharing one result type and one
//! options struct, plus the HELM embedding method and the Zhao PV/PQ
//! switching policy that wraps any of the iterative solvers.

pub mod common;
pub mod dc;
pub mod fast_decoupled;
pub mod gauss_seidel;
pub mod helm;
pub mod jacobian;
pub mod lm;
pub mod newton;
pub mod switching;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{Logger, SolverError};

/// Knobs shared by every iterative AC solver. Not every field applies to
/// every method — DC flow ignores everything but `distribute_slack`, HELM
/// ignores `acceleration_factor` — unused fields are simply not read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerFlowOptions {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Newton-Raphson backtracking acceleration factor, `alpha` in the
    /// spec's line-search loop. Default `0.05`.
    pub acceleration_factor: f64,
    pub distribute_slack: bool,
    /// Use Padé/Wynn-epsilon acceleration on the HELM coefficient series
    /// instead of plain summation.
    pub use_pade: bool,
    /// Maximum HELM coefficient order to compute before giving up.
    pub max_coeff: usize,
    /// Enable the Zhao PV/PQ switching pass between outer iterations.
    pub enforce_q_limits: bool,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        Self {
            max_iter: 25,
            tolerance: 1e-8,
            acceleration_factor: 0.05,
            distribute_slack: false,
            use_pade: true,
            max_coeff: 30,
            enforce_q_limits: true,
        }
    }
}

/// Common result shape returned by every solver in this module: the
/// converged (or best-effort) complex bus voltages, convergence status,
/// and a log of anything the solver judged worth surfacing (Q-limit
/// switches, backtracking retries exhausted, islands skipped, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericPowerFlowResults {
    pub voltage: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
    pub logger: Logger,
}

impl NumericPowerFlowResults {
    pub fn diverged(voltage: Vec<Complex64>, iterations: usize, max_mismatch: f64, logger: Logger) -> Self {
        Self { voltage, converged: false, iterations, max_mismatch, logger }
    }
}

pub type PowerFlowResult = Result<NumericPowerFlowResults, SolverError>;
