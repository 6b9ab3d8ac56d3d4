//! Numerical core for steady-state power-system analysis.
//!
//! Pipeline, leaves first: [`circuit`] compiles a grid snapshot into an
//! immutable [`circuit::NumericalCircuit`]; [`admittance`] assembles `Ybus`
//! and its DC/fast-decoupled/sequence variants from it; [`indices`]
//! classifies buses into `pq`/`pv`/`vd` sets; [`powerflow`] solves the
//! nonlinear (and DC/HELM) power-flow problem; [`linear_analysis`] derives
//! PTDF/LODF sensitivities; [`contingency`] composes N-k outages from those
//! sensitivities; [`reduction`] builds Ward equivalents and the generator
//! relocation + DC inverse power-flow step on top of them.

pub mod admittance;
pub mod circuit;
pub mod contingency;
pub mod error;
pub mod indices;
pub mod linear_analysis;
pub mod powerflow;
pub mod reduction;
pub mod solver;
pub mod sparse;

pub mod prelude {
    pub use crate::admittance::{AdmittanceMatrices, FastDecoupledAdmittanceMatrices, LinearAdmittanceMatrices, SeriesAdmittanceMatrices};
    pub use crate::circuit::{
        BranchKind, BranchRecord, BusRecord, BusType, ContingencyGroup, ContingencyOp, ContingencyRecord, GeneratorRecord, GridSnapshot,
        LoadRecord, NumericalCircuit, ShuntRecord,
    };
    pub use crate::contingency::{ContingencyIndices, LinearMultiContingencies, LinearMultiContingency};
    pub use crate::error::{CompileError, LogEntry, Logger, Severity, SolverError};
    pub use crate::indices::SimulationIndices;
    pub use crate::linear_analysis::{make_acptdf, make_lodf, make_ptdf, make_transfer_limits, LinearAnalysisResult};
    pub use crate::powerflow::helm::{helm_coefficients_dy, HelmPreparation};
    pub use crate::powerflow::switching::solve_with_switching;
    pub use crate::powerflow::{NumericPowerFlowResults, PowerFlowOptions, PowerFlowResult};
    pub use crate::reduction::{dc_inverse_pf_redistribution, relocate_generators, ward_reduce, DcInversePf, EquivElements};
    pub use crate::solver::Solve;
}
