//! C5 — Linear Analysis: DC/AC PTDF, LODF, and transfer limits, driven
//! per-island the way `linear_analysis.py`'s `LinearAnalysis` class does.

pub mod lodf;
pub mod ptdf;
pub mod transfer_limits;

pub use lodf::make_lodf;
pub use ptdf::{make_acptdf, make_ptdf};
pub use transfer_limits::make_transfer_limits;

use nalgebra::DMatrix;

use crate::admittance::LinearAdmittanceMatrices;
use crate::circuit::NumericalCircuit;
use crate::error::Logger;
use crate::solver::Solve;

/// Full-system PTDF/LODF, scattered back from whichever islands could be
/// analyzed. Islands skipped for having zero or multiple slack buses
/// leave their rows/columns at zero; check `logger` for which.
#[derive(Debug, Clone)]
pub struct LinearAnalysisResult {
    pub ptdf: DMatrix<f64>,
    pub lodf: DMatrix<f64>,
}

/// Runs DC PTDF/LODF on every island of `circuit` independently, skipping
/// (with a logged warning, never a panic) any island that doesn't have
/// exactly one slack bus — the only case `make_ptdf`'s single `Bred`
/// solve is well-posed for.
pub fn run<S: Solve>(circuit: &NumericalCircuit, distribute_slack: bool, correct_values: bool, solver: &mut S) -> (LinearAnalysisResult, Logger) {
    let mut logger = Logger::new();
    let mut full_ptdf = DMatrix::<f64>::zeros(circuit.n_branch(), circuit.n_bus);
    let mut full_lodf = DMatrix::<f64>::zeros(circuit.n_branch(), circuit.n_branch());

    for (island_idx, island) in circuit.split_into_islands().iter().enumerate() {
        let indices = island.simulation_indices();
        if indices.vd.is_empty() {
            logger.warn_island(island_idx, "no slack bus, skipping linear analysis");
            continue;
        }
        if indices.vd.len() > 1 {
            logger.warn_island(island_idx, format!("{} slack buses, skipping linear analysis", indices.vd.len()));
            continue;
        }
        if island.n_branch() == 0 {
            continue;
        }

        solver.reset();
        let linear = LinearAdmittanceMatrices::build(island);
        let island_ptdf = make_ptdf(&linear, &indices, island.n_bus, distribute_slack, solver);
        let island_lodf = make_lodf(&island_ptdf, island.cf(), island.ct(), correct_values);

        for (local_branch, &orig_branch) in island.branch_original_index.iter().enumerate() {
            for (local_bus, &orig_bus) in island.bus_original_index.iter().enumerate() {
                full_ptdf[(orig_branch as usize, orig_bus as usize)] = island_ptdf[(local_branch, local_bus)];
            }
            for (local_other, &orig_other) in island.branch_original_index.iter().enumerate() {
                full_lodf[(orig_branch as usize, orig_other as usize)] = island_lodf[(local_branch, local_other)];
            }
        }
    }

    (LinearAnalysisResult { ptdf: full_ptdf, lodf: full_lodf }, logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BranchRecord, BusRecord, BusType, GeneratorRecord, GridSnapshot, LoadRecord};
    use crate::solver::DefaultSolver;
    use num_complex::Complex64;

    fn three_bus_grid() -> GridSnapshot {
        let mut bus = BusRecord {
            v_nom: 110.0, v_min: 0.9, v_max: 1.1, bus_type: BusType::Pq,
            is_dc: false, v0: 1.0, theta0: 0.0, area: 0, zone: 0,
        };
        let mut buses = vec![bus.clone(); 3];
        buses[0].bus_type = BusType::Slack;
        bus.bus_type = BusType::Pv;
        buses[1] = bus;

        GridSnapshot {
            buses,
            branches: vec![
                BranchRecord { from: 0, to: 1, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 1, to: 2, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 0, to: 2, r: 0.0, x: 0.05, ..Default::default() },
            ],
            generators: vec![GeneratorRecord {
                bus_idx: 0, p: 0.0, v_set: 1.0, q_min: -1.0, q_max: 1.0,
                p_min: 0.0, p_max: 1.0, is_slack: true, is_controlled: true,
                active: true, cost: (0.0, 0.0, 0.0), q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 2, s: Complex64::new(0.5, 0.2), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn ptdf_rows_sum_to_zero_under_distributed_slack() {
        let grid = three_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let mut solver = DefaultSolver::default();
        let (result, logger) = run(&circuit, true, false, &mut solver);

        assert!(logger.is_empty());
        for row in result.ptdf.row_iter() {
            assert!(row.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn lodf_diagonal_is_minus_one() {
        let grid = three_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let mut solver = DefaultSolver::default();
        let (result, _logger) = run(&circuit, false, false, &mut solver);

        for k in 0..result.lodf.nrows() {
            assert!((result.lodf[(k, k)] + 1.0).abs() < 1e-12);
        }
    }
}
