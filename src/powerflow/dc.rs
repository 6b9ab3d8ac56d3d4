//! DC power flow: `theta[pqpv] = Bred^-1 (P[pqpv] - Bslack . theta[vd])`,
//! grounded on `compute_linear_admittances`'s `Bbus`/`get_Bred`/`get_Bslack`
//! and the KULeuven DC-flow identity noted in that source.

use num_complex::Complex64;

use crate::admittance::LinearAdmittanceMatrices;
use crate::error::{Logger, SolverError};
use crate::indices::SimulationIndices;
use crate::solver::Solve;

use super::NumericPowerFlowResults;

#[allow(non_snake_case)]
pub fn solve<S: Solve>(
    linear: &LinearAdmittanceMatrices,
    p_bus: &[f64],
    theta_vd: &[f64],
    indices: &SimulationIndices,
    solver: &mut S,
) -> Result<NumericPowerFlowResults, SolverError> {
    let pqpv = &indices.pqpv;
    let vd = &indices.vd;
    let n_bus = p_bus.len();

    let bred = linear.get_bred(pqpv);
    let bslack = linear.get_bslack(pqpv, vd);

    let mut rhs: Vec<f64> = pqpv.iter().map(|&i| p_bus[i]).collect();
    if !vd.is_empty() {
        let coupling = spmv(&bslack, theta_vd);
        for (r, c) in rhs.iter_mut().zip(coupling.iter()) {
            *r -= c;
        }
    }

    let n = bred.nrows();
    let (mut ap, mut ai, mut ax) = bred.disassemble();
    solver.solve(&mut ap, &mut ai, &mut ax, &mut rhs, n).map_err(|_| SolverError::Singular)?;

    let mut theta = vec![0.0_f64; n_bus];
    for (&i, &t) in pqpv.iter().zip(rhs.iter()) {
        theta[i] = t;
    }
    for (&i, &t) in vd.iter().zip(theta_vd.iter()) {
        theta[i] = t;
    }

    let voltage = theta.iter().map(|&t| Complex64::from_polar(1.0, t)).collect();
    Ok(NumericPowerFlowResults { voltage, converged: true, iterations: 1, max_mismatch: 0.0, logger: Logger::new() })
}

fn spmv(m: &nalgebra_sparse::CscMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; m.nrows()];
    for col in 0..m.ncols() {
        let view = m.col(col);
        for (&row, &val) in view.row_indices().iter().zip(view.values()) {
            out[row] += val * x[col];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BranchRecord, BusRecord, BusType, GeneratorRecord, GridSnapshot, LoadRecord, NumericalCircuit};
    use crate::solver::DefaultSolver;

    /// Three-bus mesh, bus 0 slack, lines (0,1) (1,2) (0,2) each `x=0.05`,
    /// bus 2 carrying `P=-0.5` pu. `theta[pqpv] = Bred^-1 (P - Bslack*0)`
    /// with `Bred = [[40,-20],[-20,40]]` solves in closed form to
    /// `theta_1 = -1/120`, `theta_2 = -1/60`.
    fn three_bus_mesh() -> GridSnapshot {
        let base = BusRecord {
            v_nom: 110.0,
            v_min: 0.9,
            v_max: 1.1,
            bus_type: BusType::Pq,
            is_dc: false,
            v0: 1.0,
            theta0: 0.0,
            area: 0,
            zone: 0,
        };
        let mut buses = vec![base.clone(); 3];
        buses[0].bus_type = BusType::Slack;

        GridSnapshot {
            buses,
            branches: vec![
                BranchRecord { from: 0, to: 1, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 1, to: 2, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 0, to: 2, r: 0.0, x: 0.05, ..Default::default() },
            ],
            generators: vec![GeneratorRecord {
                bus_idx: 0,
                p: 0.0,
                v_set: 1.0,
                q_min: -1.0,
                q_max: 1.0,
                p_min: 0.0,
                p_max: 1.0,
                is_slack: true,
                is_controlled: true,
                active: true,
                cost: (0.0, 0.0, 0.0),
                q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 2, s: Complex64::new(0.5, 0.2), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 1.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn three_bus_mesh_matches_closed_form_angles() {
        let grid = three_bus_mesh();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let indices = circuit.simulation_indices();
        let linear = crate::admittance::LinearAdmittanceMatrices::build(&circuit);
        let p_bus: Vec<f64> = circuit.s_bus().iter().map(|s| s.re).collect();

        let mut solver = DefaultSolver::default();
        let result = solve(&linear, &p_bus, &[0.0], &indices, &mut solver).unwrap();

        let theta: Vec<f64> = result.voltage.iter().map(|v| v.arg()).collect();
        assert!(theta[0].abs() < 1e-12);
        assert!((theta[1] - (-1.0 / 120.0)).abs() < 1e-9);
        assert!((theta[2] - (-1.0 / 60.0)).abs() < 1e-9);
    }
}
