//! Gauss-Seidel power flow: per-bus voltage update using the latest
//! available neighbor voltages within the same sweep, the simplest and
//! slowest-converging of the AC solvers here. Useful as a fallback when
//! Newton/LM diverge from a poor flat start.

use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::error::Logger;
use crate::indices::SimulationIndices;

use super::common::{calc_power, inf_norm, power_mismatch};
use super::{NumericPowerFlowResults, PowerFlowOptions};

pub fn solve(
    ybus: &CscMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
) -> NumericPowerFlowResults {
    let n = v0.len();
    let mut v = v0.to_vec();
    let logger = Logger::new();
    let dense = ybus.to_dense();
    let mut f_norm = f64::INFINITY;

    for iter in 0..opts.max_iter {
        for &i in indices.pv.iter().chain(indices.pq.iter()) {
            let row_sum: Complex64 = (0..n).map(|j| dense[(i, j)] * v[j]).sum();
            let s_target = if indices.pv.contains(&i) {
                let q_calc = -(v[i].conj() * row_sum).im;
                Complex64::new(s_bus[i].re, q_calc)
            } else {
                s_bus[i]
            };

            let off_diag_sum = row_sum - dense[(i, i)] * v[i];
            let mut v_new = (s_target.conj() / v[i].conj() - off_diag_sum) / dense[(i, i)];
            if indices.pv.contains(&i) {
                v_new = Complex64::from_polar(v[i].norm(), v_new.arg());
            }
            v[i] = v_new;
        }

        let s_calc = calc_power(ybus, &v);
        let f = power_mismatch(&s_calc, s_bus, &indices.pv, &indices.pq);
        f_norm = inf_norm(&f);
        if f_norm < opts.tolerance {
            return NumericPowerFlowResults { voltage: v, converged: true, iterations: iter, max_mismatch: f_norm, logger };
        }
    }

    NumericPowerFlowResults::diverged(v, opts.max_iter, f_norm, logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admittance::AdmittanceMatrices;
    use crate::circuit::{BranchRecord, BusRecord, BusType, GeneratorRecord, GridSnapshot, LoadRecord, NumericalCircuit, SequenceDomain};

    fn two_bus_grid() -> GridSnapshot {
        let slack = BusRecord {
            v_nom: 110.0,
            v_min: 0.9,
            v_max: 1.1,
            bus_type: BusType::Slack,
            is_dc: false,
            v0: 1.0,
            theta0: 0.0,
            area: 0,
            zone: 0,
        };
        let pq = BusRecord { bus_type: BusType::Pq, ..slack.clone() };
        GridSnapshot {
            buses: vec![slack, pq],
            branches: vec![BranchRecord { from: 0, to: 1, r: 0.01, x: 0.1, ..Default::default() }],
            generators: vec![GeneratorRecord {
                bus_idx: 0,
                p: 0.0,
                v_set: 1.0,
                q_min: -10.0,
                q_max: 10.0,
                p_min: -10.0,
                p_max: 10.0,
                is_slack: true,
                is_controlled: true,
                active: true,
                cost: (0.0, 0.0, 0.0),
                q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 1, s: Complex64::new(0.2, 0.05), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn converges_on_a_simple_radial_feeder() {
        let grid = two_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let indices = circuit.simulation_indices();
        let y = AdmittanceMatrices::build(&circuit, SequenceDomain::Positive, false);
        let s_bus = circuit.s_bus();
        let v0 = vec![Complex64::new(1.0, 0.0); circuit.n_bus];
        let opts = PowerFlowOptions { max_iter: 200, tolerance: 1e-6, ..PowerFlowOptions::default() };

        let result = solve(&y.ybus, &s_bus, &v0, &indices, &opts);

        assert!(result.converged);
        assert!(result.max_mismatch < 1e-6);
        assert!(result.voltage[1].norm() < 1.0);
    }
}
