//! Fast-decoupled power flow, alternating between a `B'`-based angle
//! update and a `B''`-based magnitude update, grounded on
//! `compute_fast_decoupled_admittances`. Each half-step reuses one
//! factorization across every outer iteration since `B'`/`B''` don't
//! depend on the voltage solution — only the mismatch (computed from the
//! full AC `Ybus`) changes between iterations.

use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::admittance::FastDecoupledAdmittanceMatrices;
use crate::error::{Logger, SolverError};
use crate::indices::SimulationIndices;
use crate::solver::Solve;

use super::common::{calc_power, inf_norm, submatrix_f64};
use super::{NumericPowerFlowResults, PowerFlowOptions};

#[allow(non_snake_case)]
pub fn solve<S: Solve>(
    ybus: &CscMatrix<Complex64>,
    fd: &FastDecoupledAdmittanceMatrices,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
    angle_solver: &mut S,
    magnitude_solver: &mut S,
) -> Result<NumericPowerFlowResults, SolverError> {
    let mut v = v0.to_vec();
    let logger = Logger::new();

    let mut pvpq = indices.pv.clone();
    pvpq.extend_from_slice(&indices.pq);
    pvpq.sort_unstable();
    let pq = &indices.pq;

    let b1 = submatrix_f64(&fd.b1, &pvpq, &pvpq);
    let b2 = submatrix_f64(&fd.b2, pq, pq);
    let (mut ap1, mut ai1, mut ax1) = b1.disassemble();
    let (mut ap2, mut ai2, mut ax2) = b2.disassemble();

    let mut f_norm = f64::INFINITY;

    for iter in 0..opts.max_iter {
        let s_calc = calc_power(ybus, &v);
        let dp: Vec<f64> = pvpq.iter().map(|&i| (s_calc[i].re - s_bus[i].re) / v[i].norm()).collect();
        let dq_pq: Vec<f64> = pq.iter().map(|&i| (s_calc[i].im - s_bus[i].im) / v[i].norm()).collect();
        f_norm = inf_norm(&dp).max(inf_norm(&dq_pq));
        if f_norm < opts.tolerance {
            return Ok(NumericPowerFlowResults { voltage: v, converged: true, iterations: iter, max_mismatch: f_norm, logger });
        }

        let mut d_theta = dp.clone();
        angle_solver
            .solve(&mut ap1, &mut ai1, &mut ax1, &mut d_theta, pvpq.len())
            .map_err(|_| SolverError::Singular)?;
        for (k, &i) in pvpq.iter().enumerate() {
            let (m, a) = (v[i].norm(), v[i].arg());
            v[i] = Complex64::from_polar(m, a - d_theta[k]);
        }

        let s_calc = calc_power(ybus, &v);
        let mut dq_pq: Vec<f64> = pq.iter().map(|&i| (s_calc[i].im - s_bus[i].im) / v[i].norm()).collect();
        magnitude_solver
            .solve(&mut ap2, &mut ai2, &mut ax2, &mut dq_pq, pq.len())
            .map_err(|_| SolverError::Singular)?;
        for (k, &i) in pq.iter().enumerate() {
            let (m, a) = (v[i].norm(), v[i].arg());
            v[i] = Complex64::from_polar(m - dq_pq[k], a);
        }
    }

    Ok(NumericPowerFlowResults::diverged(v, opts.max_iter, f_norm, logger))
}
