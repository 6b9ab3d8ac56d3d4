//! PV/PQ switching policy, grounded on the teacher's `qlim.rs` for the
//! PV→PQ demotion and on GridCal's `discrete_controls.py::control_q_direct`
//! for the full Zhao policy, including the PQ→PV restoration it adds.
//!
//! After a solve, any PV bus whose computed reactive injection falls
//! outside its generator's `[q_min, q_max]` is demoted to PQ with its
//! injection clamped (`gen.q_fixed`) to the violated limit; a bus already
//! forced to PQ this way is re-checked every pass and restored to PV once
//! its unclamped `Q` would fall back inside the limits. [`solve_with_switching`]
//! is the outer driver that repeats solve → switch → re-solve until a pass
//! changes nothing, honoring [`super::PowerFlowOptions::enforce_q_limits`].

use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::circuit::{BusType, NumericalCircuit};
use crate::error::{Logger, SolverError};
use crate::solver::Solve;

use super::common::calc_power;
use super::{NumericPowerFlowResults, PowerFlowOptions};

/// Runs one switching pass over every non-slack controlled generator.
/// Returns `true` if any bus type or clamped `Q` changed, in which case
/// `circuit`'s bus types and generators' `q_fixed` have been mutated and
/// the caller should refresh [`NumericalCircuit::simulation_indices`]
/// before re-solving. [`solve_with_switching`] does this bookkeeping.
pub fn enforce_q_limits(circuit: &mut NumericalCircuit, ybus: &CscMatrix<Complex64>, v: &[Complex64], logger: &mut Logger) -> bool {
    let s_calc = calc_power(ybus, v);
    let mut changed = false;

    for gen in circuit.generators.iter_mut().filter(|g| g.active && g.is_controlled && !g.is_slack) {
        let bus = gen.bus_idx as usize;
        let q_pu = s_calc[bus].im;
        let (q_min, q_max) = (gen.q_min / circuit.s_base, gen.q_max / circuit.s_base);

        match circuit.bus[bus].bus_type {
            BusType::Pv => {
                if q_pu >= q_max {
                    gen.q_fixed = Some(gen.q_max);
                    circuit.bus[bus].bus_type = BusType::Pq;
                    changed = true;
                    logger.warn_branch(bus, format!("PV bus {bus} hit Qmax, switched to PQ at Qmax"));
                } else if q_pu <= q_min {
                    gen.q_fixed = Some(gen.q_min);
                    circuit.bus[bus].bus_type = BusType::Pq;
                    changed = true;
                    logger.warn_branch(bus, format!("PV bus {bus} hit Qmin, switched to PQ at Qmin"));
                }
            }
            BusType::Pq if gen.q_fixed.is_some() => {
                if q_pu >= q_max {
                    if gen.q_fixed != Some(gen.q_max) {
                        gen.q_fixed = Some(gen.q_max);
                        changed = true;
                    }
                } else if q_pu <= q_min {
                    if gen.q_fixed != Some(gen.q_min) {
                        gen.q_fixed = Some(gen.q_min);
                        changed = true;
                    }
                } else {
                    gen.q_fixed = None;
                    circuit.bus[bus].bus_type = BusType::Pv;
                    changed = true;
                    logger.warn_branch(bus, format!("forced-PQ bus {bus} back within Q limits, restored to PV"));
                }
            }
            _ => {}
        }
    }

    changed
}

/// Resets every active PV bus's voltage magnitude to its generator's
/// `v_set`, preserving the angle. A bus just restored from forced-PQ by
/// [`enforce_q_limits`] may have drifted off `v_set` while its magnitude
/// was free to float as PQ; Newton-Raphson never updates a PV bus's
/// magnitude mid-solve (see `trial_step` in `newton.rs`), so the next
/// solve must start it back at the setpoint.
fn pin_pv_voltages(circuit: &NumericalCircuit, v: &mut [Complex64]) {
    for gen in circuit.generators.iter().filter(|g| g.active && g.is_controlled && !g.is_slack) {
        let bus = gen.bus_idx as usize;
        if circuit.bus[bus].bus_type != BusType::Pv {
            continue;
        }
        let angle = if v[bus].norm() > 0.0 { v[bus].arg() } else { 0.0 };
        v[bus] = Complex64::from_polar(gen.v_set, angle);
    }
}

/// Runs Newton-Raphson to convergence, applying the Zhao PV/PQ switching
/// policy between solves when `opts.enforce_q_limits` is set: after each
/// solve, [`enforce_q_limits`] checks every controlled bus and flips its
/// type as needed; if anything changed, the circuit's simulation indices
/// are refreshed, restored PV buses are pinned back to their `v_set`, and
/// the network is re-solved. Bounded at `opts.max_iter` outer passes.
pub fn solve_with_switching<S: Solve>(
    circuit: &mut NumericalCircuit,
    ybus: &CscMatrix<Complex64>,
    v0: &[Complex64],
    opts: &PowerFlowOptions,
    solver: &mut S,
) -> Result<NumericPowerFlowResults, SolverError> {
    let mut indices = circuit.simulation_indices();
    let mut v_guess = v0.to_vec();
    let mut combined_logger = Logger::new();

    for outer in 0..opts.max_iter.max(1) {
        let s_bus = circuit.s_bus();
        let result = super::newton::solve(ybus, &s_bus, &v_guess, &indices, opts, solver)?;
        let NumericPowerFlowResults { voltage, converged, iterations, max_mismatch, logger } = result;
        combined_logger.extend(logger);
        v_guess = voltage.clone();

        if !opts.enforce_q_limits {
            return Ok(NumericPowerFlowResults { voltage, converged, iterations, max_mismatch, logger: combined_logger });
        }

        let changed = enforce_q_limits(circuit, ybus, &voltage, &mut combined_logger);
        if !changed {
            return Ok(NumericPowerFlowResults { voltage, converged, iterations, max_mismatch, logger: combined_logger });
        }

        indices = circuit.simulation_indices();
        pin_pv_voltages(circuit, &mut v_guess);
        solver.reset();

        if outer + 1 == opts.max_iter.max(1) {
            combined_logger.warn("Q-limit switching did not settle within the outer iteration budget");
            return Ok(NumericPowerFlowResults { voltage, converged: false, iterations, max_mismatch, logger: combined_logger });
        }
    }

    unreachable!("the loop above always returns on or before its final iteration")
}
