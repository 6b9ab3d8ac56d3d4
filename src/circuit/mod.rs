//! C1 — Numerical Circuit: array-oriented, per-unit representation of a
//! grid snapshot. Everything downstream (admittance assembly, power flow,
//! linear analysis, reduction) operates on a [`NumericalCircuit`], never on
//! caller-owned data structures directly.

mod numerical_circuit;
mod types;

pub use numerical_circuit::NumericalCircuit;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn three_bus_grid() -> GridSnapshot {
        let mut bus = BusRecord {
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
        let mut buses = vec![bus.clone(); 3];
        buses[0].bus_type = BusType::Slack;
        bus.bus_type = BusType::Pv;
        buses[1] = bus;

        let branches = vec![
            BranchRecord { from: 0, to: 1, r: 0.01, x: 0.1, ..Default::default() },
            BranchRecord { from: 1, to: 2, r: 0.01, x: 0.1, ..Default::default() },
        ];

        GridSnapshot {
            buses,
            branches,
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
            loads: vec![num_complex::Complex64::new(0.0, 0.0)]
                .into_iter()
                .map(|s| LoadRecord { bus_idx: 2, s, active: true })
                .collect(),
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn compile_rejects_empty_network() {
        let grid = GridSnapshot::default();
        assert_eq!(
            NumericalCircuit::compile_at(&grid, 0).unwrap_err(),
            crate::error::CompileError::EmptyNetwork
        );
    }

    #[test]
    fn compile_rejects_out_of_range_branch() {
        let mut grid = three_bus_grid();
        grid.branches[0].to = 5;
        assert_eq!(
            NumericalCircuit::compile_at(&grid, 0).unwrap_err(),
            crate::error::CompileError::InvalidBranchEndpoint { branch: 0 }
        );
    }

    #[test]
    fn compile_rejects_vsc_between_two_ac_buses() {
        let mut grid = three_bus_grid();
        grid.branches[0].kind = BranchKind::Vsc;
        assert_eq!(
            NumericalCircuit::compile_at(&grid, 0).unwrap_err(),
            crate::error::CompileError::InvalidControl { branch: 0 }
        );
    }

    #[test]
    fn compile_accepts_vsc_between_ac_and_dc_bus() {
        let mut grid = three_bus_grid();
        grid.buses[1].is_dc = true;
        grid.branches[0].kind = BranchKind::Vsc;
        assert!(NumericalCircuit::compile_at(&grid, 0).is_ok());
    }

    #[test]
    fn compiled_circuit_preserves_topology() {
        let grid = three_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        assert_eq!(circuit.n_bus, 3);
        assert_eq!(circuit.n_branch(), 2);
        assert_eq!(circuit.cf().nrows(), 2);
        assert_eq!(circuit.ct().ncols(), 3);
    }

    #[test]
    fn split_into_islands_separates_disconnected_branch() {
        let mut grid = three_bus_grid();
        grid.branches[1].active = false;
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let islands = circuit.split_into_islands();
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].n_bus, 2);
        assert_eq!(islands[1].n_bus, 1);
        assert_eq!(islands[1].bus_original_index, vec![2]);
    }

    #[test]
    fn split_into_islands_is_noop_when_fully_connected() {
        let grid = three_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let islands = circuit.split_into_islands();
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].n_bus, 3);
    }
}
