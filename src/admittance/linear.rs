//! Linear (DC) admittance matrices, grounded on `compute_linear_admittances`
//! and the `LinearAdmittanceMatrices` class's `get_Bred`/`get_Bslack` slices.

use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::circuit::NumericalCircuit;

#[derive(Debug, Clone)]
pub struct LinearAdmittanceMatrices {
    pub bbus: CscMatrix<f64>,
    pub bf: CscMatrix<f64>,
    pub gbus: CscMatrix<f64>,
    pub gf: CscMatrix<f64>,
}

impl LinearAdmittanceMatrices {
    /// Builds `Bbus`/`Bf` from branch reactance (used by AC branches) and
    /// `Gbus`/`Gf` from branch resistance (used by DC branches). Both are
    /// computed over the full branch set, as the source this is grounded on
    /// does — callers select which pair is meaningful for a given branch
    /// kind.
    pub fn build(circuit: &NumericalCircuit) -> Self {
        let n = circuit.n_bus;
        let n_branch = circuit.n_branch();
        let mut bf_coo = CooMatrix::new(n_branch, n);
        let mut bbus_coo = CooMatrix::new(n, n);
        let mut gf_coo = CooMatrix::new(n_branch, n);
        let mut gbus_coo = CooMatrix::new(n, n);

        for (k, br) in circuit.branch.iter().enumerate() {
            let f = br.from as usize;
            let t = br.to as usize;
            let active = if br.active { 1.0 } else { 0.0 };

            let b = active / (br.x * br.m + 1e-20);
            bf_coo.push(k, f, b);
            bf_coo.push(k, t, -b);
            bbus_coo.push(f, f, b);
            bbus_coo.push(f, t, -b);
            bbus_coo.push(t, f, -b);
            bbus_coo.push(t, t, b);

            let g = active / (br.r + 1e-20);
            gf_coo.push(k, f, g);
            gf_coo.push(k, t, -g);
            gbus_coo.push(f, f, g);
            gbus_coo.push(f, t, -g);
            gbus_coo.push(t, f, -g);
            gbus_coo.push(t, t, g);
        }

        Self {
            bbus: CscMatrix::from(&bbus_coo),
            bf: CscMatrix::from(&bf_coo),
            gbus: CscMatrix::from(&gbus_coo),
            gf: CscMatrix::from(&gf_coo),
        }
    }

    /// `B[pqpv, pqpv]`, the reduced susceptance matrix DC power flow and
    /// PTDF solve against.
    pub fn get_bred(&self, pqpv: &[usize]) -> CscMatrix<f64> {
        dense_submatrix(&self.bbus, pqpv, pqpv)
    }

    /// `B[pqpv, vd]`, the slack coupling columns subtracted from the
    /// right-hand side before solving `Bred`.
    pub fn get_bslack(&self, pqpv: &[usize], vd: &[usize]) -> CscMatrix<f64> {
        dense_submatrix(&self.bbus, pqpv, vd)
    }
}

/// Extracts `m[rows, cols]` from a sparse matrix. Used only for the small,
/// already-reduced slices `get_bred`/`get_bslack` hand to direct solvers, so
/// a dense round-trip through a row-major buffer is simple and fast enough.
fn dense_submatrix(m: &CscMatrix<f64>, rows: &[usize], cols: &[usize]) -> CscMatrix<f64> {
    let dense = m.to_dense();
    let mut coo = CooMatrix::new(rows.len(), cols.len());
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            let v = dense[(r, c)];
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}
