//! Series/shunt-split and fast-decoupled admittance variants, grounded on
//! `compute_split_admittances` and `compute_fast_decoupled_admittances`.

use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use crate::circuit::NumericalCircuit;

/// Series-only bus admittance plus a per-bus shunt vector, used by HELM and
/// the other AC linear methods that need branch charging kept separate from
/// the series term.
#[derive(Debug, Clone)]
pub struct SeriesAdmittanceMatrices {
    pub yseries: CscMatrix<Complex64>,
    pub yshunt: Vec<Complex64>,
}

impl SeriesAdmittanceMatrices {
    pub fn build(circuit: &NumericalCircuit) -> Self {
        let n = circuit.n_bus;
        let mut yseries = CooMatrix::new(n, n);
        let mut yshunt = super::bus_shunt_vector(circuit);

        for br in &circuit.branch {
            let f = br.from as usize;
            let t = br.to as usize;
            let ys = Complex64::new(1.0, 0.0) / Complex64::new(br.r, br.x + 1e-20);
            let ysh = Complex64::new(br.g, br.b) / 2.0;
            let tap = Complex64::from_polar(br.m, br.tau);
            let active = if br.active { 1.0 } else { 0.0 };

            let yff = active * (ys / (tap * tap.conj() * br.vtap_f * br.vtap_f));
            let yft = active * (-ys / (tap.conj() * br.vtap_f * br.vtap_t));
            let ytf = active * (-ys / (tap * br.vtap_t * br.vtap_f));
            let ytt = active * (ys / (br.vtap_t * br.vtap_t));

            yseries.push(f, f, yff);
            yseries.push(f, t, yft);
            yseries.push(t, f, ytf);
            yseries.push(t, t, ytt);

            yshunt[f] += ysh;
            yshunt[t] += ysh;
        }

        Self { yseries: CscMatrix::from(&yseries), yshunt }
    }
}

/// `B'`/`B''` matrices for the fast-decoupled power flow.
#[derive(Debug, Clone)]
pub struct FastDecoupledAdmittanceMatrices {
    pub b1: CscMatrix<f64>,
    pub b2: CscMatrix<f64>,
}

impl FastDecoupledAdmittanceMatrices {
    pub fn build(circuit: &NumericalCircuit) -> Self {
        let n = circuit.n_bus;
        let mut b1_coo = CooMatrix::new(n, n);
        let mut b2_coo = CooMatrix::new(n, n);

        for br in &circuit.branch {
            let f = br.from as usize;
            let t = br.to as usize;
            let active = if br.active { 1.0 } else { 0.0 };
            let b1 = active / (br.x + 1e-20);

            b1_coo.push(f, f, b1);
            b1_coo.push(f, t, -b1);
            b1_coo.push(t, f, -b1);
            b1_coo.push(t, t, b1);

            let b2 = b1 + br.b;
            let tap_conj_norm = br.m * br.m; // |tap_module|^2 for a real tap module
            let b2_ff = -(b2 / tap_conj_norm * br.vtap_f * br.vtap_f);
            let b2_ft = -(b1 / br.m * br.vtap_f * br.vtap_t);
            let b2_tf = -(b1 / br.m * br.vtap_t * br.vtap_f);
            let b2_tt = -b2 / (br.vtap_t * br.vtap_t);

            b2_coo.push(f, f, -b2_ff);
            b2_coo.push(f, t, b2_ft);
            b2_coo.push(t, f, b2_tf);
            b2_coo.push(t, t, -b2_tt);
        }

        Self { b1: CscMatrix::from(&b1_coo), b2: CscMatrix::from(&b2_coo) }
    }
}
