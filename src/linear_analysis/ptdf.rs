//! DC and AC Power Transfer Distribution Factors, grounded in
//! `linear_analysis.py`'s `make_ptdf`/`make_acptdf`.

use nalgebra::DVector;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use crate::admittance::LinearAdmittanceMatrices;
use crate::indices::SimulationIndices;
use crate::solver::Solve;
use crate::sparse::{csc_hstack, slice_csc_matrix, Conjugate, RealImage};

/// `PTDF = Bf · Bred⁻¹ · dP[pqpv,:]`, scattered to a dense `(n_branch,
/// n_bus)` matrix with a zero row at every slack bus (`dtheta[vd,:] = 0`).
///
/// `dP` is the identity (non-distributed slack) or `I − 11ᵀ/(n−1)`
/// (distributed slack); only its `pqpv` rows are ever used as an RHS, so
/// the distribution term is folded directly into the RHS construction
/// instead of materializing the full `n×n` matrix.
#[allow(non_snake_case)]
pub fn make_ptdf<S: Solve>(
    linear: &LinearAdmittanceMatrices,
    indices: &SimulationIndices,
    n_bus: usize,
    distribute_slack: bool,
    solver: &mut S,
) -> DMatrix<f64> {
    let pqpv = &indices.pqpv;
    let npqpv = pqpv.len();

    let bred = linear.get_bred(pqpv);
    let (mut ap, mut ai, mut ax) = bred.disassemble();

    let off_diag = if distribute_slack { -1.0 / (n_bus as f64 - 1.0) } else { 0.0 };

    let mut dtheta = DMatrix::<f64>::zeros(n_bus, n_bus);
    for col in 0..n_bus {
        let mut rhs: Vec<f64> = pqpv
            .iter()
            .map(|&bus| if bus == col { 1.0 } else { off_diag })
            .collect();
        if solver.solve(&mut ap, &mut ai, &mut ax, &mut rhs, npqpv).is_err() {
            continue;
        }
        for (i, &bus) in pqpv.iter().enumerate() {
            dtheta[(bus, col)] = rhs[i];
        }
    }

    linear.bf.to_dense() * dtheta
}

/// `dSf/dVm`, `dSf/dVa`: the branch-flow analogue of
/// [`crate::powerflow::jacobian::dsbus_dv`], built from `Cf`/`Yf` instead
/// of the identity/`Ybus` (branch "from"-side current and voltage replace
/// bus injection current and voltage).
#[allow(non_snake_case)]
fn dsf_dv(
    yf: &CscMatrix<Complex64>,
    cf: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    v_norm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let n = v.len();
    let n_branch = yf.nrows();

    let mut diag_v = CscMatrix::identity(n);
    let mut diag_v_norm = CscMatrix::identity(n);
    diag_v.values_mut().copy_from_slice(v.as_slice());
    diag_v_norm.values_mut().copy_from_slice(v_norm.as_slice());

    let if_calc = yf * v;
    let vf = cf * v;
    let mut diag_vf = CscMatrix::identity(n_branch);
    let mut diag_if = CscMatrix::identity(n_branch);
    diag_vf.values_mut().copy_from_slice(vf.as_slice());
    diag_if.values_mut().copy_from_slice(if_calc.as_slice());

    let dsf_dvm = &diag_vf * (yf * &diag_v_norm).conjugate() + diag_if.conjugate() * (cf * &diag_v_norm);
    let dsf_dva = (diag_if.conjugate() * (cf * &diag_v) - &diag_vf * (yf * &diag_v).conjugate()) * Complex64::i();
    (dsf_dvm, dsf_dva)
}

fn permute_columns(m: &CscMatrix<Complex64>, perm: &[usize]) -> CscMatrix<Complex64> {
    let dense = m.to_dense();
    let nrows = m.nrows();
    let mut coo = CooMatrix::new(nrows, perm.len());
    for (j, &pj) in perm.iter().enumerate() {
        for i in 0..nrows {
            let v = dense[(i, pj)];
            if v != Complex64::new(0.0, 0.0) {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

/// Full AC-Jacobian PTDF, grounded in `make_acptdf`: assembles the AC
/// power-flow Jacobian once at the given operating point and solves it
/// against an identity (or distributed-slack) right-hand side, then maps
/// the resulting voltage sensitivities through `dSf/dV` to get branch
/// active-power sensitivities.
#[allow(non_snake_case)]
pub fn make_acptdf(
    ybus: &CscMatrix<Complex64>,
    yf: &CscMatrix<Complex64>,
    cf: &CscMatrix<Complex64>,
    indices: &SimulationIndices,
    v: &[Complex64],
    distribute_slack: bool,
) -> DMatrix<f64> {
    use crate::powerflow::common::permute_matrix;
    use crate::powerflow::jacobian::{build_jacobian, dsbus_dv};

    let n = v.len();
    let pqpv = &indices.pqpv;
    let npv = indices.pv.len();
    let npq = indices.pq.len();
    let n_ext = indices.vd.len();
    let num_state = npv + 2 * npq;

    let perm: Vec<usize> = pqpv.iter().chain(indices.vd.iter()).copied().collect();

    let v_vec = DVector::from_column_slice(v);
    let v_norm = v_vec.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex64::new(1.0, 0.0) });

    let ybus_p = permute_matrix(ybus, &perm);
    let v_p = DVector::from_iterator(n, perm.iter().map(|&i| v_vec[i]));
    let v_norm_p = DVector::from_iterator(n, perm.iter().map(|&i| v_norm[i]));

    let (ds_dvm, ds_dva) = dsbus_dv(&ybus_p, &v_p, &v_norm_p);
    let j = build_jacobian(&ds_dvm, &ds_dva, npv, n_ext);
    let j_lu = j.to_dense().lu();

    let off_diag = if distribute_slack { -1.0 / (n as f64 - 1.0) } else { 0.0 };
    let mut ds = DMatrix::<f64>::zeros(num_state, n);
    for col in 0..n {
        for (row, &bus) in pqpv.iter().enumerate() {
            ds[(row, col)] = if bus == col { 1.0 } else { off_diag };
        }
    }
    let dx = j_lu.solve(&ds).expect("AC Jacobian is nonsingular at a valid operating point");

    let (dsf_dvm, dsf_dva) = dsf_dv(yf, cf, &v_vec, &v_norm);
    let dsf_dva_p = permute_columns(&dsf_dva, &perm);
    let dsf_dvm_p = permute_columns(&dsf_dvm, &perm);

    let n_nonslack = npv + npq;
    let (dsf_dva_re, _) = dsf_dva_p.real_imag();
    let (dsf_dvm_re, _) = dsf_dvm_p.real_imag();
    let j_angle = slice_csc_matrix(&dsf_dva_re, 0, n_nonslack);
    let j_mag = slice_csc_matrix(&dsf_dvm_re, npv, n_nonslack);
    let dsf_dx = csc_hstack(&[&j_angle, &j_mag]);

    dsf_dx.to_dense() * dx
}
