//! Power-flow Jacobian assembly, grounded on the teacher's `dsbus_dv.rs`
//! (MATPOWER Technical Note 2 formulation) and `newtonpf.rs`'s block
//! assembly into the real-valued `[J11 J12; J21 J22]` system.

use nalgebra::{ClosedAddAssign, DVector, Scalar};
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use num_traits::Zero;

use crate::sparse::{csc_hstack, csc_vstack, slice_csc_matrix, slice_csc_matrix_block, Conjugate, RealImage};

/// `dS/dVm`, `dS/dVa`, the complex partial derivatives of bus power
/// injection with respect to voltage magnitude and angle.
#[allow(non_snake_case)]
pub fn dsbus_dv(
    ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    v_norm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let pattern = CscMatrix::identity(v.len());
    let ibus = ybus * v;

    let mut diag_v_norm = pattern.clone();
    let mut diag_v = pattern.clone();
    let mut diag_ibus = pattern;
    diag_v_norm.values_mut().copy_from_slice(v_norm.as_slice());
    diag_v.values_mut().copy_from_slice(v.as_slice());
    diag_ibus.values_mut().copy_from_slice(ibus.as_slice());

    let ds_dvm = &diag_v * (ybus * &diag_v_norm).conjugate() + diag_ibus.conjugate() * &diag_v_norm;
    let ds_dva = &diag_v * (diag_ibus - ybus * &diag_v).conjugate() * Complex64::i();
    (ds_dvm, ds_dva)
}

trait Slice {
    type Mat;
    fn block(&self, start_pos: (usize, usize), shape: (usize, usize)) -> Self::Mat;
    fn columns(&self, start_col: usize, end_col: usize) -> Self::Mat;
}

impl<T: Clone + Zero + Scalar + ClosedAddAssign> Slice for CscMatrix<T> {
    type Mat = CscMatrix<T>;
    fn block(&self, start_pos: (usize, usize), shape: (usize, usize)) -> Self::Mat {
        slice_csc_matrix_block(self, start_pos, shape)
    }
    fn columns(&self, start_col: usize, end_col: usize) -> Self::Mat {
        slice_csc_matrix(self, start_col, end_col)
    }
}

/// Assembles the real-valued Newton/LM Jacobian `[[J11, J12], [J21, J22]]`
/// from the complex partials, restricted to the non-slack rows/columns
/// (`n_ext` slack buses trimmed from the end) and split at `npv` between
/// the angle-only PV block and the angle+magnitude PQ block.
#[allow(non_snake_case)]
pub fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    n_ext: usize,
) -> CscMatrix<f64> {
    let (real, imag) = ds_dva
        .block((0, 0), (ds_dva.nrows() - n_ext, ds_dva.ncols() - n_ext))
        .real_imag();
    let (real2, imag2) = ds_dvm
        .block((0, 0), (ds_dvm.nrows() - n_ext, ds_dvm.ncols() - n_ext))
        .real_imag();

    let j11 = real;
    let j12 = real2.columns(npv, real2.ncols());
    let j21 = imag.block((npv, 0), (imag.nrows() - npv, imag.ncols()));
    let j22 = imag2.block((npv, npv), (imag2.nrows() - npv, imag2.ncols() - npv));

    csc_vstack(&[&csc_hstack(&[&j11, &j12]), &csc_hstack(&[&j21, &j22])])
}
