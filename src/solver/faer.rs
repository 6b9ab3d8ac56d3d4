use faer::{
    MatMut,
    linalg::solvers::Solve as FaerSolve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve;

/// `faer`-backed alternate direct solver, selected when the `faer` feature
/// is enabled and `rsparse` is not.
#[derive(Default)]
pub struct FaerSolver {
    lu: Option<Lu<usize, f64>>,
    symbolic: Option<SymbolicLu<usize>>,
}

#[allow(non_snake_case)]
impl Solve for FaerSolver {
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        let s = unsafe { SymbolicSparseColMatRef::new_unchecked(n, n, Ap, None, Ai) };
        let mat = SparseColMatRef::new(s, Ax);
        if self.symbolic.is_none() {
            self.symbolic = Some(SymbolicLu::try_new(s).map_err(|_| "faer symbolic error")?);
        }

        self.lu = Some(
            Lu::try_new_with_symbolic(self.symbolic.as_ref().unwrap().clone(), mat)
                .map_err(|_| "faer numerical error")?,
        );
        let mat_ref = MatMut::from_column_major_slice_mut(b, n, 1);
        self.lu.as_ref().unwrap().solve_in_place(mat_ref);
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.lu = None;
    }
}
