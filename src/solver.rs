//! Sparse direct-solve abstraction: every nonlinear power-flow solver and
//! the linear-analysis drivers factorize a real CSC Jacobian/susceptance
//! matrix and reuse that factorization across right-hand sides.

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[cfg(all(feature = "faer", not(feature = "rsparse")))]
pub type DefaultSolver = FaerSolver;

#[cfg(all(feature = "faer", feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[allow(non_snake_case)]
/// A sparse direct solver that caches its symbolic factorization across
/// calls sharing the same sparsity pattern.
pub trait Solve {
    /// Solves `A x = b` in place: on return `b` holds the solution.
    ///
    /// `Ap`/`Ai`/`Ax` are a CSC matrix's column pointers, row indices, and
    /// values. A solver may reuse a cached symbolic factorization as long
    /// as the sparsity pattern (`Ap`, `Ai`) is unchanged from the previous
    /// call; numeric factorization always re-runs.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Drops any cached factorization, forcing the next `solve` to
    /// re-derive it from scratch. Needed whenever the sparsity pattern
    /// changes between calls (a new island, a contingency re-solve with a
    /// different active-branch set, ...).
    fn reset(&mut self);
}
