//! CP backend adapter
//!
//! The solver pipeline talks to the constraint backend exclusively through
//! [`CpBackend`]: create Boolean variables, post linear constraints, add
//! objective terms, solve under a time budget with a seed and a
//! cancellation token, and read values back. Any backend implementing this
//! trait is substitutable; the production implementation lives in
//! [`crate::pumpkin`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handle to one Boolean decision variable of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BoolVar(pub(crate) usize);

/// Relation of a linear constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearOp {
    LessEq,
    Eq,
    GreaterEq,
}

/// Solve-time parameters.
#[derive(Clone, Copy, Debug)]
pub struct SolveParams {
    /// Wall-clock budget for the search.
    pub time_limit: Duration,
    /// Search seed. Backends with randomized search must honor it; a
    /// deterministic backend may record it and ignore it.
    pub random_seed: u64,
}

/// Variable assignment of a feasible solution.
#[derive(Clone, Debug)]
pub struct BackendSolution {
    values: Vec<bool>,
    pub objective: i64,
    pub proven_optimal: bool,
}

impl BackendSolution {
    pub fn new(values: Vec<bool>, objective: i64, proven_optimal: bool) -> Self {
        Self { values, objective, proven_optimal }
    }

    pub fn value(&self, var: BoolVar) -> bool {
        self.values[var.0]
    }
}

/// What the backend concluded within its budget.
#[derive(Clone, Debug)]
pub enum BackendOutcome {
    /// A feasible assignment, optimal when proven so.
    Solution(BackendSolution),
    /// Proven: no assignment satisfies the constraints.
    Infeasible,
    /// Budget exhausted with no feasible assignment found.
    Timeout,
    /// The cancellation token fired.
    Cancelled,
}

/// Narrow interface to a CP-SAT style solver.
pub trait CpBackend {
    fn new_bool_var(&mut self) -> BoolVar;

    /// Fix a variable to a constant.
    fn fix_var(&mut self, var: BoolVar, value: bool);

    /// Post `Σ weight·var  op  rhs`. An empty term list with an unsatisfied
    /// relation makes the model infeasible.
    fn add_linear(&mut self, terms: &[(i32, BoolVar)], op: LinearOp, rhs: i32);

    /// Add `weight·var` to the maximized objective.
    fn add_objective_term(&mut self, weight: i32, var: BoolVar);

    /// Run the search. Consumes the model state; call once per backend.
    fn solve(&mut self, params: &SolveParams, cancel: &CancelToken) -> BackendOutcome;
}

/// Cooperative cancellation handle, shared between the caller and the
/// running solve.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
