//! Pumpkin backend
//!
//! [`CpBackend`] implementation on top of the Pumpkin constraint
//! programming solver. Boolean decision variables are 0–1 bounded
//! integers; the maximized objective is an auxiliary integer tied to the
//! weighted variable sum by an equality constraint, optimized with linear
//! SAT-UNSAT search.
//!
//! Pumpkin's default brancher is deterministic for a fixed model
//! construction order, which the variable builder guarantees, so identical
//! inputs reproduce identical schedules regardless of the seed.

use pumpkin_solver as cp;
use pumpkin_solver::core::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::core::optimisation::OptimisationDirection;
use pumpkin_solver::core::results::{OptimisationResult, ProblemSolution, SolutionReference};
use pumpkin_solver::core::termination::{TerminationCondition, TimeBudget};
use pumpkin_solver::core::variables::{DomainId, TransformableVariable};
use pumpkin_solver::Solver;
use tracing::debug;

use crate::backend::{
    BackendOutcome, BackendSolution, BoolVar, CancelToken, CpBackend, LinearOp, SolveParams,
};

/// CP backend backed by `pumpkin_solver`.
pub struct PumpkinBackend {
    solver: Solver,
    vars: Vec<DomainId>,
    objective_terms: Vec<(i32, BoolVar)>,
    trivially_infeasible: bool,
}

impl PumpkinBackend {
    pub fn new() -> Self {
        Self {
            solver: Solver::default(),
            vars: Vec::new(),
            objective_terms: Vec::new(),
            trivially_infeasible: false,
        }
    }
}

impl Default for PumpkinBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops the search on either the wall-clock budget or the caller's token.
struct Halt {
    budget: TimeBudget,
    cancel: CancelToken,
}

impl TerminationCondition for Halt {
    fn should_stop(&mut self) -> bool {
        self.cancel.is_cancelled() || self.budget.should_stop()
    }
}

impl CpBackend for PumpkinBackend {
    fn new_bool_var(&mut self) -> BoolVar {
        let domain = self.solver.new_bounded_integer(0, 1);
        self.vars.push(domain);
        BoolVar(self.vars.len() - 1)
    }

    fn fix_var(&mut self, var: BoolVar, value: bool) {
        let tag = self.solver.new_constraint_tag();
        let terms = vec![self.vars[var.0].scaled(1)];
        if self
            .solver
            .add_constraint(cp::equals(terms, i32::from(value), tag))
            .post()
            .is_err()
        {
            self.trivially_infeasible = true;
        }
    }

    fn add_linear(&mut self, terms: &[(i32, BoolVar)], op: LinearOp, rhs: i32) {
        if terms.is_empty() {
            let holds = match op {
                LinearOp::LessEq => 0 <= rhs,
                LinearOp::Eq => rhs == 0,
                LinearOp::GreaterEq => 0 >= rhs,
            };
            if !holds {
                self.trivially_infeasible = true;
            }
            return;
        }

        let tag = self.solver.new_constraint_tag();
        let scaled: Vec<_> = terms
            .iter()
            .map(|(weight, var)| self.vars[var.0].scaled(*weight))
            .collect();
        let posted = match op {
            LinearOp::LessEq => self
                .solver
                .add_constraint(cp::less_than_or_equals(scaled, rhs, tag))
                .post(),
            LinearOp::Eq => self.solver.add_constraint(cp::equals(scaled, rhs, tag)).post(),
            LinearOp::GreaterEq => self
                .solver
                .add_constraint(cp::greater_than_or_equals(scaled, rhs, tag))
                .post(),
        };
        if posted.is_err() {
            self.trivially_infeasible = true;
        }
    }

    fn add_objective_term(&mut self, weight: i32, var: BoolVar) {
        self.objective_terms.push((weight, var));
    }

    fn solve(&mut self, params: &SolveParams, cancel: &CancelToken) -> BackendOutcome {
        if self.trivially_infeasible {
            return BackendOutcome::Infeasible;
        }
        if cancel.is_cancelled() {
            return BackendOutcome::Cancelled;
        }

        let lower: i32 = self.objective_terms.iter().map(|(w, _)| (*w).min(0)).sum();
        let upper: i32 = self.objective_terms.iter().map(|(w, _)| (*w).max(0)).sum();
        let objective = self.solver.new_bounded_integer(lower, upper);

        let tag = self.solver.new_constraint_tag();
        let mut balance: Vec<_> = vec![objective.scaled(1)];
        balance.extend(
            self.objective_terms
                .iter()
                .map(|(weight, var)| self.vars[var.0].scaled(-weight)),
        );
        if self.solver.add_constraint(cp::equals(balance, 0, tag)).post().is_err() {
            return BackendOutcome::Infeasible;
        }

        debug!(
            variables = self.vars.len(),
            objective_terms = self.objective_terms.len(),
            seed = params.random_seed,
            budget_ms = params.time_limit.as_millis() as u64,
            "starting pumpkin search"
        );

        let mut brancher = self.solver.default_brancher();
        let mut termination = Halt {
            budget: TimeBudget::starting_now(params.time_limit),
            cancel: cancel.clone(),
        };

        fn noop_callback<B, R>(
            _: &Solver,
            _: SolutionReference,
            _: &B,
            _: &R,
        ) -> std::ops::ControlFlow<()> {
            std::ops::ControlFlow::Continue(())
        }
        let mut resolver = cp::conflict_resolvers::resolvers::ResolutionResolver::default();
        let result = self.solver.optimise(
            &mut brancher,
            &mut termination,
            &mut resolver,
            LinearSatUnsat::new(OptimisationDirection::Maximise, objective, noop_callback),
        );

        match result {
            OptimisationResult::Optimal(solution) => BackendOutcome::Solution(BackendSolution::new(
                self.vars.iter().map(|&var| solution.get_integer_value(var) == 1).collect(),
                i64::from(solution.get_integer_value(objective)),
                true,
            )),
            OptimisationResult::Satisfiable(solution) => {
                // Incumbent found but optimality not proven within budget
                BackendOutcome::Solution(BackendSolution::new(
                    self.vars.iter().map(|&var| solution.get_integer_value(var) == 1).collect(),
                    i64::from(solution.get_integer_value(objective)),
                    false,
                ))
            }
            OptimisationResult::Unsatisfiable => BackendOutcome::Infeasible,
            OptimisationResult::Stopped(..) => {
                unreachable!("noop_callback never requests early stop")
            }
            OptimisationResult::Unknown => {
                if cancel.is_cancelled() {
                    BackendOutcome::Cancelled
                } else {
                    BackendOutcome::Timeout
                }
            }
        }
    }
}
