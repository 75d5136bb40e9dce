//! Solve orchestration
//!
//! Runs one solve end to end: pin pre-checks, variable construction,
//! constraint and objective compilation, the backend search under its
//! budget, extraction, re-validation and scoring. Model construction order
//! is fixed, so a deterministic backend reproduces identical schedules for
//! identical inputs.

use std::time::Instant;

use stundenplan_core::{
    ConflictDetector, DomainSnapshot, EntryId, QualityReport, ScheduleEntry, ScheduleError,
};
use tracing::{info, warn};

use crate::backend::{BackendOutcome, CancelToken, CpBackend, SolveParams};
use crate::constraints::{self, CONSTRAINT_CATEGORIES};
use crate::extract::{self, PlannedEntry};
use crate::objective;
use crate::variables;
use crate::{Plan, SolveConfig};

/// Give planned entries stable ids for validation and scoring: pinned
/// entries keep theirs, fresh ones get ids above every pin.
pub(crate) fn materialize(planned: &[PlannedEntry]) -> Vec<ScheduleEntry> {
    let mut next: EntryId = planned.iter().filter_map(|p| p.pinned).max().unwrap_or(0);
    planned
        .iter()
        .map(|p| {
            let id = p.pinned.unwrap_or_else(|| {
                next += 1;
                next
            });
            ScheduleEntry::from_draft(id, p.draft.clone())
        })
        .collect()
}

pub(crate) fn solve<B: CpBackend>(
    backend: &mut B,
    snapshot: &DomainSnapshot,
    config: &SolveConfig,
    pins: &[ScheduleEntry],
    cancel: &CancelToken,
) -> Result<Plan, ScheduleError> {
    let started = Instant::now();
    let detector = ConflictDetector::new(snapshot);

    // Pins the solver must honor have to be legal among themselves.
    let pre_existing = detector.scan(pins);
    if !pre_existing.is_empty() {
        let conflicts = pre_existing.into_iter().flat_map(|e| e.conflicts).collect();
        return Err(ScheduleError::Conflict(conflicts));
    }

    let pool = variables::build(backend, snapshot, pins)?;
    constraints::compile(backend, snapshot, &pool, config.demand.as_ref());
    objective::compile(backend, snapshot, &pool);

    info!(
        variables = pool.vars.len(),
        pinned = pool.pinned.len(),
        carried = pool.carried.len(),
        time_limit_seconds = config.time_limit_seconds,
        "timetable model compiled"
    );

    let params = SolveParams {
        time_limit: std::time::Duration::from_secs(u64::from(config.time_limit_seconds)),
        random_seed: config.random_seed.unwrap_or(0),
    };

    match backend.solve(&params, cancel) {
        BackendOutcome::Solution(solution) => {
            let planned = extract::extract(snapshot, &pool, &solution)?;
            let entries = materialize(&planned);

            let violations = detector.scan(&entries);
            if !violations.is_empty() {
                warn!(count = violations.len(), "solver output failed re-validation");
                return Err(ScheduleError::Internal(format!(
                    "extracted schedule has {} conflicting entries",
                    violations.len()
                )));
            }

            let quality = QualityReport::calculate(snapshot, &entries);
            let generation_time = started.elapsed();
            info!(
                entries = entries.len(),
                objective = solution.objective,
                quality = quality.total,
                optimal = solution.proven_optimal,
                elapsed_ms = generation_time.as_millis() as u64,
                "timetable generated"
            );

            Ok(Plan {
                planned,
                entries,
                quality,
                objective_value: solution.objective,
                proven_optimal: solution.proven_optimal,
                generation_time,
                satisfied_constraints: CONSTRAINT_CATEGORIES.to_vec(),
                violated_constraints: Vec::new(),
            })
        }
        BackendOutcome::Infeasible => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "proven infeasible");
            Err(ScheduleError::Infeasible { considered: CONSTRAINT_CATEGORIES.to_vec() })
        }
        BackendOutcome::Timeout => Err(ScheduleError::Timeout),
        BackendOutcome::Cancelled => Err(ScheduleError::Cancelled),
    }
}
