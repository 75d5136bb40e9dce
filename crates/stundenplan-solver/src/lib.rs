//! # stundenplan-solver
//!
//! CP-SAT timetable generation for the Grundschule scheduler.
//!
//! This crate provides:
//! - The [`CpBackend`] adapter boundary and its Pumpkin implementation
//! - The solve pipeline: variable construction, hard constraints, soft
//!   objective, search, extraction, re-validation and scoring
//! - The public [`generate`] / [`optimize`] / [`plan`] operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use stundenplan_core::MemoryStore;
//! use stundenplan_solver::{generate, SolveConfig};
//!
//! let mut store = MemoryStore::new(domain_data);
//! let config = SolveConfig::default().clear_existing(true).time_limit_seconds(30);
//! let result = generate(&mut store, &config)?;
//! println!("{} lessons, quality {:.1}", result.entries.len(), result.quality.total);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use stundenplan_core::{
    ClassId, DomainSnapshot, QualityReport, ScheduleEntry, ScheduleError, ScheduleStore, SubjectId,
};

pub mod backend;
mod constraints;
mod driver;
mod extract;
mod objective;
pub mod pumpkin;
mod variables;

pub use backend::{
    BackendOutcome, BackendSolution, BoolVar, CancelToken, CpBackend, LinearOp, SolveParams,
};
pub use constraints::CONSTRAINT_CATEGORIES;
pub use extract::PlannedEntry;
pub use objective::{
    WEIGHT_CORE_MORNING, WEIGHT_PREFERRED_SLOT, WEIGHT_PRIMARY_LEVEL, WEIGHT_SPORT_AFTERNOON,
    WEIGHT_SUBSTITUTE_LEVEL,
};
pub use pumpkin::PumpkinBackend;

// ============================================================================
// Configuration
// ============================================================================

/// Options of one solve.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Pin every current entry; the solver plans around them.
    pub preserve_existing: bool,
    /// Delete all current entries inside the write transaction and plan a
    /// fresh schedule.
    pub clear_existing: bool,
    /// Wall-clock budget in seconds, 1–3600.
    pub time_limit_seconds: u32,
    /// Date anchoring certification and availability windows; today when
    /// absent.
    pub reference_date: Option<NaiveDate>,
    /// Search seed; recorded for reproducibility.
    pub random_seed: Option<u64>,
    /// Exact weekly lesson counts per (class, subject). Absent pairs
    /// default to 0. With no map at all, the solver assigns as many valid
    /// lessons as the objective rewards.
    pub demand: Option<BTreeMap<(ClassId, SubjectId), u32>>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            preserve_existing: true,
            clear_existing: false,
            time_limit_seconds: 60,
            reference_date: None,
            random_seed: None,
            demand: None,
        }
    }
}

impl SolveConfig {
    pub fn preserve_existing(mut self, preserve: bool) -> Self {
        self.preserve_existing = preserve;
        self
    }

    pub fn clear_existing(mut self, clear: bool) -> Self {
        self.clear_existing = clear;
        self
    }

    pub fn time_limit_seconds(mut self, seconds: u32) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn demand(mut self, demand: BTreeMap<(ClassId, SubjectId), u32>) -> Self {
        self.demand = Some(demand);
        self
    }

    fn check(&self) -> Result<(), ScheduleError> {
        if !(1..=3600).contains(&self.time_limit_seconds) {
            return Err(ScheduleError::Validation(format!(
                "time_limit_seconds {} out of range 1-3600",
                self.time_limit_seconds
            )));
        }
        if !self.preserve_existing && !self.clear_existing {
            return Err(ScheduleError::Validation(
                "either preserve_existing or clear_existing must be set".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of a pure planning run (no persistence).
#[derive(Clone, Debug)]
pub struct Plan {
    /// Planned lessons with their pin provenance.
    pub planned: Vec<PlannedEntry>,
    /// The same lessons as schedule entries; fresh lessons carry synthetic
    /// ids above every pinned id.
    pub entries: Vec<ScheduleEntry>,
    pub quality: QualityReport,
    pub objective_value: i64,
    pub proven_optimal: bool,
    pub generation_time: Duration,
    pub satisfied_constraints: Vec<&'static str>,
    pub violated_constraints: Vec<&'static str>,
}

/// Outcome of a persisted solve.
#[derive(Clone, Debug)]
pub struct SolveResult {
    /// The stored schedule, with store-assigned ids.
    pub entries: Vec<ScheduleEntry>,
    pub quality: QualityReport,
    pub generation_time: Duration,
    pub satisfied_constraints: Vec<&'static str>,
    pub violated_constraints: Vec<&'static str>,
    pub objective_value: i64,
    pub proven_optimal: bool,
}

// ============================================================================
// Operations
// ============================================================================

/// Plan a schedule on a frozen snapshot with the Pumpkin backend.
pub fn plan(
    snapshot: &DomainSnapshot,
    config: &SolveConfig,
    cancel: &CancelToken,
) -> Result<Plan, ScheduleError> {
    let mut backend = PumpkinBackend::new();
    plan_with_backend(&mut backend, snapshot, config, cancel)
}

/// Plan a schedule on any [`CpBackend`] implementation.
pub fn plan_with_backend<B: CpBackend>(
    backend: &mut B,
    snapshot: &DomainSnapshot,
    config: &SolveConfig,
    cancel: &CancelToken,
) -> Result<Plan, ScheduleError> {
    config.check()?;
    let pins: Vec<ScheduleEntry> = if config.clear_existing {
        Vec::new()
    } else {
        snapshot.entries().to_vec()
    };
    driver::solve(backend, snapshot, config, &pins, cancel)
}

/// Generate a schedule and persist it in one transaction.
pub fn generate(
    store: &mut dyn ScheduleStore,
    config: &SolveConfig,
) -> Result<SolveResult, ScheduleError> {
    generate_with(store, config, &CancelToken::new())
}

/// [`generate`] with an external cancellation token.
pub fn generate_with(
    store: &mut dyn ScheduleStore,
    config: &SolveConfig,
    cancel: &CancelToken,
) -> Result<SolveResult, ScheduleError> {
    let data = store.load()?;
    let reference_date = config.reference_date.unwrap_or_else(|| Utc::now().date_naive());
    let snapshot = DomainSnapshot::build(data, reference_date)?;
    let plan = plan(&snapshot, config, cancel)?;

    let entries = if config.clear_existing {
        store.replace_entries(plan.planned.iter().map(|p| p.draft.clone()).collect())?
    } else {
        let fresh: Vec<_> = plan
            .planned
            .iter()
            .filter(|p| p.pinned.is_none())
            .map(|p| p.draft.clone())
            .collect();
        let inserted = store.append_entries(fresh)?;
        let mut all: Vec<ScheduleEntry> = snapshot.entries().to_vec();
        all.extend(inserted);
        sort_schedule(&snapshot, &mut all);
        all
    };

    Ok(SolveResult {
        entries,
        quality: plan.quality,
        generation_time: plan.generation_time,
        satisfied_constraints: plan.satisfied_constraints,
        violated_constraints: plan.violated_constraints,
        objective_value: plan.objective_value,
        proven_optimal: plan.proven_optimal,
    })
}

/// Improve the current schedule while keeping every existing entry fixed.
pub fn optimize(
    store: &mut dyn ScheduleStore,
    config: &SolveConfig,
) -> Result<SolveResult, ScheduleError> {
    let config = config.clone().preserve_existing(true).clear_existing(false);
    generate(store, &config)
}

fn sort_schedule(snapshot: &DomainSnapshot, entries: &mut [ScheduleEntry]) {
    entries.sort_by_key(|entry| {
        let (day, period) = snapshot
            .timeslot(entry.timeslot_id)
            .map(|slot| (slot.day, slot.period))
            .unwrap_or((u8::MAX, u8::MAX));
        (day, period, entry.class_id, entry.teacher_id, entry.week_type)
    });
}

// ============================================================================
// Test fixtures
// ============================================================================
