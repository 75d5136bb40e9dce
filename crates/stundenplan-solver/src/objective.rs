//! Soft constraint objective
//!
//! Weighted terms added to the maximized objective. The weights are fixed
//! in this version; gap minimization and workload balancing are left to a
//! future revision.

use stundenplan_core::{AvailabilityKind, DomainSnapshot, QualificationLevel};

use crate::backend::CpBackend;
use crate::variables::VariablePool;

/// Lesson on a PREFERRED availability cell.
pub const WEIGHT_PREFERRED_SLOT: i32 = 10;
/// Lesson taught at PRIMARY qualification level.
pub const WEIGHT_PRIMARY_LEVEL: i32 = 5;
/// Lesson taught by a SUBSTITUTE, discouraged.
pub const WEIGHT_SUBSTITUTE_LEVEL: i32 = -3;
/// Core subject (Deutsch, Mathematik, Sachunterricht) in periods 1–3.
pub const WEIGHT_CORE_MORNING: i32 = 8;
/// Sport from period 4 on.
pub const WEIGHT_SPORT_AFTERNOON: i32 = 3;

/// Attach the combined weight of every soft term to each variable.
pub(crate) fn compile<B: CpBackend>(
    backend: &mut B,
    snapshot: &DomainSnapshot,
    pool: &VariablePool,
) {
    for pv in &pool.vars {
        let mut weight = 0;

        if snapshot.availability(pv.teacher_id, pv.day - 1, pv.period)
            == Some(AvailabilityKind::Preferred)
        {
            weight += WEIGHT_PREFERRED_SLOT;
        }

        match pv.level {
            QualificationLevel::Primary => weight += WEIGHT_PRIMARY_LEVEL,
            QualificationLevel::Secondary => {}
            QualificationLevel::Substitute => weight += WEIGHT_SUBSTITUTE_LEVEL,
        }

        if let Some(subject) = snapshot.subject(pv.subject_id) {
            if subject.is_core() && pv.period <= 3 {
                weight += WEIGHT_CORE_MORNING;
            }
            if subject.is_sport() && pv.period >= 4 {
                weight += WEIGHT_SPORT_AFTERNOON;
            }
        }

        if weight != 0 {
            backend.add_objective_term(weight, pv.var);
        }
    }
}
