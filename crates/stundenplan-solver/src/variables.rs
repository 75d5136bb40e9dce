//! Decision variable construction
//!
//! Builds the sparse pool of Boolean variables `x[t, c, s, τ]` ("teacher t
//! teaches class c subject s at slot τ"). Impossible tuples are filtered
//! before any variable exists: break slots, missing or invalid
//! qualifications, and BLOCKED availability cells.
//!
//! Pinned entries with `week_type = ALL` are seeded as variables fixed to
//! 1. Pinned A/B-week entries stay outside the model: they are carried
//! through to extraction verbatim and the constraint compiler excludes
//! colliding ALL assignments at their slots.

use std::collections::BTreeMap;

use stundenplan_core::{
    ClassId, DomainSnapshot, EntryId, QualificationLevel, ScheduleError, ScheduleEntry, SubjectId,
    TeacherId, TimeSlotId, WeekType,
};
use tracing::debug;

use crate::backend::{BoolVar, CpBackend};

pub(crate) type VarKey = (TeacherId, ClassId, SubjectId, TimeSlotId);

/// One decision variable with the slot and qualification facts the
/// constraint and objective compilers need.
#[derive(Clone, Debug)]
pub(crate) struct PoolVar {
    pub teacher_id: TeacherId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub timeslot_id: TimeSlotId,
    pub day: u8,
    pub period: u8,
    pub level: QualificationLevel,
    pub var: BoolVar,
}

impl PoolVar {
    pub fn key(&self) -> VarKey {
        (self.teacher_id, self.class_id, self.subject_id, self.timeslot_id)
    }
}

/// Room and identity of a pinned ALL-week entry whose variable is fixed.
#[derive(Clone, Debug)]
pub(crate) struct PinnedLesson {
    pub entry_id: EntryId,
    pub room: Option<String>,
}

/// The sparse variable pool of one solve.
#[derive(Debug, Default)]
pub(crate) struct VariablePool {
    /// Sorted by (teacher, class, subject, slot); creation order equals
    /// iteration order, which keeps the backend deterministic.
    pub vars: Vec<PoolVar>,
    index: BTreeMap<VarKey, usize>,
    /// ALL-week pins, keyed like their fixed variable.
    pub pinned: BTreeMap<VarKey, PinnedLesson>,
    /// A/B-week pins carried around the model.
    pub carried: Vec<ScheduleEntry>,
}

impl VariablePool {
    pub fn var(&self, key: &VarKey) -> Option<BoolVar> {
        self.index.get(key).map(|&i| self.vars[i].var)
    }

    /// Assemble a pool directly, bypassing the admissibility filters.
    /// Lets tests feed the constraint compiler variables that [`build`]
    /// would have refused to create.
    #[cfg(test)]
    pub(crate) fn with_vars(vars: Vec<PoolVar>) -> Self {
        let index = vars
            .iter()
            .enumerate()
            .map(|(position, pv)| (pv.key(), position))
            .collect();
        Self { vars, index, pinned: BTreeMap::new(), carried: Vec::new() }
    }
}

/// Create all admissible variables and seed the pins.
///
/// Pins must already have passed the conflict detector; a pin whose
/// variable was filtered out here would have been reported there, so a
/// missing key is an internal error.
pub(crate) fn build<B: CpBackend>(
    backend: &mut B,
    snapshot: &DomainSnapshot,
    pins: &[ScheduleEntry],
) -> Result<VariablePool, ScheduleError> {
    let mut pool = VariablePool::default();

    for teacher in snapshot.teachers() {
        for class in snapshot.classes() {
            for subject in snapshot.subjects() {
                let Some(qualification) =
                    snapshot.valid_qualification(teacher.id, subject.id, class.grade)
                else {
                    continue;
                };
                for slot in snapshot.teaching_slots() {
                    debug_assert!(!slot.is_break);
                    if snapshot.availability(teacher.id, slot.weekday(), slot.period)
                        == Some(stundenplan_core::AvailabilityKind::Blocked)
                    {
                        continue;
                    }
                    let var = backend.new_bool_var();
                    let pool_var = PoolVar {
                        teacher_id: teacher.id,
                        class_id: class.id,
                        subject_id: subject.id,
                        timeslot_id: slot.id,
                        day: slot.day,
                        period: slot.period,
                        level: qualification.level,
                        var,
                    };
                    pool.index.insert(pool_var.key(), pool.vars.len());
                    pool.vars.push(pool_var);
                }
            }
        }
    }

    for pin in pins {
        match pin.week_type {
            WeekType::All => {
                let key = (pin.teacher_id, pin.class_id, pin.subject_id, pin.timeslot_id);
                let Some(var) = pool.var(&key) else {
                    return Err(ScheduleError::Internal(format!(
                        "pinned entry {} has no admissible variable",
                        pin.id
                    )));
                };
                backend.fix_var(var, true);
                pool.pinned.insert(key, PinnedLesson { entry_id: pin.id, room: pin.room.clone() });
            }
            WeekType::A | WeekType::B => pool.carried.push(pin.clone()),
        }
    }

    debug!(
        variables = pool.vars.len(),
        pinned = pool.pinned.len(),
        carried = pool.carried.len(),
        "variable pool built"
    );

    Ok(pool)
}
