//! Solution extraction
//!
//! Maps a backend solution back to concrete schedule entries, sorted by
//! (day, period, class, teacher). Fresh assignments are ALL-week with no
//! room; pinned entries keep their identity, room and week type.

use stundenplan_core::{DomainSnapshot, EntryDraft, EntryId, ScheduleError};

use crate::backend::BackendSolution;
use crate::variables::VariablePool;

/// One planned lesson: the draft to persist, plus the id of the pinned
/// entry it re-emits, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedEntry {
    pub draft: EntryDraft,
    pub pinned: Option<EntryId>,
}

pub(crate) fn extract(
    snapshot: &DomainSnapshot,
    pool: &VariablePool,
    solution: &BackendSolution,
) -> Result<Vec<PlannedEntry>, ScheduleError> {
    let mut planned = Vec::new();

    for pv in &pool.vars {
        let pin = pool.pinned.get(&pv.key());
        if !solution.value(pv.var) {
            if let Some(pin) = pin {
                return Err(ScheduleError::Internal(format!(
                    "solver dropped pinned entry {}",
                    pin.entry_id
                )));
            }
            continue;
        }

        let slot = snapshot.timeslot(pv.timeslot_id).ok_or_else(|| {
            ScheduleError::Internal(format!("unknown time slot {} in solution", pv.timeslot_id))
        })?;
        if slot.is_break {
            return Err(ScheduleError::Internal(format!(
                "solver placed a lesson on break slot {}",
                slot.id
            )));
        }

        let mut draft = EntryDraft::new(pv.class_id, pv.teacher_id, pv.subject_id, pv.timeslot_id);
        if let Some(pin) = pin {
            draft.room = pin.room.clone();
        }
        planned.push(PlannedEntry { draft, pinned: pin.map(|p| p.entry_id) });
    }

    for entry in &pool.carried {
        planned.push(PlannedEntry { draft: entry.as_draft(), pinned: Some(entry.id) });
    }

    planned.sort_by_key(|p| {
        let (day, period) = snapshot
            .timeslot(p.draft.timeslot_id)
            .map(|slot| (slot.day, slot.period))
            .unwrap_or((u8::MAX, u8::MAX));
        (day, period, p.draft.class_id, p.draft.teacher_id, p.draft.week_type)
    });

    Ok(planned)
}
