//! Conflict detection
//!
//! Pure predicates over candidate and persisted schedule entries. The
//! detector never fails: it returns a (possibly empty) list of typed
//! [`Conflict`] values. Check order inside [`ConflictDetector::validate_candidate`]
//! is fixed: break → qualification → availability → teacher → class → room.

use serde::Serialize;

use crate::{
    AvailabilityKind, ClassId, DomainSnapshot, EntryDraft, EntryId, ScheduleEntry, SubjectId,
    TeacherId, TimeSlotId,
};

/// A violated scheduling invariant, with enough context for a human message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// The time slot is a break period.
    BreakConflict { timeslot_id: TimeSlotId },
    /// No valid qualification for the subject at the class's grade.
    QualificationConflict {
        teacher_id: TeacherId,
        subject_id: SubjectId,
        grade: u8,
    },
    /// Teacher availability is BLOCKED at this cell.
    AvailabilityConflict {
        teacher_id: TeacherId,
        weekday: u8,
        period: u8,
    },
    /// Teacher already scheduled at an overlapping (slot, week).
    TeacherConflict {
        teacher_id: TeacherId,
        existing_entry_id: EntryId,
    },
    /// Class already scheduled at an overlapping (slot, week).
    ClassConflict {
        class_id: ClassId,
        existing_entry_id: EntryId,
    },
    /// Room already booked at an overlapping (slot, week).
    RoomConflict {
        room: String,
        existing_entry_id: EntryId,
    },
}

impl Conflict {
    /// Stable machine-readable conflict kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Conflict::BreakConflict { .. } => "BREAK_CONFLICT",
            Conflict::QualificationConflict { .. } => "QUALIFICATION_CONFLICT",
            Conflict::AvailabilityConflict { .. } => "AVAILABILITY_CONFLICT",
            Conflict::TeacherConflict { .. } => "TEACHER_CONFLICT",
            Conflict::ClassConflict { .. } => "CLASS_CONFLICT",
            Conflict::RoomConflict { .. } => "ROOM_CONFLICT",
        }
    }

    /// The colliding persisted entry, if the conflict has one.
    pub fn existing_entry(&self) -> Option<EntryId> {
        match self {
            Conflict::TeacherConflict { existing_entry_id, .. }
            | Conflict::ClassConflict { existing_entry_id, .. }
            | Conflict::RoomConflict { existing_entry_id, .. } => Some(*existing_entry_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::BreakConflict { .. } => {
                write!(f, "cannot schedule lessons during break periods")
            }
            Conflict::QualificationConflict { teacher_id, subject_id, grade } => write!(
                f,
                "teacher {teacher_id} has no valid qualification for subject {subject_id} at grade {grade}"
            ),
            Conflict::AvailabilityConflict { teacher_id, weekday, period } => write!(
                f,
                "teacher {teacher_id} is not available on weekday {weekday} period {period}"
            ),
            Conflict::TeacherConflict { teacher_id, existing_entry_id } => write!(
                f,
                "teacher {teacher_id} is already scheduled at this time (entry {existing_entry_id})"
            ),
            Conflict::ClassConflict { class_id, existing_entry_id } => write!(
                f,
                "class {class_id} already has a lesson at this time (entry {existing_entry_id})"
            ),
            Conflict::RoomConflict { room, existing_entry_id } => write!(
                f,
                "room '{room}' is already booked at this time (entry {existing_entry_id})"
            ),
        }
    }
}

/// Conflicts one persisted entry participates in.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryConflicts {
    pub entry_id: EntryId,
    pub conflicts: Vec<Conflict>,
}

/// Result of validating one candidate entry.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub conflicts: Vec<Conflict>,
}

/// Conflict detector over one domain snapshot.
///
/// Synchronous and allocation-light; safe to call from request-serving
/// paths.
pub struct ConflictDetector<'a> {
    snapshot: &'a DomainSnapshot,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(snapshot: &'a DomainSnapshot) -> Self {
        Self { snapshot }
    }

    /// Check a single candidate against an entry set.
    ///
    /// `exclude` skips one persisted entry id, so an update can validate
    /// its replacement against everything but itself. Candidates with
    /// unresolvable references are checked against whatever does resolve;
    /// callers reject dangling ids up front via
    /// [`DomainSnapshot::check_draft_refs`].
    pub fn validate_candidate(
        &self,
        candidate: &EntryDraft,
        entries: &[ScheduleEntry],
        exclude: Option<EntryId>,
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let slot = self.snapshot.timeslot(candidate.timeslot_id);

        if let Some(slot) = slot {
            if slot.is_break {
                conflicts.push(Conflict::BreakConflict { timeslot_id: slot.id });
            }
        }

        if let Some(class) = self.snapshot.class(candidate.class_id) {
            if self
                .snapshot
                .valid_qualification(candidate.teacher_id, candidate.subject_id, class.grade)
                .is_none()
            {
                conflicts.push(Conflict::QualificationConflict {
                    teacher_id: candidate.teacher_id,
                    subject_id: candidate.subject_id,
                    grade: class.grade,
                });
            }
        }

        if let Some(slot) = slot {
            let weekday = slot.weekday();
            if self.snapshot.availability(candidate.teacher_id, weekday, slot.period)
                == Some(AvailabilityKind::Blocked)
            {
                conflicts.push(Conflict::AvailabilityConflict {
                    teacher_id: candidate.teacher_id,
                    weekday,
                    period: slot.period,
                });
            }
        }

        let colliding = |entry: &&ScheduleEntry| {
            entry.timeslot_id == candidate.timeslot_id
                && entry.week_type.overlaps(candidate.week_type)
                && Some(entry.id) != exclude
        };

        if let Some(existing) = entries
            .iter()
            .filter(colliding)
            .find(|e| e.teacher_id == candidate.teacher_id)
        {
            conflicts.push(Conflict::TeacherConflict {
                teacher_id: candidate.teacher_id,
                existing_entry_id: existing.id,
            });
        }

        if let Some(existing) = entries
            .iter()
            .filter(colliding)
            .find(|e| e.class_id == candidate.class_id)
        {
            conflicts.push(Conflict::ClassConflict {
                class_id: candidate.class_id,
                existing_entry_id: existing.id,
            });
        }

        if let Some(room) = &candidate.room {
            if let Some(existing) = entries
                .iter()
                .filter(colliding)
                .find(|e| e.room.as_deref() == Some(room.as_str()))
            {
                conflicts.push(Conflict::RoomConflict {
                    room: room.clone(),
                    existing_entry_id: existing.id,
                });
            }
        }

        conflicts
    }

    /// Validate a candidate and wrap the result for the REST layer.
    pub fn validate(
        &self,
        candidate: &EntryDraft,
        entries: &[ScheduleEntry],
        exclude: Option<EntryId>,
    ) -> ValidationReport {
        let conflicts = self.validate_candidate(candidate, entries, exclude);
        ValidationReport { valid: conflicts.is_empty(), conflicts }
    }

    /// Every persisted entry together with the conflicts it participates
    /// in. Entries without conflicts are omitted; an empty result means the
    /// schedule is legal.
    pub fn scan(&self, entries: &[ScheduleEntry]) -> Vec<EntryConflicts> {
        entries
            .iter()
            .filter_map(|entry| {
                let conflicts =
                    self.validate_candidate(&entry.as_draft(), entries, Some(entry.id));
                if conflicts.is_empty() {
                    None
                } else {
                    Some(EntryConflicts { entry_id: entry.id, conflicts })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::{
        DomainSnapshot, EntryDraft, Qualification, ScheduleEntry, TeacherAvailability, WeekType,
    };

    fn snap() -> DomainSnapshot {
        DomainSnapshot::build(small_domain(), reference()).unwrap()
    }

    #[test]
    fn break_slot_is_rejected() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        // Slot 3 is the Monday break
        let candidate = EntryDraft::new(10, 1, 100, 3);
        let report = det.validate(&candidate, &[], None);
        assert!(!report.valid);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind(), "BREAK_CONFLICT");
    }

    #[test]
    fn missing_qualification_is_rejected() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        // MUE (1) is qualified for MA (100), not DE (101)
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 1, 101, 1), &[], None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind(), "QUALIFICATION_CONFLICT");
    }

    #[test]
    fn expired_certification_is_a_qualification_conflict() {
        let mut data = small_domain();
        data.qualifications[0] =
            Qualification::new(1, 1, 100).certified(date(2025, 1, 1), Some(reference()));
        let snap = DomainSnapshot::build(data, reference()).unwrap();
        let det = ConflictDetector::new(&snap);
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 1, 100, 1), &[], None);
        assert_eq!(conflicts[0].kind(), "QUALIFICATION_CONFLICT");
    }

    #[test]
    fn grade_outside_mask_is_a_qualification_conflict() {
        let mut data = small_domain();
        data.classes[0].grade = 3;
        data.qualifications[0] = Qualification::new(1, 1, 100).grades([1, 2]);
        let snap = DomainSnapshot::build(data, reference()).unwrap();
        let det = ConflictDetector::new(&snap);
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 1, 100, 1), &[], None);
        assert_eq!(conflicts[0].kind(), "QUALIFICATION_CONFLICT");
    }

    #[test]
    fn blocked_availability_is_rejected() {
        let mut data = small_domain();
        data.availabilities.push(TeacherAvailability::new(
            1,
            1,
            0,
            1,
            crate::AvailabilityKind::Blocked,
            date(2026, 1, 1),
        ));
        let snap = DomainSnapshot::build(data, reference()).unwrap();
        let det = ConflictDetector::new(&snap);
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 1, 100, 1), &[], None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind(), "AVAILABILITY_CONFLICT");
    }

    #[test]
    fn teacher_double_booking_names_existing_entry() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing = ScheduleEntry::from_draft(55, EntryDraft::new(10, 1, 100, 1));
        // Same teacher, other class, same slot
        let conflicts =
            det.validate_candidate(&EntryDraft::new(11, 1, 100, 1), &[existing], None);
        assert!(conflicts.iter().any(|c| c.kind() == "TEACHER_CONFLICT"));
        assert_eq!(
            conflicts.iter().find(|c| c.kind() == "TEACHER_CONFLICT").unwrap().existing_entry(),
            Some(55)
        );
    }

    #[test]
    fn class_double_booking_is_rejected() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing = ScheduleEntry::from_draft(7, EntryDraft::new(10, 1, 100, 1));
        let conflicts =
            det.validate_candidate(&EntryDraft::new(10, 2, 101, 1), &[existing], None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind(), "CLASS_CONFLICT");
    }

    #[test]
    fn room_double_booking_is_rejected() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing =
            ScheduleEntry::from_draft(7, EntryDraft::new(10, 1, 100, 1).room("Turnhalle"));
        let conflicts = det.validate_candidate(
            &EntryDraft::new(11, 2, 101, 1).room("Turnhalle"),
            &[existing],
            None,
        );
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind(), "ROOM_CONFLICT");
    }

    #[test]
    fn a_and_b_weeks_do_not_collide() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing = ScheduleEntry::from_draft(
            7,
            EntryDraft::new(10, 1, 100, 1).week_type(WeekType::A),
        );
        // Same class and slot, other teacher/subject, week B
        let report = det.validate(
            &EntryDraft::new(10, 2, 101, 1).week_type(WeekType::B),
            &[existing],
            None,
        );
        assert!(report.valid, "week A and week B share the slot");
    }

    #[test]
    fn all_week_collides_with_either_half() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing = ScheduleEntry::from_draft(
            7,
            EntryDraft::new(10, 1, 100, 1).week_type(WeekType::B),
        );
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 2, 101, 1), &[existing], None);
        assert_eq!(conflicts[0].kind(), "CLASS_CONFLICT");
    }

    #[test]
    fn check_order_is_deterministic() {
        let mut data = small_domain();
        data.availabilities.push(TeacherAvailability::new(
            1,
            1,
            0,
            3,
            crate::AvailabilityKind::Blocked,
            date(2026, 1, 1),
        ));
        let snap = DomainSnapshot::build(data, reference()).unwrap();
        let det = ConflictDetector::new(&snap);
        // Break slot + wrong subject + blocked availability at once
        let conflicts = det.validate_candidate(&EntryDraft::new(10, 1, 101, 3), &[], None);
        let kinds: Vec<_> = conflicts.iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec!["BREAK_CONFLICT", "QUALIFICATION_CONFLICT", "AVAILABILITY_CONFLICT"]
        );
    }

    #[test]
    fn exclude_skips_the_entry_itself() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let entry = ScheduleEntry::from_draft(7, EntryDraft::new(10, 1, 100, 1));
        let conflicts =
            det.validate_candidate(&entry.as_draft(), std::slice::from_ref(&entry), Some(7));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn scan_reports_both_sides_of_a_collision() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let entries = vec![
            ScheduleEntry::from_draft(1, EntryDraft::new(10, 1, 100, 1)),
            ScheduleEntry::from_draft(2, EntryDraft::new(11, 1, 100, 1)),
        ];
        let report = det.scan(&entries);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].entry_id, 1);
        assert_eq!(report[0].conflicts[0].kind(), "TEACHER_CONFLICT");
        assert_eq!(report[1].entry_id, 2);
    }

    #[test]
    fn scan_of_legal_schedule_is_empty() {
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let entries = vec![
            ScheduleEntry::from_draft(1, EntryDraft::new(10, 1, 100, 1)),
            ScheduleEntry::from_draft(2, EntryDraft::new(11, 2, 101, 1)),
            ScheduleEntry::from_draft(3, EntryDraft::new(10, 2, 101, 2)),
            ScheduleEntry::from_draft(4, EntryDraft::new(11, 1, 100, 2)),
        ];
        assert!(det.scan(&entries).is_empty());
    }

    #[test]
    fn validate_agrees_with_scan() {
        // Inserting a candidate that validate() accepts must keep scan() empty
        let snap = snap();
        let det = ConflictDetector::new(&snap);
        let existing = vec![ScheduleEntry::from_draft(1, EntryDraft::new(10, 1, 100, 1))];
        let candidate = EntryDraft::new(11, 2, 101, 1);

        let report = det.validate(&candidate, &existing, None);
        assert!(report.valid);

        let mut all = existing;
        all.push(ScheduleEntry::from_draft(2, candidate));
        assert!(det.scan(&all).is_empty());
    }
}
