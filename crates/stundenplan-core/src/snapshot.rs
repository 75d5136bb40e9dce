//! Frozen domain snapshot
//!
//! One solve operates on a single [`DomainSnapshot`]: an immutable,
//! validated copy of the domain with the lookup indices the solver and the
//! conflict detector need. The snapshot is built once from a
//! read-consistent [`DomainData`] and shared by reference afterwards.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AvailabilityKind, ClassId, EntryDraft, Qualification, QualificationLevel, ScheduleEntry,
    ScheduleError, SchoolClass, Subject, SubjectId, Teacher, TeacherAvailability, TeacherId,
    TimeSlot, TimeSlotId,
};

/// Raw domain input, as loaded from the store in one consistent read.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DomainData {
    pub teachers: Vec<Teacher>,
    pub classes: Vec<SchoolClass>,
    pub subjects: Vec<Subject>,
    pub timeslots: Vec<TimeSlot>,
    pub availabilities: Vec<TeacherAvailability>,
    pub qualifications: Vec<Qualification>,
    pub entries: Vec<ScheduleEntry>,
}

/// Immutable view of the domain for the duration of one solve.
///
/// All iteration orders are deterministic (id order for entities,
/// (day, period) for teaching slots, PRIMARY → SECONDARY → SUBSTITUTE for
/// qualifications of a subject).
#[derive(Clone, Debug)]
pub struct DomainSnapshot {
    reference_date: NaiveDate,
    teachers: BTreeMap<TeacherId, Teacher>,
    classes: BTreeMap<ClassId, SchoolClass>,
    subjects: BTreeMap<SubjectId, Subject>,
    timeslots: BTreeMap<TimeSlotId, TimeSlot>,
    entries: Vec<ScheduleEntry>,
    teaching_slots: Vec<TimeSlotId>,
    qual_by_pair: BTreeMap<(TeacherId, SubjectId), Qualification>,
    qual_by_subject: BTreeMap<SubjectId, Vec<(TeacherId, QualificationLevel)>>,
    availability: BTreeMap<(TeacherId, u8, u8), AvailabilityKind>,
}

impl DomainSnapshot {
    /// Validate `data` and freeze it for a solve anchored at
    /// `reference_date` (certification and availability windows resolve
    /// against this date).
    pub fn build(data: DomainData, reference_date: NaiveDate) -> Result<Self, ScheduleError> {
        validate(&data)?;

        let teachers: BTreeMap<_, _> = data.teachers.into_iter().map(|t| (t.id, t)).collect();
        let classes: BTreeMap<_, _> = data.classes.into_iter().map(|c| (c.id, c)).collect();
        let subjects: BTreeMap<_, _> = data.subjects.into_iter().map(|s| (s.id, s)).collect();
        let timeslots: BTreeMap<_, _> = data.timeslots.into_iter().map(|t| (t.id, t)).collect();

        let mut teaching_slots: Vec<TimeSlotId> = timeslots
            .values()
            .filter(|slot| !slot.is_break)
            .map(|slot| slot.id)
            .collect();
        teaching_slots.sort_by_key(|id| {
            let slot = &timeslots[id];
            (slot.day, slot.period)
        });

        // Resolve availability windows at the reference date. When several
        // rows of the same cell are active, the latest effective_from wins.
        let mut picked: BTreeMap<(TeacherId, u8, u8), &TeacherAvailability> = BTreeMap::new();
        for avail in &data.availabilities {
            if !avail.is_active_on(reference_date) {
                continue;
            }
            let key = (avail.teacher_id, avail.weekday, avail.period);
            match picked.get(&key) {
                Some(current) if current.effective_from >= avail.effective_from => {}
                _ => {
                    picked.insert(key, avail);
                }
            }
        }
        let availability: BTreeMap<_, _> =
            picked.into_iter().map(|(key, a)| (key, a.kind)).collect();

        let mut qual_by_pair = BTreeMap::new();
        let mut qual_by_subject: BTreeMap<SubjectId, Vec<(TeacherId, QualificationLevel)>> =
            BTreeMap::new();
        for qual in data.qualifications {
            qual_by_subject
                .entry(qual.subject_id)
                .or_default()
                .push((qual.teacher_id, qual.level));
            qual_by_pair.insert((qual.teacher_id, qual.subject_id), qual);
        }
        for teachers_of_subject in qual_by_subject.values_mut() {
            teachers_of_subject.sort_by_key(|(teacher_id, level)| (*level, *teacher_id));
        }

        let mut entries = data.entries;
        entries.sort_by_key(|e| e.id);

        debug!(
            teachers = teachers.len(),
            classes = classes.len(),
            subjects = subjects.len(),
            teaching_slots = teaching_slots.len(),
            entries = entries.len(),
            %reference_date,
            "domain snapshot frozen"
        );

        Ok(Self {
            reference_date,
            teachers,
            classes,
            subjects,
            timeslots,
            entries,
            teaching_slots,
            qual_by_pair,
            qual_by_subject,
            availability,
        })
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn teacher(&self, id: TeacherId) -> Option<&Teacher> {
        self.teachers.get(&id)
    }

    pub fn class(&self, id: ClassId) -> Option<&SchoolClass> {
        self.classes.get(&id)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.get(&id)
    }

    pub fn timeslot(&self, id: TimeSlotId) -> Option<&TimeSlot> {
        self.timeslots.get(&id)
    }

    pub fn teachers(&self) -> impl Iterator<Item = &Teacher> {
        self.teachers.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = &SchoolClass> {
        self.classes.values()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Persisted schedule entries at snapshot time, in id order.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Non-break slots ordered by (day, period).
    pub fn teaching_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.teaching_slots.iter().map(|id| &self.timeslots[id])
    }

    /// Availability kind at a (teacher, weekday, period) cell, resolved at
    /// the reference date. None = no row, treated as neutral.
    pub fn availability(&self, teacher_id: TeacherId, weekday: u8, period: u8) -> Option<AvailabilityKind> {
        self.availability.get(&(teacher_id, weekday, period)).copied()
    }

    /// The (unique) qualification row for a (teacher, subject) pair.
    pub fn qualification(&self, teacher_id: TeacherId, subject_id: SubjectId) -> Option<&Qualification> {
        self.qual_by_pair.get(&(teacher_id, subject_id))
    }

    /// All qualification rows, ordered by (teacher, subject).
    pub fn qualifications(&self) -> impl Iterator<Item = &Qualification> {
        self.qual_by_pair.values()
    }

    /// The qualification for (teacher, subject) if it covers `grade` and its
    /// certification is valid on the reference date.
    pub fn valid_qualification(
        &self,
        teacher_id: TeacherId,
        subject_id: SubjectId,
        grade: u8,
    ) -> Option<&Qualification> {
        self.qualification(teacher_id, subject_id)
            .filter(|q| q.covers_grade(grade) && q.is_valid_on(self.reference_date))
    }

    /// Teachers qualified for a subject, best level first.
    pub fn qualified_teachers(
        &self,
        subject_id: SubjectId,
    ) -> impl Iterator<Item = (TeacherId, QualificationLevel)> + '_ {
        self.qual_by_subject
            .get(&subject_id)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Referential check for a candidate entry; run before the conflict
    /// detector so that C2 itself never has to fail.
    pub fn check_draft_refs(&self, draft: &EntryDraft) -> Result<(), ScheduleError> {
        if !self.classes.contains_key(&draft.class_id) {
            return Err(ScheduleError::Validation(format!(
                "unknown class id {}",
                draft.class_id
            )));
        }
        if !self.teachers.contains_key(&draft.teacher_id) {
            return Err(ScheduleError::Validation(format!(
                "unknown teacher id {}",
                draft.teacher_id
            )));
        }
        if !self.subjects.contains_key(&draft.subject_id) {
            return Err(ScheduleError::Validation(format!(
                "unknown subject id {}",
                draft.subject_id
            )));
        }
        if !self.timeslots.contains_key(&draft.timeslot_id) {
            return Err(ScheduleError::Validation(format!(
                "unknown time slot id {}",
                draft.timeslot_id
            )));
        }
        if let Some(room) = &draft.room {
            if room.trim().is_empty() {
                return Err(ScheduleError::Validation("room must not be blank".into()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Boundary validation
// ============================================================================

fn fail(message: impl Into<String>) -> ScheduleError {
    ScheduleError::Validation(message.into())
}

/// Centralized validation of raw domain input. Runs once per snapshot, so
/// everything downstream can rely on well-formed records.
fn validate(data: &DomainData) -> Result<(), ScheduleError> {
    let mut abbreviations = BTreeSet::new();
    for teacher in &data.teachers {
        let len = teacher.abbreviation.chars().count();
        if !(2..=3).contains(&len) {
            return Err(fail(format!(
                "teacher {}: abbreviation '{}' must be 2-3 characters",
                teacher.id, teacher.abbreviation
            )));
        }
        if !abbreviations.insert(teacher.abbreviation.clone()) {
            return Err(fail(format!(
                "duplicate teacher abbreviation '{}'",
                teacher.abbreviation
            )));
        }
        if !(1..=40).contains(&teacher.max_hours_per_week) {
            return Err(fail(format!(
                "teacher {}: max_hours_per_week {} out of range 1-40",
                teacher.id, teacher.max_hours_per_week
            )));
        }
    }

    let mut class_names = BTreeSet::new();
    for class in &data.classes {
        if !(1..=4).contains(&class.grade) {
            return Err(fail(format!(
                "class {}: grade {} out of range 1-4",
                class.name, class.grade
            )));
        }
        if !(1..=35).contains(&class.size) {
            return Err(fail(format!(
                "class {}: size {} out of range 1-35",
                class.name, class.size
            )));
        }
        if !class_names.insert(class.name.clone()) {
            return Err(fail(format!("duplicate class name '{}'", class.name)));
        }
    }

    let mut subject_names = BTreeSet::new();
    let mut subject_codes = BTreeSet::new();
    for subject in &data.subjects {
        let code_len = subject.code.chars().count();
        if !(2..=5).contains(&code_len) {
            return Err(fail(format!(
                "subject {}: code '{}' must be 2-5 characters",
                subject.id, subject.code
            )));
        }
        if !is_hex_color(&subject.color) {
            return Err(fail(format!(
                "subject {}: color '{}' is not #RRGGBB",
                subject.id, subject.color
            )));
        }
        if !subject_names.insert(subject.name.clone()) {
            return Err(fail(format!("duplicate subject name '{}'", subject.name)));
        }
        if !subject_codes.insert(subject.code.clone()) {
            return Err(fail(format!("duplicate subject code '{}'", subject.code)));
        }
    }

    let mut grid = BTreeSet::new();
    for slot in &data.timeslots {
        if !(1..=5).contains(&slot.day) {
            return Err(fail(format!("time slot {}: day {} out of range 1-5", slot.id, slot.day)));
        }
        if !(1..=8).contains(&slot.period) {
            return Err(fail(format!(
                "time slot {}: period {} out of range 1-8",
                slot.id, slot.period
            )));
        }
        if slot.end_time <= slot.start_time {
            return Err(fail(format!(
                "time slot {}: end {} not after start {}",
                slot.id, slot.end_time, slot.start_time
            )));
        }
        if !grid.insert((slot.day, slot.period)) {
            return Err(fail(format!(
                "duplicate time slot for day {} period {}",
                slot.day, slot.period
            )));
        }
    }
    for a in &data.timeslots {
        for b in &data.timeslots {
            if a.id < b.id
                && a.day == b.day
                && !a.is_break
                && !b.is_break
                && a.start_time < b.end_time
                && b.start_time < a.end_time
            {
                return Err(fail(format!(
                    "time slots {} and {} overlap on day {}",
                    a.id, b.id, a.day
                )));
            }
        }
    }

    let teacher_ids: BTreeSet<_> = data.teachers.iter().map(|t| t.id).collect();
    let subject_ids: BTreeSet<_> = data.subjects.iter().map(|s| s.id).collect();
    let class_ids: BTreeSet<_> = data.classes.iter().map(|c| c.id).collect();
    let slot_ids: BTreeSet<_> = data.timeslots.iter().map(|s| s.id).collect();

    let mut avail_keys = BTreeSet::new();
    for avail in &data.availabilities {
        if !teacher_ids.contains(&avail.teacher_id) {
            return Err(fail(format!(
                "availability {}: unknown teacher id {}",
                avail.id, avail.teacher_id
            )));
        }
        if avail.weekday > 4 {
            return Err(fail(format!(
                "availability {}: weekday {} out of range 0-4",
                avail.id, avail.weekday
            )));
        }
        if !(1..=8).contains(&avail.period) {
            return Err(fail(format!(
                "availability {}: period {} out of range 1-8",
                avail.id, avail.period
            )));
        }
        if let Some(until) = avail.effective_until {
            if until < avail.effective_from {
                return Err(fail(format!(
                    "availability {}: effective_until before effective_from",
                    avail.id
                )));
            }
        }
        let key = (avail.teacher_id, avail.weekday, avail.period, avail.effective_from);
        if !avail_keys.insert(key) {
            return Err(fail(format!(
                "duplicate availability row for teacher {} weekday {} period {}",
                avail.teacher_id, avail.weekday, avail.period
            )));
        }
    }

    let mut qual_pairs = BTreeSet::new();
    for qual in &data.qualifications {
        if !teacher_ids.contains(&qual.teacher_id) {
            return Err(fail(format!(
                "qualification {}: unknown teacher id {}",
                qual.id, qual.teacher_id
            )));
        }
        if !subject_ids.contains(&qual.subject_id) {
            return Err(fail(format!(
                "qualification {}: unknown subject id {}",
                qual.id, qual.subject_id
            )));
        }
        if !qual_pairs.insert((qual.teacher_id, qual.subject_id)) {
            return Err(fail(format!(
                "duplicate qualification for teacher {} subject {}",
                qual.teacher_id, qual.subject_id
            )));
        }
        if let Some(grades) = &qual.grades {
            if grades.is_empty() {
                return Err(fail(format!("qualification {}: empty grade list", qual.id)));
            }
            if grades.iter().any(|g| !(1..=4).contains(g)) {
                return Err(fail(format!(
                    "qualification {}: grades must be within 1-4",
                    qual.id
                )));
            }
        }
        if let Some(hours) = qual.max_hours_per_week {
            if !(1..=30).contains(&hours) {
                return Err(fail(format!(
                    "qualification {}: max_hours_per_week {} out of range 1-30",
                    qual.id, hours
                )));
            }
        }
        if let (Some(from), Some(until)) = (qual.certified_from, qual.certified_until) {
            if until < from {
                return Err(fail(format!(
                    "qualification {}: certification expires before it starts",
                    qual.id
                )));
            }
        }
    }

    let mut entry_ids = BTreeSet::new();
    for entry in &data.entries {
        if !entry_ids.insert(entry.id) {
            return Err(fail(format!("duplicate schedule entry id {}", entry.id)));
        }
        if !class_ids.contains(&entry.class_id)
            || !teacher_ids.contains(&entry.teacher_id)
            || !subject_ids.contains(&entry.subject_id)
            || !slot_ids.contains(&entry.timeslot_id)
        {
            return Err(fail(format!(
                "schedule entry {}: dangling entity reference",
                entry.id
            )));
        }
    }

    Ok(())
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
