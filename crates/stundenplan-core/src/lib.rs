//! # stundenplan-core
//!
//! Core domain model for the Grundschule weekly timetabler.
//!
//! This crate provides:
//! - Domain types: `Teacher`, `SchoolClass`, `Subject`, `TimeSlot`,
//!   `TeacherAvailability`, `Qualification`, `ScheduleEntry`
//! - The frozen [`DomainSnapshot`] used for the duration of one solve
//! - The [`ConflictDetector`] validating candidate and persisted entries
//! - The [`QualityReport`] scoring a schedule on a 0–100 scale
//! - Error types and the persistence seam ([`ScheduleStore`])
//!
//! ## Example
//!
//! ```rust
//! use stundenplan_core::{SchoolClass, Subject, Teacher};
//!
//! let teacher = Teacher::new(1, "MUE")
//!     .name("Anna", "Müller")
//!     .max_hours_per_week(28);
//! let class = SchoolClass::new(10, "1a", 1).size(24);
//! let subject = Subject::new(100, "Mathematik", "MA");
//! assert!(subject.is_core());
//! assert!(!teacher.is_part_time);
//! assert_eq!(class.grade, 1);
//! ```

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod conflict;
pub mod quality;
pub mod snapshot;
pub mod store;

pub use conflict::{Conflict, ConflictDetector, EntryConflicts, ValidationReport};
pub use quality::QualityReport;
pub use snapshot::{DomainData, DomainSnapshot};
pub use store::{create_entries_bulk, MemoryStore, ScheduleStore};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a teacher
pub type TeacherId = i64;

/// Unique identifier for a class
pub type ClassId = i64;

/// Unique identifier for a subject
pub type SubjectId = i64;

/// Unique identifier for a time slot
pub type TimeSlotId = i64;

/// Unique identifier for a schedule entry
pub type EntryId = i64;

// ============================================================================
// Enumerations
// ============================================================================

/// Bi-weekly alternation marker for schedule entries.
///
/// `All` collides with everything; `A` and `B` only collide with
/// themselves and with `All`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeekType {
    #[default]
    All,
    A,
    B,
}

impl WeekType {
    /// Whether two entries at the same slot occupy overlapping weeks.
    pub fn overlaps(self, other: WeekType) -> bool {
        self == WeekType::All || other == WeekType::All || self == other
    }
}

impl std::fmt::Display for WeekType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeekType::All => write!(f, "ALL"),
            WeekType::A => write!(f, "A"),
            WeekType::B => write!(f, "B"),
        }
    }
}

/// Availability kind for one (teacher, weekday, period) cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AvailabilityKind {
    Available,
    Blocked,
    Preferred,
}

/// Qualification level of a teacher for a subject.
///
/// The ordering is by preference: `Primary` sorts first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualificationLevel {
    /// Hauptfach, full qualification
    Primary,
    /// Nebenfach, can teach if needed
    Secondary,
    /// Vertretung, emergency only
    Substitute,
}

// ============================================================================
// Teacher
// ============================================================================

/// A teacher with contractual bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub first_name: String,
    pub last_name: String,
    /// Contact address, display only
    pub email: Option<String>,
    /// Short code, 2–3 characters, unique school-wide
    pub abbreviation: String,
    /// Contracted teaching hours per week, 1–40
    pub max_hours_per_week: u32,
    /// Part-time teachers are limited to 3 working days and a reduced
    /// daily bound
    pub is_part_time: bool,
}

impl Teacher {
    pub fn new(id: TeacherId, abbreviation: impl Into<String>) -> Self {
        Self {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            abbreviation: abbreviation.into(),
            max_hours_per_week: 28,
            is_part_time: false,
        }
    }

    pub fn name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn max_hours_per_week(mut self, hours: u32) -> Self {
        self.max_hours_per_week = hours;
        self
    }

    pub fn part_time(mut self) -> Self {
        self.is_part_time = true;
        self
    }

    /// Daily teaching bound: 6 periods full-time, 3 part-time.
    pub fn max_hours_per_day(&self) -> u32 {
        if self.is_part_time {
            3
        } else {
            6
        }
    }
}

// ============================================================================
// SchoolClass
// ============================================================================

/// A class of students, e.g. "3b".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: ClassId,
    /// Unique label like "1a"
    pub name: String,
    /// School year cohort, 1–4
    pub grade: u8,
    /// Number of students, 1–35
    pub size: u32,
    pub home_room: Option<String>,
}

impl SchoolClass {
    pub fn new(id: ClassId, name: impl Into<String>, grade: u8) -> Self {
        Self {
            id,
            name: name.into(),
            grade,
            size: 20,
            home_room: None,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn home_room(mut self, room: impl Into<String>) -> Self {
        self.home_room = Some(room.into());
        self
    }
}

// ============================================================================
// Subject
// ============================================================================

/// Codes of the core subjects Deutsch, Mathematik and Sachunterricht.
pub const CORE_SUBJECT_CODES: [&str; 3] = ["DE", "MA", "SU"];

/// Name fragments identifying physical-education subjects.
pub const SPORT_SUBJECT_KEYWORDS: [&str; 4] = ["sport", "turnen", "bewegung", "schwimmen"];

/// A catalog subject such as Deutsch or Sport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    /// Unique display name
    pub name: String,
    /// Unique short code, 2–5 characters
    pub code: String,
    /// Display color as "#RRGGBB"
    pub color: String,
}

impl Subject {
    pub fn new(id: SubjectId, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
            color: "#808080".into(),
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Core subjects belong in the morning periods.
    pub fn is_core(&self) -> bool {
        CORE_SUBJECT_CODES.contains(&self.code.as_str())
    }

    /// Sport subjects belong in the afternoon periods.
    pub fn is_sport(&self) -> bool {
        let name = self.name.to_lowercase();
        self.code == "SP" || SPORT_SUBJECT_KEYWORDS.iter().any(|kw| name.contains(kw))
    }
}

// ============================================================================
// TimeSlot
// ============================================================================

/// One cell of the weekly grid: a (day, period) pair with wall-clock times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: TimeSlotId,
    /// 1 = Monday … 5 = Friday
    pub day: u8,
    /// 1–8 within the day
    pub period: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_break: bool,
}

impl TimeSlot {
    pub fn new(id: TimeSlotId, day: u8, period: u8, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            id,
            day,
            period,
            start_time: start,
            end_time: end,
            is_break: false,
        }
    }

    pub fn as_break(mut self) -> Self {
        self.is_break = true;
        self
    }

    /// Availability rows use 0-indexed weekdays; slots use 1-indexed days.
    pub fn weekday(&self) -> u8 {
        self.day - 1
    }
}

// ============================================================================
// TeacherAvailability
// ============================================================================

/// One availability cell for a teacher, with a validity window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeacherAvailability {
    pub id: i64,
    pub teacher_id: TeacherId,
    /// 0 = Monday … 4 = Friday
    pub weekday: u8,
    /// 1–8
    pub period: u8,
    pub kind: AvailabilityKind,
    pub effective_from: NaiveDate,
    /// None = open ended
    pub effective_until: Option<NaiveDate>,
    pub reason: Option<String>,
}

impl TeacherAvailability {
    pub fn new(
        id: i64,
        teacher_id: TeacherId,
        weekday: u8,
        period: u8,
        kind: AvailabilityKind,
        effective_from: NaiveDate,
    ) -> Self {
        Self {
            id,
            teacher_id,
            weekday,
            period,
            kind,
            effective_from,
            effective_until: None,
            reason: None,
        }
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.effective_until = Some(date);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether the row applies on the given date.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if date < self.effective_from {
            return false;
        }
        match self.effective_until {
            Some(until) => date <= until,
            None => true,
        }
    }
}

// ============================================================================
// Qualification
// ============================================================================

/// A (teacher, subject) qualification with level, grade mask and an
/// optional certification window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub id: i64,
    pub teacher_id: TeacherId,
    pub subject_id: SubjectId,
    pub level: QualificationLevel,
    /// Allowed grades; None = all grades
    pub grades: Option<Vec<u8>>,
    /// Per-subject weekly cap for this teacher, 1–30
    pub max_hours_per_week: Option<u32>,
    pub certified_from: Option<NaiveDate>,
    pub certified_until: Option<NaiveDate>,
}

impl Qualification {
    pub fn new(id: i64, teacher_id: TeacherId, subject_id: SubjectId) -> Self {
        Self {
            id,
            teacher_id,
            subject_id,
            level: QualificationLevel::Primary,
            grades: None,
            max_hours_per_week: None,
            certified_from: None,
            certified_until: None,
        }
    }

    pub fn level(mut self, level: QualificationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn grades(mut self, grades: impl Into<Vec<u8>>) -> Self {
        self.grades = Some(grades.into());
        self
    }

    pub fn max_hours_per_week(mut self, hours: u32) -> Self {
        self.max_hours_per_week = Some(hours);
        self
    }

    pub fn certified(mut self, from: NaiveDate, until: Option<NaiveDate>) -> Self {
        self.certified_from = Some(from);
        self.certified_until = until;
        self
    }

    /// Whether the qualification covers the given grade.
    pub fn covers_grade(&self, grade: u8) -> bool {
        match &self.grades {
            Some(grades) => grades.contains(&grade),
            None => true,
        }
    }

    /// Whether the certification is valid on the given date.
    ///
    /// A certification expiring exactly on `date` is already expired;
    /// validity requires `date < certified_until`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.certified_from {
            if date < from {
                return false;
            }
        }
        match self.certified_until {
            Some(until) => date < until,
            None => true,
        }
    }
}

// ============================================================================
// ScheduleEntry
// ============================================================================

/// A candidate schedule entry, not yet persisted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryDraft {
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub subject_id: SubjectId,
    pub timeslot_id: TimeSlotId,
    pub room: Option<String>,
    pub week_type: WeekType,
}

impl EntryDraft {
    pub fn new(
        class_id: ClassId,
        teacher_id: TeacherId,
        subject_id: SubjectId,
        timeslot_id: TimeSlotId,
    ) -> Self {
        Self {
            class_id,
            teacher_id,
            subject_id,
            timeslot_id,
            room: None,
            week_type: WeekType::All,
        }
    }

    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn week_type(mut self, week_type: WeekType) -> Self {
        self.week_type = week_type;
        self
    }
}

/// A persisted schedule entry: one lesson of one class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub subject_id: SubjectId,
    pub timeslot_id: TimeSlotId,
    pub room: Option<String>,
    pub week_type: WeekType,
}

impl ScheduleEntry {
    pub fn from_draft(id: EntryId, draft: EntryDraft) -> Self {
        Self {
            id,
            class_id: draft.class_id,
            teacher_id: draft.teacher_id,
            subject_id: draft.subject_id,
            timeslot_id: draft.timeslot_id,
            room: draft.room,
            week_type: draft.week_type,
        }
    }

    pub fn as_draft(&self) -> EntryDraft {
        EntryDraft {
            class_id: self.class_id,
            teacher_id: self.teacher_id,
            subject_id: self.subject_id,
            timeslot_id: self.timeslot_id,
            room: self.room.clone(),
            week_type: self.week_type,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error taxonomy of the timetabling core.
///
/// Every variant maps to a stable machine-readable kind via
/// [`ScheduleError::kind`]. Conflict lists never surface as errors from the
/// detector itself; [`ScheduleError::Conflict`] is produced by write
/// operations that refuse conflicting input.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{} conflict(s) with the existing schedule", .0.len())]
    Conflict(Vec<Conflict>),

    #[error("no feasible schedule under the current constraints (considered: {})", considered.join(", "))]
    Infeasible { considered: Vec<&'static str> },

    #[error("time budget exhausted before any feasible schedule was found")]
    Timeout,

    #[error("solve cancelled before completion")]
    Cancelled,

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl ScheduleError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleError::Validation(_) => "VALIDATION_ERROR",
            ScheduleError::Conflict(_) => "CONFLICT",
            ScheduleError::Infeasible { .. } => "INFEASIBLE",
            ScheduleError::Timeout => "TIMEOUT",
            ScheduleError::Cancelled => "CANCELLED",
            ScheduleError::Persistence(_) => "PERSISTENCE_ERROR",
            ScheduleError::Internal(_) => "INTERNAL",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn week_type_overlap_rules() {
        use WeekType::*;
        assert!(All.overlaps(All));
        assert!(All.overlaps(A));
        assert!(All.overlaps(B));
        assert!(A.overlaps(All));
        assert!(A.overlaps(A));
        assert!(!A.overlaps(B));
        assert!(!B.overlaps(A));
        assert!(B.overlaps(B));
    }

    #[test]
    fn teacher_builder() {
        let teacher = Teacher::new(1, "MUE")
            .name("Anna", "Müller")
            .email("mueller@schule.de")
            .max_hours_per_week(20)
            .part_time();

        assert_eq!(teacher.abbreviation, "MUE");
        assert_eq!(teacher.max_hours_per_week, 20);
        assert!(teacher.is_part_time);
        assert_eq!(teacher.max_hours_per_day(), 3);
    }

    #[test]
    fn full_time_daily_bound() {
        let teacher = Teacher::new(1, "SCH");
        assert_eq!(teacher.max_hours_per_day(), 6);
    }

    #[test]
    fn subject_core_and_sport_detection() {
        assert!(Subject::new(1, "Deutsch", "DE").is_core());
        assert!(Subject::new(2, "Mathematik", "MA").is_core());
        assert!(Subject::new(3, "Sachunterricht", "SU").is_core());
        assert!(!Subject::new(4, "Musik", "MU").is_core());

        assert!(Subject::new(5, "Sport", "SP").is_sport());
        assert!(Subject::new(6, "Schwimmen", "SW").is_sport());
        assert!(!Subject::new(7, "Religion", "REL").is_sport());
    }

    #[test]
    fn timeslot_weekday_translation() {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(8, 45, 0).unwrap();
        let slot = TimeSlot::new(1, 1, 1, start, end);
        assert_eq!(slot.weekday(), 0);

        let friday = TimeSlot::new(2, 5, 3, start, end);
        assert_eq!(friday.weekday(), 4);
    }

    #[test]
    fn availability_window() {
        let avail = TeacherAvailability::new(
            1,
            1,
            0,
            1,
            AvailabilityKind::Blocked,
            date(2026, 2, 1),
        )
        .until(date(2026, 6, 30));

        assert!(!avail.is_active_on(date(2026, 1, 31)));
        assert!(avail.is_active_on(date(2026, 2, 1)));
        assert!(avail.is_active_on(date(2026, 6, 30)));
        assert!(!avail.is_active_on(date(2026, 7, 1)));
    }

    #[test]
    fn availability_open_ended() {
        let avail =
            TeacherAvailability::new(1, 1, 2, 4, AvailabilityKind::Preferred, date(2026, 1, 1));
        assert!(avail.is_active_on(date(2030, 12, 31)));
    }

    #[test]
    fn certification_expiry_is_strict() {
        let qual = Qualification::new(1, 1, 1).certified(date(2026, 1, 1), Some(date(2026, 8, 1)));

        assert!(qual.is_valid_on(date(2026, 7, 31)));
        // Expiring exactly on the reference date counts as expired
        assert!(!qual.is_valid_on(date(2026, 8, 1)));
        assert!(!qual.is_valid_on(date(2025, 12, 31)));
    }

    #[test]
    fn qualification_grade_mask() {
        let qual = Qualification::new(1, 1, 1).grades([1, 2]);
        assert!(qual.covers_grade(1));
        assert!(qual.covers_grade(2));
        assert!(!qual.covers_grade(3));

        let open = Qualification::new(2, 1, 2);
        assert!(open.covers_grade(4));
    }

    #[test]
    fn entry_draft_round_trip() {
        let draft = EntryDraft::new(1, 2, 3, 4).room("R101").week_type(WeekType::A);
        let entry = ScheduleEntry::from_draft(9, draft.clone());
        assert_eq!(entry.id, 9);
        assert_eq!(entry.as_draft(), draft);
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(ScheduleError::Validation("x".into()).kind(), "VALIDATION_ERROR");
        assert_eq!(ScheduleError::Conflict(vec![]).kind(), "CONFLICT");
        assert_eq!(
            ScheduleError::Infeasible { considered: vec![] }.kind(),
            "INFEASIBLE"
        );
        assert_eq!(ScheduleError::Timeout.kind(), "TIMEOUT");
        assert_eq!(ScheduleError::Cancelled.kind(), "CANCELLED");
        assert_eq!(ScheduleError::Persistence("x".into()).kind(), "PERSISTENCE_ERROR");
        assert_eq!(ScheduleError::Internal("x".into()).kind(), "INTERNAL");
    }

    #[test]
    fn week_type_serde_names() {
        assert_eq!(serde_json::to_string(&WeekType::All).unwrap(), "\"ALL\"");
        assert_eq!(serde_json::to_string(&WeekType::A).unwrap(), "\"A\"");
        assert_eq!(
            serde_json::to_string(&QualificationLevel::Substitute).unwrap(),
            "\"SUBSTITUTE\""
        );
        assert_eq!(
            serde_json::to_string(&AvailabilityKind::Preferred).unwrap(),
            "\"PREFERRED\""
        );
    }
}
