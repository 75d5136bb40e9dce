//! Schedule quality scoring
//!
//! Computes a 0–100 score from a schedule, independent of the solver's
//! internal objective, so runs from different solver backends stay
//! comparable.
//!
//! # Rubrics
//!
//! | Rubric | Weight | Perfect when |
//! |--------|--------|--------------|
//! | Availability satisfaction | 25 | every entry on a PREFERRED cell |
//! | Qualification optimization | 20 | every entry taught at PRIMARY level |
//! | Pedagogical timing | 20 | cores in periods 1–3, sport in 4+ |
//! | Workload balance | 15 | every assigned teacher at 8–15 lessons |
//! | Schedule efficiency | 10 | every class spread over 4–5 days |
//! | Compliance | 10 | no hard violations |
//!
//! Every rubric is vacuously 100 when it has nothing to measure, so an
//! empty domain scores 100.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    AvailabilityKind, ConflictDetector, DomainSnapshot, QualificationLevel, ScheduleEntry,
};

const WEIGHT_AVAILABILITY: f64 = 25.0;
const WEIGHT_QUALIFICATION: f64 = 20.0;
const WEIGHT_PEDAGOGY: f64 = 20.0;
const WEIGHT_WORKLOAD: f64 = 15.0;
const WEIGHT_EFFICIENCY: f64 = 10.0;
const WEIGHT_COMPLIANCE: f64 = 10.0;

/// Per-rubric and total quality of one schedule, all on a 0–100 scale.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityReport {
    pub total: f64,
    pub availability: f64,
    pub qualification: f64,
    pub pedagogy: f64,
    pub workload: f64,
    pub efficiency: f64,
    pub compliance: f64,
}

impl QualityReport {
    /// Score `entries` against the snapshot they were planned on.
    pub fn calculate(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> Self {
        let availability = availability_score(snapshot, entries);
        let qualification = qualification_score(snapshot, entries);
        let pedagogy = pedagogy_score(snapshot, entries);
        let workload = workload_score(entries);
        let efficiency = efficiency_score(snapshot, entries);
        let compliance = compliance_score(snapshot, entries);

        let total = (WEIGHT_AVAILABILITY * availability
            + WEIGHT_QUALIFICATION * qualification
            + WEIGHT_PEDAGOGY * pedagogy
            + WEIGHT_WORKLOAD * workload
            + WEIGHT_EFFICIENCY * efficiency
            + WEIGHT_COMPLIANCE * compliance)
            / 100.0;

        Self {
            total,
            availability,
            qualification,
            pedagogy,
            workload,
            efficiency,
            compliance,
        }
    }

    /// Whether every rubric is at its maximum.
    pub fn is_perfect(&self) -> bool {
        self.total >= 100.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        100.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// PREFERRED → 100, AVAILABLE or unset → 50, BLOCKED → 0.
fn availability_score(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> f64 {
    let per_entry: Vec<f64> = entries
        .iter()
        .filter_map(|entry| {
            let slot = snapshot.timeslot(entry.timeslot_id)?;
            Some(
                match snapshot.availability(entry.teacher_id, slot.weekday(), slot.period) {
                    Some(AvailabilityKind::Preferred) => 100.0,
                    Some(AvailabilityKind::Blocked) => 0.0,
                    Some(AvailabilityKind::Available) | None => 50.0,
                },
            )
        })
        .collect();
    mean(&per_entry)
}

/// PRIMARY → 100, SECONDARY → 70, SUBSTITUTE → 30, none → 0.
fn qualification_score(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> f64 {
    let per_entry: Vec<f64> = entries
        .iter()
        .map(|entry| {
            match snapshot
                .qualification(entry.teacher_id, entry.subject_id)
                .map(|q| q.level)
            {
                Some(QualificationLevel::Primary) => 100.0,
                Some(QualificationLevel::Secondary) => 70.0,
                Some(QualificationLevel::Substitute) => 30.0,
                None => 0.0,
            }
        })
        .collect();
    mean(&per_entry)
}

/// Core subjects score 100 in the morning (periods 1–3), 50 later; sport
/// scores 100 from period 4 on, 30 earlier; everything else scores 100.
fn pedagogy_score(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> f64 {
    let per_entry: Vec<f64> = entries
        .iter()
        .filter_map(|entry| {
            let slot = snapshot.timeslot(entry.timeslot_id)?;
            let subject = snapshot.subject(entry.subject_id)?;
            Some(if subject.is_core() {
                if slot.period <= 3 {
                    100.0
                } else {
                    50.0
                }
            } else if subject.is_sport() {
                if slot.period >= 4 {
                    100.0
                } else {
                    30.0
                }
            } else {
                100.0
            })
        })
        .collect();
    mean(&per_entry)
}

/// 8–15 lessons → 100, 5–20 → 70, any → 30; averaged over teachers with at
/// least one lesson.
fn workload_score(entries: &[ScheduleEntry]) -> f64 {
    let mut per_teacher: BTreeMap<i64, u32> = BTreeMap::new();
    for entry in entries {
        *per_teacher.entry(entry.teacher_id).or_default() += 1;
    }
    let per_entry: Vec<f64> = per_teacher
        .values()
        .map(|&n| {
            if (8..=15).contains(&n) {
                100.0
            } else if (5..=20).contains(&n) {
                70.0
            } else {
                30.0
            }
        })
        .collect();
    mean(&per_entry)
}

/// Lessons spread over 4–5 days → 100, 3 → 70, 2 → 40, 1 → 10; averaged
/// over classes with any lesson.
fn efficiency_score(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> f64 {
    let mut days_per_class: BTreeMap<i64, BTreeSet<u8>> = BTreeMap::new();
    for entry in entries {
        if let Some(slot) = snapshot.timeslot(entry.timeslot_id) {
            days_per_class.entry(entry.class_id).or_default().insert(slot.day);
        }
    }
    let per_class: Vec<f64> = days_per_class
        .values()
        .map(|days| match days.len() {
            0 => 0.0,
            1 => 10.0,
            2 => 40.0,
            3 => 70.0,
            _ => 100.0,
        })
        .collect();
    mean(&per_class)
}

/// 100 minus 10 per hard violation found by the conflict detector,
/// clamped at 0.
fn compliance_score(snapshot: &DomainSnapshot, entries: &[ScheduleEntry]) -> f64 {
    let detector = ConflictDetector::new(snapshot);
    let violations: usize = detector.scan(entries).iter().map(|e| e.conflicts.len()).sum();
    (100.0 - 10.0 * violations as f64).max(0.0)
}
