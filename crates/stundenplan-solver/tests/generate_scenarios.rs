//! End-to-end generation scenarios on tiny instances.

use chrono::{NaiveDate, NaiveTime};
use stundenplan_core::{
    AvailabilityKind, ConflictDetector, DomainData, DomainSnapshot, MemoryStore, Qualification,
    SchoolClass, ScheduleStore, Subject, Teacher, TeacherAvailability, TimeSlot,
};
use stundenplan_solver::{generate, plan, CancelToken, SolveConfig};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn reference() -> NaiveDate {
    date(2026, 3, 2)
}

fn slot(id: i64, day: u8, period: u8) -> TimeSlot {
    let start = NaiveTime::from_hms_opt(7 + u32::from(period), 0, 0).unwrap();
    let end = NaiveTime::from_hms_opt(7 + u32::from(period), 45, 0).unwrap();
    TimeSlot::new(id, day, period, start, end)
}

/// S4 domain: 1a and 1b, MUE teaching MA and SCH teaching DE at grade 1,
/// both free everywhere, Monday periods 1 and 2.
fn tiny_domain() -> DomainData {
    DomainData {
        teachers: vec![
            Teacher::new(1, "MUE").name("Anna", "Müller"),
            Teacher::new(2, "SCH").name("Ben", "Schmidt"),
        ],
        classes: vec![
            SchoolClass::new(10, "1a", 1).size(22),
            SchoolClass::new(11, "1b", 1).size(21),
        ],
        subjects: vec![
            Subject::new(100, "Mathematik", "MA").color("#1f77b4"),
            Subject::new(101, "Deutsch", "DE").color("#d62728"),
        ],
        timeslots: vec![slot(1, 1, 1), slot(2, 1, 2)],
        availabilities: Vec::new(),
        qualifications: vec![
            Qualification::new(1, 1, 100).grades([1]),
            Qualification::new(2, 2, 101).grades([1]),
        ],
        entries: Vec::new(),
    }
}

fn config() -> SolveConfig {
    SolveConfig::default()
        .clear_existing(true)
        .time_limit_seconds(5)
        .reference_date(reference())
        .random_seed(42)
}

#[test]
fn tiny_instance_fills_the_grid() {
    let mut store = MemoryStore::new(tiny_domain());
    let result = generate(&mut store, &config()).unwrap();

    assert_eq!(result.entries.len(), 4, "2 classes × 2 slots");
    for class_id in [10, 11] {
        for slot_id in [1, 2] {
            assert!(
                result
                    .entries
                    .iter()
                    .any(|e| e.class_id == class_id && e.timeslot_id == slot_id),
                "class {class_id} must be covered at slot {slot_id}"
            );
        }
    }
    // Both teachers teach exactly once per slot
    for teacher_id in [1, 2] {
        for slot_id in [1, 2] {
            assert_eq!(
                result
                    .entries
                    .iter()
                    .filter(|e| e.teacher_id == teacher_id && e.timeslot_id == slot_id)
                    .count(),
                1
            );
        }
    }

    // Every lesson is PRIMARY-taught core in the morning on a legal grid
    assert_eq!(result.quality.qualification, 100.0);
    assert_eq!(result.quality.pedagogy, 100.0);
    assert_eq!(result.quality.compliance, 100.0);
    // 4 lessons × (primary 5 + core morning 8)
    assert_eq!(result.objective_value, 52);
    assert!(result.proven_optimal);
    assert!(result.violated_constraints.is_empty());
}

#[test]
fn generated_schedule_revalidates_cleanly() {
    let mut store = MemoryStore::new(tiny_domain());
    let result = generate(&mut store, &config()).unwrap();

    let snapshot = DomainSnapshot::build(store.load().unwrap(), reference()).unwrap();
    let detector = ConflictDetector::new(&snapshot);
    assert!(detector.scan(&result.entries).is_empty());
    // Round trip: what the store holds now scans clean too
    assert!(detector.scan(snapshot.entries()).is_empty());
}

#[test]
fn blocked_first_slot_shrinks_the_schedule() {
    let mut data = tiny_domain();
    // Both teachers blocked on Monday period 1
    data.availabilities = vec![
        TeacherAvailability::new(1, 1, 0, 1, AvailabilityKind::Blocked, date(2026, 1, 1)),
        TeacherAvailability::new(2, 2, 0, 1, AvailabilityKind::Blocked, date(2026, 1, 1)),
    ];
    let mut store = MemoryStore::new(data);
    let result = generate(&mut store, &config()).unwrap();

    // No demand is modelled, so the partial schedule on period 2 is legal
    assert_eq!(result.entries.len(), 2);
    assert!(result.entries.iter().all(|e| e.timeslot_id == 2));

    let snapshot = DomainSnapshot::build(store.load().unwrap(), reference()).unwrap();
    assert!(ConflictDetector::new(&snapshot).scan(&result.entries).is_empty());
}

#[test]
fn identical_inputs_and_seed_reproduce_the_schedule() {
    let first = {
        let snapshot = DomainSnapshot::build(tiny_domain(), reference()).unwrap();
        plan(&snapshot, &config(), &CancelToken::new()).unwrap()
    };
    let second = {
        let snapshot = DomainSnapshot::build(tiny_domain(), reference()).unwrap();
        plan(&snapshot, &config(), &CancelToken::new()).unwrap()
    };

    assert_eq!(first.entries, second.entries, "entry sets must match exactly");
    assert_eq!(first.objective_value, second.objective_value);
    assert_eq!(first.quality, second.quality);
}

#[test]
fn empty_domain_is_feasible_and_perfect() {
    let mut store = MemoryStore::new(DomainData::default());
    let result = generate(&mut store, &config()).unwrap();

    assert!(result.entries.is_empty());
    assert_eq!(result.quality.total, 100.0);
    assert!(result.quality.is_perfect());
}

#[test]
fn better_objective_never_scores_worse() {
    // One class, a core and a non-core subject, a morning and an afternoon
    // slot. The optimal plan puts the core subject in the morning.
    let data = DomainData {
        teachers: vec![Teacher::new(1, "MUE")],
        classes: vec![SchoolClass::new(10, "1a", 1).size(20)],
        subjects: vec![
            Subject::new(100, "Mathematik", "MA").color("#1f77b4"),
            Subject::new(102, "Kunst", "KU").color("#8c564b"),
        ],
        timeslots: vec![slot(1, 1, 1), slot(2, 1, 5)],
        availabilities: Vec::new(),
        qualifications: vec![
            Qualification::new(1, 1, 100).grades([1]),
            Qualification::new(2, 1, 102).grades([1]),
        ],
        entries: Vec::new(),
    };

    let mut demand = std::collections::BTreeMap::new();
    demand.insert((10i64, 100i64), 1u32);
    demand.insert((10i64, 102i64), 1u32);

    let snapshot = DomainSnapshot::build(data, reference()).unwrap();
    let optimal = plan(&snapshot, &config().demand(demand), &CancelToken::new()).unwrap();

    // The solver must prefer MA in period 1
    let ma = optimal.entries.iter().find(|e| e.subject_id == 100).unwrap();
    assert_eq!(ma.timeslot_id, 1, "core subject belongs in the morning slot");

    // Hand-built inversion of the same lessons scores no better
    let inverted = vec![
        stundenplan_core::ScheduleEntry::from_draft(
            1,
            stundenplan_core::EntryDraft::new(10, 1, 100, 2),
        ),
        stundenplan_core::ScheduleEntry::from_draft(
            2,
            stundenplan_core::EntryDraft::new(10, 1, 102, 1),
        ),
    ];
    let inverted_quality = stundenplan_core::QualityReport::calculate(&snapshot, &inverted);
    assert!(
        optimal.quality.total >= inverted_quality.total,
        "a better objective must not score worse: {} < {}",
        optimal.quality.total,
        inverted_quality.total
    );
}
