//! Hard constraint compilation
//!
//! Emits the closed set of hard constraints into the backend. Carried
//! A/B-week pins are not variables; they tighten right-hand sides instead:
//! a slot with a carried pin admits no colliding ALL assignment, and every
//! cap is reduced by the worse of the two alternating week loads so both
//! weeks stay legal.

use std::collections::{BTreeMap, BTreeSet};

use stundenplan_core::{ClassId, DomainSnapshot, SubjectId, TeacherId, TimeSlotId, WeekType};

use crate::backend::{BoolVar, CpBackend, LinearOp};
use crate::variables::VariablePool;

/// Names of the hard-constraint categories, reported back to callers.
pub const CONSTRAINT_CATEGORIES: &[&str] = &[
    "teacher_uniqueness",
    "class_uniqueness",
    "availability",
    "qualification",
    "break_exclusion",
    "weekly_hours",
    "subject_hours",
    "daily_hours",
    "part_time_days",
    "subject_run_length",
    "fixed_assignments",
    "demand_coverage",
];

fn unit(vars: &[BoolVar]) -> Vec<(i32, BoolVar)> {
    vars.iter().map(|&v| (1, v)).collect()
}

/// Per-week lesson counts of the carried A/B pins, bucketed by the group
/// keys the caps need.
#[derive(Default)]
struct CarriedLoads {
    teacher_slots: BTreeSet<(TeacherId, TimeSlotId)>,
    class_slots: BTreeSet<(ClassId, TimeSlotId)>,
    teacher_days: BTreeSet<(TeacherId, u8)>,
    per_teacher: BTreeMap<(TeacherId, WeekType), i32>,
    per_teacher_day: BTreeMap<(TeacherId, u8, WeekType), i32>,
    per_teacher_subject: BTreeMap<(TeacherId, SubjectId, WeekType), i32>,
    per_triple_cell: BTreeMap<(ClassId, SubjectId, u8, u8, WeekType), i32>,
    class_subject_slots: BTreeMap<(ClassId, SubjectId), BTreeSet<TimeSlotId>>,
}

impl CarriedLoads {
    fn collect(snapshot: &DomainSnapshot, pool: &VariablePool) -> Self {
        let mut loads = Self::default();
        for entry in &pool.carried {
            let Some(slot) = snapshot.timeslot(entry.timeslot_id) else {
                continue;
            };
            let week = entry.week_type;
            loads.teacher_slots.insert((entry.teacher_id, entry.timeslot_id));
            loads.class_slots.insert((entry.class_id, entry.timeslot_id));
            loads.teacher_days.insert((entry.teacher_id, slot.day));
            *loads.per_teacher.entry((entry.teacher_id, week)).or_default() += 1;
            *loads
                .per_teacher_day
                .entry((entry.teacher_id, slot.day, week))
                .or_default() += 1;
            *loads
                .per_teacher_subject
                .entry((entry.teacher_id, entry.subject_id, week))
                .or_default() += 1;
            *loads
                .per_triple_cell
                .entry((entry.class_id, entry.subject_id, slot.day, slot.period, week))
                .or_default() += 1;
            loads
                .class_subject_slots
                .entry((entry.class_id, entry.subject_id))
                .or_default()
                .insert(entry.timeslot_id);
        }
        loads
    }

    /// The worse of the two alternating week loads for a cap group.
    fn worst<K: Ord + Copy>(map: &BTreeMap<(K, WeekType), i32>, key: K) -> i32 {
        let a = map.get(&(key, WeekType::A)).copied().unwrap_or(0);
        let b = map.get(&(key, WeekType::B)).copied().unwrap_or(0);
        a.max(b)
    }
}

/// Emit every hard constraint into the backend.
///
/// Break exclusion is structural: the variable builder never creates a
/// variable on a break slot. Availability and qualification are filtered
/// there too, but are additionally re-enforced here: any variable on a
/// BLOCKED cell or without a valid qualification is fixed to zero, so the
/// model stays correct even if the builder's filtering regresses.
pub(crate) fn compile<B: CpBackend>(
    backend: &mut B,
    snapshot: &DomainSnapshot,
    pool: &VariablePool,
    demand: Option<&BTreeMap<(ClassId, SubjectId), u32>>,
) {
    debug_assert!(pool.vars.iter().all(|pv| {
        snapshot.timeslot(pv.timeslot_id).is_some_and(|slot| !slot.is_break)
    }));

    for pv in &pool.vars {
        let blocked = snapshot.availability(pv.teacher_id, pv.day - 1, pv.period)
            == Some(stundenplan_core::AvailabilityKind::Blocked);
        let qualified = snapshot.class(pv.class_id).is_some_and(|class| {
            snapshot
                .valid_qualification(pv.teacher_id, pv.subject_id, class.grade)
                .is_some()
        });
        if blocked || !qualified {
            backend.fix_var(pv.var, false);
        }
    }

    let mut by_teacher_slot: BTreeMap<(TeacherId, TimeSlotId), Vec<BoolVar>> = BTreeMap::new();
    let mut by_class_slot: BTreeMap<(ClassId, TimeSlotId), Vec<BoolVar>> = BTreeMap::new();
    let mut by_teacher: BTreeMap<TeacherId, Vec<BoolVar>> = BTreeMap::new();
    let mut by_teacher_day: BTreeMap<(TeacherId, u8), Vec<BoolVar>> = BTreeMap::new();
    let mut by_teacher_subject: BTreeMap<(TeacherId, SubjectId), Vec<BoolVar>> = BTreeMap::new();
    let mut by_class_subject: BTreeMap<(ClassId, SubjectId), Vec<BoolVar>> = BTreeMap::new();
    let mut by_triple_cell: BTreeMap<(ClassId, SubjectId, u8, u8), Vec<BoolVar>> = BTreeMap::new();

    for pv in &pool.vars {
        by_teacher_slot.entry((pv.teacher_id, pv.timeslot_id)).or_default().push(pv.var);
        by_class_slot.entry((pv.class_id, pv.timeslot_id)).or_default().push(pv.var);
        by_teacher.entry(pv.teacher_id).or_default().push(pv.var);
        by_teacher_day.entry((pv.teacher_id, pv.day)).or_default().push(pv.var);
        by_teacher_subject.entry((pv.teacher_id, pv.subject_id)).or_default().push(pv.var);
        by_class_subject.entry((pv.class_id, pv.subject_id)).or_default().push(pv.var);
        by_triple_cell
            .entry((pv.class_id, pv.subject_id, pv.day, pv.period))
            .or_default()
            .push(pv.var);
    }

    let carried = CarriedLoads::collect(snapshot, pool);

    // Teacher and class uniqueness per slot; a carried A/B pin closes the
    // slot for colliding ALL assignments entirely.
    for ((teacher_id, slot_id), vars) in &by_teacher_slot {
        let rhs = if carried.teacher_slots.contains(&(*teacher_id, *slot_id)) { 0 } else { 1 };
        backend.add_linear(&unit(vars), LinearOp::LessEq, rhs);
    }
    for ((class_id, slot_id), vars) in &by_class_slot {
        let rhs = if carried.class_slots.contains(&(*class_id, *slot_id)) { 0 } else { 1 };
        backend.add_linear(&unit(vars), LinearOp::LessEq, rhs);
    }

    // Weekly and daily teaching caps.
    let empty: Vec<BoolVar> = Vec::new();
    for teacher in snapshot.teachers() {
        let vars = by_teacher.get(&teacher.id).unwrap_or(&empty);
        let rhs = teacher.max_hours_per_week as i32
            - CarriedLoads::worst(&carried.per_teacher, teacher.id);
        backend.add_linear(&unit(vars), LinearOp::LessEq, rhs);

        for day in 1..=5u8 {
            let vars = by_teacher_day.get(&(teacher.id, day)).unwrap_or(&empty);
            let mut reduction = 0;
            for week in [WeekType::A, WeekType::B] {
                let load = carried
                    .per_teacher_day
                    .get(&(teacher.id, day, week))
                    .copied()
                    .unwrap_or(0);
                reduction = reduction.max(load);
            }
            let rhs = teacher.max_hours_per_day() as i32 - reduction;
            if vars.is_empty() && rhs >= 0 {
                continue;
            }
            backend.add_linear(&unit(vars), LinearOp::LessEq, rhs);
        }
    }

    // Per-subject caps from the qualification rows.
    for qualification in snapshot.qualifications() {
        let Some(cap) = qualification.max_hours_per_week else {
            continue;
        };
        let key = (qualification.teacher_id, qualification.subject_id);
        let vars = by_teacher_subject.get(&key).unwrap_or(&empty);
        let mut reduction = 0;
        for week in [WeekType::A, WeekType::B] {
            let load = carried
                .per_teacher_subject
                .get(&(key.0, key.1, week))
                .copied()
                .unwrap_or(0);
            reduction = reduction.max(load);
        }
        let rhs = cap as i32 - reduction;
        if vars.is_empty() && rhs >= 0 {
            continue;
        }
        backend.add_linear(&unit(vars), LinearOp::LessEq, rhs);
    }

    // Part-time teachers work at most 3 distinct days. y[t, day] = 1 iff
    // the teacher has any lesson that day.
    for teacher in snapshot.teachers() {
        if !teacher.is_part_time {
            continue;
        }
        let mut day_vars = Vec::new();
        for day in 1..=5u8 {
            let xs = by_teacher_day.get(&(teacher.id, day)).unwrap_or(&empty);
            let carried_day = carried.teacher_days.contains(&(teacher.id, day));
            if xs.is_empty() && !carried_day {
                continue;
            }
            let y = backend.new_bool_var();
            for &x in xs {
                backend.add_linear(&[(1, x), (-1, y)], LinearOp::LessEq, 0);
            }
            if carried_day {
                backend.fix_var(y, true);
            } else {
                let mut terms = vec![(1, y)];
                terms.extend(xs.iter().map(|&x| (-1, x)));
                backend.add_linear(&terms, LinearOp::LessEq, 0);
            }
            day_vars.push(y);
        }
        if !day_vars.is_empty() {
            backend.add_linear(&unit(&day_vars), LinearOp::LessEq, 3);
        }
    }

    // No three consecutive periods of the same subject for a class. Only
    // arithmetic runs of non-break periods count; a break interrupts the
    // run.
    let slot_by_pos: BTreeMap<(u8, u8), TimeSlotId> = snapshot
        .teaching_slots()
        .map(|slot| ((slot.day, slot.period), slot.id))
        .collect();
    let mut pairs: BTreeSet<(ClassId, SubjectId)> = by_class_subject.keys().copied().collect();
    pairs.extend(carried.class_subject_slots.keys().copied());
    for &(class_id, subject_id) in &pairs {
        for day in 1..=5u8 {
            for start in 1..=6u8 {
                let run: Vec<u8> = (start..start + 3)
                    .filter(|p| slot_by_pos.contains_key(&(day, *p)))
                    .collect();
                if run.len() < 3 {
                    continue;
                }
                let mut terms = Vec::new();
                for period in &run {
                    if let Some(vars) = by_triple_cell.get(&(class_id, subject_id, day, *period)) {
                        terms.extend(unit(vars));
                    }
                }
                let mut reduction = 0;
                for week in [WeekType::A, WeekType::B] {
                    let load: i32 = run
                        .iter()
                        .map(|period| {
                            carried
                                .per_triple_cell
                                .get(&(class_id, subject_id, day, *period, week))
                                .copied()
                                .unwrap_or(0)
                        })
                        .sum();
                    reduction = reduction.max(load);
                }
                let rhs = 2 - reduction;
                if terms.is_empty() && rhs >= 0 {
                    continue;
                }
                backend.add_linear(&terms, LinearOp::LessEq, rhs);
            }
        }
    }

    // Demand coverage: exact lesson counts per (class, subject) when a
    // demand map is supplied. Carried pins cover one lesson per distinct
    // slot.
    if let Some(demand) = demand {
        for class in snapshot.classes() {
            for subject in snapshot.subjects() {
                let want = demand.get(&(class.id, subject.id)).copied().unwrap_or(0) as i32;
                let covered = carried
                    .class_subject_slots
                    .get(&(class.id, subject.id))
                    .map(|slots| slots.len() as i32)
                    .unwrap_or(0);
                let rhs = want - covered;
                let vars = by_class_subject.get(&(class.id, subject.id)).unwrap_or(&empty);
                if vars.is_empty() && rhs == 0 {
                    continue;
                }
                backend.add_linear(&unit(vars), LinearOp::Eq, rhs);
            }
        }
    }
}
