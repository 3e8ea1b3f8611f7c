use crate::model::{Assignment, Break, CellKey, Teacher, TimeSlot};
use crate::schedule::Schedule;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub grade: String,
    pub filled_cells: usize,
    pub total_cells: usize,
    pub completion_percentage: u32,
    pub total_teachers: usize,
    pub break_cells: usize,
    /// Lessons per subject in this grade.
    pub subject_usage: BTreeMap<String, usize>,
    /// Lessons per teacher in this grade.
    pub teacher_usage: BTreeMap<String, usize>,
    /// Lessons per teacher across every grade.
    pub teacher_load: BTreeMap<String, usize>,
    pub unresolved_teachers: BTreeSet<String>,
}

pub struct StatsInput<'a> {
    pub assignments: &'a BTreeMap<CellKey, Assignment>,
    pub breaks: &'a [Break],
    pub time_slots: &'a [TimeSlot],
    pub days: &'a [&'a str],
    pub teachers: &'a BTreeMap<String, Teacher>,
}

impl<'a> StatsInput<'a> {
    pub fn from_schedule(schedule: &'a Schedule) -> Self {
        Self {
            assignments: schedule.assignments(),
            breaks: schedule.breaks(),
            time_slots: schedule.time_slots(),
            days: schedule.days(),
            teachers: schedule.teachers(),
        }
    }
}

/// Integer percentage of filled cells, 0 for an empty grid.
pub fn completion_percentage(filled: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (filled as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

pub fn compute_stats(input: &StatsInput<'_>, grade: &str) -> Stats {
    let slot_ids: BTreeSet<_> = input.time_slots.iter().map(|s| s.id).collect();
    let total_cells = input.time_slots.len() * input.days.len();

    let mut filled_cells = 0;
    let mut break_cells = 0;
    let mut subject_usage: BTreeMap<String, usize> = BTreeMap::new();
    let mut teacher_usage: BTreeMap<String, usize> = BTreeMap::new();
    let mut teacher_load: BTreeMap<String, usize> = BTreeMap::new();
    let mut unresolved_teachers = BTreeSet::new();

    for (key, assignment) in input.assignments {
        // Cells keyed to removed slots or hidden days are inert.
        if !slot_ids.contains(&key.time_slot_id) || key.day_index >= input.days.len() {
            continue;
        }
        let is_break = assignment.counts_as_break(input.breaks);
        if !is_break {
            if let Some(t) = assignment.teacher() {
                *teacher_load.entry(t.to_string()).or_default() += 1;
            }
        }
        if key.grade != grade {
            continue;
        }

        filled_cells += 1;
        if is_break {
            break_cells += 1;
            continue;
        }
        *subject_usage
            .entry(assignment.subject().to_string())
            .or_default() += 1;
        if let Some(t) = assignment.teacher() {
            *teacher_usage.entry(t.to_string()).or_default() += 1;
            if !input.teachers.contains_key(t) {
                unresolved_teachers.insert(t.to_string());
            }
        }
    }

    Stats {
        grade: grade.to_string(),
        filled_cells,
        total_cells,
        completion_percentage: completion_percentage(filled_cells, total_cells),
        total_teachers: input.teachers.len(),
        break_cells,
        subject_usage,
        teacher_usage,
        teacher_load,
        unresolved_teachers,
    }
}

pub fn schedule_stats(schedule: &Schedule, grade: &str) -> Stats {
    compute_stats(&StatsInput::from_schedule(schedule), grade)
}
