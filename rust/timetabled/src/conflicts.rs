use crate::model::{Assignment, Break, CellKey, TimeSlotId};
use crate::schedule::Schedule;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictId {
    pub teacher: String,
    pub day_index: usize,
    pub time_slot_id: TimeSlotId,
}

/// One teacher booked in more than one grade at the same day and slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub teacher: String,
    pub day_index: usize,
    pub time_slot_id: TimeSlotId,
    pub grades: BTreeSet<String>,
}

pub type Conflicts = BTreeMap<ConflictId, ConflictRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSort {
    Day,
    Teacher,
}

impl ConflictSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }
}

/// Groups every non-break cell with a teacher by (teacher, day, slot) and
/// keeps the groups spanning two or more grades. Teachers are compared by
/// name; they need not exist in the teacher map.
pub fn detect_conflicts<'a, I>(assignments: I, breaks: &[Break]) -> Conflicts
where
    I: IntoIterator<Item = (&'a CellKey, &'a Assignment)>,
{
    let mut groups: HashMap<ConflictId, BTreeSet<&'a str>> = HashMap::new();
    for (key, assignment) in assignments {
        if assignment.counts_as_break(breaks) {
            continue;
        }
        let Some(teacher) = assignment.teacher() else {
            continue;
        };
        groups
            .entry(ConflictId {
                teacher: teacher.to_string(),
                day_index: key.day_index,
                time_slot_id: key.time_slot_id,
            })
            .or_default()
            .insert(key.grade.as_str());
    }

    groups
        .into_iter()
        .filter(|(_, grades)| grades.len() > 1)
        .map(|(id, grades)| {
            let record = ConflictRecord {
                teacher: id.teacher.clone(),
                day_index: id.day_index,
                time_slot_id: id.time_slot_id,
                grades: grades.into_iter().map(str::to_string).collect(),
            };
            (id, record)
        })
        .collect()
}

/// Conflicts among the cells currently on the grid. Cells on hidden days are
/// left out; they come back when the week is widened.
pub fn schedule_conflicts(schedule: &Schedule) -> Conflicts {
    let days = schedule.days_per_week();
    let visible = schedule
        .assignments()
        .iter()
        .filter(|(key, _)| key.day_index < days);
    detect_conflicts(visible, schedule.breaks())
}

pub fn sorted_for_display(conflicts: &Conflicts, order: ConflictSort) -> Vec<&ConflictRecord> {
    let mut out: Vec<&ConflictRecord> = conflicts.values().collect();
    match order {
        ConflictSort::Day => out.sort_by(|a, b| {
            (a.day_index, a.time_slot_id, &a.teacher).cmp(&(b.day_index, b.time_slot_id, &b.teacher))
        }),
        ConflictSort::Teacher => out.sort_by(|a, b| {
            (&a.teacher, a.day_index, a.time_slot_id).cmp(&(&b.teacher, b.day_index, b.time_slot_id))
        }),
    }
    out
}

/// Cells taking part in any conflict, for highlighting in the grid.
pub fn conflicting_cells(conflicts: &Conflicts) -> BTreeSet<CellKey> {
    conflicts
        .values()
        .flat_map(|r| {
            r.grades
                .iter()
                .map(move |g| CellKey::new(g.clone(), r.time_slot_id, r.day_index))
        })
        .collect()
}
