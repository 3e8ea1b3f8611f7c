use crate::model::{
    active_days, find_break, palette_color, Assignment, Break, BreakKind, CellKey, Teacher,
    TeacherRef, TimeSlot, TimeSlotId, DEFAULT_DAYS_PER_WEEK, WEEK_DAYS,
};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ScheduleError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ScheduleError {}

/// A user edit against the schedule. Applied through [`Schedule::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleCommand {
    EditCell {
        key: CellKey,
        subject: String,
        teacher: Option<String>,
    },
    ClearCell {
        key: CellKey,
    },
    ClearGrade {
        grade: String,
    },
    CopyGrade {
        from: String,
        to: String,
    },
    AddTimeSlot {
        label: String,
        color: Option<String>,
    },
    RenameTimeSlot {
        id: TimeSlotId,
        label: String,
    },
    RemoveTimeSlot {
        id: TimeSlotId,
    },
    AddBreak {
        name: String,
        kind: BreakKind,
    },
    RemoveBreak {
        name: String,
    },
    UpsertTeacher {
        name: String,
        subjects: Vec<String>,
        color: Option<String>,
    },
    RemoveTeacher {
        name: String,
    },
    SelectGrade {
        grade: String,
    },
    SetDaysPerWeek {
        days: usize,
    },
}

impl ScheduleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ScheduleCommand::EditCell { .. } => "edit_cell",
            ScheduleCommand::ClearCell { .. } => "clear_cell",
            ScheduleCommand::ClearGrade { .. } => "clear_grade",
            ScheduleCommand::CopyGrade { .. } => "copy_grade",
            ScheduleCommand::AddTimeSlot { .. } => "add_time_slot",
            ScheduleCommand::RenameTimeSlot { .. } => "rename_time_slot",
            ScheduleCommand::RemoveTimeSlot { .. } => "remove_time_slot",
            ScheduleCommand::AddBreak { .. } => "add_break",
            ScheduleCommand::RemoveBreak { .. } => "remove_break",
            ScheduleCommand::UpsertTeacher { .. } => "upsert_teacher",
            ScheduleCommand::RemoveTeacher { .. } => "remove_teacher",
            ScheduleCommand::SelectGrade { .. } => "select_grade",
            ScheduleCommand::SetDaysPerWeek { .. } => "set_days_per_week",
        }
    }
}

/// The whole session state: every grade's cells plus the shared metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub(crate) assignments: BTreeMap<CellKey, Assignment>,
    pub(crate) time_slots: Vec<TimeSlot>,
    pub(crate) breaks: Vec<Break>,
    pub(crate) teachers: BTreeMap<String, Teacher>,
    pub(crate) selected_grade: String,
    pub(crate) days_per_week: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            assignments: BTreeMap::new(),
            time_slots: Vec::new(),
            breaks: Vec::new(),
            teachers: BTreeMap::new(),
            selected_grade: String::new(),
            days_per_week: DEFAULT_DAYS_PER_WEEK,
        }
    }
}

impl Schedule {
    pub fn assignments(&self) -> &BTreeMap<CellKey, Assignment> {
        &self.assignments
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        &self.time_slots
    }

    pub fn breaks(&self) -> &[Break] {
        &self.breaks
    }

    pub fn teachers(&self) -> &BTreeMap<String, Teacher> {
        &self.teachers
    }

    pub fn selected_grade(&self) -> &str {
        &self.selected_grade
    }

    pub fn days_per_week(&self) -> usize {
        self.days_per_week
    }

    pub fn days(&self) -> &'static [&'static str] {
        active_days(self.days_per_week)
    }

    pub fn assignment(&self, key: &CellKey) -> Option<&Assignment> {
        self.assignments.get(key)
    }

    pub fn time_slot(&self, id: TimeSlotId) -> Option<&TimeSlot> {
        self.time_slots.iter().find(|s| s.id == id)
    }

    pub fn time_slot_ids(&self) -> BTreeSet<TimeSlotId> {
        self.time_slots.iter().map(|s| s.id).collect()
    }

    /// Max existing id plus one; `None` once `u32::MAX` is taken.
    pub fn next_time_slot_id(&self) -> Option<TimeSlotId> {
        self.time_slots
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }

    /// Grades that have at least one cell, plus the selected grade.
    pub fn grades(&self) -> BTreeSet<&str> {
        let mut out: BTreeSet<&str> = self.assignments.keys().map(|k| k.grade.as_str()).collect();
        if !self.selected_grade.is_empty() {
            out.insert(self.selected_grade.as_str());
        }
        out
    }

    pub fn resolve_teacher<'a>(&'a self, name: &'a str) -> TeacherRef<'a> {
        match self.teachers.get(name) {
            Some(t) => TeacherRef::Resolved(t),
            None => TeacherRef::Unresolved(name),
        }
    }

    pub fn set_assignment(&mut self, key: CellKey, assignment: Assignment) {
        self.assignments.insert(key, assignment);
    }

    pub fn clear_assignment(&mut self, key: &CellKey) -> bool {
        self.assignments.remove(key).is_some()
    }

    /// Drops every assignment, in every grade, whose time slot is not in
    /// `remaining`. Returns how many were removed.
    pub fn prune_for_removed_time_slots(&mut self, remaining: &BTreeSet<TimeSlotId>) -> usize {
        let before = self.assignments.len();
        self.assignments
            .retain(|key, _| remaining.contains(&key.time_slot_id));
        before - self.assignments.len()
    }

    pub fn merged_view<'a>(
        &'a self,
        grade: &'a str,
    ) -> impl Iterator<Item = (&'a CellKey, &'a Assignment)> + 'a {
        self.assignments
            .iter()
            .filter(move |(key, _)| key.grade == grade)
    }

    /// Returns the schedule with `command` applied. On error `self` is left
    /// exactly as it was.
    pub fn apply(&self, command: ScheduleCommand) -> Result<Schedule, ScheduleError> {
        let mut next = self.clone();
        next.apply_in_place(command)?;
        Ok(next)
    }

    fn apply_in_place(&mut self, command: ScheduleCommand) -> Result<(), ScheduleError> {
        match command {
            ScheduleCommand::EditCell {
                key,
                subject,
                teacher,
            } => self.edit_cell(key, &subject, teacher),
            ScheduleCommand::ClearCell { key } => {
                self.clear_assignment(&key);
                Ok(())
            }
            ScheduleCommand::ClearGrade { grade } => {
                let grade = require_text(&grade, "grade")?;
                self.assignments.retain(|key, _| key.grade != grade);
                Ok(())
            }
            ScheduleCommand::CopyGrade { from, to } => self.copy_grade(&from, &to),
            ScheduleCommand::AddTimeSlot { label, color } => {
                let label = require_text(&label, "label")?;
                let id = self
                    .next_time_slot_id()
                    .ok_or_else(|| ids_exhausted("time slot"))?;
                self.time_slots.push(TimeSlot {
                    id,
                    label,
                    color: color
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| palette_color(id)),
                });
                Ok(())
            }
            ScheduleCommand::RenameTimeSlot { id, label } => {
                let label = require_text(&label, "label")?;
                let slot = self
                    .time_slots
                    .iter_mut()
                    .find(|s| s.id == id)
                    .ok_or_else(|| time_slot_not_found(id))?;
                slot.label = label;
                Ok(())
            }
            ScheduleCommand::RemoveTimeSlot { id } => {
                let pos = self
                    .time_slots
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| time_slot_not_found(id))?;
                self.time_slots.remove(pos);
                let remaining = self.time_slot_ids();
                self.prune_for_removed_time_slots(&remaining);
                Ok(())
            }
            ScheduleCommand::AddBreak { name, kind } => {
                let name = require_text(&name, "name")?;
                if find_break(&self.breaks, &name).is_some() {
                    return Err(ScheduleError::new("conflict", "break already exists")
                        .with_details(json!({ "name": name })));
                }
                self.breaks.push(Break { name, kind });
                Ok(())
            }
            ScheduleCommand::RemoveBreak { name } => {
                let pos = self
                    .breaks
                    .iter()
                    .position(|b| b.matches(&name))
                    .ok_or_else(|| {
                        ScheduleError::new("not_found", "break not found")
                            .with_details(json!({ "name": name }))
                    })?;
                self.breaks.remove(pos);
                Ok(())
            }
            ScheduleCommand::UpsertTeacher {
                name,
                subjects,
                color,
            } => self.upsert_teacher(&name, subjects, color),
            ScheduleCommand::RemoveTeacher { name } => {
                let name = require_text(&name, "name")?;
                if self.teachers.remove(&name).is_none() {
                    return Err(ScheduleError::new("not_found", "teacher not found")
                        .with_details(json!({ "name": name })));
                }
                Ok(())
            }
            ScheduleCommand::SelectGrade { grade } => {
                self.selected_grade = require_text(&grade, "grade")?;
                Ok(())
            }
            ScheduleCommand::SetDaysPerWeek { days } => {
                if !(1..=WEEK_DAYS.len()).contains(&days) {
                    return Err(ScheduleError::bad_params(format!(
                        "daysPerWeek must be in 1..={}",
                        WEEK_DAYS.len()
                    )));
                }
                self.days_per_week = days;
                Ok(())
            }
        }
    }

    fn edit_cell(
        &mut self,
        key: CellKey,
        subject: &str,
        teacher: Option<String>,
    ) -> Result<(), ScheduleError> {
        let subject = require_text(subject, "subject")?;
        if key.grade.trim().is_empty() {
            return Err(ScheduleError::bad_params("grade must not be empty"));
        }
        if key.day_index >= self.days_per_week {
            return Err(ScheduleError::bad_params("dayIndex out of range")
                .with_details(json!({ "dayIndex": key.day_index, "daysPerWeek": self.days_per_week })));
        }
        if self.time_slot(key.time_slot_id).is_none() {
            return Err(time_slot_not_found(key.time_slot_id));
        }

        let assignment = match find_break(&self.breaks, &subject) {
            Some(b) => Assignment::break_period(subject, b.kind.clone()),
            None => Assignment::lesson(subject, teacher),
        };
        self.set_assignment(key, assignment);
        Ok(())
    }

    fn copy_grade(&mut self, from: &str, to: &str) -> Result<(), ScheduleError> {
        let from = require_text(from, "from")?;
        let to = require_text(to, "to")?;
        if from == to {
            return Err(ScheduleError::bad_params("from and to must differ"));
        }
        let copied: Vec<(CellKey, Assignment)> = self
            .merged_view(&from)
            .map(|(key, a)| {
                (
                    CellKey::new(to.clone(), key.time_slot_id, key.day_index),
                    a.clone(),
                )
            })
            .collect();
        self.assignments.retain(|key, _| key.grade != to);
        self.assignments.extend(copied);
        Ok(())
    }

    fn upsert_teacher(
        &mut self,
        name: &str,
        subjects: Vec<String>,
        color: Option<String>,
    ) -> Result<(), ScheduleError> {
        let name = require_text(name, "name")?;
        let subjects: BTreeSet<String> = subjects
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let color = color.filter(|c| !c.trim().is_empty());

        if let Some(existing) = self.teachers.get_mut(&name) {
            existing.subjects = subjects;
            if let Some(c) = color {
                existing.color = c;
            }
            return Ok(());
        }

        let id = self
            .teachers
            .values()
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| ids_exhausted("teacher"))?;
        self.teachers.insert(
            name.clone(),
            Teacher {
                id,
                name,
                subjects,
                color: color.unwrap_or_else(|| palette_color(id)),
            },
        );
        Ok(())
    }
}

fn require_text(raw: &str, field: &str) -> Result<String, ScheduleError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ScheduleError::bad_params(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

fn ids_exhausted(what: &str) -> ScheduleError {
    ScheduleError::new("capacity_exceeded", format!("no {} ids left", what))
        .with_details(json!({ "maxId": u32::MAX }))
}

fn time_slot_not_found(id: TimeSlotId) -> ScheduleError {
    ScheduleError::new("not_found", "time slot not found").with_details(json!({ "timeSlotId": id }))
}
