use crate::model::{
    find_break, palette_color, Assignment, Break, BreakKind, CellKey, Teacher, TimeSlot,
    TimeSlotId, WEEK_DAYS,
};
use crate::schedule::Schedule;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const INVALID_FORMAT_MESSAGE: &str = "invalid file format";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCell {
    pub subject: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub is_break: bool,
    #[serde(default)]
    pub break_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTimeSlot {
    pub id: TimeSlotId,
    pub time: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBreak {
    pub name: String,
    #[serde(rename = "type", default = "default_break_type")]
    pub kind: String,
}

fn default_break_type() -> String {
    "short".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTeacher {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<SnapshotTimeSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaks: Option<Vec<SnapshotBreak>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<BTreeMap<String, SnapshotTeacher>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_per_week: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<String>,
}

/// On-disk shape of a saved timetable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timetable: Option<BTreeMap<String, SnapshotCell>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapshotMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SnapshotError {
    fn invalid_format(reason: impl Into<String>) -> Self {
        Self {
            code: "invalid_format".to_string(),
            message: INVALID_FORMAT_MESSAGE.to_string(),
            details: Some(json!({ "reason": reason.into() })),
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SnapshotError {}

pub fn timetable_entries(schedule: &Schedule) -> BTreeMap<String, SnapshotCell> {
    schedule
        .assignments()
        .iter()
        .map(|(key, a)| {
            (
                key.encode(),
                SnapshotCell {
                    subject: a.subject().to_string(),
                    teacher: a.teacher().unwrap_or_default().to_string(),
                    is_break: a.is_break(),
                    break_type: a.break_kind().map(|k| k.as_str().to_string()),
                },
            )
        })
        .collect()
}

pub fn serialize(schedule: &Schedule, saved_at: DateTime<Utc>) -> SnapshotDocument {
    let time_slots = schedule
        .time_slots()
        .iter()
        .map(|s| SnapshotTimeSlot {
            id: s.id,
            time: s.label.clone(),
            color: s.color.clone(),
        })
        .collect();
    let breaks = schedule
        .breaks()
        .iter()
        .map(|b| SnapshotBreak {
            name: b.name.clone(),
            kind: b.kind.as_str().to_string(),
        })
        .collect();
    let teachers = schedule
        .teachers()
        .iter()
        .map(|(name, t)| {
            (
                name.clone(),
                SnapshotTeacher {
                    id: t.id,
                    subjects: t.subjects.iter().cloned().collect(),
                    color: t.color.clone(),
                },
            )
        })
        .collect();

    SnapshotDocument {
        timetable: Some(timetable_entries(schedule)),
        metadata: Some(SnapshotMetadata {
            grade: Some(schedule.selected_grade().to_string()),
            time_slots: Some(time_slots),
            breaks: Some(breaks),
            teachers: Some(teachers),
            days_per_week: Some(schedule.days_per_week()),
            last_saved: Some(saved_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }),
    }
}

pub fn to_json_string(doc: &SnapshotDocument, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(doc)
    } else {
        serde_json::to_string(doc)
    }
}

/// Parts of a schedule read from a snapshot. `None` means the document did
/// not carry that part and the current value is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulePatch {
    pub assignments: Option<BTreeMap<CellKey, Assignment>>,
    pub selected_grade: Option<String>,
    pub time_slots: Option<Vec<TimeSlot>>,
    pub breaks: Option<Vec<Break>>,
    pub teachers: Option<BTreeMap<String, Teacher>>,
    pub days_per_week: Option<usize>,
    pub last_saved: Option<String>,
    pub skipped_keys: Vec<String>,
}

impl SchedulePatch {
    pub fn apply_to(&self, schedule: &Schedule) -> Schedule {
        let mut next = schedule.clone();
        if let Some(a) = &self.assignments {
            next.assignments = a.clone();
        }
        if let Some(g) = &self.selected_grade {
            next.selected_grade = g.clone();
        }
        if let Some(s) = &self.time_slots {
            next.time_slots = s.clone();
        }
        if let Some(b) = &self.breaks {
            next.breaks = b.clone();
        }
        if let Some(t) = &self.teachers {
            next.teachers = t.clone();
        }
        if let Some(d) = self.days_per_week {
            next.days_per_week = d;
        }
        next
    }
}

/// Like [`parse`] for raw file contents; non UTF-8 input is an invalid file.
pub fn parse_bytes(bytes: &[u8]) -> Result<SchedulePatch, SnapshotError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SnapshotError::invalid_format(format!("not UTF-8: {}", e)))?;
    parse(text)
}

pub fn parse(text: &str) -> Result<SchedulePatch, SnapshotError> {
    let doc: SnapshotDocument =
        serde_json::from_str(text).map_err(|e| SnapshotError::invalid_format(e.to_string()))?;
    patch_from_document(doc)
}

pub fn patch_from_document(doc: SnapshotDocument) -> Result<SchedulePatch, SnapshotError> {
    if doc.timetable.is_none() && doc.metadata.is_none() {
        return Err(SnapshotError::invalid_format(
            "document has neither timetable nor metadata",
        ));
    }

    let mut patch = SchedulePatch::default();
    let metadata = doc.metadata.unwrap_or_default();

    // Breaks first: cells are checked against them below.
    if let Some(raw) = metadata.breaks {
        let mut breaks: Vec<Break> = Vec::with_capacity(raw.len());
        for b in raw {
            let name = b.name.trim().to_string();
            if name.is_empty() {
                return Err(SnapshotError::invalid_format("break with empty name"));
            }
            if find_break(&breaks, &name).is_some() {
                return Err(SnapshotError::invalid_format(format!(
                    "duplicate break: {}",
                    name
                )));
            }
            breaks.push(Break {
                name,
                kind: BreakKind::from(b.kind),
            });
        }
        patch.breaks = Some(breaks);
    }

    if let Some(raw) = metadata.time_slots {
        let mut seen = BTreeSet::new();
        let mut slots = Vec::with_capacity(raw.len());
        for s in raw {
            if s.id == 0 || !seen.insert(s.id) {
                return Err(SnapshotError::invalid_format(format!(
                    "invalid or duplicate time slot id: {}",
                    s.id
                )));
            }
            let color = if s.color.trim().is_empty() {
                palette_color(s.id)
            } else {
                s.color
            };
            slots.push(TimeSlot {
                id: s.id,
                label: s.time,
                color,
            });
        }
        patch.time_slots = Some(slots);
    }

    if let Some(raw) = metadata.teachers {
        let mut last_id = raw.values().map(|t| t.id).max().unwrap_or(0);
        let mut teachers = BTreeMap::new();
        for (name, t) in raw {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(SnapshotError::invalid_format("teacher with empty name"));
            }
            let id = if t.id == 0 {
                last_id = last_id.checked_add(1).ok_or_else(|| {
                    SnapshotError::invalid_format("no teacher ids left for unnumbered teachers")
                })?;
                last_id
            } else {
                t.id
            };
            let color = if t.color.trim().is_empty() {
                palette_color(id)
            } else {
                t.color
            };
            teachers.insert(
                name.clone(),
                Teacher {
                    id,
                    name,
                    subjects: t
                        .subjects
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                    color,
                },
            );
        }
        patch.teachers = Some(teachers);
    }

    if let Some(days) = metadata.days_per_week {
        if !(1..=WEEK_DAYS.len()).contains(&days) {
            return Err(SnapshotError::invalid_format(format!(
                "daysPerWeek out of range: {}",
                days
            )));
        }
        patch.days_per_week = Some(days);
    }

    patch.selected_grade = metadata
        .grade
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());
    patch.last_saved = metadata.last_saved;

    if let Some(raw) = doc.timetable {
        let breaks = patch.breaks.as_deref().unwrap_or(&[]);
        let mut assignments = BTreeMap::new();
        for (raw_key, cell) in raw {
            let Some(key) = CellKey::decode(&raw_key) else {
                patch.skipped_keys.push(raw_key);
                continue;
            };
            assignments.insert(key, cell_to_assignment(cell, breaks));
        }
        patch.assignments = Some(assignments);
    }

    Ok(patch)
}

fn cell_to_assignment(cell: SnapshotCell, breaks: &[Break]) -> Assignment {
    if !cell.is_break {
        let teacher = Some(cell.teacher).filter(|t| !t.trim().is_empty());
        return Assignment::lesson(cell.subject, teacher);
    }
    let kind = cell
        .break_type
        .filter(|t| !t.trim().is_empty())
        .map(BreakKind::from)
        .or_else(|| find_break(breaks, &cell.subject).map(|b| b.kind.clone()))
        .unwrap_or(BreakKind::Short);
    Assignment::break_period(cell.subject, kind)
}

/// `timetable-<grade>-<YYYY-MM-DD>.json`, with path-hostile characters in the
/// grade replaced by `_`.
pub fn file_name(grade: &str, date: NaiveDate) -> String {
    let grade: String = grade
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let grade = if grade.is_empty() { "all".to_string() } else { grade };
    format!("timetable-{}-{}.json", grade, date.format("%Y-%m-%d"))
}
