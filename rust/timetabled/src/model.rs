use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type TimeSlotId = u32;

pub const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
pub const DEFAULT_DAYS_PER_WEEK: usize = 5;

const PALETTE: [&str; 8] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
];

pub fn active_days(days_per_week: usize) -> &'static [&'static str] {
    &WEEK_DAYS[..days_per_week.min(WEEK_DAYS.len())]
}

/// Deterministic display color for the n-th (1-based) created item.
pub fn palette_color(n: u32) -> String {
    let idx = (n.max(1) as usize - 1) % PALETTE.len();
    PALETTE[idx].to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BreakKind {
    Short,
    Meal,
    Other(String),
}

impl BreakKind {
    pub fn as_str(&self) -> &str {
        match self {
            BreakKind::Short => "short",
            BreakKind::Meal => "meal",
            BreakKind::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for BreakKind {
    fn from(raw: String) -> Self {
        let t = raw.trim();
        match t.to_ascii_lowercase().as_str() {
            "short" => BreakKind::Short,
            "meal" | "lunch" => BreakKind::Meal,
            _ => BreakKind::Other(t.to_string()),
        }
    }
}

impl From<BreakKind> for String {
    fn from(kind: BreakKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BreakKind,
}

impl Break {
    pub fn matches(&self, subject: &str) -> bool {
        self.name.trim().to_lowercase() == subject.trim().to_lowercase()
    }
}

/// Break whose name equals `subject`, ignoring case and surrounding space.
pub fn find_break<'a>(breaks: &'a [Break], subject: &str) -> Option<&'a Break> {
    breaks.iter().find(|b| b.matches(subject))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: u32,
    pub name: String,
    pub subjects: BTreeSet<String>,
    pub color: String,
}

/// Value stored in one grid cell.
///
/// A break never carries a teacher; the constructors are the only way to
/// build one, so the invariant holds for every stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    subject: String,
    teacher: Option<String>,
    is_break: bool,
    break_kind: Option<BreakKind>,
}

impl Assignment {
    pub fn lesson(subject: impl Into<String>, teacher: Option<String>) -> Self {
        let teacher = teacher
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            subject: subject.into(),
            teacher,
            is_break: false,
            break_kind: None,
        }
    }

    pub fn break_period(subject: impl Into<String>, kind: BreakKind) -> Self {
        Self {
            subject: subject.into(),
            teacher: None,
            is_break: true,
            break_kind: Some(kind),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn teacher(&self) -> Option<&str> {
        self.teacher.as_deref()
    }

    pub fn is_break(&self) -> bool {
        self.is_break
    }

    pub fn break_kind(&self) -> Option<&BreakKind> {
        self.break_kind.as_ref()
    }

    /// Break flag, also honoring lessons typed before a matching break existed.
    pub fn counts_as_break(&self, breaks: &[Break]) -> bool {
        self.is_break || find_break(breaks, &self.subject).is_some()
    }
}

/// Address of one grid cell.
///
/// The string form `"{grade}-{day_index+1}-{time_slot_id-1}"` only appears at
/// the snapshot boundary; in memory the struct itself is the map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    pub grade: String,
    pub time_slot_id: TimeSlotId,
    pub day_index: usize,
}

impl CellKey {
    pub fn new(grade: impl Into<String>, time_slot_id: TimeSlotId, day_index: usize) -> Self {
        Self {
            grade: grade.into(),
            time_slot_id,
            day_index,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}",
            self.grade,
            self.day_index + 1,
            i64::from(self.time_slot_id) - 1
        )
    }

    /// Inverse of [`CellKey::encode`]. Splits from the right, so grades that
    /// contain `-` survive. Slot id 0 has no decodable encoding.
    pub fn decode(raw: &str) -> Option<CellKey> {
        let mut parts = raw.rsplitn(3, '-');
        let slot_part = parts.next()?;
        let day_part = parts.next()?;
        let grade = parts.next()?;
        if grade.is_empty() {
            return None;
        }
        let slot_offset: TimeSlotId = parse_digits(slot_part)?;
        let day_number: usize = parse_digits(day_part)?;
        if day_number == 0 {
            return None;
        }
        Some(CellKey {
            grade: grade.to_string(),
            time_slot_id: slot_offset.checked_add(1)?,
            day_index: day_number - 1,
        })
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Teacher named by an assignment, looked up in the teacher map by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherRef<'a> {
    Resolved(&'a Teacher),
    Unresolved(&'a str),
}

impl<'a> TeacherRef<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            TeacherRef::Resolved(t) => t.name.as_str(),
            TeacherRef::Unresolved(name) => name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TeacherRef::Resolved(_))
    }
}

// Secondary levels are labelled "Form 1".."Form 6" in the UI but stored as
// "Grade 7".."Grade 12".
const FORM_OFFSET: u32 = 6;

pub fn grade_display_name(grade: &str) -> String {
    match numbered(grade, "Grade") {
        Some(n) if (7..=12).contains(&n) => format!("Form {}", n - FORM_OFFSET),
        _ => grade.to_string(),
    }
}

pub fn grade_from_display(display: &str) -> String {
    match numbered(display, "Form") {
        Some(m) if (1..=6).contains(&m) => format!("Grade {}", m + FORM_OFFSET),
        _ => display.trim().to_string(),
    }
}

fn numbered(label: &str, prefix: &str) -> Option<u32> {
    let rest = label.trim().strip_prefix(prefix)?;
    parse_digits(rest.trim())
}
