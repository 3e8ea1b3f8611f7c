use crate::conflicts::{schedule_conflicts, Conflicts};
use crate::schedule::Schedule;
use crate::snapshot::timetable_entries;
use crate::stats::{schedule_stats, Stats};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// SHA-256 over everything conflicts and stats read from a schedule.
pub fn content_hash(schedule: &Schedule) -> String {
    let canonical = json!({
        "timetable": timetable_entries(schedule),
        "timeSlots": schedule.time_slots(),
        "breaks": schedule.breaks(),
        "teachers": schedule.teachers(),
        "daysPerWeek": schedule.days_per_week(),
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Memoized conflicts/stats. Results always equal the pure functions; they
/// are only recomputed when the content hash moves.
#[derive(Debug, Default)]
pub struct DerivedCache {
    hash: Option<String>,
    conflicts: Option<Conflicts>,
    stats: HashMap<String, Stats>,
    // Last result for a grade outside `Schedule::grades`; never accumulates.
    scratch: Option<Stats>,
}

impl DerivedCache {
    fn refresh(&mut self, schedule: &Schedule) {
        let hash = content_hash(schedule);
        if self.hash.as_deref() != Some(hash.as_str()) {
            tracing::debug!(hash = %hash, "derived views invalidated");
            self.hash = Some(hash);
            self.conflicts = None;
            self.stats.clear();
            self.scratch = None;
        }
    }

    pub fn conflicts(&mut self, schedule: &Schedule) -> &Conflicts {
        self.refresh(schedule);
        self.conflicts
            .get_or_insert_with(|| schedule_conflicts(schedule))
    }

    /// Memoized per grade for the grades the schedule knows about; any other
    /// name is computed fresh.
    pub fn stats(&mut self, schedule: &Schedule, grade: &str) -> &Stats {
        self.refresh(schedule);
        let grades = schedule.grades();
        if !grades.contains(grade) {
            return self.scratch.insert(schedule_stats(schedule, grade));
        }
        self.stats.retain(|g, _| grades.contains(g.as_str()));
        self.stats
            .entry(grade.to_string())
            .or_insert_with(|| schedule_stats(schedule, grade))
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}
