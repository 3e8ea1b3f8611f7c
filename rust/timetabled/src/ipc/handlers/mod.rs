pub mod analysis;
pub mod backup;
pub mod breaks;
pub mod cells;
pub mod core;
pub mod grades;
pub mod setup;
pub mod snapshot;
pub mod teachers;
pub mod time_slots;
