use crate::types::{AttendanceRecord, AttendanceType, Volunteer};
use chrono::{Local, NaiveDate, TimeZone};
use std::collections::HashSet;
use std::path::PathBuf;

pub const RECORDS_KEY: &str = "attendance_records";
pub const VOLUNTEERS_KEY: &str = "volunteers";
pub const RULES_ACCEPTED_KEY: &str = "rules_accepted";

/// Local key-value persistence port. One serialized payload per key,
/// replaced wholesale on every write.
pub trait LocalStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// `LocalStore` backed by one `<key>.json` file per key under a data
/// directory. Write failures are logged and swallowed; a failed read is
/// indistinguishable from an absent key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("could not create data dir {}: {}", dir.display(), e);
        }
        FileStore { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(e) = std::fs::write(self.path_for(key), value) {
            tracing::warn!("could not persist {}: {}", key, e);
        }
    }
}

fn local_date_of(timestamp_millis: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|dt| dt.date_naive())
}

/// Append-only attendance log, newest first, persisted wholesale on every
/// append.
pub struct RecordStore<S: LocalStore> {
    store: S,
    records: Vec<AttendanceRecord>,
}

impl<S: LocalStore> RecordStore<S> {
    /// Restore from the store. A corrupt or unparseable payload is treated
    /// as an empty log.
    pub fn load(store: S) -> Self {
        let records = store
            .get(RECORDS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        RecordStore { store, records }
    }

    /// Newest first.
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn append(&mut self, record: AttendanceRecord) {
        self.records.insert(0, record);
        self.persist();
    }

    fn persist(&mut self) {
        match serde_json::to_string(&self.records) {
            Ok(raw) => self.store.set(RECORDS_KEY, &raw),
            Err(e) => tracing::error!("could not serialize attendance records: {}", e),
        }
    }

    /// Unique, creation-ordered record ID: epoch millis, bumped past the
    /// newest stored ID when two records land in the same millisecond.
    pub fn next_id(&self, now_millis: i64) -> String {
        let newest = self
            .records
            .first()
            .and_then(|r| r.id.parse::<i64>().ok())
            .unwrap_or(0);
        now_millis.max(newest + 1).to_string()
    }

    /// Records whose timestamp falls on `date` (local midnight boundary),
    /// newest first.
    pub fn on_date(&self, date: NaiveDate) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| local_date_of(r.timestamp) == Some(date))
            .collect()
    }

    /// Distinct volunteers with at least one clock-in on `date`.
    pub fn present_count(&self, date: NaiveDate) -> usize {
        self.on_date(date)
            .iter()
            .filter(|r| r.event_type == AttendanceType::ClockIn)
            .map(|r| r.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn late_count(&self, date: NaiveDate) -> usize {
        self.on_date(date)
            .iter()
            .filter(|r| r.status == crate::types::AttendanceStatus::Late)
            .count()
    }
}

fn seed_volunteers(now_millis: i64) -> Vec<Volunteer> {
    vec![
        Volunteer {
            id: "1".to_string(),
            name: "Budi Santoso".to_string(),
            phone: "08123456789".to_string(),
            default_role: "Cook".to_string(),
            join_date: now_millis,
        },
        Volunteer {
            id: "2".to_string(),
            name: "Siti Aminah".to_string(),
            phone: "08129876543".to_string(),
            default_role: "Pemorsian".to_string(),
            join_date: now_millis,
        },
    ]
}

/// Registered volunteers. Mutated only by whole-collection replacement on
/// add; nobody is ever removed.
pub struct VolunteerRoster<S: LocalStore> {
    store: S,
    volunteers: Vec<Volunteer>,
}

impl<S: LocalStore> VolunteerRoster<S> {
    /// Restore from the store, seeding (and persisting) the default roster
    /// when nothing usable is stored yet.
    pub fn load(store: S, now_millis: i64) -> Self {
        let volunteers: Option<Vec<Volunteer>> = store
            .get(VOLUNTEERS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok());
        let mut roster = VolunteerRoster {
            store,
            volunteers: volunteers.unwrap_or_default(),
        };
        if roster.volunteers.is_empty() {
            roster.volunteers = seed_volunteers(now_millis);
            roster.persist();
        }
        roster
    }

    pub fn all(&self) -> &[Volunteer] {
        &self.volunteers
    }

    pub fn len(&self) -> usize {
        self.volunteers.len()
    }

    pub fn add(&mut self, volunteer: Volunteer) {
        self.volunteers.push(volunteer);
        self.persist();
    }

    /// Case-insensitive substring match on the volunteer name.
    pub fn search(&self, term: &str) -> Vec<&Volunteer> {
        let needle = term.to_lowercase();
        self.volunteers
            .iter()
            .filter(|v| v.name.to_lowercase().contains(&needle))
            .collect()
    }

    fn persist(&mut self) {
        match serde_json::to_string(&self.volunteers) {
            Ok(raw) => self.store.set(VOLUNTEERS_KEY, &raw),
            Err(e) => tracing::error!("could not serialize volunteers: {}", e),
        }
    }
}
