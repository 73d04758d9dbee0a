use serde::{Deserialize, Serialize};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceType {
    #[serde(rename = "CLOCK_IN")]
    ClockIn,
    #[serde(rename = "CLOCK_OUT")]
    ClockOut,
}

impl AttendanceType {
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceType::ClockIn => "MASUK",
            AttendanceType::ClockOut => "PULANG",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    #[serde(rename = "ON_TIME")]
    OnTime,
    #[serde(rename = "LATE")]
    Late,
    // Declared for clock-out classification but never produced; kept so
    // payloads that carry them still deserialize.
    #[serde(rename = "EARLY")]
    EarlyLeave,
    #[serde(rename = "OVERTIME")]
    Overtime,
}

impl AttendanceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "Tepat Waktu",
            AttendanceStatus::Late => "Terlambat",
            AttendanceStatus::EarlyLeave => "Pulang Cepat",
            AttendanceStatus::Overtime => "Lembur",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

/// One immutable clock-in/clock-out event. Field names and enum tags match
/// the persisted JSON payloads (`attendance_records` key).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "type")]
    pub event_type: AttendanceType,
    pub status: AttendanceStatus,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub photo_url: String,
    pub location: LocationData,
    pub ai_verification_note: Option<String>,
    pub is_verified: bool,
    /// Role snapshot at creation time.
    pub activity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Must match a schedule-table role or be "Umum" (general).
    pub default_role: String,
    /// Epoch milliseconds.
    pub join_date: i64,
}
