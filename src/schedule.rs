use chrono::{NaiveTime, Timelike};
use serde::Serialize;

/// Mandatory arrival: volunteers must check in this many minutes before
/// their role's start time.
pub const MANDATORY_ARRIVAL_BUFFER_MIN: i32 = 30;
/// Check-in opens this many minutes before the arrival deadline.
pub const EARLY_CHECK_IN_LIMIT_MIN: i32 = 120;

const MINUTES_PER_DAY: i32 = 1440;

#[derive(Debug, Serialize, Clone, Copy)]
pub struct JobSchedule {
    /// HH:MM
    pub start: &'static str,
    /// HH:MM, may fall past midnight relative to `start`
    pub end: &'static str,
    pub description: &'static str,
    pub tasks: &'static [&'static str],
}

pub const JOB_SCHEDULES: &[(&str, JobSchedule)] = &[
    (
        "Gudang",
        JobSchedule {
            start: "18:00",
            end: "02:00",
            description: "Persiapan Bahan Baku (Malam)",
            tasks: &["Bongkar Muat Sayur", "Kupas & Potong", "QC Bahan"],
        },
    ),
    (
        "Helper",
        JobSchedule {
            start: "00:00",
            end: "08:00",
            description: "Helper Masak & Streamer (3 Shift)",
            tasks: &["Helper Umum (2 org)", "Potong Ayam (1 org)", "Streamer Nasi (1 org)"],
        },
    ),
    (
        "Cook",
        JobSchedule {
            start: "01:00",
            end: "09:00",
            description: "Tim Utama Memasak",
            tasks: &["Tahap 1 (02:00-05:00)", "Tahap 2 (05:00-08:00)", "Seasoning"],
        },
    ),
    (
        "Pemorsian",
        JobSchedule {
            start: "03:00",
            end: "11:00",
            description: "Packing & Plating",
            tasks: &["Tahap 1 (03:00-06:00)", "Tahap 2 (06:00-10:00)"],
        },
    ),
    (
        "Driver",
        JobSchedule {
            start: "07:00",
            end: "15:00",
            description: "Distribusi Makanan",
            tasks: &["Muat Barang", "Jalan Tahap 1 (07:30)", "Jalan Tahap 2 (10:30)"],
        },
    ),
    (
        "Cuci Ompreng",
        JobSchedule {
            start: "13:30",
            end: "21:30",
            description: "Sanitasi & Kebersihan",
            tasks: &["Cuci Ompreng", "Sterilisasi Alat", "Bersih Area"],
        },
    ),
];

pub fn lookup(role: &str) -> Option<&'static JobSchedule> {
    JOB_SCHEDULES
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, schedule)| schedule)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftStatus {
    Ok,
    Late,
    TooEarly,
}

/// Arrival verdict for one check-in attempt. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct ShiftVerdict {
    pub status: ShiftStatus,
    pub message: String,
}

fn time_to_minutes(time: &str) -> i32 {
    let mut parts = time.splitn(2, ':');
    let h: i32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let m: i32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    h * 60 + m
}

/// Evaluate a check-in attempt at `now` against `role`'s shift window.
///
/// Pure function of (role start, now). Roles absent from the table carry no
/// timing constraint. The deadline wraps linearly across midnight; shifts
/// are assumed to be checked into within one nominal 24-hour cycle of `now`.
pub fn shift_status(role: &str, now: NaiveTime) -> ShiftVerdict {
    let Some(schedule) = lookup(role) else {
        return ShiftVerdict {
            status: ShiftStatus::Ok,
            message: "Role umum".to_string(),
        };
    };

    let current_minutes = (now.hour() * 60 + now.minute()) as i32;
    let start_minutes = time_to_minutes(schedule.start);

    let mut arrival_deadline = start_minutes - MANDATORY_ARRIVAL_BUFFER_MIN;
    if arrival_deadline < 0 {
        // Deadline falls on the previous calendar day's clock
        arrival_deadline += MINUTES_PER_DAY;
    }

    let diff = current_minutes - arrival_deadline;

    if diff < -EARLY_CHECK_IN_LIMIT_MIN {
        return ShiftVerdict {
            status: ShiftStatus::TooEarly,
            message: format!(
                "Terlalu awal (Max {} jam sebelum shift)",
                EARLY_CHECK_IN_LIMIT_MIN / 60
            ),
        };
    }

    if diff > 0 {
        return ShiftVerdict {
            status: ShiftStatus::Late,
            message: format!(
                "Terlambat! Wajib hadir {} menit sebelum {}",
                MANDATORY_ARRIVAL_BUFFER_MIN, schedule.start
            ),
        };
    }

    ShiftVerdict {
        status: ShiftStatus::Ok,
        message: "Tepat Waktu".to_string(),
    }
}
