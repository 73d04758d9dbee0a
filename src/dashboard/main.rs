#[path = "../types.rs"]
mod types;
#[path = "../schedule.rs"]
mod schedule;
#[path = "../storage.rs"]
mod storage;
mod gemini;

use chrono::{Local, TimeZone};
use gemini::{AiAnalysisData, GeminiClient};
use storage::{FileStore, RecordStore, VolunteerRoster};
use types::{AttendanceRecord, AttendanceType, Error};

/// Daily kitchen output target (Makan Bergizi Gratis).
const TARGET_PORTIONS: u32 = 1500;

fn join_date_label(timestamp_millis: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|dt| dt.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

async fn print_analysis(
    client: &GeminiClient,
    today_records: &[&AttendanceRecord],
    total_volunteers: usize,
) {
    println!("--- Analisis Operasional AI ---");
    if today_records.is_empty() {
        println!("Belum ada data absensi hari ini untuk dianalisis.");
        return;
    }

    let clock_ins: Vec<&AttendanceRecord> = today_records
        .iter()
        .copied()
        .filter(|r| r.event_type == AttendanceType::ClockIn)
        .collect();

    let analysis = match client
        .generate_dashboard_analysis(&clock_ins, total_volunteers)
        .await
    {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!("dashboard analysis failed: {}", e);
            AiAnalysisData::unavailable()
        }
    };

    println!("\"{}\"", analysis.summary);
    println!("Tingkat Kehadiran : {}%", analysis.attendance_rate.round());
    println!("Estimasi Porsi    : {}", analysis.predicted_portions);
    if !analysis.role_breakdown.is_empty() {
        println!("Role Breakdown:");
        for (role, count) in &analysis.role_breakdown {
            println!("  {:<13} {}", role, count);
        }
    }
    if !analysis.anomalies.is_empty() {
        println!("Perhatian:");
        for anomaly in &analysis.anomalies {
            println!("  - {}", anomaly);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set; AI output falls back to neutral values");
    }

    let now = Local::now();
    let records = RecordStore::load(FileStore::new(&data_dir));
    let roster = VolunteerRoster::load(FileStore::new(&data_dir), now.timestamp_millis());
    let client = GeminiClient::new(api_key);

    if std::env::args().nth(1).as_deref() == Some("report") {
        let report = match client.generate_attendance_report(records.records()).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("report generation failed: {}", e);
                "Error generating report.".to_string()
            }
        };
        println!("{}", report);
        return Ok(());
    }

    println!("== Dashboard MBG ==");
    println!("Pantau operasional Dapur Kalibata 2 hari ini.\n");

    let today = now.date_naive();
    println!("Hadir Hari Ini    : {} Orang", records.present_count(today));
    println!(
        "Datang Terlambat  : {} Orang (Perlu Evaluasi)",
        records.late_count(today)
    );
    println!(
        "Target Porsi      : {} (Makan Bergizi Gratis)",
        TARGET_PORTIONS
    );
    println!("Total Relawan     : {} Terdaftar\n", roster.len());

    let today_records = records.on_date(today);
    print_analysis(&client, &today_records, roster.len()).await;

    println!("\n--- Relawan Terbaru ---");
    for v in roster.all() {
        println!(
            "{:<20} {:<13} {}",
            v.name,
            v.default_role,
            join_date_label(v.join_date)
        );
    }

    Ok(())
}
