#[path = "../types.rs"]
mod types;
#[path = "../schedule.rs"]
mod schedule;
#[path = "../storage.rs"]
mod storage;
mod capture;
mod gemini;
mod workflow;

use capture::{SiteLocation, SnapshotCamera};
use chrono::{Local, TimeZone};
use gemini::GeminiClient;
use std::io::{self, Write};
use std::time::Duration;
use storage::{FileStore, LocalStore, RecordStore, VolunteerRoster, RULES_ACCEPTED_KEY};
use types::{AttendanceType, Error, Volunteer};
use workflow::{AttendanceOutcome, AttendanceWorkflow};

/// Pause before switching to the history view after a committed record.
const HISTORY_REDIRECT_DELAY: Duration = Duration::from_secs(1);

fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn print_rules() {
    println!();
    println!("=============================================");
    println!(" Peraturan & Jadwal Operasional");
    println!(" Dapur Kalibata 2 - Program MBG");
    println!("=============================================");
    println!();
    println!("PERATURAN WAJIB:");
    println!(
        "- Relawan WAJIB HADIR {} MENIT SEBELUM jam operasional role masing-masing.",
        schedule::MANDATORY_ARRIVAL_BUFFER_MIN
    );
    println!("- Jika nama Anda tidak ada di database, wajib lapor admin untuk input data baru.");
    println!("- APD (Masker, Apron, Hairnet) wajib dipakai sebelum foto absensi.");
    println!();
    println!("Jadwal Operasional Per Role:");
    for (role, s) in schedule::JOB_SCHEDULES {
        println!("  {:<13} {} - {}  {}", role, s.start, s.end, s.description);
        println!("  {:<13} Tugas: {}", "", s.tasks.join(", "));
    }
    println!();
    println!("Kebijakan Kehadiran:");
    println!("- Kehadiran minimal 80% untuk bonus insentif.");
    println!("- Sistem AI akan mendeteksi otomatis jika Anda terlambat atau pulang awal.");
    println!();
}

/// One-time rules acknowledgement, persisted under `rules_accepted`.
/// Returns false when input is exhausted before agreement.
fn rules_gate(store: &mut FileStore) -> bool {
    if store.get(RULES_ACCEPTED_KEY).as_deref() == Some("true") {
        return true;
    }
    print_rules();
    loop {
        let Some(answer) = prompt("Saya Mengerti & Setuju (y): ") else {
            return false;
        };
        if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("setuju") {
            store.set(RULES_ACCEPTED_KEY, "true");
            return true;
        }
    }
}

enum Selection {
    Chosen(Volunteer),
    Register,
    Quit,
}

fn select_volunteer(roster: &VolunteerRoster<FileStore>) -> Selection {
    loop {
        let Some(term) = prompt("\nKetik nama Anda (atau 'daftar' / 'keluar'): ") else {
            return Selection::Quit;
        };
        match term.as_str() {
            "keluar" => return Selection::Quit,
            "daftar" => return Selection::Register,
            _ => {}
        }

        let matches = roster.search(&term);
        if matches.is_empty() {
            println!("Nama \"{}\" tidak ditemukan.", term);
            println!(
                "Anda tidak dapat melakukan absensi jika nama belum terdaftar di database \
                 Dapur Kalibata 2. Ketik 'daftar' untuk registrasi relawan baru."
            );
            continue;
        }

        for (i, v) in matches.iter().enumerate() {
            println!("  [{}] {} ({})", i + 1, v.name, v.default_role);
        }
        let Some(pick) = prompt("Pilih nomor: ") else {
            return Selection::Quit;
        };
        if let Some(v) = pick
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| matches.get(i))
        {
            return Selection::Chosen((*v).clone());
        }
        println!("Pilihan tidak valid.");
    }
}

fn register_volunteer(roster: &mut VolunteerRoster<FileStore>) {
    println!("\n== Registrasi Relawan Baru ==");
    let Some(name) = prompt("Nama Lengkap: ") else { return };
    let Some(phone) = prompt("No. WhatsApp: ") else { return };
    if name.is_empty() || phone.is_empty() {
        println!("Nama dan nomor WhatsApp wajib diisi.");
        return;
    }

    println!("Role / Tugas:");
    for (i, (role, _)) in schedule::JOB_SCHEDULES.iter().enumerate() {
        println!("  [{}] {}", i + 1, role);
    }
    println!("  [{}] Umum / Admin", schedule::JOB_SCHEDULES.len() + 1);
    let Some(pick) = prompt("Pilih role: ") else { return };
    let role = pick
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| schedule::JOB_SCHEDULES.get(i))
        .map(|(role, _)| (*role).to_string())
        .unwrap_or_else(|| "Umum".to_string());

    let now = Local::now().timestamp_millis();
    roster.add(Volunteer {
        id: now.to_string(),
        name,
        phone,
        default_role: role,
        join_date: now,
    });
    println!("Data relawan tersimpan. Pastikan role sesuai dengan jadwal operasional.");
}

fn print_shift_info(volunteer: &Volunteer) {
    match schedule::lookup(&volunteer.default_role) {
        Some(s) => {
            println!(
                "{} | {} ({} - {})",
                volunteer.default_role, s.description, s.start, s.end
            );
            println!("Tugas: {}", s.tasks.join(", "));
        }
        None => println!("{} | Jadwal Umum", volunteer.default_role),
    }
    println!(
        "Info: Anda wajib hadir {} menit sebelum jam operasional {}.",
        schedule::MANDATORY_ARRIVAL_BUFFER_MIN,
        volunteer.default_role
    );
    println!("Pastikan APD Lengkap (Masker, Apron, Hairnet).");
}

fn print_today_history(records: &RecordStore<FileStore>) {
    println!("\n== Riwayat Absensi Hari Ini ==");
    let todays = records.on_date(Local::now().date_naive());
    if todays.is_empty() {
        println!("Belum ada absensi hari ini.");
        return;
    }
    for r in todays {
        let time = Local
            .timestamp_millis_opt(r.timestamp)
            .single()
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let verified = if r.is_verified { "OK" } else { "Perlu Cek Ulang" };
        println!(
            "{}  {:<7} {:<20} {:<12} [{}] {}",
            time,
            r.event_type.label(),
            r.user_name,
            r.status.label(),
            verified,
            r.activity.as_deref().unwrap_or("Umum")
        );
    }
}

async fn attendance_session(
    workflow: &mut AttendanceWorkflow,
    camera: &mut SnapshotCamera,
    verifier: &GeminiClient,
    records: &mut RecordStore<FileStore>,
    volunteer: Volunteer,
) {
    workflow.select_volunteer(volunteer.clone());

    // Two independent acquisitions; neither blocks entry here, but a
    // missing location fix keeps the clock actions rejected.
    match SiteLocation::current_fix() {
        Ok(fix) => {
            workflow.location_fixed(fix);
            println!("\nLokasi Terkunci");
        }
        Err(e) => {
            tracing::warn!("location fix unavailable: {}", e);
            println!("\nMencari Lokasi...");
        }
    }
    if !camera.ready() {
        println!("Kamera belum aktif (snapshot tidak ditemukan).");
    }
    print_shift_info(&volunteer);

    loop {
        let Some(choice) =
            prompt("\n[1] MASUK KERJA (Check-in)  [2] PULANG (Check-out)  [3] Ganti Orang: ")
        else {
            break;
        };
        let event_type = match choice.as_str() {
            "1" => AttendanceType::ClockIn,
            "2" => AttendanceType::ClockOut,
            "3" => break,
            _ => {
                println!("Pilihan tidak valid.");
                continue;
            }
        };

        match workflow
            .submit(event_type, Local::now(), camera, verifier, records)
            .await
        {
            AttendanceOutcome::Rejected(message) => println!("{}", message),
            AttendanceOutcome::Committed(record) => {
                let heading = if record.is_verified {
                    "Verifikasi Selesai"
                } else {
                    "Perlu Cek Ulang"
                };
                println!("\n{}: {}", heading, record.ai_verification_note.as_deref().unwrap_or(""));
                println!("Status: {} ({})", record.status.label(), record.event_type.label());

                let Some(next) =
                    prompt("Tekan Enter untuk lanjut, atau ketik 'ulang' untuk scan ulang: ")
                else {
                    break;
                };
                if next == "ulang" {
                    workflow.retry_capture();
                    continue;
                }
                tokio::time::sleep(HISTORY_REDIRECT_DELAY).await;
                print_today_history(records);
                break;
            }
        }
    }

    workflow.change_volunteer();
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
        tracing::warn!("GEMINI_API_KEY not set; photo verification falls back to offline mode");
    }

    println!("== Absensi Relawan: Dapur Kalibata 2 (Program MBG) ==");

    let mut rules_store = FileStore::new(&data_dir);
    if !rules_gate(&mut rules_store) {
        return Ok(());
    }

    let now_millis = Local::now().timestamp_millis();
    let mut roster = VolunteerRoster::load(FileStore::new(&data_dir), now_millis);
    let mut records = RecordStore::load(FileStore::new(&data_dir));
    let verifier = GeminiClient::new(api_key);
    let mut camera = SnapshotCamera::from_env();
    let mut workflow = AttendanceWorkflow::new();

    loop {
        match select_volunteer(&roster) {
            Selection::Quit => break,
            Selection::Register => register_volunteer(&mut roster),
            Selection::Chosen(volunteer) => {
                attendance_session(&mut workflow, &mut camera, &verifier, &mut records, volunteer)
                    .await;
            }
        }
    }

    Ok(())
}
