use crate::schedule::{self, ShiftStatus};
use crate::storage::{LocalStore, RecordStore};
use crate::types::{
    AttendanceRecord, AttendanceStatus, AttendanceType, Error, LocationData, Volunteer,
};
use chrono::{DateTime, Local};

/// Judgement returned by the photo-verification collaborator.
#[derive(Debug, Clone)]
pub struct Verification {
    pub is_verified: bool,
    pub note: String,
}

pub trait Camera {
    /// Capture one still frame from the live feed as base64 JPEG.
    async fn capture_jpeg(&mut self) -> Result<String, Error>;
}

pub trait PhotoVerifier {
    async fn verify_check_in_photo(&self, base64_image: &str) -> Result<Verification, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    SelectingVolunteer,
    CapturingInput,
    AwaitingVerification,
    RecordCommitted,
}

#[derive(Debug)]
pub enum AttendanceOutcome {
    Committed(AttendanceRecord),
    Rejected(String),
}

/// Drives one volunteer's attendance transaction: selection, capture,
/// verification, record commit. Capture-scoped state (location fix, last
/// capture) lives and dies with the selected volunteer.
pub struct AttendanceWorkflow {
    state: WorkflowState,
    volunteer: Option<Volunteer>,
    location: Option<LocationData>,
    captured: Option<(String, Verification)>,
}

impl AttendanceWorkflow {
    pub fn new() -> Self {
        AttendanceWorkflow {
            state: WorkflowState::SelectingVolunteer,
            volunteer: None,
            location: None,
            captured: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// The committed capture of the current session, if any.
    pub fn last_capture(&self) -> Option<&(String, Verification)> {
        self.captured.as_ref()
    }

    pub fn select_volunteer(&mut self, volunteer: Volunteer) {
        self.volunteer = Some(volunteer);
        self.location = None;
        self.captured = None;
        self.state = WorkflowState::CapturingInput;
    }

    pub fn location_fixed(&mut self, fix: LocationData) {
        self.location = Some(fix);
    }

    /// Discard the last captured image/verdict and return to capture with
    /// the same volunteer. No record is created or removed.
    pub fn retry_capture(&mut self) {
        self.captured = None;
        if self.volunteer.is_some() {
            self.state = WorkflowState::CapturingInput;
        }
    }

    /// Tear down all capture-scoped state and go back to selection.
    pub fn change_volunteer(&mut self) {
        self.volunteer = None;
        self.location = None;
        self.captured = None;
        self.state = WorkflowState::SelectingVolunteer;
    }

    /// Run one clock-in/clock-out attempt at `now`.
    ///
    /// Clock-in is evaluated against the volunteer's shift window first:
    /// too-early attempts are rejected before any photo is taken, late
    /// attempts proceed with status LATE and the verdict appended to the
    /// verification note. Verifier failure is fail-open: the record is
    /// still committed, marked verified, with a fallback note.
    pub async fn submit<C, V, S>(
        &mut self,
        event_type: AttendanceType,
        now: DateTime<Local>,
        camera: &mut C,
        verifier: &V,
        records: &mut RecordStore<S>,
    ) -> AttendanceOutcome
    where
        C: Camera,
        V: PhotoVerifier,
        S: LocalStore,
    {
        if self.state != WorkflowState::CapturingInput {
            return AttendanceOutcome::Rejected("Sesi absensi belum siap.".to_string());
        }
        let (Some(volunteer), Some(location)) =
            (self.volunteer.clone(), self.location.clone())
        else {
            return AttendanceOutcome::Rejected(
                "Sistem belum siap. Pastikan kamera & lokasi aktif.".to_string(),
            );
        };

        let mut status = AttendanceStatus::OnTime;
        let mut time_note = String::new();

        // Strict role time validation for clock-in only; clock-out is
        // always recorded on time.
        if event_type == AttendanceType::ClockIn {
            let verdict = schedule::shift_status(&volunteer.default_role, now.time());
            match verdict.status {
                ShiftStatus::TooEarly => return AttendanceOutcome::Rejected(verdict.message),
                ShiftStatus::Late => {
                    status = AttendanceStatus::Late;
                    time_note = format!(" [{}]", verdict.message);
                }
                ShiftStatus::Ok => {}
            }
        }

        self.state = WorkflowState::AwaitingVerification;
        let photo = match camera.capture_jpeg().await {
            Ok(photo) => photo,
            Err(e) => {
                tracing::warn!("camera capture failed: {}", e);
                self.state = WorkflowState::CapturingInput;
                return AttendanceOutcome::Rejected("Kamera belum siap. Coba lagi.".to_string());
            }
        };

        let verification = match verifier.verify_check_in_photo(&photo).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("photo verification unavailable: {}", e);
                Verification {
                    is_verified: true,
                    note: "AI Verification unavailable (Offline)".to_string(),
                }
            }
        };

        let record = AttendanceRecord {
            id: records.next_id(now.timestamp_millis()),
            user_id: volunteer.id.clone(),
            user_name: volunteer.name.clone(),
            event_type,
            status,
            timestamp: now.timestamp_millis(),
            photo_url: photo.clone(),
            location,
            ai_verification_note: Some(format!("{}{}", verification.note, time_note)),
            is_verified: verification.is_verified,
            activity: Some(volunteer.default_role.clone()),
        };
        records.append(record.clone());

        self.captured = Some((photo, verification));
        self.state = WorkflowState::RecordCommitted;
        AttendanceOutcome::Committed(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemStore;
    use chrono::TimeZone;

    struct MockCamera {
        calls: usize,
    }

    impl Camera for MockCamera {
        async fn capture_jpeg(&mut self) -> Result<String, Error> {
            self.calls += 1;
            Ok("Zm90by1ib29mdGg=".to_string())
        }
    }

    struct BrokenCamera;

    impl Camera for BrokenCamera {
        async fn capture_jpeg(&mut self) -> Result<String, Error> {
            Err("no frame".into())
        }
    }

    enum MockVerifier {
        Approve(&'static str),
        Fail,
    }

    impl PhotoVerifier for MockVerifier {
        async fn verify_check_in_photo(&self, _base64_image: &str) -> Result<Verification, Error> {
            match self {
                MockVerifier::Approve(note) => Ok(Verification {
                    is_verified: true,
                    note: (*note).to_string(),
                }),
                MockVerifier::Fail => Err("gemini unreachable".into()),
            }
        }
    }

    fn driver() -> Volunteer {
        Volunteer {
            id: "7".to_string(),
            name: "Andi Pratama".to_string(),
            phone: "0812345".to_string(),
            default_role: "Driver".to_string(),
            join_date: 0,
        }
    }

    fn fix() -> LocationData {
        LocationData {
            latitude: -6.255,
            longitude: 106.851,
            accuracy: 5.0,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 9, h, m, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn ready_workflow(volunteer: Volunteer) -> AttendanceWorkflow {
        let mut workflow = AttendanceWorkflow::new();
        workflow.select_volunteer(volunteer);
        workflow.location_fixed(fix());
        workflow
    }

    #[tokio::test]
    async fn too_early_rejects_without_capture_or_record() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        // Driver deadline is 06:30; more than two hours before it
        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(4, 0),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Rejected(message) => assert!(message.contains("Terlalu awal")),
            AttendanceOutcome::Committed(_) => panic!("too-early clock-in must be rejected"),
        }
        assert_eq!(camera.calls, 0);
        assert!(records.records().is_empty());
        assert_eq!(workflow.state(), WorkflowState::CapturingInput);
    }

    #[tokio::test]
    async fn late_clock_in_is_annotated() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 45),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        let record = match outcome {
            AttendanceOutcome::Committed(record) => record,
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        };
        assert_eq!(record.status, AttendanceStatus::Late);
        assert!(record.is_verified);
        let note = record.ai_verification_note.as_deref().unwrap();
        assert!(note.contains("Verified"));
        assert!(note.contains("Terlambat"));
        assert_eq!(records.records().len(), 1);
        assert_eq!(workflow.state(), WorkflowState::RecordCommitted);
    }

    #[tokio::test]
    async fn on_time_clock_in_within_arrival_window() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 15),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Committed(record) => {
                assert_eq!(record.status, AttendanceStatus::OnTime);
                assert_eq!(record.activity.as_deref(), Some("Driver"));
            }
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        }
        assert_eq!(camera.calls, 1);
    }

    #[tokio::test]
    async fn general_role_has_no_timing_constraint() {
        let mut volunteer = driver();
        volunteer.default_role = "Umum".to_string();
        let mut workflow = ready_workflow(volunteer);
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(13, 0),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Committed(record) => {
                assert_eq!(record.status, AttendanceStatus::OnTime)
            }
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        }
    }

    #[tokio::test]
    async fn clock_out_is_always_on_time() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        // 12:00 would be LATE for a Driver clock-in
        let outcome = workflow
            .submit(
                AttendanceType::ClockOut,
                at(12, 0),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Committed(record) => {
                assert_eq!(record.status, AttendanceStatus::OnTime);
                assert_eq!(record.event_type, AttendanceType::ClockOut);
                let note = record.ai_verification_note.as_deref().unwrap();
                assert!(!note.contains("Terlambat"));
            }
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        }
    }

    #[tokio::test]
    async fn missing_location_blocks_the_action() {
        let mut workflow = AttendanceWorkflow::new();
        workflow.select_volunteer(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 15),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Rejected(message) => assert!(message.contains("belum siap")),
            AttendanceOutcome::Committed(_) => panic!("must reject without a location fix"),
        }
        assert_eq!(camera.calls, 0);
        assert!(records.records().is_empty());
        assert_eq!(workflow.state(), WorkflowState::CapturingInput);
    }

    #[tokio::test]
    async fn verifier_failure_commits_fail_open() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 15),
                &mut camera,
                &MockVerifier::Fail,
                &mut records,
            )
            .await;

        match outcome {
            AttendanceOutcome::Committed(record) => {
                assert!(record.is_verified);
                let note = record.ai_verification_note.as_deref().unwrap();
                assert!(note.contains("AI Verification unavailable"));
            }
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        }
        assert_eq!(records.records().len(), 1);
    }

    #[tokio::test]
    async fn camera_failure_returns_to_capture() {
        let mut workflow = ready_workflow(driver());
        let mut records = RecordStore::load(MemStore::new());

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 15),
                &mut BrokenCamera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        assert!(matches!(outcome, AttendanceOutcome::Rejected(_)));
        assert!(records.records().is_empty());
        assert_eq!(workflow.state(), WorkflowState::CapturingInput);
    }

    #[tokio::test]
    async fn driver_late_scenario_end_to_end() {
        // Driver (07:00-15:00, deadline 06:30) clocks in at 06:45 with a
        // successful verification.
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());
        let before = records.records().len();

        let outcome = workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 45),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;

        let record = match outcome {
            AttendanceOutcome::Committed(record) => record,
            AttendanceOutcome::Rejected(message) => panic!("unexpected rejection: {}", message),
        };
        assert_eq!(record.status, AttendanceStatus::Late);
        assert!(record.is_verified);
        let note = record.ai_verification_note.as_deref().unwrap();
        assert!(note.contains("Verified"));
        assert!(note.contains("Terlambat! Wajib hadir 30 menit sebelum 07:00"));
        assert_eq!(records.records().len(), before + 1);
    }

    #[tokio::test]
    async fn retry_and_change_volunteer_transitions() {
        let mut workflow = ready_workflow(driver());
        let mut camera = MockCamera { calls: 0 };
        let mut records = RecordStore::load(MemStore::new());

        workflow
            .submit(
                AttendanceType::ClockIn,
                at(6, 15),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;
        assert_eq!(workflow.state(), WorkflowState::RecordCommitted);
        assert!(workflow.last_capture().is_some());

        // Retry discards the capture but keeps the volunteer and the session
        workflow.retry_capture();
        assert_eq!(workflow.state(), WorkflowState::CapturingInput);
        assert!(workflow.last_capture().is_none());
        assert!(workflow.has_location());

        // A second submit from a committed state without retry is rejected
        workflow
            .submit(
                AttendanceType::ClockOut,
                at(14, 0),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;
        assert_eq!(workflow.state(), WorkflowState::RecordCommitted);
        let outcome = workflow
            .submit(
                AttendanceType::ClockOut,
                at(14, 1),
                &mut camera,
                &MockVerifier::Approve("Verified"),
                &mut records,
            )
            .await;
        assert!(matches!(outcome, AttendanceOutcome::Rejected(_)));

        // Changing volunteer tears capture-scoped state down
        workflow.change_volunteer();
        assert_eq!(workflow.state(), WorkflowState::SelectingVolunteer);
        assert!(!workflow.has_location());
    }
}
