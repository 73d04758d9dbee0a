use crate::schedule;
use crate::types::{AttendanceRecord, Error};
use chrono::{Local, TimeZone};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL_SMART_TEXT: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured output of the dashboard operational analysis.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisData {
    #[serde(default)]
    pub summary: String,
    /// Percentage, 0-100.
    #[serde(default)]
    pub attendance_rate: f64,
    #[serde(default)]
    pub role_breakdown: HashMap<String, u32>,
    #[serde(default)]
    pub predicted_portions: u32,
    #[serde(default)]
    pub anomalies: Vec<String>,
}

impl AiAnalysisData {
    /// Neutral fallback when the analyzer is unreachable.
    pub fn unavailable() -> Self {
        AiAnalysisData {
            summary: "AI Analysis unavailable currently.".to_string(),
            attendance_rate: 0.0,
            role_breakdown: HashMap::new(),
            predicted_portions: 0,
            anomalies: Vec::new(),
        }
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn local_label(timestamp_millis: i64, format: &str) -> String {
    Local
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_default()
}

fn schedule_reference() -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (role, s) in schedule::JOB_SCHEDULES {
        map.insert(
            (*role).to_string(),
            serde_json::to_value(s).unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(map)
}

fn roles_listing() -> String {
    let mut listing = String::new();
    for (role, s) in schedule::JOB_SCHEDULES {
        listing.push_str(&format!("- {}: {}-{}\n", role, s.start, s.end));
    }
    listing
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        GeminiClient { client, api_key }
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<String, Error> {
        let response = self
            .client
            .post(format!("{}/{}:generateContent", API_BASE, model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Gemini API error: {}", error_text).into());
        }

        let data: GenerateContentResponse = response.json().await?;
        data.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| Error::from("empty Gemini response"))
    }

    /// Structured operational analysis over today's clock-ins.
    pub async fn generate_dashboard_analysis(
        &self,
        today_clock_ins: &[&AttendanceRecord],
        total_volunteers: usize,
    ) -> Result<AiAnalysisData, Error> {
        let context = json!({
            "totalRegistered": total_volunteers,
            "presentCount": today_clock_ins.len(),
            "scheduleReference": schedule_reference(),
            "attendanceLog": today_clock_ins
                .iter()
                .map(|r| json!({
                    "role": r.activity.clone().unwrap_or_else(|| "General".to_string()),
                    "time": local_label(r.timestamp, "%H:%M:%S"),
                    "name": r.user_name,
                }))
                .collect::<Vec<_>>(),
        });

        let prompt = format!(
            "Analyze current operations for Dapur Kalibata 2 MBG based on this JSON context: {}.\n\n\
             Roles & Schedules:\n{}\n\
             Task:\n\
             1. Calculate role breakdown (count per role).\n\
             2. Predict portions (Assume 1 Cook = 300 portions, 1 Helper = 150 portions).\n\
             3. Identify anomalies (Who is late based on their role schedule? Anyone working wrong hours?).\n\
             4. Return JSON matching the schema.",
            context,
            roles_listing()
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "summary": { "type": "STRING" },
                        "attendanceRate": { "type": "NUMBER" },
                        "roleBreakdown": { "type": "OBJECT" },
                        "predictedPortions": { "type": "INTEGER" },
                        "anomalies": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": ["summary", "attendanceRate", "predictedPortions"]
                }
            })),
        };

        let text = self.generate(MODEL_SMART_TEXT, &request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Free-text daily operational report over the full attendance log.
    pub async fn generate_attendance_report(
        &self,
        records: &[AttendanceRecord],
    ) -> Result<String, Error> {
        let records_summary = serde_json::to_string(
            &records
                .iter()
                .map(|r| {
                    json!({
                        "name": r.user_name,
                        "type": r.event_type,
                        "activity": r.activity.clone().unwrap_or_else(|| "General".to_string()),
                        "time": local_label(r.timestamp, "%Y-%m-%d %H:%M:%S"),
                        "note": r.ai_verification_note,
                    })
                })
                .collect::<Vec<_>>(),
        )?;

        let prompt = format!(
            "You are the Coordinator for \"Dapur Kalibata 2\" (Program Makan Bergizi Gratis).\n\
             Analyze the following volunteer logs and provide a daily operational report.\n\n\
             Data:\n{}\n\n\
             Please include:\n\
             1. Total volunteers present and breakdown by Activity.\n\
             2. Hygiene compliance summary.\n\
             3. Operational irregularities based on check-in times vs roles.\n\
             4. Motivating message.",
            records_summary
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: None,
        };

        self.generate(MODEL_SMART_TEXT, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_reference_covers_every_role() {
        let reference = schedule_reference();
        let map = reference.as_object().unwrap();
        assert_eq!(map.len(), schedule::JOB_SCHEDULES.len());
        assert_eq!(map["Driver"]["start"], "07:00");
        assert_eq!(map["Gudang"]["end"], "02:00");
    }

    #[test]
    fn roles_listing_names_every_schedule() {
        let listing = roles_listing();
        for (role, _) in schedule::JOB_SCHEDULES {
            assert!(listing.contains(role));
        }
        assert!(listing.contains("- Driver: 07:00-15:00"));
    }

    #[test]
    fn analysis_payload_parses_into_structured_data() {
        let data: AiAnalysisData = serde_json::from_str(
            r#"{"summary":"Operasional lancar","attendanceRate":85.5,
                "roleBreakdown":{"Cook":2,"Driver":1},"predictedPortions":750,
                "anomalies":["Driver datang terlambat"]}"#,
        )
        .unwrap();
        assert_eq!(data.attendance_rate, 85.5);
        assert_eq!(data.role_breakdown["Cook"], 2);
        assert_eq!(data.predicted_portions, 750);
        assert_eq!(data.anomalies.len(), 1);
    }
}
