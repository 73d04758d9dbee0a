use crate::types::Error;
use crate::workflow::{PhotoVerifier, Verification};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL_FAST_IMAGE: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

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
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
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

#[derive(Debug, Deserialize)]
struct PhotoVerdict {
    #[serde(rename = "hasFace", default)]
    has_face: bool,
    #[serde(rename = "hasHygieneGear", default)]
    has_hygiene_gear: bool,
    #[serde(default)]
    environment: String,
    #[serde(rename = "gearDescription")]
    gear_description: Option<String>,
}

fn strip_data_url_prefix(image: &str) -> &str {
    if !image.starts_with("data:image/") {
        return image;
    }
    match image.find("base64,") {
        Some(idx) => &image[idx + "base64,".len()..],
        None => image,
    }
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
}

impl PhotoVerifier for GeminiClient {
    async fn verify_check_in_photo(&self, base64_image: &str) -> Result<Verification, Error> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: strip_data_url_prefix(base64_image).to_string(),
                        }),
                    },
                    Part {
                        text: Some(
                            "Analyze this volunteer check-in photo for a community kitchen \
                             (Dapur MBG).\n\
                             1. Determine if a real human face is clearly visible.\n\
                             2. Check for kitchen hygiene gear: Mask, Hairnet, or Apron.\n\
                             3. Describe the environment briefly.\n\
                             4. Return JSON."
                                .to_string(),
                        ),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "hasFace": { "type": "BOOLEAN" },
                        "hasHygieneGear": { "type": "BOOLEAN" },
                        "environment": { "type": "STRING" },
                        "gearDescription": { "type": "STRING" }
                    },
                    "required": ["hasFace", "environment"]
                }
            })),
        };

        let text = self.generate(MODEL_FAST_IMAGE, &request).await?;
        let verdict: PhotoVerdict = serde_json::from_str(&text)?;

        let is_verified = verdict.has_face;
        let mut note = if is_verified {
            format!("Verified: Face detected in {}.", verdict.environment)
        } else {
            format!(
                "Warning: No clear face detected. Environment: {}",
                verdict.environment
            )
        };
        if is_verified && verdict.has_hygiene_gear {
            note.push_str(&format!(
                " Hygiene Check: PASS ({}).",
                verdict.gear_description.as_deref().unwrap_or("Gear detected")
            ));
        } else if is_verified {
            note.push_str(" Hygiene Check: No mask/apron detected.");
        }

        Ok(Verification { is_verified, note })
    }
}
