use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    InfraError,
    http_client::{ANALYSIS_REQUEST_TIMEOUT, build_client_with_timeout},
};
use crate::{
    app_error::{AppError, AppResult},
    application::ports::analyzer::ResumeAnalyzer,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROMPT_PREAMBLE: &str = "Analyze the following resume. Respond with a single JSON object \
with the keys \"score\", \"sentiment\", \"key_point\", \"title\", \"summary\", \"success\", \
\"mistakes\", \"improvements\" and \"rewriten_resume\". Return only the raw JSON object.\n\n\
Text to analyze:\n---\n";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// `ResumeAnalyzer` backed by Gemini `generateContent` in JSON mode.
#[derive(Clone)]
pub struct GeminiAnalyzer {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: SecretString, model: String) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client_with_timeout(ANALYSIS_REQUEST_TIMEOUT)?,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }
}

/// Pull the model's JSON object out of a `generateContent` response.
fn extract_analysis(response: GenerateResponse) -> AppResult<serde_json::Value> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| AppError::AnalysisFailed("model returned no content".into()))?;

    let value: serde_json::Value = serde_json::from_str(text.trim()).map_err(|e| {
        tracing::warn!(error = %e, "Model returned malformed JSON");
        AppError::AnalysisFailed("model returned malformed JSON".into())
    })?;

    if !value.is_object() {
        return Err(AppError::AnalysisFailed(
            "model returned a non-object result".into(),
        ));
    }
    Ok(value)
}

#[async_trait]
impl ResumeAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, resume_text: &str) -> AppResult<serde_json::Value> {
        let prompt = format!("{PROMPT_PREAMBLE}{resume_text}\n---");
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::AnalysisFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %detail, "Gemini API error");
            return Err(AppError::AnalysisFailed(format!("model returned {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::AnalysisFailed(format!("unreadable response: {e}")))?;
        extract_analysis(parsed)
    }
}
