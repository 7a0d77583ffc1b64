//! Vision collaborator: turns a photo into a structured inventory assessment.
//!
//! The model call is dispatched on configuration:
//! - **mock mode** — returns a fixed, deterministic 3-item result, for
//!   testing without network or credential dependency;
//! - **live mode** — calls the OpenAI responses API with a JSON-schema
//!   constrained output and parses it into an [`AnalysisResult`].
//!
//! Failures map onto the error taxonomy: [`VisionError::InvalidImage`]
//! for payload problems (HTTP 400), [`VisionError::Config`] when no
//! credential is configured and mock mode is off (501),
//! [`VisionError::Model`] for transport/API failures and
//! [`VisionError::Schema`] for unparseable model output (both 500). The
//! call is never retried automatically, and this module never touches
//! storage — appending the result to the report log is the caller's job.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::VisionConfig;
use crate::models::{AnalysisItem, AnalysisResult};

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

const SYSTEM_PROMPT: &str = "You are a vision assistant for a takoyaki shop inventory app.";

/// Fixed ingredient-detection prompt used when the caller supplies none.
pub const DEFAULT_INSTRUCTIONS: &str =
    "Detect which takoyaki ingredients are running low. Output JSON list with name, ideal, current.";

#[derive(Debug, Error)]
pub enum VisionError {
    /// Missing or malformed image payload.
    #[error("{0}")]
    InvalidImage(String),
    /// No model credential configured and mock mode is off.
    #[error("{0}")]
    Config(String),
    /// Outbound model call failed (network, auth, non-2xx).
    #[error("failed to call model: {0}")]
    Model(String),
    /// Model output did not match the expected object shape.
    #[error("failed to parse model response: {0}")]
    Schema(String),
}

/// Strips an optional data-URL prefix and validates that the payload is
/// decodable base64. Returns the bare base64 string.
pub fn normalize_image_payload(raw: &str) -> Result<String, VisionError> {
    let payload = match raw.split_once(',') {
        Some((_, rest)) => rest,
        None => raw,
    };
    BASE64
        .decode(payload)
        .map_err(|_| VisionError::InvalidImage("Invalid base64 image".to_string()))?;
    Ok(payload.to_string())
}

/// Base64-encodes raw image bytes from a multipart upload.
pub fn encode_image_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// The fixed simulated analysis returned in mock mode.
pub fn mock_result() -> AnalysisResult {
    AnalysisResult {
        inventory: vec![
            AnalysisItem {
                name: "サラダ油（8個入り）".to_string(),
                ideal: json!(8),
                current: json!(6),
            },
            AnalysisItem {
                name: "出汁セット".to_string(),
                ideal: json!(3),
                current: json!(3),
            },
            AnalysisItem {
                name: "タコ（1袋）".to_string(),
                ideal: json!(2),
                current: json!(1),
            },
        ],
        notes: Some("これはモック応答です。MOCK_VISION=1 により生成されています。".to_string()),
    }
}

/// Analyzes an image and returns the structured inventory assessment.
///
/// `image_base64` must already be validated via
/// [`normalize_image_payload`]. In mock mode the network is never touched.
pub async fn analyze(
    config: &VisionConfig,
    image_base64: &str,
    instructions: &str,
) -> Result<AnalysisResult, VisionError> {
    if config.mock_enabled() {
        return Ok(mock_result());
    }

    let api_key = config.api_key().ok_or_else(|| {
        VisionError::Config(
            "OpenAI client not configured. Set OPENAI_API_KEY or enable MOCK_VISION=1 to test locally."
                .to_string(),
        )
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| VisionError::Model(e.to_string()))?;

    let body = request_body(&config.model, instructions, image_base64);

    let response = client
        .post(OPENAI_RESPONSES_URL)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| VisionError::Model(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(VisionError::Model(format!(
            "OpenAI API error {}: {}",
            status, body_text
        )));
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| VisionError::Model(e.to_string()))?;
    parse_model_response(&json)
}

/// Builds the responses-API request with a JSON-schema constrained output.
fn request_body(model: &str, instructions: &str, image_base64: &str) -> Value {
    json!({
        "model": model,
        "input": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {
                "role": "user",
                "content": [
                    {"type": "input_text", "text": instructions},
                    {"type": "input_image", "image_base64": image_base64},
                ],
            },
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "inventory_schema",
                "schema": {
                    "type": "object",
                    "properties": {
                        "inventory": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "ideal": {"type": "integer"},
                                    "current": {"type": "integer"},
                                },
                                "required": ["name", "current"],
                                "additionalProperties": false,
                            },
                        },
                        "notes": {"type": "string"},
                    },
                    "required": ["inventory"],
                    "additionalProperties": false,
                },
            },
        },
    })
}

/// Extracts the structured payload from a responses-API reply.
///
/// Accepts either a top-level `output_text` string or the first
/// `output_text` content block under `output[].content[]`.
fn parse_model_response(json: &Value) -> Result<AnalysisResult, VisionError> {
    let text = output_text(json).ok_or_else(|| {
        VisionError::Schema("missing output text in model response".to_string())
    })?;
    serde_json::from_str(&text).map_err(|e| VisionError::Schema(e.to_string()))
}

fn output_text(json: &Value) -> Option<String> {
    if let Some(text) = json.get("output_text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    for entry in json.get("output")?.as_array()? {
        let Some(content) = entry.get("content").and_then(|c| c.as_array()) else {
            continue;
        };
        for block in content {
            if block.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_base64() {
        let payload = BASE64.encode(b"fake image bytes");
        assert_eq!(normalize_image_payload(&payload).unwrap(), payload);
    }

    #[test]
    fn test_normalize_strips_data_url_prefix() {
        let payload = BASE64.encode(b"fake image bytes");
        let data_url = format!("data:image/png;base64,{}", payload);
        assert_eq!(normalize_image_payload(&data_url).unwrap(), payload);
    }

    #[test]
    fn test_normalize_rejects_invalid_base64() {
        let err = normalize_image_payload("!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, VisionError::InvalidImage(_)));
        assert_eq!(err.to_string(), "Invalid base64 image");
    }

    #[test]
    fn test_mock_result_is_fixed_three_items() {
        let result = mock_result();
        assert_eq!(result.inventory.len(), 3);
        assert_eq!(result.inventory[0].name, "サラダ油（8個入り）");
        assert_eq!(result.inventory[2].current, serde_json::json!(1));
        assert!(result.notes.is_some());
        assert_eq!(result, mock_result());
    }

    #[tokio::test]
    async fn test_analyze_mock_mode_skips_network() {
        let config = VisionConfig {
            mock: true,
            ..VisionConfig::default()
        };
        let result = analyze(&config, "aGVsbG8=", DEFAULT_INSTRUCTIONS)
            .await
            .unwrap();
        assert_eq!(result, mock_result());
    }

    #[test]
    fn test_parse_response_top_level_output_text() {
        let payload = serde_json::json!({
            "output_text": r#"{"inventory": [{"name": "タコ（1袋）", "ideal": 2, "current": 1}], "notes": "low"}"#,
        });
        let result = parse_model_response(&payload).unwrap();
        assert_eq!(result.inventory.len(), 1);
        assert_eq!(result.notes.as_deref(), Some("low"));
    }

    #[test]
    fn test_parse_response_nested_output_blocks() {
        let payload = serde_json::json!({
            "output": [{
                "content": [
                    {"type": "reasoning", "text": "..."},
                    {"type": "output_text", "text": r#"{"inventory": []}"#},
                ],
            }],
        });
        let result = parse_model_response(&payload).unwrap();
        assert!(result.inventory.is_empty());
    }

    #[test]
    fn test_parse_response_schema_errors() {
        let missing = serde_json::json!({"output": []});
        assert!(matches!(
            parse_model_response(&missing).unwrap_err(),
            VisionError::Schema(_)
        ));

        let garbage = serde_json::json!({"output_text": "not json at all"});
        assert!(matches!(
            parse_model_response(&garbage).unwrap_err(),
            VisionError::Schema(_)
        ));

        let wrong_shape = serde_json::json!({"output_text": r#"{"inventory": "nope"}"#});
        assert!(matches!(
            parse_model_response(&wrong_shape).unwrap_err(),
            VisionError::Schema(_)
        ));
    }
}
