//! Transcription and translation services used around the consult pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::{AssistantError, Result};
use crate::llm::{CompletionModel, extract_json_object};
use crate::patient::PatientRecord;

/// Clinical fields read out of a dictated note. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribedFields {
    #[serde(rename = "HbA1c", default)]
    pub hba1c: String,
    #[serde(rename = "Blood Glucose", default)]
    pub blood_glucose: String,
    #[serde(rename = "eGFR", default)]
    pub egfr: String,
    #[serde(rename = "Lipid Panel", default)]
    pub lipid_panel: String,
    #[serde(rename = "Blood Pressure", default)]
    pub blood_pressure: String,
    #[serde(rename = "Symptoms & Notes", default)]
    pub symptoms_notes: String,
    #[serde(rename = "Treatments Adjustments", default)]
    pub treatment_adjustments: String,
}

impl TranscribedFields {
    /// Fill the matching record fields; empty values leave the record untouched.
    pub fn apply_to(&self, record: &mut PatientRecord) {
        let mut map = Map::new();
        for (key, value) in [
            ("latest_hba1c", &self.hba1c),
            ("blood_glucose", &self.blood_glucose),
            ("egfr", &self.egfr),
            ("lipid_panel", &self.lipid_panel),
            ("blood_pressure", &self.blood_pressure),
            ("symptoms_notes", &self.symptoms_notes),
            ("treatment_adjustments", &self.treatment_adjustments),
        ] {
            map.insert(key.to_string(), Value::String(value.clone()));
        }
        let parsed = PatientRecord::from_map(&map);

        record.latest_hba1c = parsed.latest_hba1c.or(record.latest_hba1c);
        record.egfr = parsed.egfr.or(record.egfr);
        if parsed.blood_glucose.is_some() {
            record.blood_glucose = parsed.blood_glucose;
        }
        if parsed.lipid_panel.is_some() {
            record.lipid_panel = parsed.lipid_panel;
        }
        if parsed.blood_pressure.is_some() {
            record.blood_pressure = parsed.blood_pressure;
        }
        if parsed.symptoms_notes.is_some() {
            record.symptoms_notes = parsed.symptoms_notes;
        }
        if parsed.treatment_adjustments.is_some() {
            record.treatment_adjustments = parsed.treatment_adjustments;
        }
    }
}

/// Parse the transcription model's reply, tolerating code fences and
/// non-string values.
pub fn parse_transcription(reply: &str) -> Result<TranscribedFields> {
    let json = extract_json_object(reply).ok_or_else(|| {
        AssistantError::Extraction("transcription reply contains no JSON object".to_string())
    })?;
    let Value::Object(object) = serde_json::from_str::<Value>(json)
        .map_err(|e| AssistantError::Extraction(format!("invalid transcription JSON: {e}")))?
    else {
        return Err(AssistantError::Extraction(
            "transcription reply is not an object".to_string(),
        ));
    };

    let text = |key: &str| match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    Ok(TranscribedFields {
        hba1c: text("HbA1c"),
        blood_glucose: text("Blood Glucose"),
        egfr: text("eGFR"),
        lipid_panel: text("Lipid Panel"),
        blood_pressure: text("Blood Pressure"),
        symptoms_notes: text("Symptoms & Notes"),
        treatment_adjustments: text("Treatments Adjustments"),
    })
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `format` is the audio container, e.g. `mp3` or `wav`.
    async fn transcribe(&self, audio: Vec<u8>, format: &str) -> Result<TranscribedFields>;
}

const TRANSCRIPTION_INSTRUCTION: &str = "Analyze the audio and extract patient medical data. \
Return ONLY a JSON object with these exact keys (use empty string if not mentioned):\n\
{\"HbA1c\": \"\", \"Blood Glucose\": \"\", \"eGFR\": \"\", \"Lipid Panel\": \"\", \
\"Blood Pressure\": \"\", \"Symptoms & Notes\": \"\", \"Treatments Adjustments\": \"\"}";

/// Audio-capable chat model on OpenRouter.
pub struct OpenRouterTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenRouterTranscriber {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| AssistantError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: settings.openrouter_api_key.clone(),
            base_url: settings.openrouter_base_url.clone(),
            model: settings.transcription_model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenRouterTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, format: &str) -> Result<TranscribedFields> {
        info!(model = %self.model, bytes = audio.len(), format, "Transcribing audio");

        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": TRANSCRIPTION_INSTRUCTION },
                        {
                            "type": "input_audio",
                            "input_audio": {
                                "data": general_purpose::STANDARD.encode(&audio),
                                "format": format,
                            }
                        }
                    ]
                }
            ]
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            error!(status = %response.status(), "Transcription request failed");
            return Err(AssistantError::TransientService(format!(
                "transcription request failed: {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AssistantError::TransientService("invalid response format from transcription model".to_string())
            })?;

        parse_transcription(content)
    }
}

pub const TRANSLATION_SYSTEM_PROMPT: &str = "You are a professional medical translator. Translate the \
following text into clear, fluent Modern Standard Arabic suitable for a patient to read and understand. \
Use simple and natural language while keeping medical information accurate. Translate medical terms into \
commonly used Arabic equivalents (for example, 'HbA1c' → 'السكري التراكمي'). Keep sentences short and \
clear for a non-medical reader. Write only the translation, without notes about the translation itself.";

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Translation through a completion model.
pub struct LlmTranslator {
    model: Arc<dyn CompletionModel>,
    instruction: String,
}

impl LlmTranslator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            instruction: TRANSLATION_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let prompt = format!("Text to translate:\n{text}");
        let translated = self.model.complete(&self.instruction, &prompt).await?;
        Ok(translated.trim().to_string())
    }
}

/// Translate a finished report; failures degrade to an empty string.
pub async fn translate_or_empty(translator: &dyn Translator, text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match translator.translate(text).await {
        Ok(translated) => translated,
        Err(e) => {
            warn!("Translation failed, continuing without it: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn fenced_transcription_fills_missing_keys() {
        let reply = "```json\n{\"HbA1c\": \"8.2%\", \"eGFR\": 48, \"Symptoms & Notes\": \"fatigue\"}\n```";

        let fields = parse_transcription(reply).unwrap();

        assert_eq!(fields.hba1c, "8.2%");
        assert_eq!(fields.egfr, "48");
        assert_eq!(fields.symptoms_notes, "fatigue");
        assert_eq!(fields.blood_pressure, "");
    }

    #[test]
    fn transcription_without_json_is_an_error() {
        assert!(matches!(
            parse_transcription("no data heard"),
            Err(AssistantError::Extraction(_))
        ));
    }

    #[test]
    fn fields_serialize_with_form_labels() {
        let value = serde_json::to_value(TranscribedFields {
            blood_glucose: "180 mg/dL".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(value["Blood Glucose"], "180 mg/dL");
        assert_eq!(value["Treatments Adjustments"], "");
    }

    #[test]
    fn apply_fills_record_and_keeps_existing_values() {
        let mut record = PatientRecord {
            age: Some(61),
            egfr: Some(70.0),
            ..Default::default()
        };
        let fields = TranscribedFields {
            hba1c: "8.2%".into(),
            blood_pressure: "150/90".into(),
            ..Default::default()
        };

        fields.apply_to(&mut record);

        assert_eq!(record.latest_hba1c, Some(8.2));
        assert_eq!(record.blood_pressure.as_deref(), Some("150/90"));
        assert_eq!(record.egfr, Some(70.0));
        assert_eq!(record.age, Some(61));
    }

    #[tokio::test]
    async fn translator_sends_instruction_and_trims() {
        let model = ScriptedModel::replying("  نص مترجم \n");
        let translator = LlmTranslator::new(model.clone());

        let out = translator.translate("Take your medicine").await.unwrap();

        assert_eq!(out, "نص مترجم");
        let calls = model.calls();
        assert_eq!(calls[0].0, TRANSLATION_SYSTEM_PROMPT);
        assert!(calls[0].1.ends_with("Take your medicine"));
    }

    #[tokio::test]
    async fn translation_failure_degrades_to_empty() {
        let translator = LlmTranslator::new(ScriptedModel::failing());
        assert_eq!(translate_or_empty(&translator, "report").await, "");
    }

    #[tokio::test]
    async fn empty_text_is_not_sent() {
        let model = ScriptedModel::replying("x");
        let translator = LlmTranslator::new(model.clone());
        assert_eq!(translate_or_empty(&translator, "   ").await, "");
        assert!(model.calls().is_empty());
    }
}
