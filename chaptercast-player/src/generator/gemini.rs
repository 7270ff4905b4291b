//! Gemini `generateContent` REST client
//!
//! Implements [`ContentGenerator`] with four request shapes:
//! - chapter list: JSON mode with a response schema
//! - script text: plain text
//! - cover image: image model, first inline-data part becomes a `data:` URL
//! - speech: TTS model with a prebuilt voice, inline data is base64 PCM

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::generator::{ContentGenerator, SCRIPT_EMPTY_PLACEHOLDER, SCRIPT_FAILURE_PLACEHOLDER};
use crate::playlist::{ChapterStub, Narrator};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("chaptercast/", env!("CARGO_PKG_VERSION"));

/// `generateContent` response envelope (only the fields we read)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub data: String,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }

    /// Concatenated text of the first candidate
    pub fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    /// First inline-data part of the first candidate
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}

/// Gemini REST client
pub struct GeminiGenerator {
    http_client: reqwest::Client,
    config: GeneratorConfig,
    api_key: String,
    chapter_count: usize,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig, api_key: String, chapter_count: usize) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Generation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            api_key,
            chapter_count,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let response = self
            .http_client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("{} request failed: {}", model, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "{} returned {}: {}",
                model,
                status.as_u16(),
                error_text
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| Error::Generation(format!("{} response unreadable: {}", model, e)))
    }
}

/// Chapter list request body
pub fn chapter_list_request(topic: &str, chapter_count: usize) -> Value {
    let prompt = format!(
        "Create a curated list of {count} distinct audio chapters to teach someone about: \"{topic}\".\n\
         Each chapter should have a catchy title, an author name (can be a historical figure or expert related to the topic), and a 1-sentence description.\n\
         Return strictly JSON.",
        count = chapter_count,
        topic = topic
    );

    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "chapterNumber": { "type": "INTEGER" },
                        "title": { "type": "STRING" },
                        "author": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["chapterNumber", "title", "author", "description"]
                }
            }
        }
    })
}

/// Script request body
pub fn script_request(stub: &ChapterStub, topic: &str) -> Value {
    let prompt = format!(
        "Write a compelling, educational script (approx 200-300 words) for an audio chapter.\n\
         Topic: {topic}\n\
         Chapter: {title} by {author}\n\
         Context: {description}\n\n\
         Style: Engaging, clear, like a high-quality podcast or audiobook. Do not include \"Scene\" or sound effect instructions. Just the spoken text.",
        topic = topic,
        title = stub.title,
        author = stub.author,
        description = stub.description
    );

    json!({ "contents": [{ "parts": [{ "text": prompt }] }] })
}

/// Cover image request body
pub fn cover_request(stub: &ChapterStub) -> Value {
    let prompt = format!(
        "A minimalist, abstract, high-design album cover for a podcast chapter titled \"{}\".\n\
         Theme: Knowledge, Modern, Digital Art.\n\
         Colors: Dark slate, electric blue, gold.\n\
         No text on image.",
        stub.title
    );

    json!({ "contents": [{ "parts": [{ "text": prompt }] }] })
}

/// Speech request body
pub fn speech_request(text: &str, narrator: Narrator) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": narrator.voice_name() }
                }
            }
        }
    })
}

/// Parse the JSON-mode chapter list payload
pub fn parse_chapter_list(text: &str) -> Result<Vec<ChapterStub>> {
    let stubs: Vec<ChapterStub> = serde_json::from_str(text.trim())
        .map_err(|e| Error::Generation(format!("Malformed chapter list: {}", e)))?;

    if stubs.is_empty() {
        return Err(Error::Generation("Chapter list is empty".to_string()));
    }
    Ok(stubs)
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate_chapter_list(&self, topic: &str) -> Result<Vec<ChapterStub>> {
        debug!(topic = %topic, count = self.chapter_count, "Generating chapter list");

        let response = self
            .generate(
                &self.config.text_model,
                &chapter_list_request(topic, self.chapter_count),
            )
            .await?;

        let text = response
            .text()
            .ok_or_else(|| Error::Generation("No data returned for chapter list".to_string()))?;

        parse_chapter_list(&text)
    }

    async fn generate_script_text(&self, stub: &ChapterStub, topic: &str) -> Result<String> {
        debug!(chapter = stub.chapter_number, title = %stub.title, "Generating script text");

        match self
            .generate(&self.config.text_model, &script_request(stub, topic))
            .await
        {
            Ok(response) => Ok(response
                .text()
                .unwrap_or_else(|| SCRIPT_EMPTY_PLACEHOLDER.to_string())),
            Err(e) => {
                warn!(chapter = stub.chapter_number, "Script generation failed: {}", e);
                Ok(SCRIPT_FAILURE_PLACEHOLDER.to_string())
            }
        }
    }

    async fn generate_cover_image(&self, stub: &ChapterStub) -> Result<Option<String>> {
        debug!(chapter = stub.chapter_number, title = %stub.title, "Generating cover image");

        let response = self
            .generate(&self.config.image_model, &cover_request(stub))
            .await?;

        Ok(response
            .inline_data()
            .map(|inline| format!("data:{};base64,{}", inline.mime_type, inline.data)))
    }

    async fn generate_speech(&self, text: &str, narrator: Narrator) -> Result<Option<Vec<u8>>> {
        debug!(narrator = %narrator, chars = text.len(), "Generating speech");

        let response = self
            .generate(&self.config.speech_model, &speech_request(text, narrator))
            .await?;

        let Some(inline) = response.inline_data() else {
            return Ok(None);
        };

        let bytes = BASE64
            .decode(inline.data.trim())
            .map_err(|e| Error::Generation(format!("Speech payload is not base64: {}", e)))?;

        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        }))
        .unwrap();

        assert_eq!(response.text().as_deref(), Some("Hello, world"));
        assert!(response.inline_data().is_none());
    }

    #[test]
    fn test_empty_response_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.text().is_none());

        let blank: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        }))
        .unwrap();
        assert!(blank.text().is_none());
    }

    #[test]
    fn test_inline_data_found_after_text_part() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "QUJD" } }
            ] } }]
        }))
        .unwrap();

        let inline = response.inline_data().unwrap();
        assert_eq!(inline.mime_type, "image/jpeg");
        assert_eq!(inline.data, "QUJD");
    }

    #[test]
    fn test_parse_chapter_list() {
        let stubs = parse_chapter_list(
            r#"[{"chapterNumber":1,"title":"Origins","author":"Hopper","description":"Where it began."}]"#,
        )
        .unwrap();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].author, "Hopper");

        assert!(matches!(parse_chapter_list("[]"), Err(Error::Generation(_))));
        assert!(matches!(
            parse_chapter_list("not json"),
            Err(Error::Generation(_))
        ));
    }

    #[test]
    fn test_speech_request_carries_voice() {
        let body = speech_request("Once upon a time", Narrator::Fenrir);
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Fenrir"
        );
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
    }

    #[test]
    fn test_chapter_list_request_uses_json_mode() {
        let body = chapter_list_request("Volcanoes", 7);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("7 distinct audio chapters"));
        assert!(prompt.contains("Volcanoes"));
    }
}
