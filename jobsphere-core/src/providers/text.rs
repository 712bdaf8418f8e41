//! Wire formats of the text-generation providers
//!
//! Four envelope families cover the supported kinds: Gemini's
//! `generateContent`, the OpenAI-compatible chat completions API (OpenAI,
//! OpenRouter, Groq, xAI), Cohere chat and the HuggingFace inference API.

use super::adapter::{ProviderDescriptor, ProviderKind};
use super::error::{ProviderError, ProviderResult};
use crate::config::SecretString;
use crate::http::{HttpMethod, ProviderRequest};
use crate::protocol::PromptPayload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<&'a str>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct HuggingFaceRequest {
    inputs: String,
    parameters: HuggingFaceParameters,
}

#[derive(Debug, Serialize)]
struct HuggingFaceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct HuggingFaceGeneration {
    generated_text: Option<String>,
}

pub(crate) fn build_request(
    kind: ProviderKind,
    provider: &ProviderDescriptor,
    credential: Option<&SecretString>,
    prompt: &PromptPayload,
    base: ProviderRequest,
) -> ProviderResult<ProviderRequest> {
    let model = provider
        .model
        .as_deref()
        .or(kind.default_model())
        .ok_or_else(|| ProviderError::InvalidPayload {
            provider: provider.id.clone(),
            message: "no model configured".to_string(),
        })?;
    let key = credential.map(SecretString::expose_secret).unwrap_or_default();

    let mut request = base;
    request.method = HttpMethod::Post;

    let request = match kind {
        ProviderKind::Gemini => {
            request.url = format!("{}/{}:generateContent", provider.endpoint, model);
            let body = GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text: &prompt.prompt }],
                }],
                system_instruction: prompt.system.as_deref().map(|text| GeminiContent {
                    parts: vec![GeminiPart { text }],
                }),
                generation_config: GeminiGenerationConfig {
                    max_output_tokens: prompt.max_tokens,
                    temperature: prompt.temperature,
                },
            };
            request
                .header("x-goog-api-key", key)
                .json(serde_json::to_value(body)?)
        }
        ProviderKind::Cohere => {
            let body = CohereRequest {
                model,
                message: &prompt.prompt,
                preamble: prompt.system.as_deref(),
                max_tokens: prompt.max_tokens,
                temperature: prompt.temperature,
            };
            request
                .header("Authorization", format!("Bearer {}", key))
                .json(serde_json::to_value(body)?)
        }
        ProviderKind::HuggingFace => {
            request.url = format!("{}/{}", provider.endpoint, model);
            let inputs = match &prompt.system {
                Some(system) => format!("{}\n\n{}", system, prompt.prompt),
                None => prompt.prompt.clone(),
            };
            let body = HuggingFaceRequest {
                inputs,
                parameters: HuggingFaceParameters {
                    max_new_tokens: prompt.max_tokens,
                    temperature: prompt.temperature,
                    return_full_text: false,
                },
            };
            request
                .header("Authorization", format!("Bearer {}", key))
                .json(serde_json::to_value(body)?)
        }
        _ => {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = &prompt.system {
                messages.push(ChatMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(ChatMessage {
                role: "user",
                content: &prompt.prompt,
            });
            let body = ChatRequest {
                model,
                messages,
                max_tokens: prompt.max_tokens,
                temperature: prompt.temperature,
            };
            request
                .header("Authorization", format!("Bearer {}", key))
                .json(serde_json::to_value(body)?)
        }
    };
    Ok(request)
}

/// Generated text of a successful response
pub(crate) fn extract(kind: ProviderKind, body: &str) -> ProviderResult<String> {
    let text = match kind {
        ProviderKind::Gemini => {
            let response: GeminiResponse = serde_json::from_str(body)?;
            response
                .candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.content)
                .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        }
        ProviderKind::Cohere => serde_json::from_str::<CohereResponse>(body)?.text,
        ProviderKind::HuggingFace => serde_json::from_str::<Vec<HuggingFaceGeneration>>(body)?
            .into_iter()
            .next()
            .and_then(|generation| generation.generated_text),
        _ => {
            let response: ChatResponse = serde_json::from_str(body)?;
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
        }
    };
    text.ok_or_else(|| ProviderError::envelope(kind, "no generated text in response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{TaskDescriptor, TaskType};
    use std::time::Duration;
    use uuid::Uuid;

    fn request_for(provider: &ProviderDescriptor, prompt: PromptPayload) -> ProviderRequest {
        let task = TaskDescriptor::prompt(TaskType::GenerateAnswer, prompt);
        provider
            .kind
            .build_request(
                provider,
                provider.credential(0),
                &task,
                Uuid::new_v4(),
                Duration::from_secs(5),
            )
            .unwrap()
    }

    #[test]
    fn test_gemini_request() {
        let provider = ProviderDescriptor::new("gemini", ProviderKind::Gemini)
            .with_endpoint("http://localhost/v1beta/models")
            .with_credential("AIza-test-key");
        let request = request_for(&provider, PromptPayload::new("Tell me").with_system("Be brief"));

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            "http://localhost/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(request.header_value("x-goog-api-key"), Some("AIza-test-key"));
        let body = request.body.unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Tell me");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_openai_compatible_request() {
        let provider =
            ProviderDescriptor::new("groq", ProviderKind::Groq).with_credential("gsk-test");
        let request = request_for(&provider, PromptPayload::new("Hello"));

        assert_eq!(request.url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(request.header_value("authorization"), Some("Bearer gsk-test"));
        let body = request.body.unwrap();
        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_envelopes() {
        let gemini = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}]}}]}"#;
        assert_eq!(extract(ProviderKind::Gemini, gemini).unwrap(), r#"{"a":1}"#);

        let chat = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        assert_eq!(extract(ProviderKind::OpenRouter, chat).unwrap(), "hi");

        assert_eq!(extract(ProviderKind::Cohere, r#"{"text":"yo"}"#).unwrap(), "yo");
        assert_eq!(
            extract(ProviderKind::HuggingFace, r#"[{"generated_text":"ok"}]"#).unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_extract_rejects_foreign_envelope() {
        assert!(matches!(
            extract(ProviderKind::OpenAi, r#"{"choices":[]}"#),
            Err(ProviderError::Envelope { .. })
        ));
        assert!(matches!(
            extract(ProviderKind::Gemini, "not json"),
            Err(ProviderError::ParseError(_))
        ));
    }
}
