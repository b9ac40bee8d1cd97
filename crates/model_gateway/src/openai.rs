//! OpenAI-compatible reasoning client.
//!
//! Talks to any server exposing `/chat/completions` with `json_schema`
//! response formats and `/embeddings` (OpenAI, Ollama, vLLM, ...).

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use swarm_core::{
    config::ModelGatewayConfig,
    traits::{ReasoningClient, StructuredRequest},
    Error, Result, SchemaError,
};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Reasoning client over an OpenAI-compatible HTTP API.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    config: ModelGatewayConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: ModelGatewayConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.endpoint(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn chat_body(&self, request: &StructuredRequest) -> Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": true,
                },
            },
        })
    }

    async fn send(&self, path: &str, body: &Value) -> std::result::Result<reqwest::Response, String> {
        let response = self
            .post(path)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", path, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{} returned {}: {}", path, status, text));
        }
        Ok(response)
    }
}

/// Content of the first choice as JSON. Missing or blank content is `None`.
fn parse_chat_content(response: ChatResponse) -> Result<Option<Value>> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(None);
    };
    if let Some(refusal) = choice.message.refusal {
        return Err(Error::model_provider(format!("model refused: {}", refusal)));
    }
    match choice.message.content {
        Some(content) if !content.trim().is_empty() => {
            let value = serde_json::from_str(&content).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl ReasoningClient for OpenAiCompatClient {
    async fn structured_complete(&self, request: &StructuredRequest) -> Result<Option<Value>> {
        tracing::debug!(model = %self.config.model, schema = %request.schema_name, "Requesting structured completion");

        let response: ChatResponse = self
            .send("chat/completions", &self.chat_body(request))
            .await
            .map_err(Error::model_provider)?
            .json()
            .await
            .map_err(|e| Error::model_provider(format!("malformed completion response: {}", e)))?;

        parse_chat_content(response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": self.config.embedding_model, "input": text });

        let response: EmbeddingResponse = self
            .send("embeddings", &body)
            .await
            .map_err(Error::embedding)?
            .json()
            .await
            .map_err(|e| Error::embedding(format!("malformed embedding response: {}", e)))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::embedding("embedding response contained no vectors"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StructuredRequest {
        StructuredRequest {
            system_prompt: "rules".into(),
            user_prompt: "mission".into(),
            schema_name: "MissionPlan".into(),
            schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_chat_body_shape() {
        let client = OpenAiCompatClient::new(ModelGatewayConfig::default());
        let body = client.chat_body(&request());
        assert_eq!(body["model"], "gpt-oss:20b");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "mission");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "MissionPlan");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let config = ModelGatewayConfig {
            api_base: "http://localhost:11434/v1/".into(),
            ..ModelGatewayConfig::default()
        };
        let client = OpenAiCompatClient::new(config);
        assert_eq!(client.endpoint("embeddings"), "http://localhost:11434/v1/embeddings");
    }

    #[test]
    fn test_parse_chat_content() {
        let ok: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "{\"reasoning\": \"r\", \"tasks\": []}"}}]}))
                .unwrap();
        assert_eq!(parse_chat_content(ok).unwrap().unwrap()["reasoning"], "r");

        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(parse_chat_content(empty).unwrap().is_none());

        let blank: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "  "}}]})).unwrap();
        assert!(parse_chat_content(blank).unwrap().is_none());

        let garbage: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "not json"}}]})).unwrap();
        assert!(matches!(parse_chat_content(garbage), Err(Error::Schema(SchemaError::InvalidJson(_)))));

        let refused: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null, "refusal": "no"}}]})).unwrap();
        assert!(matches!(parse_chat_content(refused), Err(Error::ModelProvider(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let config = ModelGatewayConfig {
            api_base: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
            ..ModelGatewayConfig::default()
        };
        let client = OpenAiCompatClient::new(config);
        assert!(matches!(client.embed("x").await, Err(Error::Embedding(_))));
        assert!(matches!(
            client.structured_complete(&request()).await,
            Err(Error::ModelProvider(_))
        ));
    }
}
