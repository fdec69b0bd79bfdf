//! Chat-completions client for the advisory endpoint.

use crate::context::AdvisoryContext;
use crate::error::{AdvisorError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// System prompt framing the advisor as a tax auditor. References the
/// same code vocabulary the extractor works with.
const AUDITOR_SYSTEM_PROMPT: &str = "\
Eres un auditor tributario de nivel profesional. Analiza los datos del F29 \
y asesora al cliente con proactividad.

Reglas:
1. Inicia con una tabla resumen que incluya [538] Debito, [511] Credito \
Facturas, [504] Remanente Anterior, [537] Credito del Mes y [91] Total a \
Pagar.
2. Si el codigo 504 esta presente, comenta la consistencia del arrastre de \
remanente.
3. Si el codigo 91 es mayor que cero por efecto del PPM (codigo 62), \
advierte que el PPM se paga en efectivo aunque exista remanente de IVA.
4. Si hay documentos pendientes de aceptacion con IVA recuperable mayor \
que cero, destacalo como prioridad y recomienda aceptarlos de inmediato.
5. No esperes a que te pregunten; usa un tono ejecutivo.";

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 40;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Client for an OpenAI-compatible chat-completions proxy.
pub struct AdvisorClient {
    api_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl AdvisorClient {
    /// Create a client against the given endpoint.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_model(api_url, api_key, "multi-ia-proxy")
    }

    /// Create a client with a specific model identifier.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_model(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Analyze one extraction run and return free-text advice.
    ///
    /// # Errors
    /// Returns error on network failure, non-success status, or an empty
    /// completion.
    pub async fn analyze(&self, context: &AdvisoryContext) -> Result<String> {
        let user_content = format!(
            "Datos recolectados para el periodo {}:\n\n{}",
            context.period,
            serde_json::to_string_pretty(context)?
        );

        let messages = vec![
            Message::system(AUDITOR_SYSTEM_PROMPT),
            Message::user(user_content),
        ];

        self.complete(&messages).await
    }

    /// Continue a conversation with the full history.
    ///
    /// # Errors
    /// Returns error on network failure, non-success status, or an empty
    /// completion.
    pub async fn chat_turn(&self, history: &[Message]) -> Result<String> {
        self.complete(history).await
    }

    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdvisorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(AdvisorError::MissingContent)
    }
}

// Chat-completions wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AdvisorClient::new("https://proxy.example/v1/chat/completions", "key")
            .expect("create client");
        assert_eq!(client.model, "multi-ia-proxy");

        let client = AdvisorClient::with_model("https://proxy.example", "key", "gpt-4o")
            .expect("create client");
        assert_eq!(client.model, "gpt-4o");
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("a").role, Role::System);
        assert_eq!(Message::user("b").role, Role::User);
        assert_eq!(Message::assistant("c").role, Role::Assistant);
    }

    #[test]
    fn test_message_role_serialization() {
        let json = serde_json::to_string(&Message::user("hola")).expect("serialize");
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "model": "multi-ia-proxy",
            "choices": [
                { "message": { "role": "assistant", "content": "Resumen Contable" } }
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(response.choices[0].message.content, "Resumen Contable");
    }

    #[test]
    fn test_system_prompt_names_the_code_vocabulary() {
        for code in ["538", "511", "504", "537", "91", "62"] {
            assert!(
                AUDITOR_SYSTEM_PROMPT.contains(code),
                "prompt should mention code {code}"
            );
        }
    }
}
