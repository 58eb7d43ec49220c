//! HTTP implementation of [`LineGenerator`].
//!
//! Request: `POST {endpoint}` with a JSON body `{model, kind, prompt, context}`
//! and a bearer credential. Response: `{"text": "..."}`.
//! Failures are classified by status code only.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::generator::{GenerationContext, LineGenerator};
use super::TriggerKind;
use crate::error::{ConfigError, CoreError, GenerationFailure};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    kind: TriggerKind,
    prompt: String,
    context: &'a GenerationContext,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
}

pub struct HttpLineGenerator {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl HttpLineGenerator {
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP
    /// client cannot be built.
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::InvalidValue {
            key: "companion.endpoint".into(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Map a non-success status to a failure kind.
pub fn classify_status(status: u16) -> GenerationFailure {
    match status {
        401 | 403 => GenerationFailure::AuthExpired,
        429 | 503 | 529 => GenerationFailure::RateLimited,
        other => GenerationFailure::Unknown(format!("HTTP {other}")),
    }
}

pub fn build_prompt(kind: TriggerKind, context: &GenerationContext) -> String {
    let mut prompt = format!(
        "You are {name}, a focus companion for {user}. Personality: {traits}. \
         Relationship level {level} of 10. Reply with one short line.",
        name = context.character_name,
        user = if context.honorific.is_empty() {
            &context.user_name
        } else {
            &context.honorific
        },
        traits = if context.personality.is_empty() {
            "neutral".to_string()
        } else {
            context.personality.join(", ")
        },
        level = context.level,
    );
    let situation = match kind {
        TriggerKind::Start => "The user just started a focus session.",
        TriggerKind::Pause => "The user paused the focus session.",
        TriggerKind::Click => "The user poked you during focus.",
        TriggerKind::Scolding => "The user wandered off during focus and just came back.",
    };
    prompt.push(' ');
    prompt.push_str(situation);
    let style = context.style_for(kind);
    if !style.is_empty() {
        prompt.push_str(" Speak in this style: ");
        prompt.push_str(style);
        prompt.push('.');
    }
    if let Some(task) = context.today_task.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str(" Today's task: ");
        prompt.push_str(task);
        prompt.push('.');
    }
    prompt
}

#[async_trait]
impl LineGenerator for HttpLineGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_line(
        &self,
        kind: TriggerKind,
        context: &GenerationContext,
    ) -> Result<String, GenerationFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationFailure::AuthExpired);
        };

        let body = GenerateRequest {
            model: &self.model,
            kind,
            prompt: build_prompt(kind, context),
            context,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationFailure::Unknown("request timed out".into())
                } else {
                    GenerationFailure::Unknown(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16()));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationFailure::Unknown(format!("bad response body: {e}")))?;
        parsed
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GenerationFailure::Unknown("empty line".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> GenerationContext {
        GenerationContext {
            character_name: "Miso".into(),
            user_name: "Dana".into(),
            personality: vec!["tsundere".into()],
            level: 3,
            ..GenerationContext::default()
        }
    }

    fn generator(url: &str, key: Option<&str>) -> HttpLineGenerator {
        HttpLineGenerator::new(
            &format!("{url}/generate"),
            "test-model",
            key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(401), GenerationFailure::AuthExpired);
        assert_eq!(classify_status(403), GenerationFailure::AuthExpired);
        assert_eq!(classify_status(429), GenerationFailure::RateLimited);
        assert_eq!(classify_status(503), GenerationFailure::RateLimited);
        assert_eq!(
            classify_status(500),
            GenerationFailure::Unknown("HTTP 500".into())
        );
    }

    #[test]
    fn prompt_mentions_situation_and_traits() {
        let prompt = build_prompt(TriggerKind::Scolding, &context());
        assert!(prompt.contains("Miso"));
        assert!(prompt.contains("tsundere"));
        assert!(prompt.contains("wandered off"));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result = HttpLineGenerator::new("not a url", "m", None, Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn success_returns_trimmed_line() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"  Back to work.  "}"#)
            .create_async()
            .await;

        let line = generator(&server.url(), Some("secret"))
            .generate_line(TriggerKind::Click, &context())
            .await;
        assert_eq!(line.as_deref(), Ok("Back to work."));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_and_auth_statuses_map_to_failures() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("POST", "/generate")
            .with_status(429)
            .create_async()
            .await;
        let result = generator(&server.url(), Some("k"))
            .generate_line(TriggerKind::Start, &context())
            .await;
        assert_eq!(result, Err(GenerationFailure::RateLimited));

        server.reset_async().await;
        let _expired = server
            .mock("POST", "/generate")
            .with_status(401)
            .create_async()
            .await;
        let result = generator(&server.url(), Some("k"))
            .generate_line(TriggerKind::Start, &context())
            .await;
        assert_eq!(result, Err(GenerationFailure::AuthExpired));
    }

    #[tokio::test]
    async fn empty_text_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"text":"   "}"#)
            .create_async()
            .await;
        let result = generator(&server.url(), Some("k"))
            .generate_line(TriggerKind::Pause, &context())
            .await;
        assert!(matches!(result, Err(GenerationFailure::Unknown(_))));
    }

    #[tokio::test]
    async fn missing_credential_skips_the_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .expect(0)
            .create_async()
            .await;
        let result = generator(&server.url(), None)
            .generate_line(TriggerKind::Click, &context())
            .await;
        assert_eq!(result, Err(GenerationFailure::AuthExpired));
        mock.assert_async().await;
    }
}
