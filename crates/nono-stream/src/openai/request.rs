use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::errors::ClientError;
use crate::query::Query;

use super::config::ClientConfig;
use super::wire::{ChatCompletionBody, ChatMessage, Role};

const TEMPERATURE: f32 = 0.0;
const MAX_TOKENS: u32 = 1000;
const TOP_P: f32 = 1.0;
const FREQUENCY_PENALTY: f32 = 1.0;
const PRESENCE_PENALTY: f32 = 1.0;

/// Fully built HTTP request for one query.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub endpoint: String,
    pub headers: HeaderMap,
    pub body: ChatCompletionBody,
}

/// Builds request specs with fixed sampling parameters.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    endpoint: String,
    model: String,
    auth: HeaderValue,
}

impl RequestBuilder {
    /// Creates a builder from client configuration.
    ///
    /// Fails when the API key cannot be used as a header value.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|_| ClientError::Config("api_key contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        Ok(Self {
            endpoint: config.completions_url(),
            model: config.model.clone(),
            auth,
        })
    }

    /// Builds the request for `query`.
    pub fn build(&self, query: &Query) -> RequestSpec {
        debug_assert!(
            !query.user_prompt().trim().is_empty(),
            "Query guarantees a non-empty user prompt"
        );

        let mut messages = Vec::with_capacity(3);
        messages.push(ChatMessage::new(Role::System, query.system_prompt()));
        if let Some(assistant) = query.assistant_prompt() {
            messages.push(ChatMessage::new(Role::Assistant, assistant));
        }
        messages.push(ChatMessage::new(Role::User, query.user_prompt()));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.auth.clone());

        RequestSpec {
            endpoint: self.endpoint.clone(),
            headers,
            body: ChatCompletionBody {
                model: self.model.clone(),
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
                top_p: TOP_P,
                frequency_penalty: FREQUENCY_PENALTY,
                presence_penalty: PRESENCE_PENALTY,
                stream: true,
                messages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TaskKind;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(&ClientConfig::new("sk-test").model("gpt-test")).expect("builder")
    }

    #[test]
    fn body_has_fixed_sampling_parameters() {
        let query = Query::new(TaskKind::Translate, "sys", "hello").expect("query");
        let spec = builder().build(&query);
        let body = serde_json::to_value(&spec.body).expect("serialize");

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["temperature"].as_f64(), Some(0.0));
        assert_eq!(body["top_p"].as_f64(), Some(1.0));
        assert_eq!(body["frequency_penalty"].as_f64(), Some(1.0));
        assert_eq!(body["presence_penalty"].as_f64(), Some(1.0));
        assert_eq!(body["max_tokens"].as_u64(), Some(1000));
        assert_eq!(body["stream"].as_bool(), Some(true));
        assert_eq!(spec.endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn messages_are_ordered_system_assistant_user() {
        let query = Query::new(TaskKind::Define, "sys", "word")
            .expect("query")
            .with_assistant_prompt("assist");
        let body = serde_json::to_value(builder().build(&query).body).expect("serialize");
        let roles: Vec<_> = body["messages"]
            .as_array()
            .expect("messages")
            .iter()
            .map(|m| m["role"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(roles, ["system", "assistant", "user"]);
        assert_eq!(body["messages"][2]["content"], "word");
    }

    #[test]
    fn assistant_message_is_omitted_when_absent() {
        let query = Query::new(TaskKind::Summarize, "sys", "text").expect("query");
        let spec = builder().build(&query);
        assert_eq!(spec.body.messages.len(), 2);
        assert_eq!(spec.body.messages[0].role, Role::System);
        assert_eq!(spec.body.messages[1].role, Role::User);
    }

    #[test]
    fn headers_carry_bearer_auth_and_json_content_type() {
        let query = Query::new(TaskKind::Translate, "sys", "hello").expect("query");
        let spec = builder().build(&query);
        assert_eq!(
            spec.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer sk-test")
        );
        assert_eq!(
            spec.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn invalid_key_is_a_config_error() {
        let err = RequestBuilder::new(&ClientConfig::new("bad\nkey")).expect_err("invalid key");
        assert!(matches!(err, ClientError::Config(_)));
    }
}
