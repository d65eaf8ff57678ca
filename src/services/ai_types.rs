use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
}

impl<'a> ChatRequest<'a> {
    pub fn user(model: &'a str, prompt: &str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object some backends return with a 200 status.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<Value>,

    #[serde(default)]
    pub message: Option<String>,
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        let code = match &self.code {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        if matches!(code, Some(401) | Some(403)) {
            return true;
        }

        let msg = self.message.as_deref().unwrap_or("").to_lowercase();
        msg.contains("invalid") && msg.contains("key")
    }

    pub fn describe(&self) -> String {
        match (&self.message, &self.code) {
            (Some(m), _) => m.clone(),
            (None, Some(c)) => format!("code {c}"),
            (None, None) => "unknown error".into(),
        }
    }
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(ChatRequest::user("m", "hi")).unwrap();
        assert_eq!(
            body,
            json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn reads_first_choice_content() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"a\":\"b\"}"}}]
        }))
        .unwrap();
        assert_eq!(resp.first_content(), Some("{\"a\":\"b\"}"));
    }

    #[test]
    fn classifies_backend_reported_auth_errors() {
        let by_code: ApiError = serde_json::from_value(json!({"code": 401, "message": "No auth"})).unwrap();
        let by_msg: ApiError = serde_json::from_value(json!({"message": "Invalid API key provided"})).unwrap();
        let other: ApiError = serde_json::from_value(json!({"code": 502, "message": "Upstream down"})).unwrap();

        assert!(by_code.is_auth());
        assert!(by_msg.is_auth());
        assert!(!other.is_auth());
    }
}
