use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One completion request: a fixed system instruction plus the rendered batch prompt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(
        model: impl Into<String>,
        system_prompt: Option<&str>,
        user_prompt: impl Into<String>,
        temperature: Option<f32>,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(s) = system_prompt {
            if !s.trim().is_empty() {
                messages.push(ChatMessage::system(s));
            }
        }
        messages.push(ChatMessage::user(user_prompt));
        Self {
            model: model.into(),
            messages,
            temperature,
        }
    }

    #[must_use]
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// A text-generation service. Exactly one blocking call per request; no retries.
pub trait ChatBackend {
    fn name(&self) -> &str;

    fn complete(&mut self, request: &ChatRequest) -> anyhow::Result<String>;
}

impl<B: ChatBackend + ?Sized> ChatBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn complete(&mut self, request: &ChatRequest) -> anyhow::Result<String> {
        (**self).complete(request)
    }
}
