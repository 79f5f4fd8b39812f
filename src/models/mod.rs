pub mod chat;
pub mod openai;

pub use chat::{ChatBackend, ChatMessage, ChatRequest};
pub use openai::{OpenAiCompatClient, OpenAiCompatConfig};
