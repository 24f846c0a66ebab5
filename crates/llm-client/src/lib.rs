//! Structured-output language model clients.

mod extract;
mod openai;

pub use extract::extract_json_from_text;
pub use openai::{OpenAiClient, OpenAiConfig};
