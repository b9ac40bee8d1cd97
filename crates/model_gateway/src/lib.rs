#![deny(unused)]
//! Model gateway: the reasoning and embedding capability behind an
//! OpenAI-compatible HTTP API.

pub mod openai;

pub use openai::OpenAiCompatClient;
