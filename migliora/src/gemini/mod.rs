//! Gemini `generateContent` API client.

mod client;
#[cfg(test)]
pub mod testing;
mod types;

pub use client::{ChatSession, ClientConfig, GeminiClient, DEFAULT_MODEL};
