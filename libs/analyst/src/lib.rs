mod client;
mod provider;

pub mod prompt;
pub mod report;
pub mod research;

pub use client::{Analyst, LlmClient, LlmConfig};
pub use provider::Provider;
pub use report::{Answer, DeepDive, NewsAnalysis, Text};
