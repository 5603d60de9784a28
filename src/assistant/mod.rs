//! Answering questions about the school from the crawled corpus
//!
//! - [`prompt`]: persona system prompt over the stored pages
//! - [`generator`]: the [`AnswerGenerator`] seam and its prompt-based implementation
//! - [`service`]: the [`Assistant`] that ties crawling, reconciliation and answering together

pub mod generator;
pub mod prompt;
pub mod service;
#[cfg(test)]
pub(crate) mod test_support;

pub use generator::{AnswerGenerator, GenerationError, PromptAnswerGenerator};
pub use prompt::{build_system_prompt, Persona, APOLOGY_MESSAGE};
pub use service::{Assistant, HealthStatus};
