//! # LLM Client Module
//!
//! This module provides the completion client used by the answer generator,
//! with built-in rate limiting to prevent API quota exhaustion.
//!
//! ## Key Components
//!
//! - `Client`: wraps a rate-limited completion model
//! - `RateLimitedCompletionModel`: A wrapper that adds rate limiting to any completion model
//! - `MockCompletionModel` (tests): canned responses and request recording
//!
//! ## Features
//!
//! - OpenAI (or any OpenAI-compatible endpoint) via the `rig` framework
//! - Configurable per-minute quota
//! - Instrumentation with tracing spans for monitoring

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use rig::{completion::CompletionModel, providers::openai};

use crate::config::AppConfig;

#[cfg(test)]
pub mod mock_model;
pub mod ratelimited_completion;

pub use ratelimited_completion::RateLimitedCompletionModel;

/// Default completion quota
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 500;

/// Completion model used in production
pub type OpenAiCompletionModel = RateLimitedCompletionModel<openai::completion::CompletionModel>;

#[derive(Clone)]
pub struct Client<C>
where
    C: CompletionModel,
{
    completion_model: C,
}

pub struct RateLimitResponse<T> {
    #[allow(dead_code)]
    response: T,
}

impl Client<OpenAiCompletionModel> {
    /// Build an OpenAI client from the application configuration
    pub fn new_openai_from_config(config: &AppConfig) -> Self {
        let openai_client = openai::Client::from_url(&config.openai_api_key, &config.api_base_url);
        Self::new_openai(openai_client, &config.model, DEFAULT_REQUESTS_PER_MINUTE)
    }

    pub fn new_openai(openai_client: openai::Client, model: &str, requests_per_minute: u32) -> Self {
        let quota = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let completion_limiter = RateLimiter::direct(Quota::per_minute(quota));
        let completion_model =
            RateLimitedCompletionModel::new(openai_client.completion_model(model), completion_limiter);
        Self { completion_model }
    }
}

impl<C> Client<C>
where
    C: CompletionModel,
{
    /// Wrap an already configured model
    pub fn from_model(completion_model: C) -> Self {
        Self { completion_model }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn into_completion(self) -> C {
        self.completion_model
    }
}
