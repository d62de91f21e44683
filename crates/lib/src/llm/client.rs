//! Inference client: one call, and on failure one retry against the fallback model.

use crate::llm::{LlmBackend, ModelInvocation};
use std::sync::Arc;

/// Wraps a backend with the two-attempt policy (requested model, then fallback model).
/// Every failure ends as `None`; callers substitute user-facing text.
#[derive(Clone)]
pub struct InferenceClient {
    backend: Arc<dyn LlmBackend>,
    fallback_model: String,
}

impl InferenceClient {
    pub fn new(backend: Arc<dyn LlmBackend>, fallback_model: impl Into<String>) -> Self {
        Self {
            backend,
            fallback_model: fallback_model.into(),
        }
    }

    /// Run the invocation. If it fails and the model was not already the fallback model,
    /// retry once with the fallback model and identical messages and sampling.
    pub async fn invoke(&self, invocation: &ModelInvocation) -> Option<String> {
        let err = match self.backend.complete(invocation).await {
            Ok(content) => return Some(content),
            Err(e) => e,
        };
        log::warn!("inference: model {} failed: {}", invocation.model, err);
        if invocation.model == self.fallback_model {
            return None;
        }

        let retry = invocation.with_model(&self.fallback_model);
        match self.backend.complete(&retry).await {
            Ok(content) => {
                log::info!("inference: fallback model {} answered", self.fallback_model);
                Some(content)
            }
            Err(e) => {
                log::warn!(
                    "inference: fallback model {} failed: {}",
                    self.fallback_model,
                    e
                );
                None
            }
        }
    }
}
