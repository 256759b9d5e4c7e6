//! Response provider boundary.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::conversation::types::Message;
use crate::core::errors::ProviderResult;
use crate::core::model::ChatModel;

/// Boxed future type for provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces an assistant reply for a conversation history.
///
/// Implementations may take arbitrarily long and may fail; the session
/// controller never awaits them on its own task.
pub trait ResponseProvider: Send + Sync {
    /// Generate the assistant's reply text.
    ///
    /// # Errors
    /// Returns a [`crate::core::errors::ProviderError`] when the backend fails.
    fn generate(
        &self,
        history: Vec<Message>,
        model: ChatModel,
    ) -> ProviderFuture<'_, ProviderResult<String>>;
}

/// Canned replies after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    latency: Duration,
}

impl SimulatedProvider {
    /// Provider answering after `latency`.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Provider answering after `ms` milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// The reply this provider gives for `model`.
    #[must_use]
    pub fn reply_for(model: ChatModel) -> String {
        format!(
            "This is a simulated response from {model}. I understand your message and I'm here to help!"
        )
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::from_millis(2_000)
    }
}

impl ResponseProvider for SimulatedProvider {
    fn generate(
        &self,
        history: Vec<Message>,
        model: ChatModel,
    ) -> ProviderFuture<'_, ProviderResult<String>> {
        Box::pin(async move {
            debug!("Simulating {model} reply to {} messages", history.len());
            tokio::time::sleep(self.latency).await;
            Ok(Self::reply_for(model))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_provider_waits_then_answers() {
        let provider = SimulatedProvider::default();
        let started = tokio::time::Instant::now();

        let reply = provider.generate(Vec::new(), ChatModel::Gpt4).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(
            reply,
            "This is a simulated response from GPT-4. I understand your message and I'm here to help!"
        );
    }
}
