//! Generator abstraction and the session that serializes access to it.

pub mod client;

pub use client::HttpGenerator;

use crate::config::MediatorConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Sampling limits for one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GenerationParams {
    pub fn from_config(config: &MediatorConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.1,
        }
    }
}

/// Prompt-in / text-out model. May be slow or unavailable.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        params: GenerationParams,
    ) -> Result<String>;
}

/// Owned handle to the single generator instance.
///
/// Single-writer discipline: at most one generation is in flight at a time,
/// whichever request issued it. Everything else a turn does runs unlocked.
#[derive(Clone)]
pub struct GeneratorSession {
    generator: Arc<dyn Generator>,
    params: GenerationParams,
    in_flight: Arc<Mutex<()>>,
}

impl GeneratorSession {
    pub fn new(generator: Arc<dyn Generator>, params: GenerationParams) -> Self {
        Self {
            generator,
            params,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Run one generation, waiting for any other in-flight generation first.
    ///
    /// If the caller's future is dropped (e.g. on a request deadline) the
    /// slot is released, but a generator doing blocking work elsewhere is
    /// not forcibly stopped.
    pub async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let _slot = self.in_flight.lock().await;
        debug!("Generating ({} user chars)", user_message.len());
        self.generator
            .generate(system_prompt, user_message, self.params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks how many generations overlap.
    #[derive(Default)]
    struct OverlapTracker {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Generator for OverlapTracker {
        async fn generate(&self, _: &str, user: &str, _: GenerationParams) -> Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(user.to_uppercase())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generations_never_overlap() {
        let tracker = Arc::new(OverlapTracker::default());
        let session = GeneratorSession::new(tracker.clone(), GenerationParams::default());

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let s = session.clone();
                tokio::spawn(async move { s.generate("sys", &format!("m{i}")).await })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap().unwrap().starts_with('M'));
        }
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
    }
}
