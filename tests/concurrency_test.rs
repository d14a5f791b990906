//! Per-user serialization: reflections for one user apply one at a time,
//! different users never wait on each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use mirrorback::error::ProviderError;
use mirrorback::llms::{GenerationBackend, ProviderChain};
use mirrorback::utilities::prompts::MIRROR_SYSTEM;
use mirrorback::{MirrorConfig, Orchestrator};

/// Drafts after a fixed delay and tracks how many drafts overlap.
#[derive(Debug, Default)]
struct Paced {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for Paced {
    fn name(&self) -> &str {
        "paced"
    }
    async fn generate(&self, _: &str, system: &str) -> Result<String, ProviderError> {
        if system != MIRROR_SYSTEM {
            return Err(ProviderError::Unavailable("drafts only".into()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("Something in this keeps asking for your attention. What do you notice?".into())
    }
}

fn orchestrator(backend: Arc<Paced>) -> Arc<Orchestrator> {
    let chain = ProviderChain::default().with_backend(backend, Duration::from_secs(5));
    Arc::new(Orchestrator::new(MirrorConfig::default()).unwrap().with_chain(chain))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_user_reflections_are_serialized() {
    let backend = Arc::new(Paced {
        delay: Duration::from_millis(40),
        ..Paced::default()
    });
    let o = orchestrator(backend.clone());

    let texts = [
        "I believe I have to earn rest.",
        "I think my sister is right about me.",
        "I value honesty, yet I hide things.",
        "I am tired of starting over.",
    ];
    let results = join_all(texts.iter().map(|text| {
        let o = Arc::clone(&o);
        async move { o.submit_reflection("same-user", text).await }
    }))
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
    let metrics = o.get_growth_metrics("same-user").await.unwrap();
    assert_eq!(metrics.reflection_count, texts.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_users_run_in_parallel() {
    let backend = Arc::new(Paced {
        delay: Duration::from_millis(200),
        ..Paced::default()
    });
    let o = orchestrator(backend.clone());

    let started = Instant::now();
    let users = ["ana", "ben", "cy", "dee"];
    let results = join_all(users.iter().copied().map(|user| {
        let o = Arc::clone(&o);
        tokio::spawn(async move { o.submit_reflection(user, "I believe rest is earned.").await })
    }))
    .await;
    let elapsed = started.elapsed();

    for result in results {
        assert!(result.unwrap().is_ok());
    }
    assert!(backend.peak.load(Ordering::SeqCst) > 1);
    assert!(elapsed < Duration::from_millis(200 * users.len() as u64));
    for user in users {
        let snapshot = o.get_identity_snapshot(user).await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
    }
}

#[tokio::test]
async fn test_snapshot_waits_for_in_flight_reflection() {
    let backend = Arc::new(Paced {
        delay: Duration::from_millis(100),
        ..Paced::default()
    });
    let o = orchestrator(backend);

    let writer = {
        let o = Arc::clone(&o);
        tokio::spawn(async move {
            o.submit_reflection("u1", "I believe rest is earned.").await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Either before the writer locked (empty) or after it committed (full);
    // never a half-applied graph.
    let snapshot = o.get_identity_snapshot("u1").await.unwrap();
    assert!(snapshot.nodes.len() <= 1);
    writer.await.unwrap().unwrap();
    let snapshot = o.get_identity_snapshot("u1").await.unwrap();
    assert_eq!(snapshot.nodes.len(), 1);
}
