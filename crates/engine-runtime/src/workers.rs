use crate::{error::PipelineError, orchestrator::PipelineOrchestrator};
use model::{batch::BatchOutcome, key::TableKey};
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs one batch per pair with bounded parallelism. Pairs are independent
/// by construction (the lease registry serializes same-pair runs), so a
/// failed pair never blocks the others; its error lands in the result map.
pub async fn run_all(
    orchestrator: Arc<PipelineOrchestrator>,
    keys: Vec<TableKey>,
    parallelism: usize,
    cancel: CancellationToken,
) -> Result<HashMap<String, Result<BatchOutcome, PipelineError>>, PipelineError> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut tasks = JoinSet::new();

    for key in keys {
        let orchestrator = Arc::clone(&orchestrator);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            // Closed semaphores are not used here; acquire cannot fail.
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            let outcome = orchestrator.run_batch(&key, cancel).await;
            (key, outcome)
        });
    }

    let mut results = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (key, outcome) = joined?;
        match &outcome {
            Ok(batch) => info!(
                key = %key,
                batch_id = %batch.batch_id,
                status = %batch.status,
                "pair run finished"
            ),
            Err(err) => error!(key = %key, error = %err, "pair run failed"),
        }
        results.insert(key.to_string(), outcome);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn parallelism_is_bounded_by_the_semaphore() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(Semaphore::new(2));
        let mut tasks = JoinSet::new();

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        while tasks.join_next().await.is_some() {}
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
