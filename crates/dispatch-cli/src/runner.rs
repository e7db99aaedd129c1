//! Batch runner. Fans samples out over blocking tasks and reports results
//! in input order.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tier_dispatch::{DispatchError, DispatchResult, Dispatcher};
use tracing::debug;

/// Run every sample, `concurrency` at a time, preserving input order.
pub async fn run_samples(
    dispatcher: Arc<Dispatcher>,
    samples: Vec<Value>,
    forced_tier: Option<String>,
    concurrency: usize,
) -> Result<Vec<Result<DispatchResult, DispatchError>>> {
    let workers = concurrency.max(1).min(samples.len().max(1));
    let forced_tier = forced_tier.map(Arc::<str>::from);

    let mut lanes: Vec<Vec<(usize, Value)>> = vec![Vec::new(); workers];
    for (idx, sample) in samples.into_iter().enumerate() {
        lanes[idx % workers].push((idx, sample));
    }
    debug!(workers, "Dispatching samples");

    let mut handles = Vec::with_capacity(workers);
    for lane in lanes {
        let dispatcher = Arc::clone(&dispatcher);
        let forced_tier = forced_tier.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            lane.into_iter()
                .map(|(idx, sample)| (idx, dispatcher.infer(&sample, forced_tier.as_deref())))
                .collect::<Vec<_>>()
        }));
    }

    let mut indexed = Vec::new();
    for handle in handles {
        indexed.extend(handle.await.context("Dispatch worker panicked")?);
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    Ok(indexed.into_iter().map(|(_, result)| result).collect())
}

/// One output line per sample: the result itself, or an error object.
pub fn render(result: &Result<DispatchResult, DispatchError>) -> Value {
    match result {
        Ok(result) => serde_json::to_value(result).unwrap_or_else(|e| {
            json!({ "success": false, "error": "SERIALIZATION", "message": e.to_string() })
        }),
        Err(e) => json!({
            "success": false,
            "error": e.code(),
            "message": e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tier_dispatch::{BuiltinStrategy, Tier};

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(
            Dispatcher::builder()
                .tier(Tier::new("primary", BuiltinStrategy::sum()).with_min_length(3))
                .tier(Tier::new("terminal", BuiltinStrategy::Count))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let samples: Vec<Value> = (1..=9).map(|n| json!((0..n).collect::<Vec<i64>>())).collect();
        let results = run_samples(dispatcher(), samples, None, 4).await.unwrap();

        let tiers: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().tier_used.clone().unwrap())
            .collect();
        assert_eq!(&tiers[..2], &["terminal", "terminal"]);
        assert!(tiers[2..].iter().all(|t| t == "primary"));
        assert_eq!(results[8].as_ref().unwrap().value, Some(json!(36)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = run_samples(dispatcher(), Vec::new(), None, 8).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_forced_tier_errors_rendered() {
        let results = run_samples(dispatcher(), vec![json!([1])], Some("nope".into()), 1)
            .await
            .unwrap();
        let line = render(&results[0]);
        assert_eq!(line["error"], "UNKNOWN_TIER");
        assert_eq!(line["success"], false);
    }
}
