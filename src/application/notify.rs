//! Fire-and-forget delivery of evaluation callbacks.
//!
//! Requests hand finished payloads to a detached worker over a channel and return
//! immediately. The worker runs each delivery as its own task, so a slow callback URL
//! never holds up later ones. Delivery failures are logged and counted; they never reach
//! the request that produced the payload and are not retried.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};
use url::Url;

use crate::application::repos::EvaluationSink;
use crate::domain::publish::EvaluationPayload;

#[derive(Debug)]
struct Delivery {
    url: Url,
    payload: EvaluationPayload,
}

/// Sending half handed to request handlers. Cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Owning half of the delivery worker.
pub struct NotificationWorker {
    handle: JoinHandle<()>,
}

impl NotificationDispatcher {
    /// Start the delivery worker on the current runtime.
    pub fn spawn(sink: Arc<dyn EvaluationSink>) -> (Self, NotificationWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(sink, rx));
        (Self { tx }, NotificationWorker { handle })
    }

    /// Queue a callback. Never fails; a stopped worker is logged.
    pub fn dispatch(&self, url: Url, payload: EvaluationPayload) {
        if let Err(err) = self.tx.send(Delivery { url, payload }) {
            let delivery = err.0;
            counter!("pagesmith_notification_total", "outcome" => "dropped").increment(1);
            warn!(
                target = "pagesmith::notify",
                task = delivery.payload.task_id(),
                url = %delivery.url,
                "notification worker stopped; callback dropped"
            );
        }
    }
}

impl NotificationWorker {
    /// Wait for queued deliveries to finish once every dispatcher has been dropped.
    ///
    /// Gives up after `timeout`, aborting whatever is still in flight.
    pub async fn drain(self, timeout: Duration) {
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                target = "pagesmith::notify",
                error = %err,
                "notification worker terminated abnormally"
            ),
            Err(_) => {
                warn!(
                    target = "pagesmith::notify",
                    timeout_ms = timeout.as_millis() as u64,
                    "notification drain timed out; aborting pending callbacks"
                );
                handle.abort();
            }
        }
    }
}

async fn run_worker(sink: Arc<dyn EvaluationSink>, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    let mut in_flight = JoinSet::new();
    while let Some(delivery) = rx.recv().await {
        while let Some(finished) = in_flight.try_join_next() {
            log_join_failure(finished);
        }
        in_flight.spawn(deliver(sink.clone(), delivery));
    }
    while let Some(finished) = in_flight.join_next().await {
        log_join_failure(finished);
    }
}

async fn deliver(sink: Arc<dyn EvaluationSink>, Delivery { url, payload }: Delivery) {
    match sink.deliver(&url, &payload).await {
        Ok(()) => {
            counter!("pagesmith_notification_total", "outcome" => "delivered").increment(1);
            info!(
                target = "pagesmith::notify",
                task = payload.task_id(),
                round = %payload.round(),
                commit = %payload.commit_sha(),
                "evaluation callback delivered"
            );
        }
        Err(err) => {
            counter!("pagesmith_notification_total", "outcome" => "failed").increment(1);
            warn!(
                target = "pagesmith::notify",
                task = payload.task_id(),
                url = %url,
                error = %err,
                "evaluation callback failed"
            );
        }
    }
}

fn log_join_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        counter!("pagesmith_notification_total", "outcome" => "failed").increment(1);
        warn!(
            target = "pagesmith::notify",
            error = %err,
            "evaluation callback task terminated abnormally"
        );
    }
}
