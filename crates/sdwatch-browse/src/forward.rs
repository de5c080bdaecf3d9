//! Bounded event forwarding between a browse and the coordination task
//!
//! Each second-level browse gets its own forwarder task with a bounded
//! drop-oldest queue between the backend stream and the pipeline channel.
//! A full queue drops the oldest event and reports the overflow; it never
//! blocks the producer and never closes the subscription.

use crate::backend::EventStream;
use crate::service::PipelineMsg;
use async_channel::Sender;
use sdwatch_core::{DiscoveryError, Notification, ServiceEvent};
use std::collections::VecDeque;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns the forwarder for one instance browse. The task ends when the
/// upstream stream closes or the pipeline shuts down; a terminal upstream
/// error is handed to the pipeline as a contained subscription failure.
pub fn spawn_instance_forwarder(
    subscription: String,
    upstream: EventStream,
    pipeline: Sender<PipelineMsg>,
    notify: Sender<Notification>,
    capacity: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut queue: VecDeque<ServiceEvent> = VecDeque::new();
        let mut dropped: u64 = 0;

        'run: loop {
            // Nothing buffered: just wait for the next upstream event.
            // Otherwise race draining the queue front against new arrivals
            // so a stalled pipeline cannot grow the queue unboundedly.
            if let Some(event) = queue.front().cloned() {
                tokio::select! {
                    received = upstream.recv() => match received {
                        Ok(Ok(event)) => {
                            enqueue(&mut queue, event, capacity, &subscription, &mut dropped, &notify);
                        }
                        Ok(Err(error)) => {
                            fail(&pipeline, &subscription, error).await;
                            break 'run;
                        }
                        Err(_) => break 'run,
                    },
                    sent = pipeline.send(PipelineMsg::Instance(event)) => {
                        if sent.is_err() {
                            return;
                        }
                        queue.pop_front();
                    }
                }
            } else {
                match upstream.recv().await {
                    Ok(Ok(event)) => {
                        enqueue(&mut queue, event, capacity, &subscription, &mut dropped, &notify);
                    }
                    Ok(Err(error)) => {
                        fail(&pipeline, &subscription, error).await;
                        break 'run;
                    }
                    Err(_) => break 'run,
                }
            }
        }

        // Upstream is gone; hand over whatever is still buffered
        while let Some(event) = queue.pop_front() {
            if pipeline.send(PipelineMsg::Instance(event)).await.is_err() {
                return;
            }
        }
        debug!(subscription, "instance forwarder stopped");
    })
}

fn enqueue(
    queue: &mut VecDeque<ServiceEvent>,
    event: ServiceEvent,
    capacity: usize,
    subscription: &str,
    dropped: &mut u64,
    notify: &Sender<Notification>,
) {
    if queue.len() >= capacity {
        queue.pop_front();
        *dropped += 1;
        warn!(
            subscription,
            dropped = *dropped,
            "event buffer overflow, dropping oldest event"
        );
        let overflow = DiscoveryError::BufferOverflow {
            subscription: subscription.to_string(),
            dropped: *dropped,
        };
        if notify.try_send(Notification::Error(overflow)).is_err() {
            debug!(subscription, "notification channel saturated, overflow report dropped");
        }
    }
    queue.push_back(event);
}

async fn fail(pipeline: &Sender<PipelineMsg>, subscription: &str, error: DiscoveryError) {
    let _ = pipeline
        .send(PipelineMsg::SubscriptionFailed {
            subscription: subscription.to_string(),
            error,
        })
        .await;
}
