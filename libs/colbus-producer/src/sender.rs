use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;

use colbus_api::{BackendError, BrokerTransport, ErrorKind, ProduceRequest, ProduceResponse};

use crate::accumulator::{Accumulator, Batch, PendingRecord};
use crate::config::ProducerConfig;
use crate::metadata::MetadataCache;

/// What a dispatch task needs besides its batch.
#[derive(Clone)]
struct Link {
    transport: Arc<dyn BrokerTransport>,
    config: Arc<ProducerConfig>,
    metadata: Arc<MetadataCache>,
}

pub(crate) enum Command {
    Append(PendingRecord),
    /// Send everything pending and answer once nothing is in flight.
    Flush(oneshot::Sender<()>),
}

// ═══════════════════════════════════════════════════════════════
//  Sender loop
// ═══════════════════════════════════════════════════════════════

/// Background task owning the accumulator.
///
/// Each ready batch gets its own dispatch task, so completions of
/// different batches arrive independently and in no particular order.
/// Returns once the command channel is closed and every batch has completed.
pub(crate) async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    transport: Arc<dyn BrokerTransport>,
    config: Arc<ProducerConfig>,
    metadata: Arc<MetadataCache>,
) {
    let link = Link { transport, config, metadata };
    let mut accumulator = Accumulator::new(link.config.batch_size, link.config.linger);
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        let command = match accumulator.next_deadline() {
            None => rx.recv().await,
            Some(deadline) => {
                tokio::select! {
                    biased;
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(deadline) => {
                        for batch in accumulator.drain_expired(Instant::now()) {
                            dispatch(&mut in_flight, &link, batch);
                        }
                        continue;
                    }
                }
            }
        };

        match command {
            Some(Command::Append(pending)) => {
                for batch in accumulator.append(pending) {
                    dispatch(&mut in_flight, &link, batch);
                }
                for batch in accumulator.drain_expired(Instant::now()) {
                    dispatch(&mut in_flight, &link, batch);
                }
            }
            Some(Command::Flush(done)) => {
                for batch in accumulator.drain_all() {
                    dispatch(&mut in_flight, &link, batch);
                }
                drain(&mut in_flight).await;
                let _ = done.send(());
            }
            None => break,
        }

        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }
    }

    for batch in accumulator.drain_all() {
        dispatch(&mut in_flight, &link, batch);
    }
    drain(&mut in_flight).await;
    tracing::debug!("producer sender stopped");
}

/// Callbacks of the batch run on the spawned task, so draining
/// `in_flight` also waits for them.
fn dispatch(in_flight: &mut JoinSet<()>, link: &Link, batch: Batch) {
    let link = link.clone();
    in_flight.spawn(async move {
        let request = ProduceRequest {
            topic: batch.topic.clone(),
            partition: batch.partition,
            acks: link.config.acks,
            records: batch.wire_records(),
        };
        let result = produce_with_retries(link.transport.as_ref(), &link.config, request).await;
        if let Err(e) = &result {
            tracing::warn!(
                topic = %batch.topic,
                partition = batch.partition,
                records = batch.len(),
                error = %e,
                "batch failed"
            );
            // Leader moved or topic changed; next send refetches the layout.
            if matches!(e.kind(), ErrorKind::Unavailable | ErrorKind::NotFound) {
                link.metadata.invalidate(&batch.topic).await;
            }
        }
        batch.complete(result);
    });
}

async fn produce_with_retries(
    transport: &dyn BrokerTransport,
    config: &ProducerConfig,
    request: ProduceRequest,
) -> Result<ProduceResponse, BackendError> {
    let mut attempt: u32 = 0;
    loop {
        match transport.produce(request.clone()).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_retriable() && attempt < config.retries => {
                attempt += 1;
                tracing::debug!(
                    topic = %request.topic,
                    partition = request.partition,
                    attempt,
                    error = %e,
                    "retrying produce"
                );
                tokio::time::sleep(config.retry_backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "dispatch task failed");
    }
}
