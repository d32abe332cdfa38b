// Retrying request executor with one connection context per worker
//
// A fixed pool of workers consumes submitted requests from a shared
// queue. Each worker lazily builds its own reqwest::Client from the
// shared session options and keeps it for the lifetime of the pool, so
// connections are reused within a worker and never shared across
// workers. Transport failures (connect errors, timeouts) are retried
// with backoff up to the strategy's bound; any received HTTP response,
// error status included, resolves the request exactly once.

use crate::errors::RhsmError;
use crate::retry::RetryStrategy;
use reqwest::{Client, Identity, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use super::future::RequestFuture;
use super::request::RequestDescriptor;

/// Transport configuration applied once to each worker's client
#[derive(Clone)]
pub struct SessionOptions {
    /// Client certificate + key, PEM
    pub identity: Option<Identity>,
    /// Verify the server TLS certificate
    pub verify_tls: bool,
    /// Connect/read timeout for every request
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            identity: None,
            verify_tls: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SessionOptions {
    /// Build a client for one worker. No network I/O happens here;
    /// connections are opened on first use.
    fn build_client(&self) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder().use_rustls_tls().timeout(self.timeout);
        if let Some(identity) = &self.identity {
            builder = builder.identity(identity.clone());
        }
        if !self.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder.build()
    }
}

struct Job {
    descriptor: RequestDescriptor,
    reply: oneshot::Sender<Result<Response, RhsmError>>,
}

/// Bounded pool of request workers fed by a shared queue
#[derive(Debug)]
pub struct RequestExecutor {
    queue: mpsc::UnboundedSender<Job>,
}

impl RequestExecutor {
    /// Spawn `workers` request workers. Must be called within a Tokio
    /// runtime. The pool size and retry strategy are immutable once the
    /// executor exists.
    pub fn new(workers: usize, session: SessionOptions, retry: Arc<dyn RetryStrategy>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let session = session.clone();
            let retry = Arc::clone(&retry);
            tokio::spawn(worker_loop(worker, rx, session, retry));
        }

        Self { queue: tx }
    }

    /// Enqueue a request without blocking the submitting task.
    ///
    /// The returned future resolves exactly once, to the received
    /// response or to the terminal error after retries are exhausted.
    pub fn submit(&self, descriptor: RequestDescriptor) -> RequestFuture {
        let (reply, receiver) = oneshot::channel();
        let job = Job { descriptor, reply };

        if let Err(rejected) = self.queue.send(job) {
            // All workers are gone; resolve immediately.
            let _ = rejected.0.reply.send(Err(RhsmError::ExecutorShutdown));
        }

        RequestFuture::new(receiver)
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    session: SessionOptions,
    retry: Arc<dyn RetryStrategy>,
) {
    // This worker's connection context. Built on first use, reused for
    // every request the worker executes, never observed by another
    // worker.
    let mut client: Option<Client> = None;

    loop {
        let job = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        let outcome = execute(worker, &mut client, &session, retry.as_ref(), &job.descriptor).await;
        // The caller may have dropped the future; nothing to do then.
        let _ = job.reply.send(outcome);
    }

    debug!(worker, "request worker stopped");
}

async fn execute(
    worker: usize,
    slot: &mut Option<Client>,
    session: &SessionOptions,
    retry: &dyn RetryStrategy,
    descriptor: &RequestDescriptor,
) -> Result<Response, RhsmError> {
    // On a failed client build the slot stays unbuilt and the next
    // request tries again.
    let client = match slot.take() {
        Some(client) => client,
        None => {
            let built = session.build_client().map_err(RhsmError::Transport)?;
            debug!(worker, "created request session");
            built
        }
    };

    let mut attempt = 0u32;
    let outcome = loop {
        match send_once(&client, descriptor).await {
            Ok(response) => break Ok(response),
            Err(err) if is_transient(&err) => match retry.next_delay(attempt) {
                Some(delay) => {
                    warn!(
                        worker,
                        attempt,
                        url = %descriptor.url,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => break Err(RhsmError::Transport(err)),
            },
            Err(err) => break Err(RhsmError::Transport(err)),
        }
    };

    *slot = Some(client);
    outcome
}

async fn send_once(client: &Client, descriptor: &RequestDescriptor) -> Result<Response, reqwest::Error> {
    let mut request = client.request(descriptor.method.clone(), &descriptor.url);
    if let Some(body) = &descriptor.body {
        request = request.json(body);
    }
    request.send().await
}

/// Failures of the network exchange itself. Received error statuses are
/// not errors at this layer and are never retried.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
