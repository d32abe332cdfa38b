// Result/error composition over pending requests
//
// Mirrors the executor's resolution model: a success handler validates
// the received response (raising on error statuses), a failure handler
// logs executor-level failures before the original error is re-raised.
// Handlers are FnOnce and the receiver is consumed by value, so a
// future resolves at most once and each handler runs at most once.

use crate::errors::RhsmError;
use futures::future::BoxFuture;
use reqwest::Response;
use std::future::IntoFuture;
use tokio::sync::oneshot;

type SuccessFn = Box<dyn FnOnce(Response) -> Result<Response, RhsmError> + Send>;
type FailureFn = Box<dyn FnOnce(&RhsmError) + Send>;

/// Handle to one in-flight backend request
pub struct RequestFuture {
    receiver: oneshot::Receiver<Result<Response, RhsmError>>,
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
}

impl RequestFuture {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<Response, RhsmError>>) -> Self {
        Self {
            receiver,
            on_success: None,
            on_failure: None,
        }
    }

    /// Attach handlers that run after resolution, on the awaiting side.
    ///
    /// `on_success` may turn a received response into an error (status
    /// validation); `on_failure` observes executor-level failures only
    /// (transport, shutdown) and the original error is re-raised
    /// unchanged afterwards, so callers still see its type.
    pub fn map<S, F>(mut self, on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(Response) -> Result<Response, RhsmError> + Send + 'static,
        F: FnOnce(&RhsmError) + Send + 'static,
    {
        self.on_success = Some(Box::new(on_success));
        self.on_failure = Some(Box::new(on_failure));
        self
    }

    /// Wait for the request to resolve and apply the attached handlers.
    pub async fn resolve(self) -> Result<Response, RhsmError> {
        let outcome = match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RhsmError::ExecutorShutdown),
        };

        match outcome {
            Ok(response) => match self.on_success {
                Some(on_success) => on_success(response),
                None => Ok(response),
            },
            Err(err) => {
                if let Some(on_failure) = self.on_failure {
                    on_failure(&err);
                }
                Err(err)
            }
        }
    }
}

impl IntoFuture for RequestFuture {
    type Output = Result<Response, RhsmError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.resolve())
    }
}

/// Standard success handler: raise on client/server error statuses,
/// pass every other response through unchanged.
pub fn check_status(response: Response) -> Result<Response, RhsmError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(RhsmError::Status {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(response)
}
