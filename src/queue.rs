//! Holds API calls issued before authorization completes.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::{
    ApiResponse, AuthorizationFlow, Error, FlowState, Message, RequestDispatcher, Result,
    SignatureMethod,
};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A flow shared between the handshake driver and queued calls.
pub type SharedFlow<TSignatureMethod> = Arc<Mutex<AuthorizationFlow<TSignatureMethod>>>;

/// How long queued calls wait for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Upper bound between two authorization checks.
    #[serde(with = "millis")]
    pub interval: Duration,
    /// Give up after this long. `None` waits forever.
    #[serde(with = "millis_option")]
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(1),
            deadline: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryPolicy {
    pub fn interval(self, interval: Duration) -> Self {
        RetryPolicy { interval, ..self }
    }

    pub fn deadline(self, deadline: Option<Duration>) -> Self {
        RetryPolicy { deadline, ..self }
    }

    /// The interval actually waited between checks, never below 1 ms.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}

/// Forwards calls to the dispatcher once the flow is authorized.
///
/// Each submitted call waits on its own: there is no ordering between calls
/// that were queued together.
#[derive(Debug)]
pub struct PendingRequestQueue<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    flow: SharedFlow<TSignatureMethod>,
    dispatcher: RequestDispatcher,
    status: watch::Receiver<FlowState>,
    policy: RetryPolicy,
}

impl<TSignatureMethod> Clone for PendingRequestQueue<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    fn clone(&self) -> Self {
        PendingRequestQueue {
            flow: self.flow.clone(),
            dispatcher: self.dispatcher.clone(),
            status: self.status.clone(),
            policy: self.policy,
        }
    }
}

impl<TSignatureMethod> PendingRequestQueue<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    /// `status` must come from the same flow, see [`AuthorizationFlow::subscribe`].
    pub fn new(
        flow: SharedFlow<TSignatureMethod>,
        status: watch::Receiver<FlowState>,
        dispatcher: RequestDispatcher,
        policy: RetryPolicy,
    ) -> Self {
        PendingRequestQueue {
            flow,
            dispatcher,
            status,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Dispatch `message` now if authorized, otherwise once authorization
    /// completes.
    ///
    /// The wait wakes on every state change of the flow and re-checks at
    /// least once per retry interval.
    ///
    /// # Errors
    ///
    /// [`Error::PendingTimeout`] when the deadline passes first. Dispatch
    /// failures are returned as they are and never retried.
    pub async fn submit(&self, message: Message) -> Result<ApiResponse> {
        let started = Instant::now();
        let mut status = self.status.clone();
        let mut retries = 0u32;
        loop {
            if status.borrow_and_update().is_authorized() {
                let prepared = {
                    let mut flow = self.flow.lock().await;
                    self.dispatcher.prepare(&mut *flow, message.clone())
                };
                match prepared {
                    Ok(prepared) => {
                        if retries > 0 {
                            tracing::debug!(retries, "dispatching call queued before authorization");
                        }
                        return self.dispatcher.execute(prepared).await;
                    }
                    // authorization was cleared between the check and the lock
                    Err(Error::NotAuthorized) => {}
                    Err(e) => return Err(e),
                }
            }

            let wait = match self.policy.deadline {
                Some(deadline) => {
                    let elapsed = started.elapsed();
                    if elapsed >= deadline {
                        tracing::warn!(retries, ?deadline, "gave up waiting for authorization");
                        return Err(Error::PendingTimeout(deadline));
                    }
                    self.policy.effective_interval().min(deadline - elapsed)
                }
                None => self.policy.effective_interval(),
            };
            retries += 1;
            tracing::trace!(retries, ?wait, "call waiting for authorization");
            tokio::select! {
                Ok(()) = status.changed() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
