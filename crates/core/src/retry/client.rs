//! Retrying asynchronous HTTP client

use std::fmt;
use std::sync::Arc;

use rebound_common::{ExponentialBackoff, Jitter};
use rebound_domain::{JitterMode, RequestDescriptor, RetryPolicy};

use super::call::Call;
use super::events::{RetryEvent, RetryObserver, TracingObserver};
use super::handle::{CallResult, CompletionHandle};
use super::ports::{Scheduler, Transport};

/// State shared by the client and every call it has submitted
pub(crate) struct ClientShared {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) policy: Arc<RetryPolicy>,
    pub(crate) backoff: ExponentialBackoff,
    observers: Vec<Arc<dyn RetryObserver>>,
}

impl ClientShared {
    pub(crate) fn emit(&self, request: &RequestDescriptor, event: &RetryEvent) {
        for observer in &self.observers {
            observer.on_event(request, event);
        }
    }
}

fn backoff_for(policy: &RetryPolicy) -> ExponentialBackoff {
    let jitter = match policy.jitter() {
        JitterMode::None => Jitter::None,
        JitterMode::Full => Jitter::Full,
        JitterMode::Equal => Jitter::Equal,
    };
    ExponentialBackoff::new(policy.base_delay(), policy.backoff_factor(), policy.max_delay())
        .with_jitter(jitter)
}

/// HTTP client that transparently retries transient failures.
///
/// Each [`submit`](Self::submit) returns a [`CompletionHandle`] right away;
/// attempts run on the injected [`Scheduler`] and go out through the injected
/// [`Transport`]. Calls are fully independent of each other, so the client is
/// cheap to clone and safe to share across threads.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use rebound_core::{RetryingClient, Scheduler, Transport};
/// # use rebound_domain::{RequestDescriptor, RetryPolicy};
/// # async fn demo(transport: Arc<dyn Transport>, scheduler: Arc<dyn Scheduler>) {
/// let client = RetryingClient::new(transport, scheduler, RetryPolicy::default());
/// let handle = client.submit(RequestDescriptor::get("https://api.example.com/health").build());
/// match handle.await {
///     Ok(response) => println!("status {}", response.status()),
///     Err(err) => eprintln!("gave up: {err}"),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct RetryingClient {
    shared: Arc<ClientShared>,
}

impl RetryingClient {
    /// Create a client that logs retry decisions through `tracing`
    pub fn new(
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        policy: RetryPolicy,
    ) -> Self {
        Self::builder(transport, scheduler).policy(policy).build()
    }

    /// Start a builder with the default policy and the `tracing` observer
    pub fn builder(
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> RetryingClientBuilder {
        RetryingClientBuilder {
            transport,
            scheduler,
            policy: RetryPolicy::default(),
            observers: Vec::new(),
            tracing: true,
        }
    }

    /// Policy every call of this client runs under
    pub fn policy(&self) -> &RetryPolicy {
        &self.shared.policy
    }

    /// Start executing `request` and return its handle without blocking.
    ///
    /// The first attempt is handed to the scheduler before this returns.
    pub fn submit(&self, request: RequestDescriptor) -> CompletionHandle {
        let call = Call::start(Arc::clone(&self.shared), request);
        CompletionHandle::new(call)
    }

    /// Submit `request` and wait for its terminal result
    pub async fn execute(&self, request: RequestDescriptor) -> CallResult {
        self.submit(request).await
    }
}

impl fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.shared.policy)
            .field("observers", &self.shared.observers.len())
            .finish()
    }
}

/// Builder for [`RetryingClient`]
pub struct RetryingClientBuilder {
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    policy: RetryPolicy,
    observers: Vec<Arc<dyn RetryObserver>>,
    tracing: bool,
}

impl RetryingClientBuilder {
    /// Replace the default retry policy
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add an observer; the `tracing` observer, unless disabled, runs first
    pub fn observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Skip the default `tracing` observer
    pub fn without_tracing(mut self) -> Self {
        self.tracing = false;
        self
    }

    /// Freeze the policy and observers into a client
    pub fn build(self) -> RetryingClient {
        let backoff = backoff_for(&self.policy);
        let mut observers: Vec<Arc<dyn RetryObserver>> =
            Vec::with_capacity(self.observers.len() + 1);
        if self.tracing {
            observers.push(Arc::new(TracingObserver));
        }
        observers.extend(self.observers);

        RetryingClient {
            shared: Arc::new(ClientShared {
                transport: self.transport,
                scheduler: self.scheduler,
                policy: Arc::new(self.policy),
                backoff,
                observers,
            }),
        }
    }
}
