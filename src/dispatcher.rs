use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::backend::{BackendClient, QueryBackend, QueryError, QueryErrorKind};
use crate::citations::remap;
use crate::config::AppConfig;
use crate::models::{HealthResponse, Message, MessageId};
use crate::store::{ConversationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing changed and no request was sent.
    Skipped(SkipReason),
    /// The placeholder was resolved into the answer; carries its id.
    Answered(MessageId),
    /// The placeholder was resolved into the generic failure message.
    Failed(QueryErrorKind),
    /// The conversation was cleared while the request was in flight.
    Discarded,
}

/// Drives one question/answer cycle at a time against the conversation.
///
/// Clones share the same conversation, so a renderer can read or clear it
/// while a submit is waiting on the backend.
pub struct QueryDispatcher<B = BackendClient> {
    backend: Arc<B>,
    store: Arc<Mutex<ConversationStore>>,
    in_flight: Arc<Semaphore>,
}

impl<B> Clone for QueryDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl QueryDispatcher<BackendClient> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(BackendClient::new(config.backend_base_url.clone()))
    }
}

impl<B: QueryBackend> QueryDispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            store: Arc::new(Mutex::new(ConversationStore::new())),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SubmitOutcome::Skipped(SkipReason::EmptyInput);
        }

        let Ok(permit) = self.in_flight.try_acquire() else {
            tracing::debug!("query already in flight, ignoring submit");
            return SubmitOutcome::Skipped(SkipReason::InFlight);
        };

        let placeholder = {
            let mut store = lock(&self.store);
            store.append(Message::user(question));
            store.append(Message::placeholder())
        };
        let mut in_flight = InFlight {
            store: &self.store,
            placeholder,
            settled: false,
            _permit: permit,
        };

        let started = Instant::now();
        tracing::debug!(placeholder = %placeholder, "sending query");
        let result = self.backend.query(question).await;
        tracing::debug!(
            placeholder = %placeholder,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query settled"
        );

        let (message, outcome) = match result {
            Ok(response) => {
                let (answer, citations) = remap(&response.answer, &response.citations);
                let message = Message::answer(answer, citations, response.meta());
                (message, SubmitOutcome::Answered(placeholder))
            }
            Err(err) => {
                log_query_error(&err);
                (Message::request_failed(), SubmitOutcome::Failed(err.kind()))
            }
        };

        match in_flight.settle(message) {
            Ok(()) => outcome,
            Err(err) => {
                tracing::debug!(error = %err, "discarding response for cleared conversation");
                SubmitOutcome::Discarded
            }
        }
    }

    pub async fn check_health(&self) -> Result<HealthResponse, QueryError> {
        self.backend.health().await
    }

    /// Empties the conversation. An outstanding request keeps running and its
    /// result is dropped when it settles.
    pub fn clear(&self) {
        let dropped = lock(&self.store).clear();
        tracing::debug!(dropped, "conversation cleared");
    }

    pub fn snapshot(&self) -> Vec<Message> {
        lock(&self.store).messages().to_vec()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.available_permits() == 0
    }
}

/// Holds the single in-flight slot for one submit. If the submit future is
/// dropped before settling, the placeholder is resolved as a failure so the
/// log never keeps a stale pending entry.
struct InFlight<'a> {
    store: &'a Mutex<ConversationStore>,
    placeholder: MessageId,
    settled: bool,
    _permit: SemaphorePermit<'a>,
}

impl InFlight<'_> {
    fn settle(&mut self, message: Message) -> Result<(), StoreError> {
        self.settled = true;
        lock(self.store).replace_pending(self.placeholder, message)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let resolved =
            lock(self.store).replace_pending(self.placeholder, Message::request_failed());
        if let Err(err) = resolved {
            tracing::debug!(error = %err, "abandoned query had no placeholder left");
        }
    }
}

/// Every store mutation is a single push, replace or clear, so a guard
/// poisoned by a panicking reader still sees a consistent log.
fn lock(store: &Mutex<ConversationStore>) -> MutexGuard<'_, ConversationStore> {
    store.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        tracing::warn!("conversation store lock poisoned, recovering");
        store.clear_poison();
        poisoned.into_inner()
    })
}

fn log_query_error(err: &QueryError) {
    match err {
        QueryError::Status { status, .. } => {
            tracing::warn!(
                kind = err.kind().as_str(),
                status = %status,
                error = %err,
                "query failed"
            );
        }
        _ => tracing::warn!(kind = err.kind().as_str(), error = %err, "query failed"),
    }
}
