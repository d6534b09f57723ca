//! Drives one question/answer exchange against the answer service.
//!
//! An exchange moves `Idle -> Sending -> AwaitingResponse`, resolves to an
//! [`ExchangeOutcome`] and then settles back to `Idle`. [`Orchestrator::start`] performs the
//! optimistic user-message write and spawns the service call;
//! [`Orchestrator::finish`] waits for that call and commits the reply. The
//! service call can't be cancelled: whatever it returns is written to the
//! session it was started for, even if the user has moved on to another one.

use crate::normalize::normalize;
use crate::service::{AnswerService, ChatRequest, ChatResponse, ServiceError, DEFAULT_TOP_K};
use crate::state::{title_from_query, ChatMessage, SessionPatch};
use crate::store::SessionStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Assistant message shown when an exchange fails
pub const FAILURE_TEXT: &str = "⚠️ Something went wrong. Please try again.";

/// Stand-in answer when the service replies without one
pub const NO_ANSWER_TEXT: &str = "No answer returned.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangePhase {
    #[default]
    Idle,
    Sending,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed,
}

/// Input box state for one invocation context
#[derive(Debug, Default)]
pub struct Composer {
    pub input: String,
    phase: ExchangePhase,
    last_outcome: Option<ExchangeOutcome>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// True while an exchange started from this composer is unresolved
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, ExchangePhase::Idle)
    }

    pub fn last_outcome(&self) -> Option<ExchangeOutcome> {
        self.last_outcome
    }

    fn settle(&mut self, outcome: ExchangeOutcome) {
        self.last_outcome = Some(outcome);
        self.input.clear();
        self.phase = ExchangePhase::Idle;
    }
}

/// An exchange whose service call is in flight
pub struct PendingExchange {
    session_id: String,
    query: String,
    first_exchange: bool,
    task: JoinHandle<Result<ChatResponse, ServiceError>>,
}

impl PendingExchange {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// True once the service call has resolved and `finish` won't wait
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn AnswerService>,
    top_k: u32,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self {
            service,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Run a full exchange for the composer's current input
    pub async fn send(
        &self,
        store: &mut SessionStore,
        composer: &mut Composer,
        session_id: &str,
    ) -> Option<ExchangeOutcome> {
        let pending = self.start(store, composer, session_id)?;
        Some(self.finish(store, composer, pending).await)
    }

    /// Append the user's message and dispatch the service call.
    ///
    /// Returns `None` without touching anything when the input is blank, the
    /// composer already has an exchange in flight, or the session is unknown.
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        store: &mut SessionStore,
        composer: &mut Composer,
        session_id: &str,
    ) -> Option<PendingExchange> {
        if composer.is_busy() {
            return None;
        }

        let query = composer.input.trim().to_string();
        if query.is_empty() {
            return None;
        }

        let Some(session) = store.get(session_id) else {
            warn!(session_id, "send to unknown session ignored");
            return None;
        };
        let first_exchange = session.messages.is_empty();

        composer.phase = ExchangePhase::Sending;
        store.update_session(session_id, |s| {
            SessionPatch::append_message(s, ChatMessage::user(query.clone()))
        });

        let service = Arc::clone(&self.service);
        let request = ChatRequest {
            query: query.clone(),
            top_k: self.top_k,
        };
        let task = tokio::spawn(async move { service.ask(&request).await });

        composer.phase = ExchangePhase::AwaitingResponse;
        info!(session_id, first_exchange, "exchange started");

        Some(PendingExchange {
            session_id: session_id.to_string(),
            query,
            first_exchange,
            task,
        })
    }

    /// Wait for the service call and commit its result to the session.
    ///
    /// The composer is settled (input cleared, back to idle) on every path.
    pub async fn finish(
        &self,
        store: &mut SessionStore,
        composer: &mut Composer,
        pending: PendingExchange,
    ) -> ExchangeOutcome {
        let PendingExchange {
            session_id,
            query,
            first_exchange,
            task,
        } = pending;

        let outcome = match task.await {
            Ok(Ok(response)) => {
                commit_answer(store, &session_id, &query, first_exchange, response);
                ExchangeOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "exchange failed");
                commit_failure(store, &session_id);
                ExchangeOutcome::Failed
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "answer task did not complete");
                commit_failure(store, &session_id);
                ExchangeOutcome::Failed
            }
        };

        info!(session_id = %session_id, ?outcome, "exchange finished");
        composer.settle(outcome);
        outcome
    }
}

fn commit_answer(
    store: &mut SessionStore,
    session_id: &str,
    query: &str,
    first_exchange: bool,
    response: ChatResponse,
) {
    let answer = response
        .answer
        .filter(|answer| !answer.is_empty())
        .unwrap_or_else(|| NO_ANSWER_TEXT.to_string());
    let text = normalize(&answer);
    let candidates = response.candidates.unwrap_or_default();

    store.update_session(session_id, |s| {
        let mut patch = SessionPatch::append_message(s, ChatMessage::assistant(text));
        if first_exchange {
            patch.title = Some(title_from_query(query));
        }
        patch.candidates = Some(candidates);
        patch
    });
}

fn commit_failure(store: &mut SessionStore, session_id: &str) {
    store.update_session(session_id, |s| {
        SessionPatch::append_message(s, ChatMessage::assistant(FAILURE_TEXT))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChatRole, DEFAULT_TITLE};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    struct FixedAnswer(ChatResponse);

    #[async_trait]
    impl AnswerService for FixedAnswer {
        async fn ask(&self, _request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl AnswerService for Unreachable {
        async fn ask(&self, _request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
            Err(ServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    struct Panics;

    #[async_trait]
    impl AnswerService for Panics {
        async fn ask(&self, _request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
            panic!("service blew up")
        }
    }

    /// Replies only once the test releases the response
    struct Gated {
        reply: Mutex<Option<oneshot::Receiver<ChatResponse>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Gated {
        fn new() -> (Arc<Self>, oneshot::Sender<ChatResponse>) {
            let (tx, rx) = oneshot::channel();
            let gated = Arc::new(Self {
                reply: Mutex::new(Some(rx)),
                seen: Mutex::new(Vec::new()),
            });
            (gated, tx)
        }
    }

    #[async_trait]
    impl AnswerService for Gated {
        async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self.reply.lock().unwrap().take().expect("asked once");
            Ok(reply.await.unwrap_or_default())
        }
    }

    fn answer(text: &str, candidates: Vec<serde_json::Value>) -> ChatResponse {
        ChatResponse {
            answer: Some(text.to_string()),
            candidates: Some(candidates),
        }
    }

    fn new_store() -> SessionStore {
        SessionStore::initialize(Box::new(MemoryStore::new()))
    }

    fn composer_with(text: &str) -> Composer {
        Composer {
            input: text.to_string(),
            ..Composer::default()
        }
    }

    #[tokio::test]
    async fn test_first_exchange_success() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let orchestrator = Orchestrator::new(Arc::new(FixedAnswer(answer(
            "Ana is a strong match. She has 6.5 years of Rust.",
            vec![json!({ "id": 1, "name": "Ana" })],
        ))));
        let mut composer = composer_with("  Find a backend engineer ");

        let outcome = orchestrator.send(&mut store, &mut composer, &id).await;
        assert_eq!(outcome, Some(ExchangeOutcome::Completed));

        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0], ChatMessage::user("Find a backend engineer"));
        assert_eq!(session.messages[1].role, ChatRole::Assistant);
        assert_eq!(
            session.messages[1].text,
            "- Ana is a strong match.\n- She has 6.5 years of Rust."
        );
        assert_eq!(session.title, "Find a backend engineer");
        assert_eq!(session.candidates.len(), 1);

        assert!(composer.input.is_empty());
        assert_eq!(composer.phase(), ExchangePhase::Idle);
        assert_eq!(composer.last_outcome(), Some(ExchangeOutcome::Completed));
    }

    #[tokio::test]
    async fn test_later_exchange_keeps_title_and_replaces_candidates() {
        let mut store = new_store();
        let id = store.first().id.clone();

        let first = Orchestrator::new(Arc::new(FixedAnswer(answer(
            "One.",
            vec![json!({ "id": 1 }), json!({ "id": 2 })],
        ))));
        first
            .send(&mut store, &mut composer_with("first question"), &id)
            .await;

        let second = Orchestrator::new(Arc::new(FixedAnswer(ChatResponse {
            answer: Some("Two.".to_string()),
            candidates: None,
        })));
        second
            .send(&mut store, &mut composer_with("second question"), &id)
            .await;

        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 4);
        assert_eq!(session.title, "first question");
        assert!(session.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_candidates() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let previous = vec![json!({ "id": 9, "name": "Kept" })];
        store.update_session(&id, |_| SessionPatch {
            candidates: Some(previous.clone()),
            ..SessionPatch::default()
        });

        let orchestrator = Orchestrator::new(Arc::new(Unreachable));
        let mut composer = composer_with("Data scientist with NLP");
        let outcome = orchestrator.send(&mut store, &mut composer, &id).await;
        assert_eq!(outcome, Some(ExchangeOutcome::Failed));

        let session = store.get(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1], ChatMessage::assistant(FAILURE_TEXT));
        assert_eq!(session.candidates, previous);
        assert_eq!(session.title, DEFAULT_TITLE);
        assert!(composer.input.is_empty());
        assert!(!composer.is_busy());
    }

    #[tokio::test]
    async fn test_panicking_service_counts_as_failure() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let orchestrator = Orchestrator::new(Arc::new(Panics));

        let outcome = orchestrator
            .send(&mut store, &mut composer_with("anyone?"), &id)
            .await;
        assert_eq!(outcome, Some(ExchangeOutcome::Failed));
        assert_eq!(
            store.get(&id).unwrap().messages[1].text,
            FAILURE_TEXT
        );
    }

    #[tokio::test]
    async fn test_missing_answer_uses_placeholder() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let orchestrator = Orchestrator::new(Arc::new(FixedAnswer(ChatResponse::default())));

        orchestrator
            .send(&mut store, &mut composer_with("hello"), &id)
            .await;
        assert_eq!(
            store.get(&id).unwrap().messages[1].text,
            "- No answer returned."
        );
    }

    #[tokio::test]
    async fn test_long_query_title_truncated() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let orchestrator = Orchestrator::new(Arc::new(FixedAnswer(answer("Ok.", vec![]))));
        let query = "Senior React developer with healthcare domain experience";

        orchestrator
            .send(&mut store, &mut composer_with(query), &id)
            .await;
        let title = &store.get(&id).unwrap().title;
        assert_eq!(title, &format!("{}…", &query[..40]));
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let orchestrator = Orchestrator::new(Arc::new(Unreachable));
        let mut composer = composer_with("   ");

        assert!(orchestrator.send(&mut store, &mut composer, &id).await.is_none());
        assert!(store.get(&id).unwrap().messages.is_empty());
        assert_eq!(composer.phase(), ExchangePhase::Idle);
    }

    #[tokio::test]
    async fn test_unknown_session_is_ignored() {
        let mut store = new_store();
        let orchestrator = Orchestrator::new(Arc::new(Unreachable));
        let mut composer = composer_with("hi");
        assert!(orchestrator.start(&mut store, &mut composer, "nope").is_none());
        assert_eq!(composer.input, "hi");
    }

    #[tokio::test]
    async fn test_optimistic_write_before_reply() {
        let mut store = new_store();
        let id = store.first().id.clone();
        let (service, release) = Gated::new();
        let orchestrator = Orchestrator::new(service.clone()).with_top_k(5);
        let mut composer = composer_with("Rust engineers");

        let pending = orchestrator.start(&mut store, &mut composer, &id).unwrap();
        assert_eq!(composer.phase(), ExchangePhase::AwaitingResponse);
        assert_eq!(store.get(&id).unwrap().messages, vec![ChatMessage::user("Rust engineers")]);

        // A second send from the same composer is refused while busy
        composer.input = "again".to_string();
        assert!(orchestrator.start(&mut store, &mut composer, &id).is_none());

        release.send(answer("Found two.", vec![])).unwrap();
        let outcome = orchestrator.finish(&mut store, &mut composer, pending).await;
        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(store.get(&id).unwrap().messages.len(), 2);
        assert!(composer.input.is_empty());

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0], ChatRequest { query: "Rust engineers".to_string(), top_k: 5 });
    }

    #[tokio::test]
    async fn test_late_reply_lands_in_its_own_session() {
        let mut store = new_store();
        let origin = store.first().id.clone();
        let (service, release) = Gated::new();
        let orchestrator = Orchestrator::new(service);
        let mut composer = composer_with("Who is free next week?");

        let pending = orchestrator.start(&mut store, &mut composer, &origin).unwrap();
        // User opens a new chat while the reply is outstanding
        let other = store.create_session();

        release.send(answer("Ben is free.", vec![json!({ "name": "Ben" })])).unwrap();
        orchestrator.finish(&mut store, &mut composer, pending).await;

        assert_eq!(store.get(&origin).unwrap().messages.len(), 2);
        assert_eq!(store.get(&origin).unwrap().title, "Who is free next week?");
        assert!(store.get(&other).unwrap().messages.is_empty());
        assert!(store.get(&other).unwrap().candidates.is_empty());
    }

    #[tokio::test]
    async fn test_reply_for_deleted_session_is_dropped() {
        let mut store = new_store();
        let origin = store.first().id.clone();
        let (service, release) = Gated::new();
        let orchestrator = Orchestrator::new(service);
        let mut composer = composer_with("question");

        let pending = orchestrator.start(&mut store, &mut composer, &origin).unwrap();
        let replacement = store.delete_session(&origin);

        release.send(answer("Too late.", vec![])).unwrap();
        let outcome = orchestrator.finish(&mut store, &mut composer, pending).await;

        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert!(!store.contains(&origin));
        assert!(store.get(&replacement).unwrap().messages.is_empty());
        assert!(!composer.is_busy());
    }
}
