//! A conversation session: history, connectivity, the exchange lock and the
//! pending draft, owned together so each session (and each test) starts fresh.

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Config;
use crate::exchange::{ExchangeController, ExchangeState, Rejection, SendOutcome, Settlement};
use crate::health::{ConnectivityStatus, HealthMonitor};
use crate::message::{ChatMessage, MessageStore};
use crate::suggestions;

pub struct Session {
    store: MessageStore,
    health: HealthMonitor,
    exchange: ExchangeController,
    draft: String,
    backend: Arc<dyn Backend>,
    reprobe_on_failure: bool,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            store: MessageStore::new(),
            health: HealthMonitor::new(),
            exchange: ExchangeController::new(config.max_results),
            draft: String::new(),
            backend,
            reprobe_on_failure: config.reprobe_on_failure,
        }
    }

    /// Kick off the startup health probe in the background
    pub fn start(&mut self) {
        tracing::info!(backend = %self.backend.describe(), "session started");
        self.health.start_probe(Arc::clone(&self.backend));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.store.snapshot()
    }

    pub fn backend_label(&self) -> String {
        self.backend.describe()
    }

    // Connectivity

    pub fn connectivity(&self) -> ConnectivityStatus {
        self.health.status()
    }

    pub fn warning(&self) -> Option<&'static str> {
        self.health.warning()
    }

    pub fn is_probing(&self) -> bool {
        self.health.is_probing()
    }

    /// Probe again in the background
    pub fn reprobe(&mut self) {
        self.health.start_probe(Arc::clone(&self.backend));
    }

    /// Wait for the background probe, if one is running
    pub async fn wait_for_probe(&mut self) -> ConnectivityStatus {
        self.health.wait().await
    }

    // Draft and suggestions

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Suggestions are offered only until the first user turn
    pub fn suggestions_visible(&self) -> bool {
        self.store.is_initial()
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        if self.suggestions_visible() {
            suggestions::all()
        } else {
            &[]
        }
    }

    /// Copy a suggestion into the draft. Does not send it.
    pub fn select_suggestion(&mut self, index: usize) -> bool {
        match self.suggestions().get(index) {
            Some(text) => {
                self.draft = text.to_string();
                true
            }
            None => false,
        }
    }

    // Exchange

    pub fn exchange_state(&self) -> ExchangeState {
        self.exchange.state()
    }

    pub fn is_awaiting(&self) -> bool {
        self.exchange.is_awaiting()
    }

    /// Start an exchange for `text` without waiting for the reply.
    ///
    /// Empty (after trimming) text and sends while an exchange is outstanding
    /// are ignored and leave the session untouched. On acceptance the user turn
    /// is appended, the draft is cleared and the request goes out.
    pub fn submit(&mut self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            tracing::debug!("send ignored: empty draft");
            return SendOutcome::Rejected(Rejection::EmptyDraft);
        }
        if self.exchange.is_awaiting() {
            tracing::debug!(state = ?self.exchange.state(), "send ignored: exchange in flight");
            return SendOutcome::Rejected(Rejection::ExchangeInFlight);
        }

        let request = self.store.next_id();
        self.store.append(ChatMessage::user(request, text));
        self.draft.clear();
        self.exchange.begin(request, Arc::clone(&self.backend), text.to_string());

        tracing::info!(
            %request,
            max_results = self.exchange.max_results(),
            "exchange started"
        );
        SendOutcome::Accepted(request)
    }

    /// Submit whatever is in the draft
    pub fn submit_draft(&mut self) -> SendOutcome {
        let text = self.draft.clone();
        self.submit(&text)
    }

    /// Wait for the outstanding exchange, append its reply and release the
    /// lock. `None` when nothing was in flight.
    pub async fn settle(&mut self) -> Option<Settlement> {
        if !self.exchange.is_awaiting() {
            return None;
        }

        let reply_id = self.store.next_id();
        let label = self.backend.describe();
        let (message, settlement) = self.exchange.finish(reply_id, &label).await?;
        self.store.append(message);

        match &settlement {
            Settlement::Answered { request, latency } => {
                let latency_ms = latency.as_millis() as u64;
                tracing::info!(%request, latency_ms, "exchange answered");
            }
            Settlement::Failed { request, error } => {
                tracing::warn!(%request, error = %error, "exchange failed");
                if self.reprobe_on_failure {
                    self.reprobe();
                }
            }
        }

        Some(settlement)
    }

    /// Settle only if the reply has already arrived
    pub async fn try_settle(&mut self) -> Option<Settlement> {
        if self.exchange.is_ready() {
            self.settle().await
        } else {
            None
        }
    }

    /// Submit and wait for the reply
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        let outcome = self.submit(text);
        if outcome.is_accepted() {
            self.settle().await;
        }
        outcome
    }

    /// Collect whatever finished in the background. Returns true when the
    /// visible state changed.
    pub async fn poll(&mut self) -> bool {
        let probed = self.health.poll().await;
        let settled = self.try_settle().await.is_some();
        probed || settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatReply, ChatRequest};
    use crate::error::BackendError;
    use crate::format;
    use crate::message::{ChatRole, WELCOME_TEXT};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Answers from a queue; optionally holds each reply until released
    struct ScriptedBackend {
        health: Result<(), BackendError>,
        replies: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedBackend {
        fn new(health: Result<(), BackendError>) -> Self {
            Self {
                health,
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn reply(self, reply: Result<ChatReply, BackendError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        fn answer(self, answer: &str) -> Self {
            self.reply(Ok(ChatReply {
                answer: answer.to_string(),
                confidence: None,
                sources: None,
            }))
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn health(&self) -> Result<(), BackendError> {
            self.health.clone()
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.replies.lock().unwrap().pop_front();
            next.expect("no scripted reply left")
        }

        fn describe(&self) -> String {
            "http://localhost:8000".to_string()
        }
    }

    fn session_with(backend: Arc<ScriptedBackend>) -> Session {
        Session::new(backend, &Config::new())
    }

    fn roles(session: &Session) -> Vec<ChatRole> {
        session.messages().iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_startup_probe_connects() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())));
        let mut session = session_with(backend);

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, WELCOME_TEXT);
        assert_eq!(session.connectivity(), ConnectivityStatus::Unknown);

        session.start();
        assert_eq!(session.connectivity(), ConnectivityStatus::Unknown);
        assert_eq!(session.wait_for_probe().await, ConnectivityStatus::Connected);
        assert_eq!(session.connectivity(), ConnectivityStatus::Connected);
        assert_eq!(session.warning(), None);
        // The probe never touches history
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).reply(Ok(ChatReply {
            answer: "Adressez-vous au bureau de l'ANDF de votre commune.".to_string(),
            confidence: Some(0.87),
            sources: Some(vec![json!("code-foncier"), json!({"doc": "decret-2015"})]),
        })));
        let mut session = session_with(Arc::clone(&backend));

        let outcome = session.send("Comment obtenir un titre foncier ?").await;
        assert!(outcome.is_accepted());

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "Comment obtenir un titre foncier ?");

        let reply = &messages[2];
        assert_eq!(reply.role, ChatRole::Assistant);
        assert!(!reply.is_error);
        assert_eq!(reply.confidence, Some(0.87));
        assert_eq!(reply.sources.len(), 2);
        assert!(reply.latency.is_some());
        assert_eq!(format::view(reply).confidence_label.as_deref(), Some("87%"));

        assert_eq!(session.exchange_state(), ExchangeState::Idle);
        assert_eq!(
            backend.requests(),
            vec![ChatRequest {
                message: "Comment obtenir un titre foncier ?".to_string(),
                max_results: 5,
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_error_message() {
        let backend = Arc::new(
            ScriptedBackend::new(Err(BackendError::Transport("connection refused".to_string())))
                .reply(Err(BackendError::Transport("connection refused".to_string()))),
        );
        let mut session = session_with(backend);

        let outcome = session.send("test").await;
        assert!(outcome.is_accepted());

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "test");
        let reply = &messages[2];
        assert_eq!(reply.role, ChatRole::Assistant);
        assert!(reply.is_error);
        assert!(reply.content.contains("backend"));
        assert!(reply.content.contains("connection refused"));
        assert_eq!(session.exchange_state(), ExchangeState::Idle);

        // Failure triggers a fresh probe
        assert!(session.is_probing());
        assert_eq!(session.wait_for_probe().await, ConnectivityStatus::Unreachable);
        assert!(session.warning().is_some());
    }

    #[tokio::test]
    async fn test_no_reprobe_when_disabled() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).reply(Err(BackendError::Status(500))));
        let mut config = Config::new();
        config.reprobe_on_failure = false;
        let mut session = Session::new(backend, &config);

        session.send("test").await;
        assert!(session.messages()[2].is_error);
        assert!(!session.is_probing());
        assert_eq!(session.connectivity(), ConnectivityStatus::Unknown);
    }

    #[tokio::test]
    async fn test_second_send_while_awaiting_is_ignored() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(
            ScriptedBackend::new(Ok(()))
                .gated(Arc::clone(&gate))
                .answer("première")
                .answer("troisième"),
        );
        let mut session = session_with(Arc::clone(&backend));

        let first = session.submit("un");
        let request = match first {
            SendOutcome::Accepted(id) => id,
            other => panic!("first send rejected: {:?}", other),
        };
        assert_eq!(session.exchange_state(), ExchangeState::Awaiting(request));

        let second = session.submit("deux");
        assert_eq!(second, SendOutcome::Rejected(Rejection::ExchangeInFlight));
        assert_eq!(roles(&session), vec![ChatRole::Assistant, ChatRole::User]);

        gate.notify_one();
        let settlement = session.settle().await;
        assert!(matches!(
            settlement,
            Some(Settlement::Answered { request: r, .. }) if r == request
        ));
        assert_eq!(session.exchange_state(), ExchangeState::Idle);

        gate.notify_one();
        assert!(session.send("trois").await.is_accepted());

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![WELCOME_TEXT, "un", "première", "trois", "troisième"]);
        let sent: Vec<String> = backend.requests().into_iter().map(|r| r.message).collect();
        assert_eq!(sent, vec!["un".to_string(), "trois".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_or_blank_send_changes_nothing() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())));
        let mut session = session_with(Arc::clone(&backend));
        session.set_draft("   ");

        assert_eq!(session.send("").await, SendOutcome::Rejected(Rejection::EmptyDraft));
        assert_eq!(session.send("   ").await, SendOutcome::Rejected(Rejection::EmptyDraft));
        assert_eq!(session.submit_draft(), SendOutcome::Rejected(Rejection::EmptyDraft));

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.exchange_state(), ExchangeState::Idle);
        assert_eq!(session.draft(), "   ");
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_draft_cleared_on_accept_even_when_exchange_fails() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).reply(Err(BackendError::Status(502))));
        let mut session = session_with(backend);
        session.set_draft("Quelle est la procédure d'immatriculation ?");

        assert!(session.submit_draft().is_accepted());
        assert_eq!(session.draft(), "");

        session.settle().await;
        assert!(session.messages()[2].is_error);
        assert_eq!(session.draft(), "");
    }

    #[tokio::test]
    async fn test_every_accepted_send_gets_exactly_one_reply() {
        let backend = Arc::new(
            ScriptedBackend::new(Ok(()))
                .answer("r1")
                .reply(Err(BackendError::Status(500)))
                .reply(Err(BackendError::Malformed("missing field `answer`".to_string())))
                .answer("r4"),
        );
        let mut config = Config::new();
        config.reprobe_on_failure = false;
        let mut session = Session::new(backend, &config);

        let attempts = ["q1", "", "q2", "  ", "q3", "\n", "q4"];
        let mut accepted = 0;
        for text in attempts {
            assert_eq!(session.exchange_state(), ExchangeState::Idle);
            if session.send(text).await.is_accepted() {
                accepted += 1;
            }
            assert_eq!(session.exchange_state(), ExchangeState::Idle);
        }

        assert_eq!(accepted, 4);
        let messages = session.messages();
        let user_turns = messages.iter().filter(|m| m.role == ChatRole::User).count();
        assert_eq!(user_turns, accepted);

        // After the seed: strictly user, assistant, user, assistant...
        for pair in messages[1..].chunks(2) {
            assert_eq!(pair[0].role, ChatRole::User);
            assert_eq!(pair[1].role, ChatRole::Assistant);
        }
        let errors: Vec<bool> =
            messages[1..].iter().skip(1).step_by(2).map(|m| m.is_error).collect();
        assert_eq!(errors, vec![false, true, true, false]);

        let mut ids: Vec<_> = messages.iter().map(|m| m.id).collect();
        let len = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), len);
    }

    #[tokio::test]
    async fn test_panicking_exchange_still_releases_lock() {
        // No scripted reply: the backend task panics
        let backend = Arc::new(ScriptedBackend::new(Ok(())));
        let mut config = Config::new();
        config.reprobe_on_failure = false;
        let mut session = Session::new(backend, &config);

        assert!(session.submit("test").is_accepted());
        let settlement = session.settle().await;

        assert!(matches!(
            settlement,
            Some(Settlement::Failed { error: BackendError::TaskFailed(_), .. })
        ));
        assert_eq!(session.exchange_state(), ExchangeState::Idle);
        assert!(session.messages()[2].is_error);

        // Still usable afterwards
        assert_eq!(session.submit("encore"), SendOutcome::Accepted(session.messages()[3].id));
    }

    #[tokio::test]
    async fn test_suggestions_visible_only_before_first_send() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).answer("ok"));
        let mut session = session_with(backend);

        assert!(session.suggestions_visible());
        assert_eq!(session.suggestions().len(), 5);

        assert!(session.select_suggestion(2));
        assert_eq!(session.draft(), "Quelle est la procédure d'immatriculation ?");
        // Selecting does not send
        assert_eq!(session.messages().len(), 1);
        assert!(!session.select_suggestion(9));

        session.submit_draft();
        assert!(!session.suggestions_visible());
        session.settle().await;
        assert!(!session.suggestions_visible());
        assert!(session.suggestions().is_empty());
        assert!(!session.select_suggestion(0));
    }

    #[tokio::test]
    async fn test_try_settle_waits_for_reply() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::new(Ok(())).gated(Arc::clone(&gate)).answer("ok"));
        let mut session = session_with(backend);

        assert!(session.try_settle().await.is_none());
        session.submit("question");
        assert!(session.try_settle().await.is_none());
        assert!(session.is_awaiting());

        gate.notify_one();
        let mut settled = false;
        for _ in 0..100 {
            if session.poll().await {
                settled = !session.is_awaiting();
                if settled {
                    break;
                }
            }
            tokio::task::yield_now().await;
        }
        assert!(settled);
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2].content, "ok");
    }

    #[tokio::test]
    async fn test_latency_excludes_time_waiting_to_be_settled() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).answer("ok"));
        let mut session = session_with(backend);

        assert!(session.submit("q").is_accepted());
        // The reply is ready long before the event loop gets round to it
        tokio::time::sleep(Duration::from_millis(300)).await;

        let latency = match session.try_settle().await {
            Some(Settlement::Answered { latency, .. }) => latency,
            other => panic!("expected an answer, got {:?}", other),
        };
        assert!(latency < Duration::from_millis(100), "latency was {:?}", latency);
        assert_eq!(session.messages()[2].latency, Some(latency));
    }

    #[tokio::test]
    async fn test_max_results_comes_from_config() {
        let backend = Arc::new(ScriptedBackend::new(Ok(())).answer("ok"));
        let mut config = Config::new();
        config.max_results = 3;
        let mut session = Session::new(Arc::clone(&backend) as Arc<dyn Backend>, &config);

        session.send("question").await;
        assert_eq!(backend.requests()[0].max_results, 3);
    }
}
