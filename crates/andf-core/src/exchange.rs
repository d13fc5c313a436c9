//! One request/response cycle against the answering service.
//!
//! The lock is the in-flight exchange itself: while `in_flight` is `Some` the
//! controller is `Awaiting`, and the only way back to `Idle` is
//! [`ExchangeController::finish`], which consumes the in-flight value and
//! always yields a message for it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::backend::{Backend, ChatReply, ChatRequest};
use crate::error::BackendError;
use crate::message::{ChatMessage, MessageId};

/// Identifies an exchange by the id of the user message that opened it
pub type RequestId = MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Awaiting(RequestId),
}

/// Why a send was ignored. Never shown to the user as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyDraft,
    ExchangeInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted(RequestId),
    Rejected(Rejection),
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted(_))
    }
}

/// How a settled exchange ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Answered { request: RequestId, latency: Duration },
    Failed { request: RequestId, error: BackendError },
}

/// The backend's outcome and how long the call itself took
type Timed = (Result<ChatReply, BackendError>, Duration);

struct InFlight {
    request: RequestId,
    started: Instant,
    task: JoinHandle<Timed>,
}

pub struct ExchangeController {
    in_flight: Option<InFlight>,
    max_results: u32,
}

impl ExchangeController {
    pub fn new(max_results: u32) -> Self {
        Self {
            in_flight: None,
            max_results,
        }
    }

    pub fn state(&self) -> ExchangeState {
        match &self.in_flight {
            Some(in_flight) => ExchangeState::Awaiting(in_flight.request),
            None => ExchangeState::Idle,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Whether the backend call has completed and `finish` will not wait
    pub fn is_ready(&self) -> bool {
        self.in_flight
            .as_ref()
            .map(|in_flight| in_flight.task.is_finished())
            .unwrap_or(false)
    }

    /// Take the lock and fire the request on a background task.
    /// Callers check [`is_awaiting`](Self::is_awaiting) first.
    pub(crate) fn begin(&mut self, request: RequestId, backend: Arc<dyn Backend>, message: String) {
        debug_assert!(self.in_flight.is_none(), "exchange started while another is in flight");

        let chat_request = ChatRequest {
            message,
            max_results: self.max_results,
        };
        let task = tokio::spawn(async move {
            let sent = Instant::now();
            let outcome = backend.chat(&chat_request).await;
            (outcome, sent.elapsed())
        });

        self.in_flight = Some(InFlight {
            request,
            started: Instant::now(),
            task,
        });
    }

    /// Wait for the in-flight exchange and release the lock.
    ///
    /// The lock is dropped only once the task has settled, so a caller that
    /// gives up on this future leaves the exchange pending rather than
    /// orphaning its user message.
    pub(crate) async fn finish(
        &mut self,
        reply_id: MessageId,
        backend_label: &str,
    ) -> Option<(ChatMessage, Settlement)> {
        let joined = {
            let in_flight = self.in_flight.as_mut()?;
            (&mut in_flight.task).await
        };
        let in_flight = self.in_flight.take()?;

        // A task that never returned has no timing of its own
        let (outcome, latency) = joined
            .unwrap_or_else(|e| (Err(BackendError::from(e)), in_flight.started.elapsed()));
        Some(settle(in_flight.request, reply_id, outcome, latency, backend_label))
    }
}

/// Turn the backend's answer (or failure) into the assistant turn
fn settle(
    request: RequestId,
    reply_id: MessageId,
    outcome: Result<ChatReply, BackendError>,
    latency: Duration,
    backend_label: &str,
) -> (ChatMessage, Settlement) {
    match outcome {
        Ok(reply) => {
            let message = ChatMessage::assistant(
                reply_id,
                reply.answer,
                normalize_confidence(reply.confidence),
                reply.sources.unwrap_or_default(),
            )
            .with_latency(latency);
            (message, Settlement::Answered { request, latency })
        }
        Err(error) => {
            let message = ChatMessage::error(reply_id, failure_text(&error, backend_label))
                .with_latency(latency);
            (message, Settlement::Failed { request, error })
        }
    }
}

/// Explanation shown in place of an answer
pub fn failure_text(error: &BackendError, backend_label: &str) -> String {
    format!(
        "Désolé, une erreur s'est produite : {}. Veuillez vérifier que le serveur backend est démarré ({}).",
        error, backend_label
    )
}

/// Scores are meant to be in [0, 1]; anything non-finite is dropped
pub fn normalize_confidence(confidence: Option<f64>) -> Option<f64> {
    confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
}
