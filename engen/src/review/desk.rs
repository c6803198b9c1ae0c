//! Channel-backed interactive reviewer.

use super::{ReviewDecision, ReviewRequest, Reviewer};
use crate::config::ReviewConfig;
use crate::core::StageId;
use crate::errors::{ConfigError, ReviewError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
struct OpenSession {
    request: ReviewRequest,
    response_tx: oneshot::Sender<ReviewDecision>,
}

/// Closes a session when its waiter finishes or is dropped.
struct SessionGuard<'a> {
    sessions: &'a RwLock<HashMap<Uuid, OpenSession>>,
    session_id: Uuid,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.sessions.write().remove(&self.session_id).is_some() {
            debug!(session = %self.session_id, "Review session closed without a decision");
        }
    }
}

/// Holds open review sessions until someone decides them.
///
/// [`Reviewer::review`] registers the session and waits; `approve`,
/// `reject` and `cancel` resolve it from another task. Without a timeout
/// a session waits indefinitely. A session closes as soon as its waiter
/// returns or is dropped.
#[derive(Default)]
pub struct ReviewDesk {
    sessions: RwLock<HashMap<Uuid, OpenSession>>,
    timeout: Option<Duration>,
    stage_timeouts: BTreeMap<StageId, Option<Duration>>,
    watchers: RwLock<Vec<mpsc::UnboundedSender<ReviewRequest>>>,
}

impl ReviewDesk {
    /// Creates a desk without a timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails sessions with [`ReviewError::TimedOut`] after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the timeout for one stage; `None` waits indefinitely.
    #[must_use]
    pub fn with_stage_timeout(mut self, stage: StageId, timeout: Option<Duration>) -> Self {
        self.stage_timeouts.insert(stage, timeout);
        self
    }

    /// Builds a desk with the default and per-stage limits from `config`.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ConfigError> {
        let mut desk = Self::new();
        desk.timeout = config.default_timeout();
        desk.stage_timeouts = config.stage_timeouts()?;
        Ok(desk)
    }

    /// Returns the default timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the timeout that applies to `stage`.
    #[must_use]
    pub fn timeout_for(&self, stage: StageId) -> Option<Duration> {
        self.stage_timeouts
            .get(&stage)
            .copied()
            .unwrap_or(self.timeout)
    }

    /// Returns a receiver that sees every newly opened session.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ReviewRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.write().push(tx);
        rx
    }

    /// Approves an open session.
    pub fn approve(
        &self,
        session_id: Uuid,
        reviewer_id: &str,
        comments: &str,
    ) -> Result<(), ReviewError> {
        self.decide(
            session_id,
            ReviewDecision::approve(reviewer_id).with_comments(comments),
        )
    }

    /// Rejects an open session.
    pub fn reject(
        &self,
        session_id: Uuid,
        reviewer_id: &str,
        comments: &str,
    ) -> Result<(), ReviewError> {
        self.decide(
            session_id,
            ReviewDecision::reject(reviewer_id).with_comments(comments),
        )
    }

    /// Delivers a decision to an open session.
    pub fn decide(&self, session_id: Uuid, decision: ReviewDecision) -> Result<(), ReviewError> {
        let session = self
            .sessions
            .write()
            .remove(&session_id)
            .ok_or(ReviewError::UnknownSession)?;
        debug!(session = %session_id, verdict = %decision.verdict, "Review decided");
        // The waiter may have timed out between the lookup and the send.
        session
            .response_tx
            .send(decision)
            .map_err(|_| ReviewError::UnknownSession)
    }

    /// Cancels an open session; its waiter fails with [`ReviewError::Cancelled`].
    pub fn cancel(&self, session_id: Uuid) -> Result<(), ReviewError> {
        self.sessions
            .write()
            .remove(&session_id)
            .map(drop)
            .ok_or(ReviewError::UnknownSession)
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Lists open sessions, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<ReviewRequest> {
        let mut requests: Vec<ReviewRequest> = self
            .sessions
            .read()
            .values()
            .map(|s| s.request.clone())
            .collect();
        requests.sort_by_key(|r| r.requested_at);
        requests
    }

    fn announce(&self, request: &ReviewRequest) {
        self.watchers
            .write()
            .retain(|tx| tx.send(request.clone()).is_ok());
    }
}

#[async_trait]
impl Reviewer for ReviewDesk {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewDecision, ReviewError> {
        let session_id = request.session_id;
        let (tx, rx) = oneshot::channel();
        self.sessions.write().insert(
            session_id,
            OpenSession {
                request: request.clone(),
                response_tx: tx,
            },
        );
        let _guard = SessionGuard {
            sessions: &self.sessions,
            session_id,
        };
        self.announce(request);

        match self.timeout_for(request.stage_id) {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received.map_err(|_| ReviewError::Cancelled),
                Err(_) => {
                    warn!(session = %session_id, stage = %request.stage_id, "Review timed out");
                    Err(ReviewError::TimedOut)
                }
            },
            None => rx.await.map_err(|_| ReviewError::Cancelled),
        }
    }
}

impl std::fmt::Debug for ReviewDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewDesk")
            .field("pending_count", &self.pending_count())
            .field("timeout", &self.timeout)
            .field("stage_timeouts", &self.stage_timeouts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Score, StageId};
    use crate::review::Verdict;
    use crate::stages::StageResult;
    use chrono::Utc;
    use std::sync::Arc;

    fn request() -> ReviewRequest {
        let result = StageResult::pending(
            StageId::DocumentGeneration,
            serde_json::json!({"doc_path": "docs/a.md"}),
            Score::new(55.0).unwrap(),
            Utc::now(),
        );
        ReviewRequest::for_result(Uuid::new_v4(), &result)
    }

    #[tokio::test]
    async fn test_review_approved() {
        let desk = Arc::new(ReviewDesk::new());
        let mut opened = desk.subscribe();
        let waiter = desk.clone();
        let handle = tokio::spawn(async move { waiter.review(&request()).await });

        let session = opened.recv().await.unwrap();
        assert_eq!(desk.pending_count(), 1);
        assert_eq!(desk.pending()[0].session_id, session.session_id);
        desk.approve(session.session_id, "ana", "looks right").unwrap();

        let decision = handle.await.unwrap().unwrap();
        assert_eq!(decision.verdict, Verdict::Approve);
        assert_eq!(decision.reviewer_id, "ana");
        assert_eq!(desk.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_review_rejected() {
        let desk = Arc::new(ReviewDesk::new());
        let mut opened = desk.subscribe();
        let waiter = desk.clone();
        let handle = tokio::spawn(async move { waiter.review(&request()).await });

        let session = opened.recv().await.unwrap();
        desk.reject(session.session_id, "bo", "wrong pattern").unwrap();

        let decision = handle.await.unwrap().unwrap();
        assert_eq!(decision.verdict, Verdict::Reject);
        assert_eq!(decision.comments, "wrong pattern");
    }

    #[tokio::test]
    async fn test_review_timeout() {
        let desk = ReviewDesk::new().with_timeout(Duration::from_millis(20));
        assert_eq!(desk.review(&request()).await, Err(ReviewError::TimedOut));
        assert_eq!(desk.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_review_cancelled() {
        let desk = Arc::new(ReviewDesk::new());
        let mut opened = desk.subscribe();
        let waiter = desk.clone();
        let handle = tokio::spawn(async move { waiter.review(&request()).await });

        let session = opened.recv().await.unwrap();
        desk.cancel(session.session_id).unwrap();
        assert_eq!(handle.await.unwrap(), Err(ReviewError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_waiter_closes_session() {
        let desk = Arc::new(ReviewDesk::new());
        let mut opened = desk.subscribe();
        let waiter = desk.clone();
        let handle = tokio::spawn(async move { waiter.review(&request()).await });

        let session = opened.recv().await.unwrap();
        assert_eq!(desk.pending_count(), 1);
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(desk.pending_count(), 0);
        assert!(desk.pending().is_empty());
        assert_eq!(
            desk.approve(session.session_id, "ana", ""),
            Err(ReviewError::UnknownSession)
        );
    }

    #[tokio::test]
    async fn test_stage_timeout_overrides_default() {
        let desk = ReviewDesk::new()
            .with_timeout(Duration::from_secs(3600))
            .with_stage_timeout(StageId::DocumentGeneration, Some(Duration::from_millis(20)));
        assert_eq!(desk.timeout_for(StageId::DiagramValidation), Some(Duration::from_secs(3600)));
        assert_eq!(desk.review(&request()).await, Err(ReviewError::TimedOut));
        assert_eq!(desk.pending_count(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::EngenConfig::from_toml_str(
            "[review]\ntimeout_seconds = 0\n\n[review.timeouts]\ncomponent_specification = 30\n",
        )
        .unwrap();
        let desk = ReviewDesk::from_config(&config.review).unwrap();
        assert_eq!(desk.timeout(), None);
        assert_eq!(
            desk.timeout_for(StageId::ComponentSpecification),
            Some(Duration::from_secs(30))
        );
        assert_eq!(desk.timeout_for(StageId::HumanVerification), None);
    }

    #[test]
    fn test_unknown_session() {
        let desk = ReviewDesk::new();
        assert_eq!(
            desk.approve(Uuid::new_v4(), "ana", ""),
            Err(ReviewError::UnknownSession)
        );
        assert_eq!(desk.cancel(Uuid::new_v4()), Err(ReviewError::UnknownSession));
    }
}
