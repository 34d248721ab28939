//! Adaptive test sessions.
//!
//! Coordinates the item catalog, the session and ability stores and the
//! estimator: start a session, serve the next item, score responses and
//! finish when the stopping rule fires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::estimator::{
    classify_performance, confidence_interval, next_item_target_difficulty, should_stop,
    AbilityEstimator, EstimatorConfig, StopRule,
};
use crate::model::{AbilityEstimate, EstimationMethod, Item, PerformanceLevel, ResponseEvent};
use crate::report::SessionReport;
use crate::traits::{Entity, EstimationLog, ItemCatalog, Repository};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Finished,
}

/// One test-taker's adaptive session for a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: Uuid,
    pub examinee_id: String,
    pub subject: String,
    pub status: SessionStatus,
    /// Current ability estimate.
    pub estimate: AbilityEstimate,
    /// Responses in the order they were given. Append-only.
    pub history: Vec<ResponseEvent>,
    /// Estimate after each response, parallel to `history`.
    pub trajectory: Vec<AbilityEstimate>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TestSession {
    fn new(examinee_id: &str, subject: &str, start: AbilityEstimate) -> Self {
        Self {
            id: Uuid::new_v4(),
            examinee_id: examinee_id.to_string(),
            subject: subject.to_string(),
            status: SessionStatus::InProgress,
            estimate: start,
            history: Vec::new(),
            trajectory: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Ids of the items already answered.
    pub fn administered(&self) -> Vec<String> {
        self.history.iter().map(|r| r.item_id.clone()).collect()
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }
}

impl Entity for TestSession {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// The latest ability of an examinee in a subject, carried across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityRecord {
    pub examinee_id: String,
    pub subject: String,
    pub theta: f64,
    #[serde(with = "crate::model::infinite_as_null")]
    pub standard_error: f64,
    pub response_count: u32,
    pub method: EstimationMethod,
    pub updated_at: DateTime<Utc>,
}

impl AbilityRecord {
    /// Repository key for an examinee and subject.
    pub fn key(examinee_id: &str, subject: &str) -> String {
        format!("{examinee_id}/{subject}")
    }
}

impl Entity for AbilityRecord {
    type Id = String;

    fn id(&self) -> String {
        Self::key(&self.examinee_id, &self.subject)
    }
}

/// One finished session's final estimate. Append-only; an examinee gains one
/// record per finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationRecord {
    pub id: Uuid,
    pub examinee_id: String,
    pub subject: String,
    pub session_id: Uuid,
    pub theta: f64,
    #[serde(with = "crate::model::infinite_as_null")]
    pub standard_error: f64,
    pub response_count: u32,
    pub method: EstimationMethod,
    pub recorded_at: DateTime<Utc>,
}

impl Entity for EstimationRecord {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Result of submitting one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub is_correct: bool,
    pub estimate: AbilityEstimate,
    /// Difficulty the next item should be served at.
    pub target_difficulty: f64,
    pub confidence_interval: (f64, f64),
    pub level: PerformanceLevel,
    /// The stopping rule fired and the session is now finished.
    pub should_stop: bool,
}

/// Configuration for the session service.
#[derive(Debug, Clone, Default)]
pub struct SessionServiceConfig {
    pub estimator: EstimatorConfig,
    pub stop_rule: StopRule,
}

/// Session event hooks.
pub trait SessionObserver: Send + Sync {
    fn on_session_start(&self, session: &TestSession);
    fn on_response(&self, session_id: Uuid, outcome: &SubmissionOutcome);
    fn on_session_finish(&self, report: &SessionReport);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_session_start(&self, _: &TestSession) {}
    fn on_response(&self, _: Uuid, _: &SubmissionOutcome) {}
    fn on_session_finish(&self, _: &SessionReport) {}
}

/// The adaptive testing service.
///
/// Submissions for the same session are serialized through a per-session
/// async mutex; different sessions proceed independently.
pub struct AdaptiveTestService {
    catalog: Arc<dyn ItemCatalog>,
    sessions: Arc<dyn Repository<TestSession>>,
    abilities: Arc<dyn Repository<AbilityRecord>>,
    estimations: Arc<dyn EstimationLog>,
    estimator: AbilityEstimator,
    stop_rule: StopRule,
    observer: Arc<dyn SessionObserver>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AdaptiveTestService {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        sessions: Arc<dyn Repository<TestSession>>,
        abilities: Arc<dyn Repository<AbilityRecord>>,
        estimations: Arc<dyn EstimationLog>,
        config: SessionServiceConfig,
    ) -> Self {
        Self {
            catalog,
            sessions,
            abilities,
            estimations,
            estimator: AbilityEstimator::new(config.estimator),
            stop_rule: config.stop_rule,
            observer: Arc::new(NoopObserver),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn stop_rule(&self) -> &StopRule {
        &self.stop_rule
    }

    /// Open a session, seeded with the examinee's stored ability if any.
    pub async fn start_session(
        &self,
        examinee_id: &str,
        subject: &str,
    ) -> Result<TestSession, SessionError> {
        let prior = self
            .abilities
            .find(&AbilityRecord::key(examinee_id, subject))
            .await?;
        let start = match &prior {
            Some(record) => AbilityEstimate::starting_at(record.theta),
            None => AbilityEstimate::initial(),
        };

        let session = TestSession::new(examinee_id, subject, start);
        self.sessions.create(session.clone()).await?;

        tracing::info!(
            session = %session.id,
            examinee = examinee_id,
            subject,
            start_theta = start.theta,
            "session started"
        );
        self.observer.on_session_start(&session);
        Ok(session)
    }

    /// Fetch a session.
    pub async fn session(&self, session_id: Uuid) -> Result<TestSession, SessionError> {
        self.sessions
            .find(&session_id)
            .await?
            .ok_or(SessionError::NotFound(session_id))
    }

    /// The stored ability of an examinee in a subject.
    pub async fn ability(
        &self,
        examinee_id: &str,
        subject: &str,
    ) -> Result<Option<AbilityRecord>, SessionError> {
        Ok(self
            .abilities
            .find(&AbilityRecord::key(examinee_id, subject))
            .await?)
    }

    /// Final estimates of an examinee's finished sessions in a subject,
    /// newest first.
    pub async fn estimation_history(
        &self,
        examinee_id: &str,
        subject: &str,
    ) -> Result<Vec<EstimationRecord>, SessionError> {
        Ok(self.estimations.history(examinee_id, Some(subject)).await?)
    }

    /// The item to present next, or `None` once testing should stop or the
    /// subject has no unused items left.
    pub async fn next_item(&self, session_id: Uuid) -> Result<Option<Item>, SessionError> {
        let session = self.session(session_id).await?;
        if session.is_finished() {
            return Err(SessionError::AlreadyFinished(session_id));
        }
        if should_stop(
            session.estimate.standard_error,
            session.estimate.response_count,
            &self.stop_rule,
        ) {
            return Ok(None);
        }

        let target = next_item_target_difficulty(session.estimate.theta);
        let item = self
            .catalog
            .nearest_item(&session.subject, target, &session.administered())
            .await?;
        Ok(item)
    }

    /// Score a raw answer to an item and update the session's estimate.
    pub async fn submit_response(
        &self,
        session_id: Uuid,
        item_id: &str,
        answer: &str,
        response_time_ms: u64,
    ) -> Result<SubmissionOutcome, SessionError> {
        let item = self
            .catalog
            .find(&item_id.to_string())
            .await?
            .ok_or_else(|| SessionError::UnknownItem(item_id.to_string()))?;
        let event = ResponseEvent::new(item_id, item.is_correct(answer), response_time_ms);
        self.record_response(session_id, event).await
    }

    /// Fold an already-scored response into the session.
    pub async fn record_response(
        &self,
        session_id: Uuid,
        event: ResponseEvent,
    ) -> Result<SubmissionOutcome, SessionError> {
        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.record_locked(session_id, event).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn record_locked(
        &self,
        session_id: Uuid,
        event: ResponseEvent,
    ) -> Result<SubmissionOutcome, SessionError> {
        let mut session = self.session(session_id).await?;
        if session.is_finished() {
            return Err(SessionError::AlreadyFinished(session_id));
        }
        if session.history.iter().any(|r| r.item_id == event.item_id) {
            return Err(SessionError::DuplicateResponse {
                session_id,
                item_id: event.item_id,
            });
        }

        let estimate = self.estimator.estimate_ability(
            &session.estimate,
            &session.history,
            &event,
            &*self.catalog,
        )?;

        let is_correct = event.is_correct;
        session.history.push(event);
        session.trajectory.push(estimate);
        session.estimate = estimate;

        let stop = should_stop(
            estimate.standard_error,
            estimate.response_count,
            &self.stop_rule,
        );

        let outcome = SubmissionOutcome {
            is_correct,
            estimate,
            target_difficulty: next_item_target_difficulty(estimate.theta),
            confidence_interval: confidence_interval(estimate.theta, estimate.standard_error),
            level: classify_performance(estimate.theta),
            should_stop: stop,
        };
        self.observer.on_response(session_id, &outcome);

        if stop {
            tracing::info!(
                session = %session_id,
                theta = estimate.theta,
                se = estimate.standard_error,
                responses = estimate.response_count,
                "stopping rule satisfied"
            );
            self.close(&mut session).await?;
        } else {
            self.sessions.update(session).await?;
        }

        Ok(outcome)
    }

    /// End a session and persist the examinee's ability. Finishing an
    /// already finished session returns its report again.
    pub async fn finish(&self, session_id: Uuid) -> Result<SessionReport, SessionError> {
        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.finish_locked(session_id).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn finish_locked(&self, session_id: Uuid) -> Result<SessionReport, SessionError> {
        let mut session = self.session(session_id).await?;
        if !session.is_finished() {
            self.close(&mut session).await?;
        }
        Ok(SessionReport::from_session(&session, &self.stop_rule))
    }

    async fn close(&self, session: &mut TestSession) -> Result<(), SessionError> {
        session.status = SessionStatus::Finished;
        session.finished_at = Some(Utc::now());
        self.sessions.update(session.clone()).await?;

        if session.estimate.response_count > 0 {
            let record = AbilityRecord {
                examinee_id: session.examinee_id.clone(),
                subject: session.subject.clone(),
                theta: session.estimate.theta,
                standard_error: session.estimate.standard_error,
                response_count: session.estimate.response_count,
                method: EstimationMethod::Mle,
                updated_at: Utc::now(),
            };
            if self.abilities.find(&record.id()).await?.is_some() {
                self.abilities.update(record).await?;
            } else {
                self.abilities.create(record).await?;
            }

            self.estimations
                .create(EstimationRecord {
                    id: Uuid::new_v4(),
                    examinee_id: session.examinee_id.clone(),
                    subject: session.subject.clone(),
                    session_id: session.id,
                    theta: session.estimate.theta,
                    standard_error: session.estimate.standard_error,
                    response_count: session.estimate.response_count,
                    method: EstimationMethod::Mle,
                    recorded_at: Utc::now(),
                })
                .await?;
        }

        let report = SessionReport::from_session(session, &self.stop_rule);
        tracing::info!(
            session = %session.id,
            theta = report.estimate.theta,
            level = %report.level,
            responses = report.response_count,
            "session finished"
        );
        self.observer.on_session_finish(&report);
        Ok(())
    }

    fn session_lock(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(session_id).or_default())
    }

    /// Drop the session's lock entry once no other caller holds or awaits it.
    fn release_lock(&self, session_id: Uuid, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one in `lock`. Counts only change while
        // the map is held, so `lock` is dropped before the guard.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&session_id);
        }
        drop(lock);
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{nearest_by_difficulty, ItemParameters};
    use crate::traits::{ItemParameterLookup, Page};

    struct MapRepo<E: Entity>(Mutex<BTreeMap<E::Id, E>>);

    impl<E: Entity> MapRepo<E> {
        fn new() -> Self {
            Self(Mutex::new(BTreeMap::new()))
        }

        fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<E::Id, E>> {
            self.0.lock().unwrap()
        }
    }

    #[async_trait]
    impl<E: Entity> Repository<E> for MapRepo<E> {
        async fn create(&self, entity: E) -> anyhow::Result<()> {
            let mut map = self.entries();
            anyhow::ensure!(!map.contains_key(&entity.id()), "duplicate id");
            map.insert(entity.id(), entity);
            Ok(())
        }

        async fn find(&self, id: &E::Id) -> anyhow::Result<Option<E>> {
            Ok(self.entries().get(id).cloned())
        }

        async fn update(&self, entity: E) -> anyhow::Result<()> {
            let mut map = self.entries();
            anyhow::ensure!(map.contains_key(&entity.id()), "missing id");
            map.insert(entity.id(), entity);
            Ok(())
        }

        async fn list(&self, offset: usize, limit: usize) -> anyhow::Result<Page<E>> {
            let map = self.entries();
            Ok(Page {
                items: map.values().skip(offset).take(limit).cloned().collect(),
                total: map.len(),
            })
        }
    }

    impl ItemParameterLookup for MapRepo<Item> {
        fn parameters(&self, item_id: &str) -> Option<ItemParameters> {
            self.entries().get(item_id).map(|i| i.parameters)
        }
    }

    #[async_trait]
    impl ItemCatalog for MapRepo<Item> {
        async fn nearest_item(
            &self,
            subject: &str,
            target: f64,
            exclude: &[String],
        ) -> anyhow::Result<Option<Item>> {
            let map = self.entries();
            let candidates = map.values().filter(|i| i.subject == subject);
            Ok(nearest_by_difficulty(candidates, target, exclude).cloned())
        }
    }

    #[async_trait]
    impl EstimationLog for MapRepo<EstimationRecord> {
        async fn history(
            &self,
            examinee_id: &str,
            subject: Option<&str>,
        ) -> anyhow::Result<Vec<EstimationRecord>> {
            let mut records: Vec<_> = self
                .entries()
                .values()
                .filter(|r| r.examinee_id == examinee_id)
                .filter(|r| subject.map_or(true, |s| r.subject == s))
                .cloned()
                .collect();
            records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
            Ok(records)
        }
    }

    fn service() -> AdaptiveTestService {
        let catalog = MapRepo::new();
        for i in 0..10 {
            let item = Item {
                id: format!("q{i}"),
                subject: "math".into(),
                prompt: format!("Question {i}"),
                options: vec![],
                answer: "yes".into(),
                knowledge_points: vec![],
                parameters: ItemParameters::new(-2.0 + 0.4 * i as f64, 1.2, 0.0).unwrap(),
            };
            catalog.entries().insert(item.id.clone(), item);
        }
        AdaptiveTestService::new(
            Arc::new(catalog),
            Arc::new(MapRepo::new()),
            Arc::new(MapRepo::new()),
            Arc::new(MapRepo::new()),
            SessionServiceConfig {
                estimator: EstimatorConfig::default(),
                stop_rule: StopRule {
                    se_threshold: 1e-6,
                    max_responses: 5,
                },
            },
        )
    }

    #[tokio::test]
    async fn unknown_sessions_leave_no_lock_behind() {
        let service = service();

        for _ in 0..50 {
            let id = Uuid::new_v4();
            let err = service
                .record_response(id, ResponseEvent::new("q0", true, 0))
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::NotFound(missing) if missing == id));

            let err = service.finish(Uuid::new_v4()).await.unwrap_err();
            assert!(matches!(err, SessionError::NotFound(_)));
        }

        assert_eq!(service.lock_entries(), 0);
    }

    #[tokio::test]
    async fn abandoned_sessions_leave_no_lock_behind() {
        let service = service();
        let session = service.start_session("ana", "math").await.unwrap();

        let item = service.next_item(session.id).await.unwrap().unwrap();
        service
            .submit_response(session.id, &item.id, "yes", 0)
            .await
            .unwrap();
        assert_eq!(service.lock_entries(), 0);

        let other = if item.id == "q1" { "q2" } else { "q1" };
        let (first, second) = tokio::join!(
            service.record_response(session.id, ResponseEvent::new(other, false, 0)),
            service.record_response(session.id, ResponseEvent::new(other, false, 0)),
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(service.lock_entries(), 0);

        // Never finished.
        assert!(!service.session(session.id).await.unwrap().is_finished());
    }
}
