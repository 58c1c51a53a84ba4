//! Central analysis engine.
//!
//! Owns the session store and the response analyzer, and serializes every
//! mutation of a session behind a per-session permit: at most one analysis
//! (or other write) runs per session at a time, while different sessions
//! proceed concurrently. Each mutating operation loads the session, works on
//! that copy, and stores it back only on success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::aggregator::{summarize, SessionSummary};
use crate::analyzer::{ResponseAnalyzer, DEFAULT_STRATEGY_TIMEOUT};
use crate::error::{EngineError, Result};
use crate::model::{InterviewSession, QuestionType, ResponseAnalysis};
use crate::profile::ScoringProfile;
use crate::record::AnalyzeRequest;
use crate::scoring::RuleBasedStrategy;
use crate::store::InMemorySessionStore;
use crate::traits::{ScoringStrategy, SessionStore};

/// Configuration for the analysis engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time budget for one scoring-strategy call before falling back.
    pub strategy_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }
}

/// The response analysis and scoring engine.
pub struct AnalysisEngine {
    store: Arc<dyn SessionStore>,
    analyzer: ResponseAnalyzer,
    gates: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
}

impl AnalysisEngine {
    /// Create an engine. The profile is validated up front.
    pub fn new(
        store: Arc<dyn SessionStore>,
        profile: Arc<ScoringProfile>,
        strategy: Arc<dyn ScoringStrategy>,
        config: EngineConfig,
    ) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            store,
            analyzer: ResponseAnalyzer::new(profile, strategy, config.strategy_timeout),
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// In-memory engine using rule-based scoring.
    pub fn rule_based(profile: Arc<ScoringProfile>) -> Result<Self> {
        let strategy = Arc::new(RuleBasedStrategy::new(profile.clone()));
        Self::new(
            Arc::new(InMemorySessionStore::new()),
            profile,
            strategy,
            EngineConfig::default(),
        )
    }

    pub fn profile(&self) -> &ScoringProfile {
        self.analyzer.profile()
    }

    pub fn strategy_name(&self) -> &str {
        self.analyzer.strategy_name()
    }

    /// Start a new session.
    pub async fn create_session(&self, label: Option<String>) -> Result<Uuid> {
        let session = InterviewSession::new(label);
        let id = session.id;
        self.store.put(session).await?;
        info!(session = %id, "session created");
        Ok(id)
    }

    /// Append a question to an active session. Returns its index.
    pub async fn add_question(
        &self,
        session_id: Uuid,
        text: &str,
        question_type: QuestionType,
    ) -> Result<usize> {
        let _permit = self.lock(session_id).await?;
        let mut session = self.store.get(session_id).await?;
        let index = session.push_question(text, question_type)?;
        self.store.put(session).await?;
        Ok(index)
    }

    /// Record that a question has been put to the candidate.
    pub async fn mark_asked(&self, session_id: Uuid, question_index: usize) -> Result<()> {
        let _permit = self.lock(session_id).await?;
        let mut session = self.store.get(session_id).await?;
        session.question_mut(question_index)?.mark_asked(Utc::now())?;
        self.store.put(session).await
    }

    /// Analyze a response to an asked question and persist the analysis.
    #[instrument(skip(self, request), fields(session = %request.session_id, question = request.question_index))]
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<ResponseAnalysis> {
        let _permit = self.lock(request.session_id).await?;
        let mut session = self.store.get(request.session_id).await?;
        let question = session.question_mut(request.question_index)?;
        self.analyzer
            .analyze(question, &request.response_text)
            .await?;
        let analysis = current_analysis(&session, request.question_index)?;
        self.store.put(session).await?;

        info!(
            overall = analysis.overall_score,
            strategy = %analysis.strategy,
            fallback_used = analysis.fallback_used,
            "analysis recorded"
        );
        Ok(analysis)
    }

    /// Re-score an answered question's latest response as a new version.
    #[instrument(skip(self))]
    pub async fn reanalyze(
        &self,
        session_id: Uuid,
        question_index: usize,
    ) -> Result<ResponseAnalysis> {
        let _permit = self.lock(session_id).await?;
        let mut session = self.store.get(session_id).await?;
        let question = session.question_mut(question_index)?;
        self.analyzer.reanalyze(question).await?;
        let analysis = current_analysis(&session, question_index)?;
        self.store.put(session).await?;

        info!(version = analysis.version, overall = analysis.overall_score, "re-analysis recorded");
        Ok(analysis)
    }

    /// End the session. Later mutations fail with `SessionClosed`; summaries
    /// become final.
    pub async fn end_session(&self, session_id: Uuid) -> Result<()> {
        let _permit = self.lock(session_id).await?;
        let mut session = self.store.get(session_id).await?;
        session.end(Utc::now())?;
        let answered = session.answered_count();
        self.store.put(session).await?;
        info!(session = %session_id, answered, "session ended");
        Ok(())
    }

    /// Summary of the session's current analyses.
    pub async fn summarize(&self, session_id: Uuid) -> Result<SessionSummary> {
        let session = self.store.get(session_id).await?;
        summarize(&session, self.analyzer.profile())
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<InterviewSession> {
        self.store.get(session_id).await
    }

    /// Store a session produced elsewhere (e.g. loaded from JSON).
    pub async fn import_session(&self, session: InterviewSession) -> Result<Uuid> {
        let id = session.id;
        let _permit = self.lock(id).await?;
        self.store.put(session).await?;
        Ok(id)
    }

    /// Remove a session. Callers already waiting on it see `NotFound`.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let _permit = self.lock(session_id).await?;
        self.store.delete(session_id).await
    }

    /// Wait for exclusive access to one session.
    async fn lock(&self, session_id: Uuid) -> Result<SessionGuard<'_>> {
        let gate = {
            let mut gates = self
                .gates
                .lock()
                .map_err(|_| EngineError::Storage("session gate lock poisoned".into()))?;
            gates
                .entry(session_id)
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        let permit = gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Storage(format!("session gate closed: {e}")))?;
        Ok(SessionGuard {
            gates: &self.gates,
            session_id,
            gate,
            permit: Some(permit),
        })
    }
}

/// Exclusive access to one session.
///
/// Dropping the guard releases the permit, then forgets the session's gate
/// unless another caller still holds or waits on it. Unknown and deleted
/// session ids therefore leave nothing behind.
struct SessionGuard<'a> {
    gates: &'a Mutex<HashMap<Uuid, Arc<Semaphore>>>,
    session_id: Uuid,
    gate: Arc<Semaphore>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        let Ok(mut gates) = self.gates.lock() else {
            return;
        };
        // Only the map and this guard reference the gate. Clones are taken
        // under the map lock, so the count cannot grow underneath us.
        let idle = Arc::strong_count(&self.gate) == 2
            && gates
                .get(&self.session_id)
                .is_some_and(|g| Arc::ptr_eq(g, &self.gate));
        if idle {
            gates.remove(&self.session_id);
        }
    }
}

fn current_analysis(session: &InterviewSession, index: usize) -> Result<ResponseAnalysis> {
    session.question(index)?.analysis().cloned().ok_or_else(|| {
        EngineError::StateConflict(format!("question {index} has no analysis"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Trend;
    use crate::model::{Dimension, QuestionState};
    use crate::traits::{DimensionScores, ScoringRequest};
    use async_trait::async_trait;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::rule_based(Arc::new(ScoringProfile::default())).unwrap()
    }

    fn request(session_id: Uuid, question_index: usize, text: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            session_id,
            question_index,
            response_text: text.to_string(),
        }
    }

    async fn asked(engine: &AnalysisEngine, id: Uuid, text: &str, qt: QuestionType) -> usize {
        let index = engine.add_question(id, text, qt).await.unwrap();
        engine.mark_asked(id, index).await.unwrap();
        index
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let engine = engine();
        let id = engine.create_session(Some("platform team".into())).await.unwrap();

        let q0 = asked(&engine, id, "How would you scale a write-heavy database?", QuestionType::Technical).await;
        let q1 = asked(&engine, id, "Tell me about a conflict on your team.", QuestionType::Behavioral).await;
        let q2 = asked(&engine, id, "What would you do if a deploy broke checkout?", QuestionType::Situational).await;

        engine
            .analyze(&request(id, q0, "First, I would shard the database by tenant because writes dominate; latency dropped 30% last time."))
            .await
            .unwrap();
        engine
            .analyze(&request(id, q1, "I led the discussion. Looking back, I learned to listen first. As a result we shipped on time."))
            .await
            .unwrap();
        engine
            .analyze(&request(id, q2, "I would roll back the deploy first, then investigate the checkout errors."))
            .await
            .unwrap();

        let summary = engine.summarize(id).await.unwrap();
        assert_eq!(summary.answered_questions, 3);
        assert!(!summary.is_final);
        let relevance = &summary.dimensions[&Dimension::from("relevance")];
        assert_eq!(relevance.samples, 3);
        assert_eq!(relevance.trend, Trend::InsufficientData);
        assert!(summary.dimensions.contains_key(&Dimension::from("self-reflection")));
        assert!(summary.dimensions.contains_key(&Dimension::from("judgment")));

        engine.end_session(id).await.unwrap();
        let summary = engine.summarize(id).await.unwrap();
        assert!(summary.is_final);

        assert!(matches!(
            engine.add_question(id, "One more?", QuestionType::Technical).await,
            Err(EngineError::SessionClosed(_))
        ));
        assert!(matches!(
            engine.reanalyze(id, q0).await,
            Err(EngineError::SessionClosed(_))
        ));
        assert!(matches!(
            engine.end_session(id).await,
            Err(EngineError::SessionClosed(_))
        ));
    }

    #[tokio::test]
    async fn unknown_session_and_question_are_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.analyze(&request(Uuid::new_v4(), 0, "hi")).await,
            Err(EngineError::NotFound(_))
        ));
        let id = engine.create_session(None).await.unwrap();
        assert!(matches!(
            engine.analyze(&request(id, 7, "hi")).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn summary_before_any_analysis_is_empty_session() {
        let engine = engine();
        let id = engine.create_session(None).await.unwrap();
        asked(&engine, id, "Why Rust?", QuestionType::Technical).await;
        assert!(matches!(
            engine.summarize(id).await,
            Err(EngineError::EmptySession(e)) if e == id
        ));
    }

    #[tokio::test]
    async fn failed_analysis_leaves_session_unchanged() {
        let engine = engine();
        let id = engine.create_session(None).await.unwrap();
        let index = engine
            .add_question(id, "Explain backpressure.", QuestionType::Technical)
            .await
            .unwrap();
        let before = engine.get_session(id).await.unwrap();

        let err = engine
            .analyze(&request(id, index, "Queues fill up, so producers slow down."))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
        assert_eq!(engine.get_session(id).await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_analysis_of_one_question_records_once() {
        let engine = Arc::new(engine());
        let id = engine.create_session(None).await.unwrap();
        let index = asked(&engine, id, "Explain consistent hashing.", QuestionType::Technical).await;

        let a = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .analyze(&request(id, index, "Keys map to a ring of virtual nodes."))
                    .await
            })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .analyze(&request(id, index, "Because rebalancing moves few keys."))
                    .await
            })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::StateConflict(_))))
            .count();
        assert_eq!((ok, conflicts), (1, 1));

        let session = engine.get_session(id).await.unwrap();
        assert_eq!(session.questions()[index].analyses().len(), 1);
    }

    #[tokio::test]
    async fn sessions_are_analyzed_independently() {
        let engine = engine();
        let mut targets = Vec::new();
        for i in 0..8 {
            let id = engine.create_session(Some(format!("loop {i}"))).await.unwrap();
            let index = asked(&engine, id, "Explain a B-tree.", QuestionType::Technical).await;
            targets.push((id, index));
        }

        let results = futures::future::join_all(targets.iter().map(|&(id, index)| {
            let engine = &engine;
            async move {
                engine
                    .analyze(&request(id, index, "A balanced tree with wide nodes."))
                    .await
            }
        }))
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        for (id, _) in targets {
            assert_eq!(engine.summarize(id).await.unwrap().answered_questions, 1);
        }
    }

    #[tokio::test]
    async fn reanalysis_is_versioned_and_summarized_once() {
        let engine = engine();
        let id = engine.create_session(None).await.unwrap();
        let index = asked(&engine, id, "Describe a time you failed.", QuestionType::Behavioral).await;
        engine
            .analyze(&request(id, index, "I should have tested more. I learned a lot."))
            .await
            .unwrap();

        let v2 = engine.reanalyze(id, index).await.unwrap();
        assert_eq!(v2.version, 2);

        let session = engine.get_session(id).await.unwrap();
        let question = &session.questions()[index];
        assert_eq!(question.state(), QuestionState::Reanalyzed);
        assert_eq!(question.analyses().len(), 2);

        let summary = engine.summarize(id).await.unwrap();
        assert_eq!(summary.answered_questions, 1);
    }

    struct BrokenStrategy;

    #[async_trait]
    impl ScoringStrategy for BrokenStrategy {
        fn name(&self) -> &str {
            "broken"
        }
        async fn score(&self, _: &ScoringRequest) -> anyhow::Result<DimensionScores> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn strategy_failure_is_recorded_as_fallback() {
        let profile = Arc::new(ScoringProfile::default());
        let engine = AnalysisEngine::new(
            Arc::new(InMemorySessionStore::new()),
            profile,
            Arc::new(BrokenStrategy),
            EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(engine.strategy_name(), "broken");

        let id = engine.create_session(None).await.unwrap();
        let index = asked(&engine, id, "What is a mutex?", QuestionType::Technical).await;
        let analysis = engine
            .analyze(&request(id, index, "A mutex is a lock guarding shared memory."))
            .await
            .unwrap();
        assert!(analysis.fallback_used);

        let stored = engine.get_session(id).await.unwrap();
        assert!(stored.questions()[index].analysis().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected_at_construction() {
        let mut profile = ScoringProfile::default();
        profile.thresholds.strength = 10.0;
        assert!(matches!(
            AnalysisEngine::rule_based(Arc::new(profile)),
            Err(EngineError::InvalidProfile(_))
        ));
    }

    #[tokio::test]
    async fn deleted_session_is_gone() {
        let engine = engine();
        let id = engine.create_session(None).await.unwrap();
        engine.delete_session(id).await.unwrap();
        assert!(matches!(engine.get_session(id).await, Err(EngineError::NotFound(_))));
    }

    fn gate_count(engine: &AnalysisEngine) -> usize {
        engine.gates.lock().unwrap().len()
    }

    #[tokio::test]
    async fn unknown_sessions_leave_no_gates_behind() {
        let engine = engine();
        for _ in 0..200 {
            let id = Uuid::new_v4();
            assert!(matches!(
                engine.analyze(&request(id, 0, "hi")).await,
                Err(EngineError::NotFound(_))
            ));
            assert!(matches!(engine.mark_asked(id, 0).await, Err(EngineError::NotFound(_))));
            assert!(matches!(
                engine.add_question(id, "Why?", QuestionType::Technical).await,
                Err(EngineError::NotFound(_))
            ));
        }
        assert_eq!(gate_count(&engine), 0);

        let id = engine.create_session(None).await.unwrap();
        asked(&engine, id, "What is a WAL?", QuestionType::Technical).await;
        engine.end_session(id).await.unwrap();
        engine.delete_session(id).await.unwrap();
        assert_eq!(gate_count(&engine), 0);
    }

    #[tokio::test]
    async fn waiters_keep_the_session_gate() {
        let engine = Arc::new(engine());
        let id = engine.create_session(None).await.unwrap();
        let refs = |engine: &AnalysisEngine| {
            engine.gates.lock().unwrap().get(&id).map(Arc::strong_count)
        };

        let guard = engine.lock(id).await.unwrap();
        let held = refs(&*engine);
        let waiter = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .add_question(id, "Explain MVCC.", QuestionType::Technical)
                    .await
            })
        };
        while refs(&*engine) == held {
            tokio::task::yield_now().await;
        }

        drop(guard);
        assert_eq!(gate_count(&engine), 1);
        assert_eq!(waiter.await.unwrap().unwrap(), 0);
        assert_eq!(gate_count(&engine), 0);
    }

    #[tokio::test]
    async fn deleting_under_a_waiter_reports_not_found() {
        let engine = Arc::new(engine());
        let id = engine.create_session(None).await.unwrap();
        let refs = |engine: &AnalysisEngine| {
            engine.gates.lock().unwrap().get(&id).map(Arc::strong_count)
        };

        let guard = engine.lock(id).await.unwrap();
        let held = refs(&*engine);
        let waiter = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.delete_session(id).await })
        };
        while refs(&*engine) == held {
            tokio::task::yield_now().await;
        }
        engine.store.delete(id).await.unwrap();
        drop(guard);

        assert!(matches!(waiter.await.unwrap(), Err(EngineError::NotFound(_))));
        assert_eq!(gate_count(&engine), 0);
    }

    #[tokio::test]
    async fn imported_session_can_be_summarized() {
        let source = engine();
        let id = source.create_session(None).await.unwrap();
        let index = asked(&source, id, "Why use an index?", QuestionType::Technical).await;
        source
            .analyze(&request(id, index, "Because queries scan fewer rows."))
            .await
            .unwrap();
        let session = source.get_session(id).await.unwrap();

        let target = engine();
        target.import_session(session).await.unwrap();
        assert_eq!(target.summarize(id).await.unwrap().answered_questions, 1);
    }
}
