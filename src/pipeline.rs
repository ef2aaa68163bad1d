//! Pipeline orchestration
//!
//! This module provides the public API of the engine. It runs a submitted
//! recording through every stage and freezes the result into an assessment.
//!
//! Pipeline stages:
//! 1. PoseNormalizer - Validate frames and drop low-confidence keypoints
//! 2. BlueprintGenerator - Joint angles, movement pattern, signature
//! 3. metrics::extract - Test-specific metrics and raw score
//! 4. AnomalyDetector + composite_score - Cheat verdict and final score
//! 5. proof::build_proof - Hash-chained proof of performance

use crate::blueprint::BlueprintGenerator;
use crate::config::EngineConfig;
use crate::error::AssessmentError;
use crate::index::{
    EngineStores, HashLedger, InMemoryHashLedger, InMemorySignatureIndex, SignatureIndex,
};
use crate::metrics;
use crate::normalizer::PoseNormalizer;
use crate::proof;
use crate::report::SubmissionReport;
use crate::scoring::{composite_score, AnomalyDetector, CheatVerdict};
use crate::types::{
    AiAnalysis, Assessment, AssessmentInput, CheatReason, KineticBlueprint, NormalizedSequence,
    TestMetrics,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// Identity and chain context for one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssessmentRequest {
    pub athlete_id: String,
    /// Generated (UUID v4) when absent
    pub assessment_id: Option<String>,
    /// Current time when absent
    pub created_at: Option<DateTime<Utc>>,
    /// Hash of the athlete's most recent prior assessment
    pub previous_hash: Option<String>,
}

impl AssessmentRequest {
    pub fn new(athlete_id: impl Into<String>) -> Self {
        Self {
            athlete_id: athlete_id.into(),
            ..Self::default()
        }
    }

    pub fn with_assessment_id(mut self, assessment_id: impl Into<String>) -> Self {
        self.assessment_id = Some(assessment_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_previous_hash(mut self, previous_hash: impl Into<String>) -> Self {
        self.previous_hash = Some(previous_hash.into());
        self
    }
}

/// Stage outputs before the assessment is frozen
struct Analysis {
    assessment_id: String,
    created_at: DateTime<Utc>,
    sequence: NormalizedSequence,
    blueprint: KineticBlueprint,
    metrics: TestMetrics,
    verdict: CheatVerdict,
}

fn analyze(
    input: AssessmentInput,
    request: &AssessmentRequest,
    signatures: &dyn SignatureIndex,
    config: &EngineConfig,
) -> Result<Analysis, AssessmentError> {
    let assessment_id = request
        .assessment_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = request.created_at.unwrap_or_else(Utc::now);

    // Fail on bad identifiers before doing any work
    proof::hash_input(
        &assessment_id,
        &request.athlete_id,
        input.test_type,
        created_at,
    )?;
    if let Some(previous) = &request.previous_hash {
        proof::check_previous_hash(previous)?;
    }

    // Stage 1: Normalize the pose sequence
    let sequence = PoseNormalizer::normalize(input, &config.normalizer)?;

    // Stage 2: Generate the kinetic blueprint
    let blueprint = BlueprintGenerator::generate(&sequence, &config.blueprint)?;

    // Stage 3: Extract test metrics
    let metrics = metrics::extract(sequence.test_type, &blueprint, &config.metrics);

    // Stage 4: Anomaly checks (read-only on the index)
    let verdict = AnomalyDetector::evaluate(
        &sequence,
        &metrics,
        &blueprint.signature,
        &assessment_id,
        signatures,
        config,
    );

    Ok(Analysis {
        assessment_id,
        created_at,
        sequence,
        blueprint,
        metrics,
        verdict,
    })
}

fn freeze(
    analysis: Analysis,
    athlete_id: &str,
    previous_hash: Option<&str>,
    config: &EngineConfig,
) -> Result<Assessment, AssessmentError> {
    let Analysis {
        assessment_id,
        created_at,
        sequence,
        blueprint,
        metrics,
        verdict,
    } = analysis;

    let confidence_score = sequence.mean_confidence();
    let biomechanical_score = composite_score(
        metrics.score,
        confidence_score,
        verdict.cheat_detected,
        &config.scoring,
    );

    // Stage 5: Proof of performance
    let proof_chain = proof::build_proof(
        &assessment_id,
        athlete_id,
        sequence.test_type,
        created_at,
        previous_hash,
    )?;

    info!(
        %assessment_id,
        test_type = %sequence.test_type,
        score = biomechanical_score,
        cheat_detected = verdict.cheat_detected,
        "assessment created"
    );

    Ok(Assessment {
        id: assessment_id,
        athlete_id: athlete_id.to_string(),
        test_type: sequence.test_type,
        created_at,
        ai_analysis: AiAnalysis {
            rep_count: metrics.rep_count(),
            biomechanical_score,
            cheat_detected: verdict.cheat_detected,
            cheat_reasons: verdict.reasons,
            confidence_score,
            quality_flags: sequence.quality_flags,
            pose_points: sequence.frames,
        },
        kinetic_blueprint: blueprint,
        performance_metrics: metrics,
        proof_chain,
        ranking: None,
    })
}

/// Assess one recording.
///
/// Pure apart from reading `signatures`: nothing is registered and no ledger
/// is touched. Use [`KineticEngine`] to also claim the signature and extend
/// the athlete's chain. Fails with `InvalidConfig` before any analysis when
/// `config` does not validate.
pub fn assess(
    input: AssessmentInput,
    request: &AssessmentRequest,
    signatures: &dyn SignatureIndex,
    config: &EngineConfig,
) -> Result<Assessment, AssessmentError> {
    config.validate()?;
    let analysis = analyze(input, request, signatures, config)?;
    freeze(
        analysis,
        &request.athlete_id,
        request.previous_hash.as_deref(),
        config,
    )
}

/// JSON in, JSON out variant of [`assess`] with an empty signature index
pub fn assess_json(
    input_json: &str,
    request: &AssessmentRequest,
    config: &EngineConfig,
) -> Result<String, AssessmentError> {
    let input: AssessmentInput = serde_json::from_str(input_json)?;
    let assessment = assess(input, request, &InMemorySignatureIndex::new(), config)?;
    Ok(serde_json::to_string(&assessment)?)
}

/// Stateful engine that owns the signature index and the hash ledger.
///
/// Safe to share across threads behind an `Arc`; concurrent submissions of
/// the same clip produce at most one clean assessment.
pub struct KineticEngine {
    config: EngineConfig,
    signatures: Arc<dyn SignatureIndex>,
    ledger: Arc<dyn HashLedger>,
    /// Serializes previous-hash lookup and append so chains never fork
    chain_lock: Mutex<()>,
}

impl Default for KineticEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            signatures: Arc::new(InMemorySignatureIndex::new()),
            ledger: Arc::new(InMemoryHashLedger::new()),
            chain_lock: Mutex::new(()),
        }
    }
}

impl KineticEngine {
    /// Create an engine with in-memory collaborators
    pub fn new(config: EngineConfig) -> Result<Self, AssessmentError> {
        Self::with_collaborators(
            config,
            Arc::new(InMemorySignatureIndex::new()),
            Arc::new(InMemoryHashLedger::new()),
        )
    }

    /// Create an engine backed by caller-provided stores
    pub fn with_collaborators(
        config: EngineConfig,
        signatures: Arc<dyn SignatureIndex>,
        ledger: Arc<dyn HashLedger>,
    ) -> Result<Self, AssessmentError> {
        config.validate()?;
        Ok(Self {
            config,
            signatures,
            ledger,
            chain_lock: Mutex::new(()),
        })
    }

    /// Create an engine backed by in-memory stores the caller can persist
    pub fn with_stores(config: EngineConfig, stores: &EngineStores) -> Result<Self, AssessmentError> {
        Self::with_collaborators(config, stores.signatures.clone(), stores.ledger.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn signatures(&self) -> &Arc<dyn SignatureIndex> {
        &self.signatures
    }

    pub fn ledger(&self) -> &Arc<dyn HashLedger> {
        &self.ledger
    }

    /// Assess a recording for `athlete_id` and record it
    pub fn submit(
        &self,
        input: AssessmentInput,
        athlete_id: &str,
    ) -> Result<Assessment, AssessmentError> {
        self.submit_request(input, &AssessmentRequest::new(athlete_id))
    }

    /// Assess a recording, claim its signature and extend the athlete's chain.
    ///
    /// A clean assessment registers its signature atomically; if another
    /// assessment claimed it first the verdict becomes a replay. The previous
    /// hash comes from the request when given, otherwise from the ledger.
    pub fn submit_request(
        &self,
        input: AssessmentInput,
        request: &AssessmentRequest,
    ) -> Result<Assessment, AssessmentError> {
        let mut analysis = analyze(input, request, self.signatures.as_ref(), &self.config)?;

        if self.config.anomaly.replay.enabled && !analysis.verdict.cheat_detected {
            let signature = &analysis.blueprint.signature;
            if !self
                .signatures
                .record_signature(signature, &analysis.assessment_id)
            {
                warn!(
                    assessment_id = %analysis.assessment_id,
                    %signature,
                    "signature claimed by a concurrent submission"
                );
                let owner = self.signatures.owner_of(signature);
                analysis
                    .verdict
                    .raise(CheatReason::ReplayedSignature { owner });
            }
        }

        let _chain = self
            .chain_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous_hash = request
            .previous_hash
            .clone()
            .or_else(|| self.ledger.previous_hash(&request.athlete_id));
        let assessment = freeze(
            analysis,
            &request.athlete_id,
            previous_hash.as_deref(),
            &self.config,
        )?;
        self.ledger
            .append(&assessment.athlete_id, &assessment.proof_chain.hash);

        Ok(assessment.with_ranking())
    }

    /// Submit from JSON and return the assessment as JSON
    pub fn submit_json(&self, input_json: &str, athlete_id: &str) -> Result<String, AssessmentError> {
        let input: AssessmentInput = serde_json::from_str(input_json)?;
        let assessment = self.submit(input, athlete_id)?;
        Ok(serde_json::to_string(&assessment)?)
    }

    /// Submit and summarize for the athlete
    pub fn submit_with_report(
        &self,
        input: AssessmentInput,
        athlete_id: &str,
    ) -> Result<(Assessment, SubmissionReport), AssessmentError> {
        let assessment = self.submit(input, athlete_id)?;
        let report = SubmissionReport::from_assessment(&assessment);
        Ok((assessment, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Joint, Keypoint, PoseFrame, TestType};
    use chrono::TimeZone;
    use std::thread;

    const FPS: f64 = 30.0;

    /// Upright figure lifted by `rise` metres
    fn standing_frame(index: u32, rise: f64, confidence: f64) -> PoseFrame {
        let body = [
            (Joint::Nose, 0.0, 0.1),
            (Joint::LeftShoulder, -0.2, 0.4),
            (Joint::RightShoulder, 0.2, 0.4),
            (Joint::LeftElbow, -0.2, 0.7),
            (Joint::RightElbow, 0.2, 0.7),
            (Joint::LeftWrist, -0.2, 1.0),
            (Joint::RightWrist, 0.2, 1.0),
            (Joint::LeftHip, -0.15, 0.9),
            (Joint::RightHip, 0.15, 0.9),
            (Joint::LeftKnee, -0.15, 1.3),
            (Joint::RightKnee, 0.15, 1.3),
            (Joint::LeftAnkle, -0.15, 1.7),
            (Joint::RightAnkle, 0.15, 1.7),
        ];
        body.iter().fold(
            PoseFrame::new(index, index as f64 / FPS),
            |frame, (joint, x, y)| frame.with_keypoint(*joint, Keypoint::new(*x, y - rise, confidence)),
        )
    }

    fn jump_input(confidence: f64) -> AssessmentInput {
        let frames = (0..30u32)
            .map(|i| {
                let rise = if (5..=25).contains(&i) {
                    0.5 * (std::f64::consts::PI * (i - 5) as f64 / 20.0).sin()
                } else {
                    0.0
                };
                standing_frame(i, rise, confidence)
            })
            .collect();
        AssessmentInput {
            test_type: TestType::VerticalJump,
            declared_duration_seconds: 1.0,
            distance_meters: None,
            frames,
        }
    }

    fn request(id: &str) -> AssessmentRequest {
        AssessmentRequest::new("athlete-1")
            .with_assessment_id(id)
            .with_created_at(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    #[test]
    fn test_assess_vertical_jump() {
        let assessment = assess(
            jump_input(0.9),
            &request("a-1"),
            &InMemorySignatureIndex::new(),
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(assessment.id, "a-1");
        assert_eq!(assessment.test_type, TestType::VerticalJump);
        assert!(!assessment.ai_analysis.cheat_detected);
        assert!((assessment.ai_analysis.confidence_score - 0.9).abs() < 1e-9);
        assert_eq!(assessment.ai_analysis.rep_count, 1);
        assert_eq!(assessment.ai_analysis.pose_points.len(), 30);
        assert!(assessment.ranking.is_none());
        assert!(proof::verify(&assessment));

        let score = assessment.ai_analysis.biomechanical_score;
        assert!((60.0..=90.0).contains(&score), "score {score}");
    }

    #[test]
    fn test_assess_is_deterministic() {
        let config = EngineConfig::default();
        let index = InMemorySignatureIndex::new();
        let a = assess(jump_input(0.9), &request("a-1"), &index, &config).unwrap();
        let b = assess(jump_input(0.9), &request("a-1"), &index, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_ids_fail_before_analysis() {
        let err = assess(
            jump_input(0.9),
            &AssessmentRequest::new(""),
            &InMemorySignatureIndex::new(),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidProofInput(_)));
    }

    #[test]
    fn test_assess_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.scoring.cheat_penalty = 15.0;
        let err = assess(
            jump_input(0.5),
            &request("a-1"),
            &InMemorySignatureIndex::new(),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidConfig(_)));

        let input_json = serde_json::to_string(&jump_input(0.9)).unwrap();
        let err = assess_json(&input_json, &request("a-1"), &config).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let mut input = jump_input(0.9);
        input.frames.clear();
        let err = assess(
            input,
            &request("a-1"),
            &InMemorySignatureIndex::new(),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidSequence(_)));
    }

    #[test]
    fn test_engine_flags_replay_and_chains_hashes() {
        let engine = KineticEngine::default();

        let first = engine.submit(jump_input(0.9), "athlete-1").unwrap();
        assert!(!first.ai_analysis.cheat_detected);
        assert!(first.proof_chain.previous_hash.is_none());
        assert!(first.ranking.is_some());

        let second = engine.submit(jump_input(0.9), "athlete-1").unwrap();
        assert!(second.ai_analysis.cheat_detected);
        assert_eq!(
            second.ai_analysis.cheat_reasons,
            vec![CheatReason::ReplayedSignature {
                owner: Some(first.id.clone())
            }]
        );
        assert_eq!(
            second.proof_chain.previous_hash.as_deref(),
            Some(first.proof_chain.hash.as_str())
        );
        assert!(proof::verify_chain(&[first, second]));
    }

    #[test]
    fn test_concurrent_identical_submissions() {
        let engine = Arc::new(KineticEngine::default());
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine
                        .submit(jump_input(0.9), &format!("athlete-{i}"))
                        .unwrap()
                })
            })
            .collect();

        let clean = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| !a.ai_analysis.cheat_detected)
            .count();
        assert_eq!(clean, 1);
    }

    #[test]
    fn test_submit_json() {
        let engine = KineticEngine::default();
        let input_json = serde_json::to_string(&jump_input(0.9)).unwrap();
        let json = engine.submit_json(&input_json, "athlete-1").unwrap();
        let assessment: Assessment = serde_json::from_str(&json).unwrap();
        assert!(proof::verify(&assessment));

        assert!(matches!(
            engine.submit_json("{", "athlete-1"),
            Err(AssessmentError::JsonError(_))
        ));
    }

    #[test]
    fn test_submit_with_report() {
        let engine = KineticEngine::default();
        let (assessment, report) = engine.submit_with_report(jump_input(0.9), "athlete-1").unwrap();
        assert_eq!(report.assessment_id, assessment.id);
        assert_eq!(report.proof_hash, assessment.proof_chain.hash);
        assert_eq!(Some(report.ranking), assessment.ranking);
    }

    #[test]
    fn test_stores_persist_across_engines() {
        let stores = EngineStores::new();
        let engine = KineticEngine::with_stores(EngineConfig::default(), &stores).unwrap();
        let first = engine.submit(jump_input(0.9), "athlete-1").unwrap();

        let reloaded = EngineStores::from_json(&stores.to_json().unwrap()).unwrap();
        let engine = KineticEngine::with_stores(EngineConfig::default(), &reloaded).unwrap();
        let second = engine.submit(jump_input(0.9), "athlete-1").unwrap();

        assert!(second.ai_analysis.cheat_detected);
        assert_eq!(
            second.proof_chain.previous_hash.as_deref(),
            Some(first.proof_chain.hash.as_str())
        );
    }

    #[test]
    fn test_bad_previous_hash_claims_nothing() {
        let engine = KineticEngine::default();
        let request = AssessmentRequest::new("athlete-1").with_previous_hash("not-a-hash");
        let err = engine.submit_request(jump_input(0.9), &request).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidProofInput(_)));

        let retry = engine.submit(jump_input(0.9), "athlete-1").unwrap();
        assert!(!retry.ai_analysis.cheat_detected);
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.scoring.cheat_penalty = 10.0;
        assert!(KineticEngine::new(config).is_err());
    }
}
