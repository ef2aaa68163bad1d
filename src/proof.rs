//! Proof-of-performance chain
//!
//! Each assessment carries `sha256(hash_input(..))` over its identifying
//! fields plus the hash of the athlete's previous assessment. Anyone holding
//! the stored record can recompute the hash, and anyone holding an athlete's
//! ordered history can check the links.

use crate::error::AssessmentError;
use crate::types::{Assessment, ProofChain, TestType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Exact string hashed into `proofChain.hash`:
/// `"{assessmentId}|{athleteId}|{testType}|{createdAtMillis}"`
pub fn hash_input(
    assessment_id: &str,
    athlete_id: &str,
    test_type: TestType,
    created_at: DateTime<Utc>,
) -> Result<String, AssessmentError> {
    require_id("assessment id", assessment_id)?;
    require_id("athlete id", athlete_id)?;
    Ok(format!(
        "{}|{}|{}|{}",
        assessment_id,
        athlete_id,
        test_type.as_str(),
        created_at.timestamp_millis()
    ))
}

fn require_id(name: &str, value: &str) -> Result<(), AssessmentError> {
    if value.trim().is_empty() {
        return Err(AssessmentError::InvalidProofInput(format!("{name} is empty")));
    }
    if value.contains('|') {
        return Err(AssessmentError::InvalidProofInput(format!(
            "{name} must not contain '|'"
        )));
    }
    Ok(())
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Reject a previous hash that is not a hex SHA-256 digest
pub fn check_previous_hash(previous_hash: &str) -> Result<(), AssessmentError> {
    if is_sha256_hex(previous_hash) {
        Ok(())
    } else {
        Err(AssessmentError::InvalidProofInput(format!(
            "previous hash is not a hex SHA-256 digest: {previous_hash:?}"
        )))
    }
}

/// Lowercase hex SHA-256 of the hash input
pub fn compute_hash(
    assessment_id: &str,
    athlete_id: &str,
    test_type: TestType,
    created_at: DateTime<Utc>,
) -> Result<String, AssessmentError> {
    let input = hash_input(assessment_id, athlete_id, test_type, created_at)?;
    Ok(hex::encode(Sha256::digest(input.as_bytes())))
}

/// Build the proof link for a new assessment
pub fn build_proof(
    assessment_id: &str,
    athlete_id: &str,
    test_type: TestType,
    created_at: DateTime<Utc>,
    previous_hash: Option<&str>,
) -> Result<ProofChain, AssessmentError> {
    if let Some(previous) = previous_hash {
        check_previous_hash(previous)?;
    }

    let hash = compute_hash(assessment_id, athlete_id, test_type, created_at)?;
    debug!(assessment_id, athlete_id, %hash, "proof created");

    Ok(ProofChain {
        hash,
        previous_hash: previous_hash.map(str::to_ascii_lowercase),
        integrity: true,
    })
}

/// Recompute the hash from the stored fields and compare
pub fn verify(assessment: &Assessment) -> bool {
    let recomputed = compute_hash(
        &assessment.id,
        &assessment.athlete_id,
        assessment.test_type,
        assessment.created_at,
    );
    match recomputed {
        Ok(hash) => assessment.proof_chain.integrity && hash == assessment.proof_chain.hash,
        Err(err) => {
            warn!(assessment_id = %assessment.id, error = %err, "proof verification failed");
            false
        }
    }
}

/// Where an athlete's chain stops checking out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreak {
    /// Stored hash does not match the recomputed one
    #[serde(rename_all = "camelCase")]
    HashMismatch { position: usize, assessment_id: String },
    /// `previousHash` does not point at the preceding record
    #[serde(rename_all = "camelCase")]
    BrokenLink { position: usize, assessment_id: String },
    /// Record belongs to another athlete
    #[serde(rename_all = "camelCase")]
    ForeignRecord { position: usize, assessment_id: String },
}

/// First defect in an athlete's chronologically ordered history, if any.
///
/// The first record's `previousHash` is not checked, so a verified suffix of
/// a longer history still passes.
pub fn find_chain_break(records: &[Assessment]) -> Option<ChainBreak> {
    let athlete_id = records.first().map(|r| r.athlete_id.as_str())?;

    for (position, record) in records.iter().enumerate() {
        let assessment_id = record.id.clone();
        if record.athlete_id != athlete_id {
            return Some(ChainBreak::ForeignRecord {
                position,
                assessment_id,
            });
        }
        if !verify(record) {
            return Some(ChainBreak::HashMismatch {
                position,
                assessment_id,
            });
        }
        if position > 0 {
            let expected = &records[position - 1].proof_chain.hash;
            if record.proof_chain.previous_hash.as_deref() != Some(expected.as_str()) {
                return Some(ChainBreak::BrokenLink {
                    position,
                    assessment_id,
                });
            }
        }
    }
    None
}

/// True when every record verifies and links to its predecessor
pub fn verify_chain(records: &[Assessment]) -> bool {
    find_chain_break(records).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AiAnalysis, KineticBlueprint, MetricDetail, Technique, TestMetrics};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn created_at(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + offset_ms).unwrap()
    }

    fn record(id: &str, athlete: &str, at: DateTime<Utc>, previous: Option<&str>) -> Assessment {
        let proof_chain = build_proof(id, athlete, TestType::Squat, at, previous).unwrap();
        Assessment {
            id: id.to_string(),
            athlete_id: athlete.to_string(),
            test_type: TestType::Squat,
            created_at: at,
            ai_analysis: AiAnalysis {
                pose_points: vec![],
                rep_count: 0,
                biomechanical_score: 0.0,
                cheat_detected: false,
                cheat_reasons: vec![],
                confidence_score: 0.9,
                quality_flags: vec![],
            },
            kinetic_blueprint: KineticBlueprint {
                joint_angles: BTreeMap::new(),
                movement_pattern: vec![],
                signature: String::new(),
            },
            performance_metrics: TestMetrics {
                score: 0.0,
                technique: Technique::Undetermined,
                detail: MetricDetail::Squat {
                    squat_depth_deg: 0.0,
                    min_knee_angle_deg: None,
                    knee_alignment: 0.0,
                    rep_count: 0,
                },
            },
            proof_chain,
            ranking: None,
        }
    }

    fn chain(len: usize) -> Vec<Assessment> {
        let mut records: Vec<Assessment> = Vec::new();
        for i in 0..len {
            let previous = records.last().map(|r| r.proof_chain.hash.clone());
            records.push(record(
                &format!("assessment-{i}"),
                "athlete-1",
                created_at(i as i64 * 1000),
                previous.as_deref(),
            ));
        }
        records
    }

    #[test]
    fn test_hash_input_format() {
        let input = hash_input("a-1", "athlete-7", TestType::PushUp, created_at(0)).unwrap();
        assert_eq!(input, "a-1|athlete-7|push-up|1700000000000");
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let proof = build_proof("a-1", "athlete-7", TestType::Sprint, created_at(0), None).unwrap();
        assert!(is_sha256_hex(&proof.hash));
        assert!(proof.integrity);
        assert!(proof.previous_hash.is_none());

        let again = build_proof("a-1", "athlete-7", TestType::Sprint, created_at(0), None).unwrap();
        assert_eq!(proof, again);
    }

    #[test]
    fn test_rejects_missing_ids() {
        let err = hash_input(" ", "athlete", TestType::Squat, created_at(0)).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidProofInput(_)));
        assert!(hash_input("a-1", "", TestType::Squat, created_at(0)).is_err());
        assert!(hash_input("a|1", "athlete", TestType::Squat, created_at(0)).is_err());
    }

    #[test]
    fn test_rejects_malformed_previous_hash() {
        let err = build_proof("a-1", "athlete", TestType::Squat, created_at(0), Some("nope"))
            .unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidProofInput(_)));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut assessment = record("a-1", "athlete-1", created_at(0), None);
        assert!(verify(&assessment));

        assessment.athlete_id = "athlete-2".to_string();
        assert!(!verify(&assessment));
    }

    #[test]
    fn test_verify_survives_json() {
        let assessment = record("a-1", "athlete-1", created_at(123), None);
        let json = serde_json::to_string(&assessment).unwrap();
        let back: Assessment = serde_json::from_str(&json).unwrap();
        assert!(verify(&back));
    }

    #[test]
    fn test_chain_verification() {
        let records = chain(4);
        assert!(verify_chain(&records));
        assert!(verify_chain(&records[2..]));
        assert!(verify_chain(&[]));
    }

    #[test]
    fn test_chain_break_is_located() {
        let mut records = chain(3);
        records.remove(1);
        assert_eq!(
            find_chain_break(&records),
            Some(ChainBreak::BrokenLink {
                position: 1,
                assessment_id: "assessment-2".to_string()
            })
        );

        let mut records = chain(3);
        records[2].created_at = created_at(99_999);
        assert!(matches!(
            find_chain_break(&records),
            Some(ChainBreak::HashMismatch { position: 2, .. })
        ));

        let mut records = chain(2);
        records.push(record("other", "athlete-2", created_at(5000), None));
        assert!(matches!(
            find_chain_break(&records),
            Some(ChainBreak::ForeignRecord { position: 2, .. })
        ));
    }
}
