//! Submission report: ranking, feedback and badges for a frozen assessment

use crate::types::{Assessment, RankCategory, Ranking, TestType};
use serde::{Deserialize, Serialize};

impl Ranking {
    /// Ranking band for a 0-100 score
    pub fn from_score(score: f64) -> Self {
        let (percentile, category) = match score {
            s if s >= 90.0 => (95, RankCategory::Elite),
            s if s >= 80.0 => (85, RankCategory::Advanced),
            s if s >= 70.0 => (70, RankCategory::Intermediate),
            s if s >= 60.0 => (50, RankCategory::Beginner),
            _ => (25, RankCategory::Novice),
        };
        Self {
            percentile,
            category,
        }
    }
}

impl Assessment {
    /// Composite score the report and ranking are based on
    pub fn score(&self) -> f64 {
        self.ai_analysis.biomechanical_score
    }

    /// Attach the ranking derived from the frozen score.
    ///
    /// This is the only change made to an assessment after creation and does
    /// not touch any hashed field.
    pub fn with_ranking(mut self) -> Self {
        self.ranking = Some(Ranking::from_score(self.score()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    #[serde(rename = "Gold Performance")]
    GoldPerformance,
    #[serde(rename = "Silver Performance")]
    SilverPerformance,
    #[serde(rename = "Fair Play")]
    FairPlay,
    #[serde(rename = "Perfect Form")]
    PerfectForm,
}

/// Mean detector confidence that earns the Perfect Form badge
const PERFECT_FORM_CONFIDENCE: f64 = 0.95;

pub fn badges(assessment: &Assessment) -> Vec<Badge> {
    let score = assessment.score();
    let mut badges = Vec::new();
    if score >= 90.0 {
        badges.push(Badge::GoldPerformance);
    }
    if score >= 80.0 {
        badges.push(Badge::SilverPerformance);
    }
    if !assessment.ai_analysis.cheat_detected {
        badges.push(Badge::FairPlay);
    }
    if assessment.ai_analysis.confidence_score >= PERFECT_FORM_CONFIDENCE {
        badges.push(Badge::PerfectForm);
    }
    badges
}

pub fn feedback(score: f64, test_type: TestType) -> String {
    if score >= 90.0 {
        format!("Excellent {test_type} performance! You're in the top 10% nationally.")
    } else if score >= 70.0 {
        format!("Good {test_type} form. Focus on consistency to improve further.")
    } else {
        format!(
            "Keep practicing your {test_type} technique. Consider working on flexibility and strength."
        )
    }
}

/// Summary returned to the athlete after a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub assessment_id: String,
    pub score: f64,
    pub ranking: Ranking,
    pub feedback: String,
    pub badges: Vec<Badge>,
    pub proof_hash: String,
}

impl SubmissionReport {
    pub fn from_assessment(assessment: &Assessment) -> Self {
        let score = assessment.score();
        Self {
            assessment_id: assessment.id.clone(),
            score,
            ranking: assessment
                .ranking
                .unwrap_or_else(|| Ranking::from_score(score)),
            feedback: feedback(score, assessment.test_type),
            badges: badges(assessment),
            proof_hash: assessment.proof_chain.hash.clone(),
        }
    }
}
