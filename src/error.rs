//! Error types for the kinetic blueprint engine

use thiserror::Error;

/// Errors that can occur while assessing a recording
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// Malformed or truncated pose sequence. The caller should ask for a new recording.
    #[error("Invalid pose sequence: {0}")]
    InvalidSequence(String),

    /// The detector signal was unusable throughout the recording.
    #[error("Insufficient pose data: {0}")]
    InsufficientPoseData(String),

    /// Missing identifiers or malformed hashes handed to the proof chain.
    #[error("Invalid proof input: {0}")]
    InvalidProofInput(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AssessmentError {
    /// True for rejections caused by the recording itself (re-recording may help).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AssessmentError::InvalidSequence(_) | AssessmentError::InsufficientPoseData(_)
        )
    }
}
