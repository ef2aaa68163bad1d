//! Kinetic Blueprint - performance validation engine for recorded fitness tests
//!
//! The engine turns a pose-keypoint sequence extracted from a test recording
//! into a tamper-evident assessment through a deterministic pipeline:
//! normalization → kinetic blueprint → test metrics → scoring and cheat
//! detection → proof-of-performance hash chain.
//!
//! ## Modules
//!
//! - **Pipeline**: Pure `assess` function and the stateful `KineticEngine`
//! - **Collaborators**: Signature index (replay detection) and hash ledger
//! - **Proof**: Hash input format, verification and chain verification

pub mod blueprint;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod proof;
pub mod report;
pub mod scoring;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use error::AssessmentError;
pub use index::{EngineStores, HashLedger, InMemoryHashLedger, InMemorySignatureIndex, SignatureIndex};
pub use pipeline::{assess, assess_json, AssessmentRequest, KineticEngine};
pub use proof::{verify, verify_chain};
pub use report::SubmissionReport;
pub use types::{Assessment, AssessmentInput, Joint, Keypoint, PoseFrame, TestType};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in logs and CLI output
pub const PRODUCER_NAME: &str = "kinetic-blueprint";
