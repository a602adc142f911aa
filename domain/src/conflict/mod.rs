//! Conflict detection domain
//!
//! Measures how much worker outputs disagree, independent of what the
//! aggregation strategy will do with the answer.

pub mod detector;
pub mod normalize;

pub use detector::{
    CodeBlockSummary, ConflictAssessment, ConflictDetector, ConflictSeverity, ConflictThresholds,
    ConflictingSection, SectionKind,
};
pub use normalize::{CodeBlock, extract_code_blocks, normalize, passages};
