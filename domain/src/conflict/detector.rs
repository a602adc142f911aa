//! Conflict detection between worker outputs.
//!
//! [`ConflictDetector`] quantifies agreement between two or more successful
//! outputs, independent of which aggregation strategy consumes the result.
//!
//! # Algorithm
//!
//! 1. Normalize every output ([`normalize`])
//! 2. Extract fenced code blocks per output
//! 3. Pairwise character-sequence similarity over normalized text; the
//!    minimum pair is the representative score
//! 4. Map the score to a [`ConflictSeverity`]
//! 5. Report code-block count/language discrepancies as
//!    [`ConflictingSection`]s without touching the severity
//!
//! | Score | Severity |
//! |-------|----------|
//! | identical after normalization, raw text differs | `Formatting` |
//! | ≥ 0.95 | `None` |
//! | ≥ 0.85 | `Minor` |
//! | ≥ 0.60 | `Moderate` |
//! | < 0.60 | `Major` |

use super::normalize::{CodeBlock, extract_code_blocks, normalize};
use crate::work::WorkResult;
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::time::Duration;

/// Severity of disagreement between outputs (ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    None,
    Formatting,
    Minor,
    Moderate,
    Major,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::None => "NONE",
            ConflictSeverity::Formatting => "FORMATTING",
            ConflictSeverity::Minor => "MINOR",
            ConflictSeverity::Moderate => "MODERATE",
            ConflictSeverity::Major => "MAJOR",
        }
    }

    /// Whether outputs say the same thing (possibly formatted differently).
    pub fn is_agreement(&self) -> bool {
        matches!(self, ConflictSeverity::None | ConflictSeverity::Formatting)
    }
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of structural discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    CodeBlockCount,
    CodeBlockLanguages,
}

/// Code-block shape of one worker's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockSummary {
    pub worker_id: String,
    pub block_count: usize,
    pub languages: Vec<String>,
}

/// A structured difference between outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingSection {
    pub kind: SectionKind,
    pub description: String,
    pub per_worker: Vec<CodeBlockSummary>,
}

/// Output of [`ConflictDetector::detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictAssessment {
    pub severity: ConflictSeverity,
    pub workers_involved: Vec<String>,
    /// Minimum pairwise similarity (0.0 - 1.0)
    pub similarity_score: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_sections: Vec<ConflictingSection>,
}

impl ConflictAssessment {
    /// Assessment for fewer than two outputs.
    pub fn insufficient(workers_involved: Vec<String>) -> Self {
        let similarity_score = if workers_involved.is_empty() { 0.0 } else { 1.0 };
        Self {
            severity: ConflictSeverity::None,
            description: format!(
                "Insufficient data for conflict detection: {} successful output(s)",
                workers_involved.len()
            ),
            workers_involved,
            similarity_score,
            conflicting_sections: Vec::new(),
        }
    }
}

/// Similarity thresholds for severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflictThresholds {
    /// At or above: no conflict
    pub none: f64,
    /// At or above: minor conflict
    pub minor: f64,
    /// At or above: moderate conflict; below: major
    pub moderate: f64,
}

impl Default for ConflictThresholds {
    fn default() -> Self {
        Self {
            none: 0.95,
            minor: 0.85,
            moderate: 0.60,
        }
    }
}

/// Compares worker outputs and classifies their disagreement.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    thresholds: ConflictThresholds,
}

/// Upper bound on time spent diffing one pair of outputs.
const DIFF_TIMEOUT: Duration = Duration::from_millis(500);

impl ConflictDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ConflictThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ConflictThresholds {
        &self.thresholds
    }

    /// Similarity of two texts in [0, 1] (character sequence ratio).
    pub fn similarity(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let diff = TextDiff::configure()
            .timeout(DIFF_TIMEOUT)
            .diff_chars(a, b);
        f64::from(diff.ratio())
    }

    /// Assess successful results; failed ones are ignored.
    pub fn assess_results(&self, results: &[WorkResult]) -> ConflictAssessment {
        let outputs: Vec<(&str, &str)> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| (r.worker_label(), r.output.as_str()))
            .collect();
        self.detect(&outputs)
    }

    /// Assess `(worker_id, output)` pairs.
    pub fn detect(&self, outputs: &[(&str, &str)]) -> ConflictAssessment {
        let workers: Vec<String> = outputs.iter().map(|(w, _)| w.to_string()).collect();
        if outputs.len() < 2 {
            return ConflictAssessment::insufficient(workers);
        }

        let normalized: Vec<String> = outputs.iter().map(|(_, o)| normalize(o)).collect();

        let mut min_score = 1.0_f64;
        for i in 0..normalized.len() {
            for j in (i + 1)..normalized.len() {
                let score = Self::similarity(&normalized[i], &normalized[j]);
                min_score = min_score.min(score);
            }
        }

        let raw_identical = outputs.windows(2).all(|w| w[0].1 == w[1].1);
        let normalized_identical = normalized.windows(2).all(|w| w[0] == w[1]);

        let severity = if !raw_identical && normalized_identical {
            ConflictSeverity::Formatting
        } else {
            self.classify(min_score)
        };

        let blocks: Vec<Vec<CodeBlock>> = normalized.iter().map(|n| extract_code_blocks(n)).collect();
        let conflicting_sections = code_block_sections(&workers, &blocks);

        let description = match severity {
            ConflictSeverity::None => format!(
                "{} outputs agree (similarity {:.2})",
                outputs.len(),
                min_score
            ),
            ConflictSeverity::Formatting => {
                format!("{} outputs differ only in whitespace", outputs.len())
            }
            other => format!(
                "{} conflict between {} outputs (minimum similarity {:.2})",
                other.as_str().to_lowercase(),
                outputs.len(),
                min_score
            ),
        };

        ConflictAssessment {
            severity,
            workers_involved: workers,
            similarity_score: min_score,
            description,
            conflicting_sections,
        }
    }

    /// Map a similarity score to a severity.
    pub fn classify(&self, score: f64) -> ConflictSeverity {
        if score >= self.thresholds.none {
            ConflictSeverity::None
        } else if score >= self.thresholds.minor {
            ConflictSeverity::Minor
        } else if score >= self.thresholds.moderate {
            ConflictSeverity::Moderate
        } else {
            ConflictSeverity::Major
        }
    }
}

fn code_block_sections(workers: &[String], blocks: &[Vec<CodeBlock>]) -> Vec<ConflictingSection> {
    let summaries: Vec<CodeBlockSummary> = workers
        .iter()
        .zip(blocks)
        .map(|(worker_id, blocks)| {
            let mut languages: Vec<String> = blocks.iter().map(|b| b.language.clone()).collect();
            languages.sort();
            languages.dedup();
            CodeBlockSummary {
                worker_id: worker_id.clone(),
                block_count: blocks.len(),
                languages,
            }
        })
        .collect();

    let mut sections = Vec::new();

    let counts_differ = summaries
        .windows(2)
        .any(|w| w[0].block_count != w[1].block_count);
    if counts_differ {
        let detail = summaries
            .iter()
            .map(|s| format!("{}={}", s.worker_id, s.block_count))
            .collect::<Vec<_>>()
            .join(", ");
        sections.push(ConflictingSection {
            kind: SectionKind::CodeBlockCount,
            description: format!("Code block counts differ: {}", detail),
            per_worker: summaries.clone(),
        });
    }

    let languages_differ = summaries
        .iter()
        .filter(|s| s.block_count > 0)
        .collect::<Vec<_>>()
        .windows(2)
        .any(|w| w[0].languages != w[1].languages);
    if languages_differ {
        let detail = summaries
            .iter()
            .map(|s| format!("{}=[{}]", s.worker_id, s.languages.join(",")))
            .collect::<Vec<_>>()
            .join(", ");
        sections.push(ConflictingSection {
            kind: SectionKind::CodeBlockLanguages,
            description: format!("Code block languages differ: {}", detail),
            per_worker: summaries,
        });
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_outputs_no_conflict() {
        let detector = ConflictDetector::new();
        let assessment = detector.detect(&[("a", "same answer"), ("b", "same answer")]);
        assert_eq!(assessment.severity, ConflictSeverity::None);
        assert!(assessment.similarity_score >= 0.95);
        assert_eq!(assessment.workers_involved, vec!["a", "b"]);
        assert!(assessment.conflicting_sections.is_empty());
    }

    #[test]
    fn test_whitespace_only_is_formatting() {
        let detector = ConflictDetector::new();
        let assessment = detector.detect(&[
            ("a", "Use a mutex.\n\n\n\nThen    lock it."),
            ("b", "  Use a mutex.\n\nThen lock it.  "),
        ]);
        assert_eq!(assessment.severity, ConflictSeverity::Formatting);
        assert_eq!(assessment.similarity_score, 1.0);
    }

    #[test]
    fn test_opposite_recommendations_conflict() {
        let detector = ConflictDetector::new();
        let assessment = detector.detect(&[
            ("a", "You should rewrite the parser from scratch using recursive descent."),
            ("b", "Do not touch the parser; patch the tokenizer edge case instead."),
        ]);
        assert!(assessment.severity >= ConflictSeverity::Moderate);
        assert!(assessment.similarity_score < 0.85);
    }

    #[test]
    fn test_small_edit_is_minor_or_none() {
        let detector = ConflictDetector::new();
        let base = "The function returns an error when the input file does not exist, \
                    and callers are expected to propagate it with the question mark operator.";
        let edited = "The function returns an error when the input file does not exist, \
                      and callers are expected to propagate it using the question mark operator.";
        let assessment = detector.detect(&[("a", base), ("b", edited)]);
        assert!(assessment.similarity_score >= 0.85);
        assert!(assessment.severity <= ConflictSeverity::Minor);
    }

    #[test]
    fn test_insufficient_data() {
        let detector = ConflictDetector::new();
        let single = detector.detect(&[("a", "only one")]);
        assert_eq!(single.severity, ConflictSeverity::None);
        assert!(single.description.contains("Insufficient data"));
        assert_eq!(single.similarity_score, 1.0);

        let empty = detector.detect(&[]);
        assert_eq!(empty.severity, ConflictSeverity::None);
        assert_eq!(empty.similarity_score, 0.0);
    }

    #[test]
    fn test_minimum_pairwise_score_is_representative() {
        let detector = ConflictDetector::new();
        let assessment = detector.detect(&[
            ("a", "same answer"),
            ("b", "same answer"),
            ("c", "a completely unrelated reply about databases"),
        ]);
        let ab = ConflictDetector::similarity("same answer", "same answer");
        let ac = ConflictDetector::similarity(
            "same answer",
            "a completely unrelated reply about databases",
        );
        assert_eq!(ab, 1.0);
        assert!((assessment.similarity_score - ac).abs() < 1e-9);
        assert_eq!(assessment.severity, ConflictSeverity::Major);
    }

    #[test]
    fn test_code_block_count_discrepancy_keeps_text_severity() {
        let detector = ConflictDetector::new();
        let a = "Use this:\n```rust\nlet x = 1;\n```";
        let b = "Use this:\nlet x = 1;";
        let assessment = detector.detect(&[("a", a), ("b", b)]);
        assert_eq!(assessment.severity, detector.classify(assessment.similarity_score));
        assert_eq!(assessment.conflicting_sections.len(), 1);
        assert_eq!(
            assessment.conflicting_sections[0].kind,
            SectionKind::CodeBlockCount
        );
        assert_eq!(assessment.conflicting_sections[0].per_worker[0].block_count, 1);
        assert_eq!(assessment.conflicting_sections[0].per_worker[1].block_count, 0);
    }

    #[test]
    fn test_code_block_language_discrepancy() {
        let detector = ConflictDetector::new();
        let a = "```python\nprint(1)\n```";
        let b = "```rust\nprintln!(\"1\");\n```";
        let assessment = detector.detect(&[("a", a), ("b", b)]);
        assert!(
            assessment
                .conflicting_sections
                .iter()
                .any(|s| s.kind == SectionKind::CodeBlockLanguages)
        );
    }

    #[test]
    fn test_assess_results_ignores_failures() {
        let detector = ConflictDetector::new();
        let results = vec![
            WorkResult::success("a", "same"),
            WorkResult::failure("b", "boom", 1),
            WorkResult::success("c", "same"),
        ];
        let assessment = detector.assess_results(&results);
        assert_eq!(assessment.workers_involved, vec!["a", "c"]);
        assert_eq!(assessment.severity, ConflictSeverity::None);
    }

    #[test]
    fn test_classify_boundaries() {
        let detector = ConflictDetector::new();
        assert_eq!(detector.classify(0.95), ConflictSeverity::None);
        assert_eq!(detector.classify(0.94), ConflictSeverity::Minor);
        assert_eq!(detector.classify(0.85), ConflictSeverity::Minor);
        assert_eq!(detector.classify(0.84), ConflictSeverity::Moderate);
        assert_eq!(detector.classify(0.60), ConflictSeverity::Moderate);
        assert_eq!(detector.classify(0.59), ConflictSeverity::Major);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ConflictSeverity::None < ConflictSeverity::Formatting);
        assert!(ConflictSeverity::Formatting < ConflictSeverity::Minor);
        assert!(ConflictSeverity::Minor < ConflictSeverity::Moderate);
        assert!(ConflictSeverity::Moderate < ConflictSeverity::Major);
    }
}
