//! Scoring functions for the best-score strategy.

use crate::conflict::extract_code_blocks;
use crate::work::WorkResult;
use regex::Regex;
use std::sync::LazyLock;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").unwrap());

/// Scores a successful work result; higher is better.
pub trait ResultScorer: Send + Sync {
    fn score(&self, result: &WorkResult) -> f64;
}

impl<F> ResultScorer for F
where
    F: Fn(&WorkResult) -> f64 + Send + Sync,
{
    fn score(&self, result: &WorkResult) -> f64 {
        self(result)
    }
}

/// Favors longer, more structured output; slow results lose a little.
///
/// `chars + 50 * code_blocks + 10 * list_lines - execution_secs`
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailScorer;

impl DetailScorer {
    pub const CODE_BLOCK_BONUS: f64 = 50.0;
    pub const LIST_LINE_BONUS: f64 = 10.0;
}

impl ResultScorer for DetailScorer {
    fn score(&self, result: &WorkResult) -> f64 {
        let output = &result.output;
        let chars = output.chars().count() as f64;
        let code_blocks = extract_code_blocks(output).len() as f64;
        let list_lines = output
            .lines()
            .filter(|line| LIST_MARKER.is_match(line))
            .count() as f64;

        chars + Self::CODE_BLOCK_BONUS * code_blocks + Self::LIST_LINE_BONUS * list_lines
            - result.execution_time.as_secs_f64()
    }
}
