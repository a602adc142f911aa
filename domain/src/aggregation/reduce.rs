//! Strategy reductions: turn a list of work results into one decision.
//!
//! Every reduction is pure. Results come in dispatch order (completion order
//! for first-success); `weights[i]` is the weight of the task behind
//! `results[i]`, missing entries count as 1.0.

use super::result::Reduction;
use super::scoring::ResultScorer;
use super::strategy::AggregationStrategy;
use crate::conflict::{ConflictDetector, normalize, passages};
use crate::work::{WorkResult, unique_labels};
use serde_json::json;
use std::collections::HashSet;

/// Collaborators a reduction may consult.
pub struct ReduceContext<'a> {
    pub detector: &'a ConflictDetector,
    pub scorer: &'a dyn ResultScorer,
    pub consensus_threshold: f64,
}

/// Reduce `results` with `strategy`.
pub fn reduce(
    strategy: AggregationStrategy,
    results: &[WorkResult],
    weights: &[f64],
    ctx: &ReduceContext<'_>,
) -> Reduction {
    match strategy {
        AggregationStrategy::FirstSuccess => first_success(results),
        AggregationStrategy::AllComplete => all_complete(results),
        AggregationStrategy::Voting => voting(results),
        AggregationStrategy::BestScore => best_score(results, ctx.scorer),
        AggregationStrategy::Merge => merge(results),
        AggregationStrategy::SmartMerge => smart_merge(results, ctx.detector),
        AggregationStrategy::Consensus => {
            consensus(results, weights, ctx.detector, ctx.consensus_threshold)
        }
    }
}

fn successful(results: &[WorkResult]) -> Vec<usize> {
    results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.success)
        .map(|(i, _)| i)
        .collect()
}

/// Successful outputs grouped by normalized equality, in first-seen order.
struct OutputGroup {
    members: Vec<usize>,
    weight: f64,
}

fn group_outputs(results: &[WorkResult], indices: &[usize], weights: &[f64]) -> Vec<OutputGroup> {
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<OutputGroup> = Vec::new();

    for &i in indices {
        let key = normalize(&results[i].output);
        let weight = weights.get(i).copied().unwrap_or(1.0);
        match keys.iter().position(|k| *k == key) {
            Some(g) => {
                groups[g].members.push(i);
                groups[g].weight += weight;
            }
            None => {
                keys.push(key);
                groups.push(OutputGroup {
                    members: vec![i],
                    weight,
                });
            }
        }
    }
    groups
}

/// Index of the maximum; ties resolve to the earliest.
fn first_max<T: Copy + PartialOrd>(values: impl IntoIterator<Item = T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn group_name(index: usize) -> String {
    format!("group_{}", index + 1)
}

fn first_success(results: &[WorkResult]) -> Reduction {
    match results.iter().find(|r| r.success) {
        Some(winner) => Reduction::won_by(winner).with_meta("completed_count", results.len()),
        None => Reduction::all_failed(),
    }
}

fn all_complete(results: &[WorkResult]) -> Reduction {
    let successes = successful(results);
    let Some(&first) = successes.first() else {
        return Reduction::all_failed().with_meta("failed_count", results.len());
    };
    Reduction::won_by(&results[first])
        .with_meta("successful_count", successes.len())
        .with_meta("failed_count", results.len() - successes.len())
}

fn voting(results: &[WorkResult]) -> Reduction {
    let successes = successful(results);
    if successes.is_empty() {
        return Reduction::all_failed();
    }

    let labels = unique_labels(results);
    let groups = group_outputs(results, &successes, &[]);
    let Some(winner) = first_max(groups.iter().map(|g| g.members.len())) else {
        return Reduction::all_failed();
    };

    let mut votes = serde_json::Map::new();
    let mut members = serde_json::Map::new();
    for (g, group) in groups.iter().enumerate() {
        votes.insert(group_name(g), json!(group.members.len()));
        members.insert(
            group_name(g),
            json!(group.members.iter().map(|&i| labels[i].clone()).collect::<Vec<_>>()),
        );
    }

    Reduction::won_by(&results[groups[winner].members[0]])
        .with_meta("votes", votes)
        .with_meta("vote_members", members)
        .with_meta("winning_group", group_name(winner))
}

fn best_score(results: &[WorkResult], scorer: &dyn ResultScorer) -> Reduction {
    let successes = successful(results);
    if successes.is_empty() {
        return Reduction::all_failed();
    }

    let labels = unique_labels(results);
    let scored: Vec<(usize, f64)> = successes
        .iter()
        .map(|&i| (i, scorer.score(&results[i])))
        .collect();
    let Some(best) = first_max(scored.iter().map(|&(_, s)| s)) else {
        return Reduction::all_failed();
    };

    let scores: serde_json::Map<String, serde_json::Value> = scored
        .iter()
        .map(|&(i, s)| (labels[i].clone(), json!(s)))
        .collect();

    Reduction::won_by(&results[scored[best].0]).with_meta("scores", scores)
}

fn merge(results: &[WorkResult]) -> Reduction {
    let successes = successful(results);
    if successes.is_empty() {
        return Reduction::all_failed();
    }

    let labels = unique_labels(results);
    let sections: Vec<String> = successes
        .iter()
        .filter(|&&i| !results[i].output.trim().is_empty())
        .map(|&i| format!("=== {} ===\n{}", labels[i], results[i].output.trim_end()))
        .collect();

    let merged_count = sections.len();
    Reduction::synthesized(sections.join("\n\n")).with_meta("merged_count", merged_count)
}

fn smart_merge(results: &[WorkResult], detector: &ConflictDetector) -> Reduction {
    let assessment = detector.assess_results(results);
    let successes = successful(results);
    if successes.is_empty() {
        return Reduction::all_failed().with_conflict_info(assessment);
    }

    let severity = assessment.severity;
    if severity.is_agreement() {
        let longest = first_max(successes.iter().map(|&i| results[i].output.chars().count()))
            .map(|k| successes[k])
            .unwrap_or(successes[0]);
        return Reduction::won_by(&results[longest])
            .with_meta("merged_count", 1)
            .with_meta("severity", severity.as_str())
            .with_conflict_info(assessment);
    }

    let labels = unique_labels(results);
    let mut seen: HashSet<String> = HashSet::new();
    let mut sections = Vec::new();
    let mut collapsed = 0usize;

    for &i in &successes {
        let mut kept = Vec::new();
        for passage in passages(&results[i].output) {
            if seen.insert(normalize(&passage)) {
                kept.push(passage);
            } else {
                collapsed += 1;
            }
        }
        if !kept.is_empty() {
            sections.push(format!("=== {} ===\n{}", labels[i], kept.join("\n\n")));
        }
    }

    let merged_count = sections.len();
    Reduction::synthesized(sections.join("\n\n"))
        .with_meta("merged_count", merged_count)
        .with_meta("severity", severity.as_str())
        .with_meta("collapsed_passages", collapsed)
        .with_conflict_info(assessment)
}

fn consensus(
    results: &[WorkResult],
    weights: &[f64],
    detector: &ConflictDetector,
    threshold: f64,
) -> Reduction {
    let assessment = detector.assess_results(results);
    let successes = successful(results);
    if successes.is_empty() {
        return Reduction::all_failed()
            .with_meta("consensus_reached", false)
            .with_conflict_info(assessment);
    }

    let score = assessment.similarity_score;
    if score >= threshold {
        let representative = medoid(results, &successes);
        return Reduction::won_by(&results[representative])
            .with_meta("consensus_reached", true)
            .with_meta("consensus_threshold", threshold)
            .with_meta("similarity_score", score)
            .with_conflict_info(assessment);
    }

    let groups = group_outputs(results, &successes, weights);
    let Some(winner) = first_max(groups.iter().map(|g| g.weight)) else {
        return Reduction::all_failed().with_conflict_info(assessment);
    };

    let tallies: serde_json::Map<String, serde_json::Value> = groups
        .iter()
        .enumerate()
        .map(|(g, group)| (group_name(g), json!(group.weight)))
        .collect();

    Reduction::won_by(&results[groups[winner].members[0]])
        .with_meta("consensus_reached", false)
        .with_meta("resolution_method", "weighted_vote")
        .with_meta("consensus_threshold", threshold)
        .with_meta("similarity_score", score)
        .with_meta("weighted_votes", tallies)
        .with_conflict_info(assessment)
}

/// Successful result most similar to all the others.
fn medoid(results: &[WorkResult], successes: &[usize]) -> usize {
    let normalized: Vec<String> = successes
        .iter()
        .map(|&i| normalize(&results[i].output))
        .collect();
    let totals = (0..normalized.len()).map(|a| {
        (0..normalized.len())
            .filter(|&b| b != a)
            .map(|b| ConflictDetector::similarity(&normalized[a], &normalized[b]))
            .sum::<f64>()
    });
    first_max(totals).map(|k| successes[k]).unwrap_or(successes[0])
}
