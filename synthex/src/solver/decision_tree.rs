//! Multi-label decision-tree induction over predicate attributes.
//!
//! Examples are points; each point's label set is the set of terms whose
//! signature covers it. A leaf must be pure: one term covers every point
//! routed to it.

use crate::signature::Signature;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionTree {
    /// Index into the term list.
    Leaf { label: usize },
    /// Index into the predicate list; the positive child handles the
    /// predicate being true.
    Node {
        attribute: usize,
        positive: Box<DecisionTree>,
        negative: Box<DecisionTree>,
    },
}

/// Learn a tree routing every point to a term covering it, or `None` when
/// the predicate pool cannot separate points with disjoint feasible sets.
#[must_use]
pub fn learn_decision_tree(
    pred_sigs: &[Signature],
    term_sigs: &[Signature],
    num_points: usize,
) -> Option<DecisionTree> {
    let points: Vec<usize> = (0..num_points).collect();
    let mut available = vec![true; pred_sigs.len()];
    build(pred_sigs, term_sigs, &points, &mut available)
}

fn build(
    pred_sigs: &[Signature],
    term_sigs: &[Signature],
    points: &[usize],
    available: &mut Vec<bool>,
) -> Option<DecisionTree> {
    // Pure already: the first term covering every point wins.
    if let Some(label) = term_sigs
        .iter()
        .position(|sig| points.iter().all(|&p| sig.test(p)))
    {
        return Some(DecisionTree::Leaf { label });
    }

    // Rank the attributes that actually split this point set; lower score
    // first, index breaks ties.
    let mut candidates: Vec<(f64, usize, Vec<usize>, Vec<usize>)> = Vec::new();
    for (attribute, sig) in pred_sigs.iter().enumerate() {
        if !available[attribute] {
            continue;
        }
        let (positive, negative): (Vec<usize>, Vec<usize>) =
            points.iter().copied().partition(|&p| sig.test(p));
        if positive.is_empty() || negative.is_empty() {
            continue;
        }
        let score = split_entropy(term_sigs, &positive) + split_entropy(term_sigs, &negative);
        candidates.push((score, attribute, positive, negative));
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    for (_, attribute, positive, negative) in candidates {
        available[attribute] = false;
        let children = build(pred_sigs, term_sigs, &positive, available)
            .and_then(|pos| build(pred_sigs, term_sigs, &negative, available).map(|neg| (pos, neg)));
        available[attribute] = true;
        if let Some((pos, neg)) = children {
            return Some(DecisionTree::Node {
                attribute,
                positive: Box::new(pos),
                negative: Box::new(neg),
            });
        }
    }
    None
}

/// Weighted log of the mean number of terms still feasible per point.
fn split_entropy(term_sigs: &[Signature], points: &[usize]) -> f64 {
    let feasible: usize = points
        .iter()
        .map(|&p| term_sigs.iter().filter(|sig| sig.test(p)).count())
        .sum();
    let mean = (feasible as f64 / points.len() as f64).max(1.0);
    points.len() as f64 * mean.log2()
}
