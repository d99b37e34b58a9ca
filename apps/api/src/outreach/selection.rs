//! Target Selection: picks which scored employees get a message.
//!
//! No LLM calls. Eligible = among the `top_n` highest scores AND at or above
//! `SELECTION_THRESHOLD`. Employees are identified by their position in the
//! batch, since caller ids may be blank or repeated.

use std::collections::{HashMap, HashSet};

use crate::models::outreach::SELECTION_THRESHOLD;
use crate::models::EmployeeScore;

#[derive(Debug, Clone)]
pub struct TargetSelection {
    top_n: usize,
    scores: HashMap<usize, EmployeeScore>,
    selected: HashSet<usize>,
}

/// Selects outreach targets from scores sorted highest first.
pub fn select_targets(sorted_scores: &[EmployeeScore], top_n: usize) -> TargetSelection {
    let mut scores = HashMap::with_capacity(sorted_scores.len());
    for score in sorted_scores {
        scores.entry(score.index).or_insert_with(|| score.clone());
    }

    let selected = scores_in_rank_order(sorted_scores)
        .take(top_n)
        .filter(|s| s.score >= SELECTION_THRESHOLD)
        .map(|s| s.index)
        .collect();

    TargetSelection {
        top_n,
        scores,
        selected,
    }
}

/// One score per batch position, keeping the first (highest) when a position repeats.
fn scores_in_rank_order(sorted_scores: &[EmployeeScore]) -> impl Iterator<Item = &EmployeeScore> {
    let mut seen = HashSet::new();
    sorted_scores.iter().filter(move |s| seen.insert(s.index))
}

impl TargetSelection {
    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn score_for(&self, index: usize) -> Option<&EmployeeScore> {
        self.scores.get(&index)
    }

    /// Human-readable reasoning, phrased differently for selected and skipped employees.
    pub fn reasoning_for(&self, index: usize) -> String {
        let Some(score) = self.score_for(index) else {
            return "Not selected: no score was returned for this employee.".to_string();
        };

        let verdict = if self.is_selected(index) {
            String::new()
        } else if score.score < SELECTION_THRESHOLD {
            format!("Not selected: below the {SELECTION_THRESHOLD}/100 threshold. ")
        } else {
            format!("Not selected: outside the top {} for this company. ", self.top_n)
        };

        format!("Score: {}/100. {verdict}{}", score.score, score.reasoning)
            .trim_end()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(index: usize, value: u8) -> EmployeeScore {
        EmployeeScore {
            index,
            id: format!("e{index}"),
            full_name: format!("Person {index}"),
            title: "Title".to_string(),
            score: value,
            reasoning: format!("reason {index}"),
        }
    }

    #[test]
    fn test_top_n_above_threshold_selected() {
        let scores = vec![score(0, 95), score(1, 90), score(2, 75), score(3, 72)];
        let selection = select_targets(&scores, 3);
        assert!(selection.is_selected(0));
        assert!(selection.is_selected(1));
        assert!(selection.is_selected(2));
        assert!(!selection.is_selected(3));
        assert_eq!(selection.selected_count(), 3);
    }

    #[test]
    fn test_threshold_excludes_low_scores_inside_top_n() {
        let scores = vec![score(0, 80), score(1, 69), score(2, 10)];
        let selection = select_targets(&scores, 3);
        assert_eq!(selection.selected_count(), 1);
        assert!(!selection.is_selected(1));
    }

    #[test]
    fn test_exactly_threshold_is_eligible() {
        let selection = select_targets(&[score(0, 70)], 3);
        assert!(selection.is_selected(0));
    }

    #[test]
    fn test_top_n_zero_selects_nobody() {
        let selection = select_targets(&[score(0, 99)], 0);
        assert_eq!(selection.selected_count(), 0);
    }

    #[test]
    fn test_shared_ids_do_not_share_selection() {
        let mut scores = vec![score(0, 95), score(1, 50), score(2, 50)];
        for s in &mut scores {
            s.id = String::new();
        }
        let selection = select_targets(&scores, 1);

        assert_eq!(selection.selected_count(), 1);
        assert!(selection.is_selected(0));
        assert!(!selection.is_selected(1));
        assert_eq!(selection.score_for(2).map(|s| s.score), Some(50));
        assert!(selection.reasoning_for(2).contains("below the 70/100 threshold"));
    }

    #[test]
    fn test_reasoning_variants() {
        let scores = vec![score(0, 95), score(1, 85), score(2, 40)];
        let selection = select_targets(&scores, 1);

        assert_eq!(selection.reasoning_for(0), "Score: 95/100. reason 0");
        assert!(selection
            .reasoning_for(1)
            .contains("outside the top 1 for this company"));
        assert!(selection.reasoning_for(2).contains("below the 70/100 threshold"));
        assert!(selection.reasoning_for(7).contains("no score was returned"));
    }
}
