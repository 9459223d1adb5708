//! Per-reviewee score statistics across all received reviews.

use crate::domain::models::{EmployeeClass, ReceivedReview};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionStats {
    pub question: String,
    pub scores: Vec<u8>,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultSummary {
    pub submission_count: usize,
    /// In first-seen order of the question keys.
    pub per_question: Vec<QuestionStats>,
    pub overall_mean: f64,
    pub scale_max: u8,
    /// `overall_mean / scale_max`, for progress bars.
    pub overall_ratio: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Aggregate {
    NoData,
    Summary(ResultSummary),
}

fn mean(scores: &[u8]) -> f64 {
    let sum: u32 = scores.iter().map(|&s| u32::from(s)).sum();
    f64::from(sum) / scores.len() as f64
}

pub fn aggregate(reviews: &[ReceivedReview], class: EmployeeClass) -> Aggregate {
    let mut per_question: Vec<(String, Vec<u8>)> = Vec::new();
    let mut all_scores = Vec::new();

    for review in reviews {
        for entry in &review.scores {
            match per_question.iter_mut().find(|(key, _)| *key == entry.question) {
                Some((_, scores)) => scores.push(entry.score),
                None => per_question.push((entry.question.clone(), vec![entry.score])),
            }
            all_scores.push(entry.score);
        }
    }

    if all_scores.is_empty() {
        return Aggregate::NoData;
    }

    let overall_mean = mean(&all_scores);
    let scale_max = class.scale_max();
    Aggregate::Summary(ResultSummary {
        submission_count: reviews.len(),
        per_question: per_question
            .into_iter()
            .map(|(question, scores)| QuestionStats {
                mean: mean(&scores),
                question,
                scores,
            })
            .collect(),
        overall_mean,
        scale_max,
        overall_ratio: overall_mean / f64::from(scale_max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ScoreEntry;
    use chrono::Utc;
    use uuid::Uuid;

    fn per_question_mean(summary: &ResultSummary, question: &str) -> Option<f64> {
        summary
            .per_question
            .iter()
            .find(|q| q.question == question)
            .map(|q| q.mean)
    }

    fn review(scores: &[(&str, u8)]) -> ReceivedReview {
        ReceivedReview {
            id: Uuid::new_v4(),
            scores: scores
                .iter()
                .map(|(q, s)| ScoreEntry {
                    question: q.to_string(),
                    score: *s,
                })
                .collect(),
            comment: "ok".to_string(),
            development_suggestion: None,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn mean_of_three_five_point_scores() {
        let reviews = vec![review(&[("Q", 3)]), review(&[("Q", 4)]), review(&[("Q", 5)])];
        let Aggregate::Summary(summary) = aggregate(&reviews, EmployeeClass::Salaried) else {
            panic!("expected a summary");
        };
        assert_eq!(per_question_mean(&summary, "Q"), Some(4.0));
        assert_eq!(summary.per_question[0].scores, vec![3, 4, 5]);
        assert_eq!(summary.submission_count, 3);
        assert!((summary.overall_ratio - 0.8).abs() < 1e-9);
    }

    #[test]
    fn no_reviews_is_no_data() {
        assert_eq!(aggregate(&[], EmployeeClass::Hourly), Aggregate::NoData);
        assert_eq!(aggregate(&[review(&[])], EmployeeClass::Hourly), Aggregate::NoData);
    }

    #[test]
    fn overall_mean_is_flat_and_keys_keep_first_seen_order() {
        let reviews = vec![
            review(&[("Safety", 1), ("Timeliness", 3)]),
            review(&[("Timeliness", 2)]),
        ];
        let Aggregate::Summary(summary) = aggregate(&reviews, EmployeeClass::Hourly) else {
            panic!("expected a summary");
        };
        let keys: Vec<_> = summary.per_question.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(keys, vec!["Safety", "Timeliness"]);
        assert_eq!(per_question_mean(&summary, "Timeliness"), Some(2.5));
        assert!((summary.overall_mean - 2.0).abs() < 1e-9);
        assert_eq!(summary.scale_max, 3);
    }
}
