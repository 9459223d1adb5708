use crate::domain::models::{NewSubmission, ReceivedReview, ScoreEntry, Submission};
use crate::domain::questions::{QuestionKind, QuestionSet};
use crate::error::ReviewError;
use crate::store::ReviewStore;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A reviewer's answer to one question: a rating, or the text of a choice option.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
    Rating(u8),
    Choice(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReviewDraft {
    /// Keyed by the question's raw definition.
    pub answers: HashMap<String, Answer>,
    pub comment: String,
    pub development_suggestion: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Turns answers into scores in question order. Every renderable question must be
/// answered; answers to anything else are rejected.
pub fn score_answers(
    set: &QuestionSet,
    answers: &HashMap<String, Answer>,
) -> Result<Vec<ScoreEntry>, ReviewError> {
    if let Some(unknown) = answers.keys().find(|k| set.find(k).is_none()) {
        return Err(ReviewError::validation(
            "answers",
            format!("unknown question {unknown:?}"),
        ));
    }

    let max = set.class.scale_max();
    let mut scores = Vec::with_capacity(set.questions.len());
    for question in &set.questions {
        let answer = answers.get(&question.key).ok_or_else(|| {
            ReviewError::validation("answers", format!("{:?} is not answered", question.label()))
        })?;
        let score = match (&question.kind, answer) {
            (_, Answer::Rating(n)) if (1..=max).contains(n) => *n,
            (QuestionKind::Choice { .. }, Answer::Choice(text)) => {
                question.score_for(text).ok_or_else(|| {
                    ReviewError::validation(
                        "answers",
                        format!("{text:?} is not an option of {:?}", question.label()),
                    )
                })?
            }
            (_, Answer::Rating(n)) => {
                return Err(ReviewError::validation(
                    "answers",
                    format!("score {n} for {:?} is outside 1..={max}", question.label()),
                ))
            }
            (QuestionKind::Scale { .. }, Answer::Choice(_)) => {
                return Err(ReviewError::validation(
                    "answers",
                    format!("{:?} expects a rating", question.label()),
                ))
            }
        };
        scores.push(ScoreEntry {
            question: question.key.clone(),
            score,
        });
    }
    Ok(scores)
}

pub async fn submit(
    store: &dyn ReviewStore,
    reviewer_id: Uuid,
    reviewee_id: Uuid,
    draft: ReviewDraft,
) -> Result<Submission, ReviewError> {
    if reviewer_id == reviewee_id {
        return Err(ReviewError::validation("reviewee_id", "cannot review yourself"));
    }

    let reviewee = store
        .find_user(reviewee_id)
        .await?
        .ok_or(ReviewError::NotFound { entity: "reviewee" })?;

    let assigned = store
        .assignments_for_reviewer(reviewer_id)
        .await?
        .iter()
        .any(|a| a.reviewee_id == reviewee_id);
    if !assigned {
        tracing::warn!("Reviewer {} is not assigned to {}", reviewer_id, reviewee_id);
        return Err(ReviewError::NotAssigned);
    }

    if store.reviewed_reviewees(reviewer_id).await?.contains(&reviewee_id) {
        return Err(ReviewError::AlreadyReviewed);
    }

    let set = QuestionSet::parse(reviewee.class, &store.question_list(reviewee.class).await?);
    if set.questions.is_empty() {
        return Err(ReviewError::NotFound {
            entity: "question set",
        });
    }
    let scores = score_answers(&set, &draft.answers)?;

    let comment = non_blank(Some(&draft.comment))
        .ok_or_else(|| ReviewError::validation("comment", "must not be empty"))?;
    let development_suggestion = non_blank(draft.development_suggestion.as_deref());
    if reviewee.class.requires_development_suggestion() && development_suggestion.is_none() {
        return Err(ReviewError::validation(
            "development_suggestion",
            "must not be empty",
        ));
    }

    let result = store
        .insert_submission(NewSubmission {
            reviewer_id,
            reviewee_id,
            scores,
            comment,
            development_suggestion,
        })
        .await;

    match &result {
        Ok(s) => tracing::info!(
            "Review {} submitted for {} reviewee {}",
            s.id,
            reviewee.class.as_str(),
            reviewee_id
        ),
        Err(ReviewError::AlreadyReviewed) => {
            tracing::warn!("Concurrent duplicate review {} -> {}", reviewer_id, reviewee_id)
        }
        Err(_) => {}
    }
    result
}

pub async fn reviewed_pairs_for(
    store: &dyn ReviewStore,
    reviewer_id: Uuid,
) -> Result<HashSet<Uuid>, ReviewError> {
    store.reviewed_reviewees(reviewer_id).await
}

/// Reviews received by a user, stripped of reviewer identity.
pub async fn received_by(
    store: &dyn ReviewStore,
    reviewee_id: Uuid,
) -> Result<Vec<ReceivedReview>, ReviewError> {
    let mut reviews: Vec<ReceivedReview> = store
        .submissions_for_reviewee(reviewee_id)
        .await?
        .into_iter()
        .map(ReceivedReview::from)
        .collect();
    reviews.sort_by_key(|r| r.submitted_at);
    Ok(reviews)
}
