use crate::analytics::aggregate::{aggregate, Aggregate};
use crate::domain::models::{EmployeeClass, ReceivedReview, ScoreEntry, User};
use crate::domain::questions::{parse_question, QuestionKind};
use crate::domain::submissions::received_by;
use crate::error::ReviewError;
use crate::services::ai::{AiService, FeedbackSummary};
use crate::store::ReviewStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One stored score as the reviewee sees it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerDisplay {
    Scale {
        primary: String,
        secondary: String,
        score: u8,
        max: u8,
    },
    Choice {
        prompt: String,
        selected: String,
        score: u8,
    },
    /// The key no longer parses or the score is outside the question's range.
    DataIncomplete { question: String, score: u8 },
}

/// Stored keys are full question definitions, so they render even after the question
/// has been removed from the current list.
pub fn render_answer(class: EmployeeClass, entry: &ScoreEntry) -> AnswerDisplay {
    let incomplete = || AnswerDisplay::DataIncomplete {
        question: entry.question.clone(),
        score: entry.score,
    };
    let Ok(spec) = parse_question(&entry.question, class) else {
        return incomplete();
    };
    let max = class.scale_max();
    match &spec.kind {
        QuestionKind::Scale { primary, secondary } if (1..=max).contains(&entry.score) => {
            AnswerDisplay::Scale {
                primary: primary.clone(),
                secondary: secondary.clone(),
                score: entry.score,
                max,
            }
        }
        QuestionKind::Choice { prompt, .. } => match spec.option_for(entry.score) {
            Some(selected) => AnswerDisplay::Choice {
                prompt: prompt.clone(),
                selected: selected.to_string(),
                score: entry.score,
            },
            None => incomplete(),
        },
        QuestionKind::Scale { .. } => incomplete(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub answers: Vec<AnswerDisplay>,
    pub comment: String,
    pub development_suggestion: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyResults {
    pub class: EmployeeClass,
    pub reviews: Vec<ReviewView>,
    pub aggregate: Aggregate,
}

fn review_view(class: EmployeeClass, review: &ReceivedReview) -> ReviewView {
    ReviewView {
        id: review.id,
        answers: review.scores.iter().map(|e| render_answer(class, e)).collect(),
        comment: review.comment.clone(),
        development_suggestion: review.development_suggestion.clone(),
        submitted_at: review.submitted_at,
    }
}

pub async fn my_results(store: &dyn ReviewStore, user: &User) -> Result<MyResults, ReviewError> {
    let received = received_by(store, user.id).await?;
    Ok(MyResults {
        class: user.class,
        reviews: received.iter().map(|r| review_view(user.class, r)).collect(),
        aggregate: aggregate(&received, user.class),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    Disabled,
    NoComments,
    Ready(FeedbackSummary),
}

/// Free text of all received reviews, one line per comment or suggestion.
pub fn collect_feedback_text(reviews: &[ReceivedReview]) -> String {
    reviews
        .iter()
        .flat_map(|r| {
            std::iter::once(r.comment.as_str()).chain(r.development_suggestion.as_deref())
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn my_summary(
    store: &dyn ReviewStore,
    ai: Option<&AiService>,
    user: &User,
) -> Result<SummaryOutcome, ReviewError> {
    let Some(ai) = ai else {
        return Ok(SummaryOutcome::Disabled);
    };
    let received = received_by(store, user.id).await?;
    let text = collect_feedback_text(&received);
    if text.is_empty() {
        return Ok(SummaryOutcome::NoComments);
    }
    tracing::info!("Summarising {} reviews for user {}", received.len(), user.id);
    Ok(SummaryOutcome::Ready(ai.summarize_feedback(&text).await?))
}
