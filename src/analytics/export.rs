//! Flat per-class export of all submissions, one row per submission.

use crate::domain::directory::Directory;
use crate::domain::models::{Assignment, EmployeeClass, Submission};
use crate::domain::questions::{parse_question, QuestionSet};
use crate::error::ReviewError;
use crate::store::ReviewStore;
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const MISSING_ANSWER: &str = "N/A";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let inner = writer.into_inner()?;
        Ok(String::from_utf8(inner)?)
    }
}

/// Class a submission is reported under. The reviewee's record decides while it
/// exists; after deletion the assignment tag for the pair, then the shape of the
/// stored question keys.
fn submission_class(
    submission: &Submission,
    directory: &Directory,
    pair_classes: &HashMap<(Uuid, Uuid), EmployeeClass>,
) -> EmployeeClass {
    if let Some(reviewee) = directory.get(submission.reviewee_id) {
        return reviewee.class;
    }
    if let Some(class) = pair_classes.get(&(submission.reviewer_id, submission.reviewee_id)) {
        return *class;
    }
    if submission.scores.is_empty() {
        return match submission.development_suggestion {
            Some(_) => EmployeeClass::Salaried,
            None => EmployeeClass::Hourly,
        };
    }
    let all_choice = submission
        .scores
        .iter()
        .all(|e| parse_question(&e.question, EmployeeClass::Hourly).is_ok());
    if all_choice {
        EmployeeClass::Hourly
    } else {
        EmployeeClass::Salaried
    }
}

/// Question columns follow the class's current list; malformed questions get no
/// column and scores for questions no longer listed are not exported.
/// Deleted users show as a placeholder name.
pub fn build_export(
    set: &QuestionSet,
    submissions: &[Submission],
    directory: &Directory,
    assignments: &[Assignment],
) -> ExportTable {
    let mut columns = vec!["Reviewer".to_string(), "Reviewee".to_string()];
    columns.extend(set.keys().map(str::to_string));
    columns.extend([
        "Comment".to_string(),
        "Development suggestion".to_string(),
        "Submitted at".to_string(),
    ]);

    let pair_classes: HashMap<(Uuid, Uuid), EmployeeClass> = assignments
        .iter()
        .map(|a| ((a.reviewer_id, a.reviewee_id), a.class))
        .collect();

    let mut selected: Vec<&Submission> = submissions
        .iter()
        .filter(|s| submission_class(s, directory, &pair_classes) == set.class)
        .collect();
    selected.sort_by_key(|s| s.submitted_at);

    let rows = selected
        .into_iter()
        .map(|s| {
            let mut row = vec![directory.name_of(s.reviewer_id), directory.name_of(s.reviewee_id)];
            row.extend(set.keys().map(|key| {
                s.scores
                    .iter()
                    .find(|e| e.question == key)
                    .map(|e| e.score.to_string())
                    .unwrap_or_else(|| MISSING_ANSWER.to_string())
            }));
            row.push(s.comment.clone());
            row.push(
                s.development_suggestion
                    .clone()
                    .unwrap_or_else(|| MISSING_ANSWER.to_string()),
            );
            row.push(s.submitted_at.to_rfc3339());
            row
        })
        .collect();

    ExportTable { columns, rows }
}

pub async fn export_class(
    store: &dyn ReviewStore,
    class: EmployeeClass,
) -> Result<ExportTable, ReviewError> {
    let set = QuestionSet::parse(class, &store.question_list(class).await?);
    let submissions = store.all_submissions().await?;
    let directory = Directory::load(store).await?;
    let mut assignments = Vec::new();
    for tagged in EmployeeClass::ALL {
        assignments.extend(store.list_assignments(tagged).await?);
    }
    let table = build_export(&set, &submissions, &directory, &assignments);
    tracing::info!("Exported {} {} submissions", table.rows.len(), class.as_str());
    Ok(table)
}
