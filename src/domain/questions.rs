//! Question definitions are stored as flat strings per employee class:
//! `Primary text | Secondary text` for salaried scale questions and
//! `Prompt;Option for 1;Option for 2;Option for 3` for hourly choice questions.
//! They are parsed once on read; the raw string survives only as the key that
//! stored scores point back to.

use crate::domain::models::EmployeeClass;
use crate::error::ReviewError;
use crate::store::ReviewStore;
use serde::Serialize;
use std::collections::HashSet;

const SCALE_SEPARATOR: char = '|';
const CHOICE_SEPARATOR: char = ';';
pub const CHOICE_OPTIONS: usize = 3;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Scale { primary: String, secondary: String },
    Choice { prompt: String, options: [String; CHOICE_OPTIONS] },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct QuestionSpec {
    pub key: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MalformedQuestion {
    pub key: String,
    pub reason: String,
}

impl QuestionSpec {
    pub fn label(&self) -> &str {
        match &self.kind {
            QuestionKind::Scale { primary, .. } => primary,
            QuestionKind::Choice { prompt, .. } => prompt,
        }
    }

    /// Score (1-based) of a choice option, matched on trimmed text.
    pub fn score_for(&self, selection: &str) -> Option<u8> {
        match &self.kind {
            QuestionKind::Choice { options, .. } => options
                .iter()
                .position(|o| o == selection.trim())
                .map(|idx| idx as u8 + 1),
            QuestionKind::Scale { .. } => None,
        }
    }

    /// Option text for a stored score. Out-of-range scores yield `None`.
    pub fn option_for(&self, score: u8) -> Option<&str> {
        match &self.kind {
            QuestionKind::Choice { options, .. } => {
                let idx = usize::from(score).checked_sub(1)?;
                options.get(idx).map(String::as_str)
            }
            QuestionKind::Scale { .. } => None,
        }
    }
}

pub fn parse_question(raw: &str, class: EmployeeClass) -> Result<QuestionSpec, MalformedQuestion> {
    let malformed = |reason: &str| MalformedQuestion {
        key: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.trim().is_empty() {
        return Err(malformed("empty question"));
    }

    let kind = match class {
        EmployeeClass::Salaried => {
            let mut parts = raw.split(SCALE_SEPARATOR).map(str::trim);
            let primary = parts.next().unwrap_or_default().to_string();
            let secondary = parts.next().unwrap_or_default().to_string();
            if primary.is_empty() {
                return Err(malformed("missing primary text"));
            }
            QuestionKind::Scale { primary, secondary }
        }
        EmployeeClass::Hourly => {
            let parts: Vec<&str> = raw.split(CHOICE_SEPARATOR).map(str::trim).collect();
            if parts.len() < CHOICE_OPTIONS + 1 {
                return Err(malformed("expected a prompt and three options separated by ';'"));
            }
            if parts[..=CHOICE_OPTIONS].iter().any(|p| p.is_empty()) {
                return Err(malformed("prompt and options must not be empty"));
            }
            QuestionKind::Choice {
                prompt: parts[0].to_string(),
                options: [parts[1].to_string(), parts[2].to_string(), parts[3].to_string()],
            }
        }
    };

    Ok(QuestionSpec {
        key: raw.to_string(),
        kind,
    })
}

/// The renderable questions of one class plus whatever had to be left out.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionSet {
    pub class: EmployeeClass,
    pub questions: Vec<QuestionSpec>,
    pub skipped: Vec<MalformedQuestion>,
}

impl QuestionSet {
    pub fn parse(class: EmployeeClass, raws: &[String]) -> Self {
        let mut questions = Vec::with_capacity(raws.len());
        let mut skipped = Vec::new();
        for raw in raws {
            match parse_question(raw, class) {
                Ok(spec) => questions.push(spec),
                Err(bad) => {
                    tracing::warn!(
                        "Skipping malformed {} question {:?}: {}",
                        class.as_str(),
                        bad.key,
                        bad.reason
                    );
                    skipped.push(bad);
                }
            }
        }
        Self {
            class,
            questions,
            skipped,
        }
    }

    pub fn find(&self, key: &str) -> Option<&QuestionSpec> {
        self.questions.iter().find(|q| q.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.key.as_str())
    }
}

/// Normalises an authored list (one question per line) and rejects anything that
/// would later be dropped on read.
pub fn validate_question_list(
    class: EmployeeClass,
    lines: &[String],
) -> Result<Vec<String>, ReviewError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let spec = parse_question(line, class)
            .map_err(|bad| ReviewError::validation(format!("questions[{idx}]"), bad.reason))?;
        if let QuestionKind::Choice { options, .. } = &spec.kind {
            let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
            if distinct.len() < CHOICE_OPTIONS {
                return Err(ReviewError::validation(
                    format!("questions[{idx}]"),
                    "choice options must be distinct",
                ));
            }
        }
        if !seen.insert(line.to_string()) {
            return Err(ReviewError::validation(
                format!("questions[{idx}]"),
                "duplicate question",
            ));
        }
        out.push(line.to_string());
    }
    Ok(out)
}

/// What a questionnaire needs to render for one class.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionForm {
    #[serde(flatten)]
    pub set: QuestionSet,
    pub scale_max: u8,
    pub development_suggestion_required: bool,
}

pub async fn question_form(
    store: &dyn ReviewStore,
    class: EmployeeClass,
) -> Result<QuestionForm, ReviewError> {
    let raws = store.question_list(class).await?;
    Ok(QuestionForm {
        set: QuestionSet::parse(class, &raws),
        scale_max: class.scale_max(),
        development_suggestion_required: class.requires_development_suggestion(),
    })
}

/// Replaces the whole list for a class after validation. Existing scores keep their
/// old keys; questions that no longer exist simply stop being rendered.
pub async fn replace_questions(
    store: &dyn ReviewStore,
    class: EmployeeClass,
    lines: &[String],
) -> Result<QuestionSet, ReviewError> {
    let questions = validate_question_list(class, lines)?;
    if questions.is_empty() {
        return Err(ReviewError::validation("questions", "at least one question is required"));
    }
    store.replace_question_list(class, &questions).await?;
    tracing::info!("Replaced {} question list ({} questions)", class.as_str(), questions.len());
    Ok(QuestionSet::parse(class, &questions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TIMELINESS: &str = "Timeliness;Always late;Sometimes late;Always on time";

    #[test]
    fn scale_question_splits_bilingual_label() {
        let q = parse_question(
            "Teamwork & Collaboration | Kerjasama & Kolaborasi dalam Tim",
            EmployeeClass::Salaried,
        )
        .unwrap();
        assert_eq!(
            q.kind,
            QuestionKind::Scale {
                primary: "Teamwork & Collaboration".to_string(),
                secondary: "Kerjasama & Kolaborasi dalam Tim".to_string(),
            }
        );
        assert_eq!(q.key, "Teamwork & Collaboration | Kerjasama & Kolaborasi dalam Tim");
    }

    #[test]
    fn scale_question_without_separator_has_empty_secondary() {
        let q = parse_question("Ownership", EmployeeClass::Salaried).unwrap();
        assert_eq!(q.label(), "Ownership");
        assert!(matches!(
            q.kind,
            QuestionKind::Scale { ref secondary, .. } if secondary.is_empty()
        ));
    }

    #[test]
    fn choice_score_round_trips_through_option_text() {
        let q = parse_question(TIMELINESS, EmployeeClass::Hourly).unwrap();
        let score = q.score_for("Always on time").unwrap();
        assert_eq!(score, 3);
        assert_eq!(q.option_for(score), Some("Always on time"));
        assert_eq!(q.score_for("Never heard of it"), None);
    }

    #[test]
    fn choice_option_lookup_is_bounds_checked() {
        let q = parse_question(TIMELINESS, EmployeeClass::Hourly).unwrap();
        assert_eq!(q.option_for(0), None);
        assert_eq!(q.option_for(4), None);
        assert_eq!(q.option_for(1), Some("Always late"));
    }

    #[test]
    fn short_choice_question_is_skipped_not_fatal() {
        let raws = vec![TIMELINESS.to_string(), "Safety;Careless".to_string()];
        let set = QuestionSet::parse(EmployeeClass::Hourly, &raws);
        assert_eq!(set.questions.len(), 1);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].key, "Safety;Careless");
        assert!(set.find("Safety;Careless").is_none());
    }

    #[test]
    fn extra_choice_parts_are_ignored() {
        let q = parse_question("Care;a;b;c;d", EmployeeClass::Hourly).unwrap();
        assert_eq!(q.option_for(3), Some("c"));
    }

    #[test]
    fn authoring_rejects_malformed_and_duplicate_lines() {
        let lines = vec!["  ".to_string(), format!(" {TIMELINESS} ")];
        assert_eq!(
            validate_question_list(EmployeeClass::Hourly, &lines).unwrap(),
            vec![TIMELINESS.to_string()]
        );

        let bad = vec![TIMELINESS.to_string(), "Safety;Careless".to_string()];
        let err = validate_question_list(EmployeeClass::Hourly, &bad).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Validation { ref field, .. } if field == "questions[1]"
        ));

        let dup = vec!["Focus".to_string(), "Focus ".to_string()];
        assert!(validate_question_list(EmployeeClass::Salaried, &dup).is_err());
    }

    #[test]
    fn authoring_rejects_repeated_choice_options() {
        let lines = vec![TIMELINESS.to_string(), "Care;a;x; x".to_string()];
        let err = validate_question_list(EmployeeClass::Hourly, &lines).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Validation { ref field, .. } if field == "questions[1]"
        ));
    }

    #[tokio::test]
    async fn replacement_is_validated_and_read_back_as_form() {
        let store = MemoryStore::new();
        let bad = vec!["Safety;Careless".to_string()];
        assert!(replace_questions(&store, EmployeeClass::Hourly, &bad).await.is_err());
        assert!(replace_questions(&store, EmployeeClass::Hourly, &["".to_string()])
            .await
            .is_err());

        replace_questions(&store, EmployeeClass::Hourly, &[TIMELINESS.to_string()])
            .await
            .unwrap();
        let form = question_form(&store, EmployeeClass::Hourly).await.unwrap();
        assert_eq!(form.set.questions.len(), 1);
        assert_eq!(form.scale_max, 3);
        assert!(!form.development_suggestion_required);
    }
}
