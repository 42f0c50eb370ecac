// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Question discriminator stored in `questions.question_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuestionType {
    Radio,
    Checkbox,
    OpenAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Variant-specific payload of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Radio { options: Vec<QuestionOption> },
    Checkbox { options: Vec<QuestionOption> },
    OpenAnswer,
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Radio { .. } => QuestionType::Radio,
            QuestionKind::Checkbox { .. } => QuestionType::Checkbox,
            QuestionKind::OpenAnswer => QuestionType::OpenAnswer,
        }
    }

    pub fn options(&self) -> &[QuestionOption] {
        match self {
            QuestionKind::Radio { options } | QuestionKind::Checkbox { options } => options,
            QuestionKind::OpenAnswer => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub question_id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    pub kind: QuestionKind,
}

impl Question {
    pub fn is_open_answer(&self) -> bool {
        matches!(self.kind, QuestionKind::OpenAnswer)
    }

    /// Texts of the options flagged correct, in option order.
    pub fn correct_answers(&self) -> Vec<String> {
        self.kind
            .options()
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.text.clone())
            .collect()
    }

    /// Human-readable form of a raw response: the texts of the selected options.
    /// `None` for open answers or when no index resolves to an option.
    pub fn response_text(&self, response: &str) -> Option<String> {
        let options = self.kind.options();
        if options.is_empty() {
            return None;
        }
        let picked: Vec<&str> = response
            .split(',')
            .filter_map(|token| token.trim().parse::<usize>().ok())
            .filter_map(|idx| options.get(idx))
            .map(|o| o.text.as_str())
            .collect();
        (!picked.is_empty()).then(|| picked.join(", "))
    }

    /// Serializable view. `reveal_answers` controls whether option correctness is included.
    pub fn view(&self, reveal_answers: bool) -> QuestionView<'_> {
        let options = match &self.kind {
            QuestionKind::Radio { options } | QuestionKind::Checkbox { options } => Some(
                options
                    .iter()
                    .map(|o| OptionView {
                        text: &o.text,
                        is_correct: reveal_answers.then_some(o.is_correct),
                    })
                    .collect(),
            ),
            QuestionKind::OpenAnswer => None,
        };
        QuestionView {
            question_id: self.question_id,
            quiz_id: self.quiz_id,
            prompt: &self.prompt,
            question_type: self.kind.question_type(),
            options,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OptionView<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView<'a> {
    pub question_id: i64,
    pub quiz_id: i64,
    pub prompt: &'a str,
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionView<'a>>>,
}

/// Row of the 'questions' table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub question_id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    pub question_type: QuestionType,
}

/// Row of the 'question_options' table.
#[derive(Debug, Clone, FromRow)]
pub struct OptionRow {
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

/// Builds questions from their rows. Options must be ordered by position.
pub fn assemble_questions(rows: Vec<QuestionRow>, options: Vec<OptionRow>) -> Vec<Question> {
    rows.into_iter()
        .map(|row| {
            let opts = || -> Vec<QuestionOption> {
                options
                    .iter()
                    .filter(|o| o.question_id == row.question_id)
                    .map(|o| QuestionOption {
                        text: o.option_text.clone(),
                        is_correct: o.is_correct,
                    })
                    .collect()
            };
            let kind = match row.question_type {
                QuestionType::Radio => QuestionKind::Radio { options: opts() },
                QuestionType::Checkbox => QuestionKind::Checkbox { options: opts() },
                QuestionType::OpenAnswer => QuestionKind::OpenAnswer,
            };
            Question {
                question_id: row.question_id,
                quiz_id: row.quiz_id,
                prompt: row.prompt,
                kind,
            }
        })
        .collect()
}

/// DTO for one question inside `CREATE_QUIZ_WITH_QUESTIONS`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_question_shape))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Prompt must be 1-2000 characters."))]
    pub prompt: String,
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
}

fn validate_options(options: &[QuestionOption]) -> Result<(), ValidationError> {
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(ValidationError::new("option_text_cannot_be_empty"));
        }
        if opt.text.len() > 500 {
            return Err(ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_question_shape(q: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let correct = q.options.iter().filter(|o| o.is_correct).count();
    match q.question_type {
        QuestionType::Radio if q.options.is_empty() => {
            Err(ValidationError::new("radio_requires_options"))
        }
        QuestionType::Radio if correct != 1 => {
            Err(ValidationError::new("radio_requires_exactly_one_correct_option"))
        }
        QuestionType::Checkbox if q.options.is_empty() => {
            Err(ValidationError::new("checkbox_requires_options"))
        }
        QuestionType::Checkbox if correct == 0 => {
            Err(ValidationError::new("checkbox_requires_a_correct_option"))
        }
        QuestionType::OpenAnswer if !q.options.is_empty() => {
            Err(ValidationError::new("open_answer_takes_no_options"))
        }
        _ => Ok(()),
    }
}
