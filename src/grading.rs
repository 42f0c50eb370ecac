//! Scoring rules for quiz attempts.
//!
//! Objective questions (radio, checkbox) are graded at submission time and are worth one
//! point each. Open answers are left for the instructor, whose single 0-100 score covers all
//! of them and is blended with the automatic score by point weight.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{
    attempt::{Answer, AttemptStatus},
    material::FeedbackType,
    question::{Question, QuestionKind, QuestionOption, QuestionType},
};

/// Radio: the response is the index of exactly one option.
pub fn validate_radio(options: &[QuestionOption], response: &str) -> bool {
    response
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|idx| options.get(idx))
        .is_some_and(|opt| opt.is_correct)
}

/// Checkbox: the response is a comma-separated set of indices and must equal the set of
/// correct options exactly. Unknown or unparseable indices fail the question.
pub fn validate_checkbox(options: &[QuestionOption], response: &str) -> bool {
    let mut selected = BTreeSet::new();
    for token in response.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<usize>() {
            Ok(idx) if idx < options.len() => {
                selected.insert(idx);
            }
            _ => return false,
        }
    }

    let expected: BTreeSet<usize> = options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_correct)
        .map(|(i, _)| i)
        .collect();

    selected == expected
}

/// `None` for questions that need manual grading.
pub fn grade_question(question: &Question, response: &str) -> Option<bool> {
    match &question.kind {
        QuestionKind::Radio { options } => Some(validate_radio(options, response)),
        QuestionKind::Checkbox { options } => Some(validate_checkbox(options, response)),
        QuestionKind::OpenAnswer => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub response: String,
    pub is_correct: Option<bool>,
    pub points_earned: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoGrade {
    pub answers: Vec<GradedAnswer>,
    pub total_auto_points: i64,
    pub total_manual_points: i64,
    pub earned_points: f64,
    pub auto_score: f64,
}

impl AutoGrade {
    pub fn has_open_answers(&self) -> bool {
        self.total_manual_points > 0
    }

    pub fn status(&self) -> AttemptStatus {
        if self.has_open_answers() {
            AttemptStatus::PendingManualGrading
        } else {
            AttemptStatus::Completed
        }
    }

    /// Set only when nothing is left for the instructor.
    pub fn final_score(&self) -> Option<f64> {
        (!self.has_open_answers()).then_some(self.auto_score)
    }
}

/// Grades every question of the quiz. Questions without a response are graded against the
/// empty string, which is never correct for a question that has a correct option.
pub fn auto_grade(questions: &[Question], responses: &HashMap<i64, String>) -> AutoGrade {
    let mut answers = Vec::with_capacity(questions.len());
    let mut total_auto_points = 0;
    let mut total_manual_points = 0;
    let mut earned_points = 0.0;

    for question in questions {
        let response = responses
            .get(&question.question_id)
            .cloned()
            .unwrap_or_default();

        let (is_correct, points_earned) = match grade_question(question, &response) {
            Some(correct) => {
                let points = if correct { 1.0 } else { 0.0 };
                total_auto_points += 1;
                earned_points += points;
                (Some(correct), Some(points))
            }
            None => {
                total_manual_points += 1;
                (None, None)
            }
        };

        answers.push(GradedAnswer {
            question_id: question.question_id,
            response,
            is_correct,
            points_earned,
        });
    }

    let auto_score = if total_auto_points == 0 {
        0.0
    } else {
        earned_points / total_auto_points as f64 * 100.0
    };

    AutoGrade {
        answers,
        total_auto_points,
        total_manual_points,
        earned_points,
        auto_score,
    }
}

/// Point-weighted blend of the automatic and manual scores. With no points on either side
/// the manual score stands alone.
pub fn weighted_final_score(
    auto_score: f64,
    manual_score: f64,
    total_auto_points: i64,
    total_manual_points: i64,
) -> f64 {
    let total = total_auto_points + total_manual_points;
    if total <= 0 {
        return manual_score;
    }
    let total = total as f64;
    auto_score * (total_auto_points as f64 / total)
        + manual_score * (total_manual_points as f64 / total)
}

/// One question of an attempt's feedback breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerFeedback<'a> {
    pub question_id: i64,
    pub prompt: &'a str,
    pub question_type: QuestionType,
    pub student_response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_response_text: Option<String>,
    pub is_correct: Option<bool>,
    pub points_earned: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<Vec<String>>,
}

/// Per-question breakdown in quiz order, gated by the quiz's feedback type: `None` for
/// `score_only`, and correct answers only for `detailed_with_answers` objective questions.
pub fn answer_breakdown<'a>(
    questions: &'a [Question],
    answers: &'a [Answer],
    feedback: FeedbackType,
) -> Option<Vec<AnswerFeedback<'a>>> {
    if !feedback.shows_breakdown() {
        return None;
    }

    let breakdown = questions
        .iter()
        .filter_map(|question| {
            let answer = answers
                .iter()
                .find(|a| a.question_id == question.question_id)?;
            let correct_answers = (feedback.reveals_answers() && !question.is_open_answer())
                .then(|| question.correct_answers());

            Some(AnswerFeedback {
                question_id: question.question_id,
                prompt: &question.prompt,
                question_type: question.kind.question_type(),
                student_response: &answer.student_response,
                student_response_text: question.response_text(&answer.student_response),
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
                correct_answers,
            })
        })
        .collect();

    Some(breakdown)
}
