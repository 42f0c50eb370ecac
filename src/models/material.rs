// src/models/material.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::question::{CreateQuestionRequest, Question, QuestionView};

/// Discriminator stored in `course_materials.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MaterialType {
    Lesson,
    Quiz,
}

/// How much a student sees about a graded attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeedbackType {
    #[default]
    DetailedWithAnswers,
    DetailedWithoutAnswers,
    ScoreOnly,
}

impl FeedbackType {
    pub fn shows_breakdown(self) -> bool {
        !matches!(self, FeedbackType::ScoreOnly)
    }

    pub fn reveals_answers(self) -> bool {
        matches!(self, FeedbackType::DetailedWithAnswers)
    }
}

/// Listing row for `GET_MATERIALS_FOR_COURSE`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MaterialSummary {
    pub material_id: i64,
    pub course_id: i64,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub creator_id: Option<i64>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// Quiz header joined from `course_materials` and `quizzes`.
#[derive(Debug, Clone, FromRow)]
pub struct QuizHeader {
    pub quiz_id: i64,
    pub course_id: i64,
    pub creator_id: Option<i64>,
    pub title: String,
    pub max_attempts: i64,
    pub feedback_type: FeedbackType,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub header: QuizHeader,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn view(&self, reveal_answers: bool) -> MaterialView<'_> {
        MaterialView::Quiz {
            material_id: self.header.quiz_id,
            course_id: self.header.course_id,
            title: &self.header.title,
            max_attempts: self.header.max_attempts,
            feedback_type: self.header.feedback_type,
            questions: self
                .questions
                .iter()
                .map(|q| q.view(reveal_answers))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Lesson {
    pub lesson_id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
}

/// Serialized form of a material, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialView<'a> {
    Lesson {
        material_id: i64,
        course_id: i64,
        title: &'a str,
        content: &'a str,
    },
    Quiz {
        material_id: i64,
        course_id: i64,
        title: &'a str,
        max_attempts: i64,
        feedback_type: FeedbackType,
        questions: Vec<QuestionView<'a>>,
    },
}

impl Lesson {
    pub fn view(&self) -> MaterialView<'_> {
        MaterialView::Lesson {
            material_id: self.lesson_id,
            course_id: self.course_id,
            title: &self.title,
            content: &self.content,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[validate(length(max = 100000, message = "Lesson content is too long."))]
    #[serde(default)]
    pub content: String,
}

fn default_max_attempts() -> i64 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100, message = "max_attempts must be between 1 and 100."))]
    pub max_attempts: i64,
    #[serde(default)]
    pub feedback_type: FeedbackType,
    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialIdRequest {
    pub material_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuizIdRequest {
    pub quiz_id: i64,
}
