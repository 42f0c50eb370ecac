// src/handlers/quiz.rs

use std::collections::HashMap;

use serde_json::{Value, json};
use sqlx::SqliteConnection;

use crate::{
    db::{begin_write, is_unique_violation},
    error::AppError,
    grading,
    models::{
        attempt::{AttemptStatus, FinishAttemptRequest, SubmittedAnswer},
        material::{Quiz, QuizHeader, QuizIdRequest},
        question::{OptionRow, QuestionRow, assemble_questions},
        user::Identity,
    },
    protocol::Response,
    state::AppState,
};

use super::parse;

pub(crate) const MAX_ATTEMPTS_REACHED: &str =
    "You have reached the maximum number of attempts for this quiz.";

/// Loads a quiz with its questions and options in authoring order.
pub(crate) async fn load_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Option<Quiz>, sqlx::Error> {
    let header = sqlx::query_as::<_, QuizHeader>(
        "SELECT q.quiz_id, m.course_id, m.creator_id, m.title, q.max_attempts, q.feedback_type \
         FROM quizzes q JOIN course_materials m ON m.material_id = q.quiz_id \
         WHERE q.quiz_id = ?",
    )
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT question_id, quiz_id, prompt, question_type FROM questions \
         WHERE quiz_id = ? ORDER BY position, question_id",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, OptionRow>(
        "SELECT o.question_id, o.option_text, o.is_correct FROM question_options o \
         JOIN questions q ON q.question_id = o.question_id \
         WHERE q.quiz_id = ? ORDER BY o.question_id, o.position, o.option_id",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(Quiz {
        header,
        questions: assemble_questions(rows, options),
    }))
}

async fn attempts_used(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    student_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = ? AND student_id = ?")
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(conn)
        .await
}

/// Maps submitted answers by question. Every answer must belong to the quiz and no question
/// may be answered twice.
fn collect_responses(
    quiz: &Quiz,
    answers: &[SubmittedAnswer],
) -> Result<HashMap<i64, String>, AppError> {
    let mut responses = HashMap::with_capacity(answers.len());
    for answer in answers {
        if !quiz
            .questions
            .iter()
            .any(|q| q.question_id == answer.question_id)
        {
            return Err(AppError::BadRequest(format!(
                "Question {} does not belong to this quiz",
                answer.question_id
            )));
        }
        if responses
            .insert(answer.question_id, answer.response.clone())
            .is_some()
        {
            return Err(AppError::BadRequest(format!(
                "Question {} was answered more than once",
                answer.question_id
            )));
        }
    }
    Ok(responses)
}

/// Returns the quiz for a student to take. No attempt is created and no correctness
/// information is included.
/// Student only.
pub async fn start_quiz(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: QuizIdRequest = parse(data)?;
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(AppError::persistence("start quiz"))?;

    let quiz = load_quiz(&mut conn, payload.quiz_id)
        .await
        .map_err(AppError::persistence("start quiz"))?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let used = attempts_used(&mut conn, quiz.header.quiz_id, actor.user_id)
        .await
        .map_err(AppError::persistence("start quiz"))?;

    if used >= quiz.header.max_attempts {
        return Err(AppError::Conflict(MAX_ATTEMPTS_REACHED.to_string()));
    }

    let mut view = serde_json::to_value(quiz.view(false))
        .map_err(|e| AppError::Internal(format!("failed to serialize quiz: {}", e)))?;
    if let Value::Object(map) = &mut view {
        map.insert("attempts_used".into(), json!(used));
        map.insert(
            "attempts_remaining".into(),
            json!(quiz.header.max_attempts - used),
        );
    }

    tracing::debug!(
        "Student {} started quiz {} ({} of {} attempts used)",
        actor.username,
        quiz.header.quiz_id,
        used,
        quiz.header.max_attempts
    );
    Ok(Response::data(view))
}

/// Submits an attempt and auto-grades it.
///
/// Everything happens in one transaction: the attempt row is numbered and inserted as
/// pending, one answer row is stored per quiz question, objective answers are graded, and
/// the attempt is completed when no open answers remain.
/// Student only.
pub async fn finish_attempt(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: FinishAttemptRequest = parse(data)?;

    let mut tx = begin_write(&state.pool)
        .await
        .map_err(AppError::persistence("submit quiz attempt"))?;

    let quiz = load_quiz(&mut tx, payload.quiz_id)
        .await
        .map_err(AppError::persistence("submit quiz attempt"))?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let responses = collect_responses(&quiz, &payload.answers)?;

    let used = attempts_used(&mut tx, quiz.header.quiz_id, actor.user_id)
        .await
        .map_err(AppError::persistence("submit quiz attempt"))?;
    if used >= quiz.header.max_attempts {
        return Err(AppError::Conflict(MAX_ATTEMPTS_REACHED.to_string()));
    }

    // Numbering and insert are one statement; the unique key catches a concurrent twin.
    let (attempt_id, attempt_number): (i64, i64) = sqlx::query_as(
        "INSERT INTO quiz_attempts (quiz_id, student_id, attempt_number, status) \
         SELECT ?, ?, COALESCE(MAX(attempt_number), 0) + 1, ? FROM quiz_attempts \
         WHERE quiz_id = ? AND student_id = ? \
         RETURNING attempt_id, attempt_number",
    )
    .bind(quiz.header.quiz_id)
    .bind(actor.user_id)
    .bind(AttemptStatus::PendingManualGrading)
    .bind(quiz.header.quiz_id)
    .bind(actor.user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(
                "Another submission for this quiz is in progress; please retry".to_string(),
            )
        } else {
            AppError::persistence("create quiz attempt")(e)
        }
    })?;

    let graded = grading::auto_grade(&quiz.questions, &responses);

    for answer in &graded.answers {
        sqlx::query(
            "INSERT INTO answers (attempt_id, question_id, student_response) VALUES (?, ?, ?)",
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(&answer.response)
        .execute(&mut *tx)
        .await
        .map_err(AppError::persistence("save answers"))?;
    }

    for answer in graded.answers.iter().filter(|a| a.is_correct.is_some()) {
        sqlx::query(
            "UPDATE answers SET is_correct = ?, points_earned = ? \
             WHERE attempt_id = ? AND question_id = ?",
        )
        .bind(answer.is_correct)
        .bind(answer.points_earned)
        .bind(attempt_id)
        .bind(answer.question_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::persistence("grade answers"))?;
    }

    let status = graded.status();
    let final_score = graded.final_score();

    sqlx::query(
        "UPDATE quiz_attempts SET status = ?, auto_score = ?, final_score = ?, \
         total_auto_points = ?, total_manual_points = ?, \
         graded_at = CASE WHEN ? = 'completed' THEN CURRENT_TIMESTAMP END \
         WHERE attempt_id = ?",
    )
    .bind(status)
    .bind(graded.auto_score)
    .bind(final_score)
    .bind(graded.total_auto_points)
    .bind(graded.total_manual_points)
    .bind(status)
    .bind(attempt_id)
    .execute(&mut *tx)
    .await
    .map_err(AppError::persistence("grade quiz attempt"))?;

    tx.commit()
        .await
        .map_err(AppError::persistence("submit quiz attempt"))?;

    tracing::info!(
        "Student {} submitted attempt {} (#{}) for quiz {}: auto score {:.1}, {:?}",
        actor.username,
        attempt_id,
        attempt_number,
        quiz.header.quiz_id,
        graded.auto_score,
        status
    );

    Ok(Response::ok_with(
        "Quiz submitted successfully",
        json!({
            "attempt_id": attempt_id,
            "attempt_number": attempt_number,
            "status": status,
            "auto_score": graded.auto_score,
            "final_score": final_score,
            "has_open_answers": graded.has_open_answers(),
            "feedback_type": quiz.header.feedback_type,
        }),
    ))
}
