// src/handlers/attempts.rs

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    db::begin_write,
    error::AppError,
    grading::{self, AnswerFeedback},
    models::{
        attempt::{
            Answer, AttemptDetail, AttemptIdRequest, AttemptStatus, OpenAnswerEntry,
            PendingAttempt, QuizAttemptEntry, StudentAttemptSummary, SubmitGradeRequest,
        },
        material::QuizIdRequest,
        user::{Identity, Role},
    },
    protocol::Response,
    state::AppState,
};

use super::{data_response, parse, parse_valid, quiz::load_quiz};

const ATTEMPT_NOT_FOUND: &str = "Attempt not found or access denied";

/// Students reach their own attempts, instructors the attempts on quizzes they created,
/// admins everything.
fn can_access_attempt(actor: &Identity, student_id: i64, quiz_creator: Option<i64>) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Instructor => quiz_creator == Some(actor.user_id),
        Role::Student => student_id == actor.user_id,
    }
}

/// Attempt history of the acting student, newest first.
/// Student only.
pub async fn my_attempts(state: &AppState, actor: &Identity) -> Result<Response, AppError> {
    let attempts = sqlx::query_as::<_, StudentAttemptSummary>(
        "SELECT qa.attempt_id, qa.quiz_id, m.title AS quiz_title, c.course_id, c.course_name, \
                cl.class_id, cl.class_name, qa.attempt_number, qa.status, qa.auto_score, \
                qa.final_score, q.feedback_type, qa.submitted_at \
         FROM quiz_attempts qa \
         JOIN quizzes q ON q.quiz_id = qa.quiz_id \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         JOIN courses c ON c.course_id = m.course_id \
         JOIN classes cl ON cl.class_id = c.class_id \
         WHERE qa.student_id = ? \
         ORDER BY qa.submitted_at DESC, qa.attempt_id DESC",
    )
    .bind(actor.user_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch attempts"))?;

    data_response(&attempts)
}

#[derive(Serialize)]
struct AttemptDetailsView<'a> {
    #[serde(flatten)]
    detail: &'a AttemptDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    answers: Option<Vec<AnswerFeedback<'a>>>,
}

/// Scores of one attempt plus the per-question breakdown its quiz's feedback type allows.
pub async fn attempt_details(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: AttemptIdRequest = parse(data)?;
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(AppError::persistence("fetch attempt details"))?;

    let detail = sqlx::query_as::<_, AttemptDetail>(
        "SELECT qa.attempt_id, qa.quiz_id, qa.student_id, qa.attempt_number, qa.status, \
                qa.auto_score, qa.manual_score, qa.final_score, qa.total_auto_points, \
                qa.total_manual_points, qa.submitted_at, qa.graded_at, \
                m.title AS quiz_title, u.username AS student_name, m.creator_id, q.feedback_type \
         FROM quiz_attempts qa \
         JOIN quizzes q ON q.quiz_id = qa.quiz_id \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         JOIN users u ON u.user_id = qa.student_id \
         WHERE qa.attempt_id = ?",
    )
    .bind(payload.attempt_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::persistence("fetch attempt details"))?
    .filter(|d| can_access_attempt(actor, d.attempt.student_id, d.creator_id))
    .ok_or_else(|| AppError::NotFound(ATTEMPT_NOT_FOUND.to_string()))?;

    let quiz = load_quiz(&mut conn, detail.attempt.quiz_id)
        .await
        .map_err(AppError::persistence("fetch attempt details"))?
        .ok_or_else(|| AppError::NotFound(ATTEMPT_NOT_FOUND.to_string()))?;

    let answers = sqlx::query_as::<_, Answer>(
        "SELECT attempt_id, question_id, student_response, is_correct, points_earned \
         FROM answers WHERE attempt_id = ?",
    )
    .bind(detail.attempt.attempt_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(AppError::persistence("fetch attempt details"))?;

    data_response(&AttemptDetailsView {
        detail: &detail,
        answers: grading::answer_breakdown(&quiz.questions, &answers, detail.feedback_type),
    })
}

#[derive(Serialize)]
struct PendingAttemptView<'a> {
    #[serde(flatten)]
    attempt: &'a PendingAttempt,
    open_answers: Vec<&'a OpenAnswerEntry>,
}

/// Attempts awaiting a manual grade on quizzes the acting instructor created, each with its
/// open-answer responses.
/// Instructor only.
pub async fn pending_attempts(state: &AppState, actor: &Identity) -> Result<Response, AppError> {
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(AppError::persistence("fetch pending attempts"))?;

    let attempts = sqlx::query_as::<_, PendingAttempt>(
        "SELECT qa.attempt_id, qa.quiz_id, m.title AS quiz_title, c.course_name, cl.class_name, \
                qa.student_id, u.username AS student_name, qa.attempt_number, qa.auto_score, \
                qa.total_auto_points, qa.total_manual_points, qa.submitted_at \
         FROM quiz_attempts qa \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         JOIN courses c ON c.course_id = m.course_id \
         JOIN classes cl ON cl.class_id = c.class_id \
         JOIN users u ON u.user_id = qa.student_id \
         WHERE qa.status = ? AND m.creator_id = ? \
         ORDER BY qa.submitted_at, qa.attempt_id",
    )
    .bind(AttemptStatus::PendingManualGrading)
    .bind(actor.user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(AppError::persistence("fetch pending attempts"))?;

    let open_answers = sqlx::query_as::<_, OpenAnswerEntry>(
        "SELECT a.attempt_id, a.question_id, q.prompt, a.student_response \
         FROM answers a \
         JOIN questions q ON q.question_id = a.question_id \
         JOIN quiz_attempts qa ON qa.attempt_id = a.attempt_id \
         JOIN course_materials m ON m.material_id = qa.quiz_id \
         WHERE qa.status = ? AND m.creator_id = ? AND q.question_type = 'open_answer' \
         ORDER BY a.attempt_id, q.position",
    )
    .bind(AttemptStatus::PendingManualGrading)
    .bind(actor.user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(AppError::persistence("fetch pending attempts"))?;

    let views: Vec<PendingAttemptView<'_>> = attempts
        .iter()
        .map(|attempt| PendingAttemptView {
            attempt,
            open_answers: open_answers
                .iter()
                .filter(|a| a.attempt_id == attempt.attempt_id)
                .collect(),
        })
        .collect();

    data_response(&views)
}

/// Helper row for checking a grade submission.
#[derive(sqlx::FromRow)]
struct GradeTarget {
    student_id: i64,
    status: AttemptStatus,
    auto_score: Option<f64>,
    total_auto_points: i64,
    total_manual_points: i64,
    creator_id: Option<i64>,
}

/// Records the instructor's 0-100 score for the open answers and completes the attempt.
///
/// The final score is the point-weighted blend of automatic and manual scores. A completed
/// attempt cannot be graded again.
/// Instructor only.
pub async fn submit_grade(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: SubmitGradeRequest = parse_valid(data)?;

    let mut tx = begin_write(&state.pool)
        .await
        .map_err(AppError::persistence("submit grade"))?;

    let target = sqlx::query_as::<_, GradeTarget>(
        "SELECT qa.student_id, qa.status, qa.auto_score, qa.total_auto_points, \
                qa.total_manual_points, m.creator_id \
         FROM quiz_attempts qa JOIN course_materials m ON m.material_id = qa.quiz_id \
         WHERE qa.attempt_id = ?",
    )
    .bind(payload.attempt_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(AppError::persistence("submit grade"))?
    .filter(|t| can_access_attempt(actor, t.student_id, t.creator_id))
    .ok_or_else(|| AppError::NotFound(ATTEMPT_NOT_FOUND.to_string()))?;

    if target.status == AttemptStatus::Completed {
        return Err(AppError::Conflict(
            "Attempt has already been graded".to_string(),
        ));
    }

    let final_score = grading::weighted_final_score(
        target.auto_score.unwrap_or(0.0),
        payload.score,
        target.total_auto_points,
        target.total_manual_points,
    );

    let updated = sqlx::query(
        "UPDATE quiz_attempts SET status = ?, manual_score = ?, final_score = ?, \
         graded_at = CURRENT_TIMESTAMP \
         WHERE attempt_id = ? AND status = ?",
    )
    .bind(AttemptStatus::Completed)
    .bind(payload.score)
    .bind(final_score)
    .bind(payload.attempt_id)
    .bind(AttemptStatus::PendingManualGrading)
    .execute(&mut *tx)
    .await
    .map_err(AppError::persistence("submit grade"))?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Attempt has already been graded".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE answers SET points_earned = ? \
         WHERE attempt_id = ? AND question_id IN \
             (SELECT question_id FROM questions WHERE question_type = 'open_answer')",
    )
    .bind(payload.score / 100.0)
    .bind(payload.attempt_id)
    .execute(&mut *tx)
    .await
    .map_err(AppError::persistence("submit grade"))?;

    tx.commit()
        .await
        .map_err(AppError::persistence("submit grade"))?;

    tracing::info!(
        "Attempt {} graded by {}: manual {:.1}, final {:.1}",
        payload.attempt_id,
        actor.username,
        payload.score,
        final_score
    );

    Ok(Response::ok_with(
        "Grade submitted successfully",
        json!({
            "attempt_id": payload.attempt_id,
            "status": AttemptStatus::Completed,
            "manual_score": payload.score,
            "final_score": final_score,
        }),
    ))
}

/// Every attempt on one quiz, grouped by student.
/// Instructors see only quizzes they created; admins see all.
pub async fn attempts_for_quiz(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: QuizIdRequest = parse(data)?;

    let creator: Option<Option<i64>> = sqlx::query_scalar(
        "SELECT m.creator_id FROM quizzes q \
         JOIN course_materials m ON m.material_id = q.quiz_id WHERE q.quiz_id = ?",
    )
    .bind(payload.quiz_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(AppError::persistence("fetch quiz attempts"))?;

    match creator {
        Some(creator) if actor.role == Role::Admin || creator == Some(actor.user_id) => {}
        _ => {
            return Err(AppError::NotFound(
                "Quiz not found or access denied".to_string(),
            ));
        }
    }

    let attempts = sqlx::query_as::<_, QuizAttemptEntry>(
        "SELECT qa.attempt_id, qa.student_id, u.username AS student_name, qa.attempt_number, \
                qa.status, qa.auto_score, qa.final_score, qa.submitted_at \
         FROM quiz_attempts qa JOIN users u ON u.user_id = qa.student_id \
         WHERE qa.quiz_id = ? \
         ORDER BY u.username, qa.attempt_number",
    )
    .bind(payload.quiz_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch quiz attempts"))?;

    data_response(&attempts)
}
