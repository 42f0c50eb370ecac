// src/handlers/materials.rs

use serde_json::{Value, json};
use sqlx::{Sqlite, Transaction};

use crate::{
    db::is_foreign_key_violation,
    error::AppError,
    models::{
        course::CourseIdRequest,
        material::{
            CreateLessonRequest, CreateQuizRequest, Lesson, MaterialIdRequest, MaterialSummary,
            MaterialType,
        },
        user::{Identity, Role},
    },
    protocol::Response,
    state::AppState,
    utils::html::clean_html,
};

use super::{data_response, parse, parse_valid, quiz::load_quiz};

pub async fn list_for_course(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: CourseIdRequest = parse(data)?;

    let materials = sqlx::query_as::<_, MaterialSummary>(
        "SELECT material_id, course_id, title, type, creator_id, created_at \
         FROM course_materials WHERE course_id = ? ORDER BY created_at, material_id",
    )
    .bind(payload.course_id)
    .fetch_all(&state.pool)
    .await
    .map_err(AppError::persistence("fetch course materials"))?;

    data_response(&materials)
}

/// Full lesson text, or a quiz with its questions. Option correctness is only shown to
/// instructors and admins.
pub async fn material_details(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: MaterialIdRequest = parse(data)?;
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(AppError::persistence("fetch material"))?;

    let material_type: Option<MaterialType> =
        sqlx::query_scalar("SELECT type FROM course_materials WHERE material_id = ?")
            .bind(payload.material_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::persistence("fetch material"))?;

    match material_type {
        None => Err(AppError::NotFound("Material not found".to_string())),
        Some(MaterialType::Lesson) => {
            let lesson = sqlx::query_as::<_, Lesson>(
                "SELECT l.lesson_id, m.course_id, m.title, l.content FROM text_lessons l \
                 JOIN course_materials m ON m.material_id = l.lesson_id \
                 WHERE l.lesson_id = ?",
            )
            .bind(payload.material_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(AppError::persistence("fetch lesson"))?
            .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

            data_response(&lesson.view())
        }
        Some(MaterialType::Quiz) => {
            let quiz = load_quiz(&mut conn, payload.material_id)
                .await
                .map_err(AppError::persistence("fetch quiz"))?
                .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

            data_response(&quiz.view(actor.role != Role::Student))
        }
    }
}

async fn insert_material(
    tx: &mut Transaction<'_, Sqlite>,
    course_id: i64,
    creator: &Identity,
    title: &str,
    material_type: MaterialType,
) -> Result<i64, AppError> {
    sqlx::query_scalar(
        "INSERT INTO course_materials (course_id, creator_id, title, type) \
         VALUES (?, ?, ?, ?) RETURNING material_id",
    )
    .bind(course_id)
    .bind(creator.user_id)
    .bind(title)
    .bind(material_type)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::NotFound("Course not found".to_string())
        } else {
            AppError::persistence("create material")(e)
        }
    })
}

/// Creates a text lesson. The HTML body is sanitized before it is stored.
/// Instructor only.
pub async fn create_lesson(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: CreateLessonRequest = parse_valid(data)?;
    let content = clean_html(&payload.content);

    let mut tx = state
        .pool
        .begin()
        .await
        .map_err(AppError::persistence("create lesson"))?;

    let lesson_id = insert_material(
        &mut tx,
        payload.course_id,
        actor,
        &payload.title,
        MaterialType::Lesson,
    )
    .await?;

    sqlx::query("INSERT INTO text_lessons (lesson_id, content) VALUES (?, ?)")
        .bind(lesson_id)
        .bind(content)
        .execute(&mut *tx)
        .await
        .map_err(AppError::persistence("create lesson"))?;

    tx.commit()
        .await
        .map_err(AppError::persistence("create lesson"))?;

    tracing::info!(
        "Lesson '{}' (id {}) created by {}",
        payload.title,
        lesson_id,
        actor.username
    );
    Ok(Response::ok_with(
        "Lesson created successfully",
        json!({ "lesson_id": lesson_id }),
    ))
}

/// Creates a quiz with all of its questions and options in one transaction.
/// Instructor only.
pub async fn create_quiz(
    state: &AppState,
    actor: &Identity,
    data: Value,
) -> Result<Response, AppError> {
    let payload: CreateQuizRequest = parse_valid(data)?;

    let mut tx = state
        .pool
        .begin()
        .await
        .map_err(AppError::persistence("create quiz"))?;

    let quiz_id = insert_material(
        &mut tx,
        payload.course_id,
        actor,
        &payload.title,
        MaterialType::Quiz,
    )
    .await?;

    sqlx::query("INSERT INTO quizzes (quiz_id, max_attempts, feedback_type) VALUES (?, ?, ?)")
        .bind(quiz_id)
        .bind(payload.max_attempts)
        .bind(payload.feedback_type)
        .execute(&mut *tx)
        .await
        .map_err(AppError::persistence("create quiz"))?;

    for (position, question) in payload.questions.iter().enumerate() {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (quiz_id, position, prompt, question_type) \
             VALUES (?, ?, ?, ?) RETURNING question_id",
        )
        .bind(quiz_id)
        .bind(position as i64)
        .bind(&question.prompt)
        .bind(question.question_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::persistence("create quiz"))?;

        for (option_position, option) in question.options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO question_options (question_id, position, option_text, is_correct) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(question_id)
            .bind(option_position as i64)
            .bind(&option.text)
            .bind(option.is_correct)
            .execute(&mut *tx)
            .await
            .map_err(AppError::persistence("create quiz"))?;
        }
    }

    tx.commit()
        .await
        .map_err(AppError::persistence("create quiz"))?;

    tracing::info!(
        "Quiz '{}' (id {}, {} questions) created by {}",
        payload.title,
        quiz_id,
        payload.questions.len(),
        actor.username
    );
    Ok(Response::ok_with(
        "Quiz created successfully",
        json!({ "quiz_id": quiz_id }),
    ))
}

/// Deletes a lesson or quiz. Quiz questions, attempts and answers cascade.
/// Instructor only.
pub async fn delete_material(state: &AppState, data: Value) -> Result<Response, AppError> {
    let payload: MaterialIdRequest = parse(data)?;

    let result = sqlx::query("DELETE FROM course_materials WHERE material_id = ?")
        .bind(payload.material_id)
        .execute(&state.pool)
        .await
        .map_err(AppError::persistence("delete material"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }
    Ok(Response::ok("Material deleted successfully"))
}
