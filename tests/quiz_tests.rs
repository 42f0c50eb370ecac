// tests/quiz_tests.rs

mod common;

use common::{
    TestApp, TestClient, assert_error, create_class_and_course, create_quiz,
    radio_and_open_quiz, seed_user, spawn_app,
};
use lms_server::models::user::Role;
use serde_json::{Value, json};

async fn submit(client: &mut TestClient, quiz_id: i64, answers: Value) -> Value {
    client
        .request(
            "FINISH_ATTEMPT",
            json!({ "quiz_id": quiz_id, "answers": answers }),
        )
        .await
}

/// Course with the radio + open-answer quiz. Returns `(course_id, quiz_id, question_ids)`.
async fn setup_quiz(app: &TestApp, max_attempts: i64, feedback: &str) -> (i64, i64, Vec<i64>) {
    let (_, course_id) = create_class_and_course(app).await;
    let (quiz_id, questions) =
        create_quiz(app, course_id, radio_and_open_quiz(max_attempts, feedback)).await;
    (course_id, quiz_id, questions)
}

#[tokio::test]
async fn open_answer_quiz_is_pending_then_graded() {
    // Arrange
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    // Act: submit
    let reply = submit(
        &mut student,
        quiz_id,
        json!([
            { "question_id": q[0], "response": "1" },
            { "question_id": q[1], "response": "free text" }
        ]),
    )
    .await;

    // Assert: auto-graded, waiting for the instructor
    assert_eq!(reply["type"], "OK");
    assert_eq!(reply["status"], "pending_manual_grading");
    assert_eq!(reply["auto_score"], 100.0);
    assert_eq!(reply["has_open_answers"], true);
    assert_eq!(reply["attempt_number"], 1);
    assert!(reply["final_score"].is_null());
    let attempt_id = reply["attempt_id"].as_i64().unwrap();

    // Act: grade
    let graded = teacher
        .request(
            "SUBMIT_GRADE",
            json!({ "attempt_id": attempt_id, "score": 80 }),
        )
        .await;

    // Assert: weighted 1:1
    assert_eq!(graded["type"], "OK");
    assert_eq!(graded["final_score"], 90.0);
    assert_eq!(graded["status"], "completed");

    let details = student
        .request("GET_ATTEMPT_DETAILS", json!({ "attempt_id": attempt_id }))
        .await;
    assert_eq!(details["data"]["status"], "completed");
    assert_eq!(details["data"]["final_score"], 90.0);
    assert_eq!(details["data"]["manual_score"], 80.0);

    let open = &details["data"]["answers"][1];
    assert_eq!(open["question_type"], "open_answer");
    assert_eq!(open["points_earned"], 0.8);
}

#[tokio::test]
async fn objective_only_quiz_completes_immediately() {
    let app = spawn_app().await;
    let (_, course_id) = create_class_and_course(&app).await;
    let (quiz_id, q) = create_quiz(
        &app,
        course_id,
        json!({
            "title": "Maths",
            "questions": [
                {
                    "prompt": "2 + 2?",
                    "question_type": "radio",
                    "options": [{ "text": "4", "is_correct": true }, { "text": "5" }]
                },
                {
                    "prompt": "Even numbers",
                    "question_type": "checkbox",
                    "options": [
                        { "text": "2", "is_correct": true },
                        { "text": "3" },
                        { "text": "4", "is_correct": true }
                    ]
                }
            ]
        }),
    )
    .await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = submit(
        &mut student,
        quiz_id,
        json!([
            { "question_id": q[0], "response": "0" },
            { "question_id": q[1], "response": "0" }
        ]),
    )
    .await;

    assert_eq!(reply["status"], "completed");
    assert_eq!(reply["auto_score"], 50.0);
    assert_eq!(reply["final_score"], 50.0);
    assert_eq!(reply["has_open_answers"], false);
}

#[tokio::test]
async fn checkbox_requires_exact_selection() {
    let app = spawn_app().await;
    let (_, course_id) = create_class_and_course(&app).await;
    let (quiz_id, q) = create_quiz(
        &app,
        course_id,
        json!({
            "title": "Primes",
            "max_attempts": 3,
            "questions": [{
                "prompt": "Pick the primes",
                "question_type": "checkbox",
                "options": [
                    { "text": "2", "is_correct": true },
                    { "text": "4" },
                    { "text": "5", "is_correct": true }
                ]
            }]
        }),
    )
    .await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let superset = submit(&mut student, quiz_id, json!([{ "question_id": q[0], "response": "0,1,2" }])).await;
    assert_eq!(superset["auto_score"], 0.0);

    let exact = submit(&mut student, quiz_id, json!([{ "question_id": q[0], "response": [2, 0] }])).await;
    assert_eq!(exact["auto_score"], 100.0);
    assert_eq!(exact["attempt_number"], 2);
}

#[tokio::test]
async fn attempts_are_numbered_and_limited() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 2, "score_only").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let answers = json!([{ "question_id": q[0], "response": "0" }]);

    let first = submit(&mut student, quiz_id, answers.clone()).await;
    let second = submit(&mut student, quiz_id, answers.clone()).await;
    assert_eq!(first["attempt_number"], 1);
    assert_eq!(second["attempt_number"], 2);

    let third = submit(&mut student, quiz_id, answers).await;
    assert_error(
        &third,
        "You have reached the maximum number of attempts for this quiz.",
    );

    let start = student
        .request("START_QUIZ", json!({ "quiz_id": quiz_id }))
        .await;
    assert_error(
        &start,
        "You have reached the maximum number of attempts for this quiz.",
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn attempt_numbers_are_per_student() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 3, "score_only").await;
    seed_user(app.pool(), "bob", Role::Student).await;
    let answers = json!([{ "question_id": q[0], "response": "1" }]);

    let mut alice = TestClient::login_as(&app, "alice").await;
    let mut bob = TestClient::login_as(&app, "bob").await;

    assert_eq!(submit(&mut alice, quiz_id, answers.clone()).await["attempt_number"], 1);
    assert_eq!(submit(&mut alice, quiz_id, answers.clone()).await["attempt_number"], 2);
    assert_eq!(submit(&mut bob, quiz_id, answers).await["attempt_number"], 1);
}

#[tokio::test]
async fn start_quiz_hides_correct_answers() {
    let app = spawn_app().await;
    let (_, quiz_id, _) = setup_quiz(&app, 2, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = student
        .request("START_QUIZ", json!({ "quiz_id": quiz_id }))
        .await;

    assert_eq!(reply["type"], "DATA_RESPONSE");
    let data = &reply["data"];
    assert_eq!(data["type"], "quiz");
    assert_eq!(data["attempts_used"], 0);
    assert_eq!(data["attempts_remaining"], 2);
    assert_eq!(data["questions"][0]["options"][1]["text"], "Paris");
    assert!(!reply.to_string().contains("is_correct"));

    // No attempt exists until submission.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn material_details_reveal_correctness_to_staff_only() {
    let app = spawn_app().await;
    let (_, quiz_id, _) = setup_quiz(&app, 1, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    let for_student = student
        .request("GET_MATERIAL_DETAILS", json!({ "material_id": quiz_id }))
        .await;
    assert!(!for_student.to_string().contains("is_correct"));

    let for_teacher = teacher
        .request("GET_MATERIAL_DETAILS", json!({ "material_id": quiz_id }))
        .await;
    assert_eq!(for_teacher["data"]["questions"][0]["options"][1]["is_correct"], true);
}

#[tokio::test]
async fn unanswered_and_foreign_questions() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 3, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let foreign = submit(&mut student, quiz_id, json!([{ "question_id": 9999, "response": "1" }])).await;
    assert_error(&foreign, "Question 9999 does not belong to this quiz");

    let twice = submit(
        &mut student,
        quiz_id,
        json!([
            { "question_id": q[0], "response": "1" },
            { "question_id": q[0], "response": "0" }
        ]),
    )
    .await;
    assert_eq!(twice["type"], "ERROR");

    // Rejected submissions leave no attempt behind.
    let empty = submit(&mut student, quiz_id, json!([])).await;
    assert_eq!(empty["attempt_number"], 1);
    assert_eq!(empty["auto_score"], 0.0);

    let stored: Vec<(i64, String)> = sqlx::query_as(
        "SELECT question_id, student_response FROM answers ORDER BY question_id",
    )
    .fetch_all(app.pool())
    .await
    .unwrap();
    assert_eq!(stored, vec![(q[0], String::new()), (q[1], String::new())]);
}

#[tokio::test]
async fn feedback_without_answers_hides_keys() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_without_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = submit(&mut student, quiz_id, json!([{ "question_id": q[0], "response": "0" }])).await;
    let details = student
        .request("GET_ATTEMPT_DETAILS", json!({ "attempt_id": reply["attempt_id"] }))
        .await;

    let answers = details["data"]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0]["is_correct"], false);
    assert_eq!(answers[0]["student_response_text"], "Berlin");
    assert!(!details.to_string().contains("correct_answers"));
}

#[tokio::test]
async fn feedback_with_answers_shows_keys() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = submit(&mut student, quiz_id, json!([{ "question_id": q[0], "response": "0" }])).await;
    let details = student
        .request("GET_ATTEMPT_DETAILS", json!({ "attempt_id": reply["attempt_id"] }))
        .await;

    let answers = &details["data"]["answers"];
    assert_eq!(answers[0]["correct_answers"], json!(["Paris"]));
    assert!(answers[1].get("correct_answers").is_none());
}

#[tokio::test]
async fn score_only_feedback_has_no_breakdown() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "score_only").await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = submit(&mut student, quiz_id, json!([{ "question_id": q[0], "response": "1" }])).await;
    let details = student
        .request("GET_ATTEMPT_DETAILS", json!({ "attempt_id": reply["attempt_id"] }))
        .await;

    assert_eq!(details["data"]["auto_score"], 100.0);
    assert_eq!(details["data"]["feedback_type"], "score_only");
    assert!(details["data"].get("answers").is_none());
}

#[tokio::test]
async fn attempt_details_are_scoped() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_with_answers").await;
    seed_user(app.pool(), "bob", Role::Student).await;
    seed_user(app.pool(), "other_teacher", Role::Instructor).await;

    let mut alice = TestClient::login_as(&app, "alice").await;
    let reply = submit(&mut alice, quiz_id, json!([{ "question_id": q[0], "response": "1" }])).await;
    let attempt = json!({ "attempt_id": reply["attempt_id"] });

    let mut bob = TestClient::login_as(&app, "bob").await;
    assert_error(
        &bob.request("GET_ATTEMPT_DETAILS", attempt.clone()).await,
        "Attempt not found or access denied",
    );

    let mut other = TestClient::login_as(&app, "other_teacher").await;
    assert_error(
        &other.request("GET_ATTEMPT_DETAILS", attempt.clone()).await,
        "Attempt not found or access denied",
    );

    let mut teacher = TestClient::login_as(&app, "teacher").await;
    let seen = teacher.request("GET_ATTEMPT_DETAILS", attempt.clone()).await;
    assert_eq!(seen["data"]["student_name"], "alice");

    let mut admin = TestClient::login_as(&app, "admin").await;
    assert_eq!(
        admin.request("GET_ATTEMPT_DETAILS", attempt).await["type"],
        "DATA_RESPONSE"
    );
}

#[tokio::test]
async fn grade_is_final() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    let reply = submit(&mut student, quiz_id, json!([{ "question_id": q[1], "response": "essay" }])).await;
    let attempt_id = reply["attempt_id"].as_i64().unwrap();

    let out_of_range = teacher
        .request("SUBMIT_GRADE", json!({ "attempt_id": attempt_id, "score": 120 }))
        .await;
    assert_eq!(out_of_range["type"], "ERROR");

    let first = teacher
        .request("SUBMIT_GRADE", json!({ "attempt_id": attempt_id, "score": 60 }))
        .await;
    // Radio left blank: 0 * 1/2 + 60 * 1/2
    assert_eq!(first["final_score"], 30.0);

    let second = teacher
        .request("SUBMIT_GRADE", json!({ "attempt_id": attempt_id, "score": 100 }))
        .await;
    assert_error(&second, "Attempt has already been graded");

    let final_score: f64 =
        sqlx::query_scalar("SELECT final_score FROM quiz_attempts WHERE attempt_id = ?")
            .bind(attempt_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(final_score, 30.0);
}

#[tokio::test]
async fn grading_needs_ownership_and_pending_status() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 1, "detailed_with_answers").await;
    seed_user(app.pool(), "other_teacher", Role::Instructor).await;
    let mut student = TestClient::login_as(&app, "alice").await;

    let reply = submit(&mut student, quiz_id, json!([{ "question_id": q[1], "response": "x" }])).await;
    let grade = json!({ "attempt_id": reply["attempt_id"], "score": 50 });

    let mut other = TestClient::login_as(&app, "other_teacher").await;
    assert_error(
        &other.request("SUBMIT_GRADE", grade.clone()).await,
        "Attempt not found or access denied",
    );

    let mut teacher = TestClient::login_as(&app, "teacher").await;
    assert_error(
        &teacher
            .request("SUBMIT_GRADE", json!({ "attempt_id": 4242, "score": 50 }))
            .await,
        "Attempt not found or access denied",
    );
    assert_eq!(teacher.request("SUBMIT_GRADE", grade).await["type"], "OK");
}

#[tokio::test]
async fn pending_attempts_list_open_answers() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 2, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    submit(
        &mut student,
        quiz_id,
        json!([
            { "question_id": q[0], "response": "1" },
            { "question_id": q[1], "response": "Because of history" }
        ]),
    )
    .await;

    let pending = teacher.request("GET_PENDING_ATTEMPTS", json!({})).await;
    let list = pending["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["student_name"], "alice");
    assert_eq!(list[0]["quiz_title"], "Capitals");
    assert_eq!(list[0]["class_name"], "10A");
    assert_eq!(
        list[0]["open_answers"],
        json!([{
            "question_id": q[1],
            "prompt": "Why is Paris the capital?",
            "student_response": "Because of history"
        }])
    );

    teacher
        .request(
            "SUBMIT_GRADE",
            json!({ "attempt_id": list[0]["attempt_id"], "score": 100 }),
        )
        .await;
    let pending = teacher.request("GET_PENDING_ATTEMPTS", json!({})).await;
    assert_eq!(pending["data"], json!([]));
}

#[tokio::test]
async fn my_attempts_and_quiz_attempts_views() {
    let app = spawn_app().await;
    let (_, quiz_id, q) = setup_quiz(&app, 2, "detailed_with_answers").await;
    let mut student = TestClient::login_as(&app, "alice").await;
    let answers = json!([{ "question_id": q[0], "response": "1" }]);
    submit(&mut student, quiz_id, answers.clone()).await;
    submit(&mut student, quiz_id, answers).await;

    let mine = student.request("GET_MY_ATTEMPTS", json!({})).await;
    let mine = mine["data"].as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0]["attempt_number"], 2);
    assert_eq!(mine[0]["course_name"], "Geography");

    let mut teacher = TestClient::login_as(&app, "teacher").await;
    let all = teacher
        .request("GET_STUDENT_ATTEMPTS_FOR_QUIZ", json!({ "quiz_id": quiz_id }))
        .await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
    assert_eq!(all["data"][0]["student_name"], "alice");
}

#[tokio::test]
async fn lessons_are_sanitized_and_deletable() {
    let app = spawn_app().await;
    let (_, course_id) = create_class_and_course(&app).await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    let created = teacher
        .request(
            "CREATE_LESSON",
            json!({
                "course_id": course_id,
                "title": "Rivers",
                "content": "<h1>Rivers</h1><script>steal()</script>"
            }),
        )
        .await;
    let lesson_id = created["lesson_id"].as_i64().unwrap();

    let mut student = TestClient::login_as(&app, "alice").await;
    let listed = student
        .request("GET_MATERIALS_FOR_COURSE", json!({ "course_id": course_id }))
        .await;
    assert_eq!(listed["data"][0]["type"], "lesson");
    assert_eq!(listed["data"][0]["title"], "Rivers");

    let lesson = student
        .request("GET_MATERIAL_DETAILS", json!({ "material_id": lesson_id }))
        .await;
    assert_eq!(lesson["data"]["content"], "<h1>Rivers</h1>");

    assert_eq!(
        teacher
            .request("DELETE_MATERIAL", json!({ "material_id": lesson_id }))
            .await["type"],
        "OK"
    );
    assert_error(
        &student
            .request("GET_MATERIAL_DETAILS", json!({ "material_id": lesson_id }))
            .await,
        "Material not found",
    );
}

#[tokio::test]
async fn invalid_quiz_definitions_are_rejected() {
    let app = spawn_app().await;
    let (_, course_id) = create_class_and_course(&app).await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    let two_correct = teacher
        .request(
            "CREATE_QUIZ_WITH_QUESTIONS",
            json!({
                "course_id": course_id,
                "title": "Broken",
                "questions": [{
                    "prompt": "Pick one",
                    "question_type": "radio",
                    "options": [
                        { "text": "a", "is_correct": true },
                        { "text": "b", "is_correct": true }
                    ]
                }]
            }),
        )
        .await;
    assert_eq!(two_correct["type"], "ERROR");

    let missing_course = teacher
        .request(
            "CREATE_QUIZ_WITH_QUESTIONS",
            json!({
                "course_id": 999,
                "title": "Lost",
                "questions": [{ "prompt": "Why?", "question_type": "open_answer" }]
            }),
        )
        .await;
    assert_error(&missing_course, "Course not found");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_materials")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn statistics_over_completed_attempts() {
    let app = spawn_app().await;
    let (course_id, quiz_id, q) = setup_quiz(&app, 2, "detailed_with_answers").await;
    let class_id: i64 = sqlx::query_scalar("SELECT class_id FROM courses WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    let mut student = TestClient::login_as(&app, "alice").await;
    let mut teacher = TestClient::login_as(&app, "teacher").await;

    let empty = teacher
        .request("GET_CLASS_STATISTICS", json!({ "class_id": class_id }))
        .await;
    assert_eq!(empty["data"]["student_count"], 1);
    assert_eq!(empty["data"]["average_score"], 0.0);

    for score in [40, 80] {
        let reply = submit(
            &mut student,
            quiz_id,
            json!([
                { "question_id": q[0], "response": "1" },
                { "question_id": q[1], "response": "text" }
            ]),
        )
        .await;
        teacher
            .request(
                "SUBMIT_GRADE",
                json!({ "attempt_id": reply["attempt_id"], "score": score }),
            )
            .await;
    }

    // Final scores 70 and 90.
    let class = teacher
        .request("GET_CLASS_STATISTICS", json!({ "class_id": class_id }))
        .await;
    assert_eq!(class["data"]["completed_attempts"], 2);
    assert_eq!(class["data"]["average_score"], 80.0);

    let course = teacher
        .request("GET_COURSE_STATISTICS", json!({ "course_id": course_id }))
        .await;
    assert_eq!(course["data"]["student_count"], 1);
    assert_eq!(course["data"]["average_score"], 80.0);

    assert_error(
        &teacher
            .request("GET_COURSE_STATISTICS", json!({ "course_id": 999 }))
            .await,
        "Course not found",
    );
}
