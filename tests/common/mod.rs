// tests/common/mod.rs
#![allow(dead_code)]

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use lms_server::{
    config::Config, db, models::user::Role, run_session, state::AppState,
    utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf},
    task::JoinHandle,
};

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub state: AppState,
    pub admin_id: i64,
    pub instructor_id: i64,
    pub student_id: i64,
}

impl TestApp {
    pub fn pool(&self) -> &SqlitePool {
        &self.state.pool
    }
}

/// Fresh in-memory database with one admin, instructor and student
/// (`admin`, `teacher`, `alice`; all use [`PASSWORD`]).
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Config::default()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    seed_app(pool, config).await
}

/// Same seeding as [`spawn_app`], backed by a fresh database file with a multi-connection
/// pool. Returns the file path so the caller can remove it.
pub async fn spawn_file_app(max_connections: u32) -> (TestApp, PathBuf) {
    let path = std::env::temp_dir().join(format!("lms-test-{}.db", uuid::Uuid::new_v4()));
    let config = Config {
        database_url: format!("sqlite://{}", path.display()),
        db_max_connections: max_connections,
        ..Config::default()
    };
    let pool = db::connect(&config)
        .await
        .expect("Failed to open database file");

    (seed_app(pool, config).await, path)
}

async fn seed_app(pool: SqlitePool, config: Config) -> TestApp {
    db::migrate(&pool).await.expect("Failed to migrate database");

    let admin_id = seed_user(&pool, "admin", Role::Admin).await;
    let instructor_id = seed_user(&pool, "teacher", Role::Instructor).await;
    let student_id = seed_user(&pool, "alice", Role::Student).await;

    TestApp {
        state: AppState::new(pool, config),
        admin_id,
        instructor_id,
        student_id,
    }
}

pub async fn seed_user(pool: &SqlitePool, username: &str, role: Role) -> i64 {
    let hash = hash_password(PASSWORD).unwrap();
    sqlx::query_scalar(
        "INSERT INTO users (username, password_hash, role) VALUES (?, ?, ?) RETURNING user_id",
    )
    .bind(username)
    .bind(hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to seed user")
}

/// A client speaking the line protocol to a real session task over an in-memory pipe.
pub struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    pub session: JoinHandle<()>,
}

impl TestClient {
    pub async fn connect(app: &TestApp) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let session = tokio::spawn(run_session(server, peer, app.state.clone()));
        let (reader, writer) = tokio::io::split(client);
        Self {
            reader: BufReader::new(reader),
            writer,
            session,
        }
    }

    /// Connects and logs in, panicking if the login is refused.
    pub async fn login_as(app: &TestApp, username: &str) -> Self {
        let mut client = Self::connect(app).await;
        let reply = client.login(username, PASSWORD).await;
        assert_eq!(reply["type"], "LOGIN_SUCCESS", "login failed: {}", reply);
        client
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn send(&mut self, command: &str, data: Value) {
        let mut line = serde_json::to_vec(&json!({ "command": command, "data": data })).unwrap();
        line.push(b'\n');
        self.send_raw(&line).await;
    }

    /// Next response line, or `None` once the server closed the stream.
    pub async fn try_read(&mut self) -> Option<Value> {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_secs(10), self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a response")
            .unwrap();
        if read == 0 {
            return None;
        }
        assert!(line.ends_with('\n'));
        Some(serde_json::from_str(line.trim_end()).expect("Response is not JSON"))
    }

    pub async fn read(&mut self) -> Value {
        self.try_read().await.expect("Connection closed")
    }

    pub async fn request(&mut self, command: &str, data: Value) -> Value {
        self.send(command, data).await;
        self.read().await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Value {
        self.request(
            "LOGIN",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Closes the client side and waits for the session task to finish.
    pub async fn close(self) {
        drop(self.writer);
        drop(self.reader);
        tokio::time::timeout(Duration::from_secs(5), self.session)
            .await
            .expect("Session did not stop")
            .unwrap();
    }
}

/// Asserts an `ERROR` envelope with the given message.
pub fn assert_error(reply: &Value, message: &str) {
    assert_eq!(reply["type"], "ERROR", "expected error, got {}", reply);
    assert_eq!(reply["message"], message);
}

/// Class + course created by the admin. Returns `(class_id, course_id)`.
pub async fn create_class_and_course(app: &TestApp) -> (i64, i64) {
    let mut admin = TestClient::login_as(app, "admin").await;

    let reply = admin
        .request("CREATE_CLASS", json!({ "class_name": "10A" }))
        .await;
    let class_id = reply["class_id"].as_i64().expect("class_id");

    let reply = admin
        .request(
            "CREATE_COURSE",
            json!({ "course_name": "Geography", "class_id": class_id }),
        )
        .await;
    let course_id = reply["course_id"].as_i64().expect("course_id");

    for user_id in [app.instructor_id, app.student_id] {
        let reply = admin
            .request(
                "ASSIGN_USER_TO_CLASS",
                json!({ "user_id": user_id, "class_id": class_id }),
            )
            .await;
        assert_eq!(reply["type"], "OK");
    }

    (class_id, course_id)
}

/// Question ids of a quiz, in authoring order.
pub async fn question_ids(app: &TestApp, quiz_id: i64) -> Vec<i64> {
    sqlx::query_scalar("SELECT question_id FROM questions WHERE quiz_id = ? ORDER BY position")
        .bind(quiz_id)
        .fetch_all(app.pool())
        .await
        .unwrap()
}

/// Creates a quiz as `teacher` and returns `(quiz_id, question_ids)`.
pub async fn create_quiz(app: &TestApp, course_id: i64, quiz: Value) -> (i64, Vec<i64>) {
    let mut teacher = TestClient::login_as(app, "teacher").await;
    let mut payload = quiz;
    payload["course_id"] = json!(course_id);

    let reply = teacher
        .request("CREATE_QUIZ_WITH_QUESTIONS", payload)
        .await;
    assert_eq!(reply["type"], "OK", "quiz creation failed: {}", reply);
    let quiz_id = reply["quiz_id"].as_i64().expect("quiz_id");

    (quiz_id, question_ids(app, quiz_id).await)
}

/// One radio question (correct index 1) followed by one open answer.
pub fn radio_and_open_quiz(max_attempts: i64, feedback_type: &str) -> Value {
    json!({
        "title": "Capitals",
        "max_attempts": max_attempts,
        "feedback_type": feedback_type,
        "questions": [
            {
                "prompt": "Capital of France?",
                "question_type": "radio",
                "options": [
                    { "text": "Berlin", "is_correct": false },
                    { "text": "Paris", "is_correct": true }
                ]
            },
            { "prompt": "Why is Paris the capital?", "question_type": "open_answer" }
        ]
    })
}
