// src/router.rs

use serde_json::Value;

use crate::{
    error::AppError,
    handlers::{attempts, auth, classes, courses, materials, quiz, stats, users},
    models::user::{Identity, Role},
    protocol::{Request, Response},
    session::Session,
    state::AppState,
};

const ADMIN: &[Role] = &[Role::Admin];
const INSTRUCTOR: &[Role] = &[Role::Instructor];
const STUDENT: &[Role] = &[Role::Student];
const STAFF: &[Role] = &[Role::Instructor, Role::Admin];

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Login,
    Logout,
    GetAllUsers,
    CreateUser,
    DeleteUser,
    GetAllClasses,
    CreateClass,
    DeleteClass,
    AssignUserToClass,
    RemoveUserFromClass,
    GetClassMembers,
    GetMyClasses,
    GetCoursesForClass,
    CreateCourse,
    DeleteCourse,
    GetMaterialsForCourse,
    GetMaterialDetails,
    CreateLesson,
    CreateQuizWithQuestions,
    DeleteMaterial,
    StartQuiz,
    FinishAttempt,
    GetMyAttempts,
    GetAttemptDetails,
    GetPendingAttempts,
    SubmitGrade,
    GetStudentAttemptsForQuiz,
    GetClassStatistics,
    GetCourseStatistics,
}

impl Command {
    pub const ALL: [Command; 29] = [
        Command::Login,
        Command::Logout,
        Command::GetAllUsers,
        Command::CreateUser,
        Command::DeleteUser,
        Command::GetAllClasses,
        Command::CreateClass,
        Command::DeleteClass,
        Command::AssignUserToClass,
        Command::RemoveUserFromClass,
        Command::GetClassMembers,
        Command::GetMyClasses,
        Command::GetCoursesForClass,
        Command::CreateCourse,
        Command::DeleteCourse,
        Command::GetMaterialsForCourse,
        Command::GetMaterialDetails,
        Command::CreateLesson,
        Command::CreateQuizWithQuestions,
        Command::DeleteMaterial,
        Command::StartQuiz,
        Command::FinishAttempt,
        Command::GetMyAttempts,
        Command::GetAttemptDetails,
        Command::GetPendingAttempts,
        Command::SubmitGrade,
        Command::GetStudentAttemptsForQuiz,
        Command::GetClassStatistics,
        Command::GetCourseStatistics,
    ];

    /// Wire name, matched case-sensitively.
    pub fn name(self) -> &'static str {
        match self {
            Command::Login => "LOGIN",
            Command::Logout => "LOGOUT",
            Command::GetAllUsers => "GET_ALL_USERS",
            Command::CreateUser => "CREATE_USER",
            Command::DeleteUser => "DELETE_USER",
            Command::GetAllClasses => "GET_ALL_CLASSES",
            Command::CreateClass => "CREATE_CLASS",
            Command::DeleteClass => "DELETE_CLASS",
            Command::AssignUserToClass => "ASSIGN_USER_TO_CLASS",
            Command::RemoveUserFromClass => "REMOVE_USER_FROM_CLASS",
            Command::GetClassMembers => "GET_CLASS_MEMBERS",
            Command::GetMyClasses => "GET_MY_CLASSES",
            Command::GetCoursesForClass => "GET_COURSES_FOR_CLASS",
            Command::CreateCourse => "CREATE_COURSE",
            Command::DeleteCourse => "DELETE_COURSE",
            Command::GetMaterialsForCourse => "GET_MATERIALS_FOR_COURSE",
            Command::GetMaterialDetails => "GET_MATERIAL_DETAILS",
            Command::CreateLesson => "CREATE_LESSON",
            Command::CreateQuizWithQuestions => "CREATE_QUIZ_WITH_QUESTIONS",
            Command::DeleteMaterial => "DELETE_MATERIAL",
            Command::StartQuiz => "START_QUIZ",
            Command::FinishAttempt => "FINISH_ATTEMPT",
            Command::GetMyAttempts => "GET_MY_ATTEMPTS",
            Command::GetAttemptDetails => "GET_ATTEMPT_DETAILS",
            Command::GetPendingAttempts => "GET_PENDING_ATTEMPTS",
            Command::SubmitGrade => "SUBMIT_GRADE",
            Command::GetStudentAttemptsForQuiz => "GET_STUDENT_ATTEMPTS_FOR_QUIZ",
            Command::GetClassStatistics => "GET_CLASS_STATISTICS",
            Command::GetCourseStatistics => "GET_COURSE_STATISTICS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn access(self) -> Access {
        match self {
            Command::Login | Command::Logout => Access::Public,

            Command::GetMyClasses
            | Command::GetCoursesForClass
            | Command::GetMaterialsForCourse
            | Command::GetMaterialDetails
            | Command::GetAttemptDetails => Access::Authenticated,

            Command::GetAllUsers
            | Command::CreateUser
            | Command::DeleteUser
            | Command::GetAllClasses
            | Command::CreateClass
            | Command::DeleteClass
            | Command::AssignUserToClass
            | Command::RemoveUserFromClass
            | Command::GetClassMembers
            | Command::CreateCourse
            | Command::DeleteCourse => Access::Roles(ADMIN),

            Command::GetStudentAttemptsForQuiz
            | Command::GetClassStatistics
            | Command::GetCourseStatistics => Access::Roles(STAFF),

            Command::CreateLesson
            | Command::CreateQuizWithQuestions
            | Command::DeleteMaterial
            | Command::GetPendingAttempts
            | Command::SubmitGrade => Access::Roles(INSTRUCTOR),

            Command::StartQuiz | Command::FinishAttempt | Command::GetMyAttempts => {
                Access::Roles(STUDENT)
            }
        }
    }
}

/// Access guard. A missing identity always wins over a role mismatch.
pub fn authorize(access: Access, identity: Option<&Identity>) -> Result<(), AppError> {
    match access {
        Access::Public => Ok(()),
        Access::Authenticated => identity.map(|_| ()).ok_or(AppError::Unauthenticated),
        Access::Roles(roles) => {
            let identity = identity.ok_or(AppError::Unauthenticated)?;
            if roles.contains(&identity.role) {
                Ok(())
            } else {
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Resolves, guards and runs one request. Always yields exactly one response.
pub async fn dispatch(state: &AppState, session: &mut Session, request: Request) -> Response {
    let Some(command) = Command::from_name(&request.command) else {
        tracing::debug!("Unknown command {:?}", request.command);
        return Response::error("Unknown command");
    };

    if let Err(e) = authorize(command.access(), session.identity()) {
        tracing::info!(
            "Rejected {} for {}: {}",
            command.name(),
            session
                .identity()
                .map_or("anonymous", |identity| identity.username.as_str()),
            e
        );
        return e.into_response();
    }

    tracing::debug!(
        user_id = session.identity().map(|identity| identity.user_id),
        "Handling {}",
        command.name()
    );
    match execute(state, session, command, request.data).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn execute(
    state: &AppState,
    session: &mut Session,
    command: Command,
    data: Value,
) -> Result<Response, AppError> {
    match command {
        Command::Login => auth::login(state, session, data).await,
        Command::Logout => Ok(auth::logout(session)),

        Command::GetAllUsers => users::list_users(state).await,
        Command::CreateUser => users::create_user(state, data).await,
        Command::DeleteUser => users::delete_user(state, &session.actor()?, data).await,

        Command::GetAllClasses => classes::list_classes(state).await,
        Command::CreateClass => classes::create_class(state, data).await,
        Command::DeleteClass => classes::delete_class(state, data).await,
        Command::AssignUserToClass => classes::assign_user(state, data).await,
        Command::RemoveUserFromClass => classes::remove_user(state, data).await,
        Command::GetClassMembers => classes::list_members(state, data).await,
        Command::GetMyClasses => classes::my_classes(state, &session.actor()?).await,

        Command::GetCoursesForClass => courses::list_for_class(state, data).await,
        Command::CreateCourse => courses::create_course(state, data).await,
        Command::DeleteCourse => courses::delete_course(state, data).await,

        Command::GetMaterialsForCourse => materials::list_for_course(state, data).await,
        Command::GetMaterialDetails => {
            materials::material_details(state, &session.actor()?, data).await
        }
        Command::CreateLesson => materials::create_lesson(state, &session.actor()?, data).await,
        Command::CreateQuizWithQuestions => {
            materials::create_quiz(state, &session.actor()?, data).await
        }
        Command::DeleteMaterial => materials::delete_material(state, data).await,

        Command::StartQuiz => quiz::start_quiz(state, &session.actor()?, data).await,
        Command::FinishAttempt => quiz::finish_attempt(state, &session.actor()?, data).await,

        Command::GetMyAttempts => attempts::my_attempts(state, &session.actor()?).await,
        Command::GetAttemptDetails => {
            attempts::attempt_details(state, &session.actor()?, data).await
        }
        Command::GetPendingAttempts => {
            attempts::pending_attempts(state, &session.actor()?).await
        }
        Command::SubmitGrade => attempts::submit_grade(state, &session.actor()?, data).await,
        Command::GetStudentAttemptsForQuiz => {
            attempts::attempts_for_quiz(state, &session.actor()?, data).await
        }

        Command::GetClassStatistics => stats::class_statistics(state, data).await,
        Command::GetCourseStatistics => stats::course_statistics(state, data).await,
    }
}
