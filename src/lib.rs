// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod handlers;
pub mod models;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod tls;
pub mod utils;

pub use server::serve;
pub use session::run_session;
