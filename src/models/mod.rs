// src/models/mod.rs

pub mod attempt;
pub mod class;
pub mod course;
pub mod material;
pub mod question;
pub mod user;
