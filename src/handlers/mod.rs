// src/handlers/mod.rs

pub mod admin;
pub mod exam_session;
pub mod results;
pub mod submission;
