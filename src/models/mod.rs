// src/models/mod.rs

pub mod exam;
pub mod exam_session;
pub mod problem;
pub mod submission;
