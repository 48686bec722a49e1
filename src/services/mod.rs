// src/services/mod.rs

//! Exam domain logic. Every function takes its collaborators explicitly so
//! handlers, the background reconciler and tests share one code path.

pub mod access;
pub mod dispatcher;
pub mod reconciler;
pub mod session;
pub mod stats;

#[cfg(test)]
mod testing;
