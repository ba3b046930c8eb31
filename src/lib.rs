pub mod api;
pub mod cmd;
pub mod core;
pub mod engine;
pub mod index;
pub mod seqdb;
