pub mod analyses;
pub mod auth;
pub mod daily_sentences;
pub mod entries;
pub mod health;
pub mod practices;
pub mod questions;
