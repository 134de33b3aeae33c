pub mod analysis;
pub mod daily_sentence;
pub mod entry;
pub mod practice;
pub mod question;
pub mod user;
