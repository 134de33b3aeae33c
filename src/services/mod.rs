pub mod analysis;
pub mod completion;
pub mod notify;
