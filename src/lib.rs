pub mod classify;
pub mod config;
pub mod docx;
pub mod engine;
pub mod error;
pub mod mutate;
pub mod numbering;
pub mod progress;
pub mod segment;
pub mod session;
pub mod stats;
pub mod table;
