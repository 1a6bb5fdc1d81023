//! CLI command implementations.

mod ask;
mod chatbot;
mod config;
mod doctor;
mod pairs;
mod serve;

pub use ask::run_ask;
pub use chatbot::run_chatbot;
pub use config::run_config;
pub use doctor::run_doctor;
pub use pairs::run_pairs;
pub use serve::run_serve;
