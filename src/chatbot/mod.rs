//! "Make your own chatbot" from an exported chat log.
//!
//! The chatbot never generates text: it answers with whatever the selected
//! speaker said after the question most similar to the user's message.

mod index;
mod session;

pub use index::{IndexedQuestion, QuestionIndex, RetrievedAnswer};
pub use session::{ChatTurn, ChatbotSession, LoadedLog};
