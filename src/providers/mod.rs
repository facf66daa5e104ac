//! AI provider implementations.

pub mod openai;
pub use openai::OpenAIProvider;

pub mod simulated;
pub use simulated::SimulatedProvider;

pub mod mock;
pub use mock::{MockProvider, MockReply};
