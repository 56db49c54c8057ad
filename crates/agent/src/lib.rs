pub mod extract;
pub mod intent;
pub mod llm;
pub mod runtime;

pub use intent::{AutonomousIntent, AutonomousOperation, Intent};
pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use runtime::{Orchestrator, QueryReport};
