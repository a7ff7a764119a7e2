//! Optional LLM oracle consulted when local extraction is incomplete

pub mod oracle;
pub mod prompts;

pub use oracle::{OracleClient, OracleStatus};
