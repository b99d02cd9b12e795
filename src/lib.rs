//! Lektor - tool-augmented question answering over course materials
//!
//! Lektor indexes course documents (a header with title, link and
//! instructor followed by numbered lessons) and answers questions about
//! them. The model is offered two tools, a filtered semantic search over
//! lesson chunks and a course outline lookup, and may call them for a
//! bounded number of rounds before giving its answer. Answers come back
//! with deduplicated lesson citations.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `llm` - Model providers (Anthropic, OpenAI) behind the `ChatModel` trait
//! - `embedding` - Embedding generation
//! - `index` - Course index abstraction (SQLite, in-memory)
//! - `ingest` - Course document parsing and chunking
//! - `tools` - Search and outline tools, the tool registry and citation tracking
//! - `generator` - The bounded tool-calling loop
//! - `session` - Conversation history
//! - `assistant` - Everything above wired together
//! - `cli` - Command-line interface and HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use lektor::assistant::CourseAssistant;
//! use lektor::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = CourseAssistant::from_settings(&settings)?;
//!
//!     let response = assistant.query("What is covered in lesson 2 of the MCP course?", None).await?;
//!     println!("{}", response.answer);
//!     for source in &response.sources {
//!         println!("  {}", source.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod openai;
pub mod session;
pub mod tools;

pub use error::{LektorError, Result};
