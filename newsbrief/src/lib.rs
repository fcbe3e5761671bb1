// Library interface for newsbrief modules
// This allows tests and other binaries to import modules

pub mod digest;
pub mod error;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod llm;
pub mod server;
pub mod summarize;
