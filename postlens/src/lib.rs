// Library interface for postlens modules
// This allows tests and other binaries to import modules

pub mod coordinator;
pub mod llm;
pub mod server;
pub mod storage;
pub mod summary;
