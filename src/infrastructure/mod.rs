pub mod cache;
pub mod embeddings;
pub mod encoding;
pub mod feeds;
pub mod kis;
pub mod llm;
pub mod notifiers;
pub mod retry;
pub mod scheduler;
pub mod sqlite;
