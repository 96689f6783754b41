pub mod cache;
pub mod content_repository;
pub mod embedding_port;
pub mod evaluation_repository;
pub mod llm_provider;
pub mod market_data_repository;
pub mod market_data_source;
pub mod model_repository;
pub mod notifier;
pub mod prediction_repository;
pub mod report_repository;
pub mod ticker_repository;
pub mod vector_store;
