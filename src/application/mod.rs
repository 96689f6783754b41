pub mod collectors;
pub mod dedup;
pub mod embed;
pub mod evaluate;
pub mod ingest;
pub mod maintenance;
pub mod model_registry;
pub mod notify;
pub mod predict;
pub mod price_match;
pub mod price_service;
pub mod prompt;
pub mod response_parser;
pub mod report;
pub mod stats;
pub mod ticker_mapper;
