pub mod content_type;
pub mod index_catalog;
pub mod levels;
pub mod market_calendar;
pub mod priority;
pub mod scoring;
pub mod sentiment;
pub mod title_similarity;
