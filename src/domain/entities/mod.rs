pub mod content_item;
pub mod evaluation;
pub mod market_data;
pub mod model;
pub mod prediction;
pub mod report;
pub mod ticker;
