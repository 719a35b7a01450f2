pub mod results;
pub mod query_engine;
