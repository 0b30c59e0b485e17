pub mod api;
pub mod config;
pub mod db;
pub mod genai;
pub mod metrics;
pub mod reading_cache;
pub mod reports;
pub mod response_store;
pub mod store;

#[cfg(test)]
mod testing;
