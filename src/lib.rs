pub mod api_connection;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod daily_log;
pub mod export;
pub mod lenient;
pub mod meal_aggregator;
pub mod meal_builder;
pub mod nutrition;
pub mod search;
pub mod tracking;
