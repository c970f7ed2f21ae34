pub mod connection;
pub mod endpoints;

pub use connection::{pick_barcode_match, ApiConnectionError, FoodLookup};
pub use endpoints::{FoodRecord, Provider, SearchRequest, SearchResponse};
