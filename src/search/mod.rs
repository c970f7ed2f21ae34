pub mod session;
pub mod single_flight;

pub use session::{SearchOutcome, SearchSession, SearchState};
pub use single_flight::{BarcodeScanner, FoodDetailLoader, LookupOutcome, SingleFlight};
