pub mod documents;
pub mod service;
pub mod store;

pub use documents::{CloudMacros, CloudMeal, MacrosInput, MealPatch, NewCloudMeal, ServingInfo, ServingUnit};
pub use service::{CloudMeals, ListOptions, MealSubscription};
pub use store::{CloudError, InMemoryDocumentStore, MealDocumentStore};
