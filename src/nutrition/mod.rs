pub mod labels;
pub mod normalizer;
pub mod scaler;
pub mod summary;

pub use labels::{display_name, portion_labels, serving_text};
pub use normalizer::{base_grams_for, normalize};
pub use scaler::{scale, supports_grams, ScaleRequest};
pub use summary::{MacroSummary, Totals};
