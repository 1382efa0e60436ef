pub mod mimetype;

pub use mimetype::{ContentClassifier, InferClassifier};
