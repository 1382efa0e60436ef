pub mod index;
pub mod model;
pub mod repo;
pub mod schema;
