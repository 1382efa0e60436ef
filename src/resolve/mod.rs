pub mod path;
pub mod resolver;

pub use resolver::{EntryKind, Resolution, Resolver};
