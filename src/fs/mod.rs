pub mod filesystem;
pub mod inode;
pub mod mount;

pub use filesystem::TagFs;
pub use mount::{mount, MountSettings};
