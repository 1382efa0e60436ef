pub mod metadata;
pub mod scanner;

pub use scanner::Scanner;
