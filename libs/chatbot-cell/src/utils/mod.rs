pub mod formatters;
pub mod validators;

pub use formatters::*;
pub use validators::*;
