pub mod analytics;
pub mod forecast;
pub mod types;

pub use analytics::*;
pub use forecast::*;
pub use types::*;
