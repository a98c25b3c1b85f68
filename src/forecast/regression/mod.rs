pub mod adapter;
pub mod engine;
pub mod harmonic;

pub use adapter::*;
pub use engine::*;
pub use harmonic::*;
