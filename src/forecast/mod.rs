pub mod accuracy;
pub mod error;
pub mod moving_average;
pub mod normalize;
pub mod policy;
pub mod quality;
pub mod regression;
pub mod seasonality;
pub mod stats;

pub use accuracy::*;
pub use error::*;
pub use moving_average::*;
pub use normalize::*;
pub use policy::*;
pub use quality::*;
pub use regression::*;
pub use seasonality::*;
