pub mod forecast;
pub mod observations;
pub mod plant;

pub use forecast::*;
pub use observations::*;
pub use plant::*;
