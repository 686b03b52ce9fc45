pub mod driver;
pub mod singularity;

pub use driver::{Driver, DriverConfig};
pub use singularity::SingularityDriver;
