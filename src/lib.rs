pub mod drivers;
pub mod env;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod metadata;
pub mod runtime;
pub mod snapshot;

// Re-exports for easy access
pub use drivers::{Driver, DriverConfig, SingularityDriver};
pub use error::DriverError;
pub use metadata::{EnvVar, ImageConfig};
pub use runtime::{ExecOutput, Instance, Runtime, SingularityClient};
pub use snapshot::{FileInfo, FileType};
