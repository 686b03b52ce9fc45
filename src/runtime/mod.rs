//! Container runtime capability consumed by the driver.
//!
//! The driver never talks to a container engine directly; it goes through
//! [`Runtime`] and [`Instance`] so the lifecycle and snapshot logic can run
//! against [`SingularityClient`] in production and an in-memory fake in tests.

pub mod client;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod naming;
pub mod singularity;

pub use client::{ExecOptions, ExecOutput, Instance, InstanceOptions, Runtime};
pub use singularity::{SingularityClient, SingularityInstance};
