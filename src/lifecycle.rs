//! Ownership of the driver's single "current" instance.
//!
//! [`InstanceManager`] is the only place the current instance changes. Work
//! that needs a live process goes through [`InstanceManager::start`], whose
//! [`Started`] guard stops the instance when it goes out of scope, so every
//! start is paired with a stop on success and error paths alike.

use crate::error::{DriverError, Result};
use crate::runtime::{naming, Instance, InstanceOptions, Runtime};
use log::{debug, warn};
use std::ops::Deref;

pub struct InstanceManager<R: Runtime> {
    runtime: R,
    current: R::Instance,
    original_image: String,
    current_image: String,
    instance_prefix: String,
    created: usize,
}

impl<R: Runtime> InstanceManager<R> {
    /// Creates the first instance from `image` with the image's own environment.
    pub fn new(runtime: R, image: &str, instance_prefix: &str) -> Result<Self> {
        let name = naming::instance_name(instance_prefix, image, 0);
        let current = create(&runtime, image, &name, &default_options(None))?;

        Ok(Self {
            runtime,
            current,
            original_image: image.to_string(),
            current_image: image.to_string(),
            instance_prefix: instance_prefix.to_string(),
            created: 1,
        })
    }

    pub fn current(&self) -> &R::Instance {
        &self.current
    }

    pub fn original_image(&self) -> &str {
        &self.original_image
    }

    pub fn current_image(&self) -> &str {
        &self.current_image
    }

    /// Builds a new instance from the current image with `env` and makes it current.
    ///
    /// On failure the current instance is left untouched.
    pub fn replace(&mut self, env: Option<Vec<String>>) -> Result<()> {
        let name = naming::instance_name(&self.instance_prefix, &self.current_image, self.created);
        let next = create(&self.runtime, &self.current_image, &name, &default_options(env))?;
        self.created += 1;
        self.swap(next);
        Ok(())
    }

    /// Stops the held instance (best effort) and replaces it with `next`.
    pub fn swap(&mut self, next: R::Instance) {
        let previous = std::mem::replace(&mut self.current, next);
        if let Err(e) = previous.stop() {
            warn!("Failed to stop replaced instance {}: {:#}", previous.name(), e);
        }
        debug!(
            "Swapped instance {} for {} ({})",
            previous.name(),
            self.current.name(),
            self.current.image()
        );
    }

    /// Starts the current instance for the lifetime of the returned guard.
    pub fn start(&self) -> anyhow::Result<Started<'_, R::Instance>> {
        self.current.start()?;
        Ok(Started {
            instance: &self.current,
        })
    }

    /// Stops every instance the runtime client created, current one included.
    pub fn stop_all(&self) {
        if let Err(e) = self.runtime.stop_all_instances() {
            warn!("Failed to stop all instances: {:#}", e);
        }
    }
}

/// Live access to a started instance; stops it on drop.
pub struct Started<'a, I: Instance> {
    instance: &'a I,
}

impl<I: Instance> Deref for Started<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.instance
    }
}

impl<I: Instance> Drop for Started<'_, I> {
    fn drop(&mut self) {
        if let Err(e) = self.instance.stop() {
            warn!("Failed to stop instance {}: {:#}", self.instance.name(), e);
        }
    }
}

fn default_options(env: Option<Vec<String>>) -> InstanceOptions {
    InstanceOptions {
        env,
        clean_env: true,
    }
}

fn create<R: Runtime>(
    runtime: &R,
    image: &str,
    name: &str,
    options: &InstanceOptions,
) -> Result<R::Instance> {
    runtime
        .new_instance(image, name, options)
        .map_err(|source| DriverError::Instantiation {
            image: image.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::{Call, MockRuntime};

    const IMAGE: &str = "/images/alpine.sif";

    #[test]
    fn test_new_creates_one_stopped_instance() {
        let runtime = MockRuntime::new();
        let manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();

        assert_eq!(manager.current().name(), "cst-alpine-0");
        assert_eq!(manager.original_image(), IMAGE);
        assert_eq!(manager.current_image(), IMAGE);
        assert_eq!(runtime.starts(), 0);
        assert!(matches!(runtime.calls()[0], Call::Create { .. }));
    }

    #[test]
    fn test_new_reports_instantiation_error() {
        let runtime = MockRuntime::new();
        runtime.fail_create(true);
        let err = InstanceManager::new(runtime, IMAGE, "cst").err().unwrap();
        assert!(matches!(err, DriverError::Instantiation { ref image, .. } if image == IMAGE));
    }

    #[test]
    fn test_started_guard_stops_on_drop() {
        let runtime = MockRuntime::new();
        let manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();

        {
            let started = manager.start().unwrap();
            assert_eq!(started.name(), "cst-alpine-0");
            assert_eq!(runtime.running(), vec!["cst-alpine-0".to_string()]);
        }

        assert!(runtime.running().is_empty());
        assert_eq!(runtime.starts(), 1);
        assert_eq!(runtime.stops(), 1);
    }

    #[test]
    fn test_failed_start_issues_no_stop() {
        let runtime = MockRuntime::new();
        let manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();
        runtime.fail_start(true);

        assert!(manager.start().is_err());
        assert_eq!(runtime.starts(), 0);
        assert_eq!(runtime.stops(), 0);
    }

    #[test]
    fn test_replace_stops_previous_exactly_once() {
        let runtime = MockRuntime::new();
        let mut manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();

        manager.replace(Some(vec!["FOO=bar".to_string()])).unwrap();

        assert_eq!(manager.current().name(), "cst-alpine-1");
        assert_eq!(manager.current().env()["FOO"], "bar");
        assert_eq!(manager.current().image(), IMAGE);
        assert_eq!(manager.current_image(), IMAGE);
        assert_eq!(runtime.stops_of("cst-alpine-0"), 1);
        assert_eq!(runtime.stops_of("cst-alpine-1"), 0);
    }

    #[test]
    fn test_failed_replace_keeps_current() {
        let runtime = MockRuntime::new();
        let mut manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();
        runtime.fail_create(true);

        assert!(manager.replace(None).is_err());
        assert_eq!(manager.current().name(), "cst-alpine-0");
        assert_eq!(runtime.stops(), 0);

        // The failed attempt does not burn a name.
        runtime.fail_create(false);
        manager.replace(None).unwrap();
        assert_eq!(manager.current().name(), "cst-alpine-1");
    }

    #[test]
    fn test_swap_ignores_stop_errors() {
        let runtime = MockRuntime::new();
        let mut manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();
        runtime.fail_stop(true);

        manager.replace(None).unwrap();
        assert_eq!(manager.current().name(), "cst-alpine-1");
    }

    #[test]
    fn test_stop_all_delegates_to_runtime() {
        let runtime = MockRuntime::new();
        let manager = InstanceManager::new(runtime.clone(), IMAGE, "cst").unwrap();
        manager.stop_all();
        manager.stop_all();
        assert_eq!(
            runtime.calls().iter().filter(|c| **c == Call::StopAll).count(),
            2
        );
    }
}
