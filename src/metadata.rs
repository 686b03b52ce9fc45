use crate::runtime::Instance;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured environment variable; `value` may reference other variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::str::FromStr for EnvVar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(EnvVar::new(key, value)),
            _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
        }
    }
}

/// Image configuration as reported to the test harness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default, rename = "Env")]
    pub env: HashMap<String, String>,
    #[serde(default, rename = "Entrypoint")]
    pub entrypoint: Vec<String>,
    #[serde(default, rename = "Cmd")]
    pub cmd: Vec<String>,
    #[serde(default, rename = "Volumes")]
    pub volumes: Vec<String>,
    #[serde(default, rename = "WorkingDir")]
    pub working_dir: String,
    #[serde(default, rename = "ExposedPorts")]
    pub exposed_ports: Vec<String>,
    #[serde(default, rename = "Labels")]
    pub labels: HashMap<String, String>,
    #[serde(default, rename = "User")]
    pub user: String,
}

// Singularity images carry no entrypoint/cmd/volume/port metadata the runtime
// exposes, so only the environment and labels are projected.
pub fn from_instance<I: Instance>(instance: &I) -> ImageConfig {
    ImageConfig {
        env: instance.env().clone(),
        labels: instance.labels().clone(),
        ..ImageConfig::default()
    }
}
