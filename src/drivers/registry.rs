//! Bridges specfile driver names to spawnable [`DriverSpec`]s (§4.2, §6).
//!
//! The specfile only ever names a driver by a bare string (`driver="blob"`);
//! it says nothing about where that driver's executable lives, how it's
//! invoked, or how many instances to run. A small JSON registry file,
//! loaded once at boot and re-read on every specfile reload, supplies that
//! missing half so [`crate::drivers::Supervisor::start_group`] has
//! something to call.

use crate::drivers::DriverSpec;
use crate::error::{AgError, AgResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    exec_path: PathBuf,
    argv_role: String,
    #[serde(default)]
    env: HashMap<String, String>,
    num_instances: usize,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    drivers: HashMap<String, RegistryEntry>,
}

/// Driver name -> spawn parameters, loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    specs: HashMap<String, DriverSpec>,
}

impl DriverRegistry {
    pub fn load(path: &Path) -> AgResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: RegistryFile = serde_json::from_str(&text)
            .map_err(|e| AgError::InvalidSpecfile(format!("driver registry {}: {e}", path.display())))?;
        let specs = parsed
            .drivers
            .into_iter()
            .map(|(query_type, entry)| {
                let spec = DriverSpec {
                    query_type: query_type.clone(),
                    exec_path: entry.exec_path,
                    argv_role: entry.argv_role,
                    env: entry.env.into_iter().collect(),
                    num_instances: entry.num_instances,
                };
                (query_type, spec)
            })
            .collect();
        Ok(DriverRegistry { specs })
    }

    pub fn get(&self, driver_name: &str) -> Option<&DriverSpec> {
        self.specs.get(driver_name)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }
}

/// Starts a proc-group for every distinct driver name the namespace
/// references that isn't already running, and reloads any that are.
/// A name with no registry entry is logged and left unregistered; it
/// will surface as `AgError::NoSuchDriver` the first time a request
/// actually needs it, rather than failing the whole boot or reload.
pub fn sync_groups(
    supervisor: &crate::drivers::Supervisor,
    registry: &DriverRegistry,
    driver_names: impl IntoIterator<Item = String>,
) {
    let mut seen = HashSet::new();
    for name in driver_names {
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        let Some(spec) = registry.get(&name) else {
            log::warn!("namespace references driver '{name}' with no registry entry");
            continue;
        };
        let result = if supervisor.group(&name).is_some() {
            supervisor.reload_group(spec.clone(), &[], &[], &[])
        } else {
            supervisor.start_group(spec.clone(), &[], &[], &[])
        };
        if let Err(e) = result {
            log::warn!("failed to start driver pool '{name}': {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_registry_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivers.json");
        std::fs::write(
            &path,
            r#"{"drivers": {"blob": {"exec_path": "/bin/true", "argv_role": "worker", "num_instances": 2}}}"#,
        )
        .unwrap();
        let reg = DriverRegistry::load(&path).unwrap();
        let spec = reg.get("blob").unwrap();
        assert_eq!(spec.query_type, "blob");
        assert_eq!(spec.num_instances, 2);
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivers.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(DriverRegistry::load(&path).is_err());
    }
}
