//! Check loader - loads YAML check definitions from disk

use crate::{CheckRegistry, RuleCheck};
use posture_core::{Check, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Load all checks from a directory into a fresh registry
pub fn load_checks_from_dir(dir: impl AsRef<Path>) -> Result<CheckRegistry> {
    let mut registry = CheckRegistry::new();
    extend_from_dir(&mut registry, dir)?;
    Ok(registry)
}

/// Add every `*.yaml` / `*.yml` definition under `dir` (recursively)
///
/// Malformed files and duplicate ids are logged and skipped. Returns the
/// number of checks added.
pub fn extend_from_dir(registry: &mut CheckRegistry, dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Err(Error::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    info!("Loading checks from: {}", dir.display());
    let before = registry.len();
    load_recursive(registry, dir)?;
    let added = registry.len() - before;

    info!("Loaded {} checks from {}", added, dir.display());
    Ok(added)
}

fn load_recursive(registry: &mut CheckRegistry, dir: &Path) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    // Deterministic registration order
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            load_recursive(registry, &path)?;
        } else if let Some(ext) = path.extension() {
            if ext == "yaml" || ext == "yml" {
                match load_yaml_check(&path) {
                    Ok(check) => {
                        let id = check.metadata().id.clone();
                        match registry.register(Arc::new(check)) {
                            Ok(()) => debug!("Loaded check: {} from {}", id, path.display()),
                            Err(e) => warn!("Skipping {}: {}", path.display(), e),
                        }
                    }
                    Err(e) => {
                        warn!("Failed to load check from {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_yaml_check(path: &Path) -> Result<RuleCheck> {
    let content = std::fs::read_to_string(path)?;

    RuleCheck::from_yaml(&content).map_err(|message| Error::InvalidCheckDefinition {
        path: path.display().to_string(),
        message,
    })
}
