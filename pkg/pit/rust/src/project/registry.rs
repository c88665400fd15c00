// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::io::ErrorKind;

use log::info;

use super::config::ProjectConfig;
use super::runtime::ProjectRuntime;
use crate::error::{Error, Result};
use crate::layout::Layout;

/// Catalogue of projects under `projects/`. Holds no process state: every
/// `load` re-reads the persisted config.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    layout: Layout,
}

pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('/') || name.contains('\0') {
        "name contains a path separator"
    } else if name.starts_with('_') || name.starts_with('.') {
        "names starting with '_' or '.' are reserved"
    } else {
        return Ok(());
    };
    Err(Error::InvalidProject {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

impl ProjectRegistry {
    pub fn new(layout: &Layout) -> Self {
        Self {
            layout: layout.clone(),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.layout.project_dir(name).is_dir()
    }

    /// Create `projects/<name>/` with its document root and a default config.
    pub fn create(&self, name: &str) -> Result<ProjectConfig> {
        validate_name(name)?;
        if self.layout.project_dir(name).exists() {
            return Err(Error::ProjectExists(name.to_string()));
        }

        let config = ProjectConfig::new(name);
        fs::create_dir_all(self.layout.project_dir(name).join(&config.root))?;
        config.save(&self.layout.project_config(name))?;

        info!("[project:{name}] created (port={}, php={})", config.port, config.php_version);
        Ok(config)
    }

    /// Project names, sorted. A missing `projects/` directory means none.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.layout.projects_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| validate_name(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn load_config(&self, name: &str) -> Result<ProjectConfig> {
        if !self.exists(name) {
            return Err(Error::ProjectNotFound(name.to_string()));
        }
        ProjectConfig::load(&self.layout.project_config(name))
    }

    /// Persist `config` for `name`. Running processes are not touched.
    pub fn save_config(&self, name: &str, config: &ProjectConfig) -> Result<()> {
        if !self.exists(name) {
            return Err(Error::ProjectNotFound(name.to_string()));
        }
        if config.name != name {
            return Err(Error::InvalidProject {
                name: name.to_string(),
                reason: format!("config names project {:?}", config.name),
            });
        }
        config.save(&self.layout.project_config(name))
    }

    /// A fresh runtime bound to the config currently on disk.
    pub fn load(&self, name: &str) -> Result<ProjectRuntime> {
        let config = self.load_config(name)?;
        Ok(ProjectRuntime::new(&self.layout, config))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, ProjectRegistry) {
        let base = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::new(&Layout::new(base.path()));
        (base, registry)
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("acme").is_ok());
        assert!(validate_name("my-shop_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("_tools").is_err());
        assert!(validate_name(".hidden").is_err());
    }

    #[test]
    fn test_create_defaults_and_refuses_existing() {
        let (base, registry) = registry();

        let cfg = registry.create("acme").unwrap();
        assert_eq!(cfg, ProjectConfig::new("acme"));
        assert!(base.path().join("projects/acme/public").is_dir());
        assert!(base.path().join("projects/acme/.pit/config.json").is_file());

        let err = registry.create("acme").unwrap_err();
        assert!(matches!(err, Error::ProjectExists(ref n) if n == "acme"));
    }

    #[test]
    fn test_list_sorted_and_missing_dir() {
        let (base, registry) = registry();
        assert!(registry.list().unwrap().is_empty());

        registry.create("zeta").unwrap();
        registry.create("alpha").unwrap();
        fs::write(base.path().join("projects/notes.txt"), "").unwrap();

        assert_eq!(registry.list().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_config_round_trip() {
        let (base, registry) = registry();
        registry.create("acme").unwrap();
        let path = base.path().join("projects/acme/.pit/config.json");
        let original = fs::read_to_string(&path).unwrap();

        let cfg = registry.load_config("acme").unwrap();
        registry.save_config("acme", &cfg).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_load_picks_up_out_of_band_edits() {
        let (base, registry) = registry();
        registry.create("acme").unwrap();
        fs::write(
            base.path().join("projects/acme/.pit/config.json"),
            r#"{"name":"acme","php_version":"74","port":12000,"root":"web"}"#,
        )
        .unwrap();

        let runtime = registry.load("acme").unwrap();
        assert_eq!(runtime.config().port, 12000);
        assert_eq!(runtime.config().php_version, "74");
    }

    #[test]
    fn test_unknown_project() {
        let (_base, registry) = registry();
        assert!(matches!(registry.load("ghost"), Err(Error::ProjectNotFound(_))));
        assert!(matches!(
            registry.save_config("ghost", &ProjectConfig::new("ghost")),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_save_config_rejects_mismatch_and_bad_port() {
        let (_base, registry) = registry();
        registry.create("acme").unwrap();

        let other = ProjectConfig::new("other");
        assert!(matches!(
            registry.save_config("acme", &other),
            Err(Error::InvalidProject { .. })
        ));

        let mut cfg = registry.load_config("acme").unwrap();
        cfg.port = 65500;
        assert!(registry.save_config("acme", &cfg).is_err());
        assert_eq!(registry.load_config("acme").unwrap().port, 10000);
    }
}
