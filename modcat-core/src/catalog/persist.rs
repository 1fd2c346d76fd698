//! Catalog files (YAML)

use std::path::Path;

use super::store::Catalog;
use crate::error::{CatalogError, Result};

impl Catalog {
    /// Parse a catalog from YAML; indices are built on the way in
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).map_err(|source| CatalogError::Parse {
            what: "catalog YAML".to_string(),
            source,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|source| CatalogError::Parse {
            what: "catalog for serialization".to_string(),
            source,
        })
    }

    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_yaml(&content).map_err(|err| match err {
            CatalogError::Parse { source, .. } => CatalogError::Parse {
                what: path.display().to_string(),
                source,
            },
            other => other,
        })?;

        tracing::debug!(
            "Loaded catalog version {} from {} ({} mods)",
            catalog.version(),
            path.display(),
            catalog.mods().len()
        );
        Ok(catalog)
    }

    /// Write the catalog, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = self.to_yaml()?;
        std::fs::write(path, content).map_err(io_err)?;

        tracing::debug!(
            "Saved catalog version {} to {}",
            self.version(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Author, Compatibility, CompatibilityStatus, Exclusion, ExclusionCategory, Group, Mod,
        ModStatus, Stability,
    };
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_catalog() -> Catalog {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut catalog = Catalog::new().with_version(12, now);
        catalog.note = "Reviewed against 1.17".to_string();

        let mut a = Mod::new(2_000_001, "Traffic Helper");
        a.author_id = 7;
        a.stability = Stability::MinorIssues;
        a.statuses.insert(ModStatus::SourceUnavailable);
        a.required_mods = vec![10];
        a.updated = Some(now);
        catalog.add_mod(a).unwrap();
        catalog.add_mod(Mod::new(10, "Builtin A")).unwrap();
        catalog.add_mod(Mod::new(20, "Builtin B")).unwrap();
        catalog.add_group(Group::new(1_000, "Builtins", vec![10, 20])).unwrap();
        catalog
            .add_compatibility(Compatibility::new(
                2_000_001,
                10,
                CompatibilityStatus::MinorIssues,
                "flicker",
            ))
            .unwrap();
        catalog.add_author(Author::new(7, "", "Seven")).unwrap();
        catalog
            .add_exclusion(Exclusion::new(
                2_000_001,
                ExclusionCategory::SourceUrl,
                None,
            ))
            .unwrap();
        catalog.add_required_asset(3_000_000);
        catalog
    }

    #[test]
    fn test_yaml_round_trip() {
        let catalog = sample_catalog();
        let yaml = catalog.to_yaml().unwrap();
        let loaded = Catalog::from_yaml(&yaml).unwrap();

        assert_eq!(loaded, catalog);
        assert_eq!(loaded.group_of(20).unwrap().id, 1_000);
        assert_eq!(loaded.needed_for(1_000), vec![2_000_001]);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("catalog.yaml");

        let catalog = sample_catalog();
        catalog.save(&path).unwrap();
        let loaded = Catalog::load(&path).unwrap();

        assert_eq!(loaded.mods(), catalog.mods());
        assert_eq!(loaded.exclusions(), catalog.exclusions());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Catalog::load(&temp_dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        std::fs::write(&path, "version: [not a number").unwrap();

        let err = Catalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
