//! Path manifests for folder uploads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Content type tag of a manifest data item
pub const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";

pub const MANIFEST_TYPE: &str = "arweave/paths";
pub const MANIFEST_VERSION: &str = "0.2.0";

/// Preferred index document when the caller names none
pub const DEFAULT_INDEX_PATH: &str = "index.html";

/// Preferred fallback document when the caller names none
pub const DEFAULT_FALLBACK_PATH: &str = "404.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: String,
    pub version: String,
    pub index: ManifestIndex,
    pub paths: BTreeMap<String, ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIndex {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
}

impl Manifest {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Item id a path resolves to
    pub fn id_for(&self, path: &str) -> Option<&str> {
        self.paths.get(path).map(|entry| entry.id.as_str())
    }
}

/// Collects `(path, id)` pairs, then picks the index and fallback
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    entries: Vec<(String, String)>,
    index: Option<String>,
    fallback: Option<String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.entries.push((path.into(), id.into()));
        self
    }

    /// Path served at the manifest root
    pub fn index(&mut self, path: impl Into<String>) -> &mut Self {
        self.index = Some(path.into());
        self
    }

    /// Path served for unknown paths
    pub fn fallback(&mut self, path: impl Into<String>) -> &mut Self {
        self.fallback = Some(path.into());
        self
    }

    pub fn build(&self) -> Result<Manifest> {
        let mut paths = BTreeMap::new();
        for (path, id) in &self.entries {
            let previous = paths.insert(path.clone(), ManifestEntry { id: id.clone() });
            if previous.is_some() {
                return Err(CoreError::Validation(format!(
                    "duplicate manifest path {path}"
                )));
            }
        }

        let index = match &self.index {
            Some(path) if paths.contains_key(path) => path.clone(),
            Some(path) => {
                return Err(CoreError::Validation(format!(
                    "index path {path} is not in the manifest"
                )))
            }
            None if paths.contains_key(DEFAULT_INDEX_PATH) => DEFAULT_INDEX_PATH.to_string(),
            None => match self.entries.first() {
                Some((path, _)) => path.clone(),
                None => {
                    return Err(CoreError::Validation(
                        "manifest needs at least one path".to_string(),
                    ))
                }
            },
        };

        let fallback_path = match &self.fallback {
            Some(path) if paths.contains_key(path) => path.clone(),
            Some(path) => {
                return Err(CoreError::Validation(format!(
                    "fallback path {path} is not in the manifest"
                )))
            }
            None if paths.contains_key(DEFAULT_FALLBACK_PATH) => DEFAULT_FALLBACK_PATH.to_string(),
            None => index.clone(),
        };
        let fallback = paths.get(&fallback_path).cloned();

        Ok(Manifest {
            manifest: MANIFEST_TYPE.to_string(),
            version: MANIFEST_VERSION.to_string(),
            index: ManifestIndex { path: index },
            paths,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_index_html() {
        let manifest = ManifestBuilder::new()
            .add_path("index.html", "id-index")
            .build()
            .unwrap();
        assert_eq!(manifest.index.path, "index.html");
        assert_eq!(manifest.id_for("index.html"), Some("id-index"));
        assert_eq!(manifest.fallback, Some(ManifestEntry { id: "id-index".into() }));
    }

    #[test]
    fn test_index_html_preferred_over_first() {
        let manifest = ManifestBuilder::new()
            .add_path("app.js", "a")
            .add_path("index.html", "b")
            .build()
            .unwrap();
        assert_eq!(manifest.index.path, "index.html");
    }

    #[test]
    fn test_first_path_when_no_index_html() {
        let manifest = ManifestBuilder::new()
            .add_path("z.txt", "z")
            .add_path("a.txt", "a")
            .build()
            .unwrap();
        assert_eq!(manifest.index.path, "z.txt");
    }

    #[test]
    fn test_designated_index_and_fallback() {
        let manifest = ManifestBuilder::new()
            .add_path("index.html", "i")
            .add_path("home.html", "h")
            .add_path("404.html", "nf")
            .add_path("oops.html", "o")
            .index("home.html")
            .fallback("oops.html")
            .build()
            .unwrap();
        assert_eq!(manifest.index.path, "home.html");
        assert_eq!(manifest.fallback.unwrap().id, "o");
    }

    #[test]
    fn test_404_is_default_fallback() {
        let manifest = ManifestBuilder::new()
            .add_path("index.html", "i")
            .add_path("404.html", "nf")
            .build()
            .unwrap();
        assert_eq!(manifest.fallback.unwrap().id, "nf");
    }

    #[test]
    fn test_invalid_manifests() {
        assert!(ManifestBuilder::new().build().is_err());
        assert!(ManifestBuilder::new()
            .add_path("a", "1")
            .add_path("a", "2")
            .build()
            .is_err());
        assert!(ManifestBuilder::new()
            .add_path("a", "1")
            .index("missing")
            .build()
            .is_err());
    }

    #[test]
    fn test_json_shape() {
        let manifest = ManifestBuilder::new()
            .add_path("index.html", "abc")
            .build()
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&manifest.to_json_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "manifest": "arweave/paths",
                "version": "0.2.0",
                "index": { "path": "index.html" },
                "paths": { "index.html": { "id": "abc" } },
                "fallback": { "id": "abc" }
            })
        );
    }
}
