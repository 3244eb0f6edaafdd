//! Compiled contract artifacts.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;

use crate::{IgnisError, Result};

/// Directories skipped when searching for artifacts.
const IGNORED_DIRS: &[&str] = &["build-info", "cache", "node_modules"];

/// A compiled contract unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Number of constructor parameters declared by the ABI.
    pub fn constructor_arity(&self) -> usize {
        self.abi
            .constructor
            .as_ref()
            .map_or(0, |constructor| constructor.inputs.len())
    }
}

/// Supplies compiled contract metadata by name.
pub trait ArtifactProvider {
    /// Fails with [`IgnisError::UnknownArtifact`] when `name` is unknown.
    fn artifact(&self, name: &str) -> Result<Artifact>;
}

impl ArtifactProvider for HashMap<String, Artifact> {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        self.get(name).cloned().ok_or_else(|| IgnisError::UnknownArtifact {
            name: name.to_string(),
        })
    }
}

/// Bytecode as emitted by Hardhat (plain hex) or Foundry (`{ "object": hex }`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    bytecode: RawBytecode,
}

/// Reads artifacts from a Foundry `out/` or Hardhat `artifacts/` directory.
///
/// Both toolchains lay compiled contracts out as `<File>.sol/<Name>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse an artifact file.
    pub fn parse(name: &str, content: &str) -> Result<Artifact> {
        let raw: RawArtifact =
            serde_json::from_str(content).map_err(|e| IgnisError::InvalidArtifact {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let bytecode = match raw.bytecode {
            RawBytecode::Hex(bytes) | RawBytecode::Object { object: bytes } => bytes,
        };

        if bytecode.is_empty() {
            return Err(IgnisError::InvalidArtifact {
                name: name.to_string(),
                reason: "artifact has no creation bytecode (abstract contract or interface?)"
                    .to_string(),
            });
        }

        Ok(Artifact {
            name: name.to_string(),
            abi: raw.abi,
            bytecode,
        })
    }

    fn locate(&self, name: &str) -> Result<PathBuf> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();
        self.collect_matches(&self.root, &file_name, &mut found)?;
        found.sort();

        match found.len() {
            0 => Err(IgnisError::UnknownArtifact {
                name: name.to_string(),
            }),
            1 => Ok(found.remove(0)),
            _ => Err(IgnisError::InvalidArtifact {
                name: name.to_string(),
                reason: format!(
                    "ambiguous artifact name, candidates: {}",
                    found
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }

    fn collect_matches(&self, dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| IgnisError::InvalidArtifact {
            name: file_name.to_string(),
            reason: format!("failed to read {}: {e}", dir.display()),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let skip = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| IGNORED_DIRS.contains(&n));
                if !skip {
                    self.collect_matches(&path, file_name, found)?;
                }
                continue;
            }

            let in_source_dir = dir
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".sol"));
            if in_source_dir && path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
                found.push(path);
            }
        }

        Ok(())
    }
}

impl ArtifactProvider for ArtifactStore {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        let path = self.locate(name)?;
        let content = std::fs::read_to_string(&path).map_err(|e| IgnisError::InvalidArtifact {
            name: name.to_string(),
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        tracing::debug!(artifact = %name, path = %path.display(), "Artifact loaded");
        Self::parse(name, &content)
    }
}
