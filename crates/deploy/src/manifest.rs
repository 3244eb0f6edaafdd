//! File format for module definitions.
//!
//! A manifest lists modules with their imports and contracts, in TOML or JSON:
//!
//! ```toml
//! [[module]]
//! id = "OracleModule"
//!
//! [[module.contract]]
//! name = "Oracle"
//!
//! [[module]]
//! id = "UseCaseExampleModule"
//! imports = ["OracleModule"]
//!
//! [[module.contract]]
//! name = "UseCaseExample"
//! args = [{ reference = "OracleModule#Oracle" }]
//! ```
//!
//! Arguments are literals, except for `{ reference = "..." }` (a contract of
//! the same module by local name, or of an imported module as `Module#Name`)
//! and `{ address_book = "..." }` (a named address of the target network).

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    str::FromStr,
    sync::Arc,
};

use alloy_core::primitives::U256;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ActionId, ArgumentSpec, ContractSpec, IgnisError, ModuleBuilder, ModuleDefinition, ModuleId,
    ModuleImport, Result, module::ACTION_ID_SEPARATOR,
};

/// A set of module definitions loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default, rename = "module")]
    pub modules: Vec<ManifestModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestModule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, rename = "contract")]
    pub contracts: Vec<ManifestContract>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestContract {
    pub name: String,
    /// Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ManifestArg>,
    /// Wei, decimal or `0x` hex. A string so large values survive TOML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestArg {
    Reference(ReferenceArg),
    AddressBook(AddressBookArg),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceArg {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressBookArg {
    pub address_book: String,
}

impl ModuleManifest {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse module manifest as TOML")
    }

    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Failed to parse module manifest as JSON")
    }

    /// Load a manifest, choosing the format from the file extension (TOML unless `.json`).
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read module manifest from {}", path.display()))?;

        let manifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };

        tracing::info!(
            path = %path.display(),
            modules = manifest.modules.len(),
            "Module manifest loaded"
        );
        Ok(manifest)
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|module| module.id.as_str())
    }

    /// Modules no other module imports, in manifest order.
    pub fn default_roots(&self) -> Vec<String> {
        let imported: HashSet<&str> = self
            .modules
            .iter()
            .flat_map(|module| module.imports.iter().map(String::as_str))
            .collect();

        self.module_ids()
            .filter(|id| !imported.contains(id))
            .map(str::to_string)
            .collect()
    }

    /// Build the definitions of `roots` (or of [`Self::default_roots`] when empty).
    ///
    /// Every module of the manifest is built, selected or not, so an import cycle
    /// anywhere in the file is reported. Each module is built once, so modules
    /// imported by several roots share one definition.
    pub fn build(&self, roots: &[String]) -> Result<Vec<Arc<ModuleDefinition>>> {
        let mut index: HashMap<&str, &ManifestModule> = HashMap::new();
        for module in &self.modules {
            if index.insert(module.id.as_str(), module).is_some() {
                return Err(IgnisError::DuplicateModule {
                    module: ModuleId::new(module.id.as_str()),
                });
            }
        }

        let mut loader = ManifestLoader {
            index,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        for module in &self.modules {
            loader.load(&module.id, "manifest")?;
        }

        let roots = if roots.is_empty() {
            self.default_roots()
        } else {
            roots.to_vec()
        };
        if roots.is_empty() {
            return Err(IgnisError::InvalidManifest(
                "no root module to deploy".to_string(),
            ));
        }

        roots
            .iter()
            .map(|root| loader.load(root, "module selection"))
            .collect()
    }
}

struct ManifestLoader<'a> {
    index: HashMap<&'a str, &'a ManifestModule>,
    built: HashMap<String, Arc<ModuleDefinition>>,
    visiting: Vec<String>,
}

impl ManifestLoader<'_> {
    fn load(&mut self, id: &str, context: &str) -> Result<Arc<ModuleDefinition>> {
        if let Some(module) = self.built.get(id) {
            return Ok(Arc::clone(module));
        }

        if let Some(start) = self.visiting.iter().position(|visiting| visiting == id) {
            let mut path = self.visiting[start..].to_vec();
            path.push(id.to_string());
            return Err(IgnisError::CyclicDependency { path });
        }

        let module = *self
            .index
            .get(id)
            .ok_or_else(|| IgnisError::UndefinedReference {
                reference: id.to_string(),
                context: context.to_string(),
            })?;

        self.visiting.push(id.to_string());
        let mut imports = Vec::with_capacity(module.imports.len());
        for import in &module.imports {
            imports.push(self.load(import, &format!("imports of {id}"))?);
        }
        self.visiting.pop();

        let module_id = ModuleId::new(id);
        let mut builder = ModuleBuilder::new(module_id.clone());
        let imports: HashMap<ModuleId, ModuleImport> = imports
            .iter()
            .map(|import| {
                let handle = builder.use_module(import);
                (handle.id().clone(), handle)
            })
            .collect();

        for contract in &module.contracts {
            builder.contract(contract_spec(&module_id, &imports, contract)?)?;
        }

        let definition = builder.build();
        self.built.insert(id.to_string(), Arc::clone(&definition));
        Ok(definition)
    }
}

fn contract_spec(
    module: &ModuleId,
    imports: &HashMap<ModuleId, ModuleImport>,
    contract: &ManifestContract,
) -> Result<ContractSpec> {
    let mut spec = ContractSpec::new(contract.name.as_str());

    if let Some(artifact) = &contract.artifact {
        spec = spec.artifact(artifact.as_str());
    }

    for arg in &contract.args {
        spec = spec.arg(match arg {
            ManifestArg::Reference(arg) => {
                ArgumentSpec::Reference(resolve_reference(module, imports, &arg.reference)?)
            }
            ManifestArg::AddressBook(arg) => ArgumentSpec::network_address(arg.address_book.as_str()),
            ManifestArg::Literal(value) => ArgumentSpec::Literal(value.clone()),
        });
    }

    if let Some(value) = &contract.value {
        let wei = U256::from_str(value.trim()).map_err(|err| {
            IgnisError::InvalidManifest(format!(
                "invalid value `{value}` for {}: {err}",
                ActionId::new(module.clone(), contract.name.as_str())
            ))
        })?;
        spec = spec.value(wei);
    }

    for after in &contract.after {
        spec = spec.after(resolve_reference(module, imports, after)?);
    }

    Ok(spec)
}

/// `Name` refers to the current module, `Module#Name` to the current module or an import.
fn resolve_reference(
    module: &ModuleId,
    imports: &HashMap<ModuleId, ModuleImport>,
    reference: &str,
) -> Result<ActionId> {
    if !reference.contains(ACTION_ID_SEPARATOR) {
        return Ok(ActionId::new(module.clone(), reference));
    }

    let id: ActionId = reference.parse()?;
    if id.module() == module {
        return Ok(id);
    }

    match imports.get(id.module()) {
        Some(import) => import.contract(id.name()),
        None => Err(IgnisError::UndefinedReference {
            reference: reference.to_string(),
            context: format!("module {module} (module {} is not imported)", id.module()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    const ORACLE_MANIFEST: &str = r#"
[[module]]
id = "OracleModule"

[[module.contract]]
name = "Oracle"

[[module]]
id = "UseCaseExampleModule"
imports = ["OracleModule"]

[[module.contract]]
name = "UseCaseExample"
args = [{ reference = "OracleModule#Oracle" }]
"#;

    fn ids(modules: &[Arc<ModuleDefinition>]) -> Vec<&str> {
        modules.iter().map(|module| module.id().as_str()).collect()
    }

    #[test]
    fn test_build_default_roots() {
        let manifest = ModuleManifest::from_toml_str(ORACLE_MANIFEST).unwrap();
        let roots = manifest.build(&[]).unwrap();

        assert_eq!(ids(&roots), vec!["UseCaseExampleModule"]);
        let use_case = &roots[0];
        assert_eq!(use_case.imports().len(), 1);

        let action = use_case.action("UseCaseExample").unwrap();
        assert_eq!(
            action.args,
            vec![ArgumentSpec::Reference(ActionId::new("OracleModule", "Oracle"))]
        );
    }

    #[test]
    fn test_build_shares_imported_modules() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "Shared"
[[module.contract]]
name = "Token"

[[module]]
id = "A"
imports = ["Shared"]

[[module]]
id = "B"
imports = ["Shared"]
"#,
        )
        .unwrap();

        let roots = manifest.build(&[]).unwrap();
        assert_eq!(ids(&roots), vec!["A", "B"]);
        assert!(
            Arc::ptr_eq(&roots[0].imports()[0], &roots[1].imports()[0]),
            "A shared import must be built once"
        );
    }

    #[test]
    fn test_args_literals_addresses_and_value() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "Vault"

[[module.contract]]
name = "Token"
args = ["Ignis", 18]

[[module.contract]]
name = "Vault"
args = [{ reference = "Token" }, { address_book = "Treasury" }, [1, 2]]
value = "1000000000000000000"
after = ["Vault#Token"]
"#,
        )
        .unwrap();

        let roots = manifest.build(&["Vault".to_string()]).unwrap();
        let vault = roots[0].action("Vault").unwrap();
        let token = ActionId::new("Vault", "Token");

        assert_eq!(
            vault.args,
            vec![
                ArgumentSpec::Reference(token.clone()),
                ArgumentSpec::network_address("Treasury"),
                ArgumentSpec::literal(serde_json::json!([1, 2])),
            ]
        );
        assert_eq!(vault.value, Some(U256::from(10u64).pow(U256::from(18u64))));
        assert_eq!(vault.after, vec![token]);
        assert_eq!(
            roots[0].action("Token").unwrap().args,
            vec![
                ArgumentSpec::literal("Ignis"),
                ArgumentSpec::literal(18)
            ]
        );
    }

    #[test]
    fn test_import_cycle_is_rejected() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "A"
imports = ["B"]

[[module]]
id = "B"
imports = ["A"]
"#,
        )
        .unwrap();

        let err = manifest.build(&["A".to_string()]).unwrap_err();
        match err {
            IgnisError::CyclicDependency { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("Expected a cyclic dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_self_import_with_default_roots() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "A"
imports = ["A"]

[[module.contract]]
name = "Token"
"#,
        )
        .unwrap();

        assert!(manifest.default_roots().is_empty());
        match manifest.build(&[]).unwrap_err() {
            IgnisError::CyclicDependency { path } => assert_eq!(path, vec!["A", "A"]),
            other => panic!("Expected a cyclic dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_mutual_imports_with_default_roots() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "A"
imports = ["B"]

[[module]]
id = "B"
imports = ["A"]
"#,
        )
        .unwrap();

        match manifest.build(&[]).unwrap_err() {
            IgnisError::CyclicDependency { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("Expected a cyclic dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_outside_selected_roots_is_rejected() {
        let manifest = ModuleManifest::from_toml_str(&format!(
            r#"{ORACLE_MANIFEST}
[[module]]
id = "Loop"
imports = ["Loop"]
"#
        ))
        .unwrap();

        let err = manifest.build(&[]).unwrap_err();
        assert!(matches!(err, IgnisError::CyclicDependency { .. }), "{err}");
    }

    #[test]
    fn test_empty_manifest_has_no_roots() {
        let manifest = ModuleManifest::from_toml_str("").unwrap();
        assert!(matches!(
            manifest.build(&[]).unwrap_err(),
            IgnisError::InvalidManifest(_)
        ));
    }

    #[test]
    fn test_reference_to_module_not_imported() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "OracleModule"
[[module.contract]]
name = "Oracle"

[[module]]
id = "Consumer"
[[module.contract]]
name = "UseCaseExample"
args = [{ reference = "OracleModule#Oracle" }]
"#,
        )
        .unwrap();

        let err = manifest.build(&["Consumer".to_string()]).unwrap_err();
        assert!(matches!(err, IgnisError::UndefinedReference { .. }), "{err}");
    }

    #[test]
    fn test_unknown_and_duplicate_modules() {
        let manifest = ModuleManifest::from_toml_str(ORACLE_MANIFEST).unwrap();
        let err = manifest.build(&["Missing".to_string()]).unwrap_err();
        assert!(matches!(err, IgnisError::UndefinedReference { ref reference, .. } if reference == "Missing"));

        let mut duplicated = manifest.clone();
        duplicated.modules.push(manifest.modules[0].clone());
        let err = duplicated.build(&[]).unwrap_err();
        assert!(matches!(err, IgnisError::DuplicateModule { .. }));
    }

    #[test]
    fn test_invalid_value() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
[[module]]
id = "M"
[[module.contract]]
name = "C"
value = "lots"
"#,
        )
        .unwrap();

        assert!(matches!(
            manifest.build(&[]).unwrap_err(),
            IgnisError::InvalidManifest(_)
        ));
    }

    #[test]
    fn test_load_json_manifest() {
        let dir = TempDir::new("ignis-manifest").unwrap();
        let path = dir.path().join("modules.json");
        std::fs::write(
            &path,
            r#"{"module":[{"id":"OracleModule","contract":[{"name":"Oracle"}]}]}"#,
        )
        .unwrap();

        let manifest = ModuleManifest::load_from_file(&path).unwrap();
        assert_eq!(manifest.module_ids().collect::<Vec<_>>(), vec!["OracleModule"]);
    }
}
