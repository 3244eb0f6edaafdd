//! Dependency graph of deploy actions.

use std::{collections::HashMap, sync::Arc};

use crate::{ActionId, DeployAction, IgnisError, ModuleDefinition, ModuleId, Result};

/// `dependent` cannot be deployed before `dependency`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub dependent: ActionId,
    pub dependency: ActionId,
}

/// Every action reachable from a set of root modules, in declaration order.
///
/// Declaration order is "imported modules first, then the module's own
/// actions in registration order". Modules imported more than once are
/// expanded once, so shared sub-deployments have a single set of actions.
#[derive(Debug, Clone)]
pub struct DeploymentGraph {
    pub(crate) roots: Vec<ModuleId>,
    pub(crate) actions: Vec<DeployAction>,
    pub(crate) index: HashMap<ActionId, usize>,
    pub(crate) modules: Vec<(ModuleId, Vec<usize>)>,
}

impl DeploymentGraph {
    /// Expand `roots` and their transitive imports.
    pub fn build(roots: &[Arc<ModuleDefinition>]) -> Result<Self> {
        let mut builder = GraphBuilder::default();
        for root in roots {
            builder.expand(root)?;
        }

        let graph = Self {
            roots: roots.iter().map(|root| root.id().clone()).collect(),
            actions: builder.actions,
            index: builder.index,
            modules: builder.modules,
        };
        graph.check_references(&builder.expanded)?;

        tracing::debug!(
            roots = ?graph.roots,
            modules = graph.modules.len(),
            actions = graph.actions.len(),
            "Deployment graph built"
        );

        Ok(graph)
    }

    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    /// Default identifier of this deployment: the root module ids joined by `+`.
    pub fn deployment_id(&self) -> String {
        self.roots
            .iter()
            .map(ModuleId::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// All actions in declaration order.
    pub fn actions(&self) -> &[DeployAction] {
        &self.actions
    }

    pub fn action(&self, id: &ActionId) -> Option<&DeployAction> {
        self.index.get(id).map(|&position| &self.actions[position])
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Module ids with their actions, in expansion order.
    pub fn modules(&self) -> impl Iterator<Item = (&ModuleId, Vec<&DeployAction>)> {
        self.modules.iter().map(|(id, positions)| {
            (
                id,
                positions
                    .iter()
                    .map(|&position| &self.actions[position])
                    .collect(),
            )
        })
    }

    /// Every dependency edge, derived from references and `after` entries.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.actions
            .iter()
            .flat_map(|action| {
                action.dependencies().into_iter().map(|dependency| DependencyEdge {
                    dependent: action.id.clone(),
                    dependency: dependency.clone(),
                })
            })
            .collect()
    }

    /// References may only target the declaring module or one of its direct imports.
    fn check_references(&self, expanded: &HashMap<ModuleId, Arc<ModuleDefinition>>) -> Result<()> {
        for action in &self.actions {
            let module = action.id.module();
            let visible = |target: &ModuleId| {
                target == module
                    || expanded.get(module).is_some_and(|definition| {
                        definition
                            .imports()
                            .iter()
                            .any(|import| import.id() == target)
                    })
            };

            for dependency in action.dependencies() {
                if !self.index.contains_key(dependency) || !visible(dependency.module()) {
                    return Err(IgnisError::UndefinedReference {
                        reference: dependency.to_string(),
                        context: action.id.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[derive(Default)]
struct GraphBuilder {
    actions: Vec<DeployAction>,
    index: HashMap<ActionId, usize>,
    modules: Vec<(ModuleId, Vec<usize>)>,
    expanded: HashMap<ModuleId, Arc<ModuleDefinition>>,
    visiting: Vec<ModuleId>,
}

impl GraphBuilder {
    fn expand(&mut self, module: &Arc<ModuleDefinition>) -> Result<()> {
        let id = module.id();

        if let Some(start) = self.visiting.iter().position(|visiting| visiting == id) {
            let mut path: Vec<String> = self.visiting[start..]
                .iter()
                .map(ModuleId::to_string)
                .collect();
            path.push(id.to_string());
            return Err(IgnisError::CyclicDependency { path });
        }

        if let Some(existing) = self.expanded.get(id) {
            if !Arc::ptr_eq(existing, module) && existing != module {
                return Err(IgnisError::DuplicateModule { module: id.clone() });
            }
            tracing::trace!(module = %id, "Module already expanded, reusing its actions");
            return Ok(());
        }

        self.visiting.push(id.clone());
        for import in module.imports() {
            self.expand(import)?;
        }
        self.visiting.pop();

        let mut positions = Vec::with_capacity(module.actions().len());
        for action in module.actions() {
            let position = self.actions.len();
            if self.index.insert(action.id.clone(), position).is_some() {
                return Err(IgnisError::DuplicateAction {
                    module: id.clone(),
                    name: action.id.name().to_string(),
                });
            }
            self.actions.push(action.clone());
            positions.push(position);
        }

        self.modules.push((id.clone(), positions));
        self.expanded.insert(id.clone(), Arc::clone(module));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContractSpec, ModuleBuilder};

    fn leaf(id: &str, contract: &str) -> Arc<ModuleDefinition> {
        let mut module = ModuleBuilder::new(id);
        module.contract(ContractSpec::new(contract)).unwrap();
        module.build()
    }

    fn consumer(id: &str, contract: &str, imports: &[&Arc<ModuleDefinition>]) -> Arc<ModuleDefinition> {
        let mut module = ModuleBuilder::new(id);
        let mut spec = ContractSpec::new(contract);
        for import in imports {
            let handle = module.use_module(import);
            let first = import.actions()[0].id.name().to_string();
            spec = spec.arg(handle.contract(&first).unwrap());
        }
        module.contract(spec).unwrap();
        module.build()
    }

    fn ids(graph: &DeploymentGraph) -> Vec<String> {
        graph.actions().iter().map(|a| a.id.to_string()).collect()
    }

    #[test]
    fn test_imports_come_first() {
        let oracle = leaf("OracleModule", "Oracle");
        let use_case = consumer("UseCaseExampleModule", "UseCaseExample", &[&oracle]);

        let graph = DeploymentGraph::build(&[use_case]).unwrap();

        assert_eq!(
            ids(&graph),
            vec!["OracleModule#Oracle", "UseCaseExampleModule#UseCaseExample"]
        );
        assert_eq!(graph.deployment_id(), "UseCaseExampleModule");
        assert_eq!(
            graph.edges(),
            vec![DependencyEdge {
                dependent: ActionId::new("UseCaseExampleModule", "UseCaseExample"),
                dependency: ActionId::new("OracleModule", "Oracle"),
            }]
        );
    }

    #[test]
    fn test_shared_import_is_expanded_once() {
        let z = leaf("Z", "Registry");
        let x = consumer("X", "Alpha", &[&z]);
        let y = consumer("Y", "Beta", &[&z]);

        let graph = DeploymentGraph::build(&[x, y]).unwrap();

        assert_eq!(ids(&graph), vec!["Z#Registry", "X#Alpha", "Y#Beta"]);
        assert_eq!(graph.modules().count(), 3);
        assert_eq!(graph.deployment_id(), "X+Y");
    }

    #[test]
    fn test_same_root_twice_is_deduplicated() {
        let oracle = leaf("OracleModule", "Oracle");
        let graph = DeploymentGraph::build(&[oracle.clone(), oracle]).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        // A module whose import chain leads back to its own id.
        let inner = leaf("A", "Inner");
        let b = consumer("B", "Middle", &[&inner]);
        let outer = consumer("A", "Outer", &[&b]);

        let err = DeploymentGraph::build(&[outer]).unwrap_err();
        match err {
            IgnisError::CyclicDependency { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("Expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_definitions_with_same_id() {
        let first = leaf("Shared", "One");
        let second = leaf("Shared", "Two");
        let x = consumer("X", "Alpha", &[&first]);
        let y = consumer("Y", "Beta", &[&second]);

        let err = DeploymentGraph::build(&[x, y]).unwrap_err();
        assert!(matches!(err, IgnisError::DuplicateModule { .. }));
    }

    #[test]
    fn test_action_lookup() {
        let oracle = leaf("OracleModule", "Oracle");
        let graph = DeploymentGraph::build(&[oracle]).unwrap();

        assert!(graph.action(&ActionId::new("OracleModule", "Oracle")).is_some());
        assert!(graph.action(&ActionId::new("OracleModule", "Missing")).is_none());
    }
}
