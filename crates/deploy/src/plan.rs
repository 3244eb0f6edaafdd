//! Execution planning: ordering the graph and filtering out completed work.

use std::{cmp::Reverse, collections::BinaryHeap};

use serde::Serialize;

use crate::{
    ActionId, ActionStatus, AddressBook, DeployAction, DeploymentGraph, IgnisError, Journal,
    NetworkId, Result, deployment_hash::action_fingerprint,
};

/// An action that still has to be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub action: DeployAction,
    /// Status recorded by a previous run, if any (`Pending` or `Failed`).
    pub previous: Option<ActionStatus>,
}

/// Ordered list of actions still needing execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    /// Actions to execute, each after all of its dependencies.
    pub steps: Vec<PlannedStep>,
    /// Actions skipped because the journal records them as deployed.
    pub satisfied: Vec<ActionId>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Ids of the actions to execute, in order.
    pub fn action_ids(&self) -> Vec<&ActionId> {
        self.steps.iter().map(|step| &step.action.id).collect()
    }
}

/// Topologically sort the graph (Kahn's algorithm).
///
/// Among actions that are ready at the same time the one declared first wins,
/// so the order is deterministic. Returns positions into [`DeploymentGraph::actions`].
pub fn topological_order(graph: &DeploymentGraph) -> Result<Vec<usize>> {
    let count = graph.actions.len();
    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (position, action) in graph.actions.iter().enumerate() {
        for dependency in action.dependencies() {
            let dependency_position = graph.index.get(dependency).copied().ok_or_else(|| {
                IgnisError::UnresolvedDependency {
                    action: action.id.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            in_degree[position] += 1;
            dependents[dependency_position].push(position);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(position, _)| Reverse(position))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(position)) = ready.pop() {
        order.push(position);
        for &dependent in &dependents[position] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != count {
        let path = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree > 0)
            .map(|(position, _)| graph.actions[position].id.to_string())
            .collect();
        return Err(IgnisError::CyclicDependency { path });
    }

    Ok(order)
}

/// Build the execution plan for `graph` on `network` given what `journal` already records.
///
/// Deployed actions are skipped, unless their definition (or an address-book
/// entry they use) changed since they were deployed, which fails with
/// [`IgnisError::Reconciliation`].
pub fn plan(
    graph: &DeploymentGraph,
    journal: &impl Journal,
    address_book: &AddressBook,
    network: &NetworkId,
) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::default();

    for position in topological_order(graph)? {
        let action = &graph.actions[position];

        match journal.get(&action.id) {
            Some(entry) if entry.status == ActionStatus::Deployed => {
                if entry.fingerprint != action_fingerprint(action, address_book, network) {
                    return Err(IgnisError::Reconciliation {
                        action: action.id.clone(),
                    });
                }
                tracing::debug!(action = %action.id, address = ?entry.address, "Already deployed, skipping");
                plan.satisfied.push(action.id.clone());
            }
            entry => plan.steps.push(PlannedStep {
                action: action.clone(),
                previous: entry.map(|entry| entry.status),
            }),
        }
    }

    tracing::debug!(
        steps = plan.steps.len(),
        satisfied = plan.satisfied.len(),
        "Execution plan computed"
    );

    Ok(plan)
}
