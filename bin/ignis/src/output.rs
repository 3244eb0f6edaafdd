//! Tables printed by the CLI.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use ignis_deploy::{ArgumentSpec, DeployAction, DeploymentResult, ExecutionPlan, JournalEntry};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn render_arg(arg: &ArgumentSpec) -> String {
    match arg {
        ArgumentSpec::Literal(value) => value.to_string(),
        ArgumentSpec::Reference(id) => id.to_string(),
        ArgumentSpec::NetworkAddress(name) => format!("@{name}"),
    }
}

fn render_args(action: &DeployAction) -> String {
    action
        .args
        .iter()
        .map(render_arg)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn plan_table(plan: &ExecutionPlan) -> Table {
    let mut table = table(&["#", "Action", "Artifact", "Arguments", "Previous run"]);
    for (position, step) in plan.steps.iter().enumerate() {
        table.add_row(vec![
            (position + 1).to_string(),
            step.action.id.to_string(),
            step.action.artifact.clone(),
            render_args(&step.action),
            step.previous
                .map_or_else(|| "-".to_string(), |status| status.to_string()),
        ]);
    }
    table
}

pub fn result_table(result: &DeploymentResult) -> Table {
    let mut table = table(&["Module", "Contract", "Artifact", "Address"]);
    for (module, contracts) in &result.modules {
        for (name, handle) in contracts {
            table.add_row(vec![
                module.to_string(),
                name.clone(),
                handle.artifact.clone(),
                handle.address.to_string(),
            ]);
        }
    }
    table
}

/// One row per action; actions without a journal entry show as `not deployed`.
pub fn status_table<'a>(
    rows: impl IntoIterator<Item = (&'a DeployAction, Option<JournalEntry>)>,
) -> Table {
    let mut table = table(&["Action", "Status", "Address", "Error"]);
    for (action, entry) in rows {
        let (status, address, error) = match entry {
            Some(entry) => (
                entry.status.to_string(),
                entry.address.map(|address| address.to_string()).unwrap_or_default(),
                entry.error.unwrap_or_default(),
            ),
            None => ("not deployed".to_string(), String::new(), String::new()),
        };
        table.add_row(vec![action.id.to_string(), status, address, error]);
    }
    table
}
