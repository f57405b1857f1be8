use crate::output::{or_dash, print_json, print_table};
use crate::root::Workspace;
use anyhow::Context;
use cr8tor_core::crate_doc::ProvenanceWriter;
use cr8tor_core::graph::ProvenanceGraph;
use cr8tor_core::lifecycle::prerequisite;
use cr8tor_core::types::{composite_id, ActionStatus, CommandType};
use serde::Serialize;

#[derive(Serialize)]
struct CommandStatus {
    command: CommandType,
    /// Status in `project.toml`.
    recorded: Option<ActionStatus>,
    /// Status in the provenance document. Gating requires both to be Completed.
    provenance: Option<ActionStatus>,
    prerequisite: Option<CommandType>,
    ready: bool,
}

/// Every command's completion state for the current project.
pub fn run(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let config = ws.load_config().context("failed to load config")?;
    let store = ws.store();
    let project = store.read_project().context("failed to read project")?;
    let actions = store.actions().context("failed to read actions")?;

    let doc = ws.writer(&config).document_path();
    let graph = match ProvenanceGraph::load_with_base(&doc, &config.crate_meta.base_uri) {
        Ok(g) => Some(g),
        Err(e) => {
            tracing::info!(error = %e, "provenance document unavailable");
            None
        }
    };
    let provenance_of =
        |c: CommandType| graph.as_ref().and_then(|g| g.action_status_of(c, &project.id));
    let recorded_of = |c: CommandType| {
        let id = composite_id(c, &project.id);
        actions.iter().find(|a| a.id() == id).map(|a| a.action_status())
    };
    let completed = |c: CommandType| {
        recorded_of(c) == Some(ActionStatus::Completed)
            && provenance_of(c) == Some(ActionStatus::Completed)
    };

    let rows: Vec<CommandStatus> = CommandType::all()
        .iter()
        .map(|&command| {
            let pre = prerequisite(command, config.lifecycle.publish_requires);
            CommandStatus {
                command,
                recorded: recorded_of(command),
                provenance: provenance_of(command),
                prerequisite: pre,
                ready: pre.map_or(true, completed),
            }
        })
        .collect();

    if json {
        return print_json(&serde_json::json!({
            "project_id": project.id,
            "commands": rows,
        }));
    }

    println!("Project {}", project.id);
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.command.to_string(),
                or_dash(r.recorded),
                or_dash(r.provenance),
                or_dash(r.prerequisite),
                if r.ready { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(
        &["COMMAND", "RECORDED", "PROVENANCE", "REQUIRES", "READY"],
        &table,
    );
    Ok(())
}
