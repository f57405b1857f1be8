use crate::output::print_json;
use crate::root::Workspace;
use anyhow::Context;
use cr8tor_core::crate_doc::ProvenanceWriter;
use cr8tor_core::lock::ProjectLock;
use std::time::Duration;

/// Regenerate `ro-crate-metadata.json` from the current resources. No action
/// is recorded.
pub fn run(ws: &Workspace, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = ws.load_config().context("failed to load config")?;
    let store = ws.store();
    let writer = ws.writer(&config);

    if dry_run {
        let doc = writer
            .render(&store)
            .context("failed to render provenance document")?;
        return print_json(&doc);
    }

    let _lock = ProjectLock::acquire(
        &store.project_path(),
        Duration::from_secs(config.lifecycle.lock_stale_seconds),
    )?;
    let path = writer
        .rebuild(&store)
        .context("failed to build provenance document")?;

    if json {
        print_json(&serde_json::json!({ "path": path }))?;
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
