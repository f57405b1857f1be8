//! The six lifecycle commands. Each builds its body and hands it to the
//! controller, which owns gating, recording and document rebuilds.

use crate::action::ResultRef;
use crate::contract::TransferRequest;
use crate::error::Result;
use crate::lifecycle::{CommandContext, CommandError, Completion, Controller, Invocation, Outcome};
use crate::service::DataServices;
use crate::types::CommandType;
use crate::verify::verify_tables_metadata;
use std::path::PathBuf;

pub fn create(ctl: &Controller<'_>, inv: &Invocation) -> Result<Completion> {
    ctl.create(inv)
}

/// Compare each dataset's requested tables and columns with what the source
/// actually exposes, as reported by the metadata service.
pub fn validate(
    ctl: &Controller<'_>,
    inv: &Invocation,
    services: &dyn DataServices,
) -> Result<Completion> {
    ctl.run(CommandType::Validate, inv, |ctx| {
        let files = dataset_files(ctx)?;
        let project = ctx.project.service_request()?;
        let access = ctx.store.read_access()?;

        for file in &files {
            let dataset = ctx.store.read_dataset(file)?;
            let request = TransferRequest::new(project.clone(), &access, dataset.clone());
            let remote = services.validate(&request)?;
            if let Some(msg) = verify_tables_metadata(remote.tables(), dataset.tables()) {
                return Err(CommandError::Validation(msg));
            }
            tracing::debug!(dataset = dataset.label(), "dataset validated");
        }

        Ok(Outcome::default().message(format!(
            "'{}' command completed for project {}: {} dataset(s) match the source schema",
            CommandType::Validate,
            ctx.project.id,
            files.len()
        )))
    })
}

/// Record the information-governance sign-off. `agreement_url` points at the
/// approval event; the signing entity travels as the invocation instrument.
pub fn sign_off(ctl: &Controller<'_>, inv: &Invocation, agreement_url: &str) -> Result<Completion> {
    ctl.run(CommandType::SignOff, inv, |_| agreement(agreement_url))
}

pub fn stage_transfer(
    ctl: &Controller<'_>,
    inv: &Invocation,
    services: &dyn DataServices,
) -> Result<Completion> {
    ctl.run(CommandType::StageTransfer, inv, |ctx| {
        let files = dataset_files(ctx)?;
        let project = ctx.project.service_request()?;
        let access = ctx.store.read_access()?;

        let mut result = Vec::new();
        for file in &files {
            let dataset = ctx.store.read_dataset(file)?;
            let request = TransferRequest::new(project.clone(), &access, dataset);
            let payload = services.stage_transfer(&request)?;
            if let Some(location) = payload.primary_location() {
                ctx.store
                    .record_dataset_location(file, "staging_path", location)?;
            }
            result.extend(payload.result_refs());
        }

        if result.is_empty() {
            return Err(CommandError::Execution(
                "stage transfer returned no staged data locations".to_string(),
            ));
        }
        Ok(Outcome::with_result(result))
    })
}

/// Record the output disclosure check. Same shape as sign-off.
pub fn disclosure_check(
    ctl: &Controller<'_>,
    inv: &Invocation,
    agreement_url: &str,
) -> Result<Completion> {
    ctl.run(CommandType::DisclosureCheck, inv, |_| agreement(agreement_url))
}

pub fn publish(
    ctl: &Controller<'_>,
    inv: &Invocation,
    services: &dyn DataServices,
) -> Result<Completion> {
    ctl.run(CommandType::Publish, inv, |ctx| {
        let request = ctx.project.service_request()?;
        let payload = services.publish(&request)?;

        if let Some(location) = payload.primary_location() {
            for file in dataset_files(ctx)? {
                ctx.store
                    .record_dataset_location(&file, "publish_path", location)?;
            }
        }
        Ok(Outcome::with_result(payload.result_refs()))
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn agreement(url: &str) -> std::result::Result<Outcome, CommandError> {
    reqwest::Url::parse(url).map_err(|e| {
        CommandError::Validation(format!("agreement URL '{url}' is not an absolute URL: {e}"))
    })?;
    Ok(Outcome::with_result(vec![ResultRef::new(url)]))
}

fn dataset_files(ctx: &CommandContext<'_>) -> std::result::Result<Vec<PathBuf>, CommandError> {
    let files = ctx
        .store
        .dataset_files(ctx.config.lifecycle.max_dataset_files)?;
    if files.is_empty() {
        return Err(CommandError::Validation(
            "no dataset metadata files found under metadata/".to_string(),
        ));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_requires_absolute_url() {
        let out = agreement("https://github.com/org/repo/pull/7").unwrap();
        assert_eq!(out.result, vec![ResultRef::new("https://github.com/org/repo/pull/7")]);

        let err = agreement("pull/7").unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
    }
}
