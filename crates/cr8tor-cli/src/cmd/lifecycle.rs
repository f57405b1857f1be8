use crate::output::print_completion;
use crate::root::Workspace;
use clap::Args;
use cr8tor_core::commands;
use cr8tor_core::lifecycle::{Completion, Controller, Invocation};
use cr8tor_core::service::HttpDataServices;
use cr8tor_core::types::CommandType;
use cr8tor_core::Result;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct AgreementArgs {
    /// Absolute URL of the approval event (e.g. a merged pull request)
    #[arg(long)]
    pub agreement_url: String,

    /// Person or body that signed; recorded as the action instrument
    #[arg(long)]
    pub signing_entity: Option<String>,

    /// Override the recorded sub-classification
    #[arg(long)]
    pub additional_type: Option<String>,
}

/// Identity and secrets resolved from flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub agent: Option<String>,
    pub metadata_token: Option<String>,
    pub publish_token: Option<String>,
}

/// One lifecycle command and its arguments.
#[derive(Debug, Clone)]
pub enum Request {
    Create { project_id: Option<String> },
    Validate,
    SignOff(AgreementArgs),
    StageTransfer,
    Disclosure(AgreementArgs),
    Publish,
}

impl Request {
    pub fn command(&self) -> CommandType {
        match self {
            Request::Create { .. } => CommandType::Create,
            Request::Validate => CommandType::Validate,
            Request::SignOff(_) => CommandType::SignOff,
            Request::StageTransfer => CommandType::StageTransfer,
            Request::Disclosure(_) => CommandType::DisclosureCheck,
            Request::Publish => CommandType::Publish,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run one lifecycle command, print its final line and return the process
/// exit code.
pub fn run(ws: &Workspace, creds: &Credentials, request: Request, json: bool) -> i32 {
    let command = request.command();
    let completion = execute(ws, creds, request).unwrap_or_else(|e| {
        tracing::info!(%command, error = %e, "command aborted");
        Completion::aborted(command, &e)
    });

    print_completion(&completion, json);
    completion.exit_code
}

fn execute(ws: &Workspace, creds: &Credentials, request: Request) -> Result<Completion> {
    let config = ws.load_config()?;
    let writer = ws.writer(&config);
    let identity = config.identity.clone();
    let agent = creds
        .agent
        .clone()
        .unwrap_or_else(|| identity.agent.clone());
    let services = || {
        HttpDataServices::from_config(
            &config.services,
            creds.metadata_token.clone(),
            creds.publish_token.clone(),
        )
    };
    let ctl = Controller::new(ws.store(), &writer, config.clone());

    match request {
        Request::Create { project_id } => {
            let mut inv = Invocation::new(agent).instrument(identity.instrument);
            if let Some(id) = project_id {
                inv = inv.project_id(id);
            }
            commands::create(&ctl, &inv)
        }
        Request::Validate => {
            let inv = Invocation::new(agent).instrument(identity.metadata_service);
            commands::validate(&ctl, &inv, &services()?)
        }
        Request::SignOff(args) => {
            let inv = agreement_invocation(agent, identity.instrument, &args);
            commands::sign_off(&ctl, &inv, &args.agreement_url)
        }
        Request::StageTransfer => {
            let inv = Invocation::new(agent).instrument(identity.publish_service);
            commands::stage_transfer(&ctl, &inv, &services()?)
        }
        Request::Disclosure(args) => {
            let inv = agreement_invocation(agent, identity.instrument, &args);
            commands::disclosure_check(&ctl, &inv, &args.agreement_url)
        }
        Request::Publish => {
            let inv = Invocation::new(agent).instrument(identity.publish_service);
            commands::publish(&ctl, &inv, &services()?)
        }
    }
}

fn agreement_invocation(agent: String, default_instrument: String, args: &AgreementArgs) -> Invocation {
    let mut inv = Invocation::new(agent)
        .instrument(args.signing_entity.clone().unwrap_or(default_instrument));
    if let Some(t) = &args.additional_type {
        inv = inv.additional_type(t.as_str());
    }
    inv
}
