//! Validate command - prints the field errors of a candidate as JSON

use anyhow::Context;
use clap::Args;
use tracing::info;

use super::{bootstrap, parse_candidate};
use crate::domain::{
    is_blank, validate, FieldErrors, UniqueField, UniquenessSnapshot, UserCandidate,
};

/// Arguments for the validate command
#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Candidate user as a JSON object
    #[arg(long)]
    pub candidate: String,

    /// JSON array of existing users to check uniqueness against instead of
    /// the configured storage
    #[arg(long)]
    pub existing: Option<String>,
}

/// Run the validate command
pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let config = bootstrap()?;
    let candidate = parse_candidate(&args.candidate)?;

    let errors = match &args.existing {
        Some(existing) => validate_against(&candidate, existing)?,
        None => {
            let service = crate::create_user_service_with_config(&config).await?;
            service.validate(&candidate, None).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&errors)?);

    if !errors.is_empty() {
        anyhow::bail!("Validation failed: {}", errors);
    }

    info!(username = %candidate.username, "Candidate is valid");
    Ok(())
}

/// Validate against users given inline instead of a repository
fn validate_against(candidate: &UserCandidate, existing: &str) -> anyhow::Result<FieldErrors> {
    let existing: Vec<UserCandidate> =
        serde_json::from_str(existing).context("existing users must be a JSON array")?;

    let mut snapshot = UniquenessSnapshot::new();
    for user in existing.into_iter().map(UserCandidate::normalized) {
        for field in UniqueField::ALL {
            let value = field.candidate_value(&user);
            if !is_blank(value) {
                snapshot.mark_taken(field, value);
            }
        }
    }

    Ok(validate(&candidate.clone().normalized(), &snapshot))
}
