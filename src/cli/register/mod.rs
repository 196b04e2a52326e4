//! Register command - persists a user and prints its confirmation token

use std::io::BufRead;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{bootstrap, parse_candidate};
use crate::domain::User;
use crate::infrastructure::user::{Registration, RegistrationRequest};

/// Arguments for the register command
#[derive(Args, Clone)]
pub struct RegisterArgs {
    /// Candidate user as a JSON object
    #[arg(long)]
    pub candidate: String,

    /// Read a second line from stdin and require it to match the password
    #[arg(long)]
    pub confirm_password: bool,
}

#[derive(Serialize)]
struct RegisterOutput<'a> {
    user: &'a User,
    confirmation_token: &'a str,
}

/// Run the register command
pub async fn run(args: RegisterArgs) -> anyhow::Result<()> {
    let config = bootstrap()?;
    let candidate = parse_candidate(&args.candidate)?;

    let stdin = std::io::stdin();
    let request = read_request(candidate, stdin.lock(), args.confirm_password)?;

    let service = crate::create_user_service_with_config(&config).await?;
    let registration = service.register(request).await?;

    info!(user_id = %registration.user.id(), "Registration complete");
    println!("{}", render(&registration)?);

    Ok(())
}

fn read_request(
    candidate: crate::domain::UserCandidate,
    mut input: impl BufRead,
    confirm_password: bool,
) -> anyhow::Result<RegistrationRequest> {
    let password = read_line(&mut input).context("failed to read password from stdin")?;

    let password_confirmation = if confirm_password {
        Some(read_line(&mut input).context("failed to read password confirmation from stdin")?)
    } else {
        None
    };

    Ok(RegistrationRequest {
        candidate,
        password,
        password_confirmation,
    })
}

fn read_line(input: &mut impl BufRead) -> std::io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn render(registration: &Registration) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&RegisterOutput {
        user: &registration.user,
        confirmation_token: &registration.confirmation_token,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserCandidate;

    #[test]
    fn test_read_request() {
        let input = "secret123\nsecret124\n".as_bytes();

        let request = read_request(UserCandidate::default(), input, true).unwrap();
        assert_eq!(request.password, "secret123");
        assert_eq!(request.password_confirmation.as_deref(), Some("secret124"));
    }

    #[test]
    fn test_read_request_without_confirmation() {
        let input = "secret123\r\n".as_bytes();

        let request = read_request(UserCandidate::default(), input, false).unwrap();
        assert_eq!(request.password, "secret123");
        assert!(request.password_confirmation.is_none());
    }

    #[tokio::test]
    async fn test_render_hides_password_hash() {
        let mut config = crate::AppConfig::default();
        config.credentials.argon2_memory_kib = 1024;
        config.credentials.argon2_iterations = 1;
        let service = crate::create_user_service_with_config(&config).await.unwrap();

        let registration = service
            .register(RegistrationRequest {
                candidate: UserCandidate::new("A", "B", "test12", "test@test.com", "male"),
                password: "secret123".to_string(),
                password_confirmation: None,
            })
            .await
            .unwrap();

        let output = render(&registration).unwrap();
        assert!(output.contains(&registration.confirmation_token));
        assert!(!output.contains(registration.user.encrypted_password()));
        assert!(output.contains(r#""gender": "male""#));
    }
}
