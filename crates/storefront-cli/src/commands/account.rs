//! Login, register, logout and refresh commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use storefront_core::Credentials;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long)]
    pub password: String,

    /// Password confirmation (defaults to --password)
    #[arg(long)]
    pub confirm_password: Option<String>,
}

pub async fn login(session: &CliSession, args: LoginArgs) -> Result<()> {
    eprintln!("{}", "Logging in...".dimmed());

    let user = session
        .client()
        .login(&Credentials::new(args.email, args.password))
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    print_user(user.as_ref());
    Ok(())
}

pub async fn register(session: &CliSession, args: RegisterArgs) -> Result<()> {
    let confirm = args.confirm_password.as_deref().unwrap_or(&args.password);

    let user = session
        .client()
        .register(&args.name, &args.email, &args.password, confirm)
        .await
        .context("Failed to register")?;

    output::success("Account created");
    print_user(user.as_ref());
    Ok(())
}

pub async fn logout(session: &CliSession) -> Result<()> {
    if !session.is_logged_in() {
        eprintln!("{}", "No active session.".dimmed());
        return Ok(());
    }

    if let Err(e) = session.client().logout().await {
        tracing::warn!(error = %e, "Server logout failed");
    }
    output::success("Logged out");
    Ok(())
}

pub async fn refresh(session: &CliSession) -> Result<()> {
    eprintln!("{}", "Refreshing session...".dimmed());

    session
        .client()
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    Ok(())
}

pub(super) fn print_user(user: Option<&Value>) {
    let Some(user) = user else { return };
    for (label, key) in [("Name", "name"), ("Email", "email")] {
        if let Some(value) = user.get(key).and_then(Value::as_str) {
            output::field(label, value);
        }
    }
}
