//! Subcommand implementations.

mod account;
mod request;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use crate::session::CliSession;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with email and password
    Login(account::LoginArgs),

    /// Create an account and log in
    Register(account::RegisterArgs),

    /// End the session on the server and locally
    Logout,

    /// Display the active session
    Whoami,

    /// Refresh the access token
    Refresh,

    /// Send a GET request and print the response data
    Get(request::GetArgs),

    /// Send a POST request and print the response data
    Post(request::PostArgs),

    /// Send a DELETE request and print the response data
    Delete(request::DeleteArgs),
}

pub async fn handle(command: Command, base_url: Option<&str>) -> Result<()> {
    let session = CliSession::open(base_url)?;

    let result = match command {
        Command::Whoami => return whoami::run(&session),
        Command::Login(args) => account::login(&session, args).await,
        Command::Register(args) => account::register(&session, args).await,
        Command::Logout => account::logout(&session).await,
        Command::Refresh => account::refresh(&session).await,
        Command::Get(args) => request::get(&session, args).await,
        Command::Post(args) => request::post(&session, args).await,
        Command::Delete(args) => request::delete(&session, args).await,
    };

    // Refreshes and teardowns happen inside any request, so always write back.
    match result {
        Ok(()) => session.persist(),
        Err(e) => {
            session.persist_quietly();
            Err(e)
        }
    }
}
