//! Whoami command implementation.

use anyhow::{Result, bail};

use crate::output;
use crate::session::CliSession;

use super::account::print_user;

pub fn run(session: &CliSession) -> Result<()> {
    if !session.is_logged_in() {
        bail!("No active session. Run 'storefront login' first.");
    }

    output::field("API", session.client().base_url().as_str());
    print_user(session.client().session().user().as_ref());
    Ok(())
}
