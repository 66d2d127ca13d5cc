use std::path::Path;
use std::process::{Command, Output};

/// Run the CLI with an isolated HOME so the session file lands in a temp dir.
pub fn run_cli_with_env(args: &[&str], home: &Path) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_storefront"));
    cmd.args(args);
    cmd.env("HOME", home);
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env("STOREFRONT_RETRY_BASE_MS", "1");
    cmd.env_remove("STOREFRONT_API_URL");
    cmd.env_remove("STOREFRONT_TIMEOUT_MS");
    cmd.env_remove("STOREFRONT_MAX_RETRIES");
    cmd.env_remove("RUST_LOG");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI off the async runtime so the mock server keeps serving.
pub async fn run(args: &[&str], home: &Path) -> Output {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let home = home.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli_with_env(&args, &home)
    })
    .await
    .expect("CLI task panicked")
}

/// Run the CLI and expect success, returning stdout.
pub async fn run_success(args: &[&str], home: &Path) -> String {
    let output = run(args, home).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}
