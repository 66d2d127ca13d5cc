//! Raw request commands.

use std::io::{self, Read};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::Value;

use storefront_core::RequestDescriptor;

use crate::output;
use crate::session::CliSession;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Request path relative to the API base URL (e.g. /products)
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long, short, value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Request path relative to the API base URL
    pub path: String,

    /// JSON request body (use - for stdin)
    #[arg(long, short)]
    pub data: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Request path relative to the API base URL
    pub path: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn get(session: &CliSession, args: GetArgs) -> Result<()> {
    let request = args
        .query
        .into_iter()
        .fold(RequestDescriptor::get(&args.path), |request, (key, value)| {
            request.with_query(key, value)
        });

    let data = session
        .client()
        .execute(request)
        .await
        .with_context(|| format!("GET {} failed", args.path))?;
    print(&data, args.pretty)
}

pub async fn post(session: &CliSession, args: PostArgs) -> Result<()> {
    let mut request = RequestDescriptor::post(&args.path);
    if let Some(data) = &args.data {
        request = request.with_body(read_body(data)?);
    }

    let data = session
        .client()
        .execute(request)
        .await
        .with_context(|| format!("POST {} failed", args.path))?;
    print(&data, args.pretty)
}

pub async fn delete(session: &CliSession, args: DeleteArgs) -> Result<()> {
    let data = session
        .client()
        .execute(RequestDescriptor::delete(&args.path))
        .await
        .with_context(|| format!("DELETE {} failed", args.path))?;
    print(&data, args.pretty)
}

fn print(data: &Value, pretty: bool) -> Result<()> {
    if pretty {
        output::json_pretty(data)
    } else {
        output::json(data)
    }
}

fn read_body(data: &str) -> Result<Value> {
    if data == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        serde_json::from_str(&buf).context("Invalid JSON from stdin")
    } else {
        serde_json::from_str(data).context("Invalid JSON in --data")
    }
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_val("tag=is_new").unwrap(),
            ("tag".to_string(), "is_new".to_string())
        );
        assert_eq!(
            parse_key_val("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("missing").is_err());
    }

    #[test]
    fn inline_body() {
        let body = read_body(r#"{"variant_id": 3}"#).unwrap();
        assert_eq!(body["variant_id"], 3);
        assert!(read_body("{not json").is_err());
    }
}
