//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Authentication scheme used with `--user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthSchemeArg {
    /// Answer Digest challenges
    Digest,
    /// Answer Basic challenges
    Basic,
}

/// Issue one HTTP request and print the response.
///
/// Redirects, cookies and Digest/Basic challenges are handled transparently.
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(author, version, about)]
pub struct Args {
    /// Target URL (http or https)
    pub url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Form field `key=value` sent URL-encoded (repeatable)
    #[arg(short = 'd', long = "data", value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,

    /// Username for authentication challenges
    #[arg(short, long, requires = "password")]
    pub user: Option<String>,

    /// Password for authentication challenges
    #[arg(long, requires = "user")]
    pub password: Option<String>,

    /// Which challenge scheme the credentials answer
    #[arg(long, value_enum, default_value_t = AuthSchemeArg::Digest)]
    pub auth_scheme: AuthSchemeArg,

    /// Cookie jar file (JSON), loaded before and saved after the request
    #[arg(short = 'c', long)]
    pub cookie_jar: Option<PathBuf>,

    /// Maximum redirects to follow (0-50)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub max_redirects: Option<u32>,

    /// Proxy URL (http, https or socks5)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Status code to leave unhandled (repeatable): 3xx is returned as-is, >= 400 fails the request
    #[arg(long, value_parser = clap::value_parser!(u16).range(100..=599))]
    pub ignore_status: Vec<u16>,

    /// Print the status line and response headers
    #[arg(short = 'i', long)]
    pub include: bool,

    /// Config file path (defaults to $XDG_CONFIG_HOME/courier/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected 'key=value', got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}
