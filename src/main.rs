//! CLI entry point for courier.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::{
    AuthenticatingRequest, BasicAuthentication, ClientConfig, CookieJar, DigestAuthentication,
    Request, SharedAuthentication,
};
use reqwest::Method;
use tracing::{debug, info};

mod app_config;
mod cli;

use cli::{Args, AuthSchemeArg};

fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(url = %args.url, method = %args.method, "CLI arguments parsed");

    let file_config = app_config::load(args.config.as_deref())?;
    let jar = Arc::new(CookieJar::new());
    if let Some(path) = &args.cookie_jar {
        load_jar(&jar, path)?;
    }

    let config = build_config(&args, &file_config, Arc::clone(&jar))?;
    let request = build_request(&args)?;

    let mut executor = AuthenticatingRequest::new(request);
    if let (Some(user), Some(password)) = (&args.user, &args.password) {
        let auth: SharedAuthentication = match args.auth_scheme {
            AuthSchemeArg::Digest => Arc::new(Mutex::new(DigestAuthentication::new(
                user.as_str(),
                password.as_str(),
            ))),
            AuthSchemeArg::Basic => Arc::new(Mutex::new(BasicAuthentication::new(
                user.as_str(),
                password.as_str(),
            ))),
        };
        executor = executor.with_authentication(auth);
    }

    let mut response = executor
        .execute(&config)
        .with_context(|| format!("Request to {} failed", args.url))?;
    info!(status = response.status(), url = %response.url(), "response received");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.include {
        writeln!(out, "HTTP {} {}", response.status(), response.url())?;
        for (name, value) in response.headers() {
            writeln!(out, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
        }
        writeln!(out)?;
    }
    if let Some(body) = response.body_mut() {
        io::copy(body, &mut out).context("Failed to read response body")?;
    }
    out.flush()?;
    response.close();

    if let Some(path) = &args.cookie_jar {
        save_jar(&jar, path)?;
    }
    Ok(())
}

fn build_config(
    args: &Args,
    file_config: &app_config::FileConfig,
    jar: Arc<CookieJar>,
) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder().cookie_jar(jar);

    if let Some(proxy) = args.proxy.as_ref().or(file_config.proxy.as_ref()) {
        builder = builder.proxy(proxy);
    }
    if let Some(secs) = args.connect_timeout.or(file_config.connect_timeout_secs) {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = file_config.read_timeout_secs {
        builder = builder.read_timeout(Duration::from_secs(secs));
    }
    if let Some(max_redirects) = args.max_redirects.or(file_config.max_redirects) {
        builder = builder.max_redirects(max_redirects);
    }
    if let Some(user_agent) = &file_config.user_agent {
        builder = builder.user_agent(user_agent);
    }

    builder.build().context("Invalid client configuration")
}

fn build_request(args: &Args) -> Result<Request> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", args.method))?;

    let mut builder = Request::builder(method, &args.url);
    for (name, value) in &args.headers {
        builder = builder.header(name, value);
    }
    if !args.data.is_empty() {
        let fields: Vec<(&str, &str)> = args
            .data
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        builder = builder.form(&fields);
    }
    for status in &args.ignore_status {
        builder = builder.ignore_status(*status);
    }
    builder.build().context("Invalid request")
}

fn load_jar(jar: &CookieJar, path: &Path) -> Result<()> {
    if !path.exists() {
        debug!(path = %path.display(), "cookie jar file does not exist yet");
        return Ok(());
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open cookie jar '{}'", path.display()))?;
    let loaded = jar
        .load_json(BufReader::new(file))
        .with_context(|| format!("Failed to load cookie jar '{}'", path.display()))?;
    debug!(loaded, "cookie jar loaded");
    Ok(())
}

fn save_jar(jar: &CookieJar, path: &Path) -> Result<()> {
    jar.purge_expired();
    let file = File::create(path)
        .with_context(|| format!("Failed to create cookie jar '{}'", path.display()))?;
    jar.save_json(BufWriter::new(file))
        .with_context(|| format!("Failed to save cookie jar '{}'", path.display()))?;
    debug!(cookies = jar.len(), "cookie jar saved");
    Ok(())
}
