//! `restcall send`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueHint};
use restcall_client::{Client, Request, RequestBuilder, Response};
use restcall_common_config::RestcallConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Send one request to `<base-uri>/<path>`.
#[derive(Debug, Args)]
pub struct SendCommand {
    /// Base address, e.g. http://localhost:52101/Service1
    #[arg(long, env = "RESTCALL_BASE_URI")]
    pub base_uri: Option<String>,

    /// Address suffix appended after a `/`
    #[arg(long, env = "RESTCALL_URI_PARAMETERS")]
    pub path: Option<String>,

    /// HTTP verb (get, post, put, patch, delete, head, options)
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Request body text
    #[arg(short, long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the request body from a file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub body_file: Option<PathBuf>,

    /// Content type sent with the body
    #[arg(long)]
    pub content_type: Option<String>,

    /// Extra header as NAME=VALUE; repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Retries after the first attempt
    #[arg(long)]
    pub retries: Option<u8>,

    /// Per-attempt timeout in seconds
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Bearer token sent as the Authorization header
    #[arg(long, env = "RESTCALL_BEARER_TOKEN", hide_env_values = true)]
    pub bearer: Option<String>,
}

impl SendCommand {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut RestcallConfig) {
        if let Some(base_uri) = &self.base_uri {
            config.endpoint.base_uri = base_uri.clone();
        }
        if let Some(path) = &self.path {
            config.endpoint.uri_parameters = path.clone();
        }
        if let Some(method) = &self.method {
            config.request.method = method.clone();
        }
        if let Some(content_type) = &self.content_type {
            config.request.content_type = Some(content_type.clone());
        }
        if let Some(retries) = self.retries {
            config.request.max_retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.request.timeout_secs = timeout;
        }
        for (name, value) in &self.headers {
            config.request.headers.insert(name.clone(), value.clone());
        }
    }

    fn body(&self) -> anyhow::Result<Option<String>> {
        match (&self.body, &self.body_file) {
            (Some(body), _) => Ok(Some(body.clone())),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("failed to read body from {}", path.display())),
            (None, None) => Ok(None),
        }
    }

    /// Build the request from configured defaults plus the body and token flags.
    fn request(&self, config: &RestcallConfig) -> Result<Request, CliError> {
        let mut builder = RequestBuilder::from_defaults(&config.request);
        if let Some(body) = self.body()? {
            builder = builder.body(body);
        }
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        builder.build().map_err(CliError::config)
    }

    pub async fn run(self, mut config: RestcallConfig, format: OutputFormat) -> Result<(), CliError> {
        self.apply(&mut config);
        let request = self.request(&config)?;

        let mut client = Client::from_config(&config)?;
        let response = client.send_async(request).await?;
        info!(uri = client.full_uri(), attempts = response.attempts(), "transaction finished");

        print_response(&response, format)?;

        if response.log().has_errors() {
            let message = match response.log().fault() {
                Some(fault) => fault.to_string(),
                None => response.log().errors(),
            };
            return Err(CliError::Network {
                message,
                url: client.full_uri().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    status: Option<u16>,
    status_text: &'a str,
    attempts: u32,
    content_type: Option<&'a str>,
    body: &'a str,
    log: &'a restcall_client::Log,
}

fn print_response(response: &Response, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            match response.status() {
                Some(status) => println!("HTTP {} ({} attempt(s))", status, response.attempts()),
                None => println!("no response ({} attempt(s))", response.attempts()),
            }
            if !response.raw_response().is_empty() {
                println!("{}", response.raw_response());
            }
        }
        OutputFormat::Json => {
            let report = Report {
                status: response.status().map(|s| s.as_u16()),
                status_text: response.status_text(),
                attempts: response.attempts(),
                content_type: response.content_type(),
                body: response.raw_response(),
                log: response.log(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render response")?
            );
        }
    }
    Ok(())
}

/// Parse `NAME=VALUE`. The value may be empty; the name may not.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    if name.trim().is_empty() {
        return Err(format!("header name is empty in {raw:?}"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}
