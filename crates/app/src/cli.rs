//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use courier_domain::{ApiRequest, HttpMethod, RequestBody};
use thiserror::Error;

/// Arguments that clap accepts but that do not form a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// `METHOD URL` where METHOD is not an HTTP method.
    #[error("unknown HTTP method '{0}'")]
    UnknownMethod(String),
}

/// Send one request through the Courier pipeline.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "courier", version)]
#[command(about = "Send one request with saved environments, cookies and scripts")]
#[command(after_help = "URL, headers and body may use <<variable>> placeholders.")]
pub struct Cli {
    /// HTTP method, or the URL when no method is given
    #[arg(value_name = "METHOD|URL")]
    pub target: String,

    /// Request URL when METHOD is given
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body, sent as JSON when it looks like JSON
    #[arg(short = 'd', long = "data", value_name = "BODY")]
    pub data: Option<String>,

    /// Use the named saved environment
    #[arg(short = 'e', long = "env", value_name = "NAME")]
    pub environment: Option<String>,

    /// Pre-request script
    #[arg(long = "pre-request", value_name = "FILE")]
    pub pre_request_script: Option<PathBuf>,

    /// Test script
    #[arg(long = "test", value_name = "FILE")]
    pub test_script: Option<PathBuf>,
}

impl Cli {
    /// Builds the request (without scripts) the arguments describe.
    ///
    /// A body without an explicit method is sent as POST.
    pub fn to_request(&self) -> Result<ApiRequest, CliError> {
        let (method, url) = match &self.url {
            Some(url) => (
                self.target
                    .parse::<HttpMethod>()
                    .map_err(|_| CliError::UnknownMethod(self.target.clone()))?,
                url.clone(),
            ),
            None if self.data.is_some() => (HttpMethod::Post, self.target.clone()),
            None => (HttpMethod::Get, self.target.clone()),
        };

        let mut request = ApiRequest::new(method, url);
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some(body) = &self.data {
            request = request.with_body(body_from(body));
        }
        Ok(request)
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn body_from(text: &str) -> RequestBody {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        RequestBody::json(text)
    } else {
        RequestBody::raw(text, None)
    }
}
