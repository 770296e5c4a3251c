//! Request logging for the web front end and tracing setup for the CLI.

use std::io::IsTerminal;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Local;
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` selects `info`, `-vv` `debug`
/// and the default is `warn`. Calling this twice is harmless.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ANSI color codes
#[derive(Clone, Copy)]
struct Colors {
    reset: &'static str,
    dim: &'static str,
    green: &'static str,
    yellow: &'static str,
    red: &'static str,
    cyan: &'static str,
    blue: &'static str,
    magenta: &'static str,
    gray: &'static str,
}

impl Colors {
    const PLAIN: Self = Self {
        reset: "",
        dim: "",
        green: "",
        yellow: "",
        red: "",
        cyan: "",
        blue: "",
        magenta: "",
        gray: "",
    };

    const ANSI: Self = Self {
        reset: "\x1b[0m",
        dim: "\x1b[2m",
        green: "\x1b[92m",
        yellow: "\x1b[93m",
        red: "\x1b[91m",
        cyan: "\x1b[96m",
        blue: "\x1b[94m",
        magenta: "\x1b[95m",
        gray: "\x1b[90m",
    };

    fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self::ANSI
        } else {
            Self::PLAIN
        }
    }

    fn status_color(&self, status: StatusCode) -> &'static str {
        if status.is_success() {
            self.green
        } else if status.is_redirection() {
            self.yellow
        } else {
            self.red
        }
    }
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Print a request or response body, pretty-printing JSON.
///
/// Multipart uploads can be large, so anything that is not JSON is cut to
/// a short preview.
fn log_body(label: &str, bytes: &Bytes, colors: Colors) {
    const RAW_PREVIEW: usize = 2048;

    if bytes.is_empty() {
        return;
    }
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(bytes) {
        let body = serde_json::to_string_pretty(&json).unwrap_or_default();
        eprintln!(
            "{} - DEBUG - {}{label}:{}\n{}{body}{}",
            timestamp(),
            colors.dim,
            colors.reset,
            colors.gray,
            colors.reset
        );
    } else {
        let shown = &bytes[..bytes.len().min(RAW_PREVIEW)];
        let body = String::from_utf8_lossy(shown);
        let more = if bytes.len() > RAW_PREVIEW {
            format!(" ... ({} bytes)", bytes.len())
        } else {
            String::new()
        };
        eprintln!(
            "{} - DEBUG - {}{label} (raw):{}\n{}{body}{more}{}",
            timestamp(),
            colors.dim,
            colors.reset,
            colors.gray,
            colors.reset
        );
    }
}

/// Axum middleware printing one line per request.
///
/// Silent at verbosity 0. From `-vv` on, request and response bodies are
/// buffered and printed as well.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    pub verbose: u8,
}

impl LoggingMiddleware {
    #[must_use]
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        if self.verbose == 0 {
            return next.run(request).await;
        }

        let colors = Colors::detect();
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let start = Instant::now();

        let response = if self.verbose >= 2 {
            let (parts, body) = request.into_parts();
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .unwrap_or_default();
            log_body("Request body", &bytes, colors);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        } else {
            next.run(request).await
        };

        let status = response.status();
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        // eprintln! keeps the ANSI codes that tracing would escape
        eprintln!(
            "{} - INFO - {}{method}{} {}{path}{} -> {}{}{} in {}{duration_ms:.1}ms{}",
            timestamp(),
            colors.cyan,
            colors.reset,
            colors.blue,
            colors.reset,
            colors.status_color(status),
            status.as_u16(),
            colors.reset,
            colors.magenta,
            colors.reset
        );

        if self.verbose < 2 {
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        log_body("Response body", &bytes, colors);
        Response::from_parts(parts, Body::from(bytes))
    }
}
