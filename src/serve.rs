//! Local file server for the build output.
//!
//! Built on `tiny_http`:
//!
//! - Static file serving from the destination directory
//! - `baseurl` prefix stripped from request paths, 404 outside of it
//! - Automatic `index.html` resolution for directories
//! - Auto-retry on the next port when the configured one is taken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  start()   ┌──────────────────┐
//! │   Main Thread   │───────────▶│  Server Thread   │
//! │ (watch / wait)  │            │ incoming_requests│
//! └────────┬────────┘  stop()    └────────┬─────────┘
//!          └──── unblock + join ──────────┘
//! ```

use crate::{
    build::build_site, config::SiteConfig, log, pipeline::Pipeline, utils::url::url_to_path,
    watch::watch_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Build the site and serve it until Ctrl+C, rebuilding on changes if
/// `watch` is set.
pub fn serve_site(config: &SiteConfig, pipeline: &Pipeline, watch: bool) -> Result<()> {
    let shutdown = Shutdown::install()?;

    if watch {
        return watch_blocking(config, pipeline, &shutdown);
    }

    build_site(config, pipeline)?;
    let server = DevServer::start(config)?;
    shutdown.track(&server);
    log!("serve"; "{}", config.serve_url_on(server.port()));
    server.wait();
    Ok(())
}

/// Ctrl+C state shared with the signal handler.
///
/// Holds only a weak reference to the current server so a stopped server
/// releases its port.
#[derive(Clone, Default)]
pub struct Shutdown(Arc<ShutdownState>);

#[derive(Default)]
struct ShutdownState {
    requested: AtomicBool,
    server: Mutex<Weak<Server>>,
}

impl Shutdown {
    /// Install the process-wide Ctrl+C handler.
    pub fn install() -> Result<Self> {
        let shutdown = Self::default();
        let handle = shutdown.clone();
        ctrlc::set_handler(move || handle.trigger())
            .context("Failed to set Ctrl+C handler")?;
        Ok(shutdown)
    }

    pub fn trigger(&self) {
        log!("serve"; "shutting down...");
        self.0.requested.store(true, Ordering::SeqCst);
        if let Ok(server) = self.0.server.lock()
            && let Some(server) = server.upgrade()
        {
            server.unblock();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Make `server` the one unblocked on Ctrl+C.
    pub fn track(&self, server: &DevServer) {
        if let Ok(mut slot) = self.0.server.lock() {
            *slot = Arc::downgrade(&server.server);
        }
    }
}

/// A running server thread.
pub struct DevServer {
    server: Arc<Server>,
    port: u16,
    handle: Option<JoinHandle<()>>,
}

impl DevServer {
    /// Bind and start serving `config.destination` on a background thread.
    pub fn start(config: &SiteConfig) -> Result<Self> {
        let (server, port) = try_bind_port(&config.host, config.port, MAX_PORT_RETRIES)?;
        let server = Arc::new(server);

        let root = config.destination.clone();
        let baseurl = config.baseurl.trim_end_matches('/').to_owned();
        let worker = Arc::clone(&server);
        let handle = std::thread::Builder::new()
            .name("serve".into())
            .spawn(move || {
                for request in worker.incoming_requests() {
                    if let Err(e) = handle_request(request, &root, &baseurl) {
                        log!("serve"; "request error: {e}");
                    }
                }
            })
            .context("Failed to spawn server thread")?;

        Ok(Self {
            server,
            port,
            handle: Some(handle),
        })
    }

    /// Port actually bound, which may differ from the configured one.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until the server is unblocked elsewhere.
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }

    /// Unblock the server thread and join it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(host: &str, base_port: u16, max_retries: u16) -> Result<(Server, u16)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match Server::http((host, port)) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, port));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind {host} after {max_retries} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(request: Request, root: &Path, baseurl: &str) -> Result<()> {
    match resolve(request.url(), root, baseurl) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL to a file under `root`.
///
/// Resolution order: exact file, then `index.html` of a directory.
fn resolve(url: &str, root: &Path, baseurl: &str) -> Option<PathBuf> {
    // cache-busting query strings are ignored
    let path = url.split(['?', '#']).next().unwrap_or(url);

    let path = if baseurl.is_empty() {
        path
    } else {
        let rest = path.strip_prefix(baseurl)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest
    };

    let local = root.join(url_to_path(if path.is_empty() { "/" } else { path }));
    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let mut response = Response::from_data(content);
    if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
        response = response.with_header(header);
    }

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let body = "404 Not Found";
    let headers = Header::from_bytes("Content-Type", "text/plain")
        .map(|h| vec![h])
        .unwrap_or_default();
    let response = Response::new(
        StatusCode(404),
        headers,
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("rss") => "application/rss+xml; charset=utf-8",
        Some("atom") => "application/atom+xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}
