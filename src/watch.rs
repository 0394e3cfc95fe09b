//! Polling watcher for `serve --watch`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Poll Loop (1s)                           │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────────┐    ┌────────────────────┐  │
//! │  │ scan     │───▶│ ChangeTracker│───▶│  plan_rebuild()    │  │
//! │  │ mtimes   │    │ (2 polls)    │    │                    │  │
//! │  └──────────┘    └──────────────┘    │  Full: layouts,    │  │
//! │                                      │  removals, first   │  │
//! │                                      │  Delta: the rest   │  │
//! │                                      └─────────┬──────────┘  │
//! │                                                ▼             │
//! │                                      restart DevServer       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A modification time has to be seen on two consecutive polls before the
//! file counts as changed, so half-written files are not built.

use crate::{
    build::{build_delta, build_site, collect_sources},
    config::{CONFIG_FILE, SiteConfig},
    log,
    pipeline::Pipeline,
    serve::{DevServer, Shutdown},
    utils::category::PathClassifier,
};
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::{
    fs,
    thread,
    time::{Duration, SystemTime},
};

// =============================================================================
// Constants
// =============================================================================

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Slices of the poll interval between shutdown checks.
const POLL_SLICES: u32 = 10;

/// Modification time of every visible source path.
pub type Snapshot = FxHashMap<String, SystemTime>;

// =============================================================================
// Change Tracking
// =============================================================================

/// Settled paths reported by one poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Remembers settled modification times between polls.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    settled: Snapshot,
    /// Times seen once, waiting for a second identical observation.
    pending: Snapshot,
}

impl ChangeTracker {
    /// Start from `snapshot` without reporting anything in it.
    pub fn with_baseline(snapshot: Snapshot) -> Self {
        Self {
            settled: snapshot,
            pending: Snapshot::default(),
        }
    }

    /// Compare `current` with what was seen before.
    ///
    /// Removals are reported at once; new or modified paths only after
    /// their time held still for two polls.
    pub fn poll(&mut self, current: &Snapshot) -> Changes {
        let mut changes = Changes::default();

        for (path, mtime) in current {
            if self.settled.get(path) == Some(mtime) {
                self.pending.remove(path);
                continue;
            }
            if self.pending.get(path) == Some(mtime) {
                self.pending.remove(path);
                self.settled.insert(path.clone(), *mtime);
                changes.modified.push(path.clone());
            } else {
                self.pending.insert(path.clone(), *mtime);
            }
        }

        self.settled.retain(|path, _| {
            let kept = current.contains_key(path);
            if !kept {
                changes.removed.push(path.clone());
            }
            kept
        });
        self.pending.retain(|path, _| current.contains_key(path));

        changes.modified.sort();
        changes.removed.sort();
        changes
    }
}

/// Modification times of the visible sources, destination excluded.
pub fn scan(config: &SiteConfig, classifier: &PathClassifier) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for path in collect_sources(config) {
        if !classifier.is_visible(&path) {
            continue;
        }
        // vanished between walk and stat
        let Ok(mtime) = fs::metadata(config.source.join(&path)).and_then(|m| m.modified()) else {
            continue;
        };
        snapshot.insert(path, mtime);
    }
    snapshot
}

// =============================================================================
// Rebuild Strategy
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
pub enum RebuildPlan {
    /// Rebuild everything, with the reason to log.
    Full(String),
    /// Rebuild exactly these paths.
    Delta(Vec<String>),
}

/// Decide how to react to `changes`.
///
/// A full build is needed when nothing has been built yet, when a path
/// went away, or when a changed path matches `full_build_patterns`.
pub fn plan_rebuild(changes: Changes, classifier: &PathClassifier, has_built: bool) -> RebuildPlan {
    if !has_built {
        return RebuildPlan::Full("no successful build yet".into());
    }
    if let Some(path) = changes.removed.first() {
        return RebuildPlan::Full(format!("{path} removed"));
    }
    if let Some(path) = changes
        .modified
        .iter()
        .find(|path| classifier.requires_full_build(path))
    {
        return RebuildPlan::Full(format!("{path} changed"));
    }
    RebuildPlan::Delta(changes.modified)
}

/// Log a build failure with error details.
fn log_build_error(kind: &str, err: &anyhow::Error) {
    log!("watch"; "{kind} build failed");
    log!("error"; "{err:#}");
}

fn run_plan(config: &SiteConfig, pipeline: &Pipeline, plan: RebuildPlan) -> bool {
    let (kind, result) = match plan {
        RebuildPlan::Full(reason) => {
            log!("watch"; "{reason}, rebuilding...");
            ("full", build_site(config, pipeline))
        }
        RebuildPlan::Delta(paths) => {
            log!("watch"; "{} changed, rebuilding...", paths.join(", "));
            ("delta", build_delta(config, pipeline, &paths))
        }
    };
    match result {
        Ok(_) => true,
        Err(e) => {
            log_build_error(kind, &e);
            false
        }
    }
}

// =============================================================================
// Watch Loop
// =============================================================================

/// State carried between polls: settled times, the running server and
/// whether any build has succeeded yet.
pub struct Watcher<'a> {
    config: &'a SiteConfig,
    pipeline: &'a Pipeline,
    classifier: PathClassifier,
    tracker: ChangeTracker,
    server: Option<DevServer>,
    has_built: bool,
}

impl<'a> Watcher<'a> {
    /// Record the current sources as the baseline; nothing is built yet.
    pub fn new(config: &'a SiteConfig, pipeline: &'a Pipeline) -> Result<Self> {
        let classifier = PathClassifier::new(config)?;
        let tracker = ChangeTracker::with_baseline(scan(config, &classifier));
        Ok(Self {
            config,
            pipeline,
            classifier,
            tracker,
            server: None,
            has_built: false,
        })
    }

    /// Port of the running server, if one is up.
    pub fn port(&self) -> Option<u16> {
        self.server.as_ref().map(DevServer::port)
    }

    pub fn has_built(&self) -> bool {
        self.has_built
    }

    /// Poll once and rebuild if something settled.
    ///
    /// Never fails: build and server errors are logged and the previous
    /// server, if any, keeps running.
    pub fn step(&mut self, shutdown: &Shutdown) {
        let changes = self.tracker.poll(&scan(self.config, &self.classifier));
        if changes.is_empty() {
            return;
        }
        if changes.modified.iter().any(|path| path == CONFIG_FILE) {
            log!("warn"; "{CONFIG_FILE} changed, restart to apply it");
        }

        let plan = plan_rebuild(changes, &self.classifier, self.has_built);
        self.rebuild(plan, shutdown);
    }

    /// Run `plan` and replace the server if it succeeded.
    pub fn rebuild(&mut self, plan: RebuildPlan, shutdown: &Shutdown) {
        if !run_plan(self.config, self.pipeline, plan) {
            return;
        }
        self.has_built = true;

        if let Some(old) = self.server.take() {
            old.stop();
        }
        match DevServer::start(self.config) {
            Ok(server) => {
                shutdown.track(&server);
                log!("serve"; "{}", self.config.serve_url_on(server.port()));
                self.server = Some(server);
            }
            // retried after the next successful build
            Err(err) => log!("error"; "{err:#}"),
        }
    }

    pub fn stop(self) {
        if let Some(server) = self.server {
            server.stop();
        }
    }
}

/// Build, serve and rebuild on changes until `shutdown` is requested.
///
/// The server is replaced after every successful build; after a failed one
/// the previous server keeps serving the last good output.
pub fn watch_blocking(config: &SiteConfig, pipeline: &Pipeline, shutdown: &Shutdown) -> Result<()> {
    let mut watcher = Watcher::new(config, pipeline)?;
    watcher.rebuild(RebuildPlan::Full("initial build".into()), shutdown);
    log!("watch"; "polling {} for changes", config.source.display());

    while !shutdown.is_requested() {
        sleep_unless(shutdown);
        if shutdown.is_requested() {
            break;
        }
        watcher.step(shutdown);
    }

    watcher.stop();
    Ok(())
}

fn sleep_unless(shutdown: &Shutdown) {
    for _ in 0..POLL_SLICES {
        if shutdown.is_requested() {
            return;
        }
        thread::sleep(POLL_INTERVAL / POLL_SLICES);
    }
}
