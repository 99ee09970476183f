// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::watch::debounce::Debouncer;
use crate::watch::filter::WatchFilter;

/// What to watch and how to debounce it.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory observed recursively.
    pub root: PathBuf,
    /// Quiet period required before a burst of events produces one change
    /// signal.
    pub debounce: Duration,
    /// Which paths under the root are relevant.
    pub filter: WatchFilter,
}

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. [`stop`](Self::stop)
/// tears the watch down gracefully; dropping the handle aborts it outright.
/// Either way the event loop ends and any pending debounce window is
/// cancelled.
pub struct WatcherHandle {
    inner: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

impl WatcherHandle {
    /// Stop watching. The event channel closes, the event loop drains and
    /// ends, and [`closed`](Self::closed) then resolves.
    pub fn stop(&mut self) {
        drop(self.inner.take());
    }

    /// Resolves once the event loop has ended, i.e. the watch is dead and
    /// the caller may retry. Safe to call again after it has resolved.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Spawn a filesystem watcher that observes `options.root` recursively and
/// invokes `change_cb` once per debounced burst of relevant events.
///
/// Startup failures (missing directory, permission denied, watch limit) are
/// returned directly. An error from the watch source after startup goes to
/// `error_cb` and ends the event loop, so the caller can rebuild the watch;
/// the retry policy lives with the caller.
pub fn spawn_watcher(
    options: WatchOptions,
    change_cb: impl Fn() + Send + 'static,
    error_cb: impl Fn(&notify::Error) + Send + 'static,
) -> Result<WatcherHandle> {
    let root = options
        .root
        .canonicalize()
        .unwrap_or_else(|_| options.root.clone()); // best-effort

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // Receiver gone means the event loop is shutting down; nothing
            // useful to do from the notify thread.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching directory {:?}", root))?;

    info!("file watcher started on {:?}", root);

    let debouncer = Debouncer::new(options.debounce, change_cb);
    let task = tokio::spawn(drive_watch_events(
        root,
        options.filter.clone(),
        debouncer,
        event_rx,
        error_cb,
    ));

    Ok(WatcherHandle {
        inner: Some(watcher),
        task: Some(task),
    })
}

/// Bridge raw watch events into the debouncer until the source ends or
/// fails.
///
/// Returns when the event channel closes or the source yields an error; an
/// error is forwarded to `error_cb` first. The debouncer is dropped on
/// return, cancelling any pending window.
pub async fn drive_watch_events(
    root: PathBuf,
    filter: WatchFilter,
    debouncer: Debouncer,
    mut event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    error_cb: impl Fn(&notify::Error) + Send + 'static,
) {
    while let Some(res) = event_rx.recv().await {
        match res {
            Ok(event) => {
                debug!("received notify event: {:?}", event);
                if is_relevant_event(&root, &filter, &event) {
                    debouncer.observe_event();
                }
            }
            Err(err) => {
                // A failed source does not recover; end the loop so the
                // caller can rebuild the watch.
                error_cb(&err);
                break;
            }
        }
    }
    debug!("watch event loop ended");
}

fn is_relevant_event(root: &Path, filter: &WatchFilter, event: &Event) -> bool {
    if event.paths.is_empty() {
        // e.g. a rescan notice; err on the side of restarting
        return true;
    }
    event.paths.iter().any(|path| match relative_str(root, path) {
        Some(rel) => filter.is_relevant(&rel),
        None => {
            warn!(
                "could not relativize path {:?} against root {:?}",
                path, root
            );
            true
        }
    })
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root` and cannot be relativized.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s)
}
