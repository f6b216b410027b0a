// src/watcher.rs
//! Polling change detector.
//!
//! Each cycle walks the watch root once, stats every eligible file and
//! compares the modification time against the previous cycle's snapshot.
//! Changes found within one cycle collapse into a single reload.

use crate::config::AppConfig;
use crate::error::ScanError;
use crate::event::ReloadEvent;
use crate::signal::{to_millis, ReloadSignal};
use ignore::{DirEntry, WalkBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

/// Sleep after a cycle that failed as a whole.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Decides which entries under the watch root take part in change detection.
///
/// Hidden entries (leading `.`) are always skipped. Directories whose name is
/// in the exclusion set are not descended into. Files must carry one of the
/// watched extensions, unless the extension list contains `*`.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    extensions: HashSet<String>,
    any_extension: bool,
    excluded_dirs: Arc<HashSet<String>>,
}

impl WatchFilter {
    pub fn new<E, X>(extensions: E, excluded_dirs: X) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        let extensions: HashSet<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let any_extension = extensions.contains("*");
        Self {
            extensions,
            any_extension,
            excluded_dirs: Arc::new(
                excluded_dirs
                    .into_iter()
                    .map(|dir| dir.as_ref().to_string())
                    .collect(),
            ),
        }
    }

    pub fn from_config(app_config: &AppConfig) -> Self {
        Self::new(&app_config.extensions, &app_config.exclude)
    }

    /// Whether a file at `path` is watched.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if is_hidden(name) {
            return false;
        }
        if self.any_extension {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        is_hidden(name) || self.excluded_dirs.contains(name)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Outcome of one scan cycle. Paths are relative to the watch root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Files whose modification time moved forward.
    pub changed: Vec<PathBuf>,
    /// Files first seen after the initial scan.
    pub added: Vec<PathBuf>,
    /// Files recorded previously but not seen in this scan.
    pub removed: Vec<PathBuf>,
    /// Latest modification time among all files seen in this scan.
    pub latest: Option<SystemTime>,
}

impl ScanReport {
    /// True when nothing warrants a reload.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// All paths that contributed to the change, in changed/added/removed order.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.changed
            .iter()
            .chain(self.added.iter())
            .chain(self.removed.iter())
    }
}

/// Detects changes under a watch root by comparing modification times.
#[derive(Debug)]
pub struct ChangeDetector {
    root: PathBuf,
    filter: WatchFilter,
    snapshot: HashMap<PathBuf, SystemTime>,
    primed: bool,
}

impl ChangeDetector {
    pub fn new(root: impl Into<PathBuf>, filter: WatchFilter) -> Self {
        Self {
            root: root.into(),
            filter,
            snapshot: HashMap::new(),
            primed: false,
        }
    }

    /// Number of files currently recorded in the snapshot.
    pub fn tracked_files(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether the initial scan has completed.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Walks the tree once and diffs it against the previous snapshot.
    ///
    /// The first successful scan only records what it finds and reports no
    /// changes. Files that vanish between listing and stat are skipped. If the
    /// root itself cannot be read the snapshot is left untouched.
    ///
    /// # Errors
    /// Returns [`ScanError`] when the watch root is missing or not a directory.
    pub fn scan(&mut self) -> Result<ScanReport, ScanError> {
        let meta = std::fs::metadata(&self.root).map_err(|source| ScanError::RootUnavailable {
            path: self.root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let dir_filter = self.filter.clone();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(true)
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                let name = entry.file_name().to_string_lossy();
                if is_dir {
                    !dir_filter.is_excluded_dir(&name)
                } else {
                    !is_hidden(&name)
                }
            })
            .build();

        let mut report = ScanReport::default();
        let mut seen: HashMap<PathBuf, SystemTime> = HashMap::with_capacity(self.snapshot.len());

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if !self.filter.matches(entry.path()) {
                continue;
            }
            let Some(modified) = modified_time(&entry) else {
                continue;
            };

            report.latest = Some(report.latest.map_or(modified, |t| t.max(modified)));

            match self.snapshot.get(entry.path()) {
                Some(previous) if modified > *previous => {
                    report.changed.push(self.relative(entry.path()));
                }
                Some(_) => {}
                None if self.primed => report.added.push(self.relative(entry.path())),
                None => {}
            }
            seen.insert(entry.into_path(), modified);
        }

        if self.primed {
            let mut removed: Vec<PathBuf> = self
                .snapshot
                .keys()
                .filter(|path| !seen.contains_key(*path))
                .map(|path| self.relative(path))
                .collect();
            removed.sort();
            report.removed = removed;
        }

        self.snapshot = seen;
        if !self.primed {
            self.primed = true;
            debug!(
                "Initial scan of {} recorded {} files",
                self.root.display(),
                self.snapshot.len()
            );
        }
        Ok(report)
    }

    /// Runs one scan and publishes any change to `signal`.
    ///
    /// The watermark follows the latest modification time even when nothing
    /// changed, so it is seeded by the initial scan. Any reported change
    /// advances it to at least the current time, whatever mtime the changed
    /// file carries. Returns whether a reload was signalled.
    ///
    /// # Errors
    /// Propagates [`ScanError`] from [`ChangeDetector::scan`].
    pub fn poll(&mut self, signal: &ReloadSignal) -> Result<bool, ScanError> {
        let report = self.scan()?;
        if let Some(latest) = report.latest {
            signal.advance_watermark(to_millis(latest));
        }
        if report.is_empty() {
            return Ok(false);
        }

        for path in &report.changed {
            info!("File changed: {}", path.display());
        }
        for path in &report.added {
            info!("File added: {}", path.display());
        }
        for path in &report.removed {
            info!("File removed: {}", path.display());
        }

        let modified = report
            .latest
            .map(to_millis)
            .unwrap_or(0)
            .max(to_millis(SystemTime::now()));
        signal.notify(ReloadEvent {
            paths: report
                .paths()
                .map(|path| path.to_string_lossy().into_owned())
                .collect(),
            modified,
        });
        Ok(true)
    }

    /// Runs the detector on a dedicated background thread.
    ///
    /// The thread polls every `interval` and never exits on its own; a cycle
    /// that fails as a whole is logged and retried after a short backoff.
    /// Nothing joins the thread, it ends with the process.
    ///
    /// # Errors
    /// Returns an error only if the thread cannot be spawned.
    pub fn spawn(
        mut self,
        signal: Arc<ReloadSignal>,
        interval: Duration,
    ) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("livedocs-detector".to_string())
            .spawn(move || {
                info!(
                    "[Detector] Watching for changes in: {}",
                    self.root.display()
                );
                loop {
                    match self.poll(&signal) {
                        Ok(reload) => {
                            if reload {
                                debug!("[Detector] Reload signalled");
                            }
                            std::thread::sleep(interval);
                        }
                        Err(e) => {
                            error!("[Detector] Watch error: {}", e);
                            std::thread::sleep(ERROR_BACKOFF);
                        }
                    }
                }
            })
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }
}

/// Modification time of a walked file, or `None` if it vanished or cannot be read.
fn modified_time(entry: &DirEntry) -> Option<SystemTime> {
    let meta = match entry.metadata() {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Skipping {}: {}", entry.path().display(), e);
            return None;
        }
    };
    match meta.modified() {
        Ok(modified) => Some(modified),
        Err(e) => {
            debug!(
                "No modification time for {}: {}",
                entry.path().display(),
                e
            );
            None
        }
    }
}
