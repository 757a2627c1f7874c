//! Directory walker: traverses the collect dir on its own thread, applies the walker filters and
//! hands each accepted file to the readers over a rendezvous channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, warn};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::engine::cancel::{CancelToken, send_or_cancel};
use crate::engine::filters::{FilterChain, FilterSet};
use crate::engine::tools::relative_index;
use crate::error::{CollectError, CollectResult};
use crate::utils::Logger;
use crate::{FileItem, Rule, WalkStrategy};

/// One result from a directory walk: a regular file, or an error with optional path.
pub enum WalkOutcome {
    File(PathBuf),
    Err {
        msg: String,
        path: Option<PathBuf>,
        /// The root itself could not be read.
        at_root: bool,
    },
}

/// Convert a walkdir result into a [`WalkOutcome`]; directories and other non-files are dropped.
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> Option<WalkOutcome> {
    match r {
        Ok(entry) if entry.file_type().is_file() => Some(WalkOutcome::File(entry.into_path())),
        Ok(_) => None,
        Err(err) => Some(WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
            at_root: err.depth() == 0,
        }),
    }
}

/// Iterative traversal over an explicit stack of pending directories.
///
/// Reads one directory per step, so memory is the frontier rather than the recursion depth.
/// Symlinks are followed to files when `follow_links` is set; symlinked directories are not
/// entered.
pub struct WideWalk {
    folders: Vec<PathBuf>,
    pending: VecDeque<WalkOutcome>,
    follow_links: bool,
    root: PathBuf,
}

impl WideWalk {
    pub fn new(root: &Path, follow_links: bool) -> Self {
        Self {
            folders: vec![root.to_path_buf()],
            pending: VecDeque::new(),
            follow_links,
            root: root.to_path_buf(),
        }
    }

    fn scan_one(&mut self, dir: PathBuf) {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.pending.push_back(WalkOutcome::Err {
                    msg: e.to_string(),
                    at_root: dir == self.root,
                    path: Some(dir),
                });
                return;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.pending.push_back(WalkOutcome::Err {
                        msg: e.to_string(),
                        path: Some(dir.clone()),
                        at_root: false,
                    });
                    continue;
                }
            };
            let path = entry.path();
            let Ok(ft) = entry.file_type() else {
                continue;
            };
            if ft.is_dir() {
                self.folders.push(path);
            } else if ft.is_file() {
                self.pending.push_back(WalkOutcome::File(path));
            } else if ft.is_symlink()
                && self.follow_links
                && fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false)
            {
                self.pending.push_back(WalkOutcome::File(path));
            }
        }
    }
}

impl Iterator for WideWalk {
    type Item = WalkOutcome;

    fn next(&mut self) -> Option<WalkOutcome> {
        loop {
            if let Some(out) = self.pending.pop_front() {
                return Some(out);
            }
            let dir = self.folders.pop()?;
            self.scan_one(dir);
        }
    }
}

/// Everything the walk thread needs, moved into it.
pub struct WalkContext {
    pub root: PathBuf,
    pub strategy: WalkStrategy,
    pub follow_links: bool,
    pub strict: bool,
    pub filters: FilterSet,
    pub rule: Rule,
    pub cancel: CancelToken,
    pub log: Logger,
}

fn walkdir_iter(ctx: &WalkContext) -> Box<dyn Iterator<Item = WalkOutcome>> {
    use walkdir::WalkDir;
    Box::new(
        WalkDir::new(&ctx.root)
            .follow_links(ctx.follow_links)
            .into_iter()
            .filter_map(to_outcome_walkdir),
    )
}

fn wide_iter(ctx: &WalkContext) -> Box<dyn Iterator<Item = WalkOutcome>> {
    Box::new(WideWalk::new(&ctx.root, ctx.follow_links))
}

/// Run the walk loop: filter each file, emit a [`FileItem`] on `files`, honor cancel.
///
/// Returns the number of items emitted, or the terminal error: a root failure, the first
/// traversal error when strict, or [`CollectError::WalkCanceled`] when cancel fired or the
/// consumer went away. Non-strict traversal errors are logged and skipped.
pub fn run_walk_loop<I>(files: &Sender<FileItem>, ctx: &WalkContext, iter: I) -> CollectResult<usize>
where
    I: Iterator<Item = WalkOutcome>,
{
    let mut count = 0_usize;
    let mut skipped = 0_usize;
    for outcome in iter {
        if ctx.cancel.is_canceled() {
            return Err(CollectError::WalkCanceled);
        }
        match outcome {
            WalkOutcome::File(path) => {
                if !ctx.filters.matches(&path, &ctx.rule) {
                    continue;
                }
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let item = FileItem {
                    relative_index: relative_index(&path, &ctx.root),
                    path,
                    size,
                };
                if !send_or_cancel(files, item, &ctx.cancel) {
                    return Err(CollectError::WalkCanceled);
                }
                count += 1;
            }
            WalkOutcome::Err { msg, path, at_root } => {
                if at_root || ctx.strict {
                    return Err(CollectError::Walk { msg, path });
                }
                warn!(target: ctx.log.target(), "Skipping unreadable path: {}", msg);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(
            target: ctx.log.target(),
            "Skipped {} paths due to permission errors or access issues", skipped
        );
    }
    Ok(count)
}

/// Receiving side of one walk.
pub struct WalkHandles {
    /// Lazy, single-pass stream of accepted files. Closes when the walk ends.
    pub items: Receiver<FileItem>,
    /// Exactly one terminal status, sent after `items` is closed.
    pub done: Receiver<CollectResult<usize>>,
    pub handle: JoinHandle<()>,
    pub log: Logger,
}

impl WalkHandles {
    /// Stop consuming and wait for the terminal status. Items not yet taken are dropped, so a walk
    /// still in progress ends as [`CollectError::WalkCanceled`].
    pub fn finish(self) -> CollectResult<usize> {
        let WalkHandles {
            items,
            done,
            handle,
            log,
        } = self;
        drop(items);
        wait_walk(&done, handle, &log)
    }
}

/// Receive the walk's single terminal status, then join its thread.
pub fn wait_walk(
    done: &Receiver<CollectResult<usize>>,
    handle: JoinHandle<()>,
    log: &Logger,
) -> CollectResult<usize> {
    let status = done.recv().unwrap_or_else(|_| {
        Err(CollectError::Walk {
            msg: "walk thread exited without status".to_string(),
            path: None,
        })
    });
    if handle.join().is_err() {
        warn!(target: log.target(), "walk thread panicked");
    }
    status
}

/// Enumerates files under a root directory.
pub struct FileWalker {
    root: PathBuf,
    strategy: WalkStrategy,
    follow_links: bool,
    strict: bool,
    rule: Rule,
    filters: FilterChain,
    log: Logger,
}

impl FileWalker {
    pub fn new(root: &Path, rule: Rule) -> Self {
        Self {
            root: root.to_path_buf(),
            strategy: WalkStrategy::default(),
            follow_links: false,
            strict: true,
            rule,
            filters: FilterChain::new(),
            log: Logger::default().child("walk"),
        }
    }

    pub fn strategy(mut self, strategy: WalkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn set_rule(&mut self, rule: Rule) {
        self.rule = rule;
    }

    /// Add a walker filter.
    pub fn on_filter<F>(&self, f: F)
    where
        F: Fn(&Path, &Rule) -> bool + Send + Sync + 'static,
    {
        self.filters.on_filter(f);
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Walk the configured root.
    pub fn walk(&self, cancel: &CancelToken) -> WalkHandles {
        self.walk_dir(&self.root, cancel)
    }

    /// Walk `root` on a new thread. Items are handed over one at a time (rendezvous channel), so
    /// the walk runs no further ahead than the readers.
    pub fn walk_dir(&self, root: &Path, cancel: &CancelToken) -> WalkHandles {
        let (files_tx, files_rx) = bounded::<FileItem>(0);
        let (done_tx, done_rx) = bounded::<CollectResult<usize>>(1);
        let ctx = WalkContext {
            root: root.to_path_buf(),
            strategy: self.strategy,
            follow_links: self.follow_links,
            strict: self.strict,
            filters: self.filters.fixed(),
            rule: self.rule.clone(),
            cancel: cancel.clone(),
            log: self.log.clone(),
        };
        let handle = thread::spawn(move || {
            debug!(
                target: ctx.log.target(),
                "Walking {} ({:?})", ctx.root.display(), ctx.strategy
            );
            let iter = match ctx.strategy {
                WalkStrategy::Recursive => walkdir_iter(&ctx),
                WalkStrategy::Wide => wide_iter(&ctx),
            };
            let status = run_walk_loop(&files_tx, &ctx, iter);
            drop(files_tx);
            let _ = done_tx.send(status);
        });
        WalkHandles {
            items: files_rx,
            done: done_rx,
            handle,
            log: self.log.clone(),
        }
    }
}
