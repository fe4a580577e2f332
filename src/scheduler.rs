//! Multi-task backup scheduler.
//!
//! One background thread drives a shared task list. Scheduled tasks fire on
//! an interval (immediately the first time); realtime tasks fire when the
//! source tree's mtime snapshot changes. After each successful backup the
//! destination is pruned to the task's retention bound.
//!
//! Task mutation (adding tasks, per-task filter/password/algorithm) and the
//! loop itself synchronize on a single mutex; the loop waits on a condvar
//! with a two-second timeout so `stop()` wakes it without busy-polling.
//! Tasks run sequentially on the scheduler thread in insertion order, and a
//! running backup is never cancelled mid-flight: `stop()` drains after the
//! current task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Local;

use crate::codec::Algorithm;
use crate::filter::FilterOptions;
use crate::system::BackupSystem;
use crate::traverse::Traverser;

/// Loop tick: the longest the thread sleeps between trigger checks.
const TICK: Duration = Duration::from_secs(2);

/// Task identifier returned by the `add_*_task` methods.
pub type TaskId = u32;

/// How a task decides when to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs every `interval` seconds.
    Scheduled,
    /// Runs when the source tree changes (mtime snapshot diff).
    Realtime,
}

struct BackupTask {
    id: TaskId,
    kind: TaskKind,
    src_dir: PathBuf,
    dst_dir: PathBuf,
    prefix: String,
    interval_secs: u64,
    max_backups: i32,
    last_run: u64,
    /// Relative path → mtime, files only. Realtime tasks only.
    snapshot: HashMap<String, i64>,
    system: BackupSystem,
}

#[derive(Default)]
struct TaskList {
    tasks: Vec<BackupTask>,
    next_id: TaskId,
    running: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TaskList>,
    wakeup: Condvar,
}

/// Long-lived scheduler owning one [`BackupSystem`] per task.
///
/// Dropping the scheduler stops the background thread; a backup in progress
/// finishes first.
pub struct BackupScheduler {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Default for BackupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupScheduler {
    /// Creates a stopped scheduler with no tasks.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            thread: None,
        }
    }

    /// Starts the background thread. A second call is a no-op.
    pub fn start(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("scheduler mutex");
            if state.running {
                return;
            }
            state.running = true;
        }
        let shared = Arc::clone(&self.shared);
        self.thread = Some(
            std::thread::Builder::new()
                .name("backup-scheduler".into())
                .spawn(move || run_loop(&shared))
                .expect("spawn scheduler thread"),
        );
        log::info!("scheduler started");
    }

    /// Signals the loop to exit and joins the thread.
    ///
    /// The current task, if one is mid-backup, completes first; no task is
    /// cancelled in flight.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("scheduler mutex");
            if !state.running {
                return;
            }
            state.running = false;
        }
        self.shared.wakeup.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        log::info!("scheduler stopped");
    }

    /// Adds a periodic task; fires immediately on the first tick.
    ///
    /// `max_keep <= 0` disables retention pruning. The destination directory
    /// is created eagerly.
    pub fn add_scheduled_task(
        &self,
        src_dir: impl Into<PathBuf>,
        dst_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        interval_secs: u64,
        max_keep: i32,
    ) -> TaskId {
        let dst_dir = dst_dir.into();
        ensure_dst_dir(&dst_dir);

        let mut state = self.shared.state.lock().expect("scheduler mutex");
        let id = state.allocate_id();
        state.tasks.push(BackupTask {
            id,
            kind: TaskKind::Scheduled,
            src_dir: src_dir.into(),
            dst_dir,
            prefix: prefix.into(),
            interval_secs,
            max_backups: max_keep,
            last_run: 0,
            snapshot: HashMap::new(),
            system: BackupSystem::new(),
        });
        id
    }

    /// Adds a change-driven task.
    ///
    /// The initial snapshot is taken now, so content that already exists
    /// does not trigger an immediate backup. A traversal failure here leaves
    /// an empty snapshot (logged); the first successful check then fires.
    pub fn add_realtime_task(
        &self,
        src_dir: impl Into<PathBuf>,
        dst_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        max_keep: i32,
    ) -> TaskId {
        let src_dir = src_dir.into();
        let dst_dir = dst_dir.into();
        ensure_dst_dir(&dst_dir);

        let snapshot = match take_snapshot(&src_dir) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("initial snapshot of {} failed: {e}", src_dir.display());
                HashMap::new()
            }
        };

        let mut state = self.shared.state.lock().expect("scheduler mutex");
        let id = state.allocate_id();
        state.tasks.push(BackupTask {
            id,
            kind: TaskKind::Realtime,
            src_dir,
            dst_dir,
            prefix: prefix.into(),
            interval_secs: 0,
            max_backups: max_keep,
            last_run: unix_now(),
            snapshot,
            system: BackupSystem::new(),
        });
        id
    }

    /// Installs filter options on a task's pipeline.
    pub fn set_task_filter(&self, task_id: TaskId, options: FilterOptions) {
        self.with_task(task_id, |task| task.system.set_filter(options));
    }

    /// Sets a task's encryption password; empty disables.
    pub fn set_task_password(&self, task_id: TaskId, password: &str) {
        self.with_task(task_id, |task| task.system.set_password(password));
    }

    /// Sets a task's compression algorithm.
    pub fn set_task_compression_algorithm(&self, task_id: TaskId, algorithm: Algorithm) {
        self.with_task(task_id, |task| {
            task.system.set_compression_algorithm(algorithm)
        });
    }

    fn with_task(&self, task_id: TaskId, apply: impl FnOnce(&mut BackupTask)) {
        let mut state = self.shared.state.lock().expect("scheduler mutex");
        match state.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => apply(task),
            None => log::warn!("no such task: {task_id}"),
        }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl TaskList {
    fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        self.next_id
    }
}

fn run_loop(shared: &Shared) {
    loop {
        {
            let mut state = shared.state.lock().expect("scheduler mutex");
            if !state.running {
                break;
            }

            let now = unix_now();
            for task in &mut state.tasks {
                let should_run = match task.kind {
                    TaskKind::Scheduled => {
                        task.last_run == 0 || now.saturating_sub(task.last_run) >= task.interval_secs
                    }
                    TaskKind::Realtime => {
                        let changed = refresh_snapshot(task);
                        if changed {
                            log::info!("detected changes in {}", task.src_dir.display());
                        }
                        changed
                    }
                };

                if should_run {
                    perform_backup(task);
                    task.last_run = unix_now();
                }
            }
        }

        // Timed wait; stop() notifies to wake the loop early.
        let state = shared.state.lock().expect("scheduler mutex");
        let (state, _) = shared
            .wakeup
            .wait_timeout_while(state, TICK, |s| s.running)
            .expect("scheduler mutex");
        if !state.running {
            break;
        }
    }
}

/// Runs one task's backup and prunes on success. Errors are logged and do
/// not stop the scheduler.
fn perform_backup(task: &mut BackupTask) {
    let artifact = task.dst_dir.join(format!(
        "{}_{}.bin",
        task.prefix,
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    log::info!("running task {}: {}", task.id, artifact.display());

    if task.system.backup(&task.src_dir, &artifact) {
        prune_old_backups(task);
    } else {
        log::warn!("task {} failed; will retry on next trigger", task.id);
    }
}

/// Compares the stored snapshot against the tree and replaces it on change.
///
/// Change means: any file's mtime differs, or the set of relative paths
/// differs. Directories are ignored. A traversal error reads as "no change".
fn refresh_snapshot(task: &mut BackupTask) -> bool {
    let current = match take_snapshot(&task.src_dir) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("snapshot of {} failed: {e}", task.src_dir.display());
            return false;
        }
    };

    let changed = current.len() != task.snapshot.len()
        || current
            .iter()
            .any(|(path, mtime)| task.snapshot.get(path) != Some(mtime));

    if changed {
        task.snapshot = current;
    }
    changed
}

fn take_snapshot(src_dir: &Path) -> crate::Result<HashMap<String, i64>> {
    let records = Traverser::new().traverse(src_dir)?;
    Ok(records
        .into_iter()
        .filter(|r| !r.is_dir())
        .map(|r| (r.relative_path, r.mtime))
        .collect())
}

/// Removes the oldest `prefix*.bin` artifacts beyond the retention bound.
fn prune_old_backups(task: &BackupTask) {
    if task.max_backups <= 0 {
        return;
    }

    let entries = match std::fs::read_dir(&task.dst_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot list {}: {e}", task.dst_dir.display());
            return;
        }
    };

    let mut backups: Vec<(PathBuf, SystemTime)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&task.prefix) || !name.ends_with(".bin") {
                return None;
            }
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((entry.path(), meta.modified().ok()?))
        })
        .collect();

    if backups.len() <= task.max_backups as usize {
        return;
    }

    backups.sort_by_key(|(_, modified)| *modified);
    let excess = backups.len() - task.max_backups as usize;
    for (path, _) in backups.into_iter().take(excess) {
        log::info!("pruning old backup: {}", path.display());
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("failed to prune {}: {e}", path.display());
        }
    }
}

fn ensure_dst_dir(dst_dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dst_dir) {
        log::warn!("cannot create {}: {e}", dst_dir.display());
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
