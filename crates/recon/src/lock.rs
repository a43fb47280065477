//! Serialization of report writes per run directory.
//!
//! Appending is a read-modify-write of one dump file. Without a lock, two
//! checks appending to the same run concurrently both read the same prior
//! state and the last writer drops the other's section.

use std::any::Any;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::ReportError;

pub const LOCK_FILE: &str = ".report.lock";

/// Hands out exclusive access to a run directory.
pub trait LockProvider: Send + Sync {
    fn acquire(&self, dir: &Path) -> Result<LockGuard, ReportError>;
}

/// A held lock. Released when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    _held: Box<dyn Any>,
}

impl LockGuard {
    pub fn new<T: 'static>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

static SHARED: Lazy<Arc<InProcessLocks>> = Lazy::new(|| Arc::new(InProcessLocks::default()));

/// One mutex per run directory, keyed by canonical path.
#[derive(Default)]
pub struct InProcessLocks {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl InProcessLocks {
    /// The process-wide registry. Stores built with defaults share it.
    pub fn shared() -> Arc<InProcessLocks> {
        Arc::clone(&SHARED)
    }

    fn slot(&self, dir: &Path) -> Arc<Mutex<()>> {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut slots = self.slots.lock();
        // Holders and waiters each own a clone; a lone map entry is idle
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(key).or_default())
    }

    /// Run directories with a holder or waiter.
    pub fn active(&self) -> usize {
        let slots = self.slots.lock();
        slots.values().filter(|slot| Arc::strong_count(slot) > 1).count()
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.slots.lock().len()
    }
}

impl LockProvider for InProcessLocks {
    fn acquire(&self, dir: &Path) -> Result<LockGuard, ReportError> {
        let slot = self.slot(dir);
        Ok(LockGuard::new(slot.lock_arc()))
    }
}

// ---------------------------------------------------------------------------
// Lock file
// ---------------------------------------------------------------------------

/// Cross-process lock: an exclusive `.report.lock` file in the run directory.
#[derive(Debug, Clone)]
pub struct FileLock {
    poll: Duration,
    timeout: Duration,
}

impl Default for FileLock {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(25),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FileLock {
    pub fn new(poll: Duration, timeout: Duration) -> Self {
        Self { poll, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

struct HeldFile {
    path: PathBuf,
}

impl Drop for HeldFile {
    fn drop(&mut self) {
        // Best-effort: a leftover lock file only blocks until someone removes it
        let _ = fs::remove_file(&self.path);
    }
}

impl LockProvider for FileLock {
    fn acquire(&self, dir: &Path) -> Result<LockGuard, ReportError> {
        let path = dir.join(LOCK_FILE);
        let started = Instant::now();
        let mut warned = false;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockGuard::new(HeldFile { path }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if reclaim_stale(&path) {
                        continue;
                    }
                    let waited = started.elapsed();
                    if waited >= self.timeout {
                        return Err(ReportError::LockTimeout {
                            path,
                            waited_ms: waited.as_millis(),
                        });
                    }
                    if !warned {
                        log::warn!("waiting for {} held by another writer", path.display());
                        warned = true;
                    }
                    std::thread::sleep(self.poll);
                }
                Err(e) => return Err(ReportError::io(&path, e)),
            }
        }
    }
}

/// Remove a lock file left behind by a writer that died mid-append.
///
/// A file without a readable pid may be mid-creation and is left alone. The
/// stale file is moved aside before deletion so a waiter that lost the race
/// to a fresh holder puts that holder's file back instead of deleting it.
fn reclaim_stale(path: &Path) -> bool {
    let Some(pid) = lock_owner(path) else {
        return false;
    };
    if is_process_alive(pid) {
        return false;
    }

    let seq = STALE_SEQ.fetch_add(1, Ordering::Relaxed);
    let aside = path.with_file_name(format!("{LOCK_FILE}.{}.{seq}.stale", std::process::id()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        // Another waiter reclaimed it first
        Err(e) => return e.kind() == std::io::ErrorKind::NotFound,
    }

    if lock_owner(&aside) == Some(pid) {
        log::warn!("removed stale lock {} left by dead process {pid}", path.display());
        let _ = fs::remove_file(&aside);
        true
    } else {
        // A live writer took the lock in between; hard_link fails if the path is taken
        let _ = fs::hard_link(&aside, path);
        let _ = fs::remove_file(&aside);
        false
    }
}

static STALE_SEQ: AtomicU64 = AtomicU64::new(0);

fn lock_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Check if a process is still running.
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // Signal 0 probes for existence; EPERM means it exists under another user
        if unsafe { libc::kill(pid, 0) } == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                false
            } else {
                CloseHandle(handle);
                true
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Assume alive if we can't check
        let _ = pid;
        true
    }
}

// ---------------------------------------------------------------------------
// Layered
// ---------------------------------------------------------------------------

/// Acquires every provider in order; all are held until the guard drops.
pub struct Layered {
    layers: Vec<Arc<dyn LockProvider>>,
}

impl Layered {
    pub fn new(layers: Vec<Arc<dyn LockProvider>>) -> Self {
        Self { layers }
    }

    /// Shared in-process registry, then a lock file.
    pub fn process_and_file(file: FileLock) -> Self {
        let process: Arc<dyn LockProvider> = InProcessLocks::shared();
        let file: Arc<dyn LockProvider> = Arc::new(file);
        Self::new(vec![process, file])
    }
}

impl LockProvider for Layered {
    fn acquire(&self, dir: &Path) -> Result<LockGuard, ReportError> {
        let mut guards = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            guards.push(layer.acquire(dir)?);
        }
        // Release innermost first
        guards.reverse();
        Ok(LockGuard::new(guards))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn in_process_lock_excludes_same_dir() {
        let dir = tempfile::tempdir().unwrap();
        let locks = Arc::new(InProcessLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = locks.acquire(&path).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idle_slots_are_dropped() {
        let locks = InProcessLocks::default();
        let dirs: Vec<_> = (0..16).map(|_| tempfile::tempdir().unwrap()).collect();
        for dir in &dirs {
            let _guard = locks.acquire(dir.path()).unwrap();
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
        // The last slot is only pruned by the next acquisition
        assert!(locks.registered() <= 1);

        let held = locks.acquire(dirs[0].path()).unwrap();
        let _other = locks.acquire(dirs[1].path()).unwrap();
        assert_eq!(locks.registered(), 2);
        drop(held);
        assert_eq!(locks.active(), 1);
    }

    #[test]
    fn different_dirs_do_not_block() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let locks = InProcessLocks::default();
        let _ga = locks.acquire(a.path()).unwrap();
        let _gb = locks.acquire(b.path()).unwrap();
    }

    #[test]
    fn file_lock_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(Duration::from_millis(5), Duration::from_millis(50));
        let held = lock.acquire(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());

        let err = lock.acquire(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::LockTimeout { .. }));

        drop(held);
        assert!(!dir.path().join(LOCK_FILE).exists());
        let _again = lock.acquire(dir.path()).unwrap();
    }

    /// A pid far above any default `pid_max`.
    #[cfg(unix)]
    const DEAD_PID: &str = "999999999";

    #[cfg(unix)]
    #[test]
    fn dead_holder_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), format!("{DEAD_PID}\n")).unwrap();

        let lock = FileLock::new(Duration::from_millis(5), Duration::from_millis(200));
        let held = lock.acquire(dir.path()).unwrap();
        let owner = fs::read_to_string(dir.path().join(LOCK_FILE)).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
        drop(held);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn live_holder_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), format!("{}\n", std::process::id())).unwrap();

        let lock = FileLock::new(Duration::from_millis(5), Duration::from_millis(50));
        let err = lock.acquire(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::LockTimeout { .. }));
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn lock_without_pid_is_not_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "").unwrap();
        assert!(!reclaim_stale(&dir.path().join(LOCK_FILE)));
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn layered_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let process: Arc<dyn LockProvider> = Arc::new(InProcessLocks::default());
        let file: Arc<dyn LockProvider> =
            Arc::new(FileLock::new(Duration::from_millis(5), Duration::from_millis(50)));
        let layered = Layered::new(vec![process, file]);
        {
            let _g = layered.acquire(dir.path()).unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        assert!(!dir.path().join(LOCK_FILE).exists());
        let _g = layered.acquire(dir.path()).unwrap();
    }
}
