//! Native library lifecycle: load, reference count, free.
//!
//! One [`NativeLibrary`] owns at most one bound [`NativeApi`]. Every native
//! call goes through [`NativeLibrary::with_api`], which holds the state lock
//! shared for the whole call, so a free (which takes it exclusively) always
//! happens after every in-flight call has returned.
//!
//! Freeing notifies subscribers synchronously, with the API still usable,
//! before the binding is dropped. The log stream registry relies on this to
//! detach its streams while the detach entry point still exists.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockWriteGuard};

use indexmap::IndexMap;
use loam_core::InteropError;

use crate::api::NativeApi;
use crate::dynamic::DynamicApi;
use crate::layout;

/// Environment variable naming the library file to load.
pub const ENV_LIBRARY_PATH: &str = "LOAM_ASSIMP_PATH";

/// Environment variable naming an extra directory to search.
pub const ENV_LIBRARY_DIR: &str = "LOAM_ASSIMP_DIR";

/// How native calls from different threads are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallPolicy {
    /// At most one native call at a time. Assimp's C API keeps global
    /// state (the last error string, the logger) and is not reentrant.
    #[default]
    Serialized,
    /// Calls may overlap. Only for libraries known to be thread-safe.
    Concurrent,
}

/// Where to find the native library and how to call it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Exact file to load. When set, nothing else is tried.
    pub library_path: Option<PathBuf>,
    /// Directories searched, in order, for each of `library_names`.
    pub search_dirs: Vec<PathBuf>,
    /// File names to try. Bare names are also tried through the platform
    /// loader's own search path after `search_dirs`.
    pub library_names: Vec<String>,
    /// Call ordering policy. Default: [`CallPolicy::Serialized`].
    pub call_policy: CallPolicy,
}

fn default_library_names() -> Vec<String> {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["assimp-vc143-mt.dll", "assimp-vc142-mt.dll", "assimp.dll"]
    } else if cfg!(target_os = "macos") {
        &["libassimp.dylib", "libassimp.5.dylib", "libassimp.4.dylib"]
    } else {
        &["libassimp.so", "libassimp.so.5", "libassimp.so.4"]
    };
    names.iter().map(|n| n.to_string()).collect()
}

impl LibraryConfig {
    /// Platform default names, no explicit path, serialized calls.
    pub fn new() -> Self {
        Self {
            library_path: None,
            search_dirs: Vec::new(),
            library_names: default_library_names(),
            call_policy: CallPolicy::default(),
        }
    }

    /// Defaults overridden by [`ENV_LIBRARY_PATH`] and [`ENV_LIBRARY_DIR`].
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(path) = std::env::var_os(ENV_LIBRARY_PATH).filter(|v| !v.is_empty()) {
            config.library_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = std::env::var_os(ENV_LIBRARY_DIR).filter(|v| !v.is_empty()) {
            config.search_dirs.push(PathBuf::from(dir));
        }
        config
    }

    /// Builder: load exactly this file.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Builder: append a search directory.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Builder: set the call policy.
    pub fn with_call_policy(mut self, policy: CallPolicy) -> Self {
        self.call_policy = policy;
        self
    }

    /// Every path a load will try, in order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.library_path {
            return vec![path.clone()];
        }
        let mut out: Vec<PathBuf> = self
            .search_dirs
            .iter()
            .flat_map(|dir| self.library_names.iter().map(move |n| dir.join(n)))
            .collect();
        out.extend(self.library_names.iter().map(PathBuf::from));
        out
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`NativeLibrary::on_freed`].
#[must_use = "dropping the subscription handle makes it impossible to unsubscribe"]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FreedSubscription(u64);

/// One counted reference to a loaded library, returned by every load.
///
/// Give it back with [`NativeLibrary::release`]. A lease taken before a
/// [`NativeLibrary::free_library`] belongs to the old load, and releasing
/// it after a reload does nothing.
#[must_use = "a lease that is never released keeps the library loaded"]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LibraryLease {
    epoch: u64,
}

impl LibraryLease {
    /// The load this lease counts against. Every successful load from
    /// `Unloaded` starts a new epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

type FreedListener = Arc<dyn Fn(&dyn NativeApi) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_id: IndexMap<u64, FreedListener>,
}

enum LibraryState {
    Unloaded,
    Loaded {
        api: Arc<dyn NativeApi>,
        ref_count: usize,
        epoch: u64,
    },
}

// Bindings in use by a call on this thread, keyed by library address. A
// nested call on the same library (a log callback detaching its stream
// mid-import) reuses the outer call's binding instead of locking again.
thread_local! {
    static ACTIVE_CALLS: RefCell<Vec<(usize, Arc<dyn NativeApi>)>> =
        const { RefCell::new(Vec::new()) };
}

struct ActiveCall;

impl ActiveCall {
    fn enter(library: usize, api: Arc<dyn NativeApi>) -> Self {
        ACTIVE_CALLS.with(|calls| calls.borrow_mut().push((library, api)));
        ActiveCall
    }

    fn current(library: usize) -> Option<Arc<dyn NativeApi>> {
        ACTIVE_CALLS.with(|calls| {
            calls
                .borrow()
                .iter()
                .rev()
                .find(|(id, _)| *id == library)
                .map(|(_, api)| Arc::clone(api))
        })
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        ACTIVE_CALLS.with(|calls| {
            calls.borrow_mut().pop();
        });
    }
}

/// A reference-counted handle to the native library.
///
/// `Unloaded → Loaded → Unloaded`. Loading while loaded only bumps the
/// reference count. Any native call made while unloaded fails with
/// [`InteropError::LibraryNotLoaded`].
pub struct NativeLibrary {
    config: LibraryConfig,
    state: RwLock<LibraryState>,
    epochs: AtomicU64,
    call_lock: Mutex<()>,
    listeners: Mutex<Listeners>,
}

impl NativeLibrary {
    /// An unloaded library with its own configuration.
    pub fn new(config: LibraryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LibraryState::Unloaded),
            epochs: AtomicU64::new(0),
            call_lock: Mutex::new(()),
            listeners: Mutex::new(Listeners::default()),
        }
    }

    /// The process-wide instance, configured from the environment.
    pub fn global() -> Arc<NativeLibrary> {
        static GLOBAL: OnceLock<Arc<NativeLibrary>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(NativeLibrary::new(LibraryConfig::from_env())))
            .clone()
    }

    /// The configuration this instance loads with.
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Locate, open, bind, and verify the shared library.
    ///
    /// While loaded this only increments the reference count.
    pub fn load_library(&self) -> Result<LibraryLease, InteropError> {
        let mut state = self.write_state();
        if let Some(lease) = Self::retain(&mut state) {
            return Ok(lease);
        }
        let api = DynamicApi::open_first(self.config.candidates())?;
        self.install(&mut state, Arc::new(api))
    }

    /// Load with an already-bound API instead of opening a file.
    ///
    /// While loaded this only increments the reference count; `api` is
    /// dropped and the existing binding is kept.
    pub fn load_with(&self, api: Arc<dyn NativeApi>) -> Result<LibraryLease, InteropError> {
        let mut state = self.write_state();
        if let Some(lease) = Self::retain(&mut state) {
            return Ok(lease);
        }
        self.install(&mut state, api)
    }

    fn retain(state: &mut LibraryState) -> Option<LibraryLease> {
        match state {
            LibraryState::Loaded {
                ref_count, epoch, ..
            } => {
                *ref_count += 1;
                log::debug!("native library retained (refs = {ref_count}, epoch {epoch})");
                Some(LibraryLease { epoch: *epoch })
            }
            LibraryState::Unloaded => None,
        }
    }

    fn install(
        &self,
        state: &mut LibraryState,
        api: Arc<dyn NativeApi>,
    ) -> Result<LibraryLease, InteropError> {
        layout::verify_reported_sizes(&|name| api.struct_size(name))?;
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        *state = LibraryState::Loaded {
            api,
            ref_count: 1,
            epoch,
        };
        log::debug!("native library loaded (epoch {epoch})");
        Ok(LibraryLease { epoch })
    }

    /// Give back one reference; the library is freed when the count
    /// reaches zero.
    ///
    /// A no-op while unloaded, and for a lease from an earlier load.
    /// Returns whether the lease counted.
    pub fn release(&self, lease: LibraryLease) -> bool {
        let mut state = self.write_state();
        let last = match &mut *state {
            LibraryState::Loaded {
                ref_count, epoch, ..
            } if *epoch == lease.epoch => {
                *ref_count -= 1;
                log::debug!("native library released (refs = {ref_count})");
                *ref_count == 0
            }
            _ => {
                log::debug!("ignoring release of stale lease (epoch {})", lease.epoch);
                return false;
            }
        };
        if last {
            self.teardown(&mut state);
        }
        true
    }

    /// Free the library regardless of outstanding references.
    ///
    /// Leases taken before the free stop counting.
    pub fn free_library(&self) {
        let mut state = self.write_state();
        self.teardown(&mut state);
    }

    fn teardown(&self, state: &mut LibraryState) {
        let LibraryState::Loaded { api, .. } = std::mem::replace(state, LibraryState::Unloaded)
        else {
            return;
        };
        let listeners: Vec<FreedListener> =
            self.lock_listeners().by_id.values().cloned().collect();
        log::debug!(
            "freeing native library; notifying {} listeners",
            listeners.len()
        );
        {
            let _active = ActiveCall::enter(self.id(), Arc::clone(&api));
            for listener in listeners {
                listener(&*api);
            }
        }
        drop(api);
        log::debug!("native library freed");
    }

    /// Whether a binding is installed.
    pub fn is_loaded(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            LibraryState::Loaded { .. }
        )
    }

    /// Outstanding references; zero while unloaded.
    pub fn ref_count(&self) -> usize {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            LibraryState::Loaded { ref_count, .. } => *ref_count,
            LibraryState::Unloaded => 0,
        }
    }

    /// The current load's epoch, or `None` while unloaded.
    pub fn epoch(&self) -> Option<u64> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            LibraryState::Loaded { epoch, .. } => Some(*epoch),
            LibraryState::Unloaded => None,
        }
    }

    // ── Freed notifications ─────────────────────────────────────

    /// Run `listener` every time the library is freed, before the binding
    /// is dropped.
    ///
    /// Listeners run with the library state locked exclusively. They may
    /// make native calls through this library (those reuse the binding
    /// being freed) but must not load, release, or free it.
    pub fn on_freed<F>(&self, listener: F) -> FreedSubscription
    where
        F: Fn(&dyn NativeApi) + Send + Sync + 'static,
    {
        let mut listeners = self.lock_listeners();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.by_id.insert(id, Arc::new(listener));
        FreedSubscription(id)
    }

    /// Remove a listener. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: FreedSubscription) -> bool {
        self.lock_listeners()
            .by_id
            .shift_remove(&subscription.0)
            .is_some()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().by_id.len()
    }

    // ── Calls ───────────────────────────────────────────────────

    /// Run `f` against the bound API.
    ///
    /// The library cannot be freed while `f` runs. Under
    /// [`CallPolicy::Serialized`] calls from different threads do not
    /// overlap. A call made from inside `f` on the same thread (typically
    /// from a log callback) runs on the outer call's binding without
    /// taking any lock. `f` must not load, release, or free this library.
    pub fn with_api<R>(&self, f: impl FnOnce(&dyn NativeApi) -> R) -> Result<R, InteropError> {
        if let Some(api) = ActiveCall::current(self.id()) {
            return Ok(f(&*api));
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let LibraryState::Loaded { api, .. } = &*state else {
            return Err(InteropError::LibraryNotLoaded);
        };
        let _serial = match self.config.call_policy {
            CallPolicy::Serialized => {
                Some(self.call_lock.lock().unwrap_or_else(PoisonError::into_inner))
            }
            CallPolicy::Concurrent => None,
        };
        let _active = ActiveCall::enter(self.id(), Arc::clone(api));
        Ok(f(&**api))
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if matches!(state, LibraryState::Loaded { .. }) {
            log::debug!("native library handle dropped while loaded");
            let mut taken = std::mem::replace(state, LibraryState::Unloaded);
            self.teardown(&mut taken);
        }
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("config", &self.config)
            .field("loaded", &self.is_loaded())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
