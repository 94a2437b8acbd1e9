//! Native log streams and the registry that attaches them.
//!
//! A [`LogStream`] owns one `aiLogStream` block in a process-wide arena.
//! The block's user pointer is the stream's shared state, which the
//! registry keeps alive for as long as the stream is attached. Every native
//! callback enters through one `extern "C"` trampoline, which recovers the
//! stream from that pointer.
//!
//! Lock order is library state, then registry. Attach and detach take the
//! library state shared (through [`NativeLibrary::with_api`]); a library
//! free takes it exclusively and detaches everything from its freed
//! listener, so the two never interleave. A callback may attach or detach
//! streams while the native call that logged is still running; those nested
//! calls reuse the running call's binding.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use indexmap::IndexMap;
use loam_arena::{NativeArena, NativeHandle};
use loam_core::InteropError;

use crate::api::NativeApi;
use crate::library::{FreedSubscription, NativeLibrary};
use crate::types::AiLogStream;

fn log_arena() -> &'static NativeArena {
    static ARENA: OnceLock<NativeArena> = OnceLock::new();
    ARENA.get_or_init(NativeArena::with_defaults)
}

type Callback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct Shared {
    callback: Callback,
    user_data: String,
    attached: AtomicBool,
    native: NativeHandle,
}

impl Shared {
    fn dispatch(&self, message: &str) {
        (self.callback)(message, &self.user_data);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        log_arena().free(&mut self.native);
    }
}

/// Native entry point for every stream's messages.
#[allow(unsafe_code)]
extern "C" fn trampoline(message: *const c_char, user: *mut c_char) {
    if message.is_null() || user.is_null() {
        return;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `user` is the `Shared` pointer written by `LogStream::build`;
        // the registry holds a strong reference while the native side can
        // call back, and `message` is NUL-terminated per the C API.
        let (shared, text) = unsafe {
            (
                &*(user as *const Shared),
                CStr::from_ptr(message).to_string_lossy(),
            )
        };
        shared.dispatch(&text);
    }));
    if result.is_err() {
        log::error!("log stream callback panicked; message dropped");
    }
}

/// A sink for native log messages.
///
/// Clones share one native block and one attachment flag.
#[derive(Clone)]
pub struct LogStream {
    shared: Arc<Shared>,
}

impl LogStream {
    /// A stream that calls `callback(message, user_data)` per message.
    pub fn new<F>(callback: F) -> Result<Self, InteropError>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        Self::build(Box::new(callback), String::new())
    }

    /// Like [`LogStream::new`], with user data passed to every call.
    pub fn with_user_data<F>(
        callback: F,
        user_data: impl Into<String>,
    ) -> Result<Self, InteropError>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        Self::build(Box::new(callback), user_data.into())
    }

    /// Print messages to stdout, prefixed by `user_data` when non-empty.
    pub fn console(user_data: impl Into<String>) -> Result<Self, InteropError> {
        Self::with_user_data(
            |msg, user| {
                let msg = msg.trim_end();
                if user.is_empty() {
                    println!("{msg}");
                } else {
                    println!("{user}: {msg}");
                }
            },
            user_data,
        )
    }

    /// Forward messages to the `log` facade under target `assimp`, at the
    /// level named by the message prefix (`Error,`, `Warn,`, `Info,`,
    /// `Debug,`).
    pub fn forwarding() -> Result<Self, InteropError> {
        Self::new(|msg, _| {
            log::log!(target: "assimp", message_level(msg), "{}", msg.trim_end());
        })
    }

    fn build(callback: Callback, user_data: String) -> Result<Self, InteropError> {
        let arena = log_arena();
        let native = arena.allocate(std::mem::size_of::<AiLogStream>())?;
        let shared = Arc::new(Shared {
            callback,
            user_data,
            attached: AtomicBool::new(false),
            native,
        });
        let block = AiLogStream {
            callback: Some(trampoline),
            user: Arc::as_ptr(&shared).cast_mut().cast(),
        };
        arena.write_struct(&shared.native, 0, block)?;
        Ok(Self { shared })
    }

    /// Deliver `message` to the callback, as the native side would.
    ///
    /// Ignored unless the stream is attached and `message` is non-empty.
    pub fn log(&self, message: &str) {
        if self.is_attached() && !message.is_empty() {
            self.shared.dispatch(message);
        }
    }

    /// The user data passed to every callback.
    pub fn user_data(&self) -> &str {
        &self.shared.user_data
    }

    /// Whether the stream is attached to a registry.
    pub fn is_attached(&self) -> bool {
        self.shared.attached.load(Ordering::Acquire)
    }

    /// Attach to the process-wide registry.
    pub fn attach(&self) -> Result<(), InteropError> {
        LogStreamRegistry::global().attach(self)
    }

    /// Detach from the process-wide registry.
    pub fn detach(&self) -> Result<(), InteropError> {
        LogStreamRegistry::global().detach(self)
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// The native `aiLogStream` block, valid while any clone of this
    /// stream lives.
    pub fn native_ptr(&self) -> *const AiLogStream {
        self.shared.native.cast::<AiLogStream>()
    }

    fn set_attached(&self, attached: bool) {
        self.shared.attached.store(attached, Ordering::Release);
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("user_data", &self.shared.user_data)
            .field("attached", &self.is_attached())
            .field("native", &self.shared.native)
            .finish()
    }
}

fn message_level(msg: &str) -> log::Level {
    let head = msg.split(',').next().unwrap_or("").trim();
    match head {
        "Error" => log::Level::Error,
        "Warn" => log::Level::Warn,
        "Debug" => log::Level::Debug,
        _ => log::Level::Info,
    }
}

/// The set of streams attached to one [`NativeLibrary`].
///
/// Freeing the library detaches every stream in the registry.
pub struct LogStreamRegistry {
    library: Arc<NativeLibrary>,
    streams: Mutex<IndexMap<usize, LogStream>>,
    verbose: AtomicBool,
    subscription: FreedSubscription,
}

impl LogStreamRegistry {
    /// A registry bound to `library`, subscribed to its freed event.
    pub fn new(library: Arc<NativeLibrary>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let subscription = library.on_freed(move |api| {
                if let Some(registry) = weak.upgrade() {
                    registry.detach_all_with(api);
                }
            });
            Self {
                library,
                streams: Mutex::new(IndexMap::new()),
                verbose: AtomicBool::new(false),
                subscription,
            }
        })
    }

    /// The registry for [`NativeLibrary::global`].
    pub fn global() -> Arc<LogStreamRegistry> {
        static GLOBAL: OnceLock<Arc<LogStreamRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| LogStreamRegistry::new(NativeLibrary::global()))
            .clone()
    }

    /// The library this registry attaches to.
    pub fn library(&self) -> &Arc<NativeLibrary> {
        &self.library
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<usize, LogStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `stream`. A no-op if it is already attached.
    #[allow(unsafe_code)]
    pub fn attach(&self, stream: &LogStream) -> Result<(), InteropError> {
        self.library.with_api(|api| {
            let mut streams = self.lock();
            if stream.is_attached() || streams.contains_key(&stream.id()) {
                return;
            }
            // SAFETY: the native block lives as long as `Shared`, which the
            // registry keeps alive until the stream is detached.
            unsafe { api.attach_log_stream(stream.native_ptr()) };
            stream.set_attached(true);
            streams.insert(stream.id(), stream.clone());
            log::debug!("log stream attached ({} total)", streams.len());
        })
    }

    /// Detach `stream`. A no-op if it is not attached here.
    pub fn detach(&self, stream: &LogStream) -> Result<(), InteropError> {
        if !stream.is_attached() {
            return Ok(());
        }
        self.library.with_api(|api| {
            let mut streams = self.lock();
            if let Some(s) = streams.shift_remove(&stream.id()) {
                Self::detach_native(api, &s);
                log::debug!("log stream detached ({} left)", streams.len());
            }
        })
    }

    /// Detach every stream. Returns how many were detached.
    pub fn detach_all(&self) -> Result<usize, InteropError> {
        self.library.with_api(|api| self.detach_all_with(api))
    }

    /// Detach every stream through an API the caller already holds.
    ///
    /// This is what the library's freed listener runs.
    pub fn detach_all_with(&self, api: &dyn NativeApi) -> usize {
        let snapshot: Vec<LogStream> = self.lock().drain(..).map(|(_, s)| s).collect();
        for stream in &snapshot {
            Self::detach_native(api, stream);
        }
        if !snapshot.is_empty() {
            log::debug!("detached {} log streams", snapshot.len());
        }
        snapshot.len()
    }

    #[allow(unsafe_code)]
    fn detach_native(api: &dyn NativeApi, stream: &LogStream) {
        // SAFETY: the block is valid; `stream` keeps it alive.
        let status = unsafe { api.detach_log_stream(stream.native_ptr()) };
        if !status.is_success() {
            log::warn!("native detach of log stream failed: {status:?}");
        }
        stream.set_attached(false);
    }

    /// Snapshot of the attached streams, in attach order.
    pub fn attached_streams(&self) -> Vec<LogStream> {
        self.lock().values().cloned().collect()
    }

    /// Number of attached streams.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no stream is attached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Toggle the native library's verbose logging.
    pub fn set_verbose_logging(&self, enabled: bool) -> Result<(), InteropError> {
        self.library.with_api(|api| api.enable_verbose_logging(enabled))?;
        self.verbose.store(enabled, Ordering::Release);
        Ok(())
    }

    /// The last value passed to [`LogStreamRegistry::set_verbose_logging`].
    pub fn is_verbose_logging(&self) -> bool {
        self.verbose.load(Ordering::Acquire)
    }
}

impl Drop for LogStreamRegistry {
    fn drop(&mut self) {
        self.library.unsubscribe(self.subscription);
        let streams = self.streams.get_mut().unwrap_or_else(PoisonError::into_inner);
        if streams.is_empty() {
            return;
        }
        let leftover: Vec<LogStream> = streams.drain(..).map(|(_, s)| s).collect();
        let result = self.library.with_api(|api| {
            for stream in &leftover {
                Self::detach_native(api, stream);
            }
        });
        if result.is_err() {
            for stream in &leftover {
                stream.set_attached(false);
            }
        }
    }
}

impl fmt::Debug for LogStreamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStreamRegistry")
            .field("attached", &self.len())
            .field("verbose", &self.is_verbose_logging())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExportFormatDescription;
    use crate::library::LibraryConfig;
    use crate::status::AiReturn;
    use crate::types::{AiExportDataBlob, AiScene};
    use std::ffi::CString;
    use std::ptr;

    #[derive(Default)]
    struct Recorder {
        attached: Mutex<Vec<usize>>,
        verbose: AtomicBool,
    }

    impl Recorder {
        #[allow(unsafe_code)]
        fn emit(&self, message: &str) {
            let text = CString::new(message).unwrap();
            for &addr in self.attached.lock().unwrap().iter() {
                // SAFETY: addresses were recorded from live attached blocks.
                let stream = unsafe { *(addr as *const AiLogStream) };
                (stream.callback.unwrap())(text.as_ptr(), stream.user);
            }
        }
    }

    #[allow(unsafe_code)]
    impl NativeApi for Recorder {
        fn import_file(&self, _path: &CStr, _flags: u32) -> *const AiScene {
            ptr::null()
        }
        fn import_memory(&self, _data: &[u8], _flags: u32, _hint: &CStr) -> *const AiScene {
            ptr::null()
        }
        unsafe fn release_import(&self, _scene: *const AiScene) {}
        unsafe fn export_scene(
            &self,
            _scene: *const AiScene,
            _format_id: &CStr,
            _path: &CStr,
            _flags: u32,
        ) -> AiReturn {
            AiReturn::Failure
        }
        unsafe fn export_scene_to_blob(
            &self,
            _scene: *const AiScene,
            _format_id: &CStr,
            _flags: u32,
        ) -> *const AiExportDataBlob {
            ptr::null()
        }
        unsafe fn release_export_blob(&self, _blob: *const AiExportDataBlob) {}
        unsafe fn attach_log_stream(&self, stream: *const AiLogStream) {
            self.attached.lock().unwrap().push(stream as usize);
        }
        unsafe fn detach_log_stream(&self, stream: *const AiLogStream) -> AiReturn {
            let mut attached = self.attached.lock().unwrap();
            match attached.iter().position(|&a| a == stream as usize) {
                Some(i) => {
                    attached.remove(i);
                    AiReturn::Success
                }
                None => AiReturn::Failure,
            }
        }
        fn enable_verbose_logging(&self, enabled: bool) {
            self.verbose.store(enabled, Ordering::SeqCst);
        }
        fn error_string(&self) -> String {
            String::new()
        }
        fn export_formats(&self) -> Vec<ExportFormatDescription> {
            Vec::new()
        }
        fn import_extensions(&self) -> String {
            String::new()
        }
    }

    fn loaded() -> (Arc<NativeLibrary>, Arc<Recorder>, Arc<LogStreamRegistry>) {
        let library = Arc::new(NativeLibrary::new(LibraryConfig::new()));
        let recorder = Arc::new(Recorder::default());
        let _ = library.load_with(recorder.clone()).unwrap();
        let registry = LogStreamRegistry::new(Arc::clone(&library));
        (library, recorder, registry)
    }

    fn collecting(sink: &Arc<Mutex<Vec<String>>>, user: &str) -> LogStream {
        let sink = Arc::clone(sink);
        LogStream::with_user_data(
            move |msg, user| sink.lock().unwrap().push(format!("{user}|{msg}")),
            user,
        )
        .unwrap()
    }

    #[test]
    fn native_messages_reach_attached_streams() {
        let (_library, recorder, registry) = loaded();
        let sink = Arc::new(Mutex::new(Vec::new()));
        let stream = collecting(&sink, "a");
        registry.attach(&stream).unwrap();
        recorder.emit("Info,  T0: hello");
        assert_eq!(*sink.lock().unwrap(), ["a|Info,  T0: hello"]);

        registry.detach(&stream).unwrap();
        recorder.emit("dropped");
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn attaching_twice_keeps_one_entry() {
        let (_library, recorder, registry) = loaded();
        let stream = LogStream::new(|_, _| {}).unwrap();
        registry.attach(&stream).unwrap();
        registry.attach(&stream.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(recorder.attached.lock().unwrap().len(), 1);
    }

    #[test]
    fn freeing_the_library_detaches_everything() {
        let (library, recorder, registry) = loaded();
        let streams: Vec<LogStream> = (0..3)
            .map(|_| LogStream::new(|_, _| {}).unwrap())
            .collect();
        for s in &streams {
            registry.attach(s).unwrap();
        }
        assert_eq!(registry.len(), 3);

        library.free_library();
        assert!(registry.is_empty());
        assert!(streams.iter().all(|s| !s.is_attached()));
        assert!(recorder.attached.lock().unwrap().is_empty());
        assert!(matches!(
            registry.attach(&streams[0]),
            Err(InteropError::LibraryNotLoaded)
        ));
    }

    #[test]
    fn local_log_requires_attachment() {
        let (_library, _recorder, registry) = loaded();
        let sink = Arc::new(Mutex::new(Vec::new()));
        let stream = collecting(&sink, "");
        stream.log("before");
        registry.attach(&stream).unwrap();
        stream.log("");
        stream.log("after");
        assert_eq!(*sink.lock().unwrap(), ["|after"]);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let (_library, recorder, registry) = loaded();
        let stream = LogStream::new(|_, _| panic!("boom")).unwrap();
        registry.attach(&stream).unwrap();
        recorder.emit("Error, T0: bad");
        assert!(stream.is_attached());
    }

    #[test]
    fn verbose_toggle_reaches_the_library() {
        let (_library, recorder, registry) = loaded();
        registry.set_verbose_logging(true).unwrap();
        assert!(registry.is_verbose_logging());
        assert!(recorder.verbose.load(Ordering::SeqCst));
    }

    #[test]
    fn dropping_the_registry_unsubscribes() {
        let (library, _recorder, registry) = loaded();
        assert_eq!(library.listener_count(), 1);
        let stream = LogStream::new(|_, _| {}).unwrap();
        registry.attach(&stream).unwrap();
        drop(registry);
        assert_eq!(library.listener_count(), 0);
        assert!(!stream.is_attached());
    }

    #[test]
    fn message_levels_follow_prefix() {
        assert_eq!(message_level("Error, T0: x"), log::Level::Error);
        assert_eq!(message_level("Warn,  T0: x"), log::Level::Warn);
        assert_eq!(message_level("Debug, T0: x"), log::Level::Debug);
        assert_eq!(message_level("Info,  T0: x"), log::Level::Info);
        assert_eq!(message_level("plain"), log::Level::Info);
    }
}
