use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use lookout_core::detection::infrastructure::model_resolver::{self, ModelLocations, ProgressFn};
use lookout_core::detection::infrastructure::onnx_yolo_detector::{load_session, SharedSession};
use lookout_core::shared::settings::Device;

type Resolver = dyn Fn(ProgressFn) -> Result<PathBuf, String> + Send + Sync;

/// Resolves the detector weights in the background and keeps one loaded
/// session per device for the life of the process.
///
/// A found path is kept forever. A failed resolution is reported to the
/// caller that sees it and then forgotten, so the next run looks again.
pub struct ModelCache {
    path: Arc<PathSlot>,
    sessions: Mutex<HashMap<Device, SharedSession>>,
}

enum PathState {
    Idle,
    Resolving,
    Ready(PathBuf),
    Failed(String),
}

struct PathSlot {
    state: Mutex<PathState>,
    ready: Condvar,
    progress: Mutex<(u64, u64)>,
    resolver: Box<Resolver>,
}

impl PathSlot {
    /// Runs the resolver on its own thread. The caller has already moved
    /// the state to `Resolving`.
    fn spawn_resolve(self: &Arc<Self>) {
        let slot = self.clone();
        thread::spawn(move || {
            let progress_slot = slot.clone();
            let result = (slot.resolver)(Box::new(move |downloaded, total| {
                *progress_slot
                    .progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = (downloaded, total);
            }));
            let next = match result {
                Ok(path) => PathState::Ready(path),
                Err(e) => {
                    log::warn!("Model not available: {e}");
                    PathState::Failed(e)
                }
            };
            *slot.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
            slot.ready.notify_all();
        });
    }
}

impl ModelCache {
    /// Starts resolving the weights from the standard locations in the
    /// background.
    pub fn new() -> Arc<Self> {
        Self::with_resolver(|progress| {
            model_resolver::resolve(&ModelLocations::from_env(None, None), Some(progress))
                .map_err(|e| e.to_string())
        })
    }

    fn with_resolver(
        resolver: impl Fn(ProgressFn) -> Result<PathBuf, String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        let slot = Arc::new(PathSlot {
            state: Mutex::new(PathState::Resolving),
            ready: Condvar::new(),
            progress: Mutex::new((0, 0)),
            resolver: Box::new(resolver),
        });
        slot.spawn_resolve();
        Arc::new(Self {
            path: slot,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Waits for the weights path, forwarding download progress. Gives up
    /// when `cancelled` returns true. After a failure the next call starts
    /// a fresh resolution.
    pub fn wait_for_model(
        &self,
        on_progress: &dyn Fn(u64, u64),
        cancelled: &dyn Fn() -> bool,
    ) -> Result<PathBuf, String> {
        let slot = &self.path;
        let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if cancelled() {
                return Err("Cancelled".into());
            }
            match &*state {
                PathState::Ready(path) => return Ok(path.clone()),
                PathState::Failed(e) => {
                    let e = e.clone();
                    *state = PathState::Idle;
                    return Err(e);
                }
                PathState::Idle => {
                    *slot.progress.lock().unwrap_or_else(PoisonError::into_inner) = (0, 0);
                    *state = PathState::Resolving;
                    slot.spawn_resolve();
                }
                PathState::Resolving => {}
            }
            if let Ok(progress) = slot.progress.try_lock() {
                let (downloaded, total) = *progress;
                if downloaded > 0 {
                    on_progress(downloaded, total);
                }
            }
            state = slot
                .ready
                .wait_timeout(state, Duration::from_millis(100))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// The session for `device`, loading it on first use.
    pub fn session(
        &self,
        device: Device,
        on_progress: &dyn Fn(u64, u64),
        cancelled: &dyn Fn() -> bool,
    ) -> Result<SharedSession, String> {
        if let Some(session) = self.cached_session(device) {
            return Ok(session);
        }
        let path = self.wait_for_model(on_progress, cancelled)?;
        let session = load_session(&path, device).map_err(|e| e.to_string())?;
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .entry(device)
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone())
    }

    /// Loads the session for `device` in the background so the next run
    /// starts without waiting.
    pub fn preload(self: &Arc<Self>, device: Device) {
        if self.cached_session(device).is_some() {
            return;
        }
        let cache = self.clone();
        thread::spawn(move || {
            if let Err(e) = cache.session(device, &|_, _| {}, &|| false) {
                log::warn!("Could not load model on {device}: {e}");
            }
        });
    }

    fn cached_session(&self, device: Device) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device)
            .cloned()
    }
}
