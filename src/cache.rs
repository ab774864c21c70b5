//! Process-wide model cache.
//!
//! Multi-gigabyte inference models take seconds to minutes to load, so
//! handles are loaded at most once per process and shared across jobs. The
//! cache is an explicit object owned by the composition root; slots are
//! mutated only on the load path and otherwise read-only.

use crate::config::{ComputeType, Device};
use crate::engines::diarize::Diarizer;
use crate::engines::stt::SpeechToText;
use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Loads the mandatory speech-to-text capability.
pub trait SttLoader: Send + Sync {
    fn load(&self, device: Device, compute_type: ComputeType) -> Result<Arc<dyn SpeechToText>>;
}

/// Loads the optional diarization capability.
pub trait DiarizerLoader: Send + Sync {
    fn load(&self, device: Device, compute_type: ComputeType) -> Result<Arc<dyn Diarizer>>;
}

enum Slot<T> {
    Empty,
    Loaded {
        handle: T,
        device: Device,
        compute_type: ComputeType,
    },
    /// Load failed in a way that will not recover within this process
    /// (missing credential, unreachable provider). Not an error state:
    /// the pipeline runs degraded.
    Unavailable { reason: String },
}

/// Process-wide, lazily-populated store of loaded inference capabilities.
///
/// Idempotent re-entry: if a handle is already present, `ensure_*` is a
/// no-op that ignores the requested device/precision — first load wins, so
/// callers must treat those as process-global configuration.
pub struct ModelCache {
    stt: Mutex<Slot<Arc<dyn SpeechToText>>>,
    diarizer: Mutex<Slot<Arc<dyn Diarizer>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            stt: Mutex::new(Slot::Empty),
            diarizer: Mutex::new(Slot::Empty),
        }
    }

    /// Load the speech-to-text capability if absent and return the handle.
    ///
    /// # Errors
    /// A load failure is fatal for the job: no pipeline run can proceed
    /// without this capability. The slot stays empty so a later job retries.
    pub fn ensure_stt(
        &self,
        loader: &dyn SttLoader,
        device: Device,
        compute_type: ComputeType,
    ) -> Result<Arc<dyn SpeechToText>> {
        let mut slot = lock_slot(&self.stt);
        if let Slot::Loaded { handle, .. } = &*slot {
            return Ok(Arc::clone(handle));
        }

        log_resource_usage("speech_to_text", "before load");
        let handle = loader.load(device, compute_type)?;
        log_resource_usage("speech_to_text", "after load");
        info!(model = handle.model_name(), %device, %compute_type, "speech-to-text model loaded");

        *slot = Slot::Loaded {
            handle: Arc::clone(&handle),
            device,
            compute_type,
        };
        Ok(handle)
    }

    /// Load the diarization capability if absent.
    ///
    /// Returns `None` when the capability is unavailable. Unlike the
    /// speech-to-text slot, a load failure is recorded permanently: all
    /// subsequent jobs run in degraded (no-speaker) mode without retrying.
    pub fn ensure_diarizer(
        &self,
        loader: &dyn DiarizerLoader,
        device: Device,
        compute_type: ComputeType,
    ) -> Option<Arc<dyn Diarizer>> {
        let mut slot = lock_slot(&self.diarizer);
        match &*slot {
            Slot::Loaded { handle, .. } => return Some(Arc::clone(handle)),
            Slot::Unavailable { reason } => {
                debug!(reason, "diarization marked unavailable, skipping");
                return None;
            }
            Slot::Empty => {}
        }

        log_resource_usage("diarization", "before load");
        match loader.load(device, compute_type) {
            Ok(handle) => {
                log_resource_usage("diarization", "after load");
                info!(%device, %compute_type, "diarization pipeline loaded");
                *slot = Slot::Loaded {
                    handle: Arc::clone(&handle),
                    device,
                    compute_type,
                };
                Some(handle)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "diarization unavailable for the process lifetime");
                *slot = Slot::Unavailable { reason };
                None
            }
        }
    }

    /// Get the speech-to-text handle, or None if not loaded.
    pub fn stt(&self) -> Option<Arc<dyn SpeechToText>> {
        match &*lock_slot(&self.stt) {
            Slot::Loaded { handle, .. } => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Get the diarizer handle, or None if not loaded or unavailable.
    pub fn diarizer(&self) -> Option<Arc<dyn Diarizer>> {
        match &*lock_slot(&self.diarizer) {
            Slot::Loaded { handle, .. } => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Whether diarization has been marked permanently unavailable.
    pub fn diarizer_unavailable(&self) -> bool {
        matches!(&*lock_slot(&self.diarizer), Slot::Unavailable { .. })
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a slot, recovering from a poisoned mutex. Slots hold plain data,
/// so the contents stay consistent even if a holder panicked.
fn lock_slot<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Log process memory and disk availability around a model load.
/// Observability only — failures here never affect the load itself.
fn log_resource_usage(capability: &str, phase: &str) {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return;
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let rss_mb = system
        .process(pid)
        .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let disk_available_gb = disks
        .iter()
        .map(|d| d.available_space())
        .max()
        .unwrap_or(0) as f64
        / (1024.0 * 1024.0 * 1024.0);

    info!(
        capability,
        phase,
        rss_mb = format!("{rss_mb:.1}").as_str(),
        disk_available_gb = format!("{disk_available_gb:.1}").as_str(),
        "resource usage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::diarize::MockDiarizer;
    use crate::engines::stt::MockSpeechToText;
    use crate::error::EchoscriptError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSttLoader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSttLoader {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SttLoader for CountingSttLoader {
        fn load(
            &self,
            _device: Device,
            _compute_type: ComputeType,
        ) -> Result<Arc<dyn SpeechToText>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EchoscriptError::ModelLoad {
                    capability: "speech_to_text".to_string(),
                    message: "boom".to_string(),
                })
            } else {
                Ok(Arc::new(MockSpeechToText::new()))
            }
        }
    }

    struct CountingDiarizerLoader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingDiarizerLoader {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DiarizerLoader for CountingDiarizerLoader {
        fn load(&self, _device: Device, _compute_type: ComputeType) -> Result<Arc<dyn Diarizer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EchoscriptError::ModelLoad {
                    capability: "diarization".to_string(),
                    message: "HF token missing".to_string(),
                })
            } else {
                Ok(Arc::new(MockDiarizer::new()))
            }
        }
    }

    #[test]
    fn test_ensure_stt_is_idempotent() {
        let cache = ModelCache::new();
        let loader = CountingSttLoader::new(false);

        let first = cache
            .ensure_stt(&loader, Device::Cpu, ComputeType::Float16)
            .expect("first load");
        let second = cache
            .ensure_stt(&loader, Device::Cuda, ComputeType::Int8)
            .expect("second load");

        // Same handle both times, loader invoked only once; the second
        // call's device/precision is ignored (first load wins).
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls(), 1);
    }

    #[test]
    fn test_stt_load_failure_leaves_slot_empty() {
        let cache = ModelCache::new();
        let loader = CountingSttLoader::new(true);

        assert!(
            cache
                .ensure_stt(&loader, Device::Cpu, ComputeType::Float16)
                .is_err()
        );
        assert!(cache.stt().is_none());

        // A later job retries the mandatory capability
        assert!(
            cache
                .ensure_stt(&loader, Device::Cpu, ComputeType::Float16)
                .is_err()
        );
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn test_diarizer_failure_is_permanent() {
        let cache = ModelCache::new();
        let loader = CountingDiarizerLoader::new(true);

        assert!(
            cache
                .ensure_diarizer(&loader, Device::Cpu, ComputeType::Float16)
                .is_none()
        );
        assert!(cache.diarizer_unavailable());

        // No retry: the loader is never invoked again
        assert!(
            cache
                .ensure_diarizer(&loader, Device::Cpu, ComputeType::Float16)
                .is_none()
        );
        assert_eq!(loader.calls(), 1);
    }

    #[test]
    fn test_ensure_diarizer_is_idempotent() {
        let cache = ModelCache::new();
        let loader = CountingDiarizerLoader::new(false);

        let first = cache
            .ensure_diarizer(&loader, Device::Cpu, ComputeType::Float16)
            .expect("loaded");
        let second = cache
            .ensure_diarizer(&loader, Device::Cpu, ComputeType::Float16)
            .expect("loaded");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls(), 1);
    }

    #[test]
    fn test_getters_return_none_before_load() {
        let cache = ModelCache::new();
        assert!(cache.stt().is_none());
        assert!(cache.diarizer().is_none());
        assert!(!cache.diarizer_unavailable());
    }
}
