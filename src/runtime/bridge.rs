//! RuntimeBridge - invoke-by-name boundary to the embedded runtime
//!
//! The bridge hides everything about how the application runtime is loaded
//! behind two guarantees: initialization happens lazily, exactly once, no
//! matter how many threads race to the first call; and entry points are
//! reached only by namespaced name, with arguments marshalled as plain
//! values.

use crate::runtime::error::{RuntimeError, RuntimeResult};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A named entry point exposed by the runtime
pub type RuntimeFn = Box<dyn Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// Host-supplied loader that boots the runtime and yields its entry points.
///
/// Runs at most once for the lifetime of the bridge.
pub type RuntimeLoader = Box<dyn FnOnce() -> RuntimeResult<Vec<(String, RuntimeFn)>> + Send>;

struct RuntimeCore {
    functions: HashMap<String, RuntimeFn>,
}

/// Lazily-initialized bridge into one deployment's runtime.
///
/// # Thread Safety
///
/// `invoke` may be called from any number of threads. The first caller runs
/// the loader; concurrent callers block until that single initialization
/// completes, then all dispatch against the same function table.
pub struct RuntimeBridge {
    deployment: String,
    loader: Mutex<Option<RuntimeLoader>>,
    core: OnceCell<RuntimeCore>,
}

impl RuntimeBridge {
    pub fn new(deployment: impl Into<String>, loader: RuntimeLoader) -> Self {
        Self {
            deployment: deployment.into(),
            loader: Mutex::new(Some(loader)),
            core: OnceCell::new(),
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Kick initialization off in the background so the first `invoke`
    /// does not pay for it. Failures are logged and surface again on the
    /// next `invoke`.
    pub fn preload(self: &Arc<Self>) {
        let bridge = Arc::clone(self);
        std::thread::spawn(move || {
            if let Err(e) = bridge.ensure_initialized() {
                log::warn!(
                    "Background runtime preload for {} failed: {}",
                    bridge.deployment,
                    e
                );
            }
        });
    }

    /// Whether the runtime has been booted yet
    pub fn is_initialized(&self) -> bool {
        self.core.get().is_some()
    }

    /// Initialize if needed and verify an entry point exists
    pub fn ensure_function(&self, function: &str) -> RuntimeResult<()> {
        let core = self.ensure_initialized()?;
        if core.functions.contains_key(function) {
            Ok(())
        } else {
            Err(RuntimeError::FunctionNotFound {
                function: function.to_string(),
            })
        }
    }

    /// Invoke a namespaced runtime function with marshalled arguments.
    ///
    /// Initializes the runtime on first use.
    pub fn invoke(&self, function: &str, args: &[Value]) -> RuntimeResult<Value> {
        let core = self.ensure_initialized()?;
        let entry = core
            .functions
            .get(function)
            .ok_or_else(|| RuntimeError::FunctionNotFound {
                function: function.to_string(),
            })?;
        entry(args)
    }

    fn ensure_initialized(&self) -> RuntimeResult<&RuntimeCore> {
        self.core.get_or_try_init(|| {
            let loader = self
                .loader
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| RuntimeError::InitializationFailed {
                    message: "runtime loader already consumed by a failed initialization"
                        .to_string(),
                })?;

            log::debug!("Booting runtime for deployment {}", self.deployment);
            let entries = loader()?;
            let mut functions = HashMap::new();
            for (name, function) in entries {
                functions.insert(name, function);
            }
            log::info!(
                "Runtime for {} initialized with {} entry points",
                self.deployment,
                functions.len()
            );
            Ok(RuntimeCore { functions })
        })
    }
}
