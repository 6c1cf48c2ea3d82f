// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend configuration.

/// Settings for a [crate::Backend].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    allowed_gpu_memory: u64,
    transfer_on_worker: bool,
    worker_thread_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            allowed_gpu_memory: 0,
            transfer_on_worker: !cfg!(target_arch = "wasm32"),
            worker_thread_name: "texture_transfer".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::new()
    }

    /// Texture memory budget in bytes.  0 derives the budget from the device.
    pub fn allowed_gpu_memory(&self) -> u64 {
        self.allowed_gpu_memory
    }

    /// Whether transferrable textures upload on a worker thread.
    pub fn transfer_on_worker(&self) -> bool {
        self.transfer_on_worker
    }

    pub fn worker_thread_name(&self) -> &str {
        &self.worker_thread_name
    }
}

/// Builder for [BackendConfig].
#[derive(Debug, Clone, Default)]
pub struct BackendConfigBuilder {
    config: BackendConfig,
}

impl BackendConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit texture memory budget in bytes.
    pub fn allowed_gpu_memory(mut self, bytes: u64) -> Self {
        self.config.allowed_gpu_memory = bytes;
        self
    }

    /// Upload transferrable textures on a worker thread.
    ///
    /// Ignored on wasm32, where textures always upload on the caller.
    pub fn transfer_on_worker(mut self, enabled: bool) -> Self {
        self.config.transfer_on_worker = enabled && !cfg!(target_arch = "wasm32");
        self
    }

    pub fn worker_thread_name(mut self, name: &str) -> Self {
        self.config.worker_thread_name = name.to_string();
        self
    }

    pub fn build(self) -> BackendConfig {
        self.config
    }
}
