//! Adapter/device acquisition and device-scoped helpers.

use std::fmt;

use crate::error::SurgeError;
use crate::options::EngineOptions;

/// Errors that can occur during GPU context initialization or polling.
#[derive(Debug)]
pub enum ContextError {
    /// No compatible GPU adapter found.
    AdapterRequest(wgpu::RequestAdapterError),
    /// An explicitly pinned adapter index does not exist on this host.
    AdapterIndex {
        /// The requested index.
        index: usize,
        /// Number of adapters enumerated.
        available: usize,
    },
    /// GPU device request failed (limits or features not met).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Device poll failed while waiting on submitted work.
    Poll(String),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterRequest(e) => {
                write!(f, "no compatible GPU adapter found: {e}")
            }
            Self::AdapterIndex { index, available } => {
                write!(
                    f,
                    "adapter index {index} out of range \
                     ({available} adapters present)"
                )
            }
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            Self::Poll(msg) => write!(f, "device poll failed: {msg}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
            Self::AdapterIndex { .. } | Self::Poll(_) => None,
        }
    }
}

/// Push-constant budget requested from the device, in bytes. Kept at the
/// floor every Vulkan implementation guarantees so kernels stay portable.
pub const MAX_PUSH_CONSTANT_BYTES: u32 = 128;

/// Owns the core wgpu resources: device, queue, and adapter metadata.
///
/// One context backs one [`Manager`](crate::manager::Manager); sequences
/// share it through an `Arc` so submissions can outlive manager method
/// borrows.
pub struct ComputeContext {
    /// The wgpu logical device.
    pub device: wgpu::Device,
    /// The wgpu submission queue.
    pub queue: wgpu::Queue,
    adapter_info: Option<wgpu::AdapterInfo>,
    queue_count: u32,
}

impl ComputeContext {
    /// Create a context from engine options: enumerate or request an
    /// adapter, then request a device with push constants enabled when the
    /// adapter offers them.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if adapter selection or the device request
    /// fails.
    pub async fn new(options: &EngineOptions) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::default();

        let adapter = match options.device.adapter_index {
            Some(index) => {
                let mut adapters =
                    instance.enumerate_adapters(wgpu::Backends::all());
                let available = adapters.len();
                if index >= available {
                    return Err(ContextError::AdapterIndex {
                        index,
                        available,
                    });
                }
                adapters.swap_remove(index)
            }
            None => {
                let request = wgpu::RequestAdapterOptions {
                    power_preference: options
                        .device
                        .power_preference
                        .to_wgpu(),
                    force_fallback_adapter: false,
                    compatible_surface: None,
                };
                match instance.request_adapter(&request).await {
                    Ok(adapter) => adapter,
                    Err(e) if options.device.allow_fallback => {
                        log::warn!(
                            "hardware adapter request failed ({e}); \
                             retrying with fallback adapter"
                        );
                        instance
                            .request_adapter(&wgpu::RequestAdapterOptions {
                                force_fallback_adapter: true,
                                ..request
                            })
                            .await
                            .map_err(ContextError::AdapterRequest)?
                    }
                    Err(e) => return Err(ContextError::AdapterRequest(e)),
                }
            }
        };

        let info = adapter.get_info();
        log::info!(
            "using adapter '{}' ({:?} / {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let mut required_features = wgpu::Features::empty();
        let mut push_limit = 0;
        if adapter.features().contains(wgpu::Features::PUSH_CONSTANTS) {
            required_features |= wgpu::Features::PUSH_CONSTANTS;
            push_limit = adapter
                .limits()
                .max_push_constant_size
                .min(MAX_PUSH_CONSTANT_BYTES);
        } else {
            log::warn!(
                "adapter lacks push constants; kernels declaring a push \
                 block will fail to build"
            );
        }
        let required_limits = wgpu::Limits {
            max_push_constant_size: push_limit,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Compute Device"),
                required_features,
                required_limits,
                ..Default::default()
            })
            .await
            .map_err(ContextError::DeviceRequest)?;

        Ok(Self {
            device,
            queue,
            adapter_info: Some(info),
            queue_count: options.execution.queue_count.max(1),
        })
    }

    /// Create a context from an externally-owned device and queue, for
    /// embedding the engine into an application that already runs wgpu.
    /// Adapter metadata is unavailable on this path.
    #[must_use]
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        queue_count: u32,
    ) -> Self {
        Self {
            device,
            queue,
            adapter_info: None,
            queue_count: queue_count.max(1),
        }
    }

    /// Enumerate every adapter visible to the backend, in the order
    /// `adapter_index` pins against.
    #[must_use]
    pub fn list_adapters() -> Vec<wgpu::AdapterInfo> {
        let instance = wgpu::Instance::default();
        instance
            .enumerate_adapters(wgpu::Backends::all())
            .iter()
            .map(wgpu::Adapter::get_info)
            .collect()
    }

    /// Metadata of the adapter backing this context, if it was created
    /// through adapter selection rather than [`from_device`](Self::from_device).
    #[must_use]
    pub fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.adapter_info.as_ref()
    }

    /// Number of logical submission queues sequences may bind to.
    #[must_use]
    pub const fn queue_count(&self) -> u32 {
        self.queue_count
    }

    /// Effective device limits.
    #[must_use]
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Push-constant byte budget the device was created with (0 when the
    /// feature is unavailable).
    #[must_use]
    pub fn max_push_constant_size(&self) -> u32 {
        if self
            .device
            .features()
            .contains(wgpu::Features::PUSH_CONSTANTS)
        {
            self.device.limits().max_push_constant_size
        } else {
            0
        }
    }

    /// Create a buffer inside an out-of-memory error scope.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] if the device reports exhaustion.
    pub fn create_buffer_checked(
        &self,
        desc: &wgpu::BufferDescriptor<'_>,
    ) -> Result<wgpu::Buffer, SurgeError> {
        self.device
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(desc);
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SurgeError::Allocation(e.to_string()));
        }
        Ok(buffer)
    }

    /// Create a texture inside an out-of-memory error scope.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Allocation`] if the device reports exhaustion.
    pub fn create_texture_checked(
        &self,
        desc: &wgpu::TextureDescriptor<'_>,
    ) -> Result<wgpu::Texture, SurgeError> {
        self.device
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(desc);
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SurgeError::Allocation(e.to_string()));
        }
        Ok(texture)
    }

    /// Run `f` inside a validation error scope, surfacing any validation
    /// failure it raises as a compile error.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::Compile`] if the device reports a validation
    /// error from work done inside `f`.
    pub fn validation_scope<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, SurgeError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SurgeError::Compile(e.to_string()));
        }
        Ok(value)
    }

    /// Create a new command encoder for recording GPU commands.
    #[must_use]
    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(label),
            })
    }

    /// Submit one finished command buffer, returning its submission index.
    pub fn submit(
        &self,
        command: wgpu::CommandBuffer,
    ) -> wgpu::SubmissionIndex {
        self.queue.submit(std::iter::once(command))
    }

    /// Drive the device forward without blocking.
    pub fn poll_once(&self) {
        let _ = self.device.poll(wgpu::PollType::Poll);
    }

    /// Block until the given submission has completed on the device.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Poll`] if the device wait fails.
    pub fn wait_for(
        &self,
        index: wgpu::SubmissionIndex,
    ) -> Result<(), ContextError> {
        self.device
            .poll(wgpu::PollType::WaitForSubmissionIndex(index))
            .map(|_| ())
            .map_err(|e| ContextError::Poll(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_listing_does_not_panic() {
        let adapters = ComputeContext::list_adapters();
        for info in &adapters {
            log::debug!("adapter: {} ({:?})", info.name, info.backend);
        }
    }

    #[test]
    fn test_pinned_index_out_of_range_is_reported() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut options = EngineOptions::default();
        options.device.adapter_index = Some(usize::MAX);
        match pollster::block_on(ComputeContext::new(&options)) {
            Err(ContextError::AdapterIndex { index, .. }) => {
                assert_eq!(index, usize::MAX);
            }
            Err(e) => panic!("unexpected error kind: {e}"),
            Ok(_) => panic!("index usize::MAX should never resolve"),
        }
    }
}
