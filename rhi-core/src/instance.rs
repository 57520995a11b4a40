//! Instance and Adapter (spec §4.9): the instance enumerates adapters,
//! filtered by backend; an adapter exposes its static info/limits/features
//! and opens a [`Device`] once the caller's required features are a subset
//! of what it supports.
//!
//! Grounded on `wgpu-hal`'s `Instance::enumerate_adapters` /
//! `Adapter::open` split: listing adapters and opening one are separate
//! steps, and opening is the only place a concrete backend's device/queue
//! get constructed. Concrete adapter discovery (walking `VkPhysicalDevice`s,
//! DXGI adapters, etc.) is the Vulkan/Metal/DX12 layer's job and out of
//! scope here (spec §1); adapters are registered with the instance by
//! whatever sits above this crate and already knows how to discover them.

use std::sync::Arc;

use parking_lot::Mutex;
use rhi_hal::{AdapterOpen, Backend};
use rhi_types::{AdapterInfo, Backends, DeviceDescriptor, Features, Limits};

use crate::device::Device;
use crate::error::CoreError;

/// One physical adapter, filtered and opened through an [`Instance`].
pub struct Adapter<B: Backend> {
    backend: Backends,
    handle: Arc<dyn AdapterOpen<B>>,
}

impl<B: Backend> Clone for Adapter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            handle: self.handle.clone(),
        }
    }
}

impl<B: Backend> Adapter<B> {
    pub fn new(backend: Backends, handle: Arc<dyn AdapterOpen<B>>) -> Self {
        Self { backend, handle }
    }

    pub fn backend(&self) -> Backends {
        self.backend
    }

    pub fn info(&self) -> AdapterInfo {
        self.handle.info()
    }

    pub fn limits(&self) -> Limits {
        self.handle.limits()
    }

    pub fn supported_features(&self) -> Features {
        self.handle.supported_features()
    }

    /// Spec §4.9: `CreateDevice(desc)` — rejects any `required_features`
    /// bit this adapter doesn't report in `supported_features`, otherwise
    /// opens the backend's hal device/queue and wraps them in a [`Device`].
    pub fn request_device(&self, desc: &DeviceDescriptor) -> Result<Arc<Device<B>>, CoreError> {
        let supported = self.supported_features();
        let missing = desc.required_features.difference(supported);
        if !missing.is_empty() {
            return Err(CoreError::UnsupportedFeatures { missing });
        }
        let (raw_device, raw_queue) = self.handle.open_device(desc.required_features)?;
        Ok(Device::new(raw_device, raw_queue, desc.required_features, self.limits()))
    }
}

/// Spec §4.9: "the Instance enumerates adapters". Holds whatever adapters
/// were registered against it, filterable by backend (spec §9/original_source
/// supplement: `InstanceBase::EnumerateAdapters` takes a backend bitmask).
pub struct Instance<B: Backend> {
    adapters: Mutex<Vec<Adapter<B>>>,
}

impl<B: Backend> Default for Instance<B> {
    fn default() -> Self {
        Self {
            adapters: Mutex::new(Vec::new()),
        }
    }
}

impl<B: Backend> Instance<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter discovered by whatever sits above this crate.
    pub fn register_adapter(&self, adapter: Adapter<B>) {
        self.adapters.lock().push(adapter);
    }

    /// Spec §4.9 supplement: only adapters whose backend bit intersects
    /// `backends` are returned.
    pub fn enumerate_adapters(&self, backends: Backends) -> Vec<Adapter<B>> {
        self.adapters
            .lock()
            .iter()
            .filter(|adapter| backends.intersects(adapter.backend))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_hal::null::{NullAdapter, NullBackend};

    #[test]
    fn enumerate_adapters_filters_by_backend() {
        let instance = Instance::<NullBackend>::new();
        instance.register_adapter(Adapter::new(Backends::VULKAN, Arc::new(NullAdapter)));
        instance.register_adapter(Adapter::new(Backends::METAL, Arc::new(NullAdapter)));

        assert_eq!(instance.enumerate_adapters(Backends::VULKAN).len(), 1);
        assert_eq!(instance.enumerate_adapters(Backends::GL).len(), 0);
        assert_eq!(
            instance.enumerate_adapters(Backends::VULKAN | Backends::METAL).len(),
            2
        );
    }

    #[test]
    fn request_device_rejects_unsupported_features() {
        let instance = Instance::<NullBackend>::new();
        instance.register_adapter(Adapter::new(Backends::VULKAN, Arc::new(NullAdapter)));
        let adapter = &instance.enumerate_adapters(Backends::VULKAN)[0];

        let desc = DeviceDescriptor {
            label: None,
            required_features: Features::GEOMETRY_SHADER,
        };
        let result = adapter.request_device(&desc);
        assert!(matches!(result, Err(CoreError::UnsupportedFeatures { .. })));
    }

    #[test]
    fn request_device_succeeds_with_no_required_features() {
        let instance = Instance::<NullBackend>::new();
        instance.register_adapter(Adapter::new(Backends::VULKAN, Arc::new(NullAdapter)));
        let adapter = &instance.enumerate_adapters(Backends::VULKAN)[0];

        let desc = DeviceDescriptor {
            label: None,
            required_features: Features::empty(),
        };
        assert!(adapter.request_device(&desc).is_ok());
    }
}
