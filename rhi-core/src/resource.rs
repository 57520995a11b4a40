//! Resource value types (spec §3) and the intrusive-list-like tracked
//! lifetime scheme from spec §4.8/§9.
//!
//! Strong handles are ordinary `Arc<T>`; a resource holds a strong `Arc` to
//! its owning [`crate::device::Device`] (spec §9: "resource holds a strong
//! reference to Device"), while the device's per-kind [`TrackedList`] holds
//! only `Weak` references (spec §9: "Device holds *weak* list membership").
//! That asymmetry is what lets `Device::destroy` sweep and tear down GPU
//! objects deterministically without creating a reference cycle, even
//! though a user-held `Arc<Buffer>` may outlive the sweep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rhi_hal::Backend;
use rhi_types::{
    BufferUsage, SamplerDescriptor, SubresourceRange, TextureDimension, TextureFormat,
    TextureUsage, TextureViewDimension,
};

use crate::device::Device;
use crate::serial::Serial;

/// The closed set of resource kinds from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    TextureView,
    Sampler,
    BindSetLayout,
    BindSet,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
    ShaderModule,
}

/// Per-kind tracked list of live resources (spec §4.8): `track` prepends,
/// `untrack` removes idempotently, `sweep` tears every live entry down in
/// one pass (used by `Device::destroy`).
#[derive(Debug)]
pub struct TrackedList<T> {
    entries: Mutex<Vec<Weak<T>>>,
}

impl<T> Default for TrackedList<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> TrackedList<T> {
    pub fn track(&self, resource: &Arc<T>) {
        self.entries.lock().insert(0, Arc::downgrade(resource));
    }

    /// Returns whether `resource` was found (and removed) in the list.
    /// Idempotent: calling this twice for the same resource returns `false`
    /// the second time. Takes a plain reference (rather than an `Arc`) so it
    /// can be called from the resource's own `Drop` impl, where only `&self`
    /// is available; an `Arc`'s data address is the same as `&T`'s.
    pub fn untrack(&self, resource: &T) -> bool {
        let target: *const T = resource;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|w| w.as_ptr() != target);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every still-live entry exactly once, then empty the list.
    /// Entries already dropped by their last strong owner are skipped (the
    /// `Drop` impl on the concrete type is what destroys those).
    pub fn sweep(&self, mut destroy: impl FnMut(&Arc<T>)) {
        let drained = std::mem::take(&mut *self.entries.lock());
        for weak in drained {
            if let Some(strong) = weak.upgrade() {
                destroy(&strong);
            }
        }
    }
}

/// `Unmapped | PendingMap | Mapped | MappedAtCreation | Destroyed` from
/// spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMapState {
    Unmapped,
    PendingMap { mode: rhi_types::MapMode },
    Mapped { mode: rhi_types::MapMode },
    MappedAtCreation,
    Destroyed,
}

#[derive(Debug)]
pub struct Buffer<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub size: u64,
    pub usage: BufferUsage,
    pub(crate) raw: Mutex<Option<B::Buffer>>,
    pub(crate) map_state: Mutex<BufferMapState>,
    /// Highest submit serial a command list naming this buffer has been
    /// filed under (spec §4.5's "last-usage serial").
    pub(crate) last_usage_serial: AtomicU64,
}

impl<B: Backend> Buffer<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    /// Storage usage implicitly grants a read-only-storage aspect (spec §3).
    pub fn effective_usage(&self) -> BufferUsage {
        if self.usage.contains(BufferUsage::STORAGE) {
            self.usage | BufferUsage::READ_ONLY_STORAGE
        } else {
            self.usage
        }
    }

    /// Contract check: `usage` must be a subset of what the buffer
    /// declared at creation (spec §3 Buffer invariant).
    pub fn require_usage(&self, usage: BufferUsage) -> Result<(), crate::error::ContractViolation> {
        let have = self.effective_usage();
        if have.contains(usage) {
            Ok(())
        } else {
            Err(crate::error::ContractViolation::MissingBufferUsage {
                required: usage,
                actual: have,
            })
        }
    }

    pub fn map_state(&self) -> BufferMapState {
        *self.map_state.lock()
    }

    pub fn last_usage_serial(&self) -> Serial {
        self.last_usage_serial.load(Ordering::Acquire)
    }

    pub(crate) fn record_usage_at(&self, serial: Serial) {
        self.last_usage_serial.fetch_max(serial, Ordering::AcqRel);
    }

    /// Tear down the backend-owned object exactly once; idempotent.
    pub(crate) fn destroy_impl(&self) {
        let mut raw = self.raw.lock();
        if raw.is_some() {
            log::debug!("destroying buffer `{}`", self.label);
            *raw = None;
            *self.map_state.lock() = BufferMapState::Destroyed;
        }
    }
}

impl<B: Backend> Drop for Buffer<B> {
    fn drop(&mut self) {
        self.device.untrack_buffer(self);
    }
}

#[derive(Debug)]
pub struct Texture<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
    pub(crate) raw: Mutex<Option<B::Texture>>,
    pub(crate) views: Mutex<Vec<Weak<TextureView<B>>>>,
    pub(crate) last_usage_serial: AtomicU64,
}

impl<B: Backend> Texture<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    pub fn aspects(&self) -> rhi_types::AspectSet {
        self.format.aspects()
    }

    pub fn layer_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::D3 => 1,
            _ => self.depth_or_array_layers,
        }
    }

    pub fn effective_usage(&self) -> TextureUsage {
        if self.usage.contains(TextureUsage::STORAGE) {
            self.usage | TextureUsage::READ_ONLY_STORAGE
        } else {
            self.usage
        }
    }

    pub fn require_usage(&self, usage: TextureUsage) -> Result<(), crate::error::ContractViolation> {
        let have = self.effective_usage();
        if have.contains(usage) {
            Ok(())
        } else {
            Err(crate::error::ContractViolation::MissingTextureUsage {
                required: usage,
                actual: have,
            })
        }
    }

    pub fn last_usage_serial(&self) -> Serial {
        self.last_usage_serial.load(Ordering::Acquire)
    }

    pub(crate) fn record_usage_at(&self, serial: Serial) {
        self.last_usage_serial.fetch_max(serial, Ordering::AcqRel);
    }

    pub(crate) fn destroy_impl(&self) {
        let mut raw = self.raw.lock();
        if raw.is_some() {
            log::debug!("destroying texture `{}`", self.label);
            *raw = None;
        }
    }
}

impl<B: Backend> Drop for Texture<B> {
    fn drop(&mut self) {
        self.device.untrack_texture(self);
    }
}

#[derive(Debug)]
pub struct TextureView<B: Backend> {
    pub parent: Arc<Texture<B>>,
    pub label: String,
    pub dimension: TextureViewDimension,
    pub format: TextureFormat,
    pub range: SubresourceRange,
    pub usage: TextureUsage,
    pub(crate) raw: Mutex<Option<B::TextureView>>,
}

impl<B: Backend> TextureView<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::TextureView
    }
}

impl<B: Backend> Drop for TextureView<B> {
    fn drop(&mut self) {
        let mut raw = self.raw.lock();
        *raw = None;
    }
}

#[derive(Debug)]
pub struct Sampler<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub(crate) raw: Mutex<Option<B::Sampler>>,
}

impl<B: Backend> Sampler<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::Sampler
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for Sampler<B> {
    fn drop(&mut self) {
        self.device.untrack_sampler(self);
    }
}

pub(crate) fn default_sampler_label(desc: &SamplerDescriptor) -> String {
    desc.label
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_default()
}
