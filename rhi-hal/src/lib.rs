//! The backend contract (spec §6): a set of traits a concrete backend
//! (e.g. Vulkan) implements so that `rhi-core` can drive it without
//! knowing which GPU API is underneath.
//!
//! This crate intentionally contains no concrete backend — it is the
//! `trait`-only surface `wgpu-hal`'s `Api`/`Device`/`Queue` traits occupy,
//! trimmed to what spec §6 calls out. A [`null`] backend is provided behind
//! the `null` feature for in-process testing, the same role `wgpu-hal`'s
//! `noop` backend plays.

use std::fmt;

use rhi_types::{
    AdapterInfo, BindSetDescriptor, BindSetLayoutDescriptor, BufferDescriptor,
    ComputePipelineDescriptor, Limits, PipelineLayoutDescriptor, RenderPipelineDescriptor,
    SamplerDescriptor, ShaderModuleDescriptor, TextureDescriptor, TextureViewDescriptor,
};

#[cfg(feature = "null")]
pub mod null;

/// The GPU-timeline value a submission is stamped with.
///
/// Mirrors `wgpu-hal::FenceValue`: a monotonically increasing `u64` a
/// backend's fence/timeline-semaphore counts up to.
pub type FenceValue = u64;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("out of host or device memory")]
    OutOfMemory,
    #[error("device lost")]
    Lost,
    #[error("backend error: {0}")]
    Backend(String),
}

/// A family of associated raw-object types implemented together by one
/// concrete backend. Analogous to `wgpu-hal::Api`.
pub trait Backend: Sized + Send + Sync + 'static + fmt::Debug {
    type Device: Device<Self> + TextureViewFactory<Self> + MappableBuffer<Self>;
    type Queue: Queue<Self>;

    type Buffer: Send + Sync + fmt::Debug;
    type Texture: Send + Sync + fmt::Debug;
    type TextureView: Send + Sync + fmt::Debug;
    type Sampler: Send + Sync + fmt::Debug;
    type BindSetLayout: Send + Sync + fmt::Debug;
    type BindSet: Send + Sync + fmt::Debug;
    type PipelineLayout: Send + Sync + fmt::Debug;
    type RenderPipeline: Send + Sync + fmt::Debug;
    type ComputePipeline: Send + Sync + fmt::Debug;
    type ShaderModule: Send + Sync + fmt::Debug;
    /// The backend's replay of a `rhi_core` command stream: whatever a
    /// native command buffer/list is on that API.
    type CommandList: Send + fmt::Debug;
}

/// The creation/query surface of spec §6's `DeviceBase`.
///
/// Every `Create*` method is a pure virtual in the original; here they are
/// ordinary trait methods returning `Result`, since constructor failure is
/// a runtime condition (§7 class 2), not a contract violation.
pub trait Device<B: Backend>: Send + Sync + fmt::Debug {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<B::Buffer, DeviceError>;
    fn create_texture(&self, desc: &TextureDescriptor) -> Result<B::Texture, DeviceError>;
    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<B::Sampler, DeviceError>;
    fn create_shader_module(
        &self,
        desc: &ShaderModuleDescriptor,
    ) -> Result<B::ShaderModule, DeviceError>;
    fn create_bind_set_layout(
        &self,
        desc: &BindSetLayoutDescriptor,
    ) -> Result<B::BindSetLayout, DeviceError>;
    /// `layout` is the raw handle of the `BindSetLayout` this set was
    /// created against; backends need it to allocate a compatible
    /// descriptor set.
    fn create_bind_set(
        &self,
        layout: &B::BindSetLayout,
        desc: &BindSetDescriptor,
    ) -> Result<B::BindSet, DeviceError>;
    /// `bind_set_layouts` is indexed by bind-set slot, same length and
    /// order as the core-level descriptor's slots.
    fn create_pipeline_layout(
        &self,
        bind_set_layouts: &[&B::BindSetLayout],
        desc: &PipelineLayoutDescriptor,
    ) -> Result<B::PipelineLayout, DeviceError>;
    fn create_render_pipeline(
        &self,
        layout: &B::PipelineLayout,
        vertex_module: &B::ShaderModule,
        fragment_module: Option<&B::ShaderModule>,
        desc: &RenderPipelineDescriptor,
    ) -> Result<B::RenderPipeline, DeviceError>;
    fn create_compute_pipeline(
        &self,
        layout: &B::PipelineLayout,
        module: &B::ShaderModule,
        desc: &ComputePipelineDescriptor,
    ) -> Result<B::ComputePipeline, DeviceError>;

    /// Translate a finished host-side command stream into the backend's
    /// native command list. Out of scope to implement (belongs to the
    /// Vulkan layer); this is the seam `Queue::Submit` calls through.
    fn create_command_list(&self) -> Result<B::CommandList, DeviceError>;

    /// Must be >= 1 and a power of two (spec §6).
    fn optimal_bytes_per_row_alignment(&self) -> u32;
    /// Must be >= 1 and a power of two (spec §6).
    fn optimal_buffer_to_texture_copy_offset_alignment(&self) -> u32;

    fn limits(&self) -> Limits;
}

/// `TextureBase::CreateView` from spec §6.
pub trait TextureViewFactory<B: Backend> {
    fn create_view(
        &self,
        texture: &B::Texture,
        desc: &TextureViewDescriptor,
    ) -> Result<B::TextureView, DeviceError>;
}

/// `BufferBase::MapAsyncImpl` / `APIGetMappedPointer` from spec §6.
pub trait MappableBuffer<B: Backend> {
    fn map_async(
        &self,
        buffer: &B::Buffer,
        mode: rhi_types::MapMode,
        offset: u64,
        size: u64,
    ) -> Result<(), DeviceError>;

    /// # Safety
    /// Only valid to call after a successful `map_async` has been reported
    /// complete by the backend. The returned pointer is valid for `size`
    /// bytes from the matching `map_async` call and until `unmap`.
    unsafe fn get_mapped_pointer(&self, buffer: &B::Buffer) -> *mut u8;

    fn unmap(&self, buffer: &B::Buffer);
}

/// The submission/completion surface of spec §6's `QueueBase`.
pub trait Queue<B: Backend>: Send + Sync + fmt::Debug {
    /// Submit `command_lists` for execution. Must return a submit serial
    /// equal to the caller's `pending_submit_serial` and leave the
    /// backend's `last_submitted` counter bumped to match (spec §6).
    fn submit(
        &self,
        command_lists: &[B::CommandList],
        pending_submit_serial: FenceValue,
    ) -> Result<FenceValue, DeviceError>;

    /// The highest serial the GPU has finished, as last observed by the
    /// backend. May lag behind reality; `rhi_core::Queue::tick` polls this.
    fn query_completed_serial(&self) -> FenceValue;

    /// Backend bookkeeping to run once `completed` has advanced.
    fn tick(&self, completed: FenceValue) -> Result<(), DeviceError>;

    /// Enqueue a staging-buffer -> device-buffer copy on the queue's
    /// internal recording context (used by `WriteBuffer`).
    fn copy_from_staging_to_buffer(
        &self,
        staging: &B::Buffer,
        staging_offset: u64,
        dst: &B::Buffer,
        dst_offset: u64,
        size: u64,
    );

    /// Enqueue a staging-buffer -> device-texture copy on the queue's
    /// internal recording context (used by `WriteTexture`).
    #[allow(clippy::too_many_arguments)]
    fn copy_from_staging_to_texture(
        &self,
        staging: &B::Buffer,
        staging_offset: u64,
        dst: &B::Texture,
        bytes_per_row: u32,
        rows_per_image: u32,
        width: u32,
        height: u32,
        depth_or_layers: u32,
    );

    /// Flag that the queue's internal recording context has pending work
    /// that must be flushed on the next `submit`.
    fn mark_recording_context_is_used(&self);
}

/// Identifies one physical adapter, as surfaced by `InstanceBase`.
pub trait AdapterHandle: Send + Sync + fmt::Debug {
    fn info(&self) -> AdapterInfo;
    fn limits(&self) -> Limits;
    fn supported_features(&self) -> rhi_types::Features;
}

/// `InstanceBase::CreateDevice`/`Adapter::CreateDevice` from spec §4.9:
/// opens the backend's concrete hal device and its default queue. Split
/// from [`AdapterHandle`] because only backend-parametrized code (which
/// knows `Backend::Device`/`Backend::Queue`) can call it; `AdapterHandle`
/// alone is enough to list adapters and query their capabilities.
pub trait AdapterOpen<B: Backend>: AdapterHandle {
    fn open_device(&self, required_features: rhi_types::Features) -> Result<(B::Device, B::Queue), DeviceError>;
}
