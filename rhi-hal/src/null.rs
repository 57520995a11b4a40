//! An in-process backend with no real GPU, used to exercise `rhi-core`'s
//! command pipeline in tests. Plays the same role `wgpu-hal`'s `noop`
//! backend plays for `wgpu-core`.
//!
//! Completion does not happen automatically: tests drive the fake GPU
//! timeline explicitly via [`NullQueue::advance_completed_to`], which lets
//! the ring-wrap and async-map scenarios from spec §8 be reproduced
//! deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rhi_types::{
    AdapterInfo, AdapterType, BindSetDescriptor, BindSetLayoutDescriptor, BufferDescriptor,
    ComputePipelineDescriptor, Features, Limits, MapMode, PipelineLayoutDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, ShaderModuleDescriptor, TextureDescriptor,
    TextureViewDescriptor,
};

use crate::{
    AdapterHandle, AdapterOpen, Backend, Device, DeviceError, FenceValue, MappableBuffer, Queue,
    TextureViewFactory,
};

#[derive(Debug)]
pub struct NullBackend;

#[derive(Debug)]
pub struct NullBuffer {
    pub size: u64,
    data: Mutex<Vec<u8>>,
}

#[derive(Debug)]
pub struct NullTexture {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
pub struct NullTextureView;
#[derive(Debug, Default)]
pub struct NullSampler;
#[derive(Debug, Default)]
pub struct NullBindSetLayout;
#[derive(Debug, Default)]
pub struct NullBindSet;
#[derive(Debug, Default)]
pub struct NullPipelineLayout;
#[derive(Debug, Default)]
pub struct NullRenderPipeline;
#[derive(Debug, Default)]
pub struct NullComputePipeline;
#[derive(Debug, Default)]
pub struct NullShaderModule;
#[derive(Debug, Default)]
pub struct NullCommandList;

impl Backend for NullBackend {
    type Device = NullDevice;
    type Queue = NullQueue;
    type Buffer = NullBuffer;
    type Texture = NullTexture;
    type TextureView = NullTextureView;
    type Sampler = NullSampler;
    type BindSetLayout = NullBindSetLayout;
    type BindSet = NullBindSet;
    type PipelineLayout = NullPipelineLayout;
    type RenderPipeline = NullRenderPipeline;
    type ComputePipeline = NullComputePipeline;
    type ShaderModule = NullShaderModule;
    type CommandList = NullCommandList;
}

#[derive(Debug)]
pub struct NullDevice {
    limits: Limits,
}

impl Default for NullDevice {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
        }
    }
}

impl Device<NullBackend> for NullDevice {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<NullBuffer, DeviceError> {
        Ok(NullBuffer {
            size: desc.size,
            data: Mutex::new(vec![0u8; desc.size as usize]),
        })
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<NullTexture, DeviceError> {
        Ok(NullTexture {
            width: desc.width,
            height: desc.height,
        })
    }

    fn create_sampler(&self, _desc: &SamplerDescriptor) -> Result<NullSampler, DeviceError> {
        Ok(NullSampler)
    }

    fn create_shader_module(
        &self,
        _desc: &ShaderModuleDescriptor,
    ) -> Result<NullShaderModule, DeviceError> {
        Ok(NullShaderModule)
    }

    fn create_bind_set_layout(
        &self,
        _desc: &BindSetLayoutDescriptor,
    ) -> Result<NullBindSetLayout, DeviceError> {
        Ok(NullBindSetLayout)
    }

    fn create_bind_set(
        &self,
        _layout: &NullBindSetLayout,
        _desc: &BindSetDescriptor,
    ) -> Result<NullBindSet, DeviceError> {
        Ok(NullBindSet)
    }

    fn create_pipeline_layout(
        &self,
        _bind_set_layouts: &[&NullBindSetLayout],
        _desc: &PipelineLayoutDescriptor,
    ) -> Result<NullPipelineLayout, DeviceError> {
        Ok(NullPipelineLayout)
    }

    fn create_render_pipeline(
        &self,
        _layout: &NullPipelineLayout,
        _vertex_module: &NullShaderModule,
        _fragment_module: Option<&NullShaderModule>,
        _desc: &RenderPipelineDescriptor,
    ) -> Result<NullRenderPipeline, DeviceError> {
        Ok(NullRenderPipeline)
    }

    fn create_compute_pipeline(
        &self,
        _layout: &NullPipelineLayout,
        _module: &NullShaderModule,
        _desc: &ComputePipelineDescriptor,
    ) -> Result<NullComputePipeline, DeviceError> {
        Ok(NullComputePipeline)
    }

    fn create_command_list(&self) -> Result<NullCommandList, DeviceError> {
        Ok(NullCommandList)
    }

    fn optimal_bytes_per_row_alignment(&self) -> u32 {
        self.limits.optimal_bytes_per_row_alignment
    }

    fn optimal_buffer_to_texture_copy_offset_alignment(&self) -> u32 {
        self.limits.optimal_buffer_to_texture_copy_offset_alignment
    }

    fn limits(&self) -> Limits {
        self.limits
    }
}

impl TextureViewFactory<NullBackend> for NullDevice {
    fn create_view(
        &self,
        _texture: &NullTexture,
        _desc: &TextureViewDescriptor,
    ) -> Result<NullTextureView, DeviceError> {
        Ok(NullTextureView)
    }
}

impl MappableBuffer<NullBackend> for NullDevice {
    fn map_async(
        &self,
        _buffer: &NullBuffer,
        _mode: MapMode,
        _offset: u64,
        _size: u64,
    ) -> Result<(), DeviceError> {
        Ok(())
    }

    unsafe fn get_mapped_pointer(&self, buffer: &NullBuffer) -> *mut u8 {
        buffer.data.lock().unwrap().as_mut_ptr()
    }

    fn unmap(&self, _buffer: &NullBuffer) {}
}

/// A fake GPU timeline: `submit` bumps `last_submitted`; `completed` only
/// moves when a test calls [`advance_completed_to`](Self::advance_completed_to).
#[derive(Debug, Default)]
pub struct NullQueue {
    last_submitted: AtomicU64,
    completed: AtomicU64,
}

impl NullQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the GPU finishing work up to and including `serial`.
    pub fn advance_completed_to(&self, serial: FenceValue) {
        self.completed.fetch_max(serial, Ordering::AcqRel);
    }
}

impl Queue<NullBackend> for NullQueue {
    fn submit(
        &self,
        _command_lists: &[NullCommandList],
        pending_submit_serial: FenceValue,
    ) -> Result<FenceValue, DeviceError> {
        self.last_submitted
            .store(pending_submit_serial, Ordering::Release);
        Ok(pending_submit_serial)
    }

    fn query_completed_serial(&self) -> FenceValue {
        self.completed.load(Ordering::Acquire)
    }

    fn tick(&self, _completed: FenceValue) -> Result<(), DeviceError> {
        Ok(())
    }

    fn copy_from_staging_to_buffer(
        &self,
        _staging: &NullBuffer,
        _staging_offset: u64,
        _dst: &NullBuffer,
        _dst_offset: u64,
        _size: u64,
    ) {
    }

    fn copy_from_staging_to_texture(
        &self,
        _staging: &NullBuffer,
        _staging_offset: u64,
        _dst: &NullTexture,
        _bytes_per_row: u32,
        _rows_per_image: u32,
        _width: u32,
        _height: u32,
        _depth_or_layers: u32,
    ) {
    }

    fn mark_recording_context_is_used(&self) {}
}

#[derive(Debug)]
pub struct NullAdapter;

impl AdapterHandle for NullAdapter {
    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            api_version: 0,
            driver_version: 0,
            vendor_id: 0,
            device_id: 0,
            adapter_type: AdapterType::Cpu,
            device_name: "null".to_owned(),
        }
    }

    fn limits(&self) -> Limits {
        Limits::default()
    }

    fn supported_features(&self) -> Features {
        Features::empty()
    }
}

impl AdapterOpen<NullBackend> for NullAdapter {
    fn open_device(&self, _required_features: Features) -> Result<(NullDevice, NullQueue), DeviceError> {
        Ok((NullDevice::default(), NullQueue::new()))
    }
}
