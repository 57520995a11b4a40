//! `Device`: the resource factory and owner of per-kind tracked resource
//! lists (spec §4.8, §6).
//!
//! Mirrors `wgpu-core`'s `Device<A>`: a struct parametrized over the hal
//! `Backend`, holding the raw hal device plus one [`TrackedList`] per
//! resource kind. `Device::destroy` sweeps those lists in a fixed,
//! dependency-safe order so no resource's `DestroyImpl` runs before
//! something that references it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rhi_hal::{Backend, Device as HalDevice, DeviceError, MappableBuffer, TextureViewFactory};
use rhi_types::{
    BindSetLayoutDescriptor, BufferDescriptor, Features, Limits, SamplerDescriptor,
    ShaderModuleDescriptor, TextureDescriptor, TextureViewDescriptor,
};

use crate::binding_model::{
    validate_entries_against_layout, BindSet, BindSetDescriptor, BindSetLayout, PipelineLayout,
    PipelineLayoutDescriptor,
};
use crate::error::ContractViolation;
use crate::label_to_string;
use crate::pipeline::{
    ComputePipeline, ComputePipelineDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModule,
};
use crate::queue::Queue;
use crate::resource::{Buffer, BufferMapState, ResourceKind, Sampler, Texture, TextureView, TrackedList};

#[derive(Debug)]
pub struct Device<B: Backend> {
    pub(crate) raw: B::Device,
    pub(crate) default_queue: Arc<Queue<B>>,
    /// Queues beyond the default one, created via [`Device::create_queue`]
    /// (spec §4.1 supplement: `Device::tick_all_queues` iterates every
    /// owned queue, not just the default one).
    extra_queues: Mutex<Vec<Arc<Queue<B>>>>,
    pub features: Features,
    pub limits: Limits,
    lost: AtomicBool,

    empty_bind_set_layout: OnceCell<Arc<BindSetLayout<B>>>,

    buffers: TrackedList<Buffer<B>>,
    textures: TrackedList<Texture<B>>,
    samplers: TrackedList<Sampler<B>>,
    bind_set_layouts: TrackedList<BindSetLayout<B>>,
    bind_sets: TrackedList<BindSet<B>>,
    pipeline_layouts: TrackedList<PipelineLayout<B>>,
    render_pipelines: TrackedList<RenderPipeline<B>>,
    compute_pipelines: TrackedList<ComputePipeline<B>>,
    shader_modules: TrackedList<ShaderModule<B>>,
}

impl<B: Backend> Device<B> {
    pub fn new(raw: B::Device, hal_queue: B::Queue, features: Features, limits: Limits) -> Arc<Self> {
        assert!(
            limits.alignments_are_valid(),
            "backend reported non-power-of-two alignment"
        );
        Arc::new(Self {
            default_queue: Arc::new(Queue::new(hal_queue)),
            extra_queues: Mutex::new(Vec::new()),
            raw,
            features,
            limits,
            lost: AtomicBool::new(false),
            empty_bind_set_layout: OnceCell::new(),
            buffers: TrackedList::default(),
            textures: TrackedList::default(),
            samplers: TrackedList::default(),
            bind_set_layouts: TrackedList::default(),
            bind_sets: TrackedList::default(),
            pipeline_layouts: TrackedList::default(),
            render_pipelines: TrackedList::default(),
            compute_pipelines: TrackedList::default(),
            shader_modules: TrackedList::default(),
        })
    }

    pub fn default_queue(&self) -> &Arc<Queue<B>> {
        &self.default_queue
    }

    /// Create and register an additional queue beyond the default one
    /// (spec §4.1 supplement).
    pub fn create_queue(&self, hal_queue: B::Queue) -> Arc<Queue<B>> {
        let queue = Arc::new(Queue::new(hal_queue));
        self.extra_queues.lock().push(queue.clone());
        queue
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Mark the device lost. Idempotent; pending map callbacks observe this
    /// through [`crate::error::MapStatus::DeviceLost`] (spec §4.7).
    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
        self.default_queue.tasks().set_device_lost();
        for queue in self.extra_queues.lock().iter() {
            queue.tasks().set_device_lost();
        }
    }

    // --- resource factory -------------------------------------------------

    pub fn create_buffer(
        self: &Arc<Self>,
        desc: &BufferDescriptor,
    ) -> Result<Arc<Buffer<B>>, DeviceError> {
        let raw = self.raw.create_buffer(desc)?;
        let map_state = if desc.mapped_at_creation {
            BufferMapState::MappedAtCreation
        } else {
            BufferMapState::Unmapped
        };
        let buffer = Arc::new(Buffer {
            device: self.clone(),
            label: label_to_string(&desc.label),
            size: desc.size,
            usage: desc.usage,
            raw: Mutex::new(Some(raw)),
            map_state: Mutex::new(map_state),
            last_usage_serial: Default::default(),
        });
        self.buffers.track(&buffer);
        Ok(buffer)
    }

    pub fn create_texture(
        self: &Arc<Self>,
        desc: &TextureDescriptor,
    ) -> Result<Arc<Texture<B>>, DeviceError> {
        let raw = self.raw.create_texture(desc)?;
        let texture = Arc::new(Texture {
            device: self.clone(),
            label: label_to_string(&desc.label),
            dimension: desc.dimension,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.depth_or_array_layers,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            usage: desc.usage,
            raw: Mutex::new(Some(raw)),
            views: Mutex::new(Vec::new()),
            last_usage_serial: Default::default(),
        });
        self.textures.track(&texture);
        Ok(texture)
    }

    pub fn create_texture_view(
        &self,
        texture: &Arc<Texture<B>>,
        desc: &TextureViewDescriptor,
    ) -> Result<Arc<TextureView<B>>, DeviceError> {
        let range = desc
            .range
            .resolved(texture.mip_level_count, texture.layer_count());
        if !range.is_within(texture.aspects(), texture.mip_level_count, texture.layer_count()) {
            return Err(DeviceError::Backend(
                ContractViolation::SubresourceOutOfBounds.to_string(),
            ));
        }
        let raw = {
            let texture_raw = texture.raw.lock();
            let texture_raw = texture_raw.as_ref().expect("view created on destroyed texture");
            self.raw.create_view(texture_raw, desc)?
        };
        let view = Arc::new(TextureView {
            parent: texture.clone(),
            label: label_to_string(&desc.label),
            dimension: desc.dimension.unwrap_or(default_view_dimension(texture.dimension)),
            format: desc.format.unwrap_or(texture.format),
            range,
            usage: desc.usage.unwrap_or(texture.usage),
            raw: Mutex::new(Some(raw)),
        });
        texture.views.lock().push(Arc::downgrade(&view));
        Ok(view)
    }

    pub fn create_sampler(
        self: &Arc<Self>,
        desc: &SamplerDescriptor,
    ) -> Result<Arc<Sampler<B>>, DeviceError> {
        let raw = self.raw.create_sampler(desc)?;
        let sampler = Arc::new(Sampler {
            device: self.clone(),
            label: label_to_string(&desc.label),
            raw: Mutex::new(Some(raw)),
        });
        self.samplers.track(&sampler);
        Ok(sampler)
    }

    pub fn create_shader_module(
        self: &Arc<Self>,
        desc: &ShaderModuleDescriptor,
    ) -> Result<Arc<ShaderModule<B>>, DeviceError> {
        let raw = self.raw.create_shader_module(desc)?;
        let module = Arc::new(ShaderModule {
            device: self.clone(),
            label: label_to_string(&desc.label),
            entry_points: desc.entry_points.clone(),
            raw: Mutex::new(Some(raw)),
        });
        self.shader_modules.track(&module);
        Ok(module)
    }

    pub fn create_bind_set_layout(
        self: &Arc<Self>,
        desc: &BindSetLayoutDescriptor,
    ) -> Result<Arc<BindSetLayout<B>>, DeviceError> {
        let raw = self.raw.create_bind_set_layout(desc)?;
        let layout = Arc::new(BindSetLayout {
            device: self.clone(),
            label: label_to_string(&desc.label),
            entries: desc.entries.clone(),
            raw: Mutex::new(Some(raw)),
        });
        self.bind_set_layouts.track(&layout);
        Ok(layout)
    }

    /// The shared empty `BindSetLayout` used to pad out unused pipeline
    /// layout slots (spec §4.8). Created once, lazily, on first use.
    pub fn empty_bind_set_layout(self: &Arc<Self>) -> Arc<BindSetLayout<B>> {
        self.empty_bind_set_layout
            .get_or_init(|| {
                self.create_bind_set_layout(&BindSetLayoutDescriptor {
                    label: None,
                    entries: Vec::new(),
                })
                .expect("empty bind set layout creation cannot fail")
            })
            .clone()
    }

    pub fn create_bind_set(
        self: &Arc<Self>,
        desc: BindSetDescriptor<B>,
    ) -> Result<Arc<BindSet<B>>, DeviceError> {
        validate_entries_against_layout(&desc.layout, &desc.entries)
            .unwrap_or_else(|violation| crate::error::fatal(violation));

        let hal_entries: Vec<rhi_types::BindSetEntry> = desc
            .entries
            .iter()
            .map(|e| rhi_types::BindSetEntry {
                binding: e.binding,
                array_element: e.array_element,
                resource: match &e.resource {
                    crate::binding_model::BoundResource::Buffer { offset, size, .. } => {
                        rhi_types::BindingResource::Buffer(rhi_types::BufferBinding {
                            offset: *offset,
                            size: *size,
                        })
                    }
                    crate::binding_model::BoundResource::TextureView(_) => {
                        rhi_types::BindingResource::TextureView
                    }
                    crate::binding_model::BoundResource::Sampler(_) => {
                        rhi_types::BindingResource::Sampler
                    }
                },
            })
            .collect();
        let raw = {
            let layout_raw = desc.layout.raw.lock();
            let layout_raw = layout_raw.as_ref().expect("bind set layout destroyed");
            self.raw.create_bind_set(
                layout_raw,
                &rhi_types::BindSetDescriptor {
                    label: desc.label.clone(),
                    entries: hal_entries,
                },
            )?
        };

        let entries = desc
            .entries
            .into_iter()
            .map(|e| crate::binding_model::BoundBindSetEntry {
                binding: e.binding,
                array_element: e.array_element,
                resource: e.resource,
            })
            .collect();

        let bind_set = Arc::new(BindSet {
            device: self.clone(),
            label: label_to_string(&desc.label),
            layout: desc.layout,
            entries,
            raw: Mutex::new(Some(raw)),
        });
        self.bind_sets.track(&bind_set);
        Ok(bind_set)
    }

    pub fn create_pipeline_layout(
        self: &Arc<Self>,
        desc: PipelineLayoutDescriptor<B>,
    ) -> Result<Arc<PipelineLayout<B>>, DeviceError> {
        let bind_set_layouts: Vec<Arc<BindSetLayout<B>>> = (0..rhi_types::MAX_BIND_SETS)
            .map(|i| {
                desc.bind_set_layouts
                    .get(i)
                    .and_then(|slot| slot.clone())
                    .unwrap_or_else(|| self.empty_bind_set_layout())
            })
            .collect();

        let raw = {
            let guards: Vec<_> = bind_set_layouts.iter().map(|l| l.raw.lock()).collect();
            let refs: Vec<&B::BindSetLayout> = guards
                .iter()
                .map(|g| g.as_ref().expect("bind set layout destroyed"))
                .collect();
            self.raw.create_pipeline_layout(
                &refs,
                &rhi_types::PipelineLayoutDescriptor {
                    label: desc.label.clone(),
                    bind_set_layouts: vec![None; bind_set_layouts.len()],
                    push_constant_range: desc.push_constant_range,
                },
            )?
        };

        let layout = Arc::new(PipelineLayout {
            device: self.clone(),
            label: label_to_string(&desc.label),
            bind_set_layouts,
            push_constant_range: desc.push_constant_range,
            raw: Mutex::new(Some(raw)),
        });
        self.pipeline_layouts.track(&layout);
        Ok(layout)
    }

    pub fn create_render_pipeline(
        self: &Arc<Self>,
        desc: RenderPipelineDescriptor<B>,
    ) -> Result<Arc<RenderPipeline<B>>, DeviceError> {
        use rhi_types::{ProgrammableStage, ShaderStage};

        if !desc
            .vertex_module
            .has_entry_point(desc.vertex_entry_point, ShaderStage::Vertex)
        {
            return Err(DeviceError::Backend(format!(
                "shader module has no vertex entry point `{}`",
                desc.vertex_entry_point
            )));
        }
        if let (Some(module), Some(entry)) = (&desc.fragment_module, desc.fragment_entry_point) {
            if !module.has_entry_point(entry, ShaderStage::Fragment) {
                return Err(DeviceError::Backend(format!(
                    "shader module has no fragment entry point `{entry}`"
                )));
            }
        }

        let vertex_buffers: Vec<crate::pipeline::ResolvedVertexBufferLayout> = desc
            .vertex_buffers
            .iter()
            .map(crate::pipeline::resolve_vertex_buffer_layout)
            .collect();

        let raw_desc = rhi_types::RenderPipelineDescriptor {
            label: desc.label.clone(),
            vertex_stage: ProgrammableStage {
                entry_point: Some(desc.vertex_entry_point.into()),
                specialization_constants: Vec::new(),
            },
            fragment_stage: desc.fragment_entry_point.map(|entry| ProgrammableStage {
                entry_point: Some(entry.into()),
                specialization_constants: Vec::new(),
            }),
            vertex_buffers: desc.vertex_buffers.clone(),
            primitive_topology: desc.primitive_topology,
            raster_state: desc.raster_state,
            multisample: desc.multisample,
            color_targets: desc.color_targets.clone(),
            depth_stencil: desc.depth_stencil,
            patch_control_points: 0,
            viewport_count: 1,
        };
        let raw = {
            let layout_raw = desc.layout.raw.lock();
            let layout_raw = layout_raw.as_ref().expect("pipeline layout destroyed");
            let vertex_raw = desc.vertex_module.raw.lock();
            let vertex_raw = vertex_raw.as_ref().expect("vertex shader module destroyed");
            let fragment_guard = desc.fragment_module.as_ref().map(|m| m.raw.lock());
            let fragment_raw = fragment_guard
                .as_ref()
                .map(|g| g.as_ref().expect("fragment shader module destroyed"));
            self.raw
                .create_render_pipeline(layout_raw, vertex_raw, fragment_raw, &raw_desc)?
        };

        let pipeline = Arc::new(RenderPipeline {
            device: self.clone(),
            label: label_to_string(&desc.label),
            layout: desc.layout,
            vertex_module: desc.vertex_module,
            fragment_module: desc.fragment_module,
            vertex_buffers,
            primitive_topology: desc.primitive_topology,
            raster_state: desc.raster_state,
            multisample: desc.multisample,
            color_targets: desc.color_targets,
            depth_stencil: desc.depth_stencil,
            raw: Mutex::new(Some(raw)),
        });
        self.render_pipelines.track(&pipeline);
        Ok(pipeline)
    }

    pub fn create_compute_pipeline(
        self: &Arc<Self>,
        desc: ComputePipelineDescriptor<B>,
    ) -> Result<Arc<ComputePipeline<B>>, DeviceError> {
        use rhi_types::{ProgrammableStage, ShaderStage};

        if !desc.module.has_entry_point(desc.entry_point, ShaderStage::Compute) {
            return Err(DeviceError::Backend(format!(
                "shader module has no compute entry point `{}`",
                desc.entry_point
            )));
        }

        let raw = {
            let layout_raw = desc.layout.raw.lock();
            let layout_raw = layout_raw.as_ref().expect("pipeline layout destroyed");
            let module_raw = desc.module.raw.lock();
            let module_raw = module_raw.as_ref().expect("shader module destroyed");
            self.raw.create_compute_pipeline(
                layout_raw,
                module_raw,
                &rhi_types::ComputePipelineDescriptor {
                    label: desc.label.clone(),
                    compute_stage: ProgrammableStage {
                        entry_point: Some(desc.entry_point.into()),
                        specialization_constants: Vec::new(),
                    },
                },
            )?
        };

        let pipeline = Arc::new(ComputePipeline {
            device: self.clone(),
            label: label_to_string(&desc.label),
            layout: desc.layout,
            module: desc.module,
            raw: Mutex::new(Some(raw)),
        });
        self.compute_pipelines.track(&pipeline);
        Ok(pipeline)
    }

    // --- queue-facing operations --------------------------------------------

    /// Begin an async map of `buffer` (spec §4.5's map sequence): validates
    /// the required usage flag, then either resolves `callback` immediately
    /// (the buffer's last GPU usage already completed, or the device is
    /// lost) or defers it to a future [`Device::tick_all_queues`].
    pub fn map_buffer_async(
        self: &Arc<Self>,
        buffer: &Arc<Buffer<B>>,
        mode: rhi_types::MapMode,
        callback: impl FnOnce(crate::error::MapStatus) + Send + 'static,
    ) {
        let required = match mode {
            rhi_types::MapMode::Read => rhi_types::BufferUsage::MAP_READ,
            rhi_types::MapMode::Write => rhi_types::BufferUsage::MAP_WRITE,
        };
        buffer
            .require_usage(required)
            .unwrap_or_else(|v| crate::error::fatal(v));
        *buffer.map_state.lock() = BufferMapState::PendingMap { mode };

        if self.is_lost() {
            callback(crate::error::MapStatus::DeviceLost);
            return;
        }
        self.default_queue
            .request_map(&self.raw, buffer.clone(), mode, Box::new(callback));
    }

    /// Submit finished command lists on the default queue (spec §4.5).
    pub fn submit(
        &self,
        command_lists: Vec<B::CommandList>,
        buffers_used: &[Arc<Buffer<B>>],
        textures_used: &[Arc<Texture<B>>],
    ) -> Result<crate::serial::Serial, crate::error::CoreError> {
        self.default_queue.submit(command_lists, buffers_used, textures_used)
    }

    /// Poll every owned queue's completed serial, reclaim staging
    /// allocations, resolve ready buffer maps, and flush callbacks
    /// (spec §4.5/§4.7). Call periodically; `needs_tick` says whether it is
    /// worth calling right now.
    pub fn tick_all_queues(&self) -> Result<(), crate::error::CoreError> {
        self.default_queue.tick(&self.raw)?;
        for queue in self.extra_queues.lock().iter() {
            queue.tick(&self.raw)?;
        }
        Ok(())
    }

    pub fn needs_tick(&self) -> bool {
        self.default_queue.needs_tick()
            || self.extra_queues.lock().iter().any(|q| q.needs_tick())
    }

    pub fn write_buffer(
        &self,
        dst: &Arc<Buffer<B>>,
        dst_offset: u64,
        data: &[u8],
    ) -> Result<(), crate::error::CoreError> {
        self.default_queue.write_buffer(&self.raw, dst, dst_offset, data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write_texture(
        &self,
        dst: &Arc<Texture<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
        width: u32,
        height: u32,
        depth_or_layers: u32,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        self.default_queue.write_texture(
            &self.raw,
            dst,
            bytes_per_row,
            rows_per_image,
            width,
            height,
            depth_or_layers,
            data,
        )
    }

    // --- untrack hooks, called from each resource's Drop -------------------

    pub(crate) fn untrack_buffer(&self, buffer: &Buffer<B>) {
        self.buffers.untrack(buffer);
    }

    pub(crate) fn untrack_texture(&self, texture: &Texture<B>) {
        self.textures.untrack(texture);
    }

    pub(crate) fn untrack_sampler(&self, sampler: &Sampler<B>) {
        self.samplers.untrack(sampler);
    }

    pub(crate) fn untrack_bind_set_layout(&self, layout: &BindSetLayout<B>) {
        self.bind_set_layouts.untrack(layout);
    }

    pub(crate) fn untrack_bind_set(&self, set: &BindSet<B>) {
        self.bind_sets.untrack(set);
    }

    pub(crate) fn untrack_pipeline_layout(&self, layout: &PipelineLayout<B>) {
        self.pipeline_layouts.untrack(layout);
    }

    pub(crate) fn untrack_render_pipeline(&self, pipeline: &RenderPipeline<B>) {
        self.render_pipelines.untrack(pipeline);
    }

    pub(crate) fn untrack_compute_pipeline(&self, pipeline: &ComputePipeline<B>) {
        self.compute_pipelines.untrack(pipeline);
    }

    pub(crate) fn untrack_shader_module(&self, module: &ShaderModule<B>) {
        self.shader_modules.untrack(module);
    }

    /// Tear every still-live tracked resource down, in the fixed
    /// dependency-safe order from spec §4.8: RenderPipeline -> ComputePipeline
    /// -> PipelineLayout -> BindSet -> BindSetLayout -> ShaderModule ->
    /// Texture -> Sampler -> Buffer. Idempotent: a second call sweeps empty
    /// lists and does nothing.
    pub fn destroy(&self) {
        self.render_pipelines.sweep(|p| p.destroy_impl());
        self.compute_pipelines.sweep(|p| p.destroy_impl());
        self.pipeline_layouts.sweep(|l| l.destroy_impl());
        self.bind_sets.sweep(|s| s.destroy_impl());
        self.bind_set_layouts.sweep(|l| l.destroy_impl());
        self.shader_modules.sweep(|m| m.destroy_impl());
        self.textures.sweep(|t| t.destroy_impl());
        self.samplers.sweep(|s| s.destroy_impl());
        self.buffers.sweep(|b| b.destroy_impl());
    }

    pub fn resource_kind_counts(&self) -> Vec<(ResourceKind, usize)> {
        vec![
            (ResourceKind::Buffer, self.buffers.len()),
            (ResourceKind::Texture, self.textures.len()),
            (ResourceKind::Sampler, self.samplers.len()),
            (ResourceKind::BindSetLayout, self.bind_set_layouts.len()),
            (ResourceKind::BindSet, self.bind_sets.len()),
            (ResourceKind::PipelineLayout, self.pipeline_layouts.len()),
            (ResourceKind::RenderPipeline, self.render_pipelines.len()),
            (ResourceKind::ComputePipeline, self.compute_pipelines.len()),
            (ResourceKind::ShaderModule, self.shader_modules.len()),
        ]
    }
}

fn default_view_dimension(dim: rhi_types::TextureDimension) -> rhi_types::TextureViewDimension {
    match dim {
        rhi_types::TextureDimension::D1 => rhi_types::TextureViewDimension::D1,
        rhi_types::TextureDimension::D2 => rhi_types::TextureViewDimension::D2,
        rhi_types::TextureDimension::D3 => rhi_types::TextureViewDimension::D3,
    }
}
