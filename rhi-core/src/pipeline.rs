//! Shader modules and render/compute pipelines (spec §3, §4.3).

use std::sync::Arc;

use parking_lot::Mutex;
use rhi_hal::Backend;
use rhi_types::{
    ColorTargetState, DepthStencilState, Label, MultisampleState, PrimitiveTopology, RasterState,
    ShaderStage, VertexAttribute, VertexBufferLayout, VertexStepMode, AUTO_COMPUTE,
};

use crate::binding_model::PipelineLayout;
use crate::device::Device;
use crate::resource::ResourceKind;

#[derive(Debug)]
pub struct ShaderModule<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub entry_points: Vec<(String, ShaderStage)>,
    pub(crate) raw: Mutex<Option<B::ShaderModule>>,
}

impl<B: Backend> ShaderModule<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::ShaderModule
    }

    pub fn has_entry_point(&self, name: &str, stage: ShaderStage) -> bool {
        self.entry_points
            .iter()
            .any(|(n, s)| n == name && *s == stage)
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for ShaderModule<B> {
    fn drop(&mut self) {
        self.device.untrack_shader_module(self);
    }
}

/// A [`VertexBufferLayout`] with `AUTO_COMPUTE` offsets and strides resolved
/// to concrete byte values (spec §3: "auto-computed tightly-packed offset
/// and stride when requested").
#[derive(Debug, Clone)]
pub struct ResolvedVertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

/// Resolve `AUTO_COMPUTE` attribute offsets (immediately after the previous
/// attribute, in declaration order) and the buffer's `AUTO_COMPUTE` stride
/// (the tightly-packed sum of all attribute sizes).
pub fn resolve_vertex_buffer_layout(layout: &VertexBufferLayout) -> ResolvedVertexBufferLayout {
    let mut cursor = 0u64;
    let attributes: Vec<VertexAttribute> = layout
        .attributes
        .iter()
        .map(|attr| {
            let offset = if attr.offset == AUTO_COMPUTE as u64 {
                cursor
            } else {
                attr.offset
            };
            cursor = offset + attr.format.size();
            VertexAttribute { offset, ..*attr }
        })
        .collect();

    let array_stride = if layout.array_stride == AUTO_COMPUTE as u64 {
        cursor
    } else {
        layout.array_stride
    };

    ResolvedVertexBufferLayout {
        array_stride,
        step_mode: layout.step_mode,
        attributes,
    }
}

#[derive(Debug)]
pub struct RenderPipeline<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub layout: Arc<PipelineLayout<B>>,
    pub vertex_module: Arc<ShaderModule<B>>,
    pub fragment_module: Option<Arc<ShaderModule<B>>>,
    pub vertex_buffers: Vec<ResolvedVertexBufferLayout>,
    pub primitive_topology: PrimitiveTopology,
    pub raster_state: RasterState,
    pub multisample: MultisampleState,
    pub color_targets: Vec<ColorTargetState>,
    pub depth_stencil: Option<DepthStencilState>,
    pub(crate) raw: Mutex<Option<B::RenderPipeline>>,
}

impl<B: Backend> RenderPipeline<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::RenderPipeline
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for RenderPipeline<B> {
    fn drop(&mut self) {
        self.device.untrack_render_pipeline(self);
    }
}

/// Core-level counterpart of [`rhi_types::RenderPipelineDescriptor`],
/// carrying `Arc` handles instead of borrowed descriptor data.
pub struct RenderPipelineDescriptor<'a, B: Backend> {
    pub label: Label<'a>,
    pub layout: Arc<PipelineLayout<B>>,
    pub vertex_module: Arc<ShaderModule<B>>,
    pub vertex_entry_point: &'a str,
    pub fragment_module: Option<Arc<ShaderModule<B>>>,
    pub fragment_entry_point: Option<&'a str>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub primitive_topology: PrimitiveTopology,
    pub raster_state: RasterState,
    pub multisample: MultisampleState,
    pub color_targets: Vec<ColorTargetState>,
    pub depth_stencil: Option<DepthStencilState>,
}

#[derive(Debug)]
pub struct ComputePipeline<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub layout: Arc<PipelineLayout<B>>,
    pub module: Arc<ShaderModule<B>>,
    pub(crate) raw: Mutex<Option<B::ComputePipeline>>,
}

impl<B: Backend> ComputePipeline<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::ComputePipeline
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for ComputePipeline<B> {
    fn drop(&mut self) {
        self.device.untrack_compute_pipeline(self);
    }
}

/// Core-level counterpart of [`rhi_types::ComputePipelineDescriptor`].
pub struct ComputePipelineDescriptor<'a, B: Backend> {
    pub label: Label<'a>,
    pub layout: Arc<PipelineLayout<B>>,
    pub module: Arc<ShaderModule<B>>,
    pub entry_point: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_types::VertexFormat;

    #[test]
    fn auto_offsets_pack_tightly_in_declaration_order() {
        let layout = VertexBufferLayout {
            array_stride: AUTO_COMPUTE as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: vec![
                VertexAttribute {
                    format: VertexFormat::Float32x3,
                    offset: AUTO_COMPUTE as u64,
                    shader_location: 0,
                },
                VertexAttribute {
                    format: VertexFormat::Float32x2,
                    offset: AUTO_COMPUTE as u64,
                    shader_location: 1,
                },
            ],
        };
        let resolved = resolve_vertex_buffer_layout(&layout);
        assert_eq!(resolved.attributes[0].offset, 0);
        assert_eq!(resolved.attributes[1].offset, 12);
        assert_eq!(resolved.array_stride, 20);
    }

    #[test]
    fn explicit_offsets_and_stride_are_left_alone() {
        let layout = VertexBufferLayout {
            array_stride: 32,
            step_mode: VertexStepMode::Instance,
            attributes: vec![VertexAttribute {
                format: VertexFormat::Float32,
                offset: 16,
                shader_location: 2,
            }],
        };
        let resolved = resolve_vertex_buffer_layout(&layout);
        assert_eq!(resolved.attributes[0].offset, 16);
        assert_eq!(resolved.array_stride, 32);
    }
}
