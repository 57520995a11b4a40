//! `RenderPassEncoder` (spec §4.2): the render-pass-only command surface.
//! Borrowing the outer [`CommandEncoder`] for its lifetime is what makes
//! "draw commands only valid in-pass" a compile-time property instead of a
//! runtime state check — the original's single state-flag dispatch is
//! replaced by the type system owning the only path back to `Outside`.

use std::sync::Arc;

use rhi_hal::Backend;
use rhi_types::{BufferUsage, ShaderStages};

use super::encoder::CommandEncoder;
use super::{Command, IndexFormat, ScissorRect, Viewport};
use crate::binding_model::BindSet;
use crate::error::{fatal, ContractViolation};
use crate::pipeline::RenderPipeline;
use crate::resource::Buffer;
use crate::track::SyncScopeUsageTracker;

pub struct RenderPassEncoder<'a, B: Backend> {
    encoder: &'a mut CommandEncoder<B>,
    tracker: SyncScopeUsageTracker<B>,
    pipeline: Option<Arc<RenderPipeline<B>>>,
    ended: bool,
}

impl<'a, B: Backend> RenderPassEncoder<'a, B> {
    pub(super) fn new(encoder: &'a mut CommandEncoder<B>, tracker: SyncScopeUsageTracker<B>) -> Self {
        Self {
            encoder,
            tracker,
            pipeline: None,
            ended: false,
        }
    }

    fn require_pipeline(&self) {
        if self.pipeline.is_none() {
            fatal(ContractViolation::NoPipelineSet);
        }
    }

    pub fn set_pipeline(&mut self, pipeline: &Arc<RenderPipeline<B>>) {
        self.pipeline = Some(pipeline.clone());
        self.encoder.record(Command::SetRenderPipeline(pipeline.clone()));
    }

    pub fn set_bind_set(&mut self, index: u32, set: &Arc<BindSet<B>>, dynamic_offsets: &[u32]) {
        self.require_pipeline();
        self.tracker.add_bind_set(set);
        self.encoder.record(Command::SetBindSet {
            index,
            set: set.clone(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    /// Spec §4.2: push-constant size must be a multiple of 4 and fit within
    /// the bound pipeline layout's declared range.
    pub fn set_push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) {
        self.require_pipeline();
        if data.len() % 4 != 0 {
            fatal(ContractViolation::PushConstantSizeNotAligned { size: data.len() as u32 });
        }
        let layout = &self.pipeline.as_ref().expect("checked above").layout;
        if let Some(range) = layout.push_constant_range {
            let end = offset + data.len() as u32;
            if end > range.size {
                fatal(ContractViolation::PushConstantOutOfRange {
                    offset,
                    end,
                    layout_size: range.size,
                });
            }
        } else if !data.is_empty() {
            fatal(ContractViolation::PushConstantOutOfRange {
                offset,
                end: offset + data.len() as u32,
                layout_size: 0,
            });
        }
        self.encoder.record(Command::SetPushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &Arc<Buffer<B>>, offset: u64) {
        buffer
            .require_usage(BufferUsage::VERTEX)
            .unwrap_or_else(|v| fatal(v));
        self.tracker.buffer_used_as(buffer, BufferUsage::VERTEX, ShaderStages::VERTEX);
        self.encoder.record(Command::SetVertexBuffer {
            slot,
            buffer: buffer.clone(),
            offset,
        });
    }

    pub fn set_index_buffer(&mut self, buffer: &Arc<Buffer<B>>, format: IndexFormat, offset: u64) {
        buffer
            .require_usage(BufferUsage::INDEX)
            .unwrap_or_else(|v| fatal(v));
        self.tracker.buffer_used_as(buffer, BufferUsage::INDEX, ShaderStages::VERTEX);
        self.encoder.record(Command::SetIndexBuffer {
            buffer: buffer.clone(),
            format,
            offset,
        });
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.encoder.record(Command::SetViewport(viewport));
    }

    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.encoder.record(Command::SetScissorRect(rect));
    }

    pub fn set_blend_constant(&mut self, constant: [f32; 4]) {
        self.encoder.record(Command::SetBlendConstant(constant));
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.encoder.record(Command::SetStencilReference(reference));
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.require_pipeline();
        self.encoder.record(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.require_pipeline();
        self.encoder.record(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }

    fn track_indirect(&mut self, buffer: &Arc<Buffer<B>>) {
        buffer
            .require_usage(BufferUsage::INDIRECT)
            .unwrap_or_else(|v| fatal(v));
        // Spec §4.4: "for draw/dispatch the indirect buffer records
        // BufferUsage::Indirect".
        self.tracker.buffer_used_as(buffer, BufferUsage::INDIRECT, ShaderStages::empty());
    }

    pub fn draw_indirect(&mut self, indirect_buffer: &Arc<Buffer<B>>, indirect_offset: u64) {
        self.require_pipeline();
        self.track_indirect(indirect_buffer);
        self.encoder.record(Command::DrawIndirect {
            indirect_buffer: indirect_buffer.clone(),
            indirect_offset,
        });
    }

    pub fn draw_indexed_indirect(&mut self, indirect_buffer: &Arc<Buffer<B>>, indirect_offset: u64) {
        self.require_pipeline();
        self.track_indirect(indirect_buffer);
        self.encoder.record(Command::DrawIndexedIndirect {
            indirect_buffer: indirect_buffer.clone(),
            indirect_offset,
        });
    }

    /// Spec §9 open question, resolved: kept as a command distinct from
    /// [`Self::multi_draw_indexed_indirect`] (see `Command::MultiDrawIndirect`).
    #[allow(clippy::too_many_arguments)]
    pub fn multi_draw_indirect(
        &mut self,
        indirect_buffer: &Arc<Buffer<B>>,
        indirect_offset: u64,
        max_draw_count: u32,
        count_buffer: Option<&Arc<Buffer<B>>>,
        count_buffer_offset: u64,
    ) {
        self.require_pipeline();
        self.track_indirect(indirect_buffer);
        if let Some(count_buffer) = count_buffer {
            self.track_indirect(count_buffer);
        }
        self.encoder.record(Command::MultiDrawIndirect {
            indirect_buffer: indirect_buffer.clone(),
            indirect_offset,
            max_draw_count,
            count_buffer: count_buffer.cloned(),
            count_buffer_offset,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &Arc<Buffer<B>>,
        indirect_offset: u64,
        max_draw_count: u32,
        count_buffer: Option<&Arc<Buffer<B>>>,
        count_buffer_offset: u64,
    ) {
        self.require_pipeline();
        self.track_indirect(indirect_buffer);
        if let Some(count_buffer) = count_buffer {
            self.track_indirect(count_buffer);
        }
        self.encoder.record(Command::MultiDrawIndexedIndirect {
            indirect_buffer: indirect_buffer.clone(),
            indirect_offset,
            max_draw_count,
            count_buffer: count_buffer.cloned(),
            count_buffer_offset,
        });
    }

    /// Spec §4.2: `InRenderPass -[APIEnd]-> Outside`, moving the pass's
    /// acquired usage snapshot into `renderPassUsages`.
    pub fn end(mut self) {
        let usage = self.tracker.acquire_sync_scope_usage();
        self.encoder.end_render_pass(usage);
        self.ended = true;
    }
}

impl<'a, B: Backend> Drop for RenderPassEncoder<'a, B> {
    fn drop(&mut self) {
        if !self.ended && !std::thread::panicking() {
            fatal(ContractViolation::Other(
                "RenderPassEncoder dropped without calling `end()`".to_string(),
            ));
        }
    }
}
