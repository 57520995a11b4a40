//! `ComputePassEncoder` (spec §4.2): the compute-pass-only command surface,
//! the simpler sibling of [`super::render::RenderPassEncoder`] — no
//! attachments, no vertex/index state, no viewport/scissor/blend/stencil.

use std::sync::Arc;

use rhi_hal::Backend;
use rhi_types::{BufferUsage, ShaderStages};

use super::encoder::CommandEncoder;
use super::Command;
use crate::binding_model::BindSet;
use crate::error::{fatal, ContractViolation};
use crate::pipeline::ComputePipeline;
use crate::resource::Buffer;
use crate::track::SyncScopeUsageTracker;

pub struct ComputePassEncoder<'a, B: Backend> {
    encoder: &'a mut CommandEncoder<B>,
    tracker: SyncScopeUsageTracker<B>,
    pipeline: Option<Arc<ComputePipeline<B>>>,
    ended: bool,
}

impl<'a, B: Backend> ComputePassEncoder<'a, B> {
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

    pub fn set_pipeline(&mut self, pipeline: &Arc<ComputePipeline<B>>) {
        self.pipeline = Some(pipeline.clone());
        self.encoder.record(Command::SetComputePipeline(pipeline.clone()));
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

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.require_pipeline();
        self.encoder.record(Command::Dispatch { x, y, z });
    }

    pub fn dispatch_indirect(&mut self, indirect_buffer: &Arc<Buffer<B>>, indirect_offset: u64) {
        self.require_pipeline();
        indirect_buffer
            .require_usage(BufferUsage::INDIRECT)
            .unwrap_or_else(|v| fatal(v));
        self.tracker
            .buffer_used_as(indirect_buffer, BufferUsage::INDIRECT, ShaderStages::empty());
        self.encoder.record(Command::DispatchIndirect {
            indirect_buffer: indirect_buffer.clone(),
            indirect_offset,
        });
    }

    /// Spec §4.2: `InComputePass -[APIEnd]-> Outside`.
    pub fn end(mut self) {
        let usage = self.tracker.acquire_sync_scope_usage();
        self.encoder.end_compute_pass(usage);
        self.ended = true;
    }
}

impl<'a, B: Backend> Drop for ComputePassEncoder<'a, B> {
    fn drop(&mut self) {
        if !self.ended && !std::thread::panicking() {
            fatal(ContractViolation::Other(
                "ComputePassEncoder dropped without calling `end()`".to_string(),
            ));
        }
    }
}
