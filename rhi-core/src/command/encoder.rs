//! The outer `CommandEncoder` state machine (spec §4.2): `Outside` is
//! where copy/clear/write/debug-label commands and pass-begin calls are
//! recorded; pass bodies are handled by [`super::RenderPassEncoder`] and
//! [`super::ComputePassEncoder`], which borrow the encoder for the
//! duration of the pass so the type system — not a runtime flag — rejects
//! draw/dispatch calls made outside a pass.

use std::sync::Arc;

use rhi_hal::Backend;
use rhi_types::{BufferUsage, TextureUsage};

use super::allocator::{BlockPool, CommandAllocator};
use super::{Command, CommandList, CommandListResourceUsage, RenderPassDescriptor};
use crate::error::{fatal, ContractViolation};
use crate::resource::{Buffer, Texture};
use crate::track::SyncScopeUsageTracker;

use super::compute::ComputePassEncoder;
use super::render::RenderPassEncoder;

/// Spec §4.2: the encoder's state is always exactly one of these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Outside,
    InRenderPass,
    InComputePass,
    Finished,
}

impl EncoderState {
    fn name(self) -> &'static str {
        match self {
            EncoderState::Outside => "Outside",
            EncoderState::InRenderPass => "InRenderPass",
            EncoderState::InComputePass => "InComputePass",
            EncoderState::Finished => "Finished",
        }
    }
}

/// Spec §2's "Encoding context": the allocator plus the per-pass usage
/// snapshots accumulated so far. Kept as its own struct (rather than
/// inlined into `CommandEncoder`) because both pass encoders need mutable
/// access to exactly this and nothing else of the encoder's own state.
pub struct EncodingContext<B: Backend> {
    pub(super) allocator: CommandAllocator<B>,
    pub(super) resource_usage: CommandListResourceUsage<B>,
}

impl<B: Backend> EncodingContext<B> {
    fn new(pool: BlockPool<B>) -> Self {
        Self {
            allocator: CommandAllocator::new(pool),
            resource_usage: CommandListResourceUsage::default(),
        }
    }
}

pub struct CommandEncoder<B: Backend> {
    pub label: String,
    state: EncoderState,
    context: EncodingContext<B>,
    debug_label_depth: u32,
}

impl<B: Backend> CommandEncoder<B> {
    pub fn new(label: impl Into<String>, pool: BlockPool<B>) -> Self {
        Self {
            label: label.into(),
            state: EncoderState::Outside,
            context: EncodingContext::new(pool),
            debug_label_depth: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    fn require_outside(&self, command: &'static str) {
        if self.state != EncoderState::Outside {
            fatal(ContractViolation::WrongEncoderState {
                command,
                state: self.state.name(),
            });
        }
    }

    /// Spec §4.2: `Outside -[BeginRenderPass]-> InRenderPass`. Seeds the
    /// pass's tracker with every attachment at `RenderAttachment` usage
    /// before any draw is recorded (spec §4.2's transition table).
    pub fn begin_render_pass(&mut self, desc: RenderPassDescriptor<B>) -> RenderPassEncoder<'_, B> {
        self.require_outside("BeginRenderPass");

        let mut tracker = SyncScopeUsageTracker::new();
        for attachment in &desc.color_attachments {
            tracker.texture_view_used_as(&attachment.view, TextureUsage::RENDER_ATTACHMENT, Default::default());
            if let Some(resolve) = &attachment.resolve_target {
                tracker.texture_view_used_as(resolve, TextureUsage::RENDER_ATTACHMENT, Default::default());
            }
        }
        if let Some(ds) = &desc.depth_stencil_attachment {
            tracker.texture_view_used_as(&ds.view, TextureUsage::RENDER_ATTACHMENT, Default::default());
        }

        self.context.allocator.allocate(Command::BeginRenderPass(desc));
        self.state = EncoderState::InRenderPass;
        RenderPassEncoder::new(self, tracker)
    }

    /// Spec §4.2: `Outside -[BeginComputePass]-> InComputePass`.
    pub fn begin_compute_pass(&mut self) -> ComputePassEncoder<'_, B> {
        self.require_outside("BeginComputePass");
        self.context.allocator.allocate(Command::BeginComputePass);
        self.state = EncoderState::InComputePass;
        ComputePassEncoder::new(self, SyncScopeUsageTracker::new())
    }

    pub(super) fn end_render_pass(&mut self, usage: crate::track::SyncScopeResourceUsage<B>) {
        self.context.allocator.allocate(Command::EndRenderPass);
        self.context.resource_usage.render_pass_usages.push(usage);
        self.state = EncoderState::Outside;
    }

    pub(super) fn end_compute_pass(&mut self, usage: crate::track::SyncScopeResourceUsage<B>) {
        self.context.allocator.allocate(Command::EndComputePass);
        self.context.resource_usage.compute_pass_usages.push(usage);
        self.state = EncoderState::Outside;
    }

    pub(super) fn record(&mut self, command: Command<B>) {
        self.context.allocator.allocate(command);
    }

    pub fn clear_buffer(&mut self, buffer: &Arc<Buffer<B>>, offset: u64, size: u64) {
        self.require_outside("ClearBuffer");
        buffer
            .require_usage(BufferUsage::COPY_DST)
            .unwrap_or_else(|v| fatal(v));
        self.record(Command::ClearBuffer {
            buffer: buffer.clone(),
            offset,
            size,
        });
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: &Arc<Buffer<B>>,
        src_offset: u64,
        dst: &Arc<Buffer<B>>,
        dst_offset: u64,
        size: u64,
    ) {
        self.require_outside("CopyBufferToBuffer");
        src.require_usage(BufferUsage::COPY_SRC).unwrap_or_else(|v| fatal(v));
        dst.require_usage(BufferUsage::COPY_DST).unwrap_or_else(|v| fatal(v));
        self.record(Command::CopyBufferToBuffer {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_offset,
            size,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<Buffer<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
        dst: &Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
    ) {
        self.require_outside("CopyBufferToTexture");
        src.require_usage(BufferUsage::COPY_SRC).unwrap_or_else(|v| fatal(v));
        dst.require_usage(TextureUsage::COPY_DST).unwrap_or_else(|v| fatal(v));
        self.record(Command::CopyBufferToTexture {
            src: src.clone(),
            bytes_per_row,
            rows_per_image,
            dst: dst.clone(),
            width,
            height,
            depth_or_layers,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_texture_to_buffer(
        &mut self,
        src: &Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
        dst: &Arc<Buffer<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
    ) {
        self.require_outside("CopyTextureToBuffer");
        src.require_usage(TextureUsage::COPY_SRC).unwrap_or_else(|v| fatal(v));
        dst.require_usage(BufferUsage::COPY_DST).unwrap_or_else(|v| fatal(v));
        self.record(Command::CopyTextureToBuffer {
            src: src.clone(),
            width,
            height,
            depth_or_layers,
            dst: dst.clone(),
            bytes_per_row,
            rows_per_image,
        });
    }

    pub fn copy_texture_to_texture(
        &mut self,
        src: &Arc<Texture<B>>,
        dst: &Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
    ) {
        self.require_outside("CopyTextureToTexture");
        src.require_usage(TextureUsage::COPY_SRC).unwrap_or_else(|v| fatal(v));
        dst.require_usage(TextureUsage::COPY_DST).unwrap_or_else(|v| fatal(v));
        self.record(Command::CopyTextureToTexture {
            src: src.clone(),
            dst: dst.clone(),
            width,
            height,
            depth_or_layers,
        });
    }

    /// Records the intent to map; the actual scheduling happens on the
    /// queue (spec §4.5) via `Device::map_buffer_async`. Recording it here
    /// is purely for stream-order bookkeeping/tooling.
    pub fn map_buffer_async(&mut self, buffer: &Arc<Buffer<B>>) {
        self.require_outside("MapBufferAsync");
        self.record(Command::MapBufferAsync { buffer: buffer.clone() });
    }

    pub fn write_buffer(&mut self, dst: &Arc<Buffer<B>>, dst_offset: u64, data: &[u8]) {
        self.require_outside("WriteBuffer");
        dst.require_usage(BufferUsage::COPY_DST).unwrap_or_else(|v| fatal(v));
        self.record(Command::WriteBuffer {
            dst: dst.clone(),
            dst_offset,
            data: data.to_vec(),
        });
    }

    pub fn begin_debug_label(&mut self, name: impl Into<String>, color: Option<[f32; 4]>) {
        self.require_outside("BeginDebugLabel");
        self.debug_label_depth += 1;
        self.record(Command::BeginDebugLabel {
            name: name.into(),
            color,
        });
    }

    /// Spec §4.2/§8 invariant 8: unbalanced labels are a contract
    /// violation, rejected at the matching `End` call.
    pub fn end_debug_label(&mut self) {
        self.require_outside("EndDebugLabel");
        if self.debug_label_depth == 0 {
            fatal(ContractViolation::UnbalancedDebugLabel);
        }
        self.debug_label_depth -= 1;
        self.record(Command::EndDebugLabel);
    }

    /// Spec §4.2: `any -[Finish()]-> Finished`. Valid from `Outside`
    /// (valid from inside a pass is not modeled: ending a pass is required
    /// first, enforced by `RenderPassEncoder`/`ComputePassEncoder` owning
    /// the only route back to `Outside`).
    pub fn finish(mut self) -> CommandList<B> {
        if self.state != EncoderState::Outside {
            fatal(ContractViolation::WrongEncoderState {
                command: "Finish",
                state: self.state.name(),
            });
        }
        if self.debug_label_depth != 0 {
            fatal(ContractViolation::UnbalancedDebugLabel);
        }
        self.state = EncoderState::Finished;
        let iterator = self.context.allocator.finish();
        CommandList::new(self.label, iterator, self.context.resource_usage)
    }
}
