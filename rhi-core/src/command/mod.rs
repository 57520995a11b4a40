//! The command stream (spec §3, §4.1, §4.2): a typed, forward-iterable
//! recording of one encoder's draw/dispatch/copy/debug-label intents, plus
//! the per-pass resource-usage snapshots gathered while recording it.

pub mod allocator;
pub mod compute;
pub mod encoder;
pub mod render;

use std::sync::Arc;

use rhi_hal::Backend;
use rhi_types::{Color, LoadOp, ShaderStages, StoreOp};

use crate::binding_model::BindSet;
use crate::pipeline::{ComputePipeline, RenderPipeline};
use crate::resource::{Buffer, Texture, TextureView};
use crate::track::SyncScopeResourceUsage;

pub use allocator::{new_block_pool, BlockPool, CommandAllocator, CommandIterator};
pub use compute::ComputePassEncoder;
pub use encoder::{CommandEncoder, EncoderState, EncodingContext};
pub use render::RenderPassEncoder;

/// Index-buffer element width. Not part of `rhi_types` because nothing
/// outside the command stream needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One render-pass color attachment (spec §4.2's `BeginRenderPass(desc)`).
#[derive(Debug, Clone)]
pub struct RenderPassColorAttachment<B: Backend> {
    pub view: Arc<TextureView<B>>,
    pub resolve_target: Option<Arc<TextureView<B>>>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: Color,
}

#[derive(Debug, Clone)]
pub struct RenderPassDepthStencilAttachment<B: Backend> {
    pub view: Arc<TextureView<B>>,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub depth_clear_value: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub stencil_clear_value: u32,
}

#[derive(Debug, Clone)]
pub struct RenderPassDescriptor<B: Backend> {
    pub label: String,
    pub color_attachments: Vec<RenderPassColorAttachment<B>>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<B>>,
}

/// The tagged-union command stream spec §9 mandates in place of the
/// original's placement-new arena. Every field naming a resource holds a
/// strong `Arc`, which is how a finished `CommandList` keeps its operands
/// alive regardless of what the encoder's caller does next (spec §4.4:
/// "every recorded Cmd carries strong refs to its resource operands").
#[derive(Debug)]
pub enum Command<B: Backend> {
    BeginRenderPass(RenderPassDescriptor<B>),
    EndRenderPass,
    BeginComputePass,
    EndComputePass,

    SetRenderPipeline(Arc<RenderPipeline<B>>),
    SetComputePipeline(Arc<ComputePipeline<B>>),
    SetBindSet {
        index: u32,
        set: Arc<BindSet<B>>,
        dynamic_offsets: Vec<u32>,
    },
    SetPushConstants {
        stages: ShaderStages,
        offset: u32,
        data: Vec<u8>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer<B>>,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: Arc<Buffer<B>>,
        format: IndexFormat,
        offset: u64,
    },
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    SetBlendConstant([f32; 4]),
    SetStencilReference(u32),

    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    DrawIndirect {
        indirect_buffer: Arc<Buffer<B>>,
        indirect_offset: u64,
    },
    DrawIndexedIndirect {
        indirect_buffer: Arc<Buffer<B>>,
        indirect_offset: u64,
    },
    /// Spec §9 open question, resolved: `MultiDrawIndirect` is kept as a
    /// command distinct from `MultiDrawIndexedIndirect` rather than reusing
    /// one id for both, since a backend replaying the stream cannot tell
    /// indexed and non-indexed draws apart from the indirect buffer alone.
    MultiDrawIndirect {
        indirect_buffer: Arc<Buffer<B>>,
        indirect_offset: u64,
        max_draw_count: u32,
        count_buffer: Option<Arc<Buffer<B>>>,
        count_buffer_offset: u64,
    },
    MultiDrawIndexedIndirect {
        indirect_buffer: Arc<Buffer<B>>,
        indirect_offset: u64,
        max_draw_count: u32,
        count_buffer: Option<Arc<Buffer<B>>>,
        count_buffer_offset: u64,
    },

    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        indirect_buffer: Arc<Buffer<B>>,
        indirect_offset: u64,
    },

    CopyBufferToBuffer {
        src: Arc<Buffer<B>>,
        src_offset: u64,
        dst: Arc<Buffer<B>>,
        dst_offset: u64,
        size: u64,
    },
    CopyBufferToTexture {
        src: Arc<Buffer<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
        dst: Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
    },
    CopyTextureToBuffer {
        src: Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
        dst: Arc<Buffer<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
    },
    CopyTextureToTexture {
        src: Arc<Texture<B>>,
        dst: Arc<Texture<B>>,
        width: u32,
        height: u32,
        depth_or_layers: u32,
    },
    ClearBuffer {
        buffer: Arc<Buffer<B>>,
        offset: u64,
        size: u64,
    },

    /// Spec §4.2: only legal in `Outside` state (`MapBufferAsync`'s own
    /// scheduling happens on the queue; recording it marks where in the
    /// stream the intent to map was issued, for tooling/debug purposes).
    MapBufferAsync {
        buffer: Arc<Buffer<B>>,
    },
    WriteBuffer {
        dst: Arc<Buffer<B>>,
        dst_offset: u64,
        data: Vec<u8>,
    },

    /// Spec §9/original_source supplement: debug-label commands carrying an
    /// optional RGBA color, as GPU profilers expect.
    BeginDebugLabel {
        name: String,
        color: Option<[f32; 4]>,
    },
    EndDebugLabel,
}

/// Spec §3: per finished encoding, the render- and compute-pass usage
/// snapshots acquired at each pass's `End()`.
#[derive(Debug)]
pub struct CommandListResourceUsage<B: Backend> {
    pub render_pass_usages: Vec<SyncScopeResourceUsage<B>>,
    pub compute_pass_usages: Vec<SyncScopeResourceUsage<B>>,
}

impl<B: Backend> Default for CommandListResourceUsage<B> {
    fn default() -> Self {
        Self {
            render_pass_usages: Vec::new(),
            compute_pass_usages: Vec::new(),
        }
    }
}

/// Spec §3: "Owns its command blocks + resource-usage snapshot + strong
/// refs to every resource the stream names" — the strong refs live inside
/// each `Command` variant, so a `CommandList` needs only hold the iterator
/// (still owning its blocks) and the usage snapshot.
pub struct CommandList<B: Backend> {
    pub label: String,
    commands: CommandIterator<B>,
    pub resource_usage: CommandListResourceUsage<B>,
}

impl<B: Backend> CommandList<B> {
    pub(crate) fn new(label: String, commands: CommandIterator<B>, resource_usage: CommandListResourceUsage<B>) -> Self {
        Self {
            label,
            commands,
            resource_usage,
        }
    }

    /// Consume the stream in recording order. Out of scope to translate to
    /// a backend command list here (spec §1: "the concrete Vulkan backend
    /// ... out of scope"); this is the seam a backend's `Queue::submit`
    /// would iterate through.
    pub fn into_commands(self) -> impl Iterator<Item = Command<B>> {
        self.commands
    }
}

impl<B: Backend> std::fmt::Debug for CommandList<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("label", &self.label)
            .field("render_pass_usages", &self.resource_usage.render_pass_usages.len())
            .field("compute_pass_usages", &self.resource_usage.compute_pass_usages.len())
            .finish()
    }
}
