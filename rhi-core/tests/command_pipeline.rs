//! End-to-end exercise of the command-recording pipeline (spec §3/§4):
//! build a device, a minimal render pipeline, and a color target, then
//! record one render pass and check both the resulting command stream and
//! its acquired resource usage.

use std::sync::Arc;

use rhi_core::binding_model::PipelineLayoutDescriptor;
use rhi_core::command::{new_block_pool, Command, CommandEncoder, RenderPassColorAttachment, RenderPassDescriptor};
use rhi_core::device::Device;
use rhi_core::pipeline::RenderPipelineDescriptor;
use rhi_hal::null::{NullBackend, NullDevice, NullQueue};
use rhi_types::{
    Color, ColorTargetState, ColorWrites, LoadOp, MultisampleState, PrimitiveTopology, RasterState,
    ShaderSource, ShaderStage, StoreOp, SubresourceRange, AspectSet, BufferUsage, Features, Limits,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsage, TextureViewDescriptor,
};

fn device() -> Arc<Device<NullBackend>> {
    Device::new(NullDevice::default(), NullQueue::new(), Features::empty(), Limits::default())
}

#[test]
fn render_pass_records_draw_and_acquires_attachment_usage() {
    let device = device();

    let vertex_module = device
        .create_shader_module(&rhi_types::ShaderModuleDescriptor {
            label: None,
            source: ShaderSource::Spirv(vec![]),
            entry_points: vec![("vs_main".to_owned(), ShaderStage::Vertex)],
        })
        .unwrap();

    let layout = device
        .create_pipeline_layout(PipelineLayoutDescriptor {
            label: None,
            bind_set_layouts: Vec::new(),
            push_constant_range: None,
        })
        .unwrap();

    let pipeline = device
        .create_render_pipeline(RenderPipelineDescriptor {
            label: None,
            layout,
            vertex_module,
            vertex_entry_point: "vs_main",
            fragment_module: None,
            fragment_entry_point: None,
            vertex_buffers: Vec::new(),
            primitive_topology: PrimitiveTopology::TriangleList,
            raster_state: RasterState::default(),
            multisample: MultisampleState::default(),
            color_targets: vec![ColorTargetState {
                format: TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: ColorWrites::ALL,
            }],
            depth_stencil: None,
        })
        .unwrap();

    let texture = device
        .create_texture(&TextureDescriptor {
            label: None,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })
        .unwrap();
    let view = device
        .create_texture_view(
            &texture,
            &TextureViewDescriptor {
                label: None,
                format: None,
                dimension: None,
                range: SubresourceRange {
                    aspects: AspectSet::Color,
                    base_mip: 0,
                    level_count: 1,
                    base_layer: 0,
                    layer_count: 1,
                },
                usage: None,
            },
        )
        .unwrap();

    let pool = new_block_pool::<NullBackend>();
    let mut encoder = CommandEncoder::new("test encoder", pool);

    let mut pass = encoder.begin_render_pass(RenderPassDescriptor {
        label: "color pass".to_owned(),
        color_attachments: vec![RenderPassColorAttachment {
            view: view.clone(),
            resolve_target: None,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: Color::default(),
        }],
        depth_stencil_attachment: None,
    });
    pass.set_pipeline(&pipeline);
    pass.draw(3, 1, 0, 0);
    pass.end();

    let list = encoder.finish();
    let commands: Vec<_> = list.into_commands().collect();

    assert!(matches!(commands[0], Command::BeginRenderPass(_)));
    assert!(matches!(commands[1], Command::SetRenderPipeline(_)));
    assert!(matches!(commands[2], Command::Draw { vertex_count: 3, .. }));
    assert!(matches!(commands[3], Command::EndRenderPass));
    assert_eq!(commands.len(), 4);

    assert_eq!(list.resource_usage.render_pass_usages.len(), 1);
    let usage = &list.resource_usage.render_pass_usages[0];
    assert_eq!(usage.textures.len(), 1);
    let (tracked_texture, storage) = &usage.textures[0];
    assert!(Arc::ptr_eq(tracked_texture, &texture));
    assert_eq!(
        storage.get(rhi_types::Aspect::Color, 0, 0).usage,
        TextureUsage::RENDER_ATTACHMENT
    );
}

#[test]
#[should_panic(expected = "RenderPassEncoder dropped without calling `end()`")]
fn dropping_a_render_pass_without_end_is_a_contract_violation() {
    let device = device();
    let pool = new_block_pool::<NullBackend>();
    let mut encoder = CommandEncoder::new("test encoder", pool);

    let texture = device
        .create_texture(&TextureDescriptor {
            label: None,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            width: 8,
            height: 8,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })
        .unwrap();
    let view = device
        .create_texture_view(
            &texture,
            &TextureViewDescriptor {
                label: None,
                format: None,
                dimension: None,
                range: SubresourceRange {
                    aspects: AspectSet::Color,
                    base_mip: 0,
                    level_count: 1,
                    base_layer: 0,
                    layer_count: 1,
                },
                usage: None,
            },
        )
        .unwrap();

    let _pass = encoder.begin_render_pass(RenderPassDescriptor {
        label: "leaked pass".to_owned(),
        color_attachments: vec![RenderPassColorAttachment {
            view,
            resolve_target: None,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_color: Color::default(),
        }],
        depth_stencil_attachment: None,
    });
}

#[test]
fn compute_pass_and_buffer_write_share_one_command_list() {
    let device = device();
    let pool = new_block_pool::<NullBackend>();
    let mut encoder = CommandEncoder::new("test encoder", pool);

    let buffer = device
        .create_buffer(&rhi_types::BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();
    encoder.write_buffer(&buffer, 0, &[1, 2, 3, 4]);

    let mut pass = encoder.begin_compute_pass();
    pass.end();

    let list = encoder.finish();
    let commands: Vec<_> = list.into_commands().collect();
    assert!(matches!(commands[0], Command::WriteBuffer { .. }));
    assert!(matches!(commands[1], Command::BeginComputePass));
    assert!(matches!(commands[2], Command::EndComputePass));
    assert_eq!(commands.len(), 3);
}
