use crate::{
    Aspect, AspectSet, BufferUsage, ColorWrites, Features, Label, ShaderStages, TextureFormat,
    TextureUsage, ARRAY_LAYER_COUNT_UNDEFINED, MIP_LEVEL_COUNT_UNDEFINED,
};

/// `{aspects, baseLayer, layerCount, baseMip, levelCount}` from spec §3.
///
/// Identifies a rectangular range of `(aspect, mip, layer)` cells within a
/// texture. Used both as a view's coverage and as the argument to
/// `SubresourceStorage::Update`/usage-tracker calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceRange {
    pub aspects: AspectSet,
    pub base_mip: u32,
    pub level_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl SubresourceRange {
    /// A range covering a single `(aspect, mip, layer)` cell.
    pub fn single(aspect: Aspect, mip: u32, layer: u32) -> Self {
        let aspects = match aspect {
            Aspect::Color => AspectSet::Color,
            Aspect::Depth => AspectSet::Depth,
            Aspect::Stencil => AspectSet::Stencil,
            Aspect::Plane0 => AspectSet::Planar(1),
            Aspect::Plane1 => AspectSet::Planar(2),
            Aspect::Plane2 => AspectSet::Planar(3),
        };
        Self {
            aspects,
            base_mip: mip,
            level_count: 1,
            base_layer: layer,
            layer_count: 1,
        }
    }

    /// A range covering every subresource of `format` across `mip_count`
    /// and `layer_count`.
    pub fn full_texture(format: TextureFormat, mip_count: u32, layer_count: u32) -> Self {
        Self {
            aspects: format.aspects(),
            base_mip: 0,
            level_count: mip_count,
            base_layer: 0,
            layer_count,
        }
    }

    /// Resolve `MIP_LEVEL_COUNT_UNDEFINED`/`ARRAY_LAYER_COUNT_UNDEFINED`
    /// sentinels against the owning texture's extents.
    pub fn resolved(
        mut self,
        texture_mip_count: u32,
        texture_layer_count: u32,
    ) -> SubresourceRange {
        if self.level_count == MIP_LEVEL_COUNT_UNDEFINED {
            self.level_count = texture_mip_count.saturating_sub(self.base_mip);
        }
        if self.layer_count == ARRAY_LAYER_COUNT_UNDEFINED {
            self.layer_count = texture_layer_count.saturating_sub(self.base_layer);
        }
        self
    }

    pub fn mip_range(&self) -> std::ops::Range<u32> {
        self.base_mip..(self.base_mip + self.level_count)
    }

    pub fn layer_range(&self) -> std::ops::Range<u32> {
        self.base_layer..(self.base_layer + self.layer_count)
    }

    /// Whether this range is within the bounds of a texture with the given
    /// extents and aspect set (spec §3: "ranges within parent extents").
    pub fn is_within(&self, parent_aspects: AspectSet, mip_count: u32, layer_count: u32) -> bool {
        self.aspects.iter().all(|a| parent_aspects.contains(a))
            && self.base_mip + self.level_count <= mip_count
            && self.base_layer + self.layer_count <= layer_count
    }
}

/// Spec §4.9: `Adapter::CreateDevice(desc)` applies this closed-enum
/// feature bitset; `required_features` not in `Adapter::supported_features`
/// rejects the request.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor<'a> {
    pub label: Label<'a>,
    pub required_features: Features,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    pub label: Label<'a>,
    pub size: u64,
    pub usage: BufferUsage,
    pub mapped_at_creation: bool,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: Label<'a>,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array layer count for 2D array textures.
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewDimension {
    D1,
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

#[derive(Debug, Clone)]
pub struct TextureViewDescriptor<'a> {
    pub label: Label<'a>,
    pub format: Option<TextureFormat>,
    pub dimension: Option<TextureViewDimension>,
    pub range: SubresourceRange,
    /// Defaults to the parent texture's usage when `None`, per spec §3.
    pub usage: Option<TextureUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone)]
pub struct SamplerDescriptor<'a> {
    pub label: Label<'a>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
}

impl Default for SamplerDescriptor<'static> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            max_anisotropy: 1,
        }
    }
}

/// A single binding slot within a [`BindSetLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    UniformBuffer { has_dynamic_offset: bool },
    StorageBuffer { has_dynamic_offset: bool },
    ReadOnlyStorageBuffer { has_dynamic_offset: bool },
    SampledTexture,
    StorageTexture,
    ReadOnlyStorageTexture,
    Sampler,
}

#[derive(Debug, Clone, Copy)]
pub struct BindSetLayoutEntry {
    pub binding: u32,
    pub ty: BindingType,
    pub visibility: ShaderStages,
}

#[derive(Debug, Clone)]
pub struct BindSetLayoutDescriptor<'a> {
    pub label: Label<'a>,
    pub entries: Vec<BindSetLayoutEntry>,
}

#[derive(Debug, Clone)]
pub struct BufferBinding {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub enum BindingResource {
    Buffer(BufferBinding),
    TextureView,
    Sampler,
}

#[derive(Debug, Clone)]
pub struct BindSetEntry {
    pub binding: u32,
    pub array_element: u32,
    pub resource: BindingResource,
}

#[derive(Debug, Clone)]
pub struct BindSetDescriptor<'a> {
    pub label: Label<'a>,
    pub entries: Vec<BindSetEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    pub visibility: ShaderStages,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    pub label: Label<'a>,
    /// Indexed by bind-set slot; `None` entries are filled with the
    /// device's empty-layout singleton (spec §4.8).
    pub bind_set_layouts: Vec<Option<()>>,
    pub push_constant_range: Option<PushConstantRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x4,
}

impl VertexFormat {
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 => 4,
            VertexFormat::Float32x2 | VertexFormat::Uint32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 | VertexFormat::Uint32x4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    /// `AUTO_COMPUTE` resolves to immediately after the previous attribute.
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStepMode {
    Vertex,
    Instance,
}

#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    /// `AUTO_COMPUTE` resolves to the tightly-packed sum of attribute sizes.
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

#[derive(Debug, Clone, Copy)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_scale: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RasterState {
    pub cull_mode: CullMode,
    pub front_face_ccw: bool,
    pub depth_clamp: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::None,
            front_face_ccw: true,
            depth_clamp: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MultisampleState {
    pub count: u32,
    pub mask: u64,
    pub alpha_to_coverage_enabled: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}

/// Compiled-but-backend-opaque shader bytecode. Shader *compilation* is out
/// of scope; this carries an already-compiled module plus the reflected
/// entry-point table needed to validate pipeline stage wiring.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    Spirv(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    pub label: Label<'a>,
    pub source: ShaderSource,
    pub entry_points: Vec<(String, ShaderStage)>,
}

#[derive(Debug, Clone)]
pub struct ProgrammableStage<'a> {
    pub entry_point: Label<'a>,
    /// Raw specialization-constant payload, one `u32` per constant id in
    /// ascending id order (backend-specific encoding out of scope).
    pub specialization_constants: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: Label<'a>,
    pub vertex_stage: ProgrammableStage<'a>,
    pub fragment_stage: Option<ProgrammableStage<'a>>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub primitive_topology: PrimitiveTopology,
    pub raster_state: RasterState,
    pub multisample: MultisampleState,
    pub color_targets: Vec<ColorTargetState>,
    pub depth_stencil: Option<DepthStencilState>,
    pub patch_control_points: u32,
    pub viewport_count: u32,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: Label<'a>,
    pub compute_stage: ProgrammableStage<'a>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}
