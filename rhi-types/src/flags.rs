use bitflags::bitflags;

bitflags! {
    /// Declared usage of a [`crate::Buffer`].
    ///
    /// A buffer may only be used in ways declared here; using it otherwise
    /// is a contract violation (spec §3, Buffer invariant).
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const MAP_READ      = 1 << 0;
        const MAP_WRITE     = 1 << 1;
        const COPY_SRC      = 1 << 2;
        const COPY_DST      = 1 << 3;
        const INDEX         = 1 << 4;
        const VERTEX        = 1 << 5;
        const UNIFORM       = 1 << 6;
        const STORAGE       = 1 << 7;
        const INDIRECT      = 1 << 8;
        /// Implicitly added to `STORAGE` buffers that are only ever read in
        /// shaders; see spec §3 "Storage usage implicitly adds a
        /// read-only-storage aspect".
        const READ_ONLY_STORAGE = 1 << 9;
    }
}

bitflags! {
    /// Declared usage of a [`crate::Texture`].
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC          = 1 << 0;
        const COPY_DST          = 1 << 1;
        const SAMPLED           = 1 << 2;
        const STORAGE           = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
        const READ_ONLY_STORAGE = 1 << 5;
    }
}

bitflags! {
    /// The union of shader stages a binding or push-constant range is
    /// visible to.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
    }
}

bitflags! {
    /// Per-channel write mask for a color attachment's blend state.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

bitflags! {
    /// Closed set of optional device features, gated by
    /// `Adapter::request_device`. Mirrors spec §4.9's "closed enum" feature
    /// bitset.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u64 {
        const SHADER_INT16                 = 1 << 0;
        const SAMPLE_RATE_SHADING          = 1 << 1;
        const SAMPLER_ANISOTROPY           = 1 << 2;
        const TEXTURE_COMPRESSION_BC       = 1 << 3;
        const TEXTURE_COMPRESSION_ETC2     = 1 << 4;
        const TEXTURE_COMPRESSION_ASTC     = 1 << 5;
        const GEOMETRY_SHADER              = 1 << 6;
        const TESSELLATION_SHADER          = 1 << 7;
        const MULTI_VIEWPORT               = 1 << 8;
        const MULTI_DRAW_INDIRECT          = 1 << 9;
        const DEPTH_BIAS_CLAMP             = 1 << 10;
        const DEPTH_CLAMP                  = 1 << 11;
        const R8_UNORM_STORAGE             = 1 << 12;
    }
}

bitflags! {
    /// Backend selector, used by [`crate::Backends`]-filtered adapter
    /// enumeration.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Backends: u32 {
        const VULKAN = 1 << 0;
        const METAL  = 1 << 1;
        const DX12   = 1 << 2;
        const GL     = 1 << 3;
    }
}

impl Backends {
    pub const fn all_backends() -> Self {
        Self::from_bits_truncate(
            Self::VULKAN.bits() | Self::METAL.bits() | Self::DX12.bits() | Self::GL.bits(),
        )
    }
}

/// Requested access mode for [`crate::MapBufferAsyncDescriptor`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    Read,
    Write,
}

/// The adapter vendor/driver classification reported in [`crate::AdapterInfo`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    DiscreteGpu,
    IntegratedGpu,
    Cpu,
    VirtualGpu,
    Other,
}
