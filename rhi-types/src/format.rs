/// A single plane/channel grouping of a texture's subresources.
///
/// Spec §3: "Derives the aspect set from format: Color, Depth, Stencil,
/// Depth|Stencil, or Plane0..Plane2."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    Color,
    Depth,
    Stencil,
    Plane0,
    Plane1,
    Plane2,
}

impl Aspect {
    /// The index this aspect occupies in a per-aspect array.
    ///
    /// Spec §3: "Color/Depth/Plane0 -> 0, Stencil/Plane1 -> 1, Plane2 -> 2."
    pub const fn index(self) -> usize {
        match self {
            Aspect::Color | Aspect::Depth | Aspect::Plane0 => 0,
            Aspect::Stencil | Aspect::Plane1 => 1,
            Aspect::Plane2 => 2,
        }
    }
}

/// The set of aspects a texture format decomposes into, in index order.
///
/// Depth-stencil formats always reserve two slots (depth at index 0,
/// stencil at index 1) even if only one channel is queried individually,
/// per spec §3: "Depth|Stencil counts as 2 aspects even when only stencil
/// is present (depth slot reserved)."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectSet {
    Color,
    Depth,
    Stencil,
    DepthStencil,
    Planar(u8),
}

impl AspectSet {
    /// Number of aspect slots this set occupies.
    pub const fn len(self) -> usize {
        match self {
            AspectSet::Color | AspectSet::Depth | AspectSet::Stencil => 1,
            AspectSet::DepthStencil => 2,
            AspectSet::Planar(n) => n as usize,
        }
    }

    pub const fn is_empty(self) -> bool {
        false
    }

    pub fn contains(self, aspect: Aspect) -> bool {
        match (self, aspect) {
            (AspectSet::Color, Aspect::Color) => true,
            (AspectSet::Depth, Aspect::Depth) => true,
            (AspectSet::Stencil, Aspect::Stencil) => true,
            (AspectSet::DepthStencil, Aspect::Depth | Aspect::Stencil) => true,
            (AspectSet::Planar(n), Aspect::Plane0) => n >= 1,
            (AspectSet::Planar(n), Aspect::Plane1) => n >= 2,
            (AspectSet::Planar(n), Aspect::Plane2) => n >= 3,
            _ => false,
        }
    }

    /// Iterate the aspects in index order.
    pub fn iter(self) -> impl Iterator<Item = Aspect> {
        let aspects: &'static [Aspect] = match self {
            AspectSet::Color => &[Aspect::Color],
            AspectSet::Depth => &[Aspect::Depth],
            AspectSet::Stencil => &[Aspect::Stencil],
            AspectSet::DepthStencil => &[Aspect::Depth, Aspect::Stencil],
            AspectSet::Planar(1) => &[Aspect::Plane0],
            AspectSet::Planar(2) => &[Aspect::Plane0, Aspect::Plane1],
            AspectSet::Planar(_) => &[Aspect::Plane0, Aspect::Plane1, Aspect::Plane2],
        };
        aspects.iter().copied()
    }
}

/// Supported texture pixel formats.
///
/// Only the subset needed to derive aspect sets, block size, and component
/// counts is modeled; this is not a full format database (that lives
/// outside the scope of this spec's core).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    Stencil8,
    Nv12,
}

impl TextureFormat {
    /// The aspect decomposition used by [`crate::SubresourceRange`] and the
    /// subresource storage compression scheme.
    pub const fn aspects(self) -> AspectSet {
        match self {
            TextureFormat::Depth32Float => AspectSet::Depth,
            TextureFormat::Stencil8 => AspectSet::Stencil,
            TextureFormat::Depth24PlusStencil8 => AspectSet::DepthStencil,
            TextureFormat::Nv12 => AspectSet::Planar(2),
            _ => AspectSet::Color,
        }
    }

    /// Bytes occupied by one texel block of this format (1x1 for every
    /// format modeled here; no block-compressed formats in this port).
    pub const fn block_size(self) -> u32 {
        match self {
            TextureFormat::R8Unorm | TextureFormat::Stencil8 => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Nv12 => 1,
        }
    }

    pub const fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Stencil8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_stencil_reserves_two_slots_even_with_only_stencil() {
        let set = TextureFormat::Depth24PlusStencil8.aspects();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Aspect::Depth));
        assert!(set.contains(Aspect::Stencil));
    }

    #[test]
    fn color_format_is_single_aspect() {
        let set = TextureFormat::Rgba8Unorm.aspects();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Aspect::Color]);
    }

    #[test]
    fn planar_format_has_two_planes() {
        let set = TextureFormat::Nv12.aspects();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Aspect::Plane0));
        assert!(set.contains(Aspect::Plane1));
        assert!(!set.contains(Aspect::Plane2));
    }
}
