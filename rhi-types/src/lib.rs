//! Backend-independent value types shared across the render hardware
//! interface: usage/stage flags, formats, limits, and the descriptor
//! structs applications fill in to create resources.
//!
//! This crate has no logic beyond small derivations (e.g. aspect sets from
//! a [`TextureFormat`]) and no dependency on the command-recording core in
//! `rhi-core`.

mod descriptor;
mod flags;
mod format;
mod limits;

pub use descriptor::*;
pub use flags::*;
pub use format::*;
pub use limits::*;

/// Sentinel meaning "the rest of the buffer", used in copy/binding size
/// fields.
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Sentinel requesting that a vertex attribute's offset or a vertex
/// buffer's stride be computed automatically from the preceding attributes.
pub const AUTO_COMPUTE: u32 = u32::MAX;

/// Sentinel meaning "every remaining mip level".
pub const MIP_LEVEL_COUNT_UNDEFINED: u32 = u32::MAX;

/// Sentinel meaning "every remaining array layer".
pub const ARRAY_LAYER_COUNT_UNDEFINED: u32 = u32::MAX;

/// Maximum number of color attachments a render pass may bind.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Maximum number of bindings a single [`BindSetLayout`] may declare.
///
/// Concrete adapters may report a lower limit through
/// [`Limits::max_bindings_per_set`]; this is the hard upper bound the data
/// structures are sized for.
pub const MAX_BINDINGS_PER_SET: usize = 128;

/// Maximum number of bind sets a [`PipelineLayout`] may reference.
pub const MAX_BIND_SETS: usize = 8;

/// A label attached to a resource for debugging and error messages.
pub type Label<'a> = Option<std::borrow::Cow<'a, str>>;

pub(crate) trait LabelHelpers<'a> {
    fn borrow_option(&'a self) -> Option<&'a str>;
    fn borrow_or_default(&'a self) -> &'a str;
}

impl<'a> LabelHelpers<'a> for Label<'a> {
    fn borrow_option(&'a self) -> Option<&'a str> {
        self.as_ref().map(|cow| cow.as_ref())
    }

    fn borrow_or_default(&'a self) -> &'a str {
        self.borrow_option().unwrap_or_default()
    }
}
