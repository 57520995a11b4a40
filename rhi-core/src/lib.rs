//! `rhi-core`: the backend-agnostic device-side logic of a Render Hardware
//! Interface — resource lifetime, command recording, subresource usage
//! tracking, and serial-based completion sequencing (spec §0).
//!
//! Grounded on `wgpu-core`'s split between wire-level types (`rhi-types`,
//! analogous to `wgpu-types`), a trait-only hal contract (`rhi-hal`,
//! analogous to `wgpu-hal`), and this crate, which owns the actual `Device`,
//! resource structs, and command encoding state machines.

pub mod binding_model;
pub mod command;
pub mod device;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod queue;
pub mod resource;
pub mod serial;
pub mod subresource;
pub mod track;

pub use device::Device;
pub use error::{ContractViolation, CoreError, MapStatus};
pub use instance::{Adapter, Instance};
pub use serial::Serial;

pub(crate) type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub(crate) type FastHashSet<T> = rustc_hash::FxHashSet<T>;

/// Debug labels are optional everywhere (spec §3); this is the single place
/// that turns `Option<Cow<str>>` into an owned display string for storage on
/// a resource struct.
pub(crate) fn label_to_string(label: &rhi_types::Label<'_>) -> String {
    label.as_deref().unwrap_or("").to_owned()
}
