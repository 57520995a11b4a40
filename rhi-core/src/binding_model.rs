//! Bind set layouts, bind sets, and pipeline layouts (spec §3, §4.3/§4.8).
//!
//! `rhi_types` describes these at the wire level (plain data, no resource
//! handles, so that crate stays independent of `rhi-core`). The `*Descriptor`
//! types here are the core-level counterparts `Device::create_*` actually
//! takes, pairing each entry with the `Arc` handle of the resource it binds
//! — the same split `wgpu-core::binding_model` keeps from `wgpu-types`.

use std::sync::Arc;

use parking_lot::Mutex;
use rhi_hal::Backend;
use rhi_types::{BindSetLayoutEntry, BindingType, Label, PushConstantRange};

use crate::device::Device;
use crate::error::ContractViolation;
use crate::resource::{Buffer, ResourceKind, Sampler, TextureView};

#[derive(Debug)]
pub struct BindSetLayout<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub entries: Vec<BindSetLayoutEntry>,
    pub(crate) raw: Mutex<Option<B::BindSetLayout>>,
}

impl<B: Backend> BindSetLayout<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::BindSetLayout
    }

    pub fn entry(&self, binding: u32) -> Result<&BindSetLayoutEntry, ContractViolation> {
        self.entries
            .iter()
            .find(|e| e.binding == binding)
            .ok_or(ContractViolation::NoSuchBinding { binding })
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for BindSetLayout<B> {
    fn drop(&mut self) {
        self.device.untrack_bind_set_layout(self);
    }
}

/// A resource a [`BindSet`] entry is bound to. The set holds a strong
/// reference so bound resources outlive the set they're bound into (spec
/// §4.3).
#[derive(Debug, Clone)]
pub enum BoundResource<B: Backend> {
    Buffer {
        buffer: Arc<Buffer<B>>,
        offset: u64,
        size: u64,
    },
    TextureView(Arc<TextureView<B>>),
    Sampler(Arc<Sampler<B>>),
}

impl<B: Backend> BoundResource<B> {
    fn matches(&self, ty: BindingType) -> bool {
        match (ty, self) {
            (
                BindingType::UniformBuffer { .. }
                | BindingType::StorageBuffer { .. }
                | BindingType::ReadOnlyStorageBuffer { .. },
                BoundResource::Buffer { .. },
            ) => true,
            (
                BindingType::SampledTexture
                | BindingType::StorageTexture
                | BindingType::ReadOnlyStorageTexture,
                BoundResource::TextureView(_),
            ) => true,
            (BindingType::Sampler, BoundResource::Sampler(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundBindSetEntry<B: Backend> {
    pub binding: u32,
    pub array_element: u32,
    pub resource: BoundResource<B>,
}

/// Core-level bind set entry: identical shape to [`rhi_types::BindSetEntry`]
/// but carrying the actual resource handle instead of a wire-level
/// placeholder.
pub struct BindSetEntryDescriptor<B: Backend> {
    pub binding: u32,
    pub array_element: u32,
    pub resource: BoundResource<B>,
}

pub struct BindSetDescriptor<'a, B: Backend> {
    pub label: Label<'a>,
    pub layout: Arc<BindSetLayout<B>>,
    pub entries: Vec<BindSetEntryDescriptor<B>>,
}

#[derive(Debug)]
pub struct BindSet<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    pub layout: Arc<BindSetLayout<B>>,
    pub entries: Vec<BoundBindSetEntry<B>>,
    pub(crate) raw: Mutex<Option<B::BindSet>>,
}

impl<B: Backend> BindSet<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::BindSet
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for BindSet<B> {
    fn drop(&mut self) {
        self.device.untrack_bind_set(self);
    }
}

/// Contract check: every entry names a binding declared in `layout`, with a
/// resource kind compatible with that binding's declared type (spec §3:
/// "entries reference resources compatible with the layout's declared
/// type").
pub(crate) fn validate_entries_against_layout<B: Backend>(
    layout: &BindSetLayout<B>,
    entries: &[BindSetEntryDescriptor<B>],
) -> Result<(), ContractViolation> {
    for entry in entries {
        let declared = layout.entry(entry.binding)?;
        if !entry.resource.matches(declared.ty) {
            return Err(ContractViolation::Other(format!(
                "binding {} expects {:?}, got an incompatible resource",
                entry.binding, declared.ty
            )));
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct PipelineLayout<B: Backend> {
    pub device: Arc<Device<B>>,
    pub label: String,
    /// Always exactly `MAX_BIND_SETS` long; unused slots hold the device's
    /// empty bind-set-layout singleton (spec §4.8).
    pub bind_set_layouts: Vec<Arc<BindSetLayout<B>>>,
    pub push_constant_range: Option<PushConstantRange>,
    pub(crate) raw: Mutex<Option<B::PipelineLayout>>,
}

impl<B: Backend> PipelineLayout<B> {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::PipelineLayout
    }

    pub fn bind_set_layout(&self, set: u32) -> &Arc<BindSetLayout<B>> {
        &self.bind_set_layouts[set as usize]
    }

    pub(crate) fn destroy_impl(&self) {
        *self.raw.lock() = None;
    }
}

impl<B: Backend> Drop for PipelineLayout<B> {
    fn drop(&mut self) {
        self.device.untrack_pipeline_layout(self);
    }
}

/// Core-level counterpart of [`rhi_types::PipelineLayoutDescriptor`]: unused
/// bind-set slots are `None` and get filled with the device's empty-layout
/// singleton by `Device::create_pipeline_layout`.
pub struct PipelineLayoutDescriptor<'a, B: Backend> {
    pub label: Label<'a>,
    pub bind_set_layouts: Vec<Option<Arc<BindSetLayout<B>>>>,
    pub push_constant_range: Option<PushConstantRange>,
}
