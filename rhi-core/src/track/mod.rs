//! `SyncScopeUsageTracker` (spec §4.3): per-pass aggregation of how every
//! buffer/texture subresource is used, so the backend can derive exactly
//! one barrier per (resource, subresource) between consecutive sync scopes
//! instead of recomputing transitions per command.

use std::sync::Arc;

use rhi_hal::Backend;
use rhi_types::{BindingType, BufferUsage, ShaderStages, SubresourceRange, TextureUsage};

use crate::binding_model::{BindSet, BoundResource};
use crate::resource::{Buffer, Texture, TextureView};
use crate::subresource::SubresourceStorage;
use crate::FastHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSyncInfo {
    pub usage: BufferUsage,
    pub stages: ShaderStages,
}

impl Default for BufferSyncInfo {
    fn default() -> Self {
        Self {
            usage: BufferUsage::empty(),
            stages: ShaderStages::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSyncInfo {
    pub usage: TextureUsage,
    pub stages: ShaderStages,
}

impl Default for TextureSyncInfo {
    fn default() -> Self {
        Self {
            usage: TextureUsage::empty(),
            stages: ShaderStages::empty(),
        }
    }
}

/// The immutable snapshot handed to the backend once a pass ends (spec
/// §4.3's `AcquireSyncScopeUsage`).
#[derive(Debug)]
pub struct SyncScopeResourceUsage<B: Backend> {
    pub buffers: Vec<(Arc<Buffer<B>>, BufferSyncInfo)>,
    pub textures: Vec<(Arc<Texture<B>>, SubresourceStorage<TextureSyncInfo>)>,
}

/// Built up over the lifetime of one render/compute pass, then drained by
/// [`SyncScopeUsageTracker::acquire_sync_scope_usage`] at `End()`.
pub struct SyncScopeUsageTracker<B: Backend> {
    buffers: FastHashMap<usize, (Arc<Buffer<B>>, BufferSyncInfo)>,
    textures: FastHashMap<usize, (Arc<Texture<B>>, SubresourceStorage<TextureSyncInfo>)>,
}

impl<B: Backend> Default for SyncScopeUsageTracker<B> {
    fn default() -> Self {
        Self {
            buffers: FastHashMap::default(),
            textures: FastHashMap::default(),
        }
    }
}

fn buffer_key<B: Backend>(buffer: &Arc<Buffer<B>>) -> usize {
    Arc::as_ptr(buffer) as usize
}

fn texture_key<B: Backend>(texture: &Arc<Texture<B>>) -> usize {
    Arc::as_ptr(texture) as usize
}

impl<B: Backend> SyncScopeUsageTracker<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec §4.3: `BufferUsedAs` — OR-merges `usage`/`stages` into whatever
    /// was already recorded for `buffer` in this scope.
    pub fn buffer_used_as(&mut self, buffer: &Arc<Buffer<B>>, usage: BufferUsage, stages: ShaderStages) {
        let entry = self
            .buffers
            .entry(buffer_key(buffer))
            .or_insert_with(|| (buffer.clone(), BufferSyncInfo::default()));
        entry.1.usage |= usage;
        entry.1.stages |= stages;
    }

    /// Spec §4.3: `TextureRangeUsedAs` — unions `usage`/`stages` onto every
    /// subresource cell `range` intersects.
    pub fn texture_range_used_as(
        &mut self,
        texture: &Arc<Texture<B>>,
        range: &SubresourceRange,
        usage: TextureUsage,
        stages: ShaderStages,
    ) {
        let entry = self.textures.entry(texture_key(texture)).or_insert_with(|| {
            let storage = SubresourceStorage::new(
                texture.aspects(),
                texture.mip_level_count,
                texture.layer_count(),
                TextureSyncInfo::default(),
            );
            (texture.clone(), storage)
        });
        entry.1.update(range, |info| {
            info.usage |= usage;
            info.stages |= stages;
        });
    }

    /// Spec §4.3: `TextureViewUsedAs` — delegates using the view's own
    /// subresource range against its parent texture.
    pub fn texture_view_used_as(&mut self, view: &Arc<TextureView<B>>, usage: TextureUsage, stages: ShaderStages) {
        self.texture_range_used_as(&view.parent, &view.range, usage, stages);
    }

    /// Spec §4.3: `AddBindSet` — for every bound entry, selects the usage
    /// bit to OR in from the layout's declared binding type; samplers
    /// contribute no usage.
    pub fn add_bind_set(&mut self, bind_set: &BindSet<B>) {
        for entry in &bind_set.entries {
            let Ok(declared) = bind_set.layout.entry(entry.binding) else {
                continue;
            };
            match (&entry.resource, declared.ty) {
                (BoundResource::Buffer { buffer, .. }, BindingType::UniformBuffer { .. }) => {
                    self.buffer_used_as(buffer, BufferUsage::UNIFORM, declared.visibility);
                }
                (BoundResource::Buffer { buffer, .. }, BindingType::StorageBuffer { .. }) => {
                    self.buffer_used_as(buffer, BufferUsage::STORAGE, declared.visibility);
                }
                (BoundResource::Buffer { buffer, .. }, BindingType::ReadOnlyStorageBuffer { .. }) => {
                    self.buffer_used_as(buffer, BufferUsage::READ_ONLY_STORAGE, declared.visibility);
                }
                (BoundResource::TextureView(view), BindingType::SampledTexture) => {
                    self.texture_view_used_as(view, TextureUsage::SAMPLED, declared.visibility);
                }
                (BoundResource::TextureView(view), BindingType::StorageTexture) => {
                    self.texture_view_used_as(view, TextureUsage::STORAGE, declared.visibility);
                }
                (BoundResource::TextureView(view), BindingType::ReadOnlyStorageTexture) => {
                    self.texture_view_used_as(view, TextureUsage::READ_ONLY_STORAGE, declared.visibility);
                }
                (BoundResource::Sampler(_), BindingType::Sampler) => {}
                _ => {}
            }
        }
    }

    /// Spec §4.3: `AcquireSyncScopeUsage` — moves the accumulated maps into
    /// parallel vectors and resets this tracker for the next pass.
    pub fn acquire_sync_scope_usage(&mut self) -> SyncScopeResourceUsage<B> {
        let buffers = std::mem::take(&mut self.buffers).into_values().collect();
        let textures = std::mem::take(&mut self.textures).into_values().collect();
        SyncScopeResourceUsage { buffers, textures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_hal::null::{NullBackend, NullDevice};
    use rhi_types::{AspectSet, BufferDescriptor, TextureDescriptor, TextureDimension, TextureFormat};
    use std::sync::Arc as StdArc;

    fn device() -> StdArc<crate::device::Device<NullBackend>> {
        crate::device::Device::new(
            NullDevice::default(),
            rhi_hal::null::NullQueue::new(),
            Default::default(),
            Default::default(),
        )
    }

    #[test]
    fn buffer_usages_union_across_calls() {
        let device = device();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 256,
                usage: BufferUsage::UNIFORM | BufferUsage::STORAGE,
                mapped_at_creation: false,
            })
            .unwrap();

        let mut tracker = SyncScopeUsageTracker::<NullBackend>::new();
        tracker.buffer_used_as(&buffer, BufferUsage::UNIFORM, ShaderStages::VERTEX);
        tracker.buffer_used_as(&buffer, BufferUsage::STORAGE, ShaderStages::FRAGMENT);

        let usage = tracker.acquire_sync_scope_usage();
        assert_eq!(usage.buffers.len(), 1);
        let (_, info) = &usage.buffers[0];
        assert_eq!(info.usage, BufferUsage::UNIFORM | BufferUsage::STORAGE);
        assert_eq!(info.stages, ShaderStages::VERTEX | ShaderStages::FRAGMENT);
    }

    #[test]
    fn texture_range_usage_is_merged_per_subresource() {
        let device = device();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: None,
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8Unorm,
                width: 64,
                height: 64,
                depth_or_array_layers: 2,
                mip_level_count: 1,
                sample_count: 1,
                usage: TextureUsage::SAMPLED,
            })
            .unwrap();

        let mut tracker = SyncScopeUsageTracker::<NullBackend>::new();
        let whole = SubresourceRange {
            aspects: AspectSet::Color,
            base_mip: 0,
            level_count: 1,
            base_layer: 0,
            layer_count: 2,
        };
        tracker.texture_range_used_as(&texture, &whole, TextureUsage::SAMPLED, ShaderStages::FRAGMENT);

        let usage = tracker.acquire_sync_scope_usage();
        assert_eq!(usage.textures.len(), 1);
        let (_, storage) = &usage.textures[0];
        assert_eq!(
            storage.get(rhi_types::Aspect::Color, 0, 0).usage,
            TextureUsage::SAMPLED
        );
    }

    #[test]
    fn acquire_resets_the_tracker() {
        let device = device();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 16,
                usage: BufferUsage::UNIFORM,
                mapped_at_creation: false,
            })
            .unwrap();
        let mut tracker = SyncScopeUsageTracker::<NullBackend>::new();
        tracker.buffer_used_as(&buffer, BufferUsage::UNIFORM, ShaderStages::VERTEX);
        tracker.acquire_sync_scope_usage();
        let empty = tracker.acquire_sync_scope_usage();
        assert!(empty.buffers.is_empty());
        assert!(empty.textures.is_empty());
    }
}
