//! `Queue`: submission, serial advancement, staged uploads, and buffer-map
//! scheduling (spec §4.5, §4.6, §4.7).

mod staging;
pub mod task;

use std::sync::Arc;

use parking_lot::Mutex;
use rhi_hal::{Backend, Device as HalDevice, DeviceError, MappableBuffer, Queue as HalQueue};
use rhi_types::{align_up, BufferUsage, MapMode};

use crate::error::{CoreError, MapStatus};
use crate::resource::{Buffer, BufferMapState, Texture};
use crate::serial::{AtomicSerialPair, Serial, SerialMap};
use task::{CallbackTaskManager, Task};

pub use staging::{UploadAllocator, RING_BUFFER_SIZE};

struct PendingMapRequest<B: Backend> {
    buffer: Arc<Buffer<B>>,
    mode: MapMode,
    callback: Box<dyn FnOnce(MapStatus) + Send>,
}

#[derive(Debug)]
pub struct Queue<B: Backend> {
    raw: B::Queue,
    serials: AtomicSerialPair,
    tasks: CallbackTaskManager,
    staging: Mutex<UploadAllocator<B>>,
    pending_maps: Mutex<SerialMap<PendingMapRequest<B>>>,
}

impl<B: Backend> std::fmt::Debug for PendingMapRequest<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingMapRequest")
            .field("buffer", &self.buffer.label)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<B: Backend> Queue<B> {
    pub(crate) fn new(raw: B::Queue) -> Self {
        Self {
            raw,
            serials: AtomicSerialPair::default(),
            tasks: CallbackTaskManager::new(),
            staging: Mutex::new(UploadAllocator::new()),
            pending_maps: Mutex::new(SerialMap::new()),
        }
    }

    pub fn tasks(&self) -> &CallbackTaskManager {
        &self.tasks
    }

    pub fn completed_serial(&self) -> Serial {
        self.serials.completed()
    }

    pub fn last_submitted_serial(&self) -> Serial {
        self.serials.last_submitted()
    }

    pub fn needs_tick(&self) -> bool {
        self.serials.completed() < self.serials.last_submitted()
            || self.tasks.pending_count() > 0
    }

    /// Submit finished command lists, bumping the timeline and recording
    /// `pending_submit` as the last-usage serial of every resource they
    /// reference (spec §4.5).
    pub fn submit(
        &self,
        command_lists: Vec<B::CommandList>,
        buffers_used: &[Arc<Buffer<B>>],
        textures_used: &[Arc<Texture<B>>],
    ) -> Result<Serial, CoreError> {
        let pending = self.serials.pending_submit();
        let reported = self
            .raw
            .submit(&command_lists, pending)
            .map_err(CoreError::Device)?;
        debug_assert_eq!(reported, pending, "backend must echo back the pending serial");
        self.serials.advance_last_submitted();

        for buffer in buffers_used {
            buffer.record_usage_at(pending);
        }
        for texture in textures_used {
            texture.record_usage_at(pending);
        }
        Ok(pending)
    }

    /// Poll the backend's completed serial, advance the timeline, release
    /// staging allocations and promote ready map requests, and flush
    /// callbacks (spec §4.5/§4.6/§4.7). This is what `Device::tick_all_queues`
    /// calls per queue.
    pub fn tick(&self, hal_device: &B::Device) -> Result<(), CoreError> {
        let reported = self.raw.query_completed_serial();
        let completed = self.serials.bump_completed_to(reported);
        self.raw.tick(completed).map_err(CoreError::Device)?;
        self.staging.lock().reclaim(completed);

        let ready = self.pending_maps.lock().drain_up_to(completed);
        for request in ready {
            self.resolve_map(hal_device, request);
        }

        self.tasks.flush();
        Ok(())
    }

    fn resolve_map(&self, hal_device: &B::Device, request: PendingMapRequest<B>) {
        let PendingMapRequest { buffer, mode, callback } = request;
        let status = {
            let raw = buffer.raw.lock();
            match raw.as_ref() {
                Some(raw) => match hal_device.map_async(raw, mode, 0, buffer.size) {
                    Ok(()) => {
                        *buffer.map_state.lock() = BufferMapState::Mapped { mode };
                        MapStatus::Success
                    }
                    Err(_) => MapStatus::None,
                },
                None => MapStatus::DestroyedBeforeCallback,
            }
        };
        self.tasks.enqueue(Task::BufferMap { status, callback });
    }

    /// Schedule `callback` to run once `buffer`'s last recorded usage has
    /// completed on the GPU (spec §4.5's async map sequence). Resolves
    /// synchronously if that has already happened.
    pub fn request_map(
        &self,
        hal_device: &B::Device,
        buffer: Arc<Buffer<B>>,
        mode: MapMode,
        callback: Box<dyn FnOnce(MapStatus) + Send>,
    ) {
        let wait_serial = buffer.last_usage_serial();
        if wait_serial <= self.completed_serial() {
            self.resolve_map(hal_device, PendingMapRequest { buffer, mode, callback });
        } else {
            self.pending_maps
                .lock()
                .push(wait_serial, PendingMapRequest { buffer, mode, callback });
        }
    }

    pub fn write_buffer(
        &self,
        hal_device: &B::Device,
        dst: &Arc<Buffer<B>>,
        dst_offset: u64,
        data: &[u8],
    ) -> Result<(), CoreError> {
        dst.require_usage(BufferUsage::COPY_DST)
            .unwrap_or_else(|v| crate::error::fatal(v));

        let serial = self.serials.pending_submit();
        let mut staging = self.staging.lock();
        // Buffer uploads align to 4 bytes (`original_source`'s `APIWriteBuffer`).
        let alloc = staging.allocate(hal_device, data.len() as u64, serial, 4)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), alloc.mapped_ptr, data.len());
        }
        let dst_raw = dst.raw.lock();
        let dst_raw = dst_raw.as_ref().expect("write_buffer on destroyed buffer");
        self.raw.copy_from_staging_to_buffer(
            alloc.staging_buffer,
            alloc.staging_offset,
            dst_raw,
            dst_offset,
            data.len() as u64,
        );
        self.raw.mark_recording_context_is_used();
        dst.record_usage_at(serial);
        Ok(())
    }

    /// Spec §4.5: the caller's `data` is laid out with its own
    /// `bytes_per_row`/`rows_per_image` pitch, which generally doesn't match
    /// what the backend requires of a staging buffer. Ported from
    /// `original_source`'s `ComputeRequiredBytesInCopy`/`CopyTextureData`/
    /// `APIWriteTexture`: re-pack the caller's rows into a staging
    /// allocation laid out at the backend's required alignment, then drive
    /// the staging-to-texture copy off that aligned layout rather than the
    /// caller's original one.
    #[allow(clippy::too_many_arguments)]
    pub fn write_texture(
        &self,
        hal_device: &B::Device,
        dst: &Arc<Texture<B>>,
        bytes_per_row: u32,
        rows_per_image: u32,
        width: u32,
        height: u32,
        depth_or_layers: u32,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let block_size = u64::from(dst.format.block_size());
        let unaligned_bytes_per_row = u64::from(width) * block_size;
        let aligned_bytes_per_row = align_up(
            unaligned_bytes_per_row,
            u64::from(hal_device.optimal_bytes_per_row_alignment()),
        );
        let aligned_rows_per_image = u64::from(height);
        let offset_alignment = u64::from(hal_device.optimal_buffer_to_texture_copy_offset_alignment())
            .max(block_size);
        let required_bytes_in_copy = compute_required_bytes_in_copy(
            aligned_bytes_per_row,
            aligned_rows_per_image,
            unaligned_bytes_per_row,
            u64::from(height),
            u64::from(depth_or_layers),
        );

        let serial = self.serials.pending_submit();
        let mut staging = self.staging.lock();
        let alloc = staging
            .allocate(hal_device, required_bytes_in_copy, serial, offset_alignment)
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        unsafe {
            copy_texture_rows(
                data.as_ptr(),
                u64::from(bytes_per_row),
                u64::from(rows_per_image),
                alloc.mapped_ptr,
                aligned_bytes_per_row,
                aligned_rows_per_image,
                unaligned_bytes_per_row,
                u64::from(height),
                u64::from(depth_or_layers),
            );
        }
        let dst_raw = dst.raw.lock();
        let dst_raw = dst_raw.as_ref().expect("write_texture on destroyed texture");
        self.raw.copy_from_staging_to_texture(
            alloc.staging_buffer,
            alloc.staging_offset,
            dst_raw,
            aligned_bytes_per_row as u32,
            aligned_rows_per_image as u32,
            width,
            height,
            depth_or_layers,
        );
        self.raw.mark_recording_context_is_used();
        dst.record_usage_at(serial);
        Ok(())
    }

    pub fn on_submitted_work_done(&self, callback: impl FnOnce() + Send + 'static) {
        self.tasks.enqueue(Task::SubmittedWorkDone {
            callback: Box::new(callback),
        });
    }
}

/// Port of `original_source`'s `ComputeRequiredBytesInCopy`: the size of a
/// tightly-packed-except-for-pitch staging region big enough to hold
/// `depth_or_layers` images of `height` aligned rows each, where only the
/// very last row of the very last image needs its unpadded width (every
/// other row needs the full aligned pitch so the next row/image starts at
/// the right offset).
fn compute_required_bytes_in_copy(
    aligned_bytes_per_row: u64,
    aligned_rows_per_image: u64,
    unaligned_bytes_per_row: u64,
    height: u64,
    depth_or_layers: u64,
) -> u64 {
    if depth_or_layers == 0 || height == 0 {
        return 0;
    }
    let bytes_per_image = aligned_bytes_per_row * aligned_rows_per_image;
    let mut required = bytes_per_image * (depth_or_layers - 1);
    required += aligned_bytes_per_row * (height - 1) + unaligned_bytes_per_row;
    required
}

/// Port of `original_source`'s `CopyTextureData`: re-lay the caller's
/// `src` rows (pitch `src_bytes_per_row`, `src_rows_per_image` rows between
/// images) into `dst` at the staging pitch (`dst_bytes_per_row`,
/// `dst_rows_per_image`). Picks the cheapest copy shape that's still
/// correct: one `memcpy` when both pitches already agree and images are
/// back-to-back, one `memcpy` per image when only the row pitch agrees,
/// and a row-by-row copy otherwise.
///
/// # Safety
/// `src` must be valid to read `src_bytes_per_row * src_rows_per_image *
/// depth_or_layers` bytes from (the minimum a correctly-described source
/// slice provides), and `dst` must be valid to write
/// `dst_bytes_per_row * dst_rows_per_image * depth_or_layers` bytes to (the
/// size the caller allocated the staging region with).
#[allow(clippy::too_many_arguments)]
unsafe fn copy_texture_rows(
    src: *const u8,
    src_bytes_per_row: u64,
    src_rows_per_image: u64,
    dst: *mut u8,
    dst_bytes_per_row: u64,
    dst_rows_per_image: u64,
    unaligned_bytes_per_row: u64,
    height: u64,
    depth_or_layers: u64,
) {
    if depth_or_layers == 0 || height == 0 {
        return;
    }

    if src_bytes_per_row == dst_bytes_per_row
        && src_rows_per_image == dst_rows_per_image
        && src_rows_per_image == height
    {
        let total = dst_bytes_per_row * height * depth_or_layers;
        std::ptr::copy_nonoverlapping(src, dst, total as usize);
        return;
    }

    for layer in 0..depth_or_layers {
        let src_image = src.add((layer * src_bytes_per_row * src_rows_per_image) as usize);
        let dst_image = dst.add((layer * dst_bytes_per_row * dst_rows_per_image) as usize);
        if src_bytes_per_row == dst_bytes_per_row {
            std::ptr::copy_nonoverlapping(src_image, dst_image, (dst_bytes_per_row * height) as usize);
        } else {
            for row in 0..height {
                let src_row = src_image.add((row * src_bytes_per_row) as usize);
                let dst_row = dst_image.add((row * dst_bytes_per_row) as usize);
                std::ptr::copy_nonoverlapping(src_row, dst_row, unaligned_bytes_per_row as usize);
            }
        }
    }
}
