//! Upload ring allocator (spec §4.6): `UploadAllocator` owns a *list* of
//! fixed-size mapped staging rings, each with wraparound sub-allocation and
//! serial-gated reclamation, plus a per-serial oversize fallback for writes
//! too large for any one ring. Once every ring in the list is exhausted, a
//! fresh one is appended rather than failing the allocation (grounded on
//! `original_source`'s `UploadAllocator::Allocate`).
//!
//! Each ring is grounded on Dawn's `RingBufferAllocator`: `used_start_offset`
//! and `used_end_offset` are monotonically increasing logical offsets (never
//! wrapped); only the *physical* offset handed back to the caller is
//! `logical % capacity`. That keeps "how much is free" a plain subtraction
//! even though allocations physically wrap.

use std::collections::VecDeque;

use rhi_hal::{Backend, Device as HalDevice, DeviceError, MappableBuffer};
use rhi_types::{align_up, BufferDescriptor, BufferUsage};

use crate::error::CoreError;
use crate::serial::{Serial, SerialMap};

/// Every ring buffer in the allocator is this size (spec §4.6).
pub const RING_BUFFER_SIZE: u64 = 4 * 1024 * 1024;

struct InFlightRequest {
    end_offset: u64,
    serial: Serial,
}

struct RingBuffer<B: Backend> {
    raw: B::Buffer,
    mapped_ptr: *mut u8,
    capacity: u64,
    used_start_offset: u64,
    used_end_offset: u64,
    inflight: VecDeque<InFlightRequest>,
}

// SAFETY: `mapped_ptr` only ever points into `raw`'s host-visible mapping,
// which the allocator exclusively owns and only touches through `&mut self`.
unsafe impl<B: Backend> Send for RingBuffer<B> {}

impl<B: Backend> RingBuffer<B> {
    fn used_size(&self) -> u64 {
        self.used_end_offset - self.used_start_offset
    }

    /// Returns the physical offset of the new allocation, or `None` if this
    /// ring currently has no room (the caller falls through to the next
    /// ring, or appends a fresh one — see [`UploadAllocator::allocate`]).
    ///
    /// `alignment` is the offset alignment the backend requires for the
    /// copy this allocation feeds (spec §4.6 supplement, grounded on
    /// `original_source`'s `RingBuffer::Allocate(size, serial,
    /// offsetAlignment)` — buffer writes align to 4, texture writes to
    /// `max(optimalOffsetAlignment, bytesPerBlock)`).
    fn allocate(&mut self, size: u64, serial: Serial, alignment: u64) -> Option<u64> {
        if size == 0 || size > self.capacity {
            return None;
        }
        let physical = self.used_end_offset % self.capacity;
        let aligned_physical = align_up(physical, alignment);
        let pad = aligned_physical - physical;
        if aligned_physical + size <= self.capacity {
            if self.used_size() + pad + size > self.capacity {
                return None;
            }
            self.used_end_offset += pad + size;
            self.inflight.push_back(InFlightRequest {
                end_offset: self.used_end_offset,
                serial,
            });
            Some(aligned_physical)
        } else {
            // Would straddle the end of the physical buffer: waste the
            // remainder of this lap and restart the logical cursor at the
            // next capacity boundary (offset 0, trivially aligned).
            let padded_end = self.used_end_offset + (self.capacity - physical);
            if padded_end + size - self.used_start_offset > self.capacity {
                return None;
            }
            self.used_end_offset = padded_end + size;
            self.inflight.push_back(InFlightRequest {
                end_offset: self.used_end_offset,
                serial,
            });
            Some(0)
        }
    }

    /// Release every allocation filed at a serial `<= completed`, advancing
    /// `used_start_offset` past them (spec §4.6's serial-gated reclamation).
    fn reclaim(&mut self, completed: Serial) {
        while let Some(front) = self.inflight.front() {
            if front.serial > completed {
                break;
            }
            self.used_start_offset = front.end_offset;
            self.inflight.pop_front();
        }
        if self.inflight.is_empty() {
            self.used_start_offset = 0;
            self.used_end_offset = 0;
        }
    }
}

struct OversizeBuffer<B: Backend> {
    raw: B::Buffer,
}

/// One sub-allocation handed back to `Queue::write_buffer`/`write_texture`:
/// a host-visible pointer to write into plus the matching device-side
/// staging buffer offset/handle for the follow-up copy command.
pub struct UploadAllocation<'a, B: Backend> {
    pub mapped_ptr: *mut u8,
    pub staging_buffer: &'a B::Buffer,
    pub staging_offset: u64,
}

/// Owns a *list* of fixed-size ring buffers (spec §4.6: "A UploadAllocator
/// owns a list of ring buffers of fixed size 4 MiB"), grounded on
/// `original_source`'s `UploadAllocator::Allocate`: try every existing ring
/// in order, and only append a fresh one once all of them are exhausted,
/// so steady-state traffic that fits in one ring never grows the list.
pub struct UploadAllocator<B: Backend> {
    rings: Vec<RingBuffer<B>>,
    oversize: SerialMap<OversizeBuffer<B>>,
}

impl<B: Backend> UploadAllocator<B> {
    pub fn new() -> Self {
        Self {
            rings: Vec::new(),
            oversize: SerialMap::new(),
        }
    }

    fn new_ring(device: &B::Device) -> Result<RingBuffer<B>, DeviceError> {
        let raw = device.create_buffer(&BufferDescriptor {
            label: Some("upload ring buffer".into()),
            size: RING_BUFFER_SIZE,
            usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
            mapped_at_creation: false,
        })?;
        device.map_async(&raw, rhi_types::MapMode::Write, 0, RING_BUFFER_SIZE)?;
        let mapped_ptr = unsafe { device.get_mapped_pointer(&raw) };
        Ok(RingBuffer {
            raw,
            mapped_ptr,
            capacity: RING_BUFFER_SIZE,
            used_start_offset: 0,
            used_end_offset: 0,
            inflight: VecDeque::new(),
        })
    }

    /// Allocate `size` host-visible bytes, aligned to `offset_alignment`,
    /// to be consumed by a copy filed under `serial`. Sizes larger than
    /// [`RING_BUFFER_SIZE`] get a dedicated one-off staging buffer (spec
    /// §4.6's oversize fallback); everything else comes out of the ring
    /// list, falling through to a freshly appended ring once every
    /// existing one is full (spec §4.6, `original_source`'s
    /// `UploadAllocator::Allocate`).
    pub fn allocate(
        &mut self,
        device: &B::Device,
        size: u64,
        serial: Serial,
        offset_alignment: u64,
    ) -> Result<UploadAllocation<'_, B>, CoreError> {
        if size > RING_BUFFER_SIZE {
            let raw = device.create_buffer(&BufferDescriptor {
                label: Some("oversize upload staging buffer".into()),
                size,
                usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            })?;
            device.map_async(&raw, rhi_types::MapMode::Write, 0, size)?;
            let mapped_ptr = unsafe { device.get_mapped_pointer(&raw) };
            self.oversize.push(serial, OversizeBuffer { raw });
            let entry = self
                .oversize
                .iter_up_to(serial)
                .last()
                .expect("just inserted");
            return Ok(UploadAllocation {
                mapped_ptr,
                staging_buffer: &entry.1.raw,
                staging_offset: 0,
            });
        }

        let mut target = None;
        for (index, ring) in self.rings.iter_mut().enumerate() {
            if let Some(offset) = ring.allocate(size, serial, offset_alignment) {
                target = Some((index, offset));
                break;
            }
        }
        let (index, offset) = match target {
            Some(found) => found,
            None => {
                let mut ring = Self::new_ring(device)?;
                let offset = ring
                    .allocate(size, serial, offset_alignment)
                    .ok_or(CoreError::StagingRingExhausted { requested: size })?;
                self.rings.push(ring);
                (self.rings.len() - 1, offset)
            }
        };
        let ring = &self.rings[index];
        Ok(UploadAllocation {
            mapped_ptr: unsafe { ring.mapped_ptr.add(offset as usize) },
            staging_buffer: &ring.raw,
            staging_offset: offset,
        })
    }

    /// Release every ring region and oversize buffer filed at a serial
    /// `<= completed`. Empty rings beyond the first are dropped so the
    /// list shrinks back down once a traffic spike has passed (mirrors
    /// `original_source`'s "never erase the last buffer" rule, which keeps
    /// one ring warm instead of paying to recreate it on the next write).
    pub fn reclaim(&mut self, completed: Serial) {
        for ring in &mut self.rings {
            ring.reclaim(completed);
        }
        while self.rings.len() > 1 {
            match self.rings.iter().position(|ring| ring.inflight.is_empty()) {
                Some(index) => {
                    self.rings.remove(index);
                }
                None => break,
            }
        }
        self.oversize.drain_up_to(completed);
    }
}

impl<B: Backend> Default for UploadAllocator<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The ring's wraparound/reclamation math is pure arithmetic; back it
    // with a real (null) staging buffer just to have somewhere to point.
    fn fresh_ring(capacity: u64) -> RingBuffer<rhi_hal::null::NullBackend> {
        let device = rhi_hal::null::NullDevice::default();
        let raw = rhi_hal::Device::create_buffer(
            &device,
            &BufferDescriptor {
                label: None,
                size: capacity,
                usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            },
        )
        .unwrap();
        RingBuffer {
            raw,
            mapped_ptr: std::ptr::null_mut(),
            capacity,
            used_start_offset: 0,
            used_end_offset: 0,
            inflight: VecDeque::new(),
        }
    }

    #[test]
    fn sequential_allocations_pack_without_wrap() {
        let mut ring = fresh_ring(1024);
        let a = ring.allocate(256, 1, 1).unwrap();
        let b = ring.allocate(256, 1, 1).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 256);
    }

    #[test]
    fn allocation_wraps_when_it_would_straddle_the_end() {
        let mut ring = fresh_ring(1024);
        ring.allocate(768, 1, 1).unwrap();
        // 768..1024 remains (256 bytes), but this 512-byte request can't
        // fit there: it must wrap to offset 0, wasting the tail.
        let wrapped = ring.allocate(512, 1, 1);
        assert_eq!(wrapped, None, "not enough total free space for padding + size");

        ring.reclaim(1);
        let wrapped = ring.allocate(512, 2, 1).unwrap();
        assert_eq!(wrapped, 0);
    }

    #[test]
    fn reclaim_only_frees_up_to_the_completed_serial() {
        let mut ring = fresh_ring(1024);
        ring.allocate(200, 1, 1).unwrap();
        ring.allocate(200, 2, 1).unwrap();
        ring.reclaim(1);
        assert_eq!(ring.used_start_offset, 200);
        ring.reclaim(2);
        assert_eq!(ring.used_start_offset, 0);
        assert_eq!(ring.used_end_offset, 0);
    }

    // Spec §4.6: three uploads that would not fit in a single 4 MiB ring
    // must still succeed, by falling through to newly appended rings
    // instead of reporting `StagingRingExhausted`.
    #[test]
    fn allocator_appends_new_rings_once_the_first_is_exhausted() {
        let device = rhi_hal::null::NullDevice::default();
        let mut allocator = UploadAllocator::<rhi_hal::null::NullBackend>::new();
        let one_and_a_half_mib = 3 * 1024 * 1024 / 2;

        for _ in 0..3 {
            allocator
                .allocate(&device, one_and_a_half_mib, 1, 1)
                .expect("must fall through to a fresh ring instead of failing");
        }
        assert_eq!(allocator.rings.len(), 2, "three 1.5 MiB allocations overflow one 4 MiB ring");
    }
}
