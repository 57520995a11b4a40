//! `SubresourceStorage<T>` (spec §3, §9): a logical `(aspect, mip, layer) ->
//! T` map, compressed by storing a single `T` per aspect when every
//! subresource of that aspect agrees, and only decompressing to a
//! per-layer×mip array on the first `Update` that needs to distinguish
//! cells.

use rhi_types::{Aspect, AspectSet, SubresourceRange};

#[derive(Debug, Clone)]
enum Plane<T> {
    Uniform(T),
    PerLayerMip(Vec<T>),
}

/// Compressed storage for one value per `(aspect, mip, layer)` cell of a
/// texture with `mip_count` mip levels and `layer_count` array layers.
#[derive(Debug, Clone)]
pub struct SubresourceStorage<T> {
    aspects: AspectSet,
    mip_count: u32,
    layer_count: u32,
    /// One plane per aspect, in `AspectSet::iter()` order.
    planes: Vec<Plane<T>>,
}

impl<T: Clone + PartialEq> SubresourceStorage<T> {
    /// Construct a storage where every subresource starts at `value`.
    pub fn new(aspects: AspectSet, mip_count: u32, layer_count: u32, value: T) -> Self {
        let planes = (0..aspects.len()).map(|_| Plane::Uniform(value.clone())).collect();
        Self {
            aspects,
            mip_count,
            layer_count,
            planes,
        }
    }

    fn plane_index(&self, aspect: Aspect) -> Option<usize> {
        self.aspects
            .iter()
            .position(|a| a == aspect)
    }

    fn cell_index(&self, mip: u32, layer: u32) -> usize {
        (layer * self.mip_count + mip) as usize
    }

    fn decompress(&mut self, plane_idx: usize) {
        let cell_count = (self.mip_count * self.layer_count) as usize;
        if let Plane::Uniform(ref value) = self.planes[plane_idx] {
            self.planes[plane_idx] = Plane::PerLayerMip(vec![value.clone(); cell_count]);
        }
    }

    /// Apply `f` to every cell intersecting `range`, decompressing the
    /// affected aspect(s) only if the range does not already cover every
    /// cell of that aspect.
    ///
    /// Spec §8 invariant 5: cells outside `range` are left untouched; the
    /// observable map after `Update` is exactly the union of `range`'s
    /// cells with `f` applied.
    pub fn update<F: FnMut(&mut T)>(&mut self, range: &SubresourceRange, mut f: F) {
        let mip_lo = range.base_mip.min(self.mip_count);
        let mip_hi = (range.base_mip + range.level_count).min(self.mip_count);
        let layer_lo = range.base_layer.min(self.layer_count);
        let layer_hi = (range.base_layer + range.layer_count).min(self.layer_count);
        if mip_lo >= mip_hi || layer_lo >= layer_hi {
            return;
        }

        for aspect in self.aspects.iter() {
            if !range.aspects.contains(aspect) {
                continue;
            }
            let plane_idx = self.plane_index(aspect).expect("aspect in self.aspects");
            let covers_whole_plane =
                mip_lo == 0 && mip_hi == self.mip_count && layer_lo == 0 && layer_hi == self.layer_count;

            if covers_whole_plane {
                match &mut self.planes[plane_idx] {
                    Plane::Uniform(v) => f(v),
                    Plane::PerLayerMip(cells) => {
                        for cell in cells.iter_mut() {
                            f(cell);
                        }
                        self.try_recompress(plane_idx);
                    }
                }
                continue;
            }

            self.decompress(plane_idx);
            if let Plane::PerLayerMip(cells) = &mut self.planes[plane_idx] {
                for layer in layer_lo..layer_hi {
                    for mip in mip_lo..mip_hi {
                        let idx = (layer * self.mip_count + mip) as usize;
                        f(&mut cells[idx]);
                    }
                }
            }
            self.try_recompress(plane_idx);
        }
    }

    /// Collapse a `PerLayerMip` plane back to `Uniform` if every cell now
    /// agrees; keeps the representation small without changing what
    /// `Iterate` observes (spec §3's compression invariant).
    fn try_recompress(&mut self, plane_idx: usize) {
        let collapse = if let Plane::PerLayerMip(cells) = &self.planes[plane_idx] {
            cells.windows(2).all(|w| w[0] == w[1])
        } else {
            false
        };
        if collapse {
            if let Plane::PerLayerMip(cells) = &self.planes[plane_idx] {
                let value = cells[0].clone();
                self.planes[plane_idx] = Plane::Uniform(value);
            }
        }
    }

    /// Read the value at a single cell.
    pub fn get(&self, aspect: Aspect, mip: u32, layer: u32) -> &T {
        let plane_idx = self.plane_index(aspect).expect("aspect not present in this format");
        match &self.planes[plane_idx] {
            Plane::Uniform(v) => v,
            Plane::PerLayerMip(cells) => &cells[self.cell_index(mip, layer)],
        }
    }

    /// Visit every cell, grouped by equal adjacent value runs within each
    /// aspect. A `Uniform` plane is visited once as its full range; a
    /// decompressed plane is visited one range per maximal contiguous
    /// mip run sharing the same layer and value.
    pub fn iterate<F: FnMut(SubresourceRange, &T)>(&self, mut f: F) {
        for aspect in self.aspects.iter() {
            let plane_idx = self.plane_index(aspect).unwrap();
            match &self.planes[plane_idx] {
                Plane::Uniform(v) => {
                    f(
                        SubresourceRange {
                            aspects: aspect_set_of(aspect),
                            base_mip: 0,
                            level_count: self.mip_count,
                            base_layer: 0,
                            layer_count: self.layer_count,
                        },
                        v,
                    );
                }
                Plane::PerLayerMip(cells) => {
                    for layer in 0..self.layer_count {
                        let mut mip = 0;
                        while mip < self.mip_count {
                            let start = mip;
                            let idx = (layer * self.mip_count + mip) as usize;
                            let value = &cells[idx];
                            let mut end = mip + 1;
                            while end < self.mip_count {
                                let next_idx = (layer * self.mip_count + end) as usize;
                                if cells[next_idx] == *value {
                                    end += 1;
                                } else {
                                    break;
                                }
                            }
                            f(
                                SubresourceRange {
                                    aspects: aspect_set_of(aspect),
                                    base_mip: start,
                                    level_count: end - start,
                                    base_layer: layer,
                                    layer_count: 1,
                                },
                                value,
                            );
                            mip = end;
                        }
                    }
                }
            }
        }
    }
}

fn aspect_set_of(aspect: Aspect) -> AspectSet {
    match aspect {
        Aspect::Color => AspectSet::Color,
        Aspect::Depth => AspectSet::Depth,
        Aspect::Stencil => AspectSet::Stencil,
        Aspect::Plane0 => AspectSet::Planar(1),
        Aspect::Plane1 => AspectSet::Planar(2),
        Aspect::Plane2 => AspectSet::Planar(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_all(aspects: AspectSet, mips: u32, layers: u32) -> SubresourceRange {
        SubresourceRange {
            aspects,
            base_mip: 0,
            level_count: mips,
            base_layer: 0,
            layer_count: layers,
        }
    }

    #[test]
    fn uniform_until_touched() {
        let storage = SubresourceStorage::<u32>::new(AspectSet::Color, 4, 2, 0);
        assert_eq!(*storage.get(Aspect::Color, 0, 0), 0);
        assert_eq!(*storage.get(Aspect::Color, 3, 1), 0);
    }

    #[test]
    fn update_on_single_subresource_only_touches_that_cell() {
        let mut storage = SubresourceStorage::<u32>::new(AspectSet::Color, 4, 2, 0);
        let r = SubresourceRange::single(Aspect::Color, 1, 0);
        storage.update(&r, |v| *v |= 1);

        assert_eq!(*storage.get(Aspect::Color, 1, 0), 1);
        assert_eq!(*storage.get(Aspect::Color, 0, 0), 0);
        assert_eq!(*storage.get(Aspect::Color, 2, 0), 0);
        assert_eq!(*storage.get(Aspect::Color, 1, 1), 0);
    }

    #[test]
    fn update_whole_plane_stays_uniform() {
        let mut storage = SubresourceStorage::<u32>::new(AspectSet::Color, 4, 2, 0);
        storage.update(&range_all(AspectSet::Color, 4, 2), |v| *v |= 7);
        for mip in 0..4 {
            for layer in 0..2 {
                assert_eq!(*storage.get(Aspect::Color, mip, layer), 7);
            }
        }
    }

    #[test]
    fn depth_stencil_aspects_are_independent() {
        let mut storage = SubresourceStorage::<u32>::new(AspectSet::DepthStencil, 1, 1, 0);
        let depth_only = SubresourceRange {
            aspects: AspectSet::Depth,
            base_mip: 0,
            level_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        storage.update(&depth_only, |v| *v = 9);
        assert_eq!(*storage.get(Aspect::Depth, 0, 0), 9);
        assert_eq!(*storage.get(Aspect::Stencil, 0, 0), 0);
    }

    #[test]
    fn iterate_recovers_touched_and_untouched_ranges() {
        let mut storage = SubresourceStorage::<u32>::new(AspectSet::Color, 4, 1, 0);
        let r = SubresourceRange {
            aspects: AspectSet::Color,
            base_mip: 1,
            level_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        storage.update(&r, |v| *v = 5);

        let mut seen = Vec::new();
        storage.iterate(|range, value| seen.push((range.base_mip, range.level_count, *value)));
        // Coalesced into contiguous runs: mip 0 (=0), mip 1 (=5), mips 2..4 (=0).
        assert_eq!(seen, vec![(0, 1, 0), (1, 1, 5), (2, 2, 0)]);
    }

    #[test]
    fn recompresses_back_to_uniform_once_values_converge() {
        let mut storage = SubresourceStorage::<u32>::new(AspectSet::Color, 2, 1, 0);
        let single = SubresourceRange::single(Aspect::Color, 0, 0);
        storage.update(&single, |v| *v = 1);
        storage.update(&single, |v| *v = 0);

        let mut ranges = Vec::new();
        storage.iterate(|range, _| ranges.push(range.level_count));
        assert_eq!(ranges, vec![2]);
    }
}
