//! Region/section addressing and the CPU mirror of the GPU region tables

use crate::constants::region::{
    FACINGS, RENDER_PASSES, REGION_SECTIONS_X, REGION_SECTIONS_Y, REGION_SECTIONS_Z, REGION_VALID, SECTIONS_PER_REGION,
    SECTION_SIZE,
};
use crate::gpu::{GpuRegion, GpuSection, GpuSectionPass};
use crate::registry::{IdleThresholds, IndexedObjectRegistry, ObjectKind};
use rustc_hash::FxHashSet;

/// Region coordinates in region units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl RegionId {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Region size in blocks along each axis
    pub const fn extent() -> [i32; 3] {
        [
            REGION_SECTIONS_X as i32 * SECTION_SIZE,
            REGION_SECTIONS_Y as i32 * SECTION_SIZE,
            REGION_SECTIONS_Z as i32 * SECTION_SIZE,
        ]
    }

    /// Region containing a block position
    pub fn containing(block: [i32; 3]) -> Self {
        let extent = Self::extent();
        Self::new(
            block[0].div_euclid(extent[0]),
            block[1].div_euclid(extent[1]),
            block[2].div_euclid(extent[2]),
        )
    }

    /// Minimum corner in blocks
    pub fn origin(&self) -> [i32; 3] {
        let extent = Self::extent();
        [self.x * extent[0], self.y * extent[1], self.z * extent[2]]
    }
}

/// Render passes with their own indirect command stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Solid,
    Cutout,
    Translucent,
}

impl RenderPass {
    pub const ALL: [RenderPass; RENDER_PASSES] = [RenderPass::Solid, RenderPass::Cutout, RenderPass::Translucent];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Face directions, in the order their quads are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    NegY,
    PosY,
    NegZ,
    PosZ,
    NegX,
    PosX,
}

impl Facing {
    pub const ALL: [Facing; FACINGS] = [
        Facing::NegY,
        Facing::PosY,
        Facing::NegZ,
        Facing::PosZ,
        Facing::NegX,
        Facing::PosX,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Section index inside a region: x in bits 0..3, z in bits 3..6, y above
pub fn section_index(x: u32, y: u32, z: u32) -> u32 {
    debug_assert!(x < REGION_SECTIONS_X && y < REGION_SECTIONS_Y && z < REGION_SECTIONS_Z);
    x | (z << 3) | (y << 6)
}

/// Inverse of [`section_index`]
pub fn section_coords(index: u32) -> (u32, u32, u32) {
    (index & 7, index >> 6, (index >> 3) & 7)
}

/// Minimum corner of a section in blocks
pub fn section_origin(region_origin: [i32; 3], index: u32) -> [i32; 3] {
    let (x, y, z) = section_coords(index);
    [
        region_origin[0] + x as i32 * SECTION_SIZE,
        region_origin[1] + y as i32 * SECTION_SIZE,
        region_origin[2] + z as i32 * SECTION_SIZE,
    ]
}

/// Mesh layout of one section in one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassGeometry {
    /// First vertex of the section's mesh in the shared vertex buffer
    pub base_vertex: i32,
    /// Quads per facing, stored contiguously in `Facing::ALL` order
    pub facing_quads: [u32; FACINGS],
}

impl PassGeometry {
    pub fn quad_count(&self) -> u32 {
        self.facing_quads.iter().sum()
    }

    /// First quad of `facing` relative to the section's first quad
    pub fn facing_offset(&self, facing: Facing) -> u32 {
        self.facing_quads[..facing.index()].iter().sum()
    }
}

/// Mesh layout of a section across all render passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionGeometry {
    pub passes: [PassGeometry; RENDER_PASSES],
}

impl SectionGeometry {
    pub fn pass(&self, pass: RenderPass) -> &PassGeometry {
        &self.passes[pass.index()]
    }

    pub fn pass_mut(&mut self, pass: RenderPass) -> &mut PassGeometry {
        &mut self.passes[pass.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.passes.iter().all(|pass| pass.quad_count() == 0)
    }

    pub fn to_gpu(&self) -> GpuSection {
        let mut section = GpuSection::default();
        for (dst, src) in section.passes.iter_mut().zip(self.passes.iter()) {
            *dst = GpuSectionPass {
                base_vertex: src.base_vertex,
                facing_quads: src.facing_quads,
                _padding: 0,
            };
        }
        section
    }
}

/// CPU mirror of the region header and section buffers.
///
/// Growth and re-upload are served from here, so the GPU copies never have
/// to be read back.
pub struct RegionTable {
    registry: IndexedObjectRegistry<RegionId>,
    regions: Vec<GpuRegion>,
    sections: Vec<GpuSection>,
    /// Populated sections per render pass with any quads, per region slot
    pass_counts: Vec<[u32; RENDER_PASSES]>,

    dirty_regions: FxHashSet<u32>,
    dirty_sections: FxHashSet<u32>,
    full_upload: bool,
}

impl RegionTable {
    pub fn new() -> Self {
        Self {
            // Regions are pinned: only removed explicitly
            registry: IndexedObjectRegistry::new(IdleThresholds::default()),
            regions: Vec::new(),
            sections: Vec::new(),
            pass_counts: Vec::new(),
            dirty_regions: FxHashSet::default(),
            dirty_sections: FxHashSet::default(),
            full_upload: true,
        }
    }

    /// Register a region (idempotent) and return its slot
    pub fn add(&mut self, id: RegionId, origin: [i32; 3]) -> u32 {
        if let Some(slot) = self.registry.slot(id) {
            return slot;
        }

        let slot = self.registry.add(id, ObjectKind::Pinned);
        let needed = slot as usize + 1;
        if self.regions.len() < needed {
            self.regions.resize(needed, GpuRegion::default());
            self.sections.resize(needed * SECTIONS_PER_REGION as usize, GpuSection::default());
            self.pass_counts.resize(needed, [0; RENDER_PASSES]);
        }

        self.regions[slot as usize] = GpuRegion {
            origin: [origin[0], origin[1], origin[2], 0],
            flags: REGION_VALID,
            ..Default::default()
        };
        self.pass_counts[slot as usize] = [0; RENDER_PASSES];
        self.dirty_regions.insert(slot);
        slot
    }

    /// Free the region's slot and clear its validity
    pub fn remove(&mut self, id: RegionId) -> Option<u32> {
        let slot = self.registry.remove(id)?;
        self.regions[slot as usize] = GpuRegion::default();
        self.pass_counts[slot as usize] = [0; RENDER_PASSES];
        self.dirty_regions.insert(slot);
        Some(slot)
    }

    pub fn slot(&self, id: RegionId) -> Option<u32> {
        self.registry.slot(id)
    }

    /// Write a section record and its population bit; false for unknown regions
    pub fn update_section(&mut self, id: RegionId, index: u32, geometry: &SectionGeometry) -> bool {
        let Some(slot) = self.registry.slot(id) else {
            return false;
        };
        if index >= SECTIONS_PER_REGION {
            return false;
        }

        let global = slot * SECTIONS_PER_REGION + index;
        let previous = self.sections[global as usize];
        let was_populated = self.is_populated(slot, index);
        let populated = !geometry.is_empty();

        let counts = &mut self.pass_counts[slot as usize];
        for (pass, count) in counts.iter_mut().enumerate() {
            let had = was_populated && previous.passes[pass].facing_quads.iter().any(|q| *q > 0);
            let has = geometry.passes[pass].quad_count() > 0;
            match (had, has) {
                (false, true) => *count += 1,
                (true, false) => *count -= 1,
                _ => {}
            }
        }

        self.sections[global as usize] = geometry.to_gpu();
        self.set_population(slot, index, populated);
        self.dirty_sections.insert(global);
        true
    }

    /// Mark a section empty
    pub fn clear_section(&mut self, id: RegionId, index: u32) -> bool {
        self.update_section(id, index, &SectionGeometry::default())
    }

    fn set_population(&mut self, slot: u32, index: u32, populated: bool) {
        let region = &mut self.regions[slot as usize];
        let word = &mut region.population[(index >> 5) as usize];
        let bit = 1u32 << (index & 31);
        let before = *word;
        if populated {
            *word |= bit;
        } else {
            *word &= !bit;
        }
        if *word != before {
            self.dirty_regions.insert(slot);
        }
    }

    pub fn is_populated(&self, slot: u32, index: u32) -> bool {
        self.regions
            .get(slot as usize)
            .map_or(false, |region| region.population[(index >> 5) as usize] & (1 << (index & 31)) != 0)
    }

    /// Slots of valid regions with at least one populated section, ascending
    pub fn active_slots(&self) -> Vec<u32> {
        let mut active: Vec<u32> = self
            .registry
            .iter()
            .map(|(_, slot)| slot)
            .filter(|slot| {
                let region = &self.regions[*slot as usize];
                region.flags & REGION_VALID != 0 && region.population.iter().any(|word| *word != 0)
            })
            .collect();
        active.sort_unstable();
        active
    }

    /// Upper bound on the draws a pass can emit for the given regions
    pub fn command_requirement(&self, active: &[u32]) -> u32 {
        (0..RENDER_PASSES)
            .map(|pass| active.iter().map(|slot| self.pass_counts[*slot as usize][pass]).sum::<u32>())
            .max()
            .unwrap_or(0)
    }

    /// Regions ever allocated in the mirror (upload extent)
    pub fn mirrored_slots(&self) -> u32 {
        self.regions.len() as u32
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn region(&self, slot: u32) -> Option<&GpuRegion> {
        self.regions.get(slot as usize)
    }

    pub fn section(&self, slot: u32, index: u32) -> Option<&GpuSection> {
        self.sections.get((slot * SECTIONS_PER_REGION + index) as usize)
    }

    pub fn regions(&self) -> &[GpuRegion] {
        &self.regions
    }

    pub fn sections(&self) -> &[GpuSection] {
        &self.sections
    }

    /// Everything is re-uploaded on the next upload
    pub fn mark_all_dirty(&mut self) {
        self.full_upload = true;
    }

    /// Dirty region slots and global section indices, each collapsed into
    /// sorted `(first, count)` runs. Returns `None` runs when a full upload
    /// is due.
    pub fn take_dirty(&mut self) -> DirtyRuns {
        let full = std::mem::replace(&mut self.full_upload, false);
        let regions = coalesce(self.dirty_regions.drain().collect());
        let sections = coalesce(self.dirty_sections.drain().collect());
        if full {
            DirtyRuns::Full
        } else {
            DirtyRuns::Partial { regions, sections }
        }
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.regions.clear();
        self.sections.clear();
        self.pass_counts.clear();
        self.dirty_regions.clear();
        self.dirty_sections.clear();
        self.full_upload = true;
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// What has to be uploaded this tick
#[derive(Debug, PartialEq, Eq)]
pub enum DirtyRuns {
    Full,
    Partial {
        regions: Vec<(u32, u32)>,
        sections: Vec<(u32, u32)>,
    },
}

fn coalesce(mut indices: Vec<u32>) -> Vec<(u32, u32)> {
    indices.sort_unstable();
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for index in indices {
        match runs.last_mut() {
            Some((first, count)) if *first + *count == index => *count += 1,
            _ => runs.push((index, 1)),
        }
    }
    runs
}
