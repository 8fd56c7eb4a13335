//! Temporary storage layout.
//!
//! One sort call carves four sections out of the caller's temporary storage,
//! in this order:
//!
//! | Section   | Element | Count                                 |
//! |-----------|---------|---------------------------------------|
//! | histogram | `u32`   | `2^radix_bits * sort_tiles`           |
//! | offsets   | `u32`   | `2^radix_bits * sort_tiles`           |
//! | partials  | `u32`   | `ceil(histogram cells / scan tile)`   |
//! | scratch   | `K`     | `key_count`                           |
//!
//! Every section starts on a [`STORAGE_ALIGNMENT`] boundary and occupies at
//! least one alignment unit, so the total is positive even for zero keys.

use crate::config::RadixSortConfig;
use crate::error::InvalidArgument;
use crate::key::RadixKey;

/// Alignment of every section, in bytes.
pub const STORAGE_ALIGNMENT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Section {
    len: usize,
    bytes: usize,
}

impl Section {
    fn new<T>(len: usize) -> Self {
        let raw = len * std::mem::size_of::<T>();
        Self {
            len,
            bytes: raw.max(1).div_ceil(STORAGE_ALIGNMENT) * STORAGE_ALIGNMENT,
        }
    }
}

/// Section sizes for one key count, key type and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    tiles: usize,
    histogram: Section,
    offsets: Section,
    partials: Section,
    scratch: Section,
}

/// Typed views of the temporary storage for the duration of one sort.
pub struct Workspace<'a, K> {
    /// Per-tile digit counts, bucket-major.
    pub histogram: &'a mut [u32],
    /// Exclusive scan of `histogram`.
    pub offsets: &'a mut [u32],
    /// Tile totals of the offset scan.
    pub partials: &'a mut [u32],
    /// Second key buffer.
    pub scratch: &'a mut [K],
}

impl StorageLayout {
    pub fn new<K: RadixKey>(key_count: usize, config: &RadixSortConfig) -> Self {
        let tiles = key_count.div_ceil(config.sort.tile_size());
        let cells = config.radix_size() * tiles;
        let partials = cells.div_ceil(config.scan.tile_size());
        Self {
            tiles,
            histogram: Section::new::<u32>(cells),
            offsets: Section::new::<u32>(cells),
            partials: Section::new::<u32>(partials),
            scratch: Section::new::<K>(key_count),
        }
    }

    /// Number of sort tiles (histogram and scatter blocks).
    pub fn tiles(&self) -> usize {
        self.tiles
    }

    /// Required temporary storage size in bytes.
    pub fn total(&self) -> usize {
        self.histogram.bytes + self.offsets.bytes + self.partials.bytes + self.scratch.bytes
    }

    /// Split `bytes` into the typed sections of this layout.
    pub fn carve<'a, K: RadixKey>(
        &self,
        bytes: &'a mut [u8],
    ) -> Result<Workspace<'a, K>, InvalidArgument> {
        if bytes.len() < self.total() {
            return Err(InvalidArgument::InsufficientStorage {
                required: self.total(),
                provided: bytes.len(),
            });
        }

        let (histogram, rest) = bytes.split_at_mut(self.histogram.bytes);
        let (offsets, rest) = rest.split_at_mut(self.offsets.bytes);
        let (partials, rest) = rest.split_at_mut(self.partials.bytes);
        let scratch = &mut rest[..self.scratch.bytes];

        Ok(Workspace {
            histogram: cast_section(histogram, self.histogram, "histogram")?,
            offsets: cast_section(offsets, self.offsets, "offsets")?,
            partials: cast_section(partials, self.partials, "partials")?,
            scratch: cast_section(scratch, self.scratch, "scratch")?,
        })
    }
}

fn cast_section<'a, T: bytemuck::Pod>(
    bytes: &'a mut [u8],
    section: Section,
    name: &'static str,
) -> Result<&'a mut [T], InvalidArgument> {
    let used = section.len * std::mem::size_of::<T>();
    bytemuck::try_cast_slice_mut(&mut bytes[..used])
        .map_err(|_| InvalidArgument::StorageAlignment(name))
}
