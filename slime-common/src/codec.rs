//! Species channel codec.
//!
//! A physical field cell has [`CHANNELS`] 32-bit channels. Up to four species
//! map one-to-one onto channels. With more species, each channel carries two
//! 16-bit values: the even species of a pair in the low half, the odd species
//! in the high half.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Number of physical channels per cell.
pub const CHANNELS: usize = 4;
/// Largest species count a packed cell can hold.
pub const MAX_SPECIES: u32 = 8;
/// Largest intensity that survives an encode/decode round trip.
pub const MAX_ENCODED: u16 = u16::MAX;

const HALF_MASK: u32 = 0xFFFF;

/// One physical cell: four 32-bit channel slots.
pub type PackedCell = [u32; CHANNELS];

/// How species are laid out over the physical channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// One species per channel, value in the low 16 bits.
    Direct,
    /// Two species per channel, 16 bits each.
    Packed,
}

/// Location of one species value inside a [`PackedCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSlot {
    pub channel: usize,
    pub shift: u32,
}

impl ChannelLayout {
    /// Picks the layout for a species count, failing if it cannot be represented.
    pub fn for_species(species_count: u32) -> Result<Self> {
        if species_count == 0 {
            anyhow::bail!("species count must be at least 1.");
        }
        if species_count > MAX_SPECIES {
            anyhow::bail!(
                "species count {} exceeds the {} species a {}-channel cell can hold.",
                species_count, MAX_SPECIES, CHANNELS
            );
        }
        if species_count as usize <= CHANNELS {
            Ok(ChannelLayout::Direct)
        } else {
            Ok(ChannelLayout::Packed)
        }
    }

    /// Maps a species index to its channel and bit offset.
    #[inline(always)]
    pub fn slot(self, species: u32) -> ChannelSlot {
        debug_assert!(species < MAX_SPECIES, "species {} out of range", species);
        match self {
            ChannelLayout::Direct => ChannelSlot { channel: species as usize, shift: 0 },
            ChannelLayout::Packed => ChannelSlot {
                channel: (species / 2) as usize,
                shift: 16 * (species % 2),
            },
        }
    }

    /// Inverse of [`ChannelLayout::slot`]. Returns `None` for slots no species uses.
    pub fn species_at(self, slot: ChannelSlot) -> Option<u32> {
        if slot.channel >= CHANNELS {
            return None;
        }
        match (self, slot.shift) {
            (ChannelLayout::Direct, 0) => Some(slot.channel as u32),
            (ChannelLayout::Packed, 0) => Some(slot.channel as u32 * 2),
            (ChannelLayout::Packed, 16) => Some(slot.channel as u32 * 2 + 1),
            _ => None,
        }
    }

    /// Writes `value` for `species` into `cell`, leaving every other species untouched.
    #[inline(always)]
    pub fn pack_into(self, cell: &mut PackedCell, species: u32, value: u16) {
        let slot = self.slot(species);
        let word = &mut cell[slot.channel];
        *word = (*word & !(HALF_MASK << slot.shift)) | ((value as u32) << slot.shift);
    }

    /// Returns a fresh cell holding only `value` for `species`.
    pub fn encode(self, species: u32, value: u16) -> PackedCell {
        let mut cell = [0u32; CHANNELS];
        self.pack_into(&mut cell, species, value);
        cell
    }

    /// Reads the value for `species` out of `cell`.
    #[inline(always)]
    pub fn decode(self, cell: &PackedCell, species: u32) -> u16 {
        let slot = self.slot(species);
        ((cell[slot.channel] >> slot.shift) & HALF_MASK) as u16
    }
}

/// Converts a field intensity into its 16-bit encoded form, rounding and clamping.
#[inline(always)]
pub fn encode_value(value: f32) -> u16 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= MAX_ENCODED as f32 {
        MAX_ENCODED
    } else {
        value.round() as u16
    }
}

/// Packs one species value using the two-per-channel scheme.
pub fn encode(species: u32, value: u16) -> PackedCell {
    ChannelLayout::Packed.encode(species, value)
}

/// Unpacks one species value using the two-per-channel scheme.
pub fn decode(cell: &PackedCell, species: u32) -> u16 {
    ChannelLayout::Packed.decode(cell, species)
}

/// Packs a cell-major intensity slice (`species_count` values per cell) into physical cells.
pub fn pack_cells(layout: ChannelLayout, values: &[f32], species_count: u32) -> Vec<PackedCell> {
    let stride = species_count as usize;
    if stride == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(stride)
        .map(|cell_values| {
            let mut cell = [0u32; CHANNELS];
            for (species, &value) in cell_values.iter().enumerate() {
                layout.pack_into(&mut cell, species as u32, encode_value(value));
            }
            cell
        })
        .collect()
}

/// Expands physical cells back into a cell-major intensity vector.
pub fn unpack_cells(layout: ChannelLayout, cells: &[PackedCell], species_count: u32) -> Vec<f32> {
    let mut values = Vec::with_capacity(cells.len() * species_count as usize);
    for cell in cells {
        for species in 0..species_count {
            values.push(layout.decode(cell, species) as f32);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact_for_every_species_and_value() {
        for species in 0..MAX_SPECIES {
            for value in 0..=u16::MAX {
                assert_eq!(decode(&encode(species, value), species), value);
            }
        }
    }

    #[test]
    fn packed_layout_puts_even_species_low_and_odd_high() {
        let layout = ChannelLayout::Packed;
        assert_eq!(layout.slot(0), ChannelSlot { channel: 0, shift: 0 });
        assert_eq!(layout.slot(1), ChannelSlot { channel: 0, shift: 16 });
        assert_eq!(layout.slot(6), ChannelSlot { channel: 3, shift: 0 });
        assert_eq!(layout.slot(7), ChannelSlot { channel: 3, shift: 16 });

        let cell = encode(3, 0xABCD);
        assert_eq!(cell, [0, 0xABCD_0000, 0, 0]);
    }

    #[test]
    fn slot_and_species_at_are_inverses() {
        for layout in [ChannelLayout::Direct, ChannelLayout::Packed] {
            let count = if layout == ChannelLayout::Direct { CHANNELS as u32 } else { MAX_SPECIES };
            for species in 0..count {
                assert_eq!(layout.species_at(layout.slot(species)), Some(species));
            }
        }
        assert_eq!(ChannelLayout::Direct.species_at(ChannelSlot { channel: 1, shift: 16 }), None);
        assert_eq!(ChannelLayout::Packed.species_at(ChannelSlot { channel: 4, shift: 0 }), None);
    }

    #[test]
    fn packing_one_species_leaves_its_neighbour_untouched() {
        let layout = ChannelLayout::Packed;
        let mut cell = [0u32; CHANNELS];
        layout.pack_into(&mut cell, 4, 1234);
        layout.pack_into(&mut cell, 5, u16::MAX);
        layout.pack_into(&mut cell, 4, 7);
        assert_eq!(layout.decode(&cell, 4), 7);
        assert_eq!(layout.decode(&cell, 5), u16::MAX);
        assert_eq!(cell[0], 0);
    }

    #[test]
    fn encode_value_clamps_instead_of_wrapping() {
        assert_eq!(encode_value(-3.0), 0);
        assert_eq!(encode_value(f32::NAN), 0);
        assert_eq!(encode_value(70_000.0), u16::MAX);
        assert_eq!(encode_value(65_535.0), u16::MAX);
        assert_eq!(encode_value(41.6), 42);
    }

    #[test]
    fn layout_selection_follows_channel_count() {
        assert_eq!(ChannelLayout::for_species(1).unwrap(), ChannelLayout::Direct);
        assert_eq!(ChannelLayout::for_species(4).unwrap(), ChannelLayout::Direct);
        assert_eq!(ChannelLayout::for_species(5).unwrap(), ChannelLayout::Packed);
        assert_eq!(ChannelLayout::for_species(8).unwrap(), ChannelLayout::Packed);
        assert!(ChannelLayout::for_species(0).is_err());
        assert!(ChannelLayout::for_species(9).is_err());
    }

    #[test]
    fn whole_field_pack_and_unpack_preserve_integer_values() {
        let species = 7;
        let values: Vec<f32> = (0..species * 3).map(|i| (i * 1000) as f32).collect();
        let layout = ChannelLayout::for_species(species).unwrap();
        let cells = pack_cells(layout, &values, species);
        assert_eq!(cells.len(), 3);
        assert_eq!(unpack_cells(layout, &cells, species), values);
    }
}
