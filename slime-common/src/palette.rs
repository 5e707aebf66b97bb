use crate::config::SpeciesConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// Ordered reference colours, indexed by species id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPalette {
    names: Vec<String>,
    colors: Vec<Rgb>,
}

impl SpeciesPalette {
    pub fn new(entries: Vec<(String, Rgb)>) -> Result<Self> {
        if entries.is_empty() {
            anyhow::bail!("palette must contain at least one colour.");
        }
        let (names, colors) = entries.into_iter().unzip();
        Ok(Self { names, colors })
    }

    /// Builds the palette from the `[[species]]` entries of the configuration.
    pub fn from_config(species: &[SpeciesConfig]) -> Result<Self> {
        Self::new(species.iter().map(|s| (s.name.clone(), s.color)).collect())
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, species: u32) -> Option<Rgb> {
        self.colors.get(species as usize).copied()
    }

    pub fn name(&self, species: u32) -> Option<&str> {
        self.names.get(species as usize).map(String::as_str)
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Returns the species whose colour is nearest to `pixel`.
    /// Squared Euclidean RGB distance; ties go to the lowest species index.
    pub fn classify(&self, pixel: Rgb) -> u32 {
        let mut best_species = 0u32;
        let mut best_distance = u32::MAX;
        for (species, color) in self.colors.iter().enumerate() {
            let distance = squared_distance(pixel, *color);
            // Strict comparison keeps the earliest species on ties
            if distance < best_distance {
                best_distance = distance;
                best_species = species as u32;
            }
        }
        best_species
    }
}

#[inline(always)]
fn squared_distance(a: Rgb, b: Rgb) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[(&str, Rgb)]) -> SpeciesPalette {
        SpeciesPalette::new(colors.iter().map(|(n, c)| (n.to_string(), *c)).collect()).unwrap()
    }

    #[test]
    fn classifies_pure_colours_exactly() {
        let p = palette(&[("red", [255, 0, 0]), ("green", [0, 255, 0]), ("blue", [0, 0, 255])]);
        assert_eq!(p.classify([255, 0, 0]), 0);
        assert_eq!(p.classify([0, 255, 0]), 1);
        assert_eq!(p.classify([0, 0, 255]), 2);
        assert_eq!(p.classify([200, 30, 10]), 0);
    }

    #[test]
    fn ties_resolve_to_lowest_species() {
        // [1, 0, 0] is exactly one unit from both entries
        let p = palette(&[("a", [0, 0, 0]), ("b", [2, 0, 0])]);
        assert_eq!(p.classify([1, 0, 0]), 0);

        let duplicate = palette(&[("red", [255, 0, 0]), ("also_red", [255, 0, 0])]);
        assert_eq!(duplicate.classify([250, 5, 5]), 0);
    }

    #[test]
    fn empty_palette_is_rejected() {
        assert!(SpeciesPalette::new(Vec::new()).is_err());
    }

    #[test]
    fn lookups_are_bounds_checked() {
        let p = palette(&[("red", [255, 0, 0])]);
        assert_eq!(p.color(0), Some([255, 0, 0]));
        assert_eq!(p.name(0), Some("red"));
        assert_eq!(p.color(1), None);
        assert_eq!(p.len(), 1);
    }
}
