use std::ops::RangeInclusive;
use std::path::PathBuf;

use ferrous_assets::{SortHeuristic, SpriteSource};
use ferrous_font::DEFAULT_FLATNESS_PX;
use log::LevelFilter;

/// Origen de los bytes de una fuente TrueType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl From<PathBuf> for FontSource {
    fn from(path: PathBuf) -> Self {
        FontSource::File(path)
    }
}

impl From<Vec<u8>> for FontSource {
    fn from(bytes: Vec<u8>) -> Self {
        FontSource::Memory(bytes)
    }
}

/// A `(kind, value)` pair attached to the asset it follows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagEntry {
    pub kind: u32,
    pub value: f32,
}

#[derive(Debug, Clone)]
pub struct FontEntry {
    pub name: String,
    pub source: FontSource,
    pub pixel_height: f32,
    pub codepoints: Vec<RangeInclusive<u32>>,
    pub group: Option<String>,
    pub tags: Vec<TagEntry>,
}

impl FontEntry {
    pub fn new(name: &str, source: impl Into<FontSource>, pixel_height: f32) -> Self {
        Self {
            name: name.to_string(),
            source: source.into(),
            pixel_height,
            codepoints: Vec::new(),
            group: None,
            tags: Vec::new(),
        }
    }

    pub fn with_codepoints(mut self, range: RangeInclusive<u32>) -> Self {
        self.codepoints.push(range);
        self
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_tag(mut self, kind: u32, value: f32) -> Self {
        self.tags.push(TagEntry { kind, value });
        self
    }

    /// Every requested codepoint, in range order. Duplicates are merged by
    /// the atlas builder.
    pub fn codepoint_iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.codepoints.iter().flat_map(|r| r.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SpriteEntry {
    pub name: String,
    pub source: SpriteSource,
    pub group: Option<String>,
    pub tags: Vec<TagEntry>,
}

impl SpriteEntry {
    pub fn new(name: &str, source: impl Into<SpriteSource>) -> Self {
        Self {
            name: name.to_string(),
            source: source.into(),
            group: None,
            tags: Vec::new(),
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_tag(mut self, kind: u32, value: f32) -> Self {
        self.tags.push(TagEntry { kind, value });
        self
    }
}

/// Configuración completa de una ejecución del bake.
#[derive(Debug, Clone)]
pub struct BakeConfig {
    pub output: PathBuf,
    pub debug_png: Option<PathBuf>,
    pub log_level: LevelFilter,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub padding: u32,
    pub flatness: f32,
    pub sort: SortHeuristic,
    /// Group that receives the atlas bitmap; `None` leaves it ungrouped.
    pub atlas_group: Option<String>,
    /// Written in this order.
    pub groups: Vec<String>,
    pub fonts: Vec<FontEntry>,
    pub sprites: Vec<SpriteEntry>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("assets.bin"),
            debug_png: None,
            log_level: LevelFilter::Info,
            atlas_width: 1024,
            atlas_height: 1024,
            padding: 1,
            flatness: DEFAULT_FLATNESS_PX,
            sort: SortHeuristic::default(),
            atlas_group: None,
            groups: Vec::new(),
            fonts: Vec::new(),
            sprites: Vec::new(),
        }
    }
}

impl BakeConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_atlas_size(mut self, width: u32, height: u32) -> Self {
        self.atlas_width = width;
        self.atlas_height = height;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_flatness(mut self, flatness: f32) -> Self {
        self.flatness = flatness;
        self
    }

    pub fn with_sort(mut self, sort: SortHeuristic) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_debug_png(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_png = Some(path.into());
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_group(mut self, name: &str) -> Self {
        self.groups.push(name.to_string());
        self
    }

    pub fn with_atlas_group(mut self, name: &str) -> Self {
        self.atlas_group = Some(name.to_string());
        self
    }

    pub fn with_font(mut self, font: FontEntry) -> Self {
        self.fonts.push(font);
        self
    }

    pub fn with_sprite(mut self, sprite: SpriteEntry) -> Self {
        self.sprites.push(sprite);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_manifest_defaults() {
        let config = BakeConfig::new("out.bin");
        assert_eq!(config.output, PathBuf::from("out.bin"));
        assert_eq!(config.padding, 1);
        assert_eq!(config.flatness, DEFAULT_FLATNESS_PX);
        assert_eq!(config.sort, SortHeuristic::Height);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn codepoint_ranges_are_inclusive() {
        let font = FontEntry::new("mono", PathBuf::from("mono.ttf"), 16.0)
            .with_codepoints(65..=67)
            .with_codepoints(97..=97);
        let cps: Vec<u32> = font.codepoint_iter().collect();
        assert_eq!(cps, vec![65, 66, 67, 97]);
    }
}
