//! TOML bake manifest.
//!
//! ```toml
//! output = "assets.bin"
//! debug_png = "atlas.png"
//!
//! [atlas]
//! width = 512
//! height = 512
//! sort = "area"
//! group = "atlas"
//!
//! [[group]]
//! name = "atlas"
//!
//! [[font]]
//! name = "mono"
//! path = "fonts/mono.ttf"
//! pixel_height = 32.0
//! codepoints = [[32, 126]]
//! tags = [{ kind = 0, value = 1.0 }]
//!
//! [[sprite]]
//! name = "blank"
//! path = "sprites/blank.png"
//! ```
//!
//! Relative paths resolve against the directory holding the manifest.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use ferrous_assets::format::MAX_CODEPOINT;
use ferrous_assets::SortHeuristic;
use ferrous_font::DEFAULT_FLATNESS_PX;
use log::LevelFilter;
use serde::Deserialize;

use crate::config::{BakeConfig, FontEntry, FontSource, SpriteEntry, TagEntry};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub output: PathBuf,
    pub log_level: Option<String>,
    pub debug_png: Option<PathBuf>,
    #[serde(default)]
    pub atlas: AtlasSection,
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupSection>,
    #[serde(default, rename = "font")]
    pub fonts: Vec<FontSection>,
    #[serde(default, rename = "sprite")]
    pub sprites: Vec<SpriteSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AtlasSection {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub flatness: f32,
    pub sort: String,
    pub group: Option<String>,
}

impl Default for AtlasSection {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            padding: 1,
            flatness: DEFAULT_FLATNESS_PX,
            sort: SortHeuristic::default().name().to_string(),
            group: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSection {
    pub kind: u32,
    pub value: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontSection {
    pub name: String,
    pub path: PathBuf,
    pub pixel_height: f32,
    /// Inclusive `[first, last]` pairs.
    pub codepoints: Vec<[u32; 2]>,
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpriteSection {
    pub name: String,
    pub path: PathBuf,
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagSection>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid bake manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Resolves paths against `base_dir` and checks every name reference.
    pub fn into_config(self, base_dir: &Path) -> Result<BakeConfig> {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base_dir.join(p) };

        let sort = SortHeuristic::from_str(&self.atlas.sort)?;
        let log_level = match &self.log_level {
            Some(level) => LevelFilter::from_str(level)
                .map_err(|_| anyhow!("unknown log level `{level}`"))?,
            None => LevelFilter::Info,
        };

        let groups: Vec<String> = self.groups.into_iter().map(|g| g.name).collect();
        for (i, name) in groups.iter().enumerate() {
            if groups[..i].contains(name) {
                bail!("group `{name}` is declared twice");
            }
        }
        let check_group = |owner: &str, group: &Option<String>| -> Result<()> {
            match group {
                Some(g) if !groups.contains(g) => {
                    bail!("{owner} refers to undeclared group `{g}`")
                }
                _ => Ok(()),
            }
        };
        check_group("atlas", &self.atlas.group)?;

        let mut config = BakeConfig {
            output: resolve(self.output),
            debug_png: self.debug_png.map(resolve),
            log_level,
            atlas_width: self.atlas.width,
            atlas_height: self.atlas.height,
            padding: self.atlas.padding,
            flatness: self.atlas.flatness,
            sort,
            atlas_group: self.atlas.group.clone(),
            groups: Vec::new(),
            fonts: Vec::with_capacity(self.fonts.len()),
            sprites: Vec::with_capacity(self.sprites.len()),
        };

        for font in self.fonts {
            check_group(&format!("font `{}`", font.name), &font.group)?;
            let mut codepoints = Vec::with_capacity(font.codepoints.len());
            for [first, last] in font.codepoints {
                if first > last {
                    bail!("font `{}`: codepoint range [{first}, {last}] is reversed", font.name);
                }
                if last > MAX_CODEPOINT {
                    bail!("font `{}`: codepoint {last:#X} is beyond U+10FFFF", font.name);
                }
                codepoints.push(first..=last);
            }
            config.fonts.push(FontEntry {
                name: font.name,
                source: FontSource::File(resolve(font.path)),
                pixel_height: font.pixel_height,
                codepoints,
                group: font.group,
                tags: font.tags.into_iter().map(TagEntry::from).collect(),
            });
        }

        for sprite in self.sprites {
            check_group(&format!("sprite `{}`", sprite.name), &sprite.group)?;
            config.sprites.push(SpriteEntry {
                name: sprite.name,
                source: resolve(sprite.path).into(),
                group: sprite.group,
                tags: sprite.tags.into_iter().map(TagEntry::from).collect(),
            });
        }

        config.groups = groups;
        Ok(config)
    }
}

impl From<TagSection> for TagEntry {
    fn from(tag: TagSection) -> Self {
        TagEntry {
            kind: tag.kind,
            value: tag.value,
        }
    }
}

/// Reads a manifest file and turns it into a [`BakeConfig`].
pub fn load_config(path: &Path) -> Result<BakeConfig> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Manifest::load(path)?.into_config(base_dir)
}
