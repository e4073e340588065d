use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ferrous_assets::format::MAX_CODEPOINT;
use ferrous_assets::{Atlas, ArchiveBuilder, AtlasBuilder};
use log::{debug, info};

use crate::config::{BakeConfig, FontSource, TagEntry};

/// Lo que produjo un bake completo.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeReport {
    pub output: PathBuf,
    pub bytes_written: u64,
    /// Including the reserved null asset.
    pub asset_count: u32,
    pub atlas_width: u32,
    pub atlas_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Atlas,
    Font(usize),
    Sprite(usize),
}

/// One contiguous run of assets; `group` indexes `BakeConfig::groups`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    group: Option<usize>,
    entries: Vec<Entry>,
}

/// Every group an asset names must be declared, once.
fn check_groups(config: &BakeConfig) -> Result<()> {
    for (i, name) in config.groups.iter().enumerate() {
        if config.groups[..i].contains(name) {
            bail!("group `{name}` is declared twice");
        }
    }
    let check = |owner: String, group: &Option<String>| -> Result<()> {
        match group {
            Some(g) if !config.groups.contains(g) => {
                bail!("{owner} refers to undeclared group `{g}`")
            }
            _ => Ok(()),
        }
    };
    check("atlas".to_string(), &config.atlas_group)?;
    for font in &config.fonts {
        check(format!("font `{}`", font.name), &font.group)?;
    }
    for sprite in &config.sprites {
        check(format!("sprite `{}`", sprite.name), &sprite.group)?;
    }
    Ok(())
}

/// Ranges are checked before they are expanded into codepoint lists.
fn check_codepoints(config: &BakeConfig) -> Result<()> {
    for font in &config.fonts {
        for range in &font.codepoints {
            if range.start() > range.end() {
                bail!("font `{}`: codepoint range {range:?} is reversed", font.name);
            }
            if *range.end() > MAX_CODEPOINT {
                bail!("font `{}`: codepoint {:#X} is beyond U+10FFFF", font.name, range.end());
            }
        }
    }
    Ok(())
}

/// Declared groups in order, then everything without a group. Inside a run
/// the atlas goes first, then fonts, then sprites.
fn plan_runs(config: &BakeConfig) -> Vec<Run> {
    let collect = |group: Option<&str>| {
        let mut entries = Vec::new();
        if config.atlas_group.as_deref() == group {
            entries.push(Entry::Atlas);
        }
        entries.extend(
            config
                .fonts
                .iter()
                .enumerate()
                .filter(|(_, f)| f.group.as_deref() == group)
                .map(|(i, _)| Entry::Font(i)),
        );
        entries.extend(
            config
                .sprites
                .iter()
                .enumerate()
                .filter(|(_, s)| s.group.as_deref() == group)
                .map(|(i, _)| Entry::Sprite(i)),
        );
        entries
    };

    let mut runs: Vec<Run> = config
        .groups
        .iter()
        .enumerate()
        .map(|(i, name)| Run {
            group: Some(i),
            entries: collect(Some(name.as_str())),
        })
        .collect();
    let ungrouped = collect(None);
    if !ungrouped.is_empty() {
        runs.push(Run {
            group: None,
            entries: ungrouped,
        });
    }
    runs
}

fn build_atlas(config: &BakeConfig) -> Result<Atlas> {
    let mut builder = AtlasBuilder::new(config.atlas_width, config.atlas_height)
        .with_padding(config.padding)
        .with_flatness(config.flatness)
        .with_sort(config.sort);

    for font in &config.fonts {
        let data = match &font.source {
            FontSource::File(path) => fs::read(path)
                .with_context(|| format!("font `{}`: could not read {}", font.name, path.display()))?,
            FontSource::Memory(bytes) => bytes.clone(),
        };
        builder.push_font(font.name.as_str(), data, font.pixel_height, font.codepoint_iter());
    }
    for sprite in &config.sprites {
        builder.push_sprite(sprite.name.as_str(), sprite.source.clone());
    }

    Ok(builder.build()?)
}

fn push_tags(archive: &mut ArchiveBuilder, tags: &[TagEntry]) -> Result<()> {
    for tag in tags {
        archive.add_tag(tag.kind, tag.value)?;
    }
    Ok(())
}

fn build_archive(config: &BakeConfig, atlas: &Atlas) -> Result<ArchiveBuilder> {
    let runs = plan_runs(config);

    // sprites and fonts reference the atlas by index, so find it up front
    let atlas_id = runs
        .iter()
        .flat_map(|run| run.entries.iter())
        .position(|e| *e == Entry::Atlas)
        .map(|p| p as u32 + 1)
        .ok_or_else(|| anyhow!("the atlas bitmap is not part of any run"))?;

    let mut archive = ArchiveBuilder::new();
    for run in &runs {
        if let Some(group) = run.group {
            archive.begin_group()?;
            debug!("group `{}`: {} assets", config.groups[group], run.entries.len());
        }
        for entry in &run.entries {
            match *entry {
                Entry::Atlas => {
                    let id = archive.push_atlas(atlas)?;
                    debug_assert_eq!(id, atlas_id);
                }
                Entry::Font(i) => {
                    archive.push_font(atlas_id, &atlas.fonts[i])?;
                    push_tags(&mut archive, &config.fonts[i].tags)?;
                }
                Entry::Sprite(i) => {
                    archive.push_sprite(atlas_id, atlas.sprites[i].uv);
                    push_tags(&mut archive, &config.sprites[i].tags)?;
                }
            }
        }
        if run.group.is_some() {
            archive.end_group()?;
        }
    }
    Ok(archive)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;
    }
    Ok(())
}

/// Ejecuta el pipeline completo: atlas, PNG de depuración y archivo binario.
pub fn bake(config: &BakeConfig) -> Result<BakeReport> {
    info!(
        "baking {} fonts and {} sprites into {}",
        config.fonts.len(),
        config.sprites.len(),
        config.output.display()
    );

    check_groups(config)?;
    check_codepoints(config)?;
    let atlas = build_atlas(config).context("could not build the atlas")?;

    if let Some(path) = &config.debug_png {
        ensure_parent(path)?;
        atlas
            .save_png(path)
            .with_context(|| format!("could not write debug atlas {}", path.display()))?;
        info!("debug atlas written to {}", path.display());
    }

    let archive = build_archive(config, &atlas)?;

    ensure_parent(&config.output)?;
    let file = File::create(&config.output)
        .with_context(|| format!("could not create {}", config.output.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes_written = archive
        .write(&mut writer)
        .with_context(|| format!("could not write {}", config.output.display()))?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("could not flush {}", config.output.display()))?;

    Ok(BakeReport {
        output: config.output.clone(),
        bytes_written,
        asset_count: archive.assets().len() as u32,
        atlas_width: atlas.width,
        atlas_height: atlas.height,
    })
}
