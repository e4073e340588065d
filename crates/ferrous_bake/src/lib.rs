//! Bake driver: reads a manifest, packs every font and sprite into one atlas
//! and writes the asset archive.
//!
//! ```rust,ignore
//! use ferrous_bake::{bake, BakeConfig, FontEntry, SpriteEntry};
//!
//! let config = BakeConfig::new("assets.bin")
//!     .with_atlas_size(512, 512)
//!     .with_font(FontEntry::new("mono", PathBuf::from("mono.ttf"), 32.0).with_codepoints(32..=126))
//!     .with_sprite(SpriteEntry::new("blank", PathBuf::from("blank.png")));
//! let report = bake(&config)?;
//! ```

pub mod config;
pub mod logging;
pub mod manifest;
pub mod pipeline;

pub use config::{BakeConfig, FontEntry, FontSource, SpriteEntry, TagEntry};
pub use logging::{effective_level, init_logging};
pub use manifest::{load_config, Manifest};
pub use pipeline::{bake, BakeReport};
