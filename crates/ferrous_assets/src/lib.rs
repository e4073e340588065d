//! Asset baking for FerrousEngine: rect packing, atlas building and the
//! binary archive writer.

pub mod archive;
pub mod atlas;
pub mod rect_pack;
pub mod sprite;

pub use archive::{write_archive, ArchiveAsset, ArchiveBuilder, ArchiveError, AssetData};
pub use atlas::{Atlas, AtlasBuilder, AtlasError, AtlasFont, AtlasGlyph, AtlasSprite};
pub use rect_pack::{pack, PackError, PackRect, SortHeuristic, UnknownHeuristic};
pub use sprite::{encode_png, DecodeError, SpriteSource};

pub use ferrous_asset_types as format;
