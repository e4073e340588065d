use thiserror::Error;

/// Everything that can go wrong while reading a TrueType file.
///
/// All variants except [`FontError::UnsupportedGlyph`] describe a malformed
/// or unsupported font file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FontError {
    #[error("font is missing required table `{0}`")]
    MissingTable(&'static str),
    #[error("unsupported indexToLocFormat {0}")]
    UnsupportedLocaFormat(i16),
    #[error("font has no unicode cmap subtable")]
    NoUnicodeCmap,
    #[error("read of {len} bytes at offset {offset} overruns the font data")]
    OutOfBounds { offset: usize, len: usize },
    #[error("glyph {glyph} out of range (font has {count} glyphs)")]
    GlyphOutOfRange { glyph: u32, count: u16 },
    #[error("glyph {glyph} has malformed outline data: {reason}")]
    MalformedGlyph { glyph: u16, reason: &'static str },
    #[error("degenerate font metrics: {0}")]
    DegenerateMetrics(&'static str),
    #[error("glyph {0} is a composite glyph, which is not supported")]
    UnsupportedGlyph(u16),
}

impl FontError {
    /// True for errors caused by the file itself rather than by a glyph kind
    /// the baker refuses to handle.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, FontError::UnsupportedGlyph(_))
    }
}
