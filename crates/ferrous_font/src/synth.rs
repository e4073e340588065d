//! In-memory TrueType builder.
//!
//! Assembles a minimal but valid font (`cmap`, `glyf`, `head`, `hhea`,
//! `hmtx`, `loca`, `maxp` and optionally `kern`) from a list of glyph
//! outlines. Used by the test suites of every crate that consumes fonts, so
//! no binary fixtures need to be checked in.

use crate::outline::OutlinePoint;

const UNITS_PER_EM: u16 = 1000;

/// One glyph of a synthetic font.
#[derive(Debug, Clone)]
pub struct SynthGlyph {
    advance: u16,
    lsb: i16,
    contours: Vec<Vec<OutlinePoint>>,
    composite: bool,
}

impl SynthGlyph {
    pub fn new(advance: u16, lsb: i16) -> Self {
        Self {
            advance,
            lsb,
            contours: Vec::new(),
            composite: false,
        }
    }

    /// A glyph with no outline at all (two equal `loca` entries).
    pub fn empty(advance: u16, lsb: i16) -> Self {
        Self::new(advance, lsb)
    }

    /// A glyph whose record claims to be composite.
    pub fn composite(advance: u16) -> Self {
        Self {
            composite: true,
            ..Self::new(advance, 0)
        }
    }

    /// Adds a contour made only of on-curve points.
    pub fn contour(self, points: &[(i16, i16)]) -> Self {
        let points: Vec<_> = points.iter().map(|&(x, y)| OutlinePoint::on(x, y)).collect();
        self.points(&points)
    }

    /// Adds a contour with explicit on/off-curve points.
    pub fn points(mut self, points: &[OutlinePoint]) -> Self {
        self.contours.push(points.to_vec());
        self
    }

    fn has_outline(&self) -> bool {
        self.composite || self.contours.iter().any(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct FontBuilder {
    ascent: i16,
    descent: i16,
    line_gap: i16,
    glyphs: Vec<SynthGlyph>,
    mappings: Vec<(u16, u16)>,
    kerning: Vec<(u16, u16, i16)>,
    glyph_id_array: bool,
    /// (platform, encoding) records sharing the main format 4 subtable.
    cmap_records: Vec<(u16, u16)>,
    /// Records with their own subtable, written before the shared ones.
    extra_cmaps: Vec<(u16, u16, Vec<(u16, u16)>)>,
    long_loca: bool,
    loca_format_override: Option<i16>,
    omitted: Vec<[u8; 4]>,
}

impl FontBuilder {
    pub fn new(ascent: i16, descent: i16, line_gap: i16) -> Self {
        Self {
            ascent,
            descent,
            line_gap,
            glyphs: Vec::new(),
            mappings: Vec::new(),
            kerning: Vec::new(),
            glyph_id_array: false,
            cmap_records: vec![(3, 1)],
            extra_cmaps: Vec::new(),
            long_loca: false,
            loca_format_override: None,
            omitted: Vec::new(),
        }
    }

    /// Appends a glyph; the first one added becomes glyph 0.
    pub fn glyph(mut self, glyph: SynthGlyph) -> Self {
        self.glyphs.push(glyph);
        self
    }

    /// Maps a BMP codepoint to a glyph index.
    pub fn map(mut self, codepoint: u32, glyph: u16) -> Self {
        self.mappings.push((codepoint as u16, glyph));
        self
    }

    pub fn kern(mut self, left: u16, right: u16, value: i16) -> Self {
        self.kerning.push((left, right, value));
        self
    }

    /// Resolve cmap segments through `glyphIdArray` instead of `idDelta`.
    pub fn use_glyph_id_array(mut self, enabled: bool) -> Self {
        self.glyph_id_array = enabled;
        self
    }

    /// Platform/encoding IDs of the records pointing at the main subtable.
    /// Defaults to Microsoft Unicode BMP `(3, 1)`.
    pub fn cmap_records(mut self, records: &[(u16, u16)]) -> Self {
        self.cmap_records = records.to_vec();
        self
    }

    /// Adds a record with its own format 4 subtable holding `mappings`.
    pub fn extra_cmap(mut self, platform: u16, encoding: u16, mappings: &[(u32, u16)]) -> Self {
        let mappings = mappings.iter().map(|&(cp, g)| (cp as u16, g)).collect();
        self.extra_cmaps.push((platform, encoding, mappings));
        self
    }

    pub fn long_loca(mut self, enabled: bool) -> Self {
        self.long_loca = enabled;
        self
    }

    /// Writes a raw `indexToLocFormat` value into `head`.
    pub fn loca_format_value(mut self, value: i16) -> Self {
        self.loca_format_override = Some(value);
        self
    }

    pub fn without_table(mut self, tag: [u8; 4]) -> Self {
        self.omitted.push(tag);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let (glyf, loca) = self.build_glyf_and_loca();
        let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
            (*b"cmap", self.build_cmap()),
            (*b"glyf", glyf),
            (*b"head", self.build_head()),
            (*b"hhea", self.build_hhea()),
            (*b"hmtx", self.build_hmtx()),
            (*b"loca", loca),
            (*b"maxp", self.build_maxp()),
        ];
        if !self.kerning.is_empty() {
            tables.push((*b"kern", self.build_kern()));
        }
        tables.retain(|(tag, _)| !self.omitted.contains(tag));
        tables.sort_by_key(|(tag, _)| *tag);
        assemble(&tables)
    }

    fn long_metric_count(&self) -> usize {
        let mut count = self.glyphs.len();
        while count > 1 && self.glyphs[count - 1].advance == self.glyphs[count - 2].advance {
            count -= 1;
        }
        count
    }

    fn build_head(&self) -> Vec<u8> {
        let mut b = vec![0u8; 54];
        put_u32(&mut b, 0, 0x0001_0000);
        put_u32(&mut b, 12, 0x5F0F_3CF5);
        put_u16(&mut b, 18, UNITS_PER_EM);
        let format = self
            .loca_format_override
            .unwrap_or(if self.long_loca { 1 } else { 0 });
        put_u16(&mut b, 50, format as u16);
        b
    }

    fn build_maxp(&self) -> Vec<u8> {
        let mut b = vec![0u8; 6];
        put_u32(&mut b, 0, 0x0000_5000);
        put_u16(&mut b, 4, self.glyphs.len() as u16);
        b
    }

    fn build_hhea(&self) -> Vec<u8> {
        let mut b = vec![0u8; 36];
        put_u32(&mut b, 0, 0x0001_0000);
        put_u16(&mut b, 4, self.ascent as u16);
        put_u16(&mut b, 6, self.descent as u16);
        put_u16(&mut b, 8, self.line_gap as u16);
        put_u16(&mut b, 34, self.long_metric_count() as u16);
        b
    }

    fn build_hmtx(&self) -> Vec<u8> {
        let long = self.long_metric_count();
        let mut b = Vec::new();
        for (i, g) in self.glyphs.iter().enumerate() {
            if i < long {
                b.extend_from_slice(&g.advance.to_be_bytes());
            }
            b.extend_from_slice(&g.lsb.to_be_bytes());
        }
        b
    }

    fn build_glyf_and_loca(&self) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = Vec::new();
        let mut offsets = vec![0usize];
        for g in &self.glyphs {
            if g.has_outline() {
                glyf.extend(encode_glyph(g));
                while glyf.len() % 4 != 0 {
                    glyf.push(0);
                }
            }
            offsets.push(glyf.len());
        }

        let mut loca = Vec::new();
        for off in offsets {
            if self.long_loca {
                loca.extend_from_slice(&(off as u32).to_be_bytes());
            } else {
                loca.extend_from_slice(&((off / 2) as u16).to_be_bytes());
            }
        }
        (glyf, loca)
    }

    fn build_cmap(&self) -> Vec<u8> {
        let mut subtables = Vec::new();
        let mut records = Vec::new();
        for (platform, encoding, mappings) in &self.extra_cmaps {
            records.push((*platform, *encoding, subtables.len()));
            subtables.push(format4_subtable(mappings, false));
        }
        let shared = subtables.len();
        subtables.push(format4_subtable(&self.mappings, self.glyph_id_array));
        for &(platform, encoding) in &self.cmap_records {
            records.push((platform, encoding, shared));
        }

        let mut offsets = Vec::with_capacity(subtables.len());
        let mut offset = 4 + 8 * records.len();
        for sub in &subtables {
            offsets.push(offset as u32);
            offset += sub.len();
        }

        let mut b = Vec::new();
        extend_u16s(&mut b, &[0, records.len() as u16]);
        for (platform, encoding, sub) in records {
            extend_u16s(&mut b, &[platform, encoding]);
            b.extend_from_slice(&offsets[sub].to_be_bytes());
        }
        for sub in subtables {
            b.extend(sub);
        }
        b
    }

    fn build_kern(&self) -> Vec<u8> {
        let mut pairs = self.kerning.clone();
        pairs.sort_by_key(|&(l, r, _)| (l as u32) << 16 | r as u32);

        let n = pairs.len();
        let search_range = 6 * largest_power_of_two(n);
        let mut b = Vec::new();
        extend_u16s(
            &mut b,
            &[
                0,
                1,
                0,
                (14 + 6 * n) as u16,
                1,
                n as u16,
                search_range as u16,
                largest_power_of_two(n).trailing_zeros() as u16,
                (6 * n - search_range) as u16,
            ],
        );
        for (l, r, v) in pairs {
            extend_u16s(&mut b, &[l, r, v as u16]);
        }
        b
    }
}

fn encode_glyph(glyph: &SynthGlyph) -> Vec<u8> {
    let mut b = Vec::new();
    if glyph.composite {
        extend_u16s(&mut b, &[(-1i16) as u16, 0, 0, 10, 10]);
        // flags (ARGS_ARE_XY_VALUES), component glyph 0, two byte args
        extend_u16s(&mut b, &[0x0002, 0, 0]);
        return b;
    }

    let points: Vec<OutlinePoint> = glyph.contours.iter().flatten().copied().collect();
    let x_min = points.iter().map(|p| p.x).min().unwrap_or(0);
    let y_min = points.iter().map(|p| p.y).min().unwrap_or(0);
    let x_max = points.iter().map(|p| p.x).max().unwrap_or(0);
    let y_max = points.iter().map(|p| p.y).max().unwrap_or(0);

    extend_u16s(
        &mut b,
        &[
            glyph.contours.len() as u16,
            x_min as u16,
            y_min as u16,
            x_max as u16,
            y_max as u16,
        ],
    );
    let mut end = 0usize;
    for contour in &glyph.contours {
        end += contour.len();
        b.extend_from_slice(&(end as u16 - 1).to_be_bytes());
    }
    // no instructions
    b.extend_from_slice(&0u16.to_be_bytes());

    let mut flags = Vec::with_capacity(points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut px, mut py) = (0i16, 0i16);
    for p in &points {
        let mut flag = if p.on_curve { 0x01 } else { 0 };
        flag |= encode_delta(p.x.wrapping_sub(px), 0x02, 0x10, &mut xs);
        flag |= encode_delta(p.y.wrapping_sub(py), 0x04, 0x20, &mut ys);
        flags.push(flag);
        px = p.x;
        py = p.y;
    }

    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let mut run = 1;
        while i + run < flags.len() && flags[i + run] == flag && run < 256 {
            run += 1;
        }
        if run > 1 {
            b.push(flag | 0x08);
            b.push((run - 1) as u8);
        } else {
            b.push(flag);
        }
        i += run;
    }
    b.extend(xs);
    b.extend(ys);
    b
}

fn encode_delta(delta: i16, short_bit: u8, same_bit: u8, out: &mut Vec<u8>) -> u8 {
    if delta == 0 {
        same_bit
    } else if delta.unsigned_abs() <= 255 {
        out.push(delta.unsigned_abs() as u8);
        if delta > 0 {
            short_bit | same_bit
        } else {
            short_bit
        }
    } else {
        out.extend_from_slice(&delta.to_be_bytes());
        0
    }
}

fn assemble(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let n = tables.len();
    let search_range = 16 * largest_power_of_two(n);
    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    extend_u16s(
        &mut font,
        &[
            n as u16,
            search_range as u16,
            largest_power_of_two(n).trailing_zeros() as u16,
            (16 * n - search_range) as u16,
        ],
    );

    let mut offset = 12 + 16 * n;
    let mut body = Vec::new();
    for (tag, data) in tables {
        font.extend_from_slice(tag);
        font.extend_from_slice(&checksum(data).to_be_bytes());
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * n + body.len();
    }
    font.extend(body);
    font
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// A format 4 subtable with one segment per mapping plus the closing 0xFFFF
/// segment.
fn format4_subtable(mappings: &[(u16, u16)], glyph_id_array: bool) -> Vec<u8> {
    let mut mappings = mappings.to_vec();
    mappings.sort_by_key(|&(cp, _)| cp);
    mappings.dedup_by_key(|&mut (cp, _)| cp);
    mappings.retain(|&(cp, _)| cp != 0xFFFF);

    let seg_count = mappings.len() + 1;
    let mut ends = Vec::with_capacity(seg_count);
    let mut starts = Vec::with_capacity(seg_count);
    let mut deltas = Vec::with_capacity(seg_count);
    let mut range_offsets = Vec::with_capacity(seg_count);
    let mut glyph_ids = Vec::new();

    for &(cp, glyph) in &mappings {
        ends.push(cp);
        starts.push(cp);
        if glyph_id_array {
            deltas.push(0u16);
            // each segment's entry sits at the same index in glyphIdArray
            range_offsets.push((2 * seg_count) as u16);
            glyph_ids.push(glyph);
        } else {
            deltas.push(glyph.wrapping_sub(cp));
            range_offsets.push(0);
        }
    }
    ends.push(0xFFFF);
    starts.push(0xFFFF);
    deltas.push(1);
    range_offsets.push(0);

    let mut sub = Vec::new();
    let length = 16 + 8 * seg_count + 2 * glyph_ids.len();
    let search_range = 2 * largest_power_of_two(seg_count);
    for v in [
        4,
        length as u16,
        0,
        (seg_count * 2) as u16,
        search_range as u16,
        search_range.trailing_zeros().saturating_sub(1) as u16,
        (seg_count * 2 - search_range) as u16,
    ] {
        sub.extend_from_slice(&v.to_be_bytes());
    }
    extend_u16s(&mut sub, &ends);
    sub.extend_from_slice(&0u16.to_be_bytes());
    extend_u16s(&mut sub, &starts);
    extend_u16s(&mut sub, &deltas);
    extend_u16s(&mut sub, &range_offsets);
    extend_u16s(&mut sub, &glyph_ids);

    sub
}

fn largest_power_of_two(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn extend_u16s(buf: &mut Vec<u8>, values: &[u16]) {
    for v in values {
        buf.extend_from_slice(&v.to_be_bytes());
    }
}
