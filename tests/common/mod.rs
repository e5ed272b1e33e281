//! A tiny sfnt builder: just enough of a font for shaping tests, built
//! table-by-table so each test controls exactly which layout tables exist.

#![allow(dead_code)]

pub struct Writer {
    pub data: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { data: Vec::new() }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn tag(&mut self, tag: &[u8; 4]) -> &mut Self {
        self.data.extend_from_slice(tag);
        self
    }
}

pub struct FontBuilder {
    tables: Vec<([u8; 4], Vec<u8>)>,
}

impl FontBuilder {
    pub fn new() -> Self {
        FontBuilder { tables: Vec::new() }
    }

    pub fn table(&mut self, tag: &[u8; 4], data: Vec<u8>) -> &mut Self {
        self.tables.push((*tag, data));
        self
    }

    /// Serializes the font: offset table, directory sorted by tag, then the
    /// table data, each 4-byte aligned.
    pub fn build(&mut self) -> Vec<u8> {
        self.tables.sort_by_key(|(tag, _)| *tag);

        let num_tables = self.tables.len() as u16;
        let mut w = Writer::new();
        w.u32(0x00010000);
        w.u16(num_tables);
        // searchRange / entrySelector / rangeShift
        let mut entry_selector = 0u16;
        while (2u16 << entry_selector) <= num_tables && entry_selector < 15 {
            entry_selector += 1;
        }
        entry_selector = entry_selector.saturating_sub(1);
        let search_range = (1u16 << entry_selector) * 16;
        w.u16(search_range);
        w.u16(entry_selector);
        w.u16(num_tables * 16 - search_range);

        let mut offset = 12 + 16 * self.tables.len() as u32;
        let mut records = Writer::new();
        let mut body: Vec<u8> = Vec::new();
        for (tag, data) in &self.tables {
            records.tag(tag);
            records.u32(0); // checksum; not validated by the parser
            records.u32(offset);
            records.u32(data.len() as u32);

            body.extend_from_slice(data);
            let padding = (4 - data.len() % 4) % 4;
            body.extend_from_slice(&[0; 4][..padding]);
            offset += (data.len() + padding) as u32;
        }

        w.data.extend_from_slice(&records.data);
        w.data.extend_from_slice(&body);
        w.data
    }
}

pub const UPEM: u16 = 1000;
pub const ASCENDER: i16 = 800;
pub const DESCENDER: i16 = -200;

pub fn head() -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000); // version
    w.u32(0); // fontRevision
    w.u32(0); // checkSumAdjustment
    w.u32(0x5F0F3CF5); // magicNumber
    w.u16(0); // flags
    w.u16(UPEM); // unitsPerEm
    w.u32(0).u32(0); // created
    w.u32(0).u32(0); // modified
    w.i16(0).i16(DESCENDER).i16(1000).i16(ASCENDER); // bbox
    w.u16(0); // macStyle
    w.u16(8); // lowestRecPPEM
    w.i16(2); // fontDirectionHint
    w.i16(0); // indexToLocFormat
    w.i16(0); // glyphDataFormat
    w.data
}

pub fn hhea(number_of_metrics: u16) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000); // version
    w.i16(ASCENDER);
    w.i16(DESCENDER);
    w.i16(0); // lineGap
    w.u16(1000); // advanceWidthMax
    w.i16(0); // minLeftSideBearing
    w.i16(0); // minRightSideBearing
    w.i16(1000); // xMaxExtent
    w.i16(1); // caretSlopeRise
    w.i16(0); // caretSlopeRun
    w.i16(0); // caretOffset
    w.i16(0).i16(0).i16(0).i16(0); // reserved
    w.i16(0); // metricDataFormat
    w.u16(number_of_metrics);
    w.data
}

pub fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00005000); // version 0.5
    w.u16(num_glyphs);
    w.data
}

pub fn hmtx(advances: &[u16]) -> Vec<u8> {
    let mut w = Writer::new();
    for &advance in advances {
        w.u16(advance);
        w.i16(0); // lsb
    }
    w.data
}

/// cmap with a single format-12 subtable for Windows/Unicode-full.
pub fn cmap(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut sorted = mappings.to_vec();
    sorted.sort();

    let mut w = Writer::new();
    w.u16(0); // version
    w.u16(1); // numTables
    w.u16(3); // platformID: Windows
    w.u16(10); // encodingID: Unicode full repertoire
    w.u32(12); // offset

    // Format 12 subtable.
    w.u16(12); // format
    w.u16(0); // reserved
    w.u32(16 + 12 * sorted.len() as u32); // length
    w.u32(0); // language
    w.u32(sorted.len() as u32); // numGroups
    for &(code, glyph) in &sorted {
        w.u32(code); // startCharCode
        w.u32(code); // endCharCode
        w.u32(u32::from(glyph)); // startGlyphID
    }
    w.data
}

/// GDEF with a format-2 glyph class definition: (first, last, class) ranges.
/// Classes: 1 = base, 2 = ligature, 3 = mark.
pub fn gdef(classes: &[(u16, u16, u16)]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(1); // majorVersion
    w.u16(0); // minorVersion
    w.u16(12); // glyphClassDefOffset
    w.u16(0); // attachListOffset
    w.u16(0); // ligCaretListOffset
    w.u16(0); // markAttachClassDefOffset

    // ClassDef format 2.
    w.u16(2);
    w.u16(classes.len() as u16);
    for &(first, last, class) in classes {
        w.u16(first);
        w.u16(last);
        w.u16(class);
    }
    w.data
}

pub struct Lookup {
    pub lookup_type: u16,
    pub flags: u16,
    pub subtable: Vec<u8>,
}

/// A GSUB or GPOS table with one script, its default language system, and
/// `features` in list order, each naming the lookups it triggers.
pub fn layout_table(script: &[u8; 4], features: &[(&[u8; 4], &[u16])], lookups: &[Lookup]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000); // version

    // Header: scriptList, featureList, lookupList offsets.
    let script_list_offset = 10u16;
    // ScriptList: count + 1 record + Script table + LangSys.
    let script_list_len = 2 + 6 + 4 + (6 + 2 * count_default_features(features));
    let feature_list_offset = script_list_offset + script_list_len;
    let mut feature_list_len = 2 + 6 * features.len() as u16;
    for (_, lookup_indices) in features {
        feature_list_len += 4 + 2 * lookup_indices.len() as u16;
    }
    let lookup_list_offset = feature_list_offset + feature_list_len;

    w.u16(script_list_offset);
    w.u16(feature_list_offset);
    w.u16(lookup_list_offset);

    // ScriptList.
    w.u16(1); // scriptCount
    w.tag(script);
    w.u16(8); // offset to Script table, from ScriptList start

    // Script table.
    w.u16(4); // defaultLangSysOffset, from Script table start
    w.u16(0); // langSysCount

    // LangSys.
    w.u16(0); // lookupOrderOffset
    w.u16(0xFFFF); // requiredFeatureIndex
    w.u16(count_default_features(features)); // featureIndexCount
    for i in 0..count_default_features(features) {
        w.u16(i);
    }

    // FeatureList.
    w.u16(features.len() as u16);
    let mut feature_offset = 2 + 6 * features.len() as u16;
    for (tag, lookup_indices) in features {
        w.tag(tag);
        w.u16(feature_offset);
        feature_offset += 4 + 2 * lookup_indices.len() as u16;
    }
    for (_, lookup_indices) in features {
        w.u16(0); // featureParamsOffset
        w.u16(lookup_indices.len() as u16);
        for &index in *lookup_indices {
            w.u16(index);
        }
    }

    // LookupList.
    w.u16(lookups.len() as u16);
    let mut lookup_offset = 2 + 2 * lookups.len() as u16;
    for lookup in lookups {
        w.u16(lookup_offset);
        lookup_offset += 8 + lookup.subtable.len() as u16;
    }
    for lookup in lookups {
        w.u16(lookup.lookup_type);
        w.u16(lookup.flags);
        w.u16(1); // subTableCount
        w.u16(8); // subtable offset, from Lookup start
        w.data.extend_from_slice(&lookup.subtable);
    }

    w.data
}

fn count_default_features(features: &[(&[u8; 4], &[u16])]) -> u16 {
    features.len() as u16
}

/// Coverage table, format 1.
fn coverage(glyphs: &[u16]) -> Vec<u8> {
    let mut sorted = glyphs.to_vec();
    sorted.sort_unstable();

    let mut w = Writer::new();
    w.u16(1);
    w.u16(sorted.len() as u16);
    for glyph in sorted {
        w.u16(glyph);
    }
    w.data
}

/// GSUB type 1 format 1: adds `delta` to every covered glyph.
pub fn single_subst(glyphs: &[u16], delta: i16) -> Lookup {
    let cov = coverage(glyphs);
    let mut w = Writer::new();
    w.u16(1); // format
    w.u16(6); // coverageOffset
    w.i16(delta);
    w.data.extend_from_slice(&cov);

    Lookup {
        lookup_type: 1,
        flags: 0,
        subtable: w.data,
    }
}

/// GSUB type 4: one ligature, `first` followed by `components` becomes `lig`.
pub fn ligature_subst(first: u16, components: &[u16], lig: u16) -> Lookup {
    let mut w = Writer::new();
    w.u16(1); // format
    let ligature_set_offset = 8u16;
    let coverage_offset = ligature_set_offset + 4 + (4 + 2 * components.len() as u16);
    w.u16(coverage_offset);
    w.u16(1); // ligatureSetCount
    w.u16(ligature_set_offset);

    // LigatureSet.
    w.u16(1); // ligatureCount
    w.u16(4); // ligatureOffset, from LigatureSet start

    // Ligature.
    w.u16(lig);
    w.u16(components.len() as u16 + 1); // componentCount, including first
    for &component in components {
        w.u16(component);
    }

    w.data.extend_from_slice(&coverage(&[first]));

    Lookup {
        lookup_type: 4,
        flags: 0,
        subtable: w.data,
    }
}

/// GPOS type 2 format 1: x-advance adjustment for the pair (first, second).
pub fn pair_pos(first: u16, second: u16, x_advance: i16) -> Lookup {
    let mut w = Writer::new();
    w.u16(1); // format
    w.u16(12 + 8); // coverageOffset: header + one PairSet
    w.u16(0x0004); // valueFormat1: XAdvance
    w.u16(0); // valueFormat2
    w.u16(1); // pairSetCount
    w.u16(12); // pairSetOffset

    // PairSet.
    w.u16(1); // pairValueCount
    w.u16(second);
    w.i16(x_advance);
    w.u16(0); // padding to keep the coverage offset even

    w.data.extend_from_slice(&coverage(&[first]));

    Lookup {
        lookup_type: 2,
        flags: 0,
        subtable: w.data,
    }
}

/// An OpenType `kern` table, format 0, horizontal.
pub fn kern(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(0); // version
    w.u16(1); // nTables

    let n_pairs = pairs.len() as u16;
    w.u16(0); // subtable version
    w.u16(14 + 6 * n_pairs); // length
    w.u16(0x0001); // coverage: horizontal, format 0

    let mut entry_selector = 0u16;
    while (2u16 << entry_selector) <= n_pairs && entry_selector < 15 {
        entry_selector += 1;
    }
    entry_selector = entry_selector.saturating_sub(1);
    let search_range = (1u16 << entry_selector) * 6;
    w.u16(n_pairs);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(n_pairs * 6 - search_range);

    let mut sorted = pairs.to_vec();
    sorted.sort();
    for (left, right, value) in sorted {
        w.u16(left);
        w.u16(right);
        w.i16(value);
    }
    w.data
}

/// A `morx` with no chains: enough for backend-election tests.
pub fn empty_morx() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(2); // version
    w.u16(0); // unused
    w.u32(0); // nChains
    w.data
}

/// A `kerx` with no subtables: enough for backend-election tests.
pub fn empty_kerx() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(2); // version
    w.u16(0); // unused
    w.u32(0); // nTables
    w.data
}

/// A font whose glyph ids are assigned in `mappings` order, with the given
/// advances and optional extra tables.
pub fn base_font(mappings: &[(u32, u16)], advances: &[u16]) -> FontBuilder {
    let mut builder = FontBuilder::new();
    builder
        .table(b"head", head())
        .table(b"hhea", hhea(advances.len() as u16))
        .table(b"maxp", maxp(advances.len() as u16))
        .table(b"hmtx", hmtx(advances))
        .table(b"cmap", cmap(mappings));
    builder
}
