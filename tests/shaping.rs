mod common;

use std::str::FromStr;

use glyphshape::{
    shape, Direction, Face, Feature, Script, SerializeFlags, ShapePlan, UnicodeBuffer,
};

use common::{base_font, layout_table};

fn shape_text(face: &Face, text: &str, direction: Direction, features: &[Feature]) -> String {
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(direction);
    let glyphs = shape(face, features, buffer);
    glyphs.serialize(face, SerializeFlags::NO_GLYPH_NAMES)
}

// A Latin-ish font: a..f and some extras, glyph ids following mapping order.
//
// gid: 1='a' 2='b' 3='c' 4='d' 5='f' 6='i' 7=fi-ligature 8='(' 9=')'
// 10='1' 11='2' 12=U+2044 13=numerator-one 14=denominator-two
const LATIN_MAPPINGS: &[(u32, u16)] = &[
    ('a' as u32, 1),
    ('b' as u32, 2),
    ('c' as u32, 3),
    ('d' as u32, 4),
    ('f' as u32, 5),
    ('i' as u32, 6),
    ('(' as u32, 8),
    (')' as u32, 9),
    ('1' as u32, 10),
    ('2' as u32, 11),
    (0x2044, 12),
    (' ' as u32, 15),
];

const LATIN_ADVANCES: &[u16] = &[
    300, 500, 600, 600, 550, 600, 350, 900, 400, 400, 500, 500, 300, 350, 350, 250,
];

fn latin_font_data(gsub: Option<Vec<u8>>, gpos: Option<Vec<u8>>, kern: Option<Vec<u8>>) -> Vec<u8> {
    let mut builder = base_font(LATIN_MAPPINGS, LATIN_ADVANCES);
    if let Some(gsub) = gsub {
        builder.table(b"GSUB", gsub);
    }
    if let Some(gpos) = gpos {
        builder.table(b"GPOS", gpos);
    }
    if let Some(kern) = kern {
        builder.table(b"kern", kern);
    }
    builder.build()
}

#[test]
fn plain_text_advances() {
    let data = latin_font_data(None, None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    assert_eq!(
        shape_text(&face, "ab", Direction::LeftToRight, &[]),
        "1=0+500|2=1+600"
    );
}

#[test]
fn standard_ligature() {
    // 'fi' forms one ligature glyph through 'liga'; both clusters collapse
    // to the first character.
    let gsub = layout_table(
        b"latn",
        &[(b"liga", &[0])],
        &[common::ligature_subst(5, &[6], 7)],
    );
    let data = latin_font_data(Some(gsub), None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    assert_eq!(
        shape_text(&face, "fi", Direction::LeftToRight, &[]),
        "7=0+900"
    );
}

#[test]
fn user_feature_with_range() {
    // 'smcp' bumps every lowercase glyph up by 20; enabled only for
    // clusters 1..3.
    let gsub = layout_table(
        b"latn",
        &[(b"smcp", &[0])],
        &[common::single_subst(&[1, 2, 3, 4], 20)],
    );
    let data = latin_font_data(Some(gsub), None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let feature = Feature::from_str("smcp[1:3]").unwrap();
    assert_eq!(
        shape_text(&face, "abcd", Direction::LeftToRight, &[feature]),
        "1=0+500|22=1+0|23=2+0|4=3+550"
    );
}

#[test]
fn user_feature_disabled_globally() {
    // A font-enabled global feature can be turned off by the user.
    let gsub = layout_table(
        b"latn",
        &[(b"liga", &[0])],
        &[common::ligature_subst(5, &[6], 7)],
    );
    let data = latin_font_data(Some(gsub), None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let feature = Feature::from_str("-liga").unwrap();
    assert_eq!(
        shape_text(&face, "fi", Direction::LeftToRight, &[feature]),
        "5=0+600|6=1+350"
    );
}

#[test]
fn gpos_pair_adjustment() {
    // Pair kerning through GPOS 'kern': (a, b) tightened by 80.
    let gpos = layout_table(b"latn", &[(b"kern", &[0])], &[common::pair_pos(1, 2, -80)]);
    let data = latin_font_data(None, Some(gpos), None);
    let face = Face::from_slice(&data, 0).unwrap();

    let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
    assert!(plan.applies_gpos());
    assert!(!plan.applies_kern());

    assert_eq!(
        shape_text(&face, "ab", Direction::LeftToRight, &[]),
        "1=0+420|2=1+600"
    );
}

#[test]
fn legacy_kern_fallback() {
    // No GPOS at all: the 'kern' table drives positioning, and the kerning
    // value is split between the pair.
    let kern = common::kern(&[(1, 2, -80)]);
    let data = latin_font_data(None, None, Some(kern));
    let face = Face::from_slice(&data, 0).unwrap();

    let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
    assert!(!plan.applies_gpos());
    assert!(plan.applies_kern());

    // kern1 = -40 on the first advance; kern2 = -40 on the second advance
    // and offset.
    assert_eq!(
        shape_text(&face, "ab", Direction::LeftToRight, &[]),
        "1=0+460|2=1@-40,0+560"
    );
}

#[test]
fn fractions_substitute_and_merge() {
    // "1⁄2" with numerator/denominator lookups: the numr glyph replaces
    // '1', the dnom glyph replaces '2', and the whole span becomes one
    // unbreakable unit.
    let gsub = layout_table(
        b"latn",
        &[
            (b"dnom", &[1]),
            (b"frac", &[]),
            (b"numr", &[0]),
        ],
        &[
            common::single_subst(&[10], 3),  // '1' -> gid 13
            common::single_subst(&[11], 3),  // '2' -> gid 14
        ],
    );
    let data = latin_font_data(Some(gsub), None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("1\u{2044}2");
    buffer.set_direction(Direction::LeftToRight);
    let glyphs = shape(&face, &[], buffer);

    let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
    assert_eq!(ids, &[13, 12, 14]);
}

#[test]
fn rtl_mirrors_brackets() {
    // In an RTL run, '(' picks up the ')' glyph when the font has one.
    let data = latin_font_data(None, None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("(");
    buffer.set_direction(Direction::RightToLeft);
    buffer.set_script(Script::from_str("Hebr").unwrap());
    let glyphs = shape(&face, &[], buffer);

    assert_eq!(glyphs.glyph_infos()[0].glyph_id, 9);
}

#[test]
fn rtl_output_is_reversed() {
    let data = latin_font_data(None, None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("ab");
    buffer.set_direction(Direction::RightToLeft);
    let glyphs = shape(&face, &[], buffer);

    let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
    let clusters: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.cluster).collect();
    assert_eq!(ids, &[2, 1]);
    assert_eq!(clusters, &[1, 0]);
}

#[test]
fn shaping_is_deterministic() {
    let gsub = layout_table(
        b"latn",
        &[(b"liga", &[0])],
        &[common::ligature_subst(5, &[6], 7)],
    );
    let data = latin_font_data(Some(gsub), None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let first = shape_text(&face, "afib", Direction::LeftToRight, &[]);
    let second = shape_text(&face, "afib", Direction::LeftToRight, &[]);
    assert_eq!(first, second);
}

#[test]
fn vertical_text_uses_vertical_forms() {
    // U+FF0C has a vertical presentation form at U+FE10; the font has no
    // 'vert' feature, so the rotation happens on codepoints.
    let mappings: &[(u32, u16)] = &[(0xFF0C, 1), (0xFE10, 2)];
    let advances: &[u16] = &[500, 1000, 1000];
    let data = base_font(mappings, advances).build();
    let face = Face::from_slice(&data, 0).unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("\u{FF0C}");
    buffer.set_direction(Direction::TopToBottom);
    let glyphs = shape(&face, &[], buffer);

    assert_eq!(glyphs.glyph_infos()[0].glyph_id, 2);
    // Vertical advances run downwards.
    assert!(glyphs.glyph_positions()[0].y_advance < 0);
}

#[test]
fn cleared_buffer_resets_properties() {
    let data = latin_font_data(None, None, None);
    let face = Face::from_slice(&data, 0).unwrap();

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str("ab");
    buffer.set_direction(Direction::RightToLeft);
    let glyphs = shape(&face, &[], buffer);

    // Reusing the allocation starts from a clean slate.
    let buffer = glyphs.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.direction(), Direction::Invalid);
}

mod backend_election {
    use super::*;

    #[test]
    fn gsub_and_gpos_only() {
        let gsub = layout_table(b"latn", &[], &[]);
        let gpos = layout_table(b"latn", &[], &[]);
        let data = latin_font_data(Some(gsub), Some(gpos), None);
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
        assert!(!plan.applies_morx());
        assert!(plan.applies_gpos());
        assert!(!plan.applies_kerx());
        assert!(!plan.applies_kern());
    }

    #[test]
    fn morx_wins_horizontally() {
        let gsub = layout_table(b"latn", &[], &[]);
        let mut builder = base_font(LATIN_MAPPINGS, LATIN_ADVANCES);
        builder.table(b"GSUB", gsub).table(b"morx", common::empty_morx());
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
        assert!(plan.applies_morx());
    }

    #[test]
    fn gsub_wins_vertically() {
        // morx only applies to vertical text when the font has no GSUB.
        let gsub = layout_table(b"latn", &[], &[]);
        let mut builder = base_font(LATIN_MAPPINGS, LATIN_ADVANCES);
        builder.table(b"GSUB", gsub).table(b"morx", common::empty_morx());
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::TopToBottom, None, None, &[]).unwrap();
        assert!(!plan.applies_morx());

        // Without GSUB, vertical morx is fine.
        let mut builder = base_font(LATIN_MAPPINGS, LATIN_ADVANCES);
        builder.table(b"morx", common::empty_morx());
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::TopToBottom, None, None, &[]).unwrap();
        assert!(plan.applies_morx());
    }

    #[test]
    fn kerx_beats_gpos() {
        let gpos = layout_table(b"latn", &[(b"kern", &[0])], &[common::pair_pos(1, 2, -80)]);
        let mut builder = base_font(LATIN_MAPPINGS, LATIN_ADVANCES);
        builder.table(b"GPOS", gpos).table(b"kerx", common::empty_kerx());
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
        assert!(plan.applies_kerx());
        assert!(!plan.applies_gpos());
        assert!(!plan.applies_kern());
    }

    #[test]
    fn kern_table_ignored_when_gpos_kerns() {
        let gpos = layout_table(b"latn", &[(b"kern", &[0])], &[common::pair_pos(1, 2, -80)]);
        let kern = common::kern(&[(1, 2, -500)]);
        let data = latin_font_data(None, Some(gpos), Some(kern));
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
        assert!(plan.applies_gpos());
        assert!(!plan.applies_kern());
    }

    #[test]
    fn kern_table_elected_when_gpos_has_no_kern_feature() {
        // GPOS exists but exposes no 'kern' feature: the legacy table is
        // re-elected for kerning while GPOS still positions.
        let gpos = layout_table(b"latn", &[], &[]);
        let kern = common::kern(&[(1, 2, -80)]);
        let data = latin_font_data(None, Some(gpos), Some(kern));
        let face = Face::from_slice(&data, 0).unwrap();

        let plan = ShapePlan::new(&face, Direction::LeftToRight, None, None, &[]).unwrap();
        assert!(plan.applies_gpos());
        assert!(plan.applies_kern());
    }
}

mod thai {
    use super::*;

    #[test]
    fn lowered_tone_mark_uses_pua_variant() {
        // KO KAI + MAI EK with no upper vowel: a legacy font (no GDEF) with
        // the Windows PUA forms gets the lowered tone variant.
        let mappings: &[(u32, u16)] = &[(0x0E01, 1), (0x0E48, 2), (0xF70A, 3)];
        let advances: &[u16] = &[300, 600, 0, 0];
        let data = base_font(mappings, advances).build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0E01}\u{0E48}");
        let glyphs = shape(&face, &[], buffer);

        let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
        assert_eq!(ids, &[1, 3]);
    }

    #[test]
    fn below_vowel_removes_descender() {
        // YO YING + SARA U: the base consonant swaps to its descenderless
        // PUA form so the below vowel has room.
        let mappings: &[(u32, u16)] = &[(0x0E0D, 1), (0x0E38, 2), (0xF70F, 3)];
        let advances: &[u16] = &[300, 600, 0, 600];
        let data = base_font(mappings, advances).build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0E0D}\u{0E38}");
        let glyphs = shape(&face, &[], buffer);

        let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
        assert_eq!(ids, &[3, 2]);
    }

    #[test]
    fn pua_shaping_skipped_for_opentype_fonts() {
        // With GDEF glyph classes present, the font is trusted to carry real
        // layout rules and the codepoints stay untouched.
        let mappings: &[(u32, u16)] = &[(0x0E01, 1), (0x0E48, 2), (0xF70A, 3)];
        let advances: &[u16] = &[300, 600, 0, 0];
        let mut builder = base_font(mappings, advances);
        builder.table(b"GDEF", common::gdef(&[(1, 1, 1), (2, 2, 3)]));
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0E01}\u{0E48}");
        let glyphs = shape(&face, &[], buffer);

        let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
        assert_eq!(ids, &[1, 2]);
    }
}

mod arabic {
    use super::*;

    // gid: 1=LAM 2=ALEF 3=LAM-ALEF 4=BEH(isol) 5=BEH(init) 6=space
    const ARABIC_MAPPINGS: &[(u32, u16)] = &[
        (0x0644, 1),
        (0x0627, 2),
        (0x0628, 4),
        (' ' as u32, 6),
    ];
    const ARABIC_ADVANCES: &[u16] = &[500, 600, 300, 700, 550, 520, 250];

    #[test]
    fn lam_alef_ligates_through_rlig() {
        let gsub = layout_table(
            b"arab",
            &[(b"rlig", &[0])],
            &[common::ligature_subst(1, &[2], 3)],
        );
        let mut builder = base_font(ARABIC_MAPPINGS, ARABIC_ADVANCES);
        builder.table(b"GSUB", gsub);
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0644}\u{0627}");
        let glyphs = shape(&face, &[], buffer);

        let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
        assert_eq!(ids, &[3]);
    }

    #[test]
    fn initial_form_applies_to_joining_letter() {
        // BEH followed by ALEF: BEH takes 'init'; the lookup is gated by the
        // joining mask the Arabic shaper assigns.
        let gsub = layout_table(
            b"arab",
            &[(b"init", &[0])],
            &[common::single_subst(&[4], 1)], // BEH isol -> init form
        );
        let mut builder = base_font(ARABIC_MAPPINGS, ARABIC_ADVANCES);
        builder.table(b"GSUB", gsub);
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0628}\u{0627}");
        let glyphs = shape(&face, &[], buffer);

        // Output is visual (RTL-reversed): ALEF first, then the init BEH.
        let ids: Vec<_> = glyphs.glyph_infos().iter().map(|info| info.glyph_id).collect();
        assert_eq!(ids, &[2, 5]);
    }

    #[test]
    fn isolated_letter_keeps_isolated_form() {
        let gsub = layout_table(
            b"arab",
            &[(b"init", &[0])],
            &[common::single_subst(&[4], 1)],
        );
        let mut builder = base_font(ARABIC_MAPPINGS, ARABIC_ADVANCES);
        builder.table(b"GSUB", gsub);
        let data = builder.build();
        let face = Face::from_slice(&data, 0).unwrap();

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str("\u{0628}");
        let glyphs = shape(&face, &[], buffer);

        // A lone BEH is isolated; 'init' must not fire.
        assert_eq!(glyphs.glyph_infos()[0].glyph_id, 4);
    }
}
