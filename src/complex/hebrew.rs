use super::{ComplexShaper, ZeroWidthMarksMode};
use crate::ot::normalize::{NormalizeContext, ShapeNormalizationMode};
use crate::Tag;

pub const HEBREW_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: Some(compose),
    setup_masks: None,
    // https://github.com/harfbuzz/harfbuzz/issues/347#issuecomment-267838368
    gpos_tag: Some(Tag::from_bytes(b"hebr")),
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: true,
};

const S_DAGESH_FORMS: &[u32] = &[
    0xFB30, // ALEF
    0xFB31, // BET
    0xFB32, // GIMEL
    0xFB33, // DALET
    0xFB34, // HE
    0xFB35, // VAV
    0xFB36, // ZAYIN
    0x0000, // HET
    0xFB38, // TET
    0xFB39, // YOD
    0xFB3A, // FINAL KAF
    0xFB3B, // KAF
    0xFB3C, // LAMED
    0x0000, // FINAL MEM
    0xFB3E, // MEM
    0x0000, // FINAL NUN
    0xFB40, // NUN
    0xFB41, // SAMEKH
    0x0000, // AYIN
    0xFB43, // FINAL PE
    0xFB44, // PE
    0x0000, // FINAL TSADI
    0xFB46, // TSADI
    0xFB47, // QOF
    0xFB48, // RESH
    0xFB49, // SHIN
    0xFB4A, // TAV
];

fn compose(ctx: &NormalizeContext, a: char, b: char) -> Option<char> {
    // Hebrew presentation-form shaping.
    // https://bugzilla.mozilla.org/show_bug.cgi?id=728866
    // Hebrew presentation forms with dagesh, for characters U+05D0..05EA;
    // note that some letters do not have a dagesh presForm encoded.

    match crate::unicode::compose(a, b) {
        Some(c) => Some(c),
        None if !ctx.plan.has_gpos_mark => {
            // Special-case Hebrew presentation forms that are excluded from
            // standard normalization, but wanted for old fonts.
            let a = a as u32;
            let ab = match b as u32 {
                0x05B4 => {
                    // HIRIQ
                    match a {
                        0x05D9 => 0xFB1D, // YOD
                        _ => 0,
                    }
                }
                0x05B7 => {
                    // PATAH
                    match a {
                        0x05F2 => 0xFB1F, // YIDDISH YOD YOD
                        0x05D0 => 0xFB2E, // ALEF
                        _ => 0,
                    }
                }
                0x05B8 => {
                    // QAMATS
                    match a {
                        0x05D0 => 0xFB2F, // ALEF
                        _ => 0,
                    }
                }
                0x05B9 => {
                    // HOLAM
                    match a {
                        0x05D5 => 0xFB4B, // VAV
                        _ => 0,
                    }
                }
                0x05BC => {
                    // DAGESH
                    match a {
                        0x05D0..=0x05EA => S_DAGESH_FORMS[a as usize - 0x05D0],
                        0xFB2A => 0xFB2C, // SHIN WITH SHIN DOT
                        0xFB2B => 0xFB2D, // SHIN WITH SIN DOT
                        _ => 0,
                    }
                }
                0x05BF => {
                    // RAFE
                    match a {
                        0x05D1 => 0xFB4C, // BET
                        0x05DB => 0xFB4D, // KAF
                        0x05E4 => 0xFB4E, // PE
                        _ => 0,
                    }
                }
                0x05C1 => {
                    // SHIN DOT
                    match a {
                        0x05E9 => 0xFB2A, // SHIN
                        0xFB49 => 0xFB2C, // SHIN WITH DAGESH
                        _ => 0,
                    }
                }
                0x05C2 => {
                    // SIN DOT
                    match a {
                        0x05E9 => 0xFB2B, // SHIN
                        0xFB49 => 0xFB2D, // SHIN WITH DAGESH
                        _ => 0,
                    }
                }
                _ => 0,
            };

            char::from_u32(ab).filter(|_| ab != 0)
        }
        None => None,
    }
}
