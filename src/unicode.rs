use smallvec::SmallVec;
use unicode_properties::UnicodeGeneralCategory;

use crate::common::TagExt;
use crate::{CodePoint, Script, Tag};

pub use unicode_properties::GeneralCategory;

/// Space estimates based on
/// <https://unicode.org/charts/PDF/U2000.pdf>.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Space {
    SpaceEm = 1,
    SpaceEm2 = 2,
    SpaceEm3 = 3,
    SpaceEm4 = 4,
    SpaceEm5 = 5,
    SpaceEm6 = 6,
    SpaceEm16 = 16,
    Space4Em18 = 17,
    Space = 18,
    SpaceFigure = 19,
    SpacePunctuation = 20,
    SpaceNarrow = 21,
}

impl Space {
    pub fn from_u8(n: u8) -> Option<Self> {
        Some(match n {
            1 => Space::SpaceEm,
            2 => Space::SpaceEm2,
            3 => Space::SpaceEm3,
            4 => Space::SpaceEm4,
            5 => Space::SpaceEm5,
            6 => Space::SpaceEm6,
            16 => Space::SpaceEm16,
            17 => Space::Space4Em18,
            18 => Space::Space,
            19 => Space::SpaceFigure,
            20 => Space::SpacePunctuation,
            21 => Space::SpaceNarrow,
            _ => return None,
        })
    }
}

// Reorder combining classes so that visually-stacked marks sort into the
// order fallback positioning expects.  The absolute values only matter
// relative to each other within one script run.
pub mod modified_combining_class {
    // Hebrew
    pub const CCC10: u8 = 22; // sheva
    pub const CCC11: u8 = 15; // hataf segol
    pub const CCC12: u8 = 16; // hataf patah
    pub const CCC13: u8 = 17; // hataf qamats
    pub const CCC14: u8 = 18; // hiriq
    pub const CCC15: u8 = 19; // tsere
    pub const CCC16: u8 = 20; // segol
    pub const CCC17: u8 = 21; // patah
    pub const CCC18: u8 = 14; // qamats
    pub const CCC19: u8 = 23; // holam
    pub const CCC20: u8 = 24; // qubuts
    pub const CCC21: u8 = 12; // dagesh
    pub const CCC22: u8 = 25; // meteg
    pub const CCC23: u8 = 13; // rafe
    pub const CCC24: u8 = 10; // shin dot
    pub const CCC25: u8 = 11; // sin dot
    pub const CCC26: u8 = 26; // point varika

    // Arabic
    pub const CCC27: u8 = 28; // fathatan
    pub const CCC28: u8 = 29; // dammatan
    pub const CCC29: u8 = 30; // kasratan
    pub const CCC30: u8 = 31; // fatha
    pub const CCC31: u8 = 32; // damma
    pub const CCC32: u8 = 33; // kasra
    pub const CCC33: u8 = 34; // shadda
    pub const CCC34: u8 = 35; // sukun
    pub const CCC35: u8 = 36; // superscript alef

    // Syriac
    pub const CCC36: u8 = 37; // superscript alaph

    // Telugu
    pub const CCC84: u8 = 4; // length mark
    pub const CCC91: u8 = 5; // ai length mark

    // Thai
    pub const CCC103: u8 = 3; // sara u / sara uu
    pub const CCC107: u8 = 7; // mai *

    // Lao
    pub const CCC118: u8 = 8; // sign u / sign uu
    pub const CCC122: u8 = 9; // mai *

    // Tibetan
    pub const CCC129: u8 = 38; // sign aa
    pub const CCC130: u8 = 39; // sign i
    pub const CCC132: u8 = 40; // sign u
}

fn modify_combining_class(ccc: u8) -> u8 {
    use modified_combining_class as mcc;
    match ccc {
        10 => mcc::CCC10,
        11 => mcc::CCC11,
        12 => mcc::CCC12,
        13 => mcc::CCC13,
        14 => mcc::CCC14,
        15 => mcc::CCC15,
        16 => mcc::CCC16,
        17 => mcc::CCC17,
        18 => mcc::CCC18,
        19 => mcc::CCC19,
        20 => mcc::CCC20,
        21 => mcc::CCC21,
        22 => mcc::CCC22,
        23 => mcc::CCC23,
        24 => mcc::CCC24,
        25 => mcc::CCC25,
        26 => mcc::CCC26,
        27 => mcc::CCC27,
        28 => mcc::CCC28,
        29 => mcc::CCC29,
        30 => mcc::CCC30,
        31 => mcc::CCC31,
        32 => mcc::CCC32,
        33 => mcc::CCC33,
        34 => mcc::CCC34,
        35 => mcc::CCC35,
        36 => mcc::CCC36,
        84 => mcc::CCC84,
        91 => mcc::CCC91,
        103 => mcc::CCC103,
        107 => mcc::CCC107,
        118 => mcc::CCC118,
        122 => mcc::CCC122,
        129 => mcc::CCC129,
        130 => mcc::CCC130,
        132 => mcc::CCC132,
        _ => ccc,
    }
}

pub trait GeneralCategoryExt {
    fn to_u8(&self) -> u8;
    fn from_u8(n: u8) -> Self;
    fn is_mark(&self) -> bool;
}

impl GeneralCategoryExt for GeneralCategory {
    fn to_u8(&self) -> u8 {
        match *self {
            GeneralCategory::Control => 0,
            GeneralCategory::Format => 1,
            GeneralCategory::Unassigned => 2,
            GeneralCategory::PrivateUse => 3,
            GeneralCategory::Surrogate => 4,
            GeneralCategory::LowercaseLetter => 5,
            GeneralCategory::ModifierLetter => 6,
            GeneralCategory::OtherLetter => 7,
            GeneralCategory::TitlecaseLetter => 8,
            GeneralCategory::UppercaseLetter => 9,
            GeneralCategory::SpacingMark => 10,
            GeneralCategory::EnclosingMark => 11,
            GeneralCategory::NonspacingMark => 12,
            GeneralCategory::DecimalNumber => 13,
            GeneralCategory::LetterNumber => 14,
            GeneralCategory::OtherNumber => 15,
            GeneralCategory::ConnectorPunctuation => 16,
            GeneralCategory::DashPunctuation => 17,
            GeneralCategory::ClosePunctuation => 18,
            GeneralCategory::FinalPunctuation => 19,
            GeneralCategory::InitialPunctuation => 20,
            GeneralCategory::OtherPunctuation => 21,
            GeneralCategory::OpenPunctuation => 22,
            GeneralCategory::CurrencySymbol => 23,
            GeneralCategory::ModifierSymbol => 24,
            GeneralCategory::MathSymbol => 25,
            GeneralCategory::OtherSymbol => 26,
            GeneralCategory::LineSeparator => 27,
            GeneralCategory::ParagraphSeparator => 28,
            GeneralCategory::SpaceSeparator => 29,
        }
    }

    fn from_u8(n: u8) -> Self {
        match n {
            0 => GeneralCategory::Control,
            1 => GeneralCategory::Format,
            2 => GeneralCategory::Unassigned,
            3 => GeneralCategory::PrivateUse,
            4 => GeneralCategory::Surrogate,
            5 => GeneralCategory::LowercaseLetter,
            6 => GeneralCategory::ModifierLetter,
            7 => GeneralCategory::OtherLetter,
            8 => GeneralCategory::TitlecaseLetter,
            9 => GeneralCategory::UppercaseLetter,
            10 => GeneralCategory::SpacingMark,
            11 => GeneralCategory::EnclosingMark,
            12 => GeneralCategory::NonspacingMark,
            13 => GeneralCategory::DecimalNumber,
            14 => GeneralCategory::LetterNumber,
            15 => GeneralCategory::OtherNumber,
            16 => GeneralCategory::ConnectorPunctuation,
            17 => GeneralCategory::DashPunctuation,
            18 => GeneralCategory::ClosePunctuation,
            19 => GeneralCategory::FinalPunctuation,
            20 => GeneralCategory::InitialPunctuation,
            21 => GeneralCategory::OtherPunctuation,
            22 => GeneralCategory::OpenPunctuation,
            23 => GeneralCategory::CurrencySymbol,
            24 => GeneralCategory::ModifierSymbol,
            25 => GeneralCategory::MathSymbol,
            26 => GeneralCategory::OtherSymbol,
            27 => GeneralCategory::LineSeparator,
            28 => GeneralCategory::ParagraphSeparator,
            29 => GeneralCategory::SpaceSeparator,
            _ => GeneralCategory::Unassigned,
        }
    }

    #[inline]
    fn is_mark(&self) -> bool {
        matches!(
            *self,
            GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
                | GeneralCategory::NonspacingMark
        )
    }
}

pub trait CharExt {
    fn general_category(self) -> GeneralCategory;
    fn combining_class(self) -> u8;
    fn modified_combining_class(self) -> u8;
    fn mirrored(self) -> Option<char>;
    fn space_fallback(self) -> Option<Space>;
    fn is_default_ignorable(self) -> bool;
    fn is_variation_selector(self) -> bool;
    fn is_emoji_extended_pictographic(self) -> bool;
}

impl CharExt for char {
    #[inline]
    fn general_category(self) -> GeneralCategory {
        UnicodeGeneralCategory::general_category(self)
    }

    #[inline]
    fn combining_class(self) -> u8 {
        unicode_normalization::char::canonical_combining_class(self)
    }

    #[inline]
    fn modified_combining_class(self) -> u8 {
        modify_combining_class(self.combining_class())
    }

    #[inline]
    fn mirrored(self) -> Option<char> {
        unicode_bidi_mirroring::get_mirrored(self)
    }

    fn space_fallback(self) -> Option<Space> {
        // All GC=Zs chars that can use a fallback.
        match self as u32 {
            0x0020 | 0x00A0 => Some(Space::Space), // SPACE, NO-BREAK SPACE
            0x2000 => Some(Space::SpaceEm2),       // EN QUAD
            0x2001 => Some(Space::SpaceEm),        // EM QUAD
            0x2002 => Some(Space::SpaceEm2),       // EN SPACE
            0x2003 => Some(Space::SpaceEm),        // EM SPACE
            0x2004 => Some(Space::SpaceEm3),       // THREE-PER-EM SPACE
            0x2005 => Some(Space::SpaceEm4),       // FOUR-PER-EM SPACE
            0x2006 => Some(Space::SpaceEm6),       // SIX-PER-EM SPACE
            0x2007 => Some(Space::SpaceFigure),    // FIGURE SPACE
            0x2008 => Some(Space::SpacePunctuation), // PUNCTUATION SPACE
            0x2009 => Some(Space::SpaceEm5),       // THIN SPACE
            0x200A => Some(Space::SpaceEm16),      // HAIR SPACE
            0x202F => Some(Space::SpaceNarrow),    // NARROW NO-BREAK SPACE
            0x205F => Some(Space::Space4Em18),     // MEDIUM MATHEMATICAL SPACE
            0x3000 => Some(Space::SpaceEm),        // IDEOGRAPHIC SPACE
            _ => None,
        }
    }

    fn is_default_ignorable(self) -> bool {
        // Default_Ignorable codepoints:
        //
        // While U+115F, U+1160, U+3164 and U+FFA0 are Default_Ignorable, we do
        // NOT want to hide them, as the way Uniscribe has implemented them is
        // with regular spacing glyphs, and that's the way fonts are made to work.
        // As such, we make exceptions for those four.
        // Also ignoring U+1BCA0..1BCA3. https://github.com/harfbuzz/harfbuzz/issues/503
        let ch = self as u32;
        let plane = ch >> 16;
        if plane == 0 {
            // BMP
            let page = ch >> 8;
            match page {
                0x00 => ch == 0x00AD,
                0x03 => ch == 0x034F,
                0x06 => ch == 0x061C,
                0x17 => (0x17B4..=0x17B5).contains(&ch),
                0x18 => (0x180B..=0x180E).contains(&ch),
                0x20 => {
                    (0x200B..=0x200F).contains(&ch)
                        || (0x202A..=0x202E).contains(&ch)
                        || (0x2060..=0x206F).contains(&ch)
                }
                0xFE => (0xFE00..=0xFE0F).contains(&ch) || ch == 0xFEFF,
                0xFF => (0xFFF0..=0xFFF8).contains(&ch),
                _ => false,
            }
        } else {
            // Other planes
            match plane {
                0x01 => (0x1D173..=0x1D17A).contains(&ch),
                0x0E => (0xE0000..=0xE0FFF).contains(&ch),
                _ => false,
            }
        }
    }

    #[inline]
    fn is_variation_selector(self) -> bool {
        // U+180B..180D, U+180F MONGOLIAN FREE VARIATION SELECTORs are handled
        // in the Mongolian block and intentionally left out here.
        let ch = self as u32;
        (0xFE00..=0xFE0F).contains(&ch) || (0xE0100..=0xE01EF).contains(&ch)
    }

    fn is_emoji_extended_pictographic(self) -> bool {
        // The dense ranges of Extended_Pictographic; enough to keep
        // ZWJ emoji sequences together as graphemes.
        let ch = self as u32;
        matches!(ch,
            0x00A9 | 0x00AE | 0x203C | 0x2049 | 0x2122 | 0x2139
            | 0x2194..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x23CF..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B00..=0x2BFF
            | 0x3030 | 0x303D | 0x3297 | 0x3299
            | 0x1F000..=0x1FAFF)
    }
}

/// Canonical single-step decomposition: `ab` → `(a, b)`, or `(a, '\0')` for
/// singletons.
pub fn decompose(ab: char) -> Option<(char, char)> {
    let mut parts = SmallVec::<[char; 8]>::new();
    unicode_normalization::char::decompose_canonical(ab, |c| parts.push(c));

    match parts.len() {
        0 => None,
        1 => {
            if parts[0] == ab {
                None
            } else {
                Some((parts[0], '\0'))
            }
        }
        n => {
            // Rebuild the last decomposition step: everything but the final
            // combining character recomposes back into the intermediate form.
            let b = parts[n - 1];
            let mut a = parts[0];
            for &c in &parts[1..n - 1] {
                a = unicode_normalization::char::compose(a, c)?;
            }
            Some((a, b))
        }
    }
}

#[inline]
pub fn compose(a: char, b: char) -> Option<char> {
    unicode_normalization::char::compose(a, b)
}

pub fn script_from_char(c: char) -> Script {
    use unicode_script::UnicodeScript;

    let tag = Tag::from_bytes_lossy(c.script().short_name().as_bytes());
    Script::from_iso15924_tag(tag).unwrap_or(crate::script::UNKNOWN)
}

#[inline]
pub fn char_from_u32(c: CodePoint) -> char {
    char::from_u32(c).unwrap_or('\u{FFFD}')
}

impl crate::common::Script {
    /// 4-byte OpenType script tags for this script, newest first.
    pub(crate) fn ot_tags(self) -> ([Tag; 2], usize) {
        // Earlier entries are preferred by the map builder, so version-2
        // shaping tags come before the spec-era ones.
        let tag = self.0;

        match self {
            // Indic scripts with version-2 shaping tags.
            crate::script::BENGALI => ([Tag::from_bytes(b"bng2"), Tag::from_bytes(b"beng")], 2),
            crate::script::DEVANAGARI => ([Tag::from_bytes(b"dev2"), Tag::from_bytes(b"deva")], 2),
            crate::script::GUJARATI => ([Tag::from_bytes(b"gjr2"), Tag::from_bytes(b"gujr")], 2),
            crate::script::GURMUKHI => ([Tag::from_bytes(b"gur2"), Tag::from_bytes(b"guru")], 2),
            crate::script::KANNADA => ([Tag::from_bytes(b"knd2"), Tag::from_bytes(b"knda")], 2),
            crate::script::MALAYALAM => ([Tag::from_bytes(b"mlm2"), Tag::from_bytes(b"mlym")], 2),
            crate::script::ORIYA => ([Tag::from_bytes(b"ory2"), Tag::from_bytes(b"orya")], 2),
            crate::script::TAMIL => ([Tag::from_bytes(b"tml2"), Tag::from_bytes(b"taml")], 2),
            crate::script::TELUGU => ([Tag::from_bytes(b"tel2"), Tag::from_bytes(b"telu")], 2),
            crate::script::MYANMAR => ([Tag::from_bytes(b"mym2"), Tag::from_bytes(b"mymr")], 2),

            // Scripts whose OT tag differs from the ISO 15924 tag.
            crate::script::HIRAGANA | crate::script::KATAKANA => {
                ([Tag::from_bytes(b"kana"), Tag::default_script()], 1)
            }
            crate::script::LAO => ([Tag::from_bytes(b"lao "), Tag::default_script()], 1),
            crate::script::YI => ([Tag::from_bytes(b"yi  "), Tag::default_script()], 1),
            crate::script::NKO => ([Tag::from_bytes(b"nko "), Tag::default_script()], 1),
            crate::script::VAI => ([Tag::from_bytes(b"vai "), Tag::default_script()], 1),

            _ => ([tag.to_lowercase(), Tag::default_script()], 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairwise_decomposition() {
        // LATIN CAPITAL LETTER A WITH RING ABOVE AND ACUTE
        assert_eq!(decompose('\u{01FA}'), Some(('\u{00C5}', '\u{0301}')));
        // LATIN CAPITAL LETTER A WITH RING ABOVE
        assert_eq!(decompose('\u{00C5}'), Some(('A', '\u{030A}')));
        // OHM SIGN is a singleton.
        assert_eq!(decompose('\u{2126}'), Some(('\u{03A9}', '\0')));
        assert_eq!(decompose('A'), None);
    }

    #[test]
    fn composition() {
        assert_eq!(compose('A', '\u{030A}'), Some('\u{00C5}'));
        assert_eq!(compose('A', 'B'), None);
    }

    #[test]
    fn combining_classes() {
        assert_eq!('\u{0301}'.combining_class(), 230);
        // Hebrew points get remapped.
        assert_eq!(
            '\u{05B0}'.modified_combining_class(),
            modified_combining_class::CCC10
        );
    }

    #[test]
    fn script_detection() {
        assert_eq!(script_from_char('a'), crate::script::LATIN);
        assert_eq!(script_from_char('\u{05D0}'), crate::script::HEBREW);
        assert_eq!(script_from_char('\u{0644}'), crate::script::ARABIC);
    }
}
