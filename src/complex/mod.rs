mod arabic;
mod hangul;
mod hebrew;
mod syllabic;
mod thai;

use std::any::Any;

use crate::buffer::Buffer;
use crate::common::TagExt;
use crate::ot::normalize::{ComposeFn, DecomposeFn, ShapeNormalizationMode};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::{script, Direction, Face, Script, Tag};

pub const MAX_COMBINING_MARKS: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ZeroWidthMarksMode {
    None,
    ByGdefEarly,
    ByGdefLate,
}

/// A script shaper: a capability vector the shaping core drives through
/// well-defined hooks. The core never looks inside `create_data`'s payload.
pub struct ComplexShaper {
    /// Called during plan construction; adds the shaper's features to the
    /// map builder.
    pub collect_features: Option<fn(&mut ShapePlanner)>,

    /// Called during plan construction, after common features were added.
    pub override_features: Option<fn(&mut ShapePlanner)>,

    /// Called at the end of plan construction. Whatever is returned here
    /// will be accessible through `plan.data()` later.
    pub create_data: Option<fn(&ShapePlan) -> Option<Box<dyn Any + Send + Sync>>>,

    /// Called during shaping; can modify text before shaping starts.
    pub preprocess_text: Option<fn(&ShapePlan, &Face, &mut Buffer)>,

    /// Called during shaping; can modify glyphs after shaping ends.
    pub postprocess_glyphs: Option<fn(&ShapePlan, &Face, &mut Buffer)>,

    /// How to normalize.
    pub normalization_preference: ShapeNormalizationMode,

    /// Overrides the decompose function during normalization.
    pub decompose: Option<DecomposeFn>,

    /// Overrides the compose function during normalization.
    pub compose: Option<ComposeFn>,

    /// Called during shaping; sets up the shaper's feature masks on the
    /// buffer glyphs.
    pub setup_masks: Option<fn(&ShapePlan, &Face, &mut Buffer)>,

    /// If not `None`, must match the chosen GPOS script tag for GPOS to be
    /// applied. Otherwise fallback positioning will be used.
    pub gpos_tag: Option<Tag>,

    /// Called during normalization; can reorder combining marks.
    pub reorder_marks: Option<fn(&ShapePlan, &mut Buffer, usize, usize)>,

    /// If and when to zero mark advances.
    pub zero_width_marks: ZeroWidthMarksMode,

    /// Whether to use fallback mark positioning.
    pub fallback_position: bool,
}

pub const DEFAULT_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: true,
};

// Same as default but no mark advance zeroing / fallback positioning.
// Dumbest shaper ever, basically.
pub const DUMBER_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: false,
};

pub fn complex_categorize(
    script: Script,
    direction: Direction,
    chosen_gsub_script: Option<Tag>,
) -> &'static ComplexShaper {
    match script {
        script::ARABIC
        | script::SYRIAC => {
            // For Arabic script, use the Arabic shaper even if no OT script
            // tag was found.  This is because we do fallback shaping for
            // Arabic script (and not others).  But note that Arabic shaping
            // is applicable only to horizontal layout; for vertical text,
            // just use the generic shaper instead.
            if (chosen_gsub_script != Some(Tag::default_script()) || script == script::ARABIC)
                && direction.is_horizontal()
            {
                &arabic::ARABIC_SHAPER
            } else {
                &DEFAULT_SHAPER
            }
        }

        script::THAI | script::LAO => &thai::THAI_SHAPER,

        script::HANGUL => &hangul::HANGUL_SHAPER,

        script::HEBREW => &hebrew::HEBREW_SHAPER,

        script::BENGALI
        | script::DEVANAGARI
        | script::GUJARATI
        | script::GURMUKHI
        | script::KANNADA
        | script::MALAYALAM
        | script::ORIYA
        | script::TAMIL
        | script::TELUGU
        | script::SINHALA => {
            // If the designer designed the font for the 'DFLT' script,
            // (or we ended up arbitrarily picking 'latn'), use the default
            // shaper.  Otherwise, use the specific shaper.
            if chosen_gsub_script == Some(Tag::default_script())
                || chosen_gsub_script == Some(Tag::from_bytes(b"latn"))
            {
                &DEFAULT_SHAPER
            } else {
                &syllabic::SYLLABIC_SHAPER
            }
        }

        script::KHMER => &syllabic::SYLLABIC_SHAPER,

        script::MYANMAR => {
            // If the designer designed the font for the 'DFLT' script, (or
            // we ended up arbitrarily picking 'latn'), use the default
            // shaper.  The spec-era 'mymr' tag pre-dates the shaping spec
            // and also gets the default shaper.
            if chosen_gsub_script == Some(Tag::default_script())
                || chosen_gsub_script == Some(Tag::from_bytes(b"latn"))
                || chosen_gsub_script == Some(Tag::from_bytes(b"mymr"))
            {
                &DEFAULT_SHAPER
            } else {
                &syllabic::SYLLABIC_SHAPER
            }
        }

        // Zawgyi encoding is not Unicode; don't apply any smarts to it.
        script::MYANMAR_ZAWGYI => &DUMBER_SHAPER,

        script::TIBETAN
        | script::MONGOLIAN
        | script::BUHID
        | script::HANUNOO
        | script::TAGALOG
        | script::TAGBANWA
        | script::LIMBU
        | script::TAI_LE
        | script::BUGINESE
        | script::KHAROSHTHI
        | script::SYLOTI_NAGRI
        | script::TIFINAGH
        | script::BALINESE
        | script::NKO
        | script::PHAGS_PA
        | script::CHAM
        | script::KAYAH_LI
        | script::LEPCHA
        | script::REJANG
        | script::SAURASHTRA
        | script::SUNDANESE
        | script::EGYPTIAN_HIEROGLYPHS
        | script::JAVANESE
        | script::KAITHI
        | script::MEETEI_MAYEK
        | script::TAI_THAM
        | script::TAI_VIET
        | script::BATAK
        | script::BRAHMI
        | script::MANDAIC
        | script::CHAKMA
        | script::MIAO
        | script::SHARADA
        | script::TAKRI
        | script::DUPLOYAN
        | script::GRANTHA
        | script::KHOJKI
        | script::KHUDAWADI
        | script::MAHAJANI
        | script::MANICHAEAN
        | script::MODI
        | script::PAHAWH_HMONG
        | script::PSALTER_PAHLAVI
        | script::SIDDHAM
        | script::TIRHUTA
        | script::AHOM
        | script::MULTANI
        | script::ADLAM
        | script::BHAIKSUKI
        | script::MARCHEN
        | script::NEWA
        | script::MASARAM_GONDI
        | script::SOYOMBO
        | script::ZANABAZAR_SQUARE
        | script::DOGRA
        | script::GUNJALA_GONDI
        | script::HANIFI_ROHINGYA
        | script::MAKASAR
        | script::MEDEFAIDRIN
        | script::OLD_SOGDIAN
        | script::SOGDIAN
        | script::ELYMAIC
        | script::NANDINAGARI
        | script::NYIAKENG_PUACHUE_HMONG
        | script::WANCHO
        | script::CHORASMIAN
        | script::DIVES_AKURU
        | script::KHITAN_SMALL_SCRIPT
        | script::YEZIDI
        | script::CYPRO_MINOAN
        | script::OLD_UYGHUR
        | script::TANGSA
        | script::TOTO
        | script::VITHKUQI => {
            // If the designer designed the font for the 'DFLT' script, (or
            // we ended up arbitrarily picking 'latn'), use the default
            // shaper.  Note that for some simple scripts there may not be
            // *any* GSUB/GPOS needed, so there may be no scripts found!
            if chosen_gsub_script == Some(Tag::default_script())
                || chosen_gsub_script == Some(Tag::from_bytes(b"latn"))
            {
                &DEFAULT_SHAPER
            } else {
                &syllabic::SYLLABIC_SHAPER
            }
        }

        _ => &DEFAULT_SHAPER,
    }
}
