pub mod apply;
pub mod fallback;
pub mod kern;
pub mod layout;
pub mod map;
pub mod normalize;
pub mod position;
pub mod substitute;

pub use layout::{
    apply_layout_table, substitute_start, LayoutLookup, LayoutTableData, PositioningLookup,
    PositioningTable, SubstLookup, SubstitutionTable, TableIndex,
};
pub use map::{FeatureFlags, Map, MapBuilder};

pub mod feature {
    //! Registered feature tags the shapers reach for by name.

    use crate::Tag;

    pub const ABOVE_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"abvm");
    pub const BELOW_BASE_MARK_POSITIONING: Tag = Tag::from_bytes(b"blwm");
    pub const CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"calt");
    pub const CONTEXTUAL_LIGATURES: Tag = Tag::from_bytes(b"clig");
    pub const CURSIVE_POSITIONING: Tag = Tag::from_bytes(b"curs");
    pub const DENOMINATORS: Tag = Tag::from_bytes(b"dnom");
    pub const DISTANCES: Tag = Tag::from_bytes(b"dist");
    pub const FRACTIONS: Tag = Tag::from_bytes(b"frac");
    pub const GLYPH_COMPOSITION_DECOMPOSITION: Tag = Tag::from_bytes(b"ccmp");
    pub const KERNING: Tag = Tag::from_bytes(b"kern");
    pub const LEFT_TO_RIGHT_ALTERNATES: Tag = Tag::from_bytes(b"ltra");
    pub const LEFT_TO_RIGHT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"ltrm");
    pub const LOCALIZED_FORMS: Tag = Tag::from_bytes(b"locl");
    pub const MARK_POSITIONING: Tag = Tag::from_bytes(b"mark");
    pub const MARK_TO_MARK_POSITIONING: Tag = Tag::from_bytes(b"mkmk");
    pub const NUMERATORS: Tag = Tag::from_bytes(b"numr");
    pub const RANDOMIZE: Tag = Tag::from_bytes(b"rand");
    pub const REQUIRED_CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"rclt");
    pub const REQUIRED_LIGATURES: Tag = Tag::from_bytes(b"rlig");
    pub const REQUIRED_VARIATION_ALTERNATES: Tag = Tag::from_bytes(b"rvrn");
    pub const RIGHT_TO_LEFT_ALTERNATES: Tag = Tag::from_bytes(b"rtla");
    pub const RIGHT_TO_LEFT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"rtlm");
    pub const STANDARD_LIGATURES: Tag = Tag::from_bytes(b"liga");
    pub const TRACKING: Tag = Tag::from_bytes(b"trak");
    pub const VERTICAL_KERNING: Tag = Tag::from_bytes(b"vkrn");
    pub const VERTICAL_WRITING: Tag = Tag::from_bytes(b"vert");

    // Arabic & friends.
    pub const INITIAL_FORMS: Tag = Tag::from_bytes(b"init");
    pub const ISOLATED_FORMS: Tag = Tag::from_bytes(b"isol");
    pub const MEDIAL_FORMS: Tag = Tag::from_bytes(b"medi");
    pub const MEDIAL_FORMS_2: Tag = Tag::from_bytes(b"med2");
    pub const TERMINAL_FORMS: Tag = Tag::from_bytes(b"fina");
    pub const TERMINAL_FORMS_2: Tag = Tag::from_bytes(b"fin2");
    pub const TERMINAL_FORMS_3: Tag = Tag::from_bytes(b"fin3");
    pub const MARK_POSITIONING_VIA_SUBSTITUTION: Tag = Tag::from_bytes(b"mset");

    // Hangul.
    pub const LEADING_JAMO_FORMS: Tag = Tag::from_bytes(b"ljmo");
    pub const VOWEL_JAMO_FORMS: Tag = Tag::from_bytes(b"vjmo");
    pub const TRAILING_JAMO_FORMS: Tag = Tag::from_bytes(b"tjmo");
}
