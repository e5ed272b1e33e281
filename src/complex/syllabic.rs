use super::{ComplexShaper, ZeroWidthMarksMode};
use crate::ot::normalize::ShapeNormalizationMode;
use crate::ot::FeatureFlags;
use crate::plan::ShapePlanner;
use crate::Tag;

/// The shared shaper for the syllable-structured scripts (the Indic family,
/// Khmer, Myanmar, and the scripts covered by the Universal Shaping Engine).
///
/// The feature ladders are collected in their canonical order so that a
/// font's own rules fire with correct bit allocation; syllable analysis and
/// reordering is left to the font's contextual rules, so the features that
/// reference engines scope per syllable part are requested globally here and
/// their contextual conditions decide where they fire.
pub const SYLLABIC_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: Some(override_features),
    create_data: None,
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::ComposedDiacriticsNoShortCircuit,
    decompose: None,
    compose: None,
    setup_masks: None,
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::ByGdefEarly,
    fallback_position: false,
};

// The basic shaping features, in the order the Indic spec applies them.
const BASIC_FEATURES: &[&[u8; 4]] = &[
    b"nukt", b"akhn", b"rphf", b"rkrf", b"pref", b"blwf", b"abvf", b"half", b"pstf", b"vatu",
    b"cjct",
];

// Joining forms for the Universal Shaping Engine scripts with topographical
// letter shapes. Registered but left off by default; an engine that tracks
// letter positions would turn the right one on per glyph.
const TOPOGRAPHICAL_FEATURES: &[&[u8; 4]] = &[b"isol", b"init", b"medi", b"fina"];

// Typographic presentation forms, applied after all basic features.
const OTHER_FEATURES: &[&[u8; 4]] = &[b"pres", b"abvs", b"blws", b"psts", b"haln"];

fn collect_features(planner: &mut ShapePlanner) {
    let map = &mut planner.ot_map;

    // Do this before any lookups have been applied.
    map.add_gsub_pause(None);

    map.enable_feature(Tag::from_bytes(b"locl"), FeatureFlags::NONE, 1);
    // The Indic specs do not require 'ccmp', but we apply it here since if
    // there is a use for it, it's typically at the beginning.
    map.enable_feature(Tag::from_bytes(b"ccmp"), FeatureFlags::NONE, 1);
    map.add_gsub_pause(None);

    for feature_tag in BASIC_FEATURES {
        map.enable_feature(
            Tag::from_bytes(feature_tag),
            FeatureFlags::MANUAL_JOINERS,
            1,
        );
        map.add_gsub_pause(None);
    }

    for feature_tag in TOPOGRAPHICAL_FEATURES {
        map.add_feature(Tag::from_bytes(feature_tag), FeatureFlags::NONE, 1);
    }
    map.add_gsub_pause(None);

    for feature_tag in OTHER_FEATURES {
        map.enable_feature(
            Tag::from_bytes(feature_tag),
            FeatureFlags::MANUAL_JOINERS,
            1,
        );
    }
}

fn override_features(planner: &mut ShapePlanner) {
    // Spec asks for "liga" to be turned off by default; the basic shaping
    // features cover the required ligating.
    planner.ot_map.disable_feature(Tag::from_bytes(b"liga"));
    planner.ot_map.add_gsub_pause(None);
}
