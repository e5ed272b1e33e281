use std::any::Any;
use std::ops::Range;

use super::{ComplexShaper, ZeroWidthMarksMode};
use crate::buffer::{Buffer, BufferClusterLevel, BufferFlags};
use crate::ot::normalize::ShapeNormalizationMode;
use crate::ot::{feature, FeatureFlags};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::{Face, Mask};

pub const HANGUL_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: Some(override_features),
    create_data: Some(create_data),
    preprocess_text: Some(preprocess_text),
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::None,
    decompose: None,
    compose: None,
    setup_masks: Some(setup_masks),
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: false,
};

// Jamo arithmetic per The Unicode Standard, chapter 3.12.
const S_BASE: u32 = 0xAC00;
const L_BASE: u32 = 0x1100;
const V_BASE: u32 = 0x1161;
const T_BASE: u32 = 0x11A7;
const L_COUNT: u32 = 19;
const V_COUNT: u32 = 21;
const T_COUNT: u32 = 28;
const N_COUNT: u32 = V_COUNT * T_COUNT;
const S_COUNT: u32 = L_COUNT * N_COUNT;

// Which jamo feature a glyph wants, parked in the syllable slot between
// preprocessing and mask setup; nothing else touches the slot until
// substitution starts.
#[derive(Clone, Copy)]
enum JamoClass {
    Leading = 1,
    Vowel = 2,
    Trailing = 3,
}

struct HangulShapePlan {
    ljmo_mask: Mask,
    vjmo_mask: Mask,
    tjmo_mask: Mask,
}

impl HangulShapePlan {
    fn mask_for(&self, jamo_class: u8) -> Mask {
        match jamo_class {
            1 => self.ljmo_mask,
            2 => self.vjmo_mask,
            3 => self.tjmo_mask,
            _ => 0,
        }
    }
}

fn collect_features(planner: &mut ShapePlanner) {
    let map = &mut planner.ot_map;
    map.add_feature(feature::LEADING_JAMO_FORMS, FeatureFlags::NONE, 1);
    map.add_feature(feature::VOWEL_JAMO_FORMS, FeatureFlags::NONE, 1);
    map.add_feature(feature::TRAILING_JAMO_FORMS, FeatureFlags::NONE, 1);
}

fn override_features(planner: &mut ShapePlanner) {
    // Uniscribe does not apply 'calt' for Hangul, and certain fonts
    // (Noto Sans CJK, Source Sans Han, etc) put all of the jamo lookups
    // in 'calt', which is not desirable.
    planner
        .ot_map
        .disable_feature(feature::CONTEXTUAL_ALTERNATES);
}

fn create_data(plan: &ShapePlan) -> Option<Box<dyn Any + Send + Sync>> {
    Some(Box::new(HangulShapePlan {
        ljmo_mask: plan.ot_map.one_mask(feature::LEADING_JAMO_FORMS),
        vjmo_mask: plan.ot_map.one_mask(feature::VOWEL_JAMO_FORMS),
        tjmo_mask: plan.ot_map.one_mask(feature::TRAILING_JAMO_FORMS),
    }))
}

fn is_tone_mark(u: u32) -> bool {
    (0x302E..=0x302F).contains(&u)
}

fn is_leading_jamo(u: u32) -> bool {
    (0x1100..=0x115F).contains(&u) || (0xA960..=0xA97C).contains(&u)
}

fn is_vowel_jamo(u: u32) -> bool {
    (0x1160..=0x11A7).contains(&u) || (0xD7B0..=0xD7C6).contains(&u)
}

fn is_trailing_jamo(u: u32) -> bool {
    (0x11A8..=0x11FF).contains(&u) || (0xD7CB..=0xD7FB).contains(&u)
}

fn is_precomposed_syllable(u: u32) -> bool {
    (S_BASE..S_BASE + S_COUNT).contains(&u)
}

fn is_combining_trailing_jamo(u: u32) -> bool {
    (T_BASE + 1..T_BASE + T_COUNT).contains(&u)
}

/// The composed syllable for `<L,V,T?>`, when all pieces are in the modern
/// combining ranges.
fn compose_syllable(l: u32, v: u32, t: Option<u32>) -> Option<u32> {
    if !(L_BASE..L_BASE + L_COUNT).contains(&l) || !(V_BASE..V_BASE + V_COUNT).contains(&v) {
        return None;
    }

    let t_index = match t {
        Some(t) if is_combining_trailing_jamo(t) => t - T_BASE,
        Some(_) => return None,
        None => 0,
    };

    Some(S_BASE + (l - L_BASE) * N_COUNT + (v - V_BASE) * T_COUNT + t_index)
}

/// Splits a precomposed syllable into its jamo; `None` trailing for LV
/// syllables.
fn decompose_syllable(s: u32) -> (u32, u32, Option<u32>) {
    let index = s - S_BASE;
    let l = L_BASE + index / N_COUNT;
    let v = V_BASE + (index % N_COUNT) / T_COUNT;
    let t_index = index % T_COUNT;
    let t = (t_index != 0).then(|| T_BASE + t_index);
    (l, v, t)
}

fn is_zero_width(face: &Face, u: u32) -> bool {
    match face.glyph_index(u) {
        Some(glyph) => face.glyph_h_advance(glyph) == 0,
        None => false,
    }
}

// Hangul syllables arrive precomposed, partially precomposed, or fully
// decomposed. The composition is mechanical, but not every sequence
// composes, and fonts rarely cover both forms. So every syllable is driven
// into the one form the font can render: the single precomposed glyph when
// it exists, otherwise the individual jamo with the ljmo/vjmo/tjmo features
// requested on each piece. A Hangul tone mark annotates the syllable before
// it and, unless it is designed to overstrike (zero width), moves in front
// of that syllable.
fn preprocess_text(_: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    buffer.clear_output();
    buffer.idx = 0;

    // Out-buffer extent of the syllable produced by the previous step, which
    // is what a following tone mark attaches to.
    let mut syllable: Option<Range<usize>> = None;

    while buffer.idx < buffer.len && buffer.successful {
        let u = buffer.cur(0).glyph_id;

        syllable = if is_tone_mark(u) {
            reorder_tone_mark(face, buffer, syllable.take());
            None
        } else if is_leading_jamo(u) {
            shape_jamo_sequence(face, buffer)
        } else if is_precomposed_syllable(u) {
            shape_precomposed_syllable(face, buffer)
        } else {
            buffer.next_glyph();
            None
        };
    }

    buffer.sync();
}

fn reorder_tone_mark(face: &Face, buffer: &mut Buffer, syllable: Option<Range<usize>>) {
    let u = buffer.cur(0).glyph_id;

    // The syllable extent is only ever handed over from the directly
    // preceding step, so when it is present it ends right where the tone
    // mark goes.
    if let Some(range) = syllable.filter(|range| !range.is_empty()) {
        buffer.unsafe_to_break_from_outbuffer(range.start, buffer.idx);
        buffer.next_glyph();

        if !is_zero_width(face, u) {
            // The tone mark joins the syllable and leads it.
            buffer.merge_out_clusters(range.start, range.end + 1);
            buffer.out_info_mut()[range.start..=range.end].rotate_right(1);
        }

        return;
    }

    // Nothing to annotate; hang the tone mark off a dotted circle if the
    // font has one, with overstriking marks in front of it.
    if buffer
        .flags
        .contains(BufferFlags::DO_NOT_INSERT_DOTTED_CIRCLE)
        || !face.has_glyph(0x25CC)
    {
        buffer.next_glyph();
    } else if is_zero_width(face, u) {
        buffer.replace_glyphs(1, 2, &[0x25CC, u]);
    } else {
        buffer.replace_glyphs(1, 2, &[u, 0x25CC]);
    }
}

/// `<L,V>` or `<L,V,T>` starting at the cursor: composed into one syllable
/// glyph when possible, otherwise passed through with jamo features.
fn shape_jamo_sequence(face: &Face, buffer: &mut Buffer) -> Option<Range<usize>> {
    let start = buffer.out_len;

    let l = buffer.cur(0).glyph_id;
    let v = if buffer.idx + 1 < buffer.len {
        buffer.cur(1).glyph_id
    } else {
        0
    };

    if !is_vowel_jamo(v) {
        // A lone leading jamo needs no work.
        buffer.next_glyph();
        return None;
    }

    let t = if buffer.idx + 2 < buffer.len {
        Some(buffer.cur(2).glyph_id).filter(|&t| is_trailing_jamo(t))
    } else {
        None
    };

    let len = if t.is_some() { 3 } else { 2 };
    buffer.unsafe_to_break(buffer.idx, buffer.idx + len);

    if let Some(s) = compose_syllable(l, v, t) {
        if face.has_glyph(s) {
            buffer.replace_glyphs(len, 1, &[s]);
            return Some(start..start + 1);
        }
    }

    // Old Hangul, or the font has no precomposed glyph: keep the pieces and
    // request the jamo features on them.
    for _ in 0..len {
        buffer.next_glyph();
    }
    apply_jamo_classes(buffer, start, len);

    Some(start..start + len)
}

/// `<LV>`, `<LVT>` or `<LV,T>` at the cursor: recombined or decomposed to
/// whatever the font covers.
fn shape_precomposed_syllable(face: &Face, buffer: &mut Buffer) -> Option<Range<usize>> {
    let start = buffer.out_len;

    let s = buffer.cur(0).glyph_id;
    let s_supported = face.has_glyph(s);
    let (l, v, t) = decompose_syllable(s);

    let next = if buffer.idx + 1 < buffer.len {
        buffer.cur(1).glyph_id
    } else {
        0
    };

    // <LV,T>: pull a combining trailing jamo into the syllable.
    if t.is_none() && is_combining_trailing_jamo(next) {
        let extended = s + (next - T_BASE);
        if face.has_glyph(extended) {
            buffer.replace_glyphs(2, 1, &[extended]);
            return Some(start..start + 1);
        }

        buffer.unsafe_to_break(buffer.idx, buffer.idx + 2);
    }

    // Split the syllable when the font has no glyph for it, or when an LV
    // is followed by a trailing jamo that belongs to it but cannot extend
    // it numerically.
    let trailing_follows = t.is_none() && is_trailing_jamo(next);
    if !s_supported || trailing_follows {
        if let Some(mut len) = split_syllable(face, buffer, l, v, t) {
            if s_supported && trailing_follows {
                // The trailing jamo that forced the split joins the syllable.
                buffer.next_glyph();
                len += 1;
            }

            apply_jamo_classes(buffer, start, len);
            return Some(start..start + len);
        }
    }

    if s_supported {
        buffer.next_glyph();
        return Some(start..start + 1);
    }

    buffer.next_glyph();
    None
}

/// Replaces the precomposed syllable at the cursor with its jamo, provided
/// the font has all of them.
fn split_syllable(
    face: &Face,
    buffer: &mut Buffer,
    l: u32,
    v: u32,
    t: Option<u32>,
) -> Option<usize> {
    if !face.has_glyph(l) || !face.has_glyph(v) {
        return None;
    }

    match t {
        Some(t) => {
            if !face.has_glyph(t) {
                return None;
            }
            buffer.replace_glyphs(1, 3, &[l, v, t]);
            Some(3)
        }
        None => {
            buffer.replace_glyphs(1, 2, &[l, v]);
            Some(2)
        }
    }
}

fn apply_jamo_classes(buffer: &mut Buffer, start: usize, len: usize) {
    const CLASSES: [JamoClass; 3] = [JamoClass::Leading, JamoClass::Vowel, JamoClass::Trailing];

    let out_info = buffer.out_info_mut();
    for (info, &class) in out_info[start..start + len].iter_mut().zip(&CLASSES) {
        info.set_syllable(class as u8);
    }

    if buffer.cluster_level == BufferClusterLevel::MonotoneGraphemes {
        buffer.merge_out_clusters(start, start + len);
    }
}

fn setup_masks(plan: &ShapePlan, _: &Face, buffer: &mut Buffer) {
    let hangul_plan = plan.data::<HangulShapePlan>();
    for info in buffer.info_slice_mut() {
        info.mask |= hangul_plan.mask_for(info.syllable());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllable_arithmetic_round_trips() {
        // GA: U+AC00 = <U+1100, U+1161>
        assert_eq!(compose_syllable(0x1100, 0x1161, None), Some(0xAC00));
        assert_eq!(decompose_syllable(0xAC00), (0x1100, 0x1161, None));

        // GAG: U+AC01 = <U+1100, U+1161, U+11A8>
        assert_eq!(compose_syllable(0x1100, 0x1161, Some(0x11A8)), Some(0xAC01));
        assert_eq!(decompose_syllable(0xAC01), (0x1100, 0x1161, Some(0x11A8)));

        // Old Hangul leading jamo are out of the combining range.
        assert_eq!(compose_syllable(0x115F, 0x1161, None), None);
    }

    #[test]
    fn trailing_jamo_ranges() {
        // U+11A7 is the base, not a trailing jamo itself.
        assert!(!is_combining_trailing_jamo(T_BASE));
        assert!(is_combining_trailing_jamo(0x11A8));
        // Extended-B trailing jamo exist but never combine numerically.
        assert!(is_trailing_jamo(0xD7CB));
        assert!(!is_combining_trailing_jamo(0xD7CB));
    }
}
