use super::{ComplexShaper, ZeroWidthMarksMode};
use crate::buffer::Buffer;
use crate::ot::normalize::ShapeNormalizationMode;
use crate::plan::ShapePlan;
use crate::{script, Face};

pub const THAI_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: None,
    override_features: None,
    create_data: None,
    preprocess_text: Some(preprocess_text),
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: None,
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::None,
    fallback_position: true,
};

// Old Thai fonts (TIS-620 / WTT 2.0 era) carry no mark positioning rules.
// Instead they encode pre-shifted mark variants in the private use area, at
// codepoints established by Windows (with a second convention from old Mac
// fonts). A mark over an ascender consonant needs its left-shifted variant,
// a tone without an upper vowel under it needs its lowered variant, and a
// below vowel under a descender either drops down or the consonant swaps to
// a descenderless form.
//
// https://linux.thai.net/~thep/th-otf/shaping.html

#[derive(Clone, Copy, PartialEq, Debug)]
enum Consonant {
    // Body within the baseline.
    Plain,
    // Ascender reaching into the upper mark zone (PO PLA, FO FA, FO FAN).
    Ascender,
    // Descender with a descenderless PUA variant (YO YING, THO THAN).
    RemovableDescender,
    // Descender that always keeps its tail (DO CHADA, TO PATAK).
    Descender,
    NotConsonant,
}

fn consonant_type(u: u32) -> Consonant {
    match u {
        0x0E1B | 0x0E1D | 0x0E1F => Consonant::Ascender,
        0x0E0D | 0x0E10 => Consonant::RemovableDescender,
        0x0E0E | 0x0E0F => Consonant::Descender,
        0x0E01..=0x0E2E => Consonant::Plain,
        _ => Consonant::NotConsonant,
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Mark {
    AboveVowel,
    BelowVowel,
    Tone,
    NotMark,
}

fn mark_type(u: u32) -> Mark {
    match u {
        0x0E31 | 0x0E34..=0x0E37 | 0x0E47 | 0x0E4D..=0x0E4E => Mark::AboveVowel,
        0x0E38..=0x0E3A => Mark::BelowVowel,
        0x0E48..=0x0E4C => Mark::Tone,
        _ => Mark::NotMark,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum PuaAction {
    Nop,
    ShiftDown,
    ShiftLeft,
    ShiftDownLeft,
    RemoveDescender,
}

// (unicode, windows pua, mac pua)
type PuaMapping = (u32, u32, u32);

const SHIFT_DOWN_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF70A, 0xF88B), // MAI EK
    (0x0E49, 0xF70B, 0xF88E), // MAI THO
    (0x0E4A, 0xF70C, 0xF891), // MAI TRI
    (0x0E4B, 0xF70D, 0xF894), // MAI CHATTAWA
    (0x0E4C, 0xF70E, 0xF897), // THANTHAKHAT
    (0x0E38, 0xF718, 0xF89A), // SARA U
    (0x0E39, 0xF719, 0xF89D), // SARA UU
    (0x0E3A, 0xF71A, 0xF8A0), // PHINTHU
];

const SHIFT_DOWN_LEFT_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF705, 0xF88C), // MAI EK
    (0x0E49, 0xF706, 0xF88F), // MAI THO
    (0x0E4A, 0xF707, 0xF892), // MAI TRI
    (0x0E4B, 0xF708, 0xF895), // MAI CHATTAWA
    (0x0E4C, 0xF709, 0xF898), // THANTHAKHAT
];

const SHIFT_LEFT_MAPPINGS: &[PuaMapping] = &[
    (0x0E48, 0xF713, 0xF88A), // MAI EK
    (0x0E49, 0xF714, 0xF88D), // MAI THO
    (0x0E4A, 0xF715, 0xF890), // MAI TRI
    (0x0E4B, 0xF716, 0xF893), // MAI CHATTAWA
    (0x0E4C, 0xF717, 0xF896), // THANTHAKHAT
    (0x0E31, 0xF710, 0xF884), // MAI HAN-AKAT
    (0x0E34, 0xF701, 0xF885), // SARA I
    (0x0E35, 0xF702, 0xF886), // SARA II
    (0x0E36, 0xF703, 0xF887), // SARA UE
    (0x0E37, 0xF704, 0xF888), // SARA UEE
    (0x0E47, 0xF712, 0xF889), // MAITAIKHU
    (0x0E4D, 0xF711, 0xF899), // NIKHAHIT
];

const REMOVE_DESCENDER_MAPPINGS: &[PuaMapping] = &[
    (0x0E0D, 0xF70F, 0xF89B), // YO YING
    (0x0E10, 0xF700, 0xF89C), // THO THAN
];

fn pua_shape(u: u32, action: PuaAction, face: &Face) -> u32 {
    let mappings = match action {
        PuaAction::Nop => return u,
        PuaAction::ShiftDown => SHIFT_DOWN_MAPPINGS,
        PuaAction::ShiftLeft => SHIFT_LEFT_MAPPINGS,
        PuaAction::ShiftDownLeft => SHIFT_DOWN_LEFT_MAPPINGS,
        PuaAction::RemoveDescender => REMOVE_DESCENDER_MAPPINGS,
    };

    for &(unicode, win_pua, mac_pua) in mappings {
        if unicode != u {
            continue;
        }

        if face.has_glyph(win_pua) {
            return win_pua;
        }
        if face.has_glyph(mac_pua) {
            return mac_pua;
        }
        break;
    }

    u
}

// Above-zone state machine. Columns: above vowel, tone mark.
//
// A tone with no upper vowel beneath it drops down next to the consonant;
// over an ascender everything shifts left (tones also down, unless they sit
// on an already-shifted vowel); once the zone is occupied nothing moves.
const ABOVE_START_STATE: [usize; 5] = [
    0, // Plain
    1, // Ascender
    0, // RemovableDescender
    0, // Descender
    3, // NotConsonant
];

const ABOVE_STATE_MACHINE: [[(PuaAction, usize); 2]; 4] = [
    /* empty, plain base     */ [(PuaAction::Nop, 3), (PuaAction::ShiftDown, 3)],
    /* empty, ascender base  */ [(PuaAction::ShiftLeft, 2), (PuaAction::ShiftDownLeft, 2)],
    /* shifted vowel present */ [(PuaAction::Nop, 3), (PuaAction::ShiftLeft, 3)],
    /* occupied              */ [(PuaAction::Nop, 3), (PuaAction::Nop, 3)],
];

// Below-zone state machine. Columns: below vowel, tone mark.
const BELOW_START_STATE: [usize; 5] = [
    0, // Plain
    0, // Ascender
    1, // RemovableDescender
    2, // Descender
    2, // NotConsonant
];

const BELOW_STATE_MACHINE: [[(PuaAction, usize); 2]; 3] = [
    /* no descender        */ [(PuaAction::Nop, 0), (PuaAction::Nop, 0)],
    /* removable descender */ [(PuaAction::RemoveDescender, 2), (PuaAction::Nop, 1)],
    /* strict descender    */ [(PuaAction::ShiftDown, 2), (PuaAction::Nop, 2)],
];

fn do_pua_shaping(face: &Face, buffer: &mut Buffer) {
    let mut above_state = ABOVE_START_STATE[Consonant::NotConsonant as usize];
    let mut below_state = BELOW_START_STATE[Consonant::NotConsonant as usize];
    let mut base = 0;

    for i in 0..buffer.len {
        let u = buffer.info[i].glyph_id;

        let mark = mark_type(u);
        if mark == Mark::NotMark {
            let consonant = consonant_type(u);
            above_state = ABOVE_START_STATE[consonant as usize];
            below_state = BELOW_START_STATE[consonant as usize];
            base = i;
            continue;
        }

        let action = match mark {
            Mark::AboveVowel => {
                let (action, next) = ABOVE_STATE_MACHINE[above_state][0];
                above_state = next;
                action
            }
            Mark::Tone => {
                let (action, next) = ABOVE_STATE_MACHINE[above_state][1];
                above_state = next;
                action
            }
            Mark::BelowVowel => {
                let (action, next) = BELOW_STATE_MACHINE[below_state][0];
                below_state = next;
                action
            }
            Mark::NotMark => unreachable!(),
        };

        // Removing a descender rewrites the base consonant; everything else
        // rewrites the mark itself.
        if action == PuaAction::RemoveDescender {
            buffer.info[base].glyph_id = pua_shape(buffer.info[base].glyph_id, action, face);
        } else {
            buffer.info[i].glyph_id = pua_shape(u, action, face);
        }
    }
}

// SARA AM (and its Lao counterpart) is decomposed into NIKHAHIT + SARA AA,
// with the NIKHAHIT reordered to before any tone marks that preceded the
// SARA AM. This is the universally expected behavior, and it lets GSUB and
// mark positioning see the text in its visual order.

fn is_sara_am(u: u32) -> bool {
    u == 0x0E33 || u == 0x0EB3
}

fn nikhahit_from_sara_am(u: u32) -> u32 {
    // U+0E4D THAI NIKHAHIT / U+0ECD LAO NIGGAHITA
    u - 0x0E33 + 0x0E4D
}

fn sara_aa_from_sara_am(u: u32) -> u32 {
    // U+0E32 THAI SARA AA / U+0EB2 LAO VOWEL SIGN AA
    u - 1
}

fn is_tone_mark(u: u32) -> bool {
    matches!(u,
        0x0E34..=0x0E37 | 0x0E47..=0x0E4E | 0x0E31
        | 0x0EB4..=0x0EB7 | 0x0EC8..=0x0ECD | 0x0EB1 | 0x0EBB)
}

fn preprocess_text(plan: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    // Fonts with GDEF glyph classes are OpenType fonts with real layout
    // rules; only the legacy ones get the PUA treatment. The Lao block has
    // no PUA conventions.
    if plan.script == Some(script::THAI) && !face.has_gdef_glyph_classes() {
        do_pua_shaping(face, buffer);
    }

    buffer.clear_output();
    buffer.idx = 0;
    while buffer.idx < buffer.len && buffer.successful {
        let u = buffer.cur(0).glyph_id;
        if !is_sara_am(u) {
            buffer.next_glyph();
            continue;
        }

        // Is SARA AM. Decompose and reorder.
        buffer.replace_glyphs(1, 2, &[nikhahit_from_sara_am(u), sara_aa_from_sara_am(u)]);
        if !buffer.successful {
            return;
        }

        // Make the NIKHAHIT precede any tone marks that came before.
        let end = buffer.out_len;
        let mut start = end - 2;
        while start > 0 && is_tone_mark(buffer.out_info()[start - 1].glyph_id) {
            start -= 1;
        }

        if start + 2 < end {
            // Move the NIKHAHIT (end-2) to the beginning.
            buffer.merge_out_clusters(start, end);
            let out_info = buffer.out_info_mut();
            let t = out_info[end - 2];
            for i in (0..end - 2 - start).rev() {
                out_info[i + start + 1] = out_info[i + start];
            }
            out_info[start] = t;
        } else {
            // Since we decomposed, and NIKHAHIT is combining, merge clusters
            // with the previous character.
            if start > 0 {
                buffer.merge_out_clusters(start - 1, end);
            }
        }
    }

    buffer.sync();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sara_am_codepoints() {
        assert_eq!(nikhahit_from_sara_am(0x0E33), 0x0E4D);
        assert_eq!(sara_aa_from_sara_am(0x0E33), 0x0E32);
        assert_eq!(nikhahit_from_sara_am(0x0EB3), 0x0ECD);
        assert_eq!(sara_aa_from_sara_am(0x0EB3), 0x0EB2);
    }

    #[test]
    fn mark_classification() {
        assert_eq!(mark_type(0x0E31), Mark::AboveVowel);
        assert_eq!(mark_type(0x0E38), Mark::BelowVowel);
        assert_eq!(mark_type(0x0E48), Mark::Tone);
        assert_eq!(mark_type(0x0E01), Mark::NotMark);
    }

    #[test]
    fn consonant_classification() {
        assert_eq!(consonant_type(0x0E1B), Consonant::Ascender);
        assert_eq!(consonant_type(0x0E0D), Consonant::RemovableDescender);
        assert_eq!(consonant_type(0x0E0E), Consonant::Descender);
        assert_eq!(consonant_type(0x0E01), Consonant::Plain);
        assert_eq!(consonant_type(0x0E48), Consonant::NotConsonant);
    }

    #[test]
    fn pua_tables_cover_their_mark_classes() {
        for &(u, _, _) in SHIFT_LEFT_MAPPINGS {
            assert_ne!(mark_type(u), Mark::NotMark);
        }
        for &(u, _, _) in SHIFT_DOWN_MAPPINGS {
            assert_ne!(mark_type(u), Mark::NotMark);
        }
        for &(u, _, _) in REMOVE_DESCENDER_MAPPINGS {
            assert_eq!(consonant_type(u), Consonant::RemovableDescender);
        }
    }
}
