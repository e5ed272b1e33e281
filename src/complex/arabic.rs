use std::any::Any;

use smallvec::SmallVec;

use super::{ComplexShaper, ZeroWidthMarksMode};
use crate::buffer::Buffer;
use crate::ot::normalize::ShapeNormalizationMode;
use crate::ot::{feature, FeatureFlags};
use crate::plan::{ShapePlan, ShapePlanner};
use crate::unicode::{CharExt, GeneralCategory};
use crate::{Face, Mask};

pub const ARABIC_SHAPER: ComplexShaper = ComplexShaper {
    collect_features: Some(collect_features),
    override_features: None,
    create_data: Some(create_data),
    preprocess_text: None,
    postprocess_glyphs: None,
    normalization_preference: ShapeNormalizationMode::Auto,
    decompose: None,
    compose: None,
    setup_masks: Some(setup_masks),
    gpos_tag: None,
    reorder_marks: None,
    zero_width_marks: ZeroWidthMarksMode::ByGdefLate,
    fallback_position: true,
};

#[derive(Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
enum JoiningType {
    U,
    L,
    R,
    D,
    // Join-causing characters behave like dual-joining.
    C,
    GroupAlaph,
    GroupDalathRish,
    T,
}

const NUM_STATE_MACHINE_COLS: usize = 6;

// Actions the state machine distributes over the run.
const NONE: u8 = 0;
const ISOL: u8 = 1;
const FINA: u8 = 2;
const FIN2: u8 = 3;
const FIN3: u8 = 4;
const MEDI: u8 = 5;
const MED2: u8 = 6;
const INIT: u8 = 7;
const TOTAL_ACTIONS: usize = 8;

const FEATURES: [crate::Tag; 7] = [
    feature::ISOLATED_FORMS,
    feature::TERMINAL_FORMS,
    feature::TERMINAL_FORMS_2,
    feature::TERMINAL_FORMS_3,
    feature::MEDIAL_FORMS,
    feature::MEDIAL_FORMS_2,
    feature::INITIAL_FORMS,
];

fn feature_for_action(action: u8) -> Option<crate::Tag> {
    match action {
        ISOL => Some(feature::ISOLATED_FORMS),
        FINA => Some(feature::TERMINAL_FORMS),
        FIN2 => Some(feature::TERMINAL_FORMS_2),
        FIN3 => Some(feature::TERMINAL_FORMS_3),
        MEDI => Some(feature::MEDIAL_FORMS),
        MED2 => Some(feature::MEDIAL_FORMS_2),
        INIT => Some(feature::INITIAL_FORMS),
        _ => None,
    }
}

struct StateEntry {
    prev_action: u8,
    curr_action: u8,
    next_state: u8,
}

const fn entry(prev_action: u8, curr_action: u8, next_state: u8) -> StateEntry {
    StateEntry {
        prev_action,
        curr_action,
        next_state,
    }
}

// Columns: jt_U, jt_L, jt_R, jt_D, jg_ALAPH, jg_DALATH_RISH.
const STATE_TABLE: &[[StateEntry; NUM_STATE_MACHINE_COLS]] = &[
    // State 0: prev was U, not willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(NONE, ISOL, 1),
        entry(NONE, ISOL, 2),
        entry(NONE, ISOL, 1),
        entry(NONE, ISOL, 6),
    ],
    // State 1: prev was R or ISOL/ALAPH, not willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(NONE, ISOL, 1),
        entry(NONE, ISOL, 2),
        entry(NONE, FIN2, 5),
        entry(NONE, ISOL, 6),
    ],
    // State 2: prev was D/L in ISOL form, willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(INIT, FINA, 1),
        entry(INIT, FINA, 3),
        entry(INIT, FINA, 4),
        entry(INIT, FINA, 6),
    ],
    // State 3: prev was D in FINA form, willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(MEDI, FINA, 1),
        entry(MEDI, FINA, 3),
        entry(MEDI, FINA, 4),
        entry(MEDI, FINA, 6),
    ],
    // State 4: prev was FINA ALAPH, not willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(MED2, ISOL, 1),
        entry(MED2, ISOL, 2),
        entry(MED2, FIN2, 5),
        entry(MED2, ISOL, 6),
    ],
    // State 5: prev was FIN2/FIN3 ALAPH, not willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(ISOL, ISOL, 1),
        entry(ISOL, ISOL, 2),
        entry(ISOL, FIN2, 5),
        entry(ISOL, ISOL, 6),
    ],
    // State 6: prev was DALATH/RISH, not willing to join.
    [
        entry(NONE, NONE, 0),
        entry(NONE, ISOL, 2),
        entry(NONE, ISOL, 1),
        entry(NONE, ISOL, 2),
        entry(NONE, FIN3, 5),
        entry(NONE, ISOL, 6),
    ],
];

fn joining_type(c: char) -> JoiningType {
    let u = c as u32;

    // Syriac joining groups come first; they also behave as R.
    match u {
        0x0710 => return JoiningType::GroupAlaph,
        0x0715 | 0x0716 | 0x072A => return JoiningType::GroupDalathRish,
        _ => {}
    }

    match u {
        // Join-causing.
        0x0640 | 0x07FA | 0x200D => JoiningType::C,

        // Arabic right-joining letters.
        0x0622..=0x0625
        | 0x0627
        | 0x0629
        | 0x062F..=0x0632
        | 0x0648
        | 0x0671..=0x0673
        | 0x0675..=0x0677
        | 0x0688..=0x0699
        | 0x06C0
        | 0x06C3..=0x06CB
        | 0x06CD
        | 0x06CF
        | 0x06D2..=0x06D3
        | 0x06D5
        | 0x06EE..=0x06EF => JoiningType::R,

        // Syriac right-joining letters.
        0x0717..=0x0719 | 0x071E | 0x0728 | 0x072C => JoiningType::R,

        // Arabic dual-joining letters.
        0x0620
        | 0x0626
        | 0x0628
        | 0x062A..=0x062E
        | 0x0633..=0x063F
        | 0x0641..=0x0647
        | 0x0649..=0x064A
        | 0x066E..=0x066F
        | 0x0678..=0x0687
        | 0x069A..=0x06BF
        | 0x06C1..=0x06C2
        | 0x06CC
        | 0x06CE
        | 0x06D0..=0x06D1
        | 0x06FA..=0x06FC
        | 0x06FF
        // Arabic Supplement and Extended-A letters join on both sides,
        // with few exceptions that we gloss over.
        | 0x0750..=0x077F
        | 0x08A0..=0x08C7 => JoiningType::D,

        // Syriac dual-joining letters.
        0x0712..=0x0714 | 0x071A..=0x071D | 0x071F..=0x0727 | 0x0729 | 0x072B => JoiningType::D,

        _ => {
            // ZWNJ breaks joining; everything invisible to joining is
            // transparent.
            if u == 0x200C {
                JoiningType::U
            } else {
                match c.general_category() {
                    GeneralCategory::NonspacingMark
                    | GeneralCategory::EnclosingMark
                    | GeneralCategory::Format => JoiningType::T,
                    _ => JoiningType::U,
                }
            }
        }
    }
}

fn collect_features(planner: &mut ShapePlanner) {
    // We apply features according to the Arabic spec, with pauses in between
    // so that the joining-form features never match each other's output.
    let map = &mut planner.ot_map;

    map.enable_feature(feature::GLYPH_COMPOSITION_DECOMPOSITION, FeatureFlags::NONE, 1);
    map.enable_feature(feature::LOCALIZED_FORMS, FeatureFlags::NONE, 1);
    map.add_gsub_pause(None);

    for feature_tag in FEATURES {
        map.add_feature(feature_tag, FeatureFlags::HAS_FALLBACK, 1);
        map.add_gsub_pause(None);
    }

    map.enable_feature(
        feature::REQUIRED_LIGATURES,
        FeatureFlags::MANUAL_ZWJ | FeatureFlags::HAS_FALLBACK,
        1,
    );
    map.add_gsub_pause(None);

    map.enable_feature(feature::CONTEXTUAL_ALTERNATES, FeatureFlags::MANUAL_ZWJ, 1);
    map.add_gsub_pause(None);

    // The spec includes 'cswh'.  Earlier versions of Windows shaped it, then
    // stopped.  Fonts rarely carry it, so match the reference behavior and
    // keep 'mset' only.
    map.enable_feature(feature::MARK_POSITIONING_VIA_SUBSTITUTION, FeatureFlags::NONE, 1);
}

struct ArabicShapePlan {
    // The "+ 1" covers the NONE action.
    mask_array: [Mask; TOTAL_ACTIONS],
}

fn create_data(plan: &ShapePlan) -> Option<Box<dyn Any + Send + Sync>> {
    let mut mask_array = [0; TOTAL_ACTIONS];
    for (action, mask) in mask_array.iter_mut().enumerate() {
        if let Some(tag) = feature_for_action(action as u8) {
            *mask = plan.ot_map.one_mask(tag);
        }
    }

    Some(Box::new(ArabicShapePlan { mask_array }))
}

fn setup_masks(plan: &ShapePlan, _: &Face, buffer: &mut Buffer) {
    let arabic_plan = plan.data::<ArabicShapePlan>();

    let len = buffer.len;
    let mut actions = SmallVec::<[u8; 64]>::new();
    actions.resize(len, NONE);

    // Joining state machine over the run; transparent characters keep the
    // state of the letter before them.
    let mut state = 0usize;
    let mut prev: Option<usize> = None;

    // Check pre-context.
    for i in 0..buffer.context_len[0] {
        let jt = joining_type(buffer.context[0][i]);
        if jt == JoiningType::T {
            continue;
        }

        let col = column(jt);
        state = usize::from(STATE_TABLE[state][col].next_state);
        break;
    }

    for i in 0..len {
        let jt = joining_type(buffer.info[i].as_char());
        if jt == JoiningType::T {
            actions[i] = NONE;
            continue;
        }

        let col = column(jt);
        let entry = &STATE_TABLE[state][col];

        if entry.prev_action != NONE {
            if let Some(prev) = prev {
                actions[prev] = entry.prev_action;
                buffer.unsafe_to_break(prev, i + 1);
            }
        }

        actions[i] = entry.curr_action;

        prev = Some(i);
        state = usize::from(entry.next_state);
    }

    // Post-context closes the run the same way.
    for i in 0..buffer.context_len[1] {
        let jt = joining_type(buffer.context[1][i]);
        if jt == JoiningType::T {
            continue;
        }

        let col = column(jt);
        let entry = &STATE_TABLE[state][col];
        if entry.prev_action != NONE {
            if let Some(prev) = prev {
                actions[prev] = entry.prev_action;
            }
        }
        break;
    }

    for (info, action) in buffer.info[..len].iter_mut().zip(actions) {
        info.mask |= arabic_plan.mask_array[usize::from(action)];
    }
}

fn column(jt: JoiningType) -> usize {
    match jt {
        JoiningType::U => 0,
        JoiningType::L => 1,
        JoiningType::R => 2,
        JoiningType::D | JoiningType::C => 3,
        JoiningType::GroupAlaph => 4,
        JoiningType::GroupDalathRish => 5,
        JoiningType::T => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions_for(text: &str) -> Vec<u8> {
        let mut actions = Vec::new();

        let mut state = 0usize;
        let mut prev: Option<usize> = None;
        for (i, c) in text.chars().enumerate() {
            let jt = joining_type(c);
            actions.push(NONE);
            if jt == JoiningType::T {
                continue;
            }
            let entry = &STATE_TABLE[state][column(jt)];
            if entry.prev_action != NONE {
                if let Some(prev) = prev {
                    actions[prev] = entry.prev_action;
                }
            }
            actions[i] = entry.curr_action;
            prev = Some(i);
            state = usize::from(entry.next_state);
        }

        actions
    }

    #[test]
    fn lam_alef_joins() {
        // LAM (dual) followed by ALEF (right): LAM takes INIT, ALEF FINA.
        let actions = actions_for("\u{0644}\u{0627}");
        assert_eq!(actions, &[INIT, FINA]);
    }

    #[test]
    fn three_letter_word() {
        // KAF, TEH, BEH: init, medi, fina.
        let actions = actions_for("\u{0643}\u{062A}\u{0628}");
        assert_eq!(actions, &[INIT, MEDI, FINA]);
    }

    #[test]
    fn isolated_letter() {
        let actions = actions_for("\u{0627}");
        assert_eq!(actions, &[ISOL]);
    }

    #[test]
    fn marks_are_transparent() {
        // BEH, FATHA (mark), BEH: the mark must not break the join.
        let actions = actions_for("\u{0628}\u{064E}\u{0628}");
        assert_eq!(actions, &[INIT, NONE, FINA]);
    }
}
