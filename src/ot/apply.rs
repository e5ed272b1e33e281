use ttf_parser::opentype_layout::LookupIndex;
use ttf_parser::GlyphId;

use super::layout::{lookup_flags, TableIndex, MAX_CONTEXT_LENGTH, MAX_NESTING_LEVEL};
use crate::buffer::{Buffer, GlyphInfo, GlyphPropsFlags};
use crate::unicode::GeneralCategory;
use crate::{Face, Mask};

/// Applies a single lookup or subtable at the buffer's current position.
pub trait Apply {
    /// Applies the lookup, advancing the buffer on success.
    fn apply(&self, ctx: &mut ApplyContext) -> Option<()>;
}

pub struct ApplyContext<'a, 'b> {
    pub table_index: TableIndex,
    pub face: &'a Face<'b>,
    pub buffer: &'a mut Buffer,
    pub lookup_mask: Mask,
    pub lookup_index: LookupIndex,
    pub lookup_props: u32,
    pub nesting_level_left: usize,
    pub auto_zwnj: bool,
    pub auto_zwj: bool,
    pub random: bool,
    pub random_state: u32,
}

impl<'a, 'b> ApplyContext<'a, 'b> {
    pub fn new(table_index: TableIndex, face: &'a Face<'b>, buffer: &'a mut Buffer) -> Self {
        Self {
            table_index,
            face,
            buffer,
            lookup_mask: 1,
            lookup_index: u16::MAX,
            lookup_props: 0,
            nesting_level_left: MAX_NESTING_LEVEL,
            auto_zwnj: true,
            auto_zwj: true,
            random: false,
            random_state: 1,
        }
    }

    pub fn random_number(&mut self) -> u32 {
        // http://www.cplusplus.com/reference/random/minstd_rand/
        self.random_state = self.random_state.wrapping_mul(48271) % 2147483647;
        self.random_state
    }

    pub fn check_glyph_property(&self, info: &GlyphInfo, match_props: u32) -> bool {
        let glyph_props = info.glyph_props();

        // Lookup flags are lower 16-bit of match props.
        let lookup_flags = match_props as u16;

        // Not covered, if, for example, glyph class is ligature and
        // match_props includes LookupFlags::IgnoreLigatures.
        if glyph_props & lookup_flags & lookup_flags::IGNORE_FLAGS != 0 {
            return false;
        }

        if glyph_props & GlyphPropsFlags::MARK.bits() != 0 {
            // If using mark filtering sets, the high short of match_props has
            // the set index.
            if lookup_flags & lookup_flags::USE_MARK_FILTERING_SET != 0 {
                let set_index = (match_props >> 16) as u16;
                return match self.face.tables().gdef {
                    Some(table) => table.is_mark_glyph(info.as_glyph(), Some(set_index)),
                    None => false,
                };
            }

            // The second byte of match_props has the meaning "ignore marks of
            // attachment type different than the attachment type specified."
            if lookup_flags & lookup_flags::MARK_ATTACHMENT_TYPE_MASK != 0 {
                return (lookup_flags & lookup_flags::MARK_ATTACHMENT_TYPE_MASK)
                    == (glyph_props & lookup_flags::MARK_ATTACHMENT_TYPE_MASK);
            }
        }

        true
    }

    fn set_glyph_class(
        &mut self,
        glyph_id: GlyphId,
        class_guess: GlyphPropsFlags,
        ligature: bool,
        component: bool,
    ) {
        let cur = self.buffer.cur_mut(0);
        let mut props = cur.glyph_props();

        props |= GlyphPropsFlags::SUBSTITUTED.bits();

        if ligature {
            props |= GlyphPropsFlags::LIGATED.bits();
            // In the only place that the MULTIPLIED bit is used, Uniscribe
            // seems to only care about the "last" transformation between
            // Ligature and Multiple substitutions.  Ie. if you ligate, expand,
            // and ligate again, it forgives the multiplication and acts as if
            // only ligation happened.  As such, clear MULTIPLIED bit.
            props &= !GlyphPropsFlags::MULTIPLIED.bits();
        }

        if component {
            props |= GlyphPropsFlags::MULTIPLIED.bits();
        }

        if self.face.has_gdef_glyph_classes() {
            props &= GlyphPropsFlags::PRESERVE.bits();
            props = (props & !GlyphPropsFlags::CLASS_MASK.bits()) | self.face.glyph_props(glyph_id);
        } else if !class_guess.is_empty() {
            props &= GlyphPropsFlags::PRESERVE.bits();
            props = (props & !GlyphPropsFlags::CLASS_MASK.bits()) | class_guess.bits();
        } else {
            props &= !GlyphPropsFlags::CLASS_MASK.bits();
        }

        self.buffer.cur_mut(0).set_glyph_props(props);
    }

    pub fn replace_glyph(&mut self, glyph_id: GlyphId) {
        self.set_glyph_class(glyph_id, GlyphPropsFlags::empty(), false, false);
        self.buffer.replace_glyph(u32::from(glyph_id.0));
    }

    pub fn replace_glyph_inplace(&mut self, glyph_id: GlyphId) {
        self.set_glyph_class(glyph_id, GlyphPropsFlags::empty(), false, false);
        self.buffer.cur_mut(0).glyph_id = u32::from(glyph_id.0);
    }

    pub fn replace_glyph_with_ligature(&mut self, glyph_id: GlyphId, class_guess: GlyphPropsFlags) {
        self.set_glyph_class(glyph_id, class_guess, true, false);
        self.buffer.replace_glyph(u32::from(glyph_id.0));
    }

    pub fn output_glyph_for_component(&mut self, glyph_id: GlyphId, class_guess: GlyphPropsFlags) {
        self.set_glyph_class(glyph_id, class_guess, false, true);
        self.buffer.output_glyph(u32::from(glyph_id.0));
    }
}

/// A match predicate: glyph against the subtable's value at position.
pub type MatchFunc<'a> = dyn Fn(GlyphId, u16) -> bool + 'a;

/// Value represents a glyph id.
pub fn match_glyph(glyph: GlyphId, value: u16) -> bool {
    glyph == GlyphId(value)
}

/// An iterator over glyphs that a lookup may consider, skipping ignorables
/// according to lookup props and joiner handling.
pub struct SkippyIter<'a> {
    lookup_props: u32,
    ignore_zwnj: bool,
    ignore_zwj: bool,
    mask: Mask,
    syllable: u8,
    matching: Option<&'a MatchFunc<'a>>,
    buf_idx: usize,
    num_items: u16,
}

#[derive(Clone, Copy, PartialEq)]
enum May {
    Yes,
    No,
    Depends,
}

impl<'a> SkippyIter<'a> {
    pub fn new(
        ctx: &ApplyContext,
        start_buf_index: usize,
        num_items: u16,
        context_match: bool,
    ) -> Self {
        SkippyIter {
            lookup_props: ctx.lookup_props,
            // Ignore ZWNJ if we are matching GPOS, or matching GSUB context
            // and asked to.
            ignore_zwnj: ctx.table_index == TableIndex::GPOS || (context_match && ctx.auto_zwnj),
            // Ignore ZWJ if we are matching context, or asked to.
            ignore_zwj: context_match || ctx.auto_zwj,
            mask: if context_match {
                u32::MAX
            } else {
                ctx.lookup_mask
            },
            syllable: if ctx.buffer.idx == start_buf_index {
                ctx.buffer.cur(0).syllable()
            } else {
                0
            },
            matching: None,
            buf_idx: start_buf_index,
            num_items,
        }
    }

    pub fn set_lookup_props(&mut self, lookup_props: u32) {
        self.lookup_props = lookup_props;
    }

    pub fn enable_matching(&mut self, func: &'a MatchFunc<'a>) {
        self.matching = Some(func);
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.buf_idx
    }

    pub fn next(&mut self, ctx: &ApplyContext) -> bool {
        assert!(self.num_items > 0);
        while self.buf_idx + usize::from(self.num_items) < ctx.buffer.len {
            self.buf_idx += 1;
            let info = &ctx.buffer.info[self.buf_idx];

            let skip = self.may_skip(ctx, info);
            if skip == May::Yes {
                continue;
            }

            let matched = self.may_match(info);
            if matched == May::Yes || (matched == May::Depends && skip == May::No) {
                self.num_items -= 1;
                return true;
            }

            if skip == May::No {
                return false;
            }
        }

        false
    }

    pub fn prev(&mut self, ctx: &ApplyContext) -> bool {
        assert!(self.num_items > 0);
        while self.buf_idx >= usize::from(self.num_items) {
            self.buf_idx -= 1;
            let info = &ctx.buffer.out_info()[self.buf_idx];

            let skip = self.may_skip(ctx, info);
            if skip == May::Yes {
                continue;
            }

            let matched = self.may_match(info);
            if matched == May::Yes || (matched == May::Depends && skip == May::No) {
                self.num_items -= 1;
                return true;
            }

            if skip == May::No {
                return false;
            }
        }

        false
    }

    pub fn reject(&mut self) {
        self.num_items += 1;
    }

    fn may_match(&self, info: &GlyphInfo) -> May {
        if (info.mask & self.mask) != 0 && (self.syllable == 0 || self.syllable == info.syllable())
        {
            match self.matching {
                Some(f) => {
                    if f(info.as_glyph(), self.num_items) {
                        May::Yes
                    } else {
                        May::No
                    }
                }
                None => May::Depends,
            }
        } else {
            May::No
        }
    }

    pub(crate) fn may_skip(&self, ctx: &ApplyContext, info: &GlyphInfo) -> May {
        if !ctx.check_glyph_property(info, self.lookup_props) {
            return May::Yes;
        }

        if !info.is_default_ignorable()
            || info.is_hidden()
            || (!self.ignore_zwnj && info.is_zwnj())
            || (!self.ignore_zwj && info.is_zwj())
        {
            return May::No;
        }

        May::Depends
    }
}

pub fn match_input(
    ctx: &mut ApplyContext,
    input_len: u16,
    match_func: &MatchFunc,
    end_position: &mut usize,
    match_positions: &mut [usize; MAX_CONTEXT_LENGTH],
    p_total_component_count: Option<&mut u8>,
) -> bool {
    // This is perhaps the trickiest part of OpenType...  Remarks:
    //
    // - If all components of the ligature were marks, we call this a mark
    //   ligature.
    //
    // - Ligatures cannot be formed across glyphs attached to different
    //   components of previous ligatures.  Eg. the sequence is LAM,SHADDA,
    //   LAM,FATHA,HEH, and LAM,LAM,HEH form a ligature, leaving SHADDA,FATHA
    //   next to eachother.  However, it would be wrong to ligate that
    //   SHADDA,FATHA sequence.  There is an exception to this: if a ligature
    //   tries ligating with marks that belong to it itself, go ahead,
    //   assuming that the font designer knows what they are doing.

    let count = usize::from(input_len) + 1;
    if count > MAX_CONTEXT_LENGTH {
        return false;
    }

    let mut iter = SkippyIter::new(ctx, ctx.buffer.idx, input_len, false);
    iter.enable_matching(match_func);

    let first = ctx.buffer.cur(0);
    let first_lig_id = first.lig_id();
    let first_lig_comp = first.lig_comp();
    let mut total_component_count = first.lig_num_comps();

    match_positions[0] = ctx.buffer.idx;

    for position in &mut match_positions[1..count] {
        if !iter.next(ctx) {
            *end_position = iter.index() + 1;
            return false;
        }

        *position = iter.index();

        let this = ctx.buffer.info[iter.index()];
        let this_lig_id = this.lig_id();
        let this_lig_comp = this.lig_comp();

        if first_lig_id != 0 && first_lig_comp != 0 {
            // If first component was attached to a previous ligature
            // component, all subsequent components should be attached to the
            // same ligature component, otherwise we shouldn't ligate them.
            if first_lig_id != this_lig_id || first_lig_comp != this_lig_comp {
                return false;
            }
        } else {
            // If first component was NOT attached to a previous ligature
            // component, all subsequent components should also NOT be
            // attached to any ligature component, unless they are attached
            // to the first component itself!
            if this_lig_id != 0 && this_lig_comp != 0 && this_lig_id != first_lig_id {
                return false;
            }
        }

        total_component_count += this.lig_num_comps();
    }

    *end_position = iter.index() + 1;

    if let Some(p_total_component_count) = p_total_component_count {
        *p_total_component_count = total_component_count;
    }

    true
}

pub fn match_backtrack(
    ctx: &mut ApplyContext,
    backtrack_len: u16,
    match_func: &MatchFunc,
    match_start: &mut usize,
) -> bool {
    if backtrack_len == 0 {
        *match_start = ctx.buffer.backtrack_len();
        return true;
    }

    let mut iter = SkippyIter::new(ctx, ctx.buffer.backtrack_len(), backtrack_len, true);
    iter.enable_matching(match_func);

    for _ in 0..backtrack_len {
        if !iter.prev(ctx) {
            return false;
        }
    }

    *match_start = iter.index();
    true
}

pub fn match_lookahead(
    ctx: &mut ApplyContext,
    lookahead_len: u16,
    match_func: &MatchFunc,
    start_index: usize,
    end_index: &mut usize,
) -> bool {
    if lookahead_len == 0 {
        *end_index = start_index;
        return true;
    }

    let mut iter = SkippyIter::new(ctx, start_index - 1, lookahead_len, true);
    iter.enable_matching(match_func);

    for _ in 0..lookahead_len {
        if !iter.next(ctx) {
            return false;
        }
    }

    *end_index = iter.index() + 1;
    true
}

pub fn ligate_input(
    ctx: &mut ApplyContext,
    // Including the first glyph.
    count: usize,
    // Including the first glyph.
    match_positions: &[usize; MAX_CONTEXT_LENGTH],
    match_end: usize,
    total_component_count: u8,
    lig_glyph: GlyphId,
) {
    // - If a base and one or more marks ligate, consider that as a base, NOT
    //   ligature, such that all following marks can still attach to it.
    //
    // - If all components of the ligature were marks, we call this a mark
    //   ligature.  If it *is* a mark ligature, we don't allocate a new
    //   ligature id, and leave the ligature to keep its old ligature id.
    //   This will allow it to attach to a base ligature in GPOS.
    //
    // - If a ligature is formed of components that some of which are also
    //   ligatures themselves, and those ligature components had marks
    //   attached to *their* components, we have to attach the marks to the
    //   new ligature component positions!  These marks may be following the
    //   last component of the whole sequence, so we should loop forward
    //   looking for them and update them.

    let mut buffer = &mut *ctx.buffer;
    buffer.merge_clusters(buffer.idx, match_end);

    let mut is_base_ligature = buffer.info[match_positions[0]].is_base_glyph();
    let mut is_mark_ligature = buffer.info[match_positions[0]].is_mark();
    for i in 1..count {
        if !buffer.info[match_positions[i]].is_mark() {
            is_base_ligature = false;
            is_mark_ligature = false;
        }
    }

    let is_ligature = !is_base_ligature && !is_mark_ligature;
    let class = if is_ligature {
        GlyphPropsFlags::LIGATURE
    } else {
        GlyphPropsFlags::empty()
    };
    let lig_id = if is_ligature {
        buffer.allocate_lig_id()
    } else {
        0
    };
    let first = buffer.cur_mut(0);
    let mut last_lig_id = first.lig_id();
    let mut last_num_comps = first.lig_num_comps();
    let mut comps_so_far = last_num_comps;

    if is_ligature {
        first.set_lig_props_for_ligature(lig_id, total_component_count);
        if first.general_category() == GeneralCategory::NonspacingMark {
            first.set_general_category(GeneralCategory::OtherLetter);
        }
    }

    ctx.replace_glyph_with_ligature(lig_glyph, class);
    buffer = &mut *ctx.buffer;

    for i in 1..count {
        while buffer.idx < match_positions[i] && buffer.successful {
            if is_ligature {
                let cur = buffer.cur_mut(0);
                let mut this_comp = cur.lig_comp();
                if this_comp == 0 {
                    this_comp = last_num_comps;
                }
                let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
                cur.set_lig_props_for_mark(lig_id, new_lig_comp);
            }
            buffer.next_glyph();
        }

        let cur = buffer.cur(0);
        last_lig_id = cur.lig_id();
        last_num_comps = cur.lig_num_comps();
        comps_so_far += last_num_comps;

        // Skip the base glyph.
        buffer.idx += 1;
    }

    if !is_mark_ligature && last_lig_id != 0 {
        // Re-adjust components for any marks following.
        for i in buffer.idx..buffer.len {
            let info = &mut buffer.info[i];
            if last_lig_id != info.lig_id() {
                break;
            }

            let this_comp = info.lig_comp();
            if this_comp == 0 {
                break;
            }

            let new_lig_comp = comps_so_far - last_num_comps + this_comp.min(last_num_comps);
            info.set_lig_props_for_mark(lig_id, new_lig_comp);
        }
    }
}
