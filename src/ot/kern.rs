use ttf_parser::GlyphId;

use super::apply::{ApplyContext, SkippyIter};
use super::layout::{lookup_flags, TableIndex};
use crate::buffer::{Buffer, BufferScratchFlags};
use crate::plan::ShapePlan;
use crate::{Face, Mask};

pub fn has_kerning(face: &Face) -> bool {
    face.tables().kern.is_some()
}

pub fn has_state_machine_kerning(face: &Face) -> bool {
    match face.tables().kern {
        Some(ref kern) => kern.subtables.into_iter().any(|s| s.has_state_machine),
        None => false,
    }
}

pub fn has_cross_kerning(face: &Face) -> bool {
    match face.tables().kern {
        Some(ref kern) => kern.subtables.into_iter().any(|s| s.has_cross_stream),
        None => false,
    }
}

pub fn kern(plan: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    let subtables = match face.tables().kern {
        Some(ref table) => table.subtables,
        None => return,
    };

    let horizontal = buffer.props.direction.is_horizontal();

    for subtable in subtables {
        if subtable.variable || subtable.horizontal != horizontal {
            continue;
        }

        // State-machine subtables cannot be driven without glyph-pair
        // semantics; skip them here.
        if subtable.has_state_machine {
            continue;
        }

        machine_kern(
            face,
            buffer,
            plan.kern_mask,
            subtable.has_cross_stream,
            |left, right| {
                subtable
                    .glyphs_kerning(GlyphId(left as u16), GlyphId(right as u16))
                    .map(i32::from)
                    .unwrap_or(0)
            },
        );
    }
}

/// Pair kerning over the buffer: skips marks, splits the kerning value over
/// advance and offset of the pair.
pub(crate) fn machine_kern(
    face: &Face,
    buffer: &mut Buffer,
    kern_mask: Mask,
    cross_stream: bool,
    get_kerning: impl Fn(u32, u32) -> i32,
) {
    let mut ctx = ApplyContext::new(TableIndex::GPOS, face, buffer);
    ctx.lookup_mask = kern_mask;
    ctx.lookup_props = u32::from(lookup_flags::IGNORE_MARKS);

    let horizontal = ctx.buffer.props.direction.is_horizontal();

    let mut i = 0;
    while i < ctx.buffer.len {
        if (ctx.buffer.info[i].mask & kern_mask) == 0 {
            i += 1;
            continue;
        }

        ctx.buffer.idx = i;
        let mut iter = SkippyIter::new(&ctx, i, 1, false);
        if !iter.next(&ctx) {
            i += 1;
            continue;
        }

        let j = iter.index();

        let info = &ctx.buffer.info;
        let kern = get_kerning(info[i].glyph_id, info[j].glyph_id);

        let pos = &mut ctx.buffer.pos;
        if kern != 0 {
            if horizontal {
                if cross_stream {
                    pos[j].y_offset = kern;
                    ctx.buffer.scratch_flags |= BufferScratchFlags::HAS_GPOS_ATTACHMENT;
                } else {
                    let kern1 = kern >> 1;
                    let kern2 = kern - kern1;
                    pos[i].x_advance += kern1;
                    pos[j].x_advance += kern2;
                    pos[j].x_offset += kern2;
                }
            } else if cross_stream {
                pos[j].x_offset = kern;
                ctx.buffer.scratch_flags |= BufferScratchFlags::HAS_GPOS_ATTACHMENT;
            } else {
                let kern1 = kern >> 1;
                let kern2 = kern - kern1;
                pos[i].y_advance += kern1;
                pos[j].y_advance += kern2;
                pos[j].y_offset += kern2;
            }

            ctx.buffer.unsafe_to_break(i, j + 1)
        }

        i = j;
    }
}
