use ttf_parser::{kerx, GlyphId};

use crate::buffer::Buffer;
use crate::ot::kern::machine_kern;
use crate::plan::ShapePlan;
use crate::Face;

pub fn apply(plan: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    let subtables = match face.tables().kerx {
        Some(ref table) => table.subtables,
        None => return,
    };

    let horizontal = buffer.props.direction.is_horizontal();

    for subtable in subtables {
        if subtable.variable || subtable.horizontal != horizontal {
            continue;
        }

        match subtable.format {
            kerx::Format::Format0(ref s) => {
                pair_kern(plan, face, buffer, subtable.has_cross_stream, |l, r| {
                    s.glyphs_kerning(l, r).map(i32::from).unwrap_or(0)
                });
            }
            kerx::Format::Format2(ref s) => {
                pair_kern(plan, face, buffer, subtable.has_cross_stream, |l, r| {
                    s.glyphs_kerning(l, r).map(i32::from).unwrap_or(0)
                });
            }
            kerx::Format::Format6(ref s) => {
                pair_kern(plan, face, buffer, subtable.has_cross_stream, |l, r| {
                    s.glyphs_kerning(l, r).map(i32::from).unwrap_or(0)
                });
            }
            // State-machine kerning and anchor-point attachment need the
            // entry-table driver; skipped.
            kerx::Format::Format1(_) | kerx::Format::Format4(_) => {}
        }
    }
}

fn pair_kern(
    plan: &ShapePlan,
    face: &Face,
    buffer: &mut Buffer,
    cross_stream: bool,
    get_kerning: impl Fn(GlyphId, GlyphId) -> i32,
) {
    machine_kern(face, buffer, plan.kern_mask, cross_stream, |left, right| {
        get_kerning(GlyphId(left as u16), GlyphId(right as u16))
    });
}
