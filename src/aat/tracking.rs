use ttf_parser::trak;

use crate::buffer::Buffer;
use crate::plan::ShapePlan;
use crate::Face;

pub fn apply(plan: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    let ptem = match face.points_per_em {
        Some(ptem) if ptem > 0.0 => ptem,
        _ => return,
    };

    let (horizontal_data, vertical_data) = match face.tables().trak {
        Some(ref table) => (table.horizontal, table.vertical),
        None => return,
    };

    let trak_mask = plan.trak_mask;

    if !buffer.have_positions {
        buffer.clear_positions();
    }

    if buffer.props.direction.is_horizontal() {
        let tracking = match interpolate_tracking(&horizontal_data, ptem) {
            Some(v) => v,
            None => return,
        };
        let offset_to_add = tracking / 2;
        foreach_grapheme!(buffer, start, end, {
            let _ = end;
            if buffer.info[start].mask & trak_mask != 0 {
                buffer.pos[start].x_advance += tracking;
                buffer.pos[start].x_offset += offset_to_add;
            }
        });
    } else {
        let tracking = match interpolate_tracking(&vertical_data, ptem) {
            Some(v) => v,
            None => return,
        };
        let offset_to_add = tracking / 2;
        foreach_grapheme!(buffer, start, end, {
            let _ = end;
            if buffer.info[start].mask & trak_mask != 0 {
                buffer.pos[start].y_advance += tracking;
                buffer.pos[start].y_offset += offset_to_add;
            }
        });
    }
}

/// The value of the "normal" track at `ptem`, linearly interpolated between
/// the two nearest per-size entries.
fn interpolate_tracking(data: &trak::TrackData, ptem: f32) -> Option<i32> {
    let track = data.tracks.into_iter().find(|t| t.value == 0.0)?;

    let n_sizes = data.sizes.len();
    if n_sizes == 0 {
        return None;
    }
    if n_sizes == 1 {
        return track.values.get(0).map(i32::from);
    }

    // Find the size bracket.
    let mut idx = 0;
    while idx < n_sizes - 1 && data.sizes.get(idx + 1)?.0 < ptem {
        idx += 1;
    }

    let s0 = data.sizes.get(idx)?.0;
    let s1 = data.sizes.get(idx + 1)?.0;
    let t = if ptem <= s0 {
        0.0
    } else if ptem >= s1 {
        1.0
    } else {
        (ptem - s0) / (s1 - s0)
    };

    let v0 = f32::from(track.values.get(idx)?);
    let v1 = f32::from(track.values.get(idx + 1)?);
    Some((v0 + t * (v1 - v0)).round() as i32)
}
