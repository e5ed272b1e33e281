use ttf_parser::{morx, GlyphId};

use crate::buffer::Buffer;
use crate::plan::ShapePlan;
use crate::Face;

pub fn apply(plan: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    let chains = match face.tables().morx {
        Some(ref table) => table.chains,
        None => return,
    };

    for (chain_index, chain) in chains.into_iter().enumerate() {
        let flags = plan
            .aat_map
            .chain_flags
            .get(chain_index)
            .copied()
            .unwrap_or(chain.default_flags);

        for subtable in chain.subtables {
            if subtable.feature_flags & flags == 0 {
                continue;
            }

            if !subtable.coverage.is_all_directions()
                && buffer.props.direction.is_vertical() != subtable.coverage.is_vertical()
            {
                continue;
            }

            // Lookups process the glyphs in visual or logical order, possibly
            // backwards; reverse the buffer around the application to honor
            // that.
            let reverse = if subtable.coverage.is_logical() {
                subtable.coverage.is_backwards()
            } else {
                subtable.coverage.is_backwards() != buffer.props.direction.is_backward()
            };

            if reverse {
                buffer.reverse();
            }

            apply_subtable(&subtable.kind, face, buffer);

            if reverse {
                buffer.reverse();
            }
        }
    }
}

fn apply_subtable(kind: &morx::SubtableKind, face: &Face, buffer: &mut Buffer) {
    match kind {
        morx::SubtableKind::NonContextual(lookup) => {
            let has_glyph_classes = face.has_gdef_glyph_classes();

            for info in &mut buffer.info[..buffer.len] {
                if let Some(replacement) = lookup.value(info.as_glyph()) {
                    info.glyph_id = u32::from(replacement);
                    if has_glyph_classes {
                        info.set_glyph_props(face.glyph_props(GlyphId(replacement)));
                    }
                }
            }
        }

        // The state-machine subtables (rearrangement, contextual, ligature,
        // insertion) need a full entry-table driver; fonts relying on them
        // keep their default forms.
        morx::SubtableKind::Rearrangement(_)
        | morx::SubtableKind::Contextual(_)
        | morx::SubtableKind::Ligature(_)
        | morx::SubtableKind::Insertion(_) => {}
    }
}
