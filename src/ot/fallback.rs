use crate::buffer::Buffer;
use crate::face::GlyphExtents;
use crate::plan::ShapePlan;
use crate::unicode::{modified_combining_class as mcc, GeneralCategory, Space};
use crate::{Direction, Face};

// Combining classes we position around, by their Unicode ccc value.
mod class {
    pub const ATTACHED_BELOW_LEFT: u8 = 200;
    pub const ATTACHED_BELOW: u8 = 202;
    pub const ATTACHED_ABOVE: u8 = 214;
    pub const ATTACHED_ABOVE_RIGHT: u8 = 216;
    pub const BELOW_LEFT: u8 = 218;
    pub const BELOW: u8 = 220;
    pub const BELOW_RIGHT: u8 = 222;
    pub const ABOVE_LEFT: u8 = 228;
    pub const ABOVE: u8 = 230;
    pub const ABOVE_RIGHT: u8 = 232;
    pub const DOUBLE_BELOW: u8 = 233;
    pub const DOUBLE_ABOVE: u8 = 234;
}

fn recategorize_combining_class(u: u32, mut klass: u8) -> u8 {
    use class::*;

    if klass >= 200 {
        return klass;
    }

    // Thai / Lao need some per-character work.
    if u & !0xFF == 0x0E00 {
        if klass == 0 {
            match u {
                0x0E31 | 0x0E34 | 0x0E35 | 0x0E36 | 0x0E37 | 0x0E47 | 0x0E4C | 0x0E4D | 0x0E4E => {
                    klass = ABOVE_RIGHT
                }

                0x0EB1 | 0x0EB4 | 0x0EB5 | 0x0EB6 | 0x0EB7 | 0x0EBB | 0x0ECC | 0x0ECD => {
                    klass = ABOVE
                }

                0x0EBC => klass = BELOW,

                _ => {}
            }
        } else {
            // Thai virama is below-right.
            if u == 0x0E3A {
                klass = BELOW_RIGHT;
            }
        }
    }

    match klass {
        // Hebrew
        mcc::CCC10 => BELOW,          // sheva
        mcc::CCC11 => BELOW,          // hataf segol
        mcc::CCC12 => BELOW,          // hataf patah
        mcc::CCC13 => BELOW,          // hataf qamats
        mcc::CCC14 => BELOW,          // hiriq
        mcc::CCC15 => BELOW,          // tsere
        mcc::CCC16 => BELOW,          // segol
        mcc::CCC17 => BELOW,          // patah
        mcc::CCC18 => BELOW,          // qamats
        mcc::CCC20 => BELOW,          // qubuts
        mcc::CCC22 => BELOW,          // meteg
        mcc::CCC23 => ATTACHED_ABOVE, // rafe
        mcc::CCC24 => ABOVE_RIGHT,    // shin dot
        mcc::CCC25 => ABOVE_LEFT,     // sin dot
        mcc::CCC19 => ABOVE_LEFT,     // holam
        mcc::CCC26 => ABOVE,          // point varika
        mcc::CCC21 => klass,          // dagesh

        // Arabic and Syriac
        mcc::CCC27 => ABOVE, // fathatan
        mcc::CCC28 => ABOVE, // dammatan
        mcc::CCC30 => ABOVE, // fatha
        mcc::CCC31 => ABOVE, // damma
        mcc::CCC33 => ABOVE, // shadda
        mcc::CCC34 => ABOVE, // sukun
        mcc::CCC35 => ABOVE, // superscript alef
        mcc::CCC36 => ABOVE, // superscript alaph
        mcc::CCC29 => BELOW, // kasratan
        mcc::CCC32 => BELOW, // kasra

        // Thai
        mcc::CCC103 => BELOW_RIGHT, // sara u / sara uu
        mcc::CCC107 => ABOVE_RIGHT, // mai

        // Lao
        mcc::CCC118 => BELOW, // sign u / sign uu
        mcc::CCC122 => ABOVE, // mai

        // Tibetan
        mcc::CCC129 => BELOW, // sign aa
        mcc::CCC130 => ABOVE, // sign i
        mcc::CCC132 => BELOW, // sign u

        _ => klass,
    }
}

pub fn recategorize_marks(_: &ShapePlan, _: &Face, buffer: &mut Buffer) {
    let len = buffer.len;
    for info in &mut buffer.info[..len] {
        if info.general_category() == GeneralCategory::NonspacingMark {
            let mut klass = info.modified_combining_class();
            klass = recategorize_combining_class(info.glyph_id, klass);
            info.set_modified_combining_class(klass);
        }
    }
}

fn zero_mark_advances(
    buffer: &mut Buffer,
    start: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    for (info, pos) in buffer.info[start..end]
        .iter()
        .zip(&mut buffer.pos[start..end])
    {
        if info.general_category() == GeneralCategory::NonspacingMark {
            if adjust_offsets_when_zeroing {
                pos.x_offset -= pos.x_advance;
                pos.y_offset -= pos.y_advance;
            }
            pos.x_advance = 0;
            pos.y_advance = 0;
        }
    }
}

fn position_mark(
    face: &Face,
    direction: Direction,
    glyph: u32,
    pos: &mut crate::buffer::GlyphPosition,
    base_extents: &mut GlyphExtents,
    combining_class: u8,
) {
    use class::*;

    let mark_extents = match face.glyph_extents(ttf_parser::GlyphId(glyph as u16)) {
        Some(extents) => extents,
        None => return,
    };

    let y_gap = face.units_per_em() / 16;
    pos.x_offset = 0;
    pos.y_offset = 0;

    // We don't position LEFT and RIGHT marks.

    // X positioning.
    match combining_class {
        DOUBLE_BELOW | DOUBLE_ABOVE if direction.is_horizontal() => {
            pos.x_offset += base_extents.x_bearing
                + if direction.is_forward() {
                    base_extents.width
                } else {
                    0
                }
                - mark_extents.width / 2
                - mark_extents.x_bearing;
        }

        ATTACHED_BELOW_LEFT | BELOW_LEFT | ABOVE_LEFT => {
            // Left align.
            pos.x_offset += base_extents.x_bearing - mark_extents.x_bearing;
        }

        ATTACHED_ABOVE_RIGHT | BELOW_RIGHT | ABOVE_RIGHT => {
            // Right align.
            pos.x_offset += base_extents.x_bearing + base_extents.width
                - mark_extents.width
                - mark_extents.x_bearing;
        }

        // Center align.
        _ => {
            pos.x_offset += base_extents.x_bearing + (base_extents.width - mark_extents.width) / 2
                - mark_extents.x_bearing;
        }
    }

    let is_attached = matches!(
        combining_class,
        ATTACHED_BELOW_LEFT | ATTACHED_BELOW | ATTACHED_ABOVE | ATTACHED_ABOVE_RIGHT
    );

    // Y positioning.
    match combining_class {
        DOUBLE_BELOW | BELOW_LEFT | BELOW | BELOW_RIGHT | ATTACHED_BELOW_LEFT | ATTACHED_BELOW => {
            if !is_attached {
                // Add gap.
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing + base_extents.height - mark_extents.y_bearing;

            // Never shift up "below" marks.
            if (y_gap > 0) == (pos.y_offset > 0) {
                base_extents.height -= pos.y_offset;
                pos.y_offset = 0;
            }

            base_extents.height += mark_extents.height;
        }

        DOUBLE_ABOVE | ABOVE_LEFT | ABOVE | ABOVE_RIGHT | ATTACHED_ABOVE | ATTACHED_ABOVE_RIGHT => {
            if !is_attached {
                // Add gap.
                base_extents.y_bearing += y_gap;
                base_extents.height -= y_gap;
            }

            pos.y_offset = base_extents.y_bearing - (mark_extents.y_bearing + mark_extents.height);

            // Don't shift down "above" marks too much.
            if (y_gap > 0) != (pos.y_offset > 0) {
                let correction = -pos.y_offset / 2;
                base_extents.y_bearing += correction;
                base_extents.height -= correction;
                pos.y_offset += correction;
            }

            base_extents.y_bearing -= mark_extents.height;
            base_extents.height += mark_extents.height;
        }

        _ => {}
    }
}

fn position_around_base(
    plan: &ShapePlan,
    face: &Face,
    buffer: &mut Buffer,
    base: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    let mut horizontal_dir = Direction::Invalid;
    buffer.unsafe_to_break(base, end);

    let base_info = &buffer.info[base];
    let base_pos = &buffer.pos[base];
    let mut base_extents = match face.glyph_extents(base_info.as_glyph()) {
        Some(extents) => extents,
        None => {
            // If extents don't work, zero marks and go home.
            zero_mark_advances(buffer, base + 1, end, adjust_offsets_when_zeroing);
            return;
        }
    };

    base_extents.y_bearing += base_pos.y_offset;
    base_extents.x_bearing = 0;

    // Use horizontal advance for horizontal positioning.
    // Generally a better idea; also works for zero-ink glyphs.
    base_extents.width = face.glyph_h_advance(base_info.as_glyph());

    let lig_id = base_info.lig_id();
    let num_lig_components = i32::from(base_info.lig_num_comps());

    let mut x_offset = 0;
    let mut y_offset = 0;
    if buffer.props.direction.is_forward() {
        x_offset -= base_pos.x_advance;
        y_offset -= base_pos.y_advance;
    }

    let mut last_lig_component: i32 = -1;
    let mut last_combining_class: u8 = 255;
    let mut component_extents = base_extents;
    let mut cluster_extents = base_extents;

    let direction = buffer.props.direction;
    for i in base + 1..end {
        if buffer.info[i].modified_combining_class() != 0 {
            if num_lig_components > 1 {
                let this_lig_id = buffer.info[i].lig_id();
                let mut this_lig_component = i32::from(buffer.info[i].lig_comp()) - 1;

                // Conditions for attaching to the last component.
                if lig_id == 0 || lig_id != this_lig_id || this_lig_component >= num_lig_components
                {
                    this_lig_component = num_lig_components - 1;
                }

                if last_lig_component != this_lig_component {
                    last_lig_component = this_lig_component;
                    last_combining_class = 255;
                    component_extents = base_extents;

                    if horizontal_dir == Direction::Invalid {
                        horizontal_dir = if plan.direction.is_horizontal() {
                            plan.direction
                        } else {
                            plan.script
                                .and_then(Direction::from_script)
                                .unwrap_or_default()
                        };
                    }

                    component_extents.x_bearing += (if horizontal_dir == Direction::LeftToRight {
                        this_lig_component
                    } else {
                        num_lig_components - 1 - this_lig_component
                    } * component_extents.width)
                        / num_lig_components;

                    component_extents.width /= num_lig_components;
                }
            }

            let this_combining_class = buffer.info[i].modified_combining_class();
            if last_combining_class != this_combining_class {
                last_combining_class = this_combining_class;
                cluster_extents = component_extents;
            }

            let glyph = buffer.info[i].glyph_id;
            let pos = &mut buffer.pos[i];
            position_mark(
                face,
                direction,
                glyph,
                pos,
                &mut cluster_extents,
                this_combining_class,
            );

            pos.x_advance = 0;
            pos.y_advance = 0;
            pos.x_offset += x_offset;
            pos.y_offset += y_offset;
        } else if buffer.props.direction.is_forward() {
            x_offset -= buffer.pos[i].x_advance;
            y_offset -= buffer.pos[i].y_advance;
        } else {
            x_offset += buffer.pos[i].x_advance;
            y_offset += buffer.pos[i].y_advance;
        }
    }
}

fn position_cluster(
    plan: &ShapePlan,
    face: &Face,
    buffer: &mut Buffer,
    start: usize,
    end: usize,
    adjust_offsets_when_zeroing: bool,
) {
    if end - start < 2 {
        return;
    }

    // Find the base glyph.
    let mut i = start;
    while i < end {
        if !buffer.info[i].is_unicode_mark() {
            // Find mark glyphs.
            let mut j = i + 1;
            while j < end && buffer.info[j].is_unicode_mark() {
                j += 1;
            }

            position_around_base(plan, face, buffer, i, j, adjust_offsets_when_zeroing);
            i = j - 1;
        }
        i += 1;
    }
}

pub fn position_marks(
    plan: &ShapePlan,
    face: &Face,
    buffer: &mut Buffer,
    adjust_offsets_when_zeroing: bool,
) {
    let mut start = 0;
    let len = buffer.len;
    for i in 1..len {
        if !buffer.info[i].is_unicode_mark() {
            position_cluster(plan, face, buffer, start, i, adjust_offsets_when_zeroing);
            start = i;
        }
    }

    position_cluster(plan, face, buffer, start, len, adjust_offsets_when_zeroing);
}

/// Performs font-assisted kerning.
///
/// Pair kerning without any kerning data in the font would need an external
/// kerning callback, which we don't expose; nothing to do here.
pub fn kern(_: &ShapePlan, _: &Face, _: &mut Buffer) {}

/// Adjusts the width of various spaces.
pub fn adjust_spaces(_: &ShapePlan, face: &Face, buffer: &mut Buffer) {
    let len = buffer.len;
    let horizontal = buffer.props.direction.is_horizontal();
    for (info, pos) in buffer.info[..len].iter().zip(&mut buffer.pos[..len]) {
        let space_type = match info.space_fallback() {
            Some(fallback) if !info.is_ligated() => fallback,
            _ => continue,
        };

        match space_type {
            Space::Space => {}

            Space::SpaceEm
            | Space::SpaceEm2
            | Space::SpaceEm3
            | Space::SpaceEm4
            | Space::SpaceEm5
            | Space::SpaceEm6
            | Space::SpaceEm16 => {
                let length = (face.units_per_em() + (space_type as i32) / 2) / space_type as i32;
                if horizontal {
                    pos.x_advance = length;
                } else {
                    pos.y_advance = -length;
                }
            }

            Space::Space4Em18 => {
                let length = (i64::from(face.units_per_em()) * 4 / 18) as i32;
                if horizontal {
                    pos.x_advance = length
                } else {
                    pos.y_advance = -length;
                }
            }

            Space::SpaceFigure => {
                for u in '0'..='9' {
                    if let Some(glyph) = face.glyph_index(u as u32) {
                        if horizontal {
                            pos.x_advance = face.glyph_h_advance(glyph);
                        } else {
                            pos.y_advance = face.glyph_v_advance(glyph);
                        }
                        break;
                    }
                }
            }

            Space::SpacePunctuation => {
                let punct = face
                    .glyph_index('.' as u32)
                    .or_else(|| face.glyph_index(',' as u32));

                if let Some(glyph) = punct {
                    if horizontal {
                        pos.x_advance = face.glyph_h_advance(glyph);
                    } else {
                        pos.y_advance = face.glyph_v_advance(glyph);
                    }
                }
            }

            Space::SpaceNarrow => {
                // Half-space?  Unicode doc says ~1/4 or 1/5 of EM.  However,
                // many fonts have their regular space being about that size;
                // a percentage of the space width makes more sense.
                if horizontal {
                    pos.x_advance /= 2;
                } else {
                    pos.y_advance /= 2;
                }
            }
        }
    }
}
