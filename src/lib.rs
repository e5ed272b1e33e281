/*!
An OpenType text shaping engine.

`glyphshape` turns a run of Unicode codepoints, already segmented into a
single script, language and direction, into a sequence of positioned glyphs,
driven by the font's OpenType layout tables (GSUB/GPOS), Apple Advanced
Typography tables (morx/kerx/trak) and script-specific shaping logic.

```no_run
let data = std::fs::read("font.ttf").unwrap();
let face = glyphshape::Face::from_slice(&data, 0).unwrap();

let mut buffer = glyphshape::UnicodeBuffer::new();
buffer.push_str("affine");

let glyphs = glyphshape::shape(&face, &[], buffer);
for (info, pos) in glyphs.glyph_infos().iter().zip(glyphs.glyph_positions()) {
    println!("{} advance={}", info.glyph_id, pos.x_advance);
}
```
*/

#![warn(missing_docs)]

#[macro_use]
mod buffer;
mod aat;
mod common;
mod complex;
mod face;
mod ot;
mod plan;
mod shape;
mod unicode;

pub use ttf_parser;
pub use ttf_parser::Tag;

pub use crate::buffer::{
    BufferClusterLevel, BufferFlags, GlyphBuffer, GlyphInfo, GlyphPosition, SerializeFlags,
    UnicodeBuffer,
};
pub use crate::common::{script, Direction, Feature, Language, Script, Variation};
pub use crate::face::Face;
pub use crate::plan::ShapePlan;
pub use crate::shape::{shape, shape_with_plan};

/// A per-glyph feature bit-set.
type Mask = u32;

/// A Unicode codepoint, or a glyph index once substitution has run.
type CodePoint = u32;
