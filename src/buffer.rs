use std::mem;

use bitflags::bitflags;
use ttf_parser::GlyphId;

use crate::common::SegmentProperties;
use crate::face::Face;
use crate::unicode::{CharExt, GeneralCategory, GeneralCategoryExt, Space};
use crate::{CodePoint, Direction, Language, Mask, Script};

const CONTEXT_LENGTH: usize = 5;

pub(crate) mod glyph_flag {
    /// Indicates that if input text is broken at the beginning of the cluster
    /// this glyph is part of, then both sides need to be re-shaped, as the
    /// result might be different.
    pub const UNSAFE_TO_BREAK: u32 = 0x00000001;

    /// OR of all defined flags.
    pub const DEFINED: u32 = 0x00000001;
}

/// Iterates over clusters, binding `start`/`end` for each.
macro_rules! foreach_cluster {
    ($buffer:expr, $start:ident, $end:ident, $($body:tt)*) => {{
        let mut $start = 0;
        while $start < $buffer.len {
            let $end = $buffer.next_cluster($start);
            $($body)*
            $start = $end;
        }
    }};
}

/// Iterates over graphemes (continuation runs), binding `start`/`end`.
macro_rules! foreach_grapheme {
    ($buffer:expr, $start:ident, $end:ident, $($body:tt)*) => {{
        let mut $start = 0;
        while $start < $buffer.len {
            let $end = $buffer.next_grapheme($start);
            $($body)*
            $start = $end;
        }
    }};
}

/// Holds the positions of the glyph in both horizontal and vertical
/// directions. All positions are relative to the current point.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq)]
pub struct GlyphPosition {
    /// How much the line advances after drawing this glyph when setting text
    /// in horizontal direction.
    pub x_advance: i32,
    /// How much the line advances after drawing this glyph when setting text
    /// in vertical direction.
    pub y_advance: i32,
    /// How much the glyph moves on the X-axis before drawing it, this should
    /// not affect how much the line advances.
    pub x_offset: i32,
    /// How much the glyph moves on the Y-axis before drawing it, this should
    /// not affect how much the line advances.
    pub y_offset: i32,
    var: u32,
}

impl GlyphPosition {
    // Attachment bookkeeping lives in the var slot while positioning runs.
    #[inline]
    pub(crate) fn attach_chain(&self) -> i16 {
        (self.var & 0xFFFF) as u16 as i16
    }

    #[inline]
    pub(crate) fn set_attach_chain(&mut self, n: i16) {
        self.var = (self.var & 0xFFFF_0000) | (n as u16 as u32);
    }

    #[inline]
    pub(crate) fn attach_type(&self) -> u8 {
        ((self.var >> 16) & 0xFF) as u8
    }

    #[inline]
    pub(crate) fn set_attach_type(&mut self, n: u8) {
        self.var = (self.var & 0xFF00_FFFF) | ((n as u32) << 16);
    }
}

impl std::fmt::Debug for GlyphPosition {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("GlyphPosition")
            .field("x_advance", &self.x_advance)
            .field("y_advance", &self.y_advance)
            .field("x_offset", &self.x_offset)
            .field("y_offset", &self.y_offset)
            .finish()
    }
}

bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq)]
    pub(crate) struct UnicodeProps: u16 {
        const GENERAL_CATEGORY  = 0x001F;
        const IGNORABLE         = 0x0020;
        // MONGOLIAN FREE VARIATION SELECTOR 1..3, or TAG characters.
        const HIDDEN            = 0x0040;
        const CONTINUATION      = 0x0080;

        // If GEN_CAT=FORMAT, top byte masks:
        const CF_ZWJ            = 0x0100;
        const CF_ZWNJ           = 0x0200;
    }
}

bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq)]
    pub(crate) struct GlyphPropsFlags: u16 {
        // The following three match LookupFlags::Ignore* numbers.
        const BASE_GLYPH    = 0x02;
        const LIGATURE      = 0x04;
        const MARK          = 0x08;
        const CLASS_MASK    = Self::BASE_GLYPH.bits() | Self::LIGATURE.bits() | Self::MARK.bits();

        // The following are used internally; not derived from GDEF.
        const SUBSTITUTED   = 0x10;
        const LIGATED       = 0x20;
        const MULTIPLIED    = 0x40;

        const PRESERVE = Self::SUBSTITUTED.bits() | Self::LIGATED.bits() | Self::MULTIPLIED.bits();
    }
}

bitflags! {
    /// Flags for buffers.
    #[derive(Clone, Copy, Default, Debug, PartialEq)]
    pub struct BufferFlags: u32 {
        /// Indicates that special handling of the beginning of text paragraph
        /// can be applied to this buffer. Should usually be set, unless you are
        /// passing to the buffer only part of the text without the full context.
        const BEGINNING_OF_TEXT             = 1 << 1;
        /// Indicates that special handling of the end of text paragraph can be
        /// applied to this buffer.
        const END_OF_TEXT                   = 1 << 2;
        /// Indicates that characters with `Default_Ignorable` Unicode property
        /// should use the corresponding glyph from the font.
        const PRESERVE_DEFAULT_IGNORABLES   = 1 << 3;
        /// Indicates that characters with `Default_Ignorable` Unicode property
        /// should be removed from glyph string instead of hiding them.
        const REMOVE_DEFAULT_IGNORABLES     = 1 << 4;
        /// Indicates that a dotted circle should not be inserted in the
        /// rendering of incorrect character sequences.
        const DO_NOT_INSERT_DOTTED_CIRCLE   = 1 << 5;
    }
}

bitflags! {
    #[derive(Clone, Copy, Default, Debug, PartialEq)]
    pub(crate) struct BufferScratchFlags: u32 {
        const HAS_NON_ASCII             = 0x00000001;
        const HAS_DEFAULT_IGNORABLES    = 0x00000002;
        const HAS_SPACE_FALLBACK        = 0x00000004;
        const HAS_GPOS_ATTACHMENT       = 0x00000008;
        const HAS_UNSAFE_TO_BREAK       = 0x00000010;
        const HAS_CGJ                   = 0x00000020;

        // Reserved for complex shapers' internal use.
        const COMPLEX0                  = 0x01000000;
        const COMPLEX1                  = 0x02000000;
        const COMPLEX2                  = 0x04000000;
        const COMPLEX3                  = 0x08000000;
    }
}

bitflags! {
    /// Flags used for serialization with a [`GlyphBuffer::serialize`].
    #[derive(Clone, Copy, Default, Debug, PartialEq)]
    pub struct SerializeFlags: u8 {
        /// Do not serialize glyph cluster.
        const NO_CLUSTERS       = 1 << 1;
        /// Do not serialize glyph position information.
        const NO_POSITIONS      = 1 << 2;
        /// Do not serialize glyph name.
        const NO_GLYPH_NAMES    = 1 << 3;
        /// Serialize glyph flags.
        const GLYPH_FLAGS       = 1 << 4;
        /// Do not serialize glyph advances, glyph offsets will reflect
        /// absolute glyph positions.
        const NO_ADVANCES       = 1 << 5;
    }
}

/// A cluster level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BufferClusterLevel {
    /// Return cluster values grouped by graphemes into monotone order.
    MonotoneGraphemes,
    /// Return cluster values grouped into monotone order.
    MonotoneCharacters,
    /// Don't group cluster values.
    Characters,
}

impl Default for BufferClusterLevel {
    #[inline]
    fn default() -> Self {
        BufferClusterLevel::MonotoneGraphemes
    }
}

/// A glyph info.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct GlyphInfo {
    /// A Unicode codepoint before shaping and a glyph index after.
    pub glyph_id: u32,
    pub(crate) mask: Mask,
    /// An index of the codepoint in the original string this glyph
    /// originated from.
    pub cluster: u32,
    pub(crate) var1: u32,
    pub(crate) var2: u32,
}

impl GlyphInfo {
    #[inline]
    pub(crate) fn as_char(&self) -> char {
        crate::unicode::char_from_u32(self.glyph_id)
    }

    #[inline]
    pub(crate) fn as_glyph(&self) -> GlyphId {
        GlyphId(self.glyph_id as u16)
    }

    // var1: [glyph_props u16][lig_props u8][syllable u8]
    // var2: [unicode_props u16][glyph_index u16]

    #[inline]
    pub(crate) fn glyph_props(&self) -> u16 {
        (self.var1 & 0xFFFF) as u16
    }

    #[inline]
    pub(crate) fn set_glyph_props(&mut self, n: u16) {
        self.var1 = (self.var1 & 0xFFFF_0000) | u32::from(n);
    }

    #[inline]
    pub(crate) fn lig_props(&self) -> u8 {
        ((self.var1 >> 16) & 0xFF) as u8
    }

    #[inline]
    pub(crate) fn set_lig_props(&mut self, n: u8) {
        self.var1 = (self.var1 & 0xFF00_FFFF) | (u32::from(n) << 16);
    }

    #[inline]
    pub(crate) fn syllable(&self) -> u8 {
        (self.var1 >> 24) as u8
    }

    #[inline]
    pub(crate) fn set_syllable(&mut self, n: u8) {
        self.var1 = (self.var1 & 0x00FF_FFFF) | (u32::from(n) << 24);
    }

    #[inline]
    pub(crate) fn unicode_props(&self) -> u16 {
        (self.var2 & 0xFFFF) as u16
    }

    #[inline]
    pub(crate) fn set_unicode_props(&mut self, n: u16) {
        self.var2 = (self.var2 & 0xFFFF_0000) | u32::from(n);
    }

    #[inline]
    pub(crate) fn glyph_index(&self) -> u32 {
        self.var2 >> 16
    }

    #[inline]
    pub(crate) fn set_glyph_index(&mut self, gid: u32) {
        self.var2 = (self.var2 & 0x0000_FFFF) | (gid << 16);
    }

    pub(crate) fn init_unicode_props(&mut self, scratch_flags: &mut BufferScratchFlags) {
        let u = self.glyph_id;
        let gc = self.as_char().general_category();
        let mut props = u16::from(gc.to_u8());

        if u >= 0x80 {
            *scratch_flags |= BufferScratchFlags::HAS_NON_ASCII;

            if self.as_char().is_default_ignorable() {
                *scratch_flags |= BufferScratchFlags::HAS_DEFAULT_IGNORABLES;
                props |= UnicodeProps::IGNORABLE.bits();

                if u == 0x200C {
                    props |= UnicodeProps::CF_ZWNJ.bits();
                } else if u == 0x200D {
                    props |= UnicodeProps::CF_ZWJ.bits();
                } else if (0x180B..=0x180D).contains(&u) {
                    // Mongolian Free Variation Selectors need to be remembered
                    // because although we need to hide them like default-ignorables,
                    // they need to non-ignorable during shaping.
                    props |= UnicodeProps::HIDDEN.bits();
                } else if (0xE0020..=0xE007F).contains(&u) {
                    // TAG characters need similar treatment.
                    props |= UnicodeProps::HIDDEN.bits();
                } else if u == 0x034F {
                    // COMBINING GRAPHEME JOINER should not be skipped during GSUB
                    // matching, at least some of the time.
                    *scratch_flags |= BufferScratchFlags::HAS_CGJ;
                    props |= UnicodeProps::HIDDEN.bits();
                }
            }

            if gc.is_mark() {
                props |= UnicodeProps::CONTINUATION.bits();
                props |= u16::from(self.as_char().modified_combining_class()) << 8;
            }
        }

        self.set_unicode_props(props);
    }

    #[inline]
    pub(crate) fn general_category(&self) -> GeneralCategory {
        let n = self.unicode_props() & UnicodeProps::GENERAL_CATEGORY.bits();
        GeneralCategory::from_u8(n as u8)
    }

    #[inline]
    pub(crate) fn set_general_category(&mut self, gc: GeneralCategory) {
        // Clears the top byte.
        let n = u16::from(gc.to_u8())
            | (self.unicode_props() & (0xFF & !UnicodeProps::GENERAL_CATEGORY.bits()));
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_unicode_mark(&self) -> bool {
        self.general_category().is_mark()
    }

    #[inline]
    pub(crate) fn modified_combining_class(&self) -> u8 {
        if self.is_unicode_mark() {
            (self.unicode_props() >> 8) as u8
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn set_modified_combining_class(&mut self, mcc: u8) {
        if !self.is_unicode_mark() {
            return;
        }

        let n = (u16::from(mcc) << 8) | (self.unicode_props() & 0xFF);
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_unicode_space(&self) -> bool {
        self.general_category() == GeneralCategory::SpaceSeparator
    }

    #[inline]
    pub(crate) fn set_space_fallback(&mut self, space: Space) {
        if !self.is_unicode_space() {
            return;
        }

        let n = ((space as u16) << 8) | (self.unicode_props() & 0xFF);
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn space_fallback(&self) -> Option<Space> {
        if self.is_unicode_space() {
            Space::from_u8((self.unicode_props() >> 8) as u8)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn is_default_ignorable(&self) -> bool {
        let n = self.unicode_props() & UnicodeProps::IGNORABLE.bits();
        n != 0 && !self.is_substituted()
    }

    #[inline]
    pub(crate) fn is_hidden(&self) -> bool {
        self.unicode_props() & UnicodeProps::HIDDEN.bits() != 0
    }

    #[inline]
    pub(crate) fn unhide(&mut self) {
        let mut n = self.unicode_props();
        n &= !UnicodeProps::HIDDEN.bits();
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_unicode_format(&self) -> bool {
        self.general_category() == GeneralCategory::Format
    }

    #[inline]
    pub(crate) fn is_zwnj(&self) -> bool {
        self.is_unicode_format() && self.unicode_props() & UnicodeProps::CF_ZWNJ.bits() != 0
    }

    #[inline]
    pub(crate) fn is_zwj(&self) -> bool {
        self.is_unicode_format() && self.unicode_props() & UnicodeProps::CF_ZWJ.bits() != 0
    }

    #[inline]
    pub(crate) fn set_continuation(&mut self) {
        let mut n = self.unicode_props();
        n |= UnicodeProps::CONTINUATION.bits();
        self.set_unicode_props(n);
    }

    #[inline]
    pub(crate) fn is_continuation(&self) -> bool {
        self.unicode_props() & UnicodeProps::CONTINUATION.bits() != 0
    }

    // lig_props: aka lig_id / lig_comp
    //
    // When a ligature is formed:
    //   - The ligature glyph and any marks in between all the same newly
    //     allocated lig_id,
    //   - The ligature glyph will get lig_num_comps set to the number of
    //     components,
    //   - The marks get lig_comp > 0, reflecting which component of the
    //     ligature they were applied to.
    //
    // When a multiple-substitution is done:
    //   - All resulting glyphs will have lig_id = 0,
    //   - The resulting glyphs will have lig_comp = 0, 1, 2, ... respectively.

    const IS_LIG_BASE: u8 = 0x10;

    #[inline]
    pub(crate) fn set_lig_props_for_ligature(&mut self, lig_id: u8, lig_num_comps: u8) {
        self.set_lig_props((lig_id << 5) | Self::IS_LIG_BASE | (lig_num_comps & 0x0F));
    }

    #[inline]
    pub(crate) fn set_lig_props_for_mark(&mut self, lig_id: u8, lig_comp: u8) {
        self.set_lig_props((lig_id << 5) | (lig_comp & 0x0F));
    }

    #[inline]
    pub(crate) fn set_lig_props_for_component(&mut self, comp: u8) {
        self.set_lig_props_for_mark(0, comp);
    }

    #[inline]
    pub(crate) fn lig_id(&self) -> u8 {
        self.lig_props() >> 5
    }

    #[inline]
    pub(crate) fn is_ligated_internal(&self) -> bool {
        self.lig_props() & Self::IS_LIG_BASE != 0
    }

    #[inline]
    pub(crate) fn lig_comp(&self) -> u8 {
        if self.is_ligated_internal() {
            0
        } else {
            self.lig_props() & 0x0F
        }
    }

    #[inline]
    pub(crate) fn lig_num_comps(&self) -> u8 {
        if self.glyph_props() & GlyphPropsFlags::LIGATURE.bits() != 0
            && self.is_ligated_internal()
        {
            self.lig_props() & 0x0F
        } else {
            1
        }
    }

    #[inline]
    pub(crate) fn is_base_glyph(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::BASE_GLYPH.bits() != 0
    }

    #[inline]
    pub(crate) fn is_ligature(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::LIGATURE.bits() != 0
    }

    #[inline]
    pub(crate) fn is_mark(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::MARK.bits() != 0
    }

    #[inline]
    pub(crate) fn is_substituted(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::SUBSTITUTED.bits() != 0
    }

    #[inline]
    pub(crate) fn is_ligated(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::LIGATED.bits() != 0
    }

    #[inline]
    pub(crate) fn is_multiplied(&self) -> bool {
        self.glyph_props() & GlyphPropsFlags::MULTIPLIED.bits() != 0
    }

}

impl std::fmt::Debug for GlyphInfo {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("GlyphInfo")
            .field("glyph_id", &self.glyph_id)
            .field("cluster", &self.cluster)
            .finish()
    }
}

pub(crate) struct Buffer {
    // Information about how the text in the buffer should be treated.
    pub flags: BufferFlags,
    pub cluster_level: BufferClusterLevel,
    pub invisible: Option<GlyphId>,
    pub scratch_flags: BufferScratchFlags,
    pub max_len: usize,
    pub max_ops: i32,

    // Buffer contents.
    pub props: SegmentProperties,
    pub successful: bool,
    have_output: bool,
    have_separate_output: bool,
    pub have_positions: bool,

    pub idx: usize,
    pub len: usize,
    pub out_len: usize,

    pub info: Vec<GlyphInfo>,
    pub pos: Vec<GlyphPosition>,

    serial: u8,

    // Text before / after the main buffer contents, always in Unicode,
    // ordered outward. Index 0 is for "pre-context", 1 for "post-context".
    pub context: [[char; CONTEXT_LENGTH]; 2],
    pub context_len: [usize; 2],
}

impl Buffer {
    pub const MAX_LEN_FACTOR: usize = 64;
    pub const MAX_LEN_MIN: usize = 16384;
    // Shaping more than a whole paragraph at a time is not supported.
    pub const MAX_LEN_DEFAULT: usize = 0x3FFFFFFF;

    pub const MAX_OPS_FACTOR: i32 = 1024;
    pub const MAX_OPS_MIN: i32 = 16384;
    pub const MAX_OPS_DEFAULT: i32 = 0x1FFFFFFF;

    fn new() -> Self {
        Buffer {
            flags: BufferFlags::empty(),
            cluster_level: BufferClusterLevel::default(),
            invisible: None,
            scratch_flags: BufferScratchFlags::default(),
            max_len: Self::MAX_LEN_DEFAULT,
            max_ops: Self::MAX_OPS_DEFAULT,
            props: SegmentProperties::default(),
            successful: true,
            have_output: false,
            have_separate_output: false,
            have_positions: false,
            idx: 0,
            len: 0,
            out_len: 0,
            info: Vec::new(),
            pos: Vec::new(),
            serial: 0,
            context: [['\0'; CONTEXT_LENGTH]; 2],
            context_len: [0, 0],
        }
    }

    #[inline]
    pub fn info_slice_mut(&mut self) -> &mut [GlyphInfo] {
        &mut self.info[..self.len]
    }

    pub fn out_info(&self) -> &[GlyphInfo] {
        if self.have_separate_output {
            // Both glyph infos and positions are 20 bytes of plain old data;
            // the pos array doubles as the out-buffer during substitution.
            unsafe { mem::transmute(self.pos.as_slice()) }
        } else {
            &self.info
        }
    }

    pub fn out_info_mut(&mut self) -> &mut [GlyphInfo] {
        if self.have_separate_output {
            unsafe { mem::transmute(self.pos.as_mut_slice()) }
        } else {
            &mut self.info
        }
    }

    #[inline]
    fn set_out_info(&mut self, i: usize, info: GlyphInfo) {
        self.out_info_mut()[i] = info;
    }

    #[inline]
    pub fn cur(&self, i: usize) -> &GlyphInfo {
        &self.info[self.idx + i]
    }

    #[inline]
    pub fn cur_mut(&mut self, i: usize) -> &mut GlyphInfo {
        let idx = self.idx + i;
        &mut self.info[idx]
    }

    #[inline]
    pub fn cur_pos_mut(&mut self) -> &mut GlyphPosition {
        let i = self.idx;
        &mut self.pos[i]
    }

    #[inline]
    pub fn prev(&self) -> &GlyphInfo {
        let idx = if self.out_len != 0 { self.out_len - 1 } else { 0 };
        &self.out_info()[idx]
    }

    #[inline]
    pub fn prev_mut(&mut self) -> &mut GlyphInfo {
        let idx = if self.out_len != 0 { self.out_len - 1 } else { 0 };
        &mut self.out_info_mut()[idx]
    }

    fn clear(&mut self) {
        self.props = SegmentProperties::default();
        self.scratch_flags = BufferScratchFlags::default();
        self.successful = true;
        self.have_output = false;
        self.have_positions = false;

        self.idx = 0;
        self.info.clear();
        self.pos.clear();
        self.len = 0;
        self.out_len = 0;
        self.have_separate_output = false;

        self.serial = 0;

        self.context = [['\0'; CONTEXT_LENGTH]; 2];
        self.context_len = [0, 0];
    }

    #[inline]
    pub fn backtrack_len(&self) -> usize {
        if self.have_output {
            self.out_len
        } else {
            self.idx
        }
    }

    #[inline]
    pub fn allocate_lig_id(&mut self) -> u8 {
        self.serial = self.serial.wrapping_add(1);
        let n = self.serial & 0x07;
        if n == 0 {
            // In case of overflow.
            self.allocate_lig_id()
        } else {
            n
        }
    }

    fn add(&mut self, codepoint: CodePoint, cluster: u32) {
        self.ensure(self.len + 1);

        let i = self.len;
        self.info[i] = GlyphInfo {
            glyph_id: codepoint,
            mask: 0,
            cluster,
            var1: 0,
            var2: 0,
        };

        self.len += 1;
    }

    pub fn reverse(&mut self) {
        if self.is_empty() {
            return;
        }

        self.reverse_range(0, self.len);
    }

    pub fn reverse_range(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.info[start..end].reverse();
        if self.have_positions {
            self.pos[start..end].reverse();
        }
    }

    pub fn reset_clusters(&mut self) {
        for (i, info) in self.info.iter_mut().enumerate() {
            info.cluster = i as u32;
        }
    }

    pub fn guess_segment_properties(&mut self) {
        if self.props.script.is_none() {
            for info in &self.info[..self.len] {
                match crate::unicode::script_from_char(info.as_char()) {
                    crate::script::COMMON | crate::script::INHERITED | crate::script::UNKNOWN => {}
                    s => {
                        self.props.script = Some(s);
                        break;
                    }
                }
            }
        }

        if self.props.direction == Direction::Invalid {
            if let Some(script) = self.props.script {
                self.props.direction = Direction::from_script(script).unwrap_or_default();
            }

            if self.props.direction == Direction::Invalid {
                self.props.direction = Direction::LeftToRight;
            }
        }
    }

    pub fn sync(&mut self) {
        assert!(self.have_output);
        self.have_output = false;

        if self.have_separate_output {
            unsafe {
                mem::swap(&mut self.info, mem::transmute(&mut self.pos));
            }
        }

        mem::swap(&mut self.len, &mut self.out_len);

        self.idx = 0;
    }

    pub fn clear_output(&mut self) {
        self.have_output = true;
        self.have_positions = false;

        self.out_len = 0;
        self.have_separate_output = false;
    }

    pub fn clear_positions(&mut self) {
        self.have_output = false;
        self.have_positions = true;

        self.out_len = 0;
        self.have_separate_output = false;

        for pos in &mut self.pos {
            *pos = GlyphPosition::default();
        }
    }

    #[inline]
    pub fn have_output(&self) -> bool {
        self.have_output
    }

    pub fn replace_glyphs(&mut self, num_in: usize, num_out: usize, glyph_data: &[CodePoint]) {
        if !self.make_room_for(num_in, num_out) {
            return;
        }

        assert!(self.idx + num_in <= self.len);

        self.merge_clusters(self.idx, self.idx + num_in);

        let orig_info = self.info[self.idx];
        for i in 0..num_out {
            let ii = self.out_len + i;
            self.set_out_info(ii, orig_info);
            self.out_info_mut()[ii].glyph_id = glyph_data[i];
        }

        self.idx += num_in;
        self.out_len += num_out;
    }

    pub fn replace_glyph(&mut self, glyph_index: CodePoint) {
        if self.have_separate_output || self.out_len != self.idx {
            if !self.make_room_for(1, 1) {
                return;
            }

            self.set_out_info(self.out_len, self.info[self.idx]);
        }

        let out_len = self.out_len;
        self.out_info_mut()[out_len].glyph_id = glyph_index;

        self.idx += 1;
        self.out_len += 1;
    }

    pub fn output_glyph(&mut self, glyph_index: CodePoint) {
        if !self.make_room_for(0, 1) {
            return;
        }

        if self.idx == self.len && self.out_len == 0 {
            return;
        }

        let out_len = self.out_len;
        if self.idx < self.len {
            self.set_out_info(out_len, self.info[self.idx]);
        } else {
            let info = self.out_info()[out_len - 1];
            self.set_out_info(out_len, info);
        }

        self.out_info_mut()[out_len].glyph_id = glyph_index;
        self.out_len += 1;
    }

    pub fn output_info(&mut self, glyph_info: GlyphInfo) {
        if !self.make_room_for(0, 1) {
            return;
        }

        self.set_out_info(self.out_len, glyph_info);
        self.out_len += 1;
    }

    /// Copies glyph at `idx` to output and advances `idx`.
    ///
    /// If there's no output, just advances `idx`.
    pub fn next_glyph(&mut self) {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(1, 1) {
                    return;
                }

                self.set_out_info(self.out_len, self.info[self.idx]);
            }

            self.out_len += 1;
        }

        self.idx += 1;
    }

    /// Copies `n` glyphs at `idx` to output and advances `idx`.
    pub fn next_glyphs(&mut self, n: usize) {
        if self.have_output {
            if self.have_separate_output || self.out_len != self.idx {
                if !self.make_room_for(n, n) {
                    return;
                }

                for i in 0..n {
                    self.set_out_info(self.out_len + i, self.info[self.idx + i]);
                }
            }

            self.out_len += n;
        }

        self.idx += n;
    }

    /// Advances `idx` without copying to output.
    #[inline]
    pub fn skip_glyph(&mut self) {
        self.idx += 1;
    }

    pub fn reset_masks(&mut self, mask: Mask) {
        for info in &mut self.info[..self.len] {
            info.mask = mask;
        }
    }

    pub fn set_masks(&mut self, mut value: Mask, mask: Mask, cluster_start: u32, cluster_end: u32) {
        let not_mask = !mask;
        value &= mask;

        if mask == 0 {
            return;
        }

        if cluster_start == 0 && cluster_end == u32::MAX {
            for info in &mut self.info[..self.len] {
                info.mask = (info.mask & not_mask) | value;
            }

            return;
        }

        for info in &mut self.info[..self.len] {
            if cluster_start <= info.cluster && info.cluster < cluster_end {
                info.mask = (info.mask & not_mask) | value;
            }
        }
    }

    pub fn merge_clusters(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.merge_clusters_impl(start, end)
    }

    fn merge_clusters_impl(&mut self, start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            self.unsafe_to_break(start, end);
            return;
        }

        let mut cluster = self.info[start].cluster;

        for i in start + 1..end {
            cluster = cluster.min(self.info[i].cluster);
        }

        // Extend end.
        while end < self.len && self.info[end - 1].cluster == self.info[end].cluster {
            end += 1;
        }

        // If we hit the start of the buffer, continue in the out-buffer.
        if self.idx == start {
            let mut i = self.out_len;
            while i != 0 && self.out_info()[i - 1].cluster == self.info[start].cluster {
                Self::set_cluster(&mut self.out_info_mut()[i - 1], cluster, 0);
                i -= 1;
            }
        }

        for i in start..end {
            Self::set_cluster(&mut self.info[i], cluster, 0);
        }
    }

    pub fn merge_out_clusters(&mut self, mut start: usize, mut end: usize) {
        if self.cluster_level == BufferClusterLevel::Characters {
            return;
        }

        if end - start < 2 {
            return;
        }

        let mut cluster = self.out_info()[start].cluster;

        for i in start + 1..end {
            cluster = cluster.min(self.out_info()[i].cluster);
        }

        // Extend start.
        while start != 0 && self.out_info()[start - 1].cluster == self.out_info()[start].cluster {
            start -= 1;
        }

        // Extend end.
        while end < self.out_len && self.out_info()[end - 1].cluster == self.out_info()[end].cluster
        {
            end += 1;
        }

        // If we hit the end of out-buffer, continue in the buffer.
        if end == self.out_len {
            let mut i = self.idx;
            while i < self.len && self.info[i].cluster == self.out_info()[end - 1].cluster {
                Self::set_cluster(&mut self.info[i], cluster, 0);
                i += 1;
            }
        }

        for i in start..end {
            Self::set_cluster(&mut self.out_info_mut()[i], cluster, 0);
        }
    }

    /// Merges clusters for deleting current glyph, and skips it.
    pub fn delete_glyph(&mut self) {
        let cluster = self.info[self.idx].cluster;

        if self.idx + 1 < self.len && cluster == self.info[self.idx + 1].cluster {
            // Cluster survives; do nothing.
            self.skip_glyph();
            return;
        }

        if self.out_len != 0 {
            // Merge cluster backward.
            if cluster < self.out_info()[self.out_len - 1].cluster {
                let mask = self.info[self.idx].mask;
                let old_cluster = self.out_info()[self.out_len - 1].cluster;

                let mut i = self.out_len;
                while i != 0 && self.out_info()[i - 1].cluster == old_cluster {
                    Self::set_cluster(&mut self.out_info_mut()[i - 1], cluster, mask);
                    i -= 1;
                }
            }

            self.skip_glyph();
            return;
        }

        if self.idx + 1 < self.len {
            // Merge cluster forward.
            self.merge_clusters(self.idx, self.idx + 2);
        }

        self.skip_glyph();
    }

    /// Deletes glyphs matching `filter` without going through the out-buffer,
    /// since positioning data must survive.
    pub fn delete_glyphs_inplace(&mut self, filter: impl Fn(&GlyphInfo) -> bool) {
        let mut j = 0;
        for i in 0..self.len {
            if filter(&self.info[i]) {
                // Merge clusters. Same logic as delete_glyph(), but for
                // in-place removal.
                let cluster = self.info[i].cluster;
                if i + 1 < self.len && cluster == self.info[i + 1].cluster {
                    // Cluster survives; do nothing.
                    continue;
                }

                if j != 0 {
                    // Merge cluster backward.
                    if cluster < self.info[j - 1].cluster {
                        let mask = self.info[i].mask;
                        let old_cluster = self.info[j - 1].cluster;

                        let mut k = j;
                        while k > 0 && self.info[k - 1].cluster == old_cluster {
                            Self::set_cluster(&mut self.info[k - 1], cluster, mask);
                            k -= 1;
                        }
                    }
                    continue;
                }

                if i + 1 < self.len {
                    // Merge cluster forward.
                    self.merge_clusters(i, i + 2);
                }

                continue;
            }

            if j != i {
                self.info[j] = self.info[i];
                self.pos[j] = self.pos[i];
            }
            j += 1;
        }

        self.len = j;
    }

    pub fn unsafe_to_break(&mut self, start: usize, end: usize) {
        if end - start < 2 {
            return;
        }

        self.unsafe_to_break_impl(start, end);
    }

    fn unsafe_to_break_impl(&mut self, start: usize, end: usize) {
        let mut cluster = u32::MAX;
        cluster = Self::find_min_cluster(&self.info, start, end, cluster);
        let unsafe_to_break = Self::set_unsafe_to_break_mask(&mut self.info, start, end, cluster);
        if unsafe_to_break {
            self.scratch_flags |= BufferScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    pub fn unsafe_to_break_from_outbuffer(&mut self, start: usize, end: usize) {
        if !self.have_output {
            self.unsafe_to_break_impl(start, end);
            return;
        }

        assert!(start <= self.out_len);
        assert!(self.idx <= end);

        let mut cluster = u32::MAX;
        cluster = Self::find_min_cluster(self.out_info(), start, self.out_len, cluster);
        cluster = Self::find_min_cluster(&self.info, self.idx, end, cluster);
        let idx = self.idx;
        let out_len = self.out_len;
        let unsafe1 = Self::set_unsafe_to_break_mask(self.out_info_mut(), start, out_len, cluster);
        let unsafe2 = Self::set_unsafe_to_break_mask(&mut self.info, idx, end, cluster);

        if unsafe1 || unsafe2 {
            self.scratch_flags |= BufferScratchFlags::HAS_UNSAFE_TO_BREAK;
        }
    }

    pub fn ensure(&mut self, size: usize) -> bool {
        if size <= self.info.len() {
            return true;
        }

        if size > self.max_len {
            self.successful = false;
            return false;
        }

        self.info.resize(size, GlyphInfo::default());
        self.pos.resize(size, GlyphPosition::default());
        true
    }

    fn make_room_for(&mut self, num_in: usize, num_out: usize) -> bool {
        if !self.ensure(self.out_len + num_out) {
            return false;
        }

        if !self.have_separate_output && self.out_len + num_out > self.idx + num_in {
            assert!(self.have_output);

            self.have_separate_output = true;
            for i in 0..self.out_len {
                self.set_out_info(i, self.info[i]);
            }
        }

        true
    }

    pub fn sort(&mut self, start: usize, end: usize, cmp: impl Fn(&GlyphInfo, &GlyphInfo) -> bool) {
        assert!(!self.have_positions);

        for i in start + 1..end {
            let mut j = i;
            while j > start && cmp(&self.info[j - 1], &self.info[i]) {
                j -= 1;
            }

            if i == j {
                continue;
            }

            // Move item i to occupy place for item j, shift what's in between.
            self.merge_clusters(j, i + 1);

            {
                let t = self.info[i];
                for idx in (0..i - j).rev() {
                    self.info[idx + j + 1] = self.info[idx + j];
                }

                self.info[j] = t;
            }
        }
    }

    pub(crate) fn set_cluster(info: &mut GlyphInfo, cluster: u32, mask: Mask) {
        if info.cluster != cluster {
            if mask & glyph_flag::UNSAFE_TO_BREAK != 0 {
                info.mask |= glyph_flag::UNSAFE_TO_BREAK;
            } else {
                info.mask &= !glyph_flag::UNSAFE_TO_BREAK;
            }
        }

        info.cluster = cluster;
    }

    fn find_min_cluster(info: &[GlyphInfo], start: usize, end: usize, mut cluster: u32) -> u32 {
        for i in start..end {
            cluster = cluster.min(info[i].cluster);
        }

        cluster
    }

    fn set_unsafe_to_break_mask(
        info: &mut [GlyphInfo],
        start: usize,
        end: usize,
        cluster: u32,
    ) -> bool {
        let mut unsafe_to_break = false;
        for i in start..end {
            if info[i].cluster != cluster {
                unsafe_to_break = true;
                info[i].mask |= glyph_flag::UNSAFE_TO_BREAK;
            }
        }

        unsafe_to_break
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push_str(&mut self, text: &str) {
        self.ensure(self.len + text.chars().count());

        for (i, c) in text.char_indices() {
            self.add(c as u32, i as u32);
        }
    }

    fn set_pre_context(&mut self, text: &str) {
        self.context_len[0] = 0;
        for (i, c) in text.chars().rev().take(CONTEXT_LENGTH).enumerate() {
            self.context[0][i] = c;
            self.context_len[0] = i + 1;
        }
    }

    fn set_post_context(&mut self, text: &str) {
        self.context_len[1] = 0;
        for (i, c) in text.chars().take(CONTEXT_LENGTH).enumerate() {
            self.context[1][i] = c;
            self.context_len[1] = i + 1;
        }
    }

    pub fn next_cluster(&self, mut start: usize) -> usize {
        if start >= self.len {
            return start;
        }

        let cluster = self.info[start].cluster;
        start += 1;
        while start < self.len && cluster == self.info[start].cluster {
            start += 1;
        }

        start
    }

    pub fn next_grapheme(&self, mut start: usize) -> usize {
        if start >= self.len {
            return start;
        }

        start += 1;
        while start < self.len && self.info[start].is_continuation() {
            start += 1;
        }

        start
    }

}

/// A buffer that contains an input string ready for shaping.
pub struct UnicodeBuffer(pub(crate) Buffer);

impl UnicodeBuffer {
    /// Create a new `UnicodeBuffer`.
    #[inline]
    pub fn new() -> Self {
        UnicodeBuffer(Buffer::new())
    }

    /// Returns the length of the data of the buffer.
    ///
    /// This corresponds to the number of unicode codepoints contained in the
    /// buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pushes a string to a buffer.
    #[inline]
    pub fn push_str(&mut self, str: &str) {
        self.0.push_str(str);
    }

    /// Appends a character to a buffer with the given cluster value.
    #[inline]
    pub fn add(&mut self, codepoint: char, cluster: u32) {
        self.0.add(codepoint as u32, cluster);
    }

    /// Sets the pre-context for this buffer.
    #[inline]
    pub fn set_pre_context(&mut self, str: &str) {
        self.0.set_pre_context(str)
    }

    /// Sets the post-context for this buffer.
    #[inline]
    pub fn set_post_context(&mut self, str: &str) {
        self.0.set_post_context(str)
    }

    /// Sets the text direction.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.0.props.direction = direction;
    }

    /// Returns the text direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.0.props.direction
    }

    /// Sets the script.
    #[inline]
    pub fn set_script(&mut self, script: Script) {
        self.0.props.script = Some(script);
    }

    /// Returns the script.
    #[inline]
    pub fn script(&self) -> Script {
        self.0.props.script.unwrap_or(crate::script::UNKNOWN)
    }

    /// Sets the language.
    #[inline]
    pub fn set_language(&mut self, lang: Language) {
        self.0.props.language = Some(lang);
    }

    /// Returns the language.
    #[inline]
    pub fn language(&self) -> Option<Language> {
        self.0.props.language.clone()
    }

    /// Guess the segment properties (direction, script) for the current
    /// content of the buffer.
    #[inline]
    pub fn guess_segment_properties(&mut self) {
        self.0.guess_segment_properties()
    }

    /// Sets the buffer flags.
    #[inline]
    pub fn set_flags(&mut self, flags: BufferFlags) {
        self.0.flags = flags;
    }

    /// Sets the cluster level.
    #[inline]
    pub fn set_cluster_level(&mut self, level: BufferClusterLevel) {
        self.0.cluster_level = level;
    }

    /// Returns the cluster level.
    #[inline]
    pub fn cluster_level(&self) -> BufferClusterLevel {
        self.0.cluster_level
    }

    /// Resets clusters.
    #[inline]
    pub fn reset_clusters(&mut self) {
        self.0.reset_clusters();
    }

    /// Clears the content.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Default for UnicodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnicodeBuffer {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("UnicodeBuffer")
            .field("direction", &self.direction())
            .field("language", &self.language())
            .field("script", &self.script())
            .field("cluster_level", &self.cluster_level())
            .finish()
    }
}

/// A buffer that contains the results of the shaping process.
pub struct GlyphBuffer(pub(crate) Buffer);

impl GlyphBuffer {
    /// Returns the length of the data of the buffer.
    ///
    /// When called before shaping this is the number of unicode codepoints
    /// contained in the buffer. When called after shaping it returns the
    /// number of glyphs stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// Returns `true` if the buffer contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the glyph infos.
    #[inline]
    pub fn glyph_infos(&self) -> &[GlyphInfo] {
        &self.0.info[..self.0.len]
    }

    /// Get the glyph positions.
    #[inline]
    pub fn glyph_positions(&self) -> &[GlyphPosition] {
        &self.0.pos[..self.0.len]
    }

    /// Clears the content of the glyph buffer and returns an empty
    /// `UnicodeBuffer` reusing the existing allocation.
    #[inline]
    pub fn clear(mut self) -> UnicodeBuffer {
        self.0.clear();
        UnicodeBuffer(self.0)
    }

    /// Converts the glyph buffer content into a string in the
    /// `glyph|glyph|...` format, where each glyph is
    /// `name-or-id=cluster@x_offset,y_offset+x_advance`.
    pub fn serialize(&self, face: &Face, flags: SerializeFlags) -> String {
        use std::fmt::Write;

        let mut s = String::with_capacity(64);

        let info = &self.0.info[..self.0.len];
        let pos = &self.0.pos[..self.0.len];
        let mut x = 0;
        let mut y = 0;
        for (info, pos) in info.iter().zip(pos) {
            if !flags.contains(SerializeFlags::NO_GLYPH_NAMES) {
                match face.glyph_name(info.as_glyph()) {
                    Some(name) => s.push_str(name),
                    None => write!(&mut s, "gid{}", info.glyph_id).unwrap(),
                }
            } else {
                write!(&mut s, "{}", info.glyph_id).unwrap();
            }

            if !flags.contains(SerializeFlags::NO_CLUSTERS) {
                write!(&mut s, "={}", info.cluster).unwrap();
            }

            if !flags.contains(SerializeFlags::NO_POSITIONS) {
                if x + pos.x_offset != 0 || y + pos.y_offset != 0 {
                    write!(&mut s, "@{},{}", x + pos.x_offset, y + pos.y_offset).unwrap();
                }

                if !flags.contains(SerializeFlags::NO_ADVANCES) {
                    write!(&mut s, "+{}", pos.x_advance).unwrap();
                    if pos.y_advance != 0 {
                        write!(&mut s, ",{}", pos.y_advance).unwrap();
                    }
                }
            }

            if flags.contains(SerializeFlags::GLYPH_FLAGS)
                && info.mask & glyph_flag::DEFINED != 0
            {
                write!(&mut s, "#{:X}", info.mask & glyph_flag::DEFINED).unwrap();
            }

            if flags.contains(SerializeFlags::NO_ADVANCES) {
                x += pos.x_advance;
                y += pos.y_advance;
            }

            s.push('|');
        }

        // Remove the last `|`.
        if !s.is_empty() {
            s.pop();
        }

        s
    }
}

impl std::fmt::Debug for GlyphBuffer {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("GlyphBuffer")
            .field("glyph_positions", &self.glyph_positions())
            .field("glyph_infos", &self.glyph_infos())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.push_str(text);
        buffer
    }

    #[test]
    fn cluster_ranged_masks() {
        let mut b = buffer("abcd");
        b.reset_masks(1);
        b.set_masks(0x30, 0x30, 1, 3);
        assert_eq!(b.info[0].mask, 1);
        assert_eq!(b.info[1].mask, 0x31);
        assert_eq!(b.info[2].mask, 0x31);
        assert_eq!(b.info[3].mask, 1);
    }

    #[test]
    fn unsafe_to_break_marks_mixed_clusters() {
        let mut b = buffer("abc");
        b.unsafe_to_break(0, 3);
        assert!(b
            .scratch_flags
            .contains(BufferScratchFlags::HAS_UNSAFE_TO_BREAK));
        // Glyphs outside the minimal cluster carry the flag.
        assert_eq!(b.info[0].mask & glyph_flag::UNSAFE_TO_BREAK, 0);
        assert_ne!(b.info[1].mask & glyph_flag::UNSAFE_TO_BREAK, 0);
        assert_ne!(b.info[2].mask & glyph_flag::UNSAFE_TO_BREAK, 0);
    }

    #[test]
    fn out_buffer_replacement() {
        let mut b = buffer("abc");
        b.clear_output();
        b.idx = 0;
        b.next_glyph();
        b.replace_glyphs(2, 1, &[0xFFFF]);
        b.sync();
        assert_eq!(b.len, 2);
        assert_eq!(b.info[0].glyph_id, u32::from('a'));
        assert_eq!(b.info[1].glyph_id, 0xFFFF);
        // Clusters of the merged pair collapse to the smaller one.
        assert_eq!(b.info[1].cluster, 1);
    }

    #[test]
    fn inplace_deletion_merges_clusters() {
        let mut b = buffer("abc");
        b.have_positions = true;
        b.delete_glyphs_inplace(|info| info.glyph_id == u32::from('b'));
        assert_eq!(b.len, 2);
        assert_eq!(b.info[0].glyph_id, u32::from('a'));
        assert_eq!(b.info[1].glyph_id, u32::from('c'));
    }
}
