use crate::{Face, Tag};

// A small slice of the AAT feature registry: the OpenType features we can
// translate into (type, selector) pairs.  Sorted by OT tag.
struct FeatureMapping {
    ot_tag: Tag,
    feature_type: u16,
    selector_to_enable: u16,
    selector_to_disable: u16,
}

const fn mapping(tag: &[u8; 4], kind: u16, on: u16, off: u16) -> FeatureMapping {
    FeatureMapping {
        ot_tag: Tag::from_bytes(tag),
        feature_type: kind,
        selector_to_enable: on,
        selector_to_disable: off,
    }
}

// Feature type numbers from the Apple feature registry.
const LIGATURES: u16 = 1;
const LETTER_CASE: u16 = 3;
const VERTICAL_SUBSTITUTION: u16 = 4;
const NUMBER_SPACING: u16 = 6;
const VERTICAL_POSITION: u16 = 10;
const FRACTIONS: u16 = 11;
const TYPOGRAPHIC_EXTRAS: u16 = 14;
const MATHEMATICAL_EXTRAS: u16 = 15;
const CHARACTER_ALTERNATIVES: u16 = 17;
const STYLE_OPTIONS: u16 = 19;
const CHARACTER_SHAPE: u16 = 20;
const NUMBER_CASE: u16 = 21;
const TEXT_SPACING: u16 = 22;
const TRANSLITERATION: u16 = 23;
const RUBY_KANA: u16 = 28;
const ITALIC_CJK_ROMAN: u16 = 32;
const CASE_SENSITIVE_LAYOUT: u16 = 33;
const ALTERNATE_KANA: u16 = 34;
const STYLISTIC_ALTERNATIVES: u16 = 35;
const CONTEXTUAL_ALTERNATIVES: u16 = 36;
const LOWER_CASE: u16 = 37;
const UPPER_CASE: u16 = 38;

pub const LOWER_CASE_SMALL_CAPS_SELECTOR: u16 = 1;
pub const LETTER_CASE_SMALL_CAPS_SELECTOR: u16 = 3;

const FEATURE_MAPPINGS: &[FeatureMapping] = &[
    mapping(b"afrc", FRACTIONS, 1, 0),
    mapping(b"c2pc", UPPER_CASE, 2, 0),
    mapping(b"c2sc", UPPER_CASE, 1, 0),
    mapping(b"calt", CONTEXTUAL_ALTERNATIVES, 0, 1),
    mapping(b"case", CASE_SENSITIVE_LAYOUT, 0, 1),
    mapping(b"clig", LIGATURES, 18, 19),
    mapping(b"cpsp", CASE_SENSITIVE_LAYOUT, 2, 3),
    mapping(b"cswh", CONTEXTUAL_ALTERNATIVES, 4, 5),
    mapping(b"dlig", LIGATURES, 4, 5),
    mapping(b"expt", CHARACTER_SHAPE, 10, 16),
    mapping(b"frac", FRACTIONS, 2, 0),
    mapping(b"fwid", TEXT_SPACING, 1, 7),
    mapping(b"halt", TEXT_SPACING, 6, 7),
    mapping(b"hkna", ALTERNATE_KANA, 0, 1),
    mapping(b"hlig", LIGATURES, 20, 21),
    mapping(b"hngl", TRANSLITERATION, 1, 0),
    mapping(b"hojo", CHARACTER_SHAPE, 12, 16),
    mapping(b"hwid", TEXT_SPACING, 2, 7),
    mapping(b"ital", ITALIC_CJK_ROMAN, 2, 3),
    mapping(b"jp04", CHARACTER_SHAPE, 11, 16),
    mapping(b"jp78", CHARACTER_SHAPE, 2, 16),
    mapping(b"jp83", CHARACTER_SHAPE, 3, 16),
    mapping(b"jp90", CHARACTER_SHAPE, 4, 16),
    mapping(b"liga", LIGATURES, 2, 3),
    mapping(b"lnum", NUMBER_CASE, 1, 0),
    mapping(b"mgrk", MATHEMATICAL_EXTRAS, 10, 11),
    mapping(b"nlck", CHARACTER_SHAPE, 13, 16),
    mapping(b"onum", NUMBER_CASE, 0, 1),
    mapping(b"ordn", VERTICAL_POSITION, 3, 0),
    mapping(b"pcap", LOWER_CASE, 2, 0),
    mapping(b"pnum", NUMBER_SPACING, 1, 0),
    mapping(b"pwid", TEXT_SPACING, 0, 7),
    mapping(b"qwid", TEXT_SPACING, 4, 7),
    mapping(b"rlig", LIGATURES, 0, 1),
    mapping(b"ruby", RUBY_KANA, 2, 3),
    mapping(b"sinf", VERTICAL_POSITION, 4, 0),
    mapping(b"smcp", LOWER_CASE, 1, 0),
    mapping(b"smpl", CHARACTER_SHAPE, 1, 16),
    mapping(b"subs", VERTICAL_POSITION, 2, 0),
    mapping(b"sups", VERTICAL_POSITION, 1, 0),
    mapping(b"swsh", CONTEXTUAL_ALTERNATIVES, 2, 3),
    mapping(b"titl", STYLE_OPTIONS, 4, 0),
    mapping(b"tnum", NUMBER_SPACING, 0, 1),
    mapping(b"trad", CHARACTER_SHAPE, 0, 16),
    mapping(b"twid", TEXT_SPACING, 3, 7),
    mapping(b"unic", LETTER_CASE, 14, 15),
    mapping(b"vert", VERTICAL_SUBSTITUTION, 0, 1),
    mapping(b"vkna", ALTERNATE_KANA, 2, 3),
    mapping(b"vrt2", VERTICAL_SUBSTITUTION, 0, 1),
    mapping(b"zero", TYPOGRAPHIC_EXTRAS, 4, 5),
];

/// Per-chain subtable flags, resolved against the requested features.
#[derive(Default)]
pub struct Map {
    pub chain_flags: Vec<u32>,
}

#[derive(Clone, Copy)]
struct FeatureInfo {
    kind: u16,
    setting: u16,
    is_exclusive: bool,
}

#[derive(Default)]
pub struct MapBuilder {
    features: Vec<FeatureInfo>,
}

impl MapBuilder {
    pub fn add_feature(&mut self, face: &Face, tag: Tag, value: u32) -> Option<()> {
        let feat = face.tables().feat?;

        if tag == Tag::from_bytes(b"aalt") {
            let exposes_feature = feat
                .names
                .find(CHARACTER_ALTERNATIVES)
                .map(|f| f.setting_names.len() != 0)
                .unwrap_or(false);

            if !exposes_feature {
                return Some(());
            }

            self.features.push(FeatureInfo {
                kind: CHARACTER_ALTERNATIVES,
                setting: value as u16,
                is_exclusive: true,
            });
        }

        // Stylistic set tags translate programmatically.
        let bytes = tag.to_bytes();
        let mapped;
        let mapping = if bytes[0] == b's' && bytes[1] == b's' {
            let n = (bytes[2] as char).to_digit(10)? * 10 + (bytes[3] as char).to_digit(10)?;
            if !(1..=20).contains(&n) {
                return Some(());
            }
            mapped = FeatureMapping {
                ot_tag: tag,
                feature_type: STYLISTIC_ALTERNATIVES,
                selector_to_enable: (2 * n) as u16,
                selector_to_disable: (2 * n + 1) as u16,
            };
            &mapped
        } else {
            let idx = FEATURE_MAPPINGS
                .binary_search_by(|map| map.ot_tag.cmp(&tag))
                .ok()?;
            &FEATURE_MAPPINGS[idx]
        };

        let mut feature = feat.names.find(mapping.feature_type);

        match feature {
            Some(feature) if feature.setting_names.len() != 0 => {}
            _ => {
                // The chain-flag resolution will fall back to the deprecated
                // letter-case small-caps if necessary, so check for that
                // possibility.
                if mapping.feature_type == LOWER_CASE
                    && mapping.selector_to_enable == LOWER_CASE_SMALL_CAPS_SELECTOR
                {
                    feature = feat.names.find(LETTER_CASE);
                }
            }
        }

        if let Some(feature) = feature {
            if feature.setting_names.len() != 0 {
                let setting = if value != 0 {
                    mapping.selector_to_enable
                } else {
                    mapping.selector_to_disable
                };

                self.features.push(FeatureInfo {
                    kind: mapping.feature_type,
                    setting,
                    is_exclusive: feature.exclusive,
                });
            }
        }

        Some(())
    }

    pub fn compile(&mut self, face: &Face) -> Map {
        // Sort features and merge duplicates.
        self.features.sort_by(|a, b| {
            if a.kind != b.kind {
                a.kind.cmp(&b.kind)
            } else if !a.is_exclusive && (a.setting & !1) != (b.setting & !1) {
                a.setting.cmp(&b.setting)
            } else {
                core::cmp::Ordering::Equal
            }
        });

        if !self.features.is_empty() {
            let mut j = 0;
            for i in 0..self.features.len() {
                // Non-exclusive feature selectors come in even/odd pairs to
                // turn a setting on/off respectively, so we mask out the
                // low-order bit when checking for "duplicates" here.
                let non_exclusive = !self.features[i].is_exclusive
                    && (self.features[i].setting & !1) != (self.features[j].setting & !1);

                if self.features[i].kind != self.features[j].kind || non_exclusive {
                    j += 1;
                    self.features[j] = self.features[i];
                }
            }
            self.features.truncate(j + 1);
        }

        let mut map = Map::default();

        let has_feature = |kind: u16, setting: u16| {
            self.features
                .binary_search_by(|probe| {
                    if probe.kind != kind {
                        probe.kind.cmp(&kind)
                    } else {
                        probe.setting.cmp(&setting)
                    }
                })
                .is_ok()
        };

        let chains = match face.tables().morx {
            Some(ref table) => table.chains,
            None => return map,
        };

        for chain in chains {
            let mut flags = chain.default_flags;
            for feature in chain.features {
                // Check whether this type/setting pair was requested in the
                // map, and if so, apply its flags.
                if has_feature(feature.kind, feature.setting) {
                    flags &= feature.disable_flags;
                    flags |= feature.enable_flags;
                } else if feature.kind == LETTER_CASE
                    && feature.setting == LETTER_CASE_SMALL_CAPS_SELECTOR
                {
                    // Deprecated: small caps asked through the letter-case type.
                    if has_feature(LOWER_CASE, LOWER_CASE_SMALL_CAPS_SELECTOR) {
                        flags &= feature.disable_flags;
                        flags |= feature.enable_flags;
                    }
                }
            }

            map.chain_flags.push(flags);
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_mappings_are_sorted() {
        for pair in FEATURE_MAPPINGS.windows(2) {
            assert!(pair[0].ot_tag < pair[1].ot_tag);
        }
    }
}
