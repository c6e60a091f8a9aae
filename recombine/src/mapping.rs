//! Keeping the character map and variation sequences in step with new glyphs.

use crate::font::Font;

/// Points `codepoint` at `glyph` in every character map subtable.
///
/// If the code point already mapped to another glyph, that glyph is first
/// recorded as the code point's variant under `selector`, or under every
/// known selector when none is given. The old mapping has to be captured
/// before the base mapping moves, otherwise the sequences would follow it.
pub fn update(font: &mut Font, codepoint: u32, glyph: &str, selector: Option<u32>) {
    let previous = font.lookup(codepoint).map(str::to_string);
    if let Some(previous) = previous.filter(|previous| previous != glyph) {
        log::debug!(
            "keeping `{}` as variation of U+{:04X} in `{}`",
            previous,
            codepoint,
            font.name
        );
        match selector {
            Some(selector) => {
                let sequences = font
                    .variation_sequences
                    .get_or_insert_with(Default::default)
                    .entry(selector)
                    .or_default();
                keep_variant(sequences, codepoint, &previous);
            }
            None => {
                for sequences in font.variation_sequences.iter_mut().flat_map(|vs| vs.values_mut()) {
                    keep_variant(sequences, codepoint, &previous);
                }
            }
        }
    }
    font.map_codepoint(codepoint, glyph);
}

/// Turns a default `(base, None)` entry into `(base, previous)`, or adds it.
/// An entry that already names a glyph stays as it is.
fn keep_variant(sequences: &mut Vec<(u32, Option<String>)>, base: u32, previous: &str) {
    match sequences.iter_mut().find(|(cp, _)| *cp == base) {
        Some(entry) => {
            if entry.1.is_none() {
                entry.1 = Some(previous.to_string());
            }
        }
        None => sequences.push((base, Some(previous.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn font() -> Font {
        let mut font = Font::new("base", 1000);
        font.set_character_map(btreemap! {
            0x41 => "A".to_string(),
            0x42 => "B".to_string(),
            0x6F22 => "uni6F22".to_string(),
        });
        font.variation_sequences = Some(btreemap! {
            0xFE00 => vec![(0x42, None)],
            0xE0100 => vec![(0x6F22, None), (0x41, None)],
            0xE0101 => vec![(0x6F22, Some("uni6F22.alt".to_string()))],
        });
        font
    }

    #[test]
    fn snapshot_happens_before_remapping() {
        let mut font = font();
        font.variation_sequences = None;
        update(&mut font, 0x41, "A.new", Some(0xFE00));

        assert_eq!(font.lookup(0x41), Some("A.new"));
        assert_eq!(
            font.variation_sequences,
            Some(btreemap! { 0xFE00 => vec![(0x41, Some("A".to_string()))] })
        );
    }

    #[test]
    fn selector_touches_only_its_own_sequences() {
        let mut font = font();
        update(&mut font, 0x6F22, "uni6F22.jp", Some(0xE0100));

        let sequences = font.variation_sequences.as_ref().unwrap();
        assert_eq!(
            sequences[&0xE0100],
            vec![(0x6F22, Some("uni6F22".to_string())), (0x41, None)]
        );
        assert_eq!(sequences[&0xFE00], vec![(0x42, None)]);
        assert_eq!(
            sequences[&0xE0101],
            vec![(0x6F22, Some("uni6F22.alt".to_string()))]
        );
    }

    #[test]
    fn no_selector_touches_every_selector() {
        let mut font = font();
        update(&mut font, 0x6F22, "uni6F22.jp", None);

        let sequences = font.variation_sequences.as_ref().unwrap();
        assert_eq!(
            sequences[&0xFE00],
            vec![(0x42, None), (0x6F22, Some("uni6F22".to_string()))]
        );
        assert_eq!(sequences[&0xE0100][0], (0x6F22, Some("uni6F22".to_string())));
        assert_eq!(
            sequences[&0xE0101],
            vec![(0x6F22, Some("uni6F22.alt".to_string()))]
        );
    }

    #[test]
    fn other_codepoints_are_not_disturbed() {
        let mut font = font();
        let before = font.clone();
        update(&mut font, 0x41, "A.new", Some(0xE0100));

        for (old, new) in before.cmap.iter().zip(&font.cmap) {
            for (cp, name) in &old.map {
                if *cp != 0x41 {
                    assert_eq!(new.map.get(cp), Some(name));
                }
            }
            assert_eq!(new.map.get(&0x41).map(String::as_str), Some("A.new"));
        }
        let old_vs = before.variation_sequences.unwrap();
        let new_vs = font.variation_sequences.unwrap();
        for (selector, old) in &old_vs {
            let untouched = |seq: &Vec<(u32, Option<String>)>| {
                seq.iter().filter(|(cp, _)| *cp != 0x41).cloned().collect::<Vec<_>>()
            };
            assert_eq!(untouched(old), untouched(&new_vs[selector]));
        }
        assert!(new_vs[&0xE0100].contains(&(0x41, Some("A".to_string()))));
    }

    #[test]
    fn explicit_variants_are_kept() {
        let mut font = font();
        update(&mut font, 0x6F22, "uni6F22.jp", None);
        update(&mut font, 0x6F22, "uni6F22.kr", Some(0xE0101));

        let sequences = font.variation_sequences.as_ref().unwrap();
        assert_eq!(
            sequences[&0xE0101],
            vec![(0x6F22, Some("uni6F22.alt".to_string()))]
        );
        assert_eq!(font.lookup(0x6F22), Some("uni6F22.kr"));
    }

    #[test]
    fn remapping_to_the_same_glyph_records_nothing() {
        let mut font = font();
        let before = font.variation_sequences.clone();
        update(&mut font, 0x42, "B", Some(0xFE00));
        update(&mut font, 0x6F22, "uni6F22", None);

        assert_eq!(font.variation_sequences, before);
        assert_eq!(font.lookup(0x42), Some("B"));
    }

    #[test]
    fn new_codepoints_only_map() {
        let mut font = font();
        let before = font.variation_sequences.clone();
        update(&mut font, 0x43, "C", None);
        update(&mut font, 0x41, "A", Some(0xFE00));

        assert_eq!(font.lookup(0x43), Some("C"));
        assert_eq!(font.variation_sequences, before);
        assert!(font.cmap.iter().all(|sub| sub.map.get(&0x43).map(String::as_str) == Some("C")));
    }
}
