//! Building new glyphs: whole-glyph replacement and contour composition.
//!
//! Both operations read their sources through the [`FontStore`] and only
//! take the destination mutably once the new outline is complete and every
//! lookup has succeeded, so a failing rule never leaves a half-written glyph
//! behind.

use crate::charspec::{default_glyph_name, CharSpec};
use crate::contour::contour_range;
use crate::error::{ApplyError, ResolveError};
use crate::font::{Font, FontStore, Glyph, Metric};
use crate::mapping;
use crate::rules::{ComposeRule, ReplaceRule};
use crate::scale::{round_coordinate, scale_advance, scale_factor, scale_points};

/// What a rule wrote into the destination font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub glyph: String,
    pub codepoint: Option<u32>,
}

/// Contours to take from one resolved source glyph.
#[derive(Debug, Clone, Copy)]
pub struct ComposePart<'a> {
    pub font: &'a Font,
    pub glyph: &'a str,
    pub contours: &'a [usize],
}

/// Copies `glyph` of `source` onto a `dest_upem` grid.
///
/// Points and contour ends are copied verbatim when both fonts share their
/// units-per-em, otherwise every point is rescaled. The advance width is
/// rescaled with the outline while the left side bearing is kept as the
/// source had it. The hint program is dropped.
///
/// UFO has no bearing field of its own, so once saved the bearing is the
/// outline's minimum x again; the copied value only lives in memory.
pub fn replace(source: &Font, glyph: &str, dest_upem: u16) -> Result<(Glyph, Metric), ApplyError> {
    let (original, metric) = fetch(source, glyph)?;
    let factor = scale_factor(dest_upem, source.units_per_em);

    let new_glyph = Glyph {
        points: scale_points(&original.points, factor),
        flags: original.flags.clone(),
        contour_ends: original.contour_ends.clone(),
        instructions: None,
    };
    let new_metric = Metric {
        advance_width: scale_advance(metric.advance_width, factor),
        lsb: metric.lsb,
    };
    Ok((new_glyph, new_metric))
}

/// Concatenates the selected contours of every part, in order, each part
/// rescaled from its own font's grid to `dest_upem`.
///
/// The advance width comes from the first part's glyph; the left side
/// bearing is the minimum x of the combined outline.
pub fn compose(parts: &[ComposePart<'_>], dest_upem: u16) -> Result<(Glyph, Metric), ApplyError> {
    let mut new_glyph = Glyph::default();
    let mut advance_width = None;

    for part in parts {
        let (original, metric) = fetch(part.font, part.glyph)?;
        let factor = scale_factor(dest_upem, part.font.units_per_em);
        if advance_width.is_none() {
            advance_width = Some(scale_advance(metric.advance_width, factor));
        }

        for &index in part.contours {
            let range = contour_range(original, index).map_err(|source| ApplyError::Contour {
                font: part.font.name.clone(),
                glyph: part.glyph.to_string(),
                source,
            })?;
            log::debug!(
                "taking contour {} ({} points) of `{}` from `{}`",
                index,
                range.end() - range.start() + 1,
                part.glyph,
                part.font.name
            );
            let points = scale_points(&original.points[range.clone()], factor);
            new_glyph.push_contour(points, &original.flags[range]);
        }
    }

    let new_metric = Metric {
        advance_width: advance_width.unwrap_or_default(),
        lsb: new_glyph.x_min().map_or(0, round_coordinate),
    };
    Ok((new_glyph, new_metric))
}

fn fetch<'a>(font: &'a Font, glyph: &str) -> Result<(&'a Glyph, Metric), ResolveError> {
    font.glyph(glyph)
        .zip(font.metric(glyph))
        .ok_or_else(|| ResolveError::MissingGlyph {
            glyph: glyph.to_string(),
            font: font.name.clone(),
        })
}

fn font<'a>(store: &'a FontStore, id: &str) -> Result<&'a Font, ResolveError> {
    store
        .get(id)
        .ok_or_else(|| ResolveError::UnknownFont(id.to_string()))
}

/// Applies a Replace rule to font `dest` of the store.
pub fn apply_replace(
    store: &mut FontStore,
    dest: &str,
    rule: &ReplaceRule,
) -> Result<Applied, ApplyError> {
    let codepoint = rule.target.codepoint();
    let (name, glyph, metric) = {
        let dest_font = font(store, dest)?;
        let source_id = rule.font.as_deref().unwrap_or(dest);
        let source_font = font(store, source_id)?;
        let source_spec = rule.source.as_ref().unwrap_or(&rule.target);
        let source_glyph = source_spec.resolve_glyph(source_font)?;

        let name = match (&rule.glyph, &rule.target) {
            (Some(name), _) => name.clone(),
            (None, CharSpec::GlyphName(name)) => name.clone(),
            (None, CharSpec::Codepoint(cp)) => dest_font
                .lookup(*cp)
                .map(str::to_string)
                .unwrap_or_else(|| default_glyph_name(*cp)),
        };
        log::info!(
            "copying `{}` from `{}` to `{}` as `{}`",
            source_glyph,
            source_font.name,
            dest_font.name,
            name
        );
        let (glyph, metric) = replace(source_font, source_glyph, dest_font.units_per_em)?;
        (name, glyph, metric)
    };

    commit(store, dest, name, glyph, metric, codepoint, rule.selector)
}

/// Applies a Compose rule to font `dest` of the store.
pub fn apply_compose(
    store: &mut FontStore,
    dest: &str,
    rule: &ComposeRule,
) -> Result<Applied, ApplyError> {
    let codepoint = rule.target.codepoint();
    let (glyph, metric) = {
        let dest_font = font(store, dest)?;
        let parts = rule
            .parts
            .iter()
            .map(|part| {
                let source_font = font(store, &part.font)?;
                Ok::<_, ApplyError>(ComposePart {
                    font: source_font,
                    glyph: part.source.resolve_glyph(source_font)?,
                    contours: &part.contours,
                })
            })
            .collect::<Result<Vec<_>, ApplyError>>()?;
        log::info!(
            "composing `{}` in `{}` from {} contour(s) of {} glyph(s)",
            rule.glyph,
            dest_font.name,
            parts.iter().map(|part| part.contours.len()).sum::<usize>(),
            parts.len()
        );
        compose(&parts, dest_font.units_per_em)?
    };

    commit(
        store,
        dest,
        rule.glyph.clone(),
        glyph,
        metric,
        codepoint,
        rule.selector,
    )
}

fn commit(
    store: &mut FontStore,
    dest: &str,
    name: String,
    glyph: Glyph,
    metric: Metric,
    codepoint: Option<u32>,
    selector: Option<u32>,
) -> Result<Applied, ApplyError> {
    let dest_font = store
        .get_mut(dest)
        .ok_or_else(|| ResolveError::UnknownFont(dest.to_string()))?;
    dest_font.set_glyph(&name, glyph, metric);
    if let Some(cp) = codepoint {
        mapping::update(dest_font, cp, &name, selector);
    }
    Ok(Applied {
        glyph: name,
        codepoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{PointFlags, PointType};
    use kurbo::Point;
    use maplit::btreemap;

    const ON: PointFlags = PointFlags::new(PointType::Line, false);
    const OFF: PointFlags = PointFlags::new(PointType::OffCurve, false);

    fn square(x: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x, 0.0),
            Point::new(x + size, 0.0),
            Point::new(x + size, size),
            Point::new(x, size),
        ]
    }

    fn glyph_of(contours: &[Vec<Point>]) -> Glyph {
        let mut glyph = Glyph::default();
        for points in contours {
            let mut flags = vec![ON; points.len()];
            flags[1] = OFF;
            glyph.push_contour(points.clone(), &flags);
        }
        glyph
    }

    fn fonts() -> FontStore {
        let mut base = Font::new("base", 1000);
        base.add_glyph(
            "A",
            glyph_of(&[square(10.0, 100.0), square(200.0, 50.0)]),
            Metric {
                advance_width: 500,
                lsb: 10,
            },
        );
        base.add_glyph(
            "O",
            glyph_of(&[square(50.0, 300.0), square(100.0, 200.0), square(150.0, 10.0)]),
            Metric {
                advance_width: 400,
                lsb: 50,
            },
        );
        base.set_character_map(btreemap! {
            0x41 => "A".to_string(),
            0x4F => "O".to_string(),
        });

        let mut source = Font::new("source", 500);
        let mut x = glyph_of(&[square(5.0, 20.0)]);
        x.instructions = Some("SVTCA[0]".into());
        source.add_glyph(
            "X",
            x,
            Metric {
                advance_width: 300,
                lsb: 5,
            },
        );
        source.set_character_map(btreemap! { 0x58 => "X".to_string() });

        let mut store = FontStore::new();
        store.insert("base", base);
        store.insert("source", source);
        store
    }

    #[test]
    fn replace_same_grid_is_verbatim() {
        let store = fonts();
        let base = store.get("base").unwrap();
        let (glyph, metric) = replace(base, "O", 1000).unwrap();
        let original = base.glyph("O").unwrap();
        assert_eq!(glyph.points, original.points);
        assert_eq!(glyph.flags, original.flags);
        assert_eq!(glyph.contour_ends, original.contour_ends);
        assert_eq!(metric, base.metric("O").unwrap());
    }

    #[test]
    fn replace_rescales_and_drops_hints() {
        let store = fonts();
        let source = store.get("source").unwrap();
        let (glyph, metric) = replace(source, "X", 1000).unwrap();
        assert_eq!(glyph.points, square(10.0, 40.0));
        assert_eq!(glyph.instructions, None);
        assert_eq!(metric.advance_width, 600);
        // copied, not rescaled
        assert_eq!(metric.lsb, 5);
        assert_eq!(glyph.x_min(), Some(10.0));
    }

    #[test]
    fn compose_concatenates_in_listed_order() {
        let store = fonts();
        let base = store.get("base").unwrap();
        let source = store.get("source").unwrap();
        let parts = [
            ComposePart {
                font: base,
                glyph: "O",
                contours: &[2, 0],
            },
            ComposePart {
                font: source,
                glyph: "X",
                contours: &[0],
            },
        ];
        let (glyph, metric) = compose(&parts, 1000).unwrap();

        assert_eq!(glyph.contour_ends, vec![3, 7, 11]);
        assert_eq!(glyph.points.len(), 12);
        assert_eq!(&glyph.points[0..4], &square(150.0, 10.0)[..]);
        assert_eq!(&glyph.points[4..8], &square(50.0, 300.0)[..]);
        assert_eq!(&glyph.points[8..12], &square(10.0, 40.0)[..]);
        assert_eq!(glyph.flags.len(), 12);
        assert_eq!(glyph.flags[9], OFF);
        assert!(glyph.is_well_formed());
        assert_eq!(metric.advance_width, 400);
        assert_eq!(metric.lsb, 10);
    }

    #[test]
    fn compose_reports_bad_contour_index() {
        let store = fonts();
        let base = store.get("base").unwrap();
        let parts = [ComposePart {
            font: base,
            glyph: "A",
            contours: &[0, 5],
        }];
        match compose(&parts, 1000) {
            Err(ApplyError::Contour { glyph, source, .. }) => {
                assert_eq!(glyph, "A");
                assert_eq!(source.index, 5);
                assert_eq!(source.count, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn apply_replace_from_other_font() {
        let mut store = fonts();
        let rule = ReplaceRule {
            target: CharSpec::Codepoint(0x41),
            glyph: None,
            source: Some(CharSpec::Codepoint(0x58)),
            font: Some("source".into()),
            selector: None,
        };
        let applied = apply_replace(&mut store, "base", &rule).unwrap();
        assert_eq!(applied.glyph, "A");

        let base = store.get("base").unwrap();
        assert_eq!(base.glyph("A").unwrap().points, square(10.0, 40.0));
        assert_eq!(base.glyph_order, vec!["A", "O"]);
        assert_eq!(base.lookup(0x41), Some("A"));
        // the source font is untouched
        assert_eq!(store.get("source").unwrap().glyph("X").unwrap().points, square(5.0, 20.0));
    }

    #[test]
    fn apply_replace_within_one_font() {
        let mut store = fonts();
        let rule = ReplaceRule {
            target: CharSpec::Codepoint(0x41),
            glyph: Some("A.copy".into()),
            source: Some(CharSpec::Codepoint(0x4F)),
            font: None,
            selector: None,
        };
        apply_replace(&mut store, "base", &rule).unwrap();

        let base = store.get("base").unwrap();
        assert_eq!(base.glyph_order, vec!["A", "O", "A.copy"]);
        assert_eq!(base.glyph("A.copy"), base.glyph("O"));
        assert_eq!(base.lookup(0x41), Some("A.copy"));
    }

    #[test]
    fn apply_replace_names_unmapped_targets() {
        let mut store = fonts();
        let rule = ReplaceRule {
            target: CharSpec::Codepoint(0x42),
            glyph: None,
            source: Some(CharSpec::Codepoint(0x41)),
            font: None,
            selector: None,
        };
        let applied = apply_replace(&mut store, "base", &rule).unwrap();
        assert_eq!(applied.glyph, "uni0042");
        assert_eq!(store.get("base").unwrap().lookup(0x42), Some("uni0042"));
    }

    #[test]
    fn failed_lookups_leave_the_font_alone() {
        let mut store = fonts();
        let rule = ComposeRule {
            target: CharSpec::Codepoint(0x41),
            glyph: "A.alt".into(),
            parts: vec![
                crate::rules::ContourSource {
                    font: "base".into(),
                    source: CharSpec::Codepoint(0x41),
                    contours: vec![0],
                },
                crate::rules::ContourSource {
                    font: "source".into(),
                    source: CharSpec::Codepoint(0x59),
                    contours: vec![0],
                },
            ],
            selector: None,
        };
        let err = apply_compose(&mut store, "base", &rule).unwrap_err();
        assert_eq!(
            err,
            ApplyError::Resolve(ResolveError::Unmapped {
                codepoint: 0x59,
                font: "source".into()
            })
        );
        let base = store.get("base").unwrap();
        assert!(!base.contains("A.alt"));
        assert_eq!(base.lookup(0x41), Some("A"));

        let err = apply_compose(
            &mut store,
            "base",
            &ComposeRule {
                parts: vec![crate::rules::ContourSource {
                    font: "missing".into(),
                    source: CharSpec::Codepoint(0x41),
                    contours: vec![0],
                }],
                ..rule
            },
        )
        .unwrap_err();
        assert_eq!(err, ApplyError::Resolve(ResolveError::UnknownFont("missing".into())));
    }
}
