//! Reading fonts from UFO sources and writing the result back.
//!
//! The engine's [`Font`] is built from the default layer of a UFO. On save the
//! original [`norad::Font`] is updated in place, so everything the engine does
//! not model (kerning, features, other layers, untouched glyphs) survives.

use std::collections::{btree_map::Entry, BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use kurbo::{Affine, Point};
use norad::designspace::DesignSpaceDocument;
use norad::fontinfo::NameRecord;

use crate::config::Metadata;
use crate::error::FontIoError;
use crate::font::{Font, Glyph, Metric, PointFlags, PointType, VariationSequences};
use crate::scale::round_coordinate;

const GLYPH_ORDER_KEY: &str = "public.glyphOrder";
const VARIATION_SEQUENCES_KEY: &str = "public.unicodeVariationSequences";
const INSTRUCTIONS_KEY: &str = "public.truetype.instructions";
const DEFAULT_UNITS_PER_EM: u16 = 1000;
/// Nesting limit when decomposing components.
const MAX_COMPONENT_DEPTH: usize = 32;
/// (platform, encoding, language) of the name records metadata overrides are written to.
const NAME_RECORD_TARGETS: [(u32, u32, u32); 2] = [(1, 0, 0), (3, 1, 0x409)];

impl From<&norad::ContourPoint> for PointFlags {
    fn from(point: &norad::ContourPoint) -> Self {
        let typ = match &point.typ {
            norad::PointType::Move => PointType::Move,
            norad::PointType::Line => PointType::Line,
            norad::PointType::OffCurve => PointType::OffCurve,
            norad::PointType::Curve => PointType::Curve,
            norad::PointType::QCurve => PointType::QCurve,
        };
        PointFlags::new(typ, point.smooth)
    }
}

impl From<PointType> for norad::PointType {
    fn from(typ: PointType) -> Self {
        match typ {
            PointType::Move => norad::PointType::Move,
            PointType::Line => norad::PointType::Line,
            PointType::OffCurve => norad::PointType::OffCurve,
            PointType::Curve => norad::PointType::Curve,
            PointType::QCurve => norad::PointType::QCurve,
        }
    }
}

/// Loads the UFO at `path`, or the member of the designspace at `path`
/// selected by `member` (source name first, then style name; the first
/// master when `member` is `None`).
pub fn load(
    name: &str,
    path: &Path,
    member: Option<&str>,
) -> Result<(Font, norad::Font), FontIoError> {
    let ufo_path = if is_designspace(path) {
        designspace_member(path, member)?
    } else {
        if let Some(member) = member {
            log::warn!(
                "{} is not a designspace, ignoring font selector `{}`",
                path.display(),
                member
            );
        }
        path.to_path_buf()
    };

    log::info!("loading `{}` from {}", name, ufo_path.display());
    let ufo = norad::Font::load(&ufo_path).map_err(|e| FontIoError::Load {
        path: ufo_path.clone(),
        source: Box::new(e),
    })?;
    let font = font_from_ufo(name, &ufo);
    Ok((font, ufo))
}

fn is_designspace(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("designspace"))
}

fn designspace_member(path: &Path, member: Option<&str>) -> Result<PathBuf, FontIoError> {
    let designspace = DesignSpaceDocument::load(path).map_err(|e| FontIoError::Load {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    // Sparse layer sources are not complete fonts.
    let masters: Vec<_> = designspace
        .sources
        .iter()
        .filter(|source| source.layer.is_none())
        .collect();

    let source = match member {
        Some(member) => masters
            .iter()
            .find(|source| source.name.as_deref() == Some(member))
            .or_else(|| {
                masters
                    .iter()
                    .find(|source| source.stylename.as_deref() == Some(member))
            })
            .ok_or_else(|| FontIoError::NoSuchMember {
                path: path.to_path_buf(),
                member: member.to_string(),
            })?,
        None => masters
            .first()
            .ok_or_else(|| FontIoError::EmptyDesignspace(path.to_path_buf()))?,
    };
    let designspace_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(designspace_dir.join(&source.filename))
}

/// Builds the engine's view of a UFO's default layer.
pub fn font_from_ufo(name: &str, ufo: &norad::Font) -> Font {
    let units_per_em = ufo
        .font_info
        .units_per_em
        .map(|upem| upem.round() as u16)
        .filter(|&upem| upem > 0)
        .unwrap_or(DEFAULT_UNITS_PER_EM);
    let layer = ufo.default_layer();

    // Glyphs listed in the lib come first; the rest follow sorted by name.
    let mut seen = HashSet::new();
    let mut glyph_order: Vec<String> = ufo
        .lib
        .get(GLYPH_ORDER_KEY)
        .and_then(|value| value.as_array())
        .map(|names| {
            names
                .iter()
                .filter_map(|value| value.as_string())
                .filter(|name| layer.get_glyph(name).is_some() && seen.insert(name.to_string()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let mut leftovers: Vec<String> = layer
        .iter()
        .map(|glyph| glyph.name().to_string())
        .filter(|name| !seen.contains(name))
        .collect();
    leftovers.sort();
    glyph_order.extend(leftovers);

    let mut font = Font::new(name, units_per_em);
    let mut character_map = BTreeMap::new();
    for glyph_name in &glyph_order {
        let Some(glyph) = layer.get_glyph(glyph_name) else {
            continue;
        };
        let mut outline = Glyph {
            instructions: instructions(glyph),
            ..Default::default()
        };
        append_contours(layer, glyph, Affine::IDENTITY, &mut Vec::new(), &mut outline);
        let metric = Metric {
            advance_width: glyph.width.round() as u16,
            lsb: outline.x_min().map_or(0, round_coordinate),
        };
        for c in glyph.codepoints.iter() {
            match character_map.entry(c as u32) {
                Entry::Vacant(entry) => {
                    entry.insert(glyph_name.clone());
                }
                Entry::Occupied(entry) => log::warn!(
                    "`{}`: U+{:04X} is claimed by both `{}` and `{}`, keeping `{}`",
                    name,
                    c as u32,
                    entry.get(),
                    glyph_name,
                    entry.get()
                ),
            }
        }
        font.add_glyph(glyph_name.clone(), outline, metric);
    }
    font.set_character_map(character_map);
    font.variation_sequences = variation_sequences(&ufo.lib, &font);
    font
}

fn instructions(glyph: &norad::Glyph) -> Option<String> {
    glyph
        .lib
        .get(INSTRUCTIONS_KEY)
        .and_then(|value| value.as_dictionary())
        .and_then(|dict| dict.get("assembly"))
        .and_then(|value| value.as_string())
        .map(str::to_string)
}

/// Flattens the contours of `glyph` and, recursively, of its components.
///
/// `path` holds the glyphs currently being expanded; a component pointing
/// back at one of them is skipped.
fn append_contours<'a>(
    layer: &'a norad::Layer,
    glyph: &'a norad::Glyph,
    transform: Affine,
    path: &mut Vec<&'a str>,
    outline: &mut Glyph,
) {
    for contour in &glyph.contours {
        let points: Vec<Point> = contour
            .points
            .iter()
            .map(|point| {
                let pt = Point::new(point.x, point.y);
                if transform == Affine::IDENTITY {
                    pt
                } else {
                    transform * pt
                }
            })
            .collect();
        let flags: Vec<PointFlags> = contour.points.iter().map(PointFlags::from).collect();
        outline.push_contour(points, &flags);
    }

    if glyph.components.is_empty() {
        return;
    }
    if path.len() >= MAX_COMPONENT_DEPTH {
        log::warn!("components of `{}` nest too deeply, skipping", glyph.name());
        return;
    }
    path.push(glyph.name().as_str());
    for component in &glyph.components {
        let base_name = component.base.as_str();
        if path.contains(&base_name) {
            log::warn!(
                "`{}` references `{}` cyclically, skipping the component",
                glyph.name(),
                base_name
            );
            continue;
        }
        let Some(base) = layer.get_glyph(base_name) else {
            log::warn!("`{}` references missing glyph `{}`", glyph.name(), base_name);
            continue;
        };
        let t = &component.transform;
        let component_transform = Affine::new([
            t.x_scale, t.xy_scale, t.yx_scale, t.y_scale, t.x_offset, t.y_offset,
        ]);
        append_contours(layer, base, transform * component_transform, path, outline);
    }
    path.pop();
}

fn parse_hex(s: &str) -> Option<u32> {
    u32::from_str_radix(s, 16).ok()
}

/// Reads `public.unicodeVariationSequences`. Sequences that resolve to the
/// base character's own glyph become default (`None`) entries.
fn variation_sequences(lib: &plist::Dictionary, font: &Font) -> Option<VariationSequences> {
    let table = lib.get(VARIATION_SEQUENCES_KEY)?.as_dictionary()?;
    let mut result = VariationSequences::new();
    for (selector, bases) in table.iter() {
        let (Some(selector), Some(bases)) = (parse_hex(selector), bases.as_dictionary()) else {
            log::warn!("`{}`: ignoring variation selector entry `{}`", font.name, selector);
            continue;
        };
        let sequences = result.entry(selector).or_default();
        for (base, glyph) in bases.iter() {
            let (Some(base), Some(glyph)) = (parse_hex(base), glyph.as_string()) else {
                log::warn!("`{}`: ignoring variation sequence for `{}`", font.name, base);
                continue;
            };
            let glyph = if font.lookup(base) == Some(glyph) {
                None
            } else {
                Some(glyph.to_string())
            };
            sequences.push((base, glyph));
        }
    }
    Some(result)
}

fn variation_sequences_to_plist(font: &Font) -> Option<plist::Value> {
    let table = font
        .variation_sequences
        .as_ref()
        .filter(|table| !table.is_empty())?;
    let mut selectors = plist::Dictionary::new();
    for (selector, sequences) in table {
        let mut bases = plist::Dictionary::new();
        for (base, glyph) in sequences {
            match glyph.as_deref().or_else(|| font.lookup(*base)) {
                Some(glyph) => {
                    bases.insert(format!("{:04X}", base), plist::Value::String(glyph.to_string()));
                }
                None => log::warn!(
                    "dropping default variation sequence U+{:04X} U+{:04X}: base is unmapped",
                    base,
                    selector
                ),
            }
        }
        selectors.insert(format!("{:04X}", selector), plist::Value::Dictionary(bases));
    }
    Some(plist::Value::Dictionary(selectors))
}

fn glyph_to_ufo(name: &str, glyph: &Glyph, metric: Metric) -> Result<norad::Glyph, FontIoError> {
    norad::Name::new(name).map_err(|e| FontIoError::InvalidGlyphName {
        glyph: name.to_string(),
        source: Box::new(e),
    })?;
    let mut ufo_glyph = norad::Glyph::new(name);
    ufo_glyph.width = f64::from(metric.advance_width);

    let mut start = 0;
    for &end in &glyph.contour_ends {
        let points = (start..=end)
            .map(|i| {
                let (pt, flags) = (glyph.points[i], glyph.flags[i]);
                norad::ContourPoint::new(pt.x, pt.y, flags.typ.into(), flags.smooth, None, None)
            })
            .collect();
        ufo_glyph.contours.push(norad::Contour::new(points, None));
        start = end + 1;
    }
    Ok(ufo_glyph)
}

fn override_field(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *field = Some(value.clone());
    }
}

/// Writes naming overrides to the fontinfo fields and to name records for
/// the Macintosh and Windows platforms.
pub fn apply_metadata(info: &mut norad::FontInfo, metadata: &Metadata) {
    override_field(&mut info.copyright, &metadata.copyright);
    override_field(&mut info.family_name, &metadata.familyname);
    override_field(&mut info.style_name, &metadata.subfamilyname);
    override_field(&mut info.open_type_name_unique_id, &metadata.uniqueid);
    override_field(&mut info.postscript_full_name, &metadata.fullname);
    override_field(&mut info.open_type_name_version, &metadata.version);
    override_field(&mut info.postscript_font_name, &metadata.fontname);
    override_field(&mut info.open_type_name_license, &metadata.license);
    override_field(&mut info.open_type_name_license_url, &metadata.licenseurl);

    let entries = metadata.name_entries();
    if entries.is_empty() {
        return;
    }
    let records = info.open_type_name_records.get_or_insert_with(Vec::new);
    for (name_id, value) in entries {
        let name_id = u32::from(name_id);
        for (platform_id, encoding_id, language_id) in NAME_RECORD_TARGETS {
            records.retain(|record| {
                (record.name_id, record.platform_id, record.encoding_id, record.language_id)
                    != (name_id, platform_id, encoding_id, language_id)
            });
            records.push(NameRecord {
                name_id,
                platform_id,
                encoding_id,
                language_id,
                string: value.to_string(),
            });
        }
    }
    records.sort_by_key(|record| {
        (record.platform_id, record.encoding_id, record.language_id, record.name_id)
    });
}

/// Writes `font` into `ufo` and saves it at `path`.
///
/// Glyphs written by rules replace their UFO counterparts wholesale (their
/// glyph lib, and with it any hint program, is dropped); all glyphs get their
/// code points from the font's character map.
pub fn save(
    font: &Font,
    mut ufo: norad::Font,
    metadata: &Metadata,
    path: &Path,
) -> Result<(), FontIoError> {
    let codepoints = font.codepoints_by_glyph();
    let layer = ufo.default_layer_mut();
    for name in font.modified_glyphs() {
        if let (Some(glyph), Some(metric)) = (font.glyph(name), font.metric(name)) {
            layer.insert_glyph(glyph_to_ufo(name, glyph, metric)?);
        }
    }
    for name in &font.glyph_order {
        if let Some(glyph) = layer.get_glyph_mut(name) {
            let chars = codepoints
                .get(name.as_str())
                .into_iter()
                .flatten()
                .filter_map(|&cp| char::from_u32(cp));
            glyph.codepoints = norad::Codepoints::new(chars);
        }
    }

    let glyph_order = font
        .glyph_order
        .iter()
        .map(|name| plist::Value::String(name.clone()))
        .collect();
    ufo.lib
        .insert(GLYPH_ORDER_KEY.to_string(), plist::Value::Array(glyph_order));
    match variation_sequences_to_plist(font) {
        Some(value) => {
            ufo.lib.insert(VARIATION_SEQUENCES_KEY.to_string(), value);
        }
        None => {
            ufo.lib.remove(VARIATION_SEQUENCES_KEY);
        }
    }
    apply_metadata(&mut ufo.font_info, metadata);

    log::info!("saving {}", path.display());
    ufo.save(path).map_err(|e| FontIoError::Save {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}
