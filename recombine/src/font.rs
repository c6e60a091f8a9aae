//! The in-memory font model rules operate on.
//!
//! Outlines are stored TrueType-style: one flat point list per glyph plus the
//! index of the last point of every contour. Horizontal metrics live next to
//! the glyphs and are always inserted together with them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use kurbo::Point;

/// The largest code point of the Basic Multilingual Plane.
const MAX_BMP_CODEPOINT: u32 = 0xFFFF;

/// The kind of an outline point. Everything but `OffCurve` is on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointType {
    /// First point of an open contour.
    Move,
    Line,
    OffCurve,
    Curve,
    QCurve,
}

/// Per-point flags, carried through every operation untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointFlags {
    pub typ: PointType,
    pub smooth: bool,
}

impl PointFlags {
    pub const fn new(typ: PointType, smooth: bool) -> Self {
        PointFlags { typ, smooth }
    }

    pub fn is_on_curve(&self) -> bool {
        self.typ != PointType::OffCurve
    }
}

/// A glyph outline.
///
/// `points` and `flags` always have the same length; `contour_ends` is
/// strictly increasing and its last entry is `points.len() - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glyph {
    pub points: Vec<Point>,
    pub flags: Vec<PointFlags>,
    pub contour_ends: Vec<usize>,
    /// TrueType hint program in assembly form, if the glyph has one.
    pub instructions: Option<String>,
}

impl Glyph {
    pub fn contour_count(&self) -> usize {
        self.contour_ends.len()
    }

    /// Appends one contour. Empty contours are dropped.
    pub fn push_contour(&mut self, points: impl IntoIterator<Item = Point>, flags: &[PointFlags]) {
        let before = self.points.len();
        self.points.extend(points);
        self.flags.extend_from_slice(flags);
        debug_assert_eq!(self.points.len(), self.flags.len());
        if self.points.len() > before {
            self.contour_ends.push(self.points.len() - 1);
        }
    }

    /// Checks the point/flag/contour-end invariants.
    pub fn is_well_formed(&self) -> bool {
        self.points.len() == self.flags.len()
            && self.contour_ends.windows(2).all(|w| w[0] < w[1])
            && match self.contour_ends.last() {
                Some(&last) => last + 1 == self.points.len(),
                None => self.points.is_empty(),
            }
    }

    /// The smallest x coordinate of the outline, `None` when it has no points.
    pub fn x_min(&self) -> Option<f64> {
        self.points.iter().map(|pt| pt.x).reduce(f64::min)
    }
}

/// Advance width and left side bearing of one glyph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metric {
    pub advance_width: u16,
    pub lsb: i16,
}

/// A `cmap` platform/encoding pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Encoding {
    pub platform_id: u16,
    pub encoding_id: u16,
}

impl Encoding {
    pub const UNICODE_BMP: Encoding = Encoding::new(0, 3);
    pub const UNICODE_FULL: Encoding = Encoding::new(0, 4);
    pub const WINDOWS_BMP: Encoding = Encoding::new(3, 1);
    pub const WINDOWS_FULL: Encoding = Encoding::new(3, 10);

    pub const fn new(platform_id: u16, encoding_id: u16) -> Self {
        Encoding {
            platform_id,
            encoding_id,
        }
    }

    /// Whether subtables with this encoding can hold code points outside the BMP.
    pub fn is_full_repertoire(&self) -> bool {
        matches!(
            (self.platform_id, self.encoding_id),
            (0, 4) | (0, 6) | (3, 10)
        )
    }

    pub fn covers(&self, codepoint: u32) -> bool {
        codepoint <= MAX_BMP_CODEPOINT || self.is_full_repertoire()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform_id, self.encoding_id)
    }
}

/// Subtable preference when resolving code points, best first.
const BEST_CMAP_ORDER: [Encoding; 8] = [
    Encoding::WINDOWS_FULL,
    Encoding::new(0, 6),
    Encoding::UNICODE_FULL,
    Encoding::WINDOWS_BMP,
    Encoding::UNICODE_BMP,
    Encoding::new(0, 2),
    Encoding::new(0, 1),
    Encoding::new(0, 0),
];

/// One character map subtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmapSubtable {
    pub encoding: Encoding,
    pub map: BTreeMap<u32, String>,
}

/// Variation selector → (base code point, glyph) sequences. `None` as glyph
/// means "whatever the base code point maps to" (a default variant).
pub type VariationSequences = BTreeMap<u32, Vec<(u32, Option<String>)>>;

/// A font as seen by the rule engine.
#[derive(Debug, Clone)]
pub struct Font {
    /// Name used in log and error messages.
    pub name: String,
    pub units_per_em: u16,
    /// The authoritative list of glyph identities.
    pub glyph_order: Vec<String>,
    pub cmap: Vec<CmapSubtable>,
    pub variation_sequences: Option<VariationSequences>,
    glyphs: HashMap<String, Glyph>,
    metrics: HashMap<String, Metric>,
    modified: BTreeSet<String>,
}

impl Font {
    pub fn new(name: impl Into<String>, units_per_em: u16) -> Self {
        Font {
            name: name.into(),
            units_per_em,
            glyph_order: Vec::new(),
            cmap: Vec::new(),
            variation_sequences: None,
            glyphs: HashMap::new(),
            metrics: HashMap::new(),
            modified: BTreeSet::new(),
        }
    }

    /// Adds a glyph while building the font from its file.
    pub fn add_glyph(&mut self, name: impl Into<String>, glyph: Glyph, metric: Metric) {
        let name = name.into();
        self.insert(name, glyph, metric);
    }

    /// Stores a glyph produced by a rule, appending it to the glyph order
    /// unless a glyph of that name already exists.
    pub fn set_glyph(&mut self, name: &str, glyph: Glyph, metric: Metric) {
        self.modified.insert(name.to_string());
        self.insert(name.to_string(), glyph, metric);
    }

    fn insert(&mut self, name: String, glyph: Glyph, metric: Metric) {
        if !self.glyphs.contains_key(&name) {
            self.glyph_order.push(name.clone());
        }
        self.metrics.insert(name.clone(), metric);
        self.glyphs.insert(name, glyph);
    }

    pub fn glyph(&self, name: &str) -> Option<&Glyph> {
        self.glyphs.get(name)
    }

    pub fn metric(&self, name: &str) -> Option<Metric> {
        self.metrics.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.glyphs.contains_key(name)
    }

    /// Glyphs written by rules, in name order.
    pub fn modified_glyphs(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// The subtable used to resolve code points: full-repertoire Unicode
    /// subtables first, then BMP ones, then whatever comes first.
    pub fn best_cmap(&self) -> Option<&CmapSubtable> {
        BEST_CMAP_ORDER
            .iter()
            .find_map(|encoding| self.cmap.iter().find(|sub| sub.encoding == *encoding))
            .or_else(|| self.cmap.first())
    }

    /// The glyph a code point maps to in the best subtable.
    pub fn lookup(&self, codepoint: u32) -> Option<&str> {
        self.best_cmap()
            .and_then(|sub| sub.map.get(&codepoint))
            .map(String::as_str)
    }

    /// Maps `codepoint` to `glyph` in every subtable able to hold it, adding
    /// full-repertoire subtables when a code point beyond the BMP has nowhere
    /// to go.
    pub fn map_codepoint(&mut self, codepoint: u32, glyph: &str) {
        if !self.cmap.iter().any(|sub| sub.encoding.covers(codepoint)) {
            let seed = self
                .best_cmap()
                .map(|sub| sub.map.clone())
                .unwrap_or_default();
            let added: Vec<CmapSubtable> = default_encodings(codepoint > MAX_BMP_CODEPOINT)
                .into_iter()
                .filter(|encoding| encoding.covers(codepoint))
                .filter(|encoding| !self.cmap.iter().any(|sub| sub.encoding == *encoding))
                .map(|encoding| CmapSubtable {
                    encoding,
                    map: seed.clone(),
                })
                .collect();
            self.cmap.extend(added);
            self.cmap.sort_by_key(|sub| sub.encoding);
        }
        for sub in self.cmap.iter_mut() {
            if sub.encoding.covers(codepoint) {
                sub.map.insert(codepoint, glyph.to_string());
            }
        }
    }

    /// Replaces all subtables with the default set for a character map: the
    /// Unicode and Windows BMP encodings, plus their full-repertoire
    /// counterparts if any code point lies beyond the BMP.
    pub fn set_character_map(&mut self, map: BTreeMap<u32, String>) {
        let exceeds_bmp = map.keys().last().map_or(false, |&cp| cp > MAX_BMP_CODEPOINT);
        self.cmap = default_encodings(exceeds_bmp)
            .into_iter()
            .map(|encoding| CmapSubtable {
                encoding,
                map: if encoding.is_full_repertoire() {
                    map.clone()
                } else {
                    map.range(..=MAX_BMP_CODEPOINT)
                        .map(|(cp, name)| (*cp, name.clone()))
                        .collect()
                },
            })
            .collect();
    }

    /// Code points per glyph, merged over all subtables.
    pub fn codepoints_by_glyph(&self) -> BTreeMap<&str, BTreeSet<u32>> {
        let mut result: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
        for sub in &self.cmap {
            for (cp, name) in &sub.map {
                result.entry(name.as_str()).or_default().insert(*cp);
            }
        }
        result
    }
}

fn default_encodings(exceeds_bmp: bool) -> Vec<Encoding> {
    if exceeds_bmp {
        vec![
            Encoding::UNICODE_BMP,
            Encoding::UNICODE_FULL,
            Encoding::WINDOWS_BMP,
            Encoding::WINDOWS_FULL,
        ]
    } else {
        vec![Encoding::UNICODE_BMP, Encoding::WINDOWS_BMP]
    }
}

/// All fonts of a run, keyed by their logical id.
///
/// Sources and the destination are looked up here on every access, so a
/// font acting as both sees its own earlier edits.
#[derive(Debug, Default)]
pub struct FontStore {
    fonts: HashMap<String, Font>,
}

impl FontStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, font: Font) {
        self.fonts.insert(id.into(), font);
    }

    pub fn get(&self, id: &str) -> Option<&Font> {
        self.fonts.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Font> {
        self.fonts.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Font> {
        self.fonts.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fonts.contains_key(id)
    }
}
