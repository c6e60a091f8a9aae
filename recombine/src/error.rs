//! Errors raised while loading inputs and applying rules.

use std::fmt;
use std::path::PathBuf;

/// A character specifier could not be turned into a code point or glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The specifier is an empty string.
    Empty,
    /// A `0x`/`U+`-style specifier does not name a Unicode scalar value.
    InvalidCodepoint(String),
    /// The code point is absent from the font's best character map.
    Unmapped { codepoint: u32, font: String },
    /// The glyph name is not part of the font's glyph order.
    MissingGlyph { glyph: String, font: String },
    /// No font is loaded under this id.
    UnknownFont(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty character specifier"),
            Self::InvalidCodepoint(spec) => write!(f, "`{}` is not a valid code point", spec),
            Self::Unmapped { codepoint, font } => {
                write!(f, "U+{:04X} is not mapped in font `{}`", codepoint, font)
            }
            Self::MissingGlyph { glyph, font } => {
                write!(f, "glyph `{}` does not exist in font `{}`", glyph, font)
            }
            Self::UnknownFont(id) => write!(f, "no input font with id `{}`", id),
        }
    }
}

impl std::error::Error for ResolveError {}

/// A contour index past the end of a glyph's contour list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourIndexError {
    pub index: usize,
    pub count: usize,
}

impl fmt::Display for ContourIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contour index {} out of range (glyph has {} contours)",
            self.index, self.count
        )
    }
}

impl std::error::Error for ContourIndexError {}

/// Failure while executing a single, well-formed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    Resolve(ResolveError),
    Contour {
        font: String,
        glyph: String,
        source: ContourIndexError,
    },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(e) => write!(f, "{}", e),
            Self::Contour {
                font,
                glyph,
                source,
            } => write!(f, "glyph `{}` in font `{}`: {}", glyph, font, source),
        }
    }
}

// The message already includes the cause.
impl std::error::Error for ApplyError {}

impl From<ResolveError> for ApplyError {
    fn from(e: ResolveError) -> Self {
        ApplyError::Resolve(e)
    }
}

/// An [`ApplyError`] tagged with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError {
    /// 1-based position of the rule in its list (line number for TSV input).
    pub number: usize,
    /// Human-readable rendering of the rule.
    pub rule: String,
    pub source: ApplyError,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} ({}): {}", self.number, self.rule, self.source)
    }
}

impl std::error::Error for RuleError {}

/// Why a raw rule record is neither a Replace nor a Compose rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeProblem {
    /// The record could not be read at all (wrong field count, bad JSON shape).
    Malformed(String),
    /// Both a single source and a contour list are given.
    Ambiguous,
    /// Neither a source nor a contour list is given.
    NoSource,
    /// A Compose record without a destination glyph name.
    MissingGlyphName,
    /// A Compose record with an empty contour list.
    NoContourSources,
    /// The same contour is selected twice from one source glyph.
    DuplicateContour { source: String, index: usize },
    InvalidSpecifier(ResolveError),
    /// The selector is not a Unicode variation selector.
    NotASelector(String),
}

impl fmt::Display for ShapeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed rule: {}", reason),
            Self::Ambiguous => write!(f, "rule has both a source and a contour list"),
            Self::NoSource => write!(f, "rule has neither a source nor a contour list"),
            Self::MissingGlyphName => write!(f, "composed glyphs need an explicit glyph name"),
            Self::NoContourSources => write!(f, "contour list is empty"),
            Self::DuplicateContour { source, index } => {
                write!(f, "contour {} of `{}` is selected more than once", index, source)
            }
            Self::InvalidSpecifier(e) => write!(f, "{}", e),
            Self::NotASelector(spec) => write!(f, "`{}` is not a variation selector", spec),
        }
    }
}

/// A rule record rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleShapeError {
    pub number: usize,
    /// The record as it appeared in the input.
    pub raw: String,
    pub problem: ShapeProblem,
}

impl fmt::Display for RuleShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error in rule {}: {} [{}]", self.number, self.problem, self.raw)
    }
}

impl std::error::Error for RuleShapeError {}

/// Problems with the run configuration. All of them are fatal.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    MissingBase,
    UnknownBase(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, .. } => write!(f, "cannot read config {}", path.display()),
            Self::Parse { path, .. } => write!(f, "cannot parse config {}", path.display()),
            Self::MissingBase => write!(f, "missing base font"),
            Self::UnknownBase(id) => write!(f, "missing base font: `{}` is not an input", id),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::MissingBase | Self::UnknownBase(_) => None,
        }
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reading or writing font files.
#[derive(Debug)]
pub enum FontIoError {
    Load { path: PathBuf, source: BoxedSource },
    Save { path: PathBuf, source: BoxedSource },
    /// The designspace has no source matching the requested member.
    NoSuchMember { path: PathBuf, member: String },
    /// The designspace lists no sources at all.
    EmptyDesignspace(PathBuf),
    InvalidGlyphName { glyph: String, source: BoxedSource },
}

impl fmt::Display for FontIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { path, .. } => write!(f, "cannot load font {}", path.display()),
            Self::Save { path, .. } => write!(f, "cannot save font {}", path.display()),
            Self::NoSuchMember { path, member } => {
                write!(f, "{} has no font named `{}`", path.display(), member)
            }
            Self::EmptyDesignspace(path) => write!(f, "{} lists no sources", path.display()),
            Self::InvalidGlyphName { glyph, .. } => {
                write!(f, "`{}` cannot be used as a UFO glyph name", glyph)
            }
        }
    }
}

impl std::error::Error for FontIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load { source, .. }
            | Self::Save { source, .. }
            | Self::InvalidGlyphName { source, .. } => Some(source.as_ref()),
            Self::NoSuchMember { .. } | Self::EmptyDesignspace(_) => None,
        }
    }
}

/// Failure to read a rule list file as a whole.
#[derive(Debug)]
pub enum RulesError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The JSON document is not an array of records.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for RulesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, .. } => write!(f, "cannot read rule list {}", path.display()),
            Self::Json { path, .. } => {
                write!(f, "rule list {} is not a JSON array", path.display())
            }
        }
    }
}

impl std::error::Error for RulesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

/// Any error that ends a run.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    FontIo(FontIoError),
    Rules(RulesError),
    /// A rule failed while running in strict mode.
    Rule(RuleError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::FontIo(e) => write!(f, "{}", e),
            Self::Rules(e) => write!(f, "{}", e),
            Self::Rule(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => e.source(),
            Self::FontIo(e) => e.source(),
            Self::Rules(e) => e.source(),
            Self::Rule(e) => e.source(),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<FontIoError> for Error {
    fn from(e: FontIoError) -> Self {
        Error::FontIo(e)
    }
}

impl From<RulesError> for Error {
    fn from(e: RulesError) -> Self {
        Error::Rules(e)
    }
}

impl From<RuleError> for Error {
    fn from(e: RuleError) -> Self {
        Error::Rule(e)
    }
}
