//! Modification rules and the two file formats they are read from.
//!
//! JSON rule lists are an array of records:
//!
//! ```json
//! [
//!   { "char": "A", "font": "latin" },
//!   { "char": "0x6F22", "glyph": "uni6F22.jp", "font": "cjk", "selector": "U+E0100" },
//!   { "char": "A", "glyph": "A.alt", "contours": [
//!       { "font": "latin", "char": "A", "indices": [0] },
//!       { "font": "base", "char": "O", "indices": [1] }
//!   ] }
//! ]
//! ```
//!
//! Any other file is read as the tab-separated legacy format, one Replace
//! rule per line: `dest<TAB>font[<TAB>source[<TAB>selector]]`.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::charspec::{is_variation_selector, CharSpec};
use crate::error::{RuleShapeError, RulesError, ShapeProblem};

/// Copy one glyph into the destination font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceRule {
    pub target: CharSpec,
    /// Glyph name to write to; defaults to the glyph `target` maps to.
    pub glyph: Option<String>,
    /// Defaults to `target`.
    pub source: Option<CharSpec>,
    /// Source font id; defaults to the destination font.
    pub font: Option<String>,
    pub selector: Option<u32>,
}

/// Contours taken from one source glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContourSource {
    pub font: String,
    pub source: CharSpec,
    /// Contour indices in the order they are appended. Never contains duplicates.
    pub contours: Vec<usize>,
}

/// Build a new glyph from contours of one or more source glyphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRule {
    pub target: CharSpec,
    pub glyph: String,
    pub parts: Vec<ContourSource>,
    pub selector: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModificationRule {
    Replace(ReplaceRule),
    Compose(ComposeRule),
}

impl ModificationRule {
    pub fn target(&self) -> &CharSpec {
        match self {
            ModificationRule::Replace(rule) => &rule.target,
            ModificationRule::Compose(rule) => &rule.target,
        }
    }

    pub fn selector(&self) -> Option<u32> {
        match self {
            ModificationRule::Replace(rule) => rule.selector,
            ModificationRule::Compose(rule) => rule.selector,
        }
    }
}

impl fmt::Display for ModificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationRule::Replace(rule) => {
                write!(f, "{}", rule.target)?;
                if let Some(glyph) = &rule.glyph {
                    write!(f, " as `{}`", glyph)?;
                }
                write!(
                    f,
                    " <- {}:{}",
                    rule.font.as_deref().unwrap_or("<base>"),
                    rule.source.as_ref().unwrap_or(&rule.target)
                )?;
            }
            ModificationRule::Compose(rule) => {
                write!(f, "{} as `{}` <-", rule.target, rule.glyph)?;
                for part in &rule.parts {
                    write!(f, " {}:{}{:?}", part.font, part.source, part.contours)?;
                }
            }
        }
        if let Some(selector) = self.selector() {
            write!(f, " (selector U+{:04X})", selector)?;
        }
        Ok(())
    }
}

/// A rule together with its 1-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedRule {
    pub number: usize,
    pub rule: ModificationRule,
}

/// The outcome of reading a rule list: well-formed rules in order, plus the
/// records that were rejected.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RuleList {
    pub rules: Vec<NumberedRule>,
    pub rejected: Vec<RuleShapeError>,
}

impl RuleList {
    fn push(&mut self, number: usize, raw: String, parsed: Result<ModificationRule, ShapeProblem>) {
        match parsed {
            Ok(rule) => self.rules.push(NumberedRule { number, rule }),
            Err(problem) => {
                let error = RuleShapeError {
                    number,
                    raw,
                    problem,
                };
                log::error!("{}", error);
                self.rejected.push(error);
            }
        }
    }
}

/// Reads a rule list, choosing the format by file extension.
pub fn load(path: &Path) -> Result<RuleList, RulesError> {
    let text = fs::read_to_string(path).map_err(|source| RulesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&text).map_err(|source| RulesError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        Ok(parse_tsv(&text))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(rename = "char")]
    target: String,
    glyph: Option<String>,
    source: Option<String>,
    font: Option<String>,
    selector: Option<String>,
    contours: Option<Vec<RawContourSource>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContourSource {
    font: String,
    #[serde(rename = "char")]
    source: String,
    indices: Vec<usize>,
}

/// Parses a JSON rule list. Only a document that is not an array fails as a
/// whole; bad records are collected in [`RuleList::rejected`].
pub fn parse_json(text: &str) -> Result<RuleList, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut list = RuleList::default();
    for (i, record) in records.into_iter().enumerate() {
        let raw = record.to_string();
        let parsed = serde_json::from_value::<RawRule>(record)
            .map_err(|e| ShapeProblem::Malformed(e.to_string()))
            .and_then(validate);
        list.push(i + 1, raw, parsed);
    }
    Ok(list)
}

fn validate(raw: RawRule) -> Result<ModificationRule, ShapeProblem> {
    let target = parse_spec(&raw.target)?;
    let selector = raw.selector.as_deref().map(parse_selector).transpose()?;

    match raw.contours {
        Some(contours) => {
            if raw.source.is_some() || raw.font.is_some() {
                return Err(ShapeProblem::Ambiguous);
            }
            let glyph = raw.glyph.ok_or(ShapeProblem::MissingGlyphName)?;
            if contours.is_empty() {
                return Err(ShapeProblem::NoContourSources);
            }
            let parts = contours
                .into_iter()
                .map(|part| {
                    let mut seen = HashSet::new();
                    if let Some(&index) = part.indices.iter().find(|&&i| !seen.insert(i)) {
                        return Err(ShapeProblem::DuplicateContour {
                            source: format!("{}:{}", part.font, part.source),
                            index,
                        });
                    }
                    Ok(ContourSource {
                        source: parse_spec(&part.source)?,
                        font: part.font,
                        contours: part.indices,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ModificationRule::Compose(ComposeRule {
                target,
                glyph,
                parts,
                selector,
            }))
        }
        None => {
            if raw.source.is_none() && raw.font.is_none() {
                return Err(ShapeProblem::NoSource);
            }
            Ok(ModificationRule::Replace(ReplaceRule {
                target,
                glyph: raw.glyph,
                source: raw.source.as_deref().map(parse_spec).transpose()?,
                font: raw.font,
                selector,
            }))
        }
    }
}

fn parse_spec(s: &str) -> Result<CharSpec, ShapeProblem> {
    s.parse().map_err(ShapeProblem::InvalidSpecifier)
}

fn parse_selector(s: &str) -> Result<u32, ShapeProblem> {
    match parse_spec(s)? {
        CharSpec::Codepoint(cp) if is_variation_selector(cp) => Ok(cp),
        _ => Err(ShapeProblem::NotASelector(s.to_string())),
    }
}

/// Parses the tab-separated format. Line numbers are used as rule numbers.
pub fn parse_tsv(text: &str) -> RuleList {
    let mut list = RuleList::default();
    for (i, line) in text.lines().enumerate() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let parsed = match fields.as_slice() {
            [target, font, rest @ ..] if rest.len() <= 2 => validate(RawRule {
                target: target.to_string(),
                glyph: None,
                source: rest.first().map(|s| s.to_string()),
                font: Some(font.to_string()),
                selector: rest.get(1).map(|s| s.to_string()),
                contours: None,
            }),
            _ => Err(ShapeProblem::Malformed(format!(
                "expected 2 to 4 tab-separated fields, found {}",
                fields.len()
            ))),
        };
        list.push(i + 1, fields.join("\t"), parsed);
    }
    list
}

/// Cuts a line at the first `#` that starts the line or follows whitespace.
fn strip_comment(line: &str) -> &str {
    let mut prev_is_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && prev_is_space {
            return &line[..i];
        }
        prev_is_space = c.is_whitespace();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_rows() {
        let text = "# header comment\n\
                    A\tlatin\n\
                    \n\
                    B\tlatin\tU+0062 # trailing comment\n\
                    漢\tcjk\t0x6F22\tU+E0100\n";
        let list = parse_tsv(text);
        assert!(list.rejected.is_empty());
        assert_eq!(list.rules.len(), 3);
        assert_eq!(list.rules[0].number, 2);
        assert_eq!(
            list.rules[0].rule,
            ModificationRule::Replace(ReplaceRule {
                target: CharSpec::Codepoint(0x41),
                glyph: None,
                source: None,
                font: Some("latin".into()),
                selector: None,
            })
        );
        assert_eq!(list.rules[1].number, 4);
        match &list.rules[2].rule {
            ModificationRule::Replace(rule) => {
                assert_eq!(rule.source, Some(CharSpec::Codepoint(0x6F22)));
                assert_eq!(rule.selector, Some(0xE0100));
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn tsv_bad_rows_are_skipped() {
        let list = parse_tsv("A\n0xZZ\tlatin\nB\tlatin\nC\ta\tb\tc\td\n");
        assert_eq!(list.rules.len(), 1);
        assert_eq!(list.rules[0].number, 3);
        assert_eq!(list.rejected.len(), 3);
        assert_eq!(list.rejected[0].number, 1);
        assert_eq!(list.rejected[0].raw, "A");
        assert!(matches!(
            list.rejected[1].problem,
            ShapeProblem::InvalidSpecifier(_)
        ));
    }

    #[test]
    fn hash_inside_a_field_is_kept() {
        assert_eq!(strip_comment("A\tfont#1"), "A\tfont#1");
        assert_eq!(strip_comment("A\tfont #1"), "A\tfont ");
        assert_eq!(strip_comment("#A"), "");
    }

    #[test]
    fn json_compose() {
        let text = r#"[
            { "char": "A", "glyph": "A.alt", "selector": "U+FE00",
              "contours": [ { "font": "src", "char": "X", "indices": [1, 0] },
                            { "font": "base", "char": "O.sc", "indices": [] } ] }
        ]"#;
        let list = parse_json(text).unwrap();
        assert!(list.rejected.is_empty());
        assert_eq!(
            list.rules[0].rule,
            ModificationRule::Compose(ComposeRule {
                target: CharSpec::Codepoint(0x41),
                glyph: "A.alt".into(),
                parts: vec![
                    ContourSource {
                        font: "src".into(),
                        source: CharSpec::Codepoint(0x58),
                        contours: vec![1, 0],
                    },
                    ContourSource {
                        font: "base".into(),
                        source: CharSpec::GlyphName("O.sc".into()),
                        contours: vec![],
                    },
                ],
                selector: Some(0xFE00),
            })
        );
    }

    #[test]
    fn json_shape_errors() {
        let text = r#"[
            { "char": "A" },
            { "char": "A", "font": "x", "contours": [ { "font": "x", "char": "A", "indices": [0] } ] },
            { "char": "A", "contours": [ { "font": "x", "char": "A", "indices": [0] } ] },
            { "char": "A", "glyph": "A.alt", "contours": [ { "font": "x", "char": "A", "indices": [0, 2, 0] } ] },
            { "char": "A", "glyph": "A.alt", "contours": [] },
            { "char": "A", "font": "x", "selector": "B" },
            { "char": "A", "font": "x", "colour": "red" },
            { "char": "A", "glyph": "A.x", "font": "x" }
        ]"#;
        let list = parse_json(text).unwrap();
        let problems: Vec<_> = list.rejected.iter().map(|e| e.problem.clone()).collect();
        assert_eq!(problems[0], ShapeProblem::NoSource);
        assert_eq!(problems[1], ShapeProblem::Ambiguous);
        assert_eq!(problems[2], ShapeProblem::MissingGlyphName);
        assert_eq!(
            problems[3],
            ShapeProblem::DuplicateContour {
                source: "x:A".into(),
                index: 0
            }
        );
        assert_eq!(problems[4], ShapeProblem::NoContourSources);
        assert_eq!(problems[5], ShapeProblem::NotASelector("B".into()));
        assert!(matches!(problems[6], ShapeProblem::Malformed(_)));
        assert_eq!(list.rules.len(), 1);
        assert_eq!(list.rules[0].number, 8);
    }

    #[test]
    fn json_must_be_an_array() {
        assert!(parse_json(r#"{ "char": "A" }"#).is_err());
    }

    #[test]
    fn display_names_the_sources() {
        let rule = parse_tsv("A\tlatin\tU+0062\n").rules.remove(0).rule;
        assert_eq!(rule.to_string(), "U+0041 <- latin:U+0062");
    }
}
