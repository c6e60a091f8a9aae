//! Running a rule list against the configured fonts.

use rayon::prelude::*;

use crate::compose::{self, Applied};
use crate::config::RunConfig;
use crate::error::{Error, FontIoError, RuleError, RuleShapeError};
use crate::font::FontStore;
use crate::rules::{ModificationRule, NumberedRule, RuleList};
use crate::ufo;

/// What happened to each rule of a run.
#[derive(Debug, Default)]
pub struct Report {
    /// Rule number and result of every rule that was applied.
    pub applied: Vec<(usize, Applied)>,
    /// Well-formed rules that could not be applied.
    pub failed: Vec<RuleError>,
    /// Records that were not rules at all.
    pub rejected: Vec<RuleShapeError>,
}

impl Report {
    pub fn skipped(&self) -> usize {
        self.failed.len() + self.rejected.len()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped() == 0
    }
}

/// The loaded inputs of a run: every font by id, and the UFO backing the base
/// font, which the result is written into.
pub struct Inputs {
    pub store: FontStore,
    pub base_ufo: norad::Font,
}

/// Loads all input fonts of `config` in parallel.
pub fn load_inputs(config: &RunConfig) -> Result<Inputs, FontIoError> {
    let loaded = config
        .inputs
        .par_iter()
        .map(|(id, input)| {
            let (font, ufo) = ufo::load(id, input.path(), input.member())?;
            Ok::<_, FontIoError>((id.clone(), font, ufo))
        })
        .collect::<Result<Vec<_>, FontIoError>>()?;

    let mut store = FontStore::new();
    let mut base_ufo = None;
    for (id, font, ufo) in loaded {
        if id == config.base {
            base_ufo = Some(ufo);
        }
        store.insert(id, font);
    }
    // RunConfig guarantees the base is one of the inputs.
    let base_ufo = base_ufo.unwrap_or_else(norad::Font::new);
    Ok(Inputs { store, base_ufo })
}

/// Applies `rules` to font `dest` in order.
///
/// A rule that fails is logged and skipped, unless `strict` is set, in which
/// case its error ends the run. Rules are not transactional: by the time one
/// fails, the glyphs it already wrote stay written.
pub fn apply_rules(
    store: &mut FontStore,
    dest: &str,
    rules: &[NumberedRule],
    strict: bool,
) -> Result<Report, RuleError> {
    let mut report = Report::default();
    for NumberedRule { number, rule } in rules {
        let result = match rule {
            ModificationRule::Replace(replace) => compose::apply_replace(store, dest, replace),
            ModificationRule::Compose(compose) => compose::apply_compose(store, dest, compose),
        };
        match result {
            Ok(applied) => report.applied.push((*number, applied)),
            Err(source) => {
                let error = RuleError {
                    number: *number,
                    rule: rule.to_string(),
                    source,
                };
                if strict {
                    return Err(error);
                }
                log::warn!("skipping {}", error);
                report.failed.push(error);
            }
        }
    }
    Ok(report)
}

/// Options of a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub strict: bool,
    /// Save the base font to the configured output.
    pub write: bool,
}

/// Loads the inputs, applies the rules and, if asked to, saves the result.
pub fn run(config: &RunConfig, rules: RuleList, options: RunOptions) -> Result<Report, Error> {
    let Inputs {
        mut store,
        base_ufo,
    } = load_inputs(config)?;

    let mut report = apply_rules(&mut store, &config.base, &rules.rules, options.strict)?;
    report.rejected = rules.rejected;

    if options.write {
        if let Some(base) = store.get(&config.base) {
            ufo::save(base, base_ufo, &config.metadata, &config.output)?;
        }
    }
    Ok(report)
}
