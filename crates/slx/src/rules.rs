//! ⚖️ Row rules: the judge, the jury, and the per-row verdict.
//!
//! 🎬 *[a row walks into a courtroom. it has three fields and a nervous smile.]*
//!
//! A `RowRule` looks at one row and says `Ok(())` or `Err(why)`. That's it.
//! The processor does the bookkeeping; the rule just judges. Rules are
//! injected, never hard-coded, so they can be swapped and tested alone.
//!
//! 🧠 Knowledge graph:
//! - Any `Fn(&Row) -> anyhow::Result<()>` is a rule. Closures welcome.
//! - Built-ins: `AcceptAll`, `RejectAll`, `RequireColumns`.
//! - `RuleConfig` picks a built-in from TOML / env and builds it behind an `Arc`.
//! - Rules run sequentially in input order. A rule with side effects is allowed
//!   but you signed up for whatever happens.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::common::Row;

/// ⚖️ Judge one row. `Err` marks the row as failed; the run keeps going.
pub trait RowRule: Send + Sync {
    fn apply(&self, row: &Row) -> Result<()>;
}

impl<F> RowRule for F
where
    F: Fn(&Row) -> Result<()> + Send + Sync,
{
    fn apply(&self, row: &Row) -> Result<()> {
        self(row)
    }
}

/// ✅ Every row passes. The participation trophy of rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RowRule for AcceptAll {
    fn apply(&self, _row: &Row) -> Result<()> {
        Ok(())
    }
}

/// 💀 Every row fails. Useful for dry-running the errors/ side-report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl RowRule for RejectAll {
    fn apply(&self, _row: &Row) -> Result<()> {
        bail!("🚫 rejected: this rule rejects every row")
    }
}

/// 📋 A row passes only when each listed column is present and not blank.
#[derive(Debug, Clone, Default)]
pub struct RequireColumns {
    columns: Vec<String>,
}

impl RequireColumns {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl RowRule for RequireColumns {
    fn apply(&self, row: &Row) -> Result<()> {
        for column in &self.columns {
            match row.get(column) {
                None => bail!("📋 column '{}' is missing", column),
                Some(value) if value.trim().is_empty() => bail!("📋 column '{}' is blank", column),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// 🎛️ Which built-in rule to run, as spelled in config.
///
/// ```toml
/// rule = "RejectAll"
///
/// [rule.RequireColumns]
/// columns = ["model", "year"]
/// ```
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub enum RuleConfig {
    #[default]
    AcceptAll,
    RejectAll,
    RequireColumns { columns: Vec<String> },
}

impl RuleConfig {
    pub fn build(&self) -> Arc<dyn RowRule> {
        match self {
            RuleConfig::AcceptAll => Arc::new(AcceptAll),
            RuleConfig::RejectAll => Arc::new(RejectAll),
            RuleConfig::RequireColumns { columns } => Arc::new(RequireColumns::new(columns.clone())),
        }
    }
}
