//! Category and granularity dispatch.
//!
//! Requests name a category (or all of them) and a granularity (or all of
//! them). Both are closed enums; the metric table behind them is validated
//! once at construction so a bad combination can never reach computation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use score_model::{PerformanceTrack, Score};

use crate::categories::{self, MetricDef};
use crate::context::AnalysisContext;
use crate::error::{InvalidRequestError, TableError};
use crate::filter::InstrumentFilter;
use crate::value::MetricResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Instrumental,
    Melodic,
    Rhythmic,
    Harmonic,
    Textural,
    Formal,
    Interaction,
    Comparative,
    Differentiating,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Self::Instrumental,
        Self::Melodic,
        Self::Rhythmic,
        Self::Harmonic,
        Self::Textural,
        Self::Formal,
        Self::Interaction,
        Self::Comparative,
        Self::Differentiating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instrumental => "instrumental",
            Self::Melodic => "melodic",
            Self::Rhythmic => "rhythmic",
            Self::Harmonic => "harmonic",
            Self::Textural => "textural",
            Self::Formal => "formal",
            Self::Interaction => "interaction",
            Self::Comparative => "comparative",
            Self::Differentiating => "differentiating",
        }
    }

    pub fn metrics(&self, granularity: Granularity) -> &'static [MetricDef] {
        categories::table(*self, granularity)
    }

    /// Run this category's metrics at one granularity over a context.
    pub fn compute(&self, ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
        use categories::{
            comparative, differentiating, formal, harmonic, instrumental, interaction, melodic,
            rhythmic, textural,
        };
        match self {
            Self::Instrumental => instrumental::compute(ctx, granularity),
            Self::Melodic => melodic::compute(ctx, granularity),
            Self::Rhythmic => rhythmic::compute(ctx, granularity),
            Self::Harmonic => harmonic::compute(ctx, granularity),
            Self::Textural => textural::compute(ctx, granularity),
            Self::Formal => formal::compute(ctx, granularity),
            Self::Interaction => interaction::compute(ctx, granularity),
            Self::Comparative => comparative::compute(ctx, granularity),
            Self::Differentiating => differentiating::compute(ctx, granularity),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = InvalidRequestError;

    /// Accepts English names and the Spanish names used by older clients.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instrumental" => Ok(Self::Instrumental),
            "melodic" | "melodica" => Ok(Self::Melodic),
            "rhythmic" | "ritmica" => Ok(Self::Rhythmic),
            "harmonic" | "armonica" => Ok(Self::Harmonic),
            "textural" => Ok(Self::Textural),
            "formal" => Ok(Self::Formal),
            "interaction" | "interaccion" => Ok(Self::Interaction),
            "comparative" | "comparativa" | "comparativas" => Ok(Self::Comparative),
            "differentiating" | "diferenciadoras" => Ok(Self::Differentiating),
            _ => Err(InvalidRequestError::UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Global,
    Aggregate,
    PerMeasure,
}

impl Granularity {
    /// Evaluation order for "all"; later modes win name collisions.
    pub const ALL: [Granularity; 3] = [Self::Global, Self::Aggregate, Self::PerMeasure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Aggregate => "aggregate",
            Self::PerMeasure => "per_measure",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = InvalidRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "aggregate" | "mixed" | "mixtas" => Ok(Self::Aggregate),
            "per_measure" | "per-measure" | "measures" | "compases" => Ok(Self::PerMeasure),
            _ => Err(InvalidRequestError::UnknownMode(s.to_string())),
        }
    }
}

/// One category or every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategorySelector {
    One(Category),
    All,
}

impl CategorySelector {
    pub fn categories(&self) -> Vec<Category> {
        match self {
            Self::One(c) => vec![*c],
            Self::All => Category::ALL.to_vec(),
        }
    }
}

impl FromStr for CategorySelector {
    type Err = InvalidRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todas" => Ok(Self::All),
            _ => s.parse().map(Self::One),
        }
    }
}

impl TryFrom<String> for CategorySelector {
    type Error = InvalidRequestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CategorySelector> for String {
    fn from(selector: CategorySelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(c) => fmt::Display::fmt(c, f),
            Self::All => f.write_str("all"),
        }
    }
}

/// One granularity or all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModeSelector {
    One(Granularity),
    All,
}

impl ModeSelector {
    pub fn granularities(&self) -> Vec<Granularity> {
        match self {
            Self::One(g) => vec![*g],
            Self::All => Granularity::ALL.to_vec(),
        }
    }
}

impl FromStr for ModeSelector {
    type Err = InvalidRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todas" => Ok(Self::All),
            _ => s.parse().map(Self::One),
        }
    }
}

impl TryFrom<String> for ModeSelector {
    type Error = InvalidRequestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ModeSelector> for String {
    fn from(selector: ModeSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for ModeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(g) => fmt::Display::fmt(g, f),
            Self::All => f.write_str("all"),
        }
    }
}

/// The full `(category, granularity) -> metrics` table, checked for
/// consistency when built.
#[derive(Debug, Clone)]
pub struct MetricTable {
    entries: BTreeMap<(Category, Granularity), &'static [MetricDef]>,
}

impl MetricTable {
    pub fn build() -> Result<Self, TableError> {
        let mut entries = BTreeMap::new();
        for granularity in Granularity::ALL {
            let mut owners: BTreeMap<&'static str, Category> = BTreeMap::new();
            for category in Category::ALL {
                let metrics = category.metrics(granularity);
                if metrics.is_empty() {
                    return Err(TableError::Empty {
                        category: category.as_str(),
                        granularity: granularity.as_str(),
                    });
                }

                let mut seen = BTreeSet::new();
                for metric in metrics {
                    if !seen.insert(metric.name) {
                        return Err(TableError::Duplicate {
                            name: metric.name,
                            category: category.as_str(),
                            granularity: granularity.as_str(),
                        });
                    }
                    if let Some(first) = owners.insert(metric.name, category) {
                        return Err(TableError::SharedAcrossCategories {
                            name: metric.name,
                            first: first.as_str(),
                            second: category.as_str(),
                            granularity: granularity.as_str(),
                        });
                    }
                }
                entries.insert((category, granularity), metrics);
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, category: Category, granularity: Granularity) -> &'static [MetricDef] {
        self.entries
            .get(&(category, granularity))
            .copied()
            .unwrap_or_default()
    }

    /// Every metric name a selector pair can produce.
    pub fn names(&self, category: CategorySelector, mode: ModeSelector) -> BTreeSet<&'static str> {
        let mut names = BTreeSet::new();
        for g in mode.granularities() {
            for c in category.categories() {
                names.extend(self.get(c, g).iter().map(|m| m.name));
            }
        }
        names
    }
}

/// Routes requests to category tables and merges the results.
#[derive(Debug, Clone)]
pub struct MetricOrchestrator {
    table: MetricTable,
}

impl MetricOrchestrator {
    pub fn new() -> Result<Self, TableError> {
        Ok(Self {
            table: MetricTable::build()?,
        })
    }

    pub fn table(&self) -> &MetricTable {
        &self.table
    }

    /// Compute the selected metrics over the filtered views.
    ///
    /// Granularities are evaluated in global, aggregate, per-measure order
    /// with every selected category inside each, so a name computed in
    /// several modes keeps the last mode's value.
    pub fn analyze(
        &self,
        score: &Score,
        performance: &PerformanceTrack,
        filter: &InstrumentFilter,
        category: CategorySelector,
        mode: ModeSelector,
    ) -> MetricResult {
        let ctx = AnalysisContext::filtered(score, performance, filter);
        let mut result = MetricResult::new();
        for granularity in mode.granularities() {
            for c in category.categories() {
                let metrics = self.table.get(c, granularity).len();
                debug!(category = %c, granularity = %granularity, metrics, "dispatching");
                result.merge(c.compute(&ctx, granularity));
            }
        }
        result
    }
}

/// Everything needed to analyze one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub file: String,
    #[serde(default)]
    pub instruments: InstrumentFilter,
    pub category: CategorySelector,
    pub mode: ModeSelector,
}

impl AnalysisRequest {
    /// Parse the textual selectors; unknown names are rejected here.
    pub fn parse(
        file: impl Into<String>,
        instruments: InstrumentFilter,
        category: &str,
        mode: &str,
    ) -> Result<Self, InvalidRequestError> {
        Ok(Self {
            file: file.into(),
            instruments,
            category: category.parse()?,
            mode: mode.parse()?,
        })
    }

    /// Cache key independent of the file: selectors plus normalized filter.
    pub fn request_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.category,
            self.mode,
            self.instruments.cache_key()
        )
    }
}
