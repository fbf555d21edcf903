//! Cholesky correlation of factor draws.
//!
//! At finish the process assembles the correlation matrix of its factors
//! (once, or once per grid step for time-dependent models) and factorises
//! it. In each block it replaces the independent draws `z` of its factors
//! by `L·z`, step by step. It must run before any generator reading those
//! draws.

use super::not_finished;
use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane};
use pricer_core::market_data::{
    resolve_correlation, CorrelationSource, MarketDataError, PromptDecayCorrelation,
};
use pricer_core::math::{CholeskyFactor, CorrelationMatrix};
use pricer_core::types::Date;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Where pairwise correlations come from.
#[derive(Clone)]
pub enum CorrelationModel {
    /// One matrix for every step.
    Static(Arc<dyn CorrelationSource>),
    /// One matrix per step, read at the step time.
    TermStructure(Arc<dyn CorrelationSource>),
    /// `exp(−λΔt²)` of the distance between prompt dates, each prompt
    /// floored at the step date.
    PromptDecay {
        /// Decay function.
        decay: PromptDecayCorrelation,
        /// Prompt date per factor name.
        prompts: BTreeMap<String, Date>,
    },
}

impl fmt::Debug for CorrelationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationModel::Static(_) => f.write_str("Static"),
            CorrelationModel::TermStructure(_) => f.write_str("TermStructure"),
            CorrelationModel::PromptDecay { decay, prompts } => f
                .debug_struct("PromptDecay")
                .field("decay", decay)
                .field("prompts", prompts)
                .finish(),
        }
    }
}

/// Correlation injector over a named set of factors.
///
/// ```
/// use pricer_core::market_data::CorrelationTable;
/// use pricer_mc::process::{CorrelationModel, CorrelationProcess};
/// use std::sync::Arc;
///
/// let table = CorrelationTable::new().with("WTI", "BRENT", 0.9);
/// let process = CorrelationProcess::new(
///     "oil",
///     vec!["WTI".to_string(), "BRENT".to_string()],
///     CorrelationModel::Static(Arc::new(table)),
/// );
/// assert!(!process.is_complete());
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationProcess {
    name: String,
    factors: Vec<String>,
    model: CorrelationModel,
    dims: Vec<usize>,
    decompositions: Vec<CholeskyFactor<f64>>,
    step_decomposition: Vec<usize>,
    complete: bool,
}

impl CorrelationProcess {
    /// Injector for `factors`.
    pub fn new(name: &str, factors: Vec<String>, model: CorrelationModel) -> Self {
        Self {
            name: name.to_string(),
            factors,
            model,
            dims: Vec::new(),
            decompositions: Vec::new(),
            step_decomposition: Vec::new(),
            complete: false,
        }
    }

    /// Label of the correlation set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Correlated factor names.
    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    /// Cholesky factor used at `step`.
    pub fn decomposition(&self, step: usize) -> Option<&CholeskyFactor<f64>> {
        self.step_decomposition
            .get(step)
            .map(|&k| &self.decompositions[k])
    }

    /// Number of distinct decompositions.
    pub fn n_decompositions(&self) -> usize {
        self.decompositions.len()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        for factor in &self.factors {
            ctx.add_dimension(factor)?;
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.complete {
            return Ok(());
        }
        self.dims = self
            .factors
            .iter()
            .map(|f| ctx.dimension(f))
            .collect::<SimulationResult<_>>()?;

        let grid = ctx.grid();
        let n_steps = grid.len();
        self.decompositions.clear();
        self.step_decomposition = Vec::with_capacity(n_steps);

        match &self.model {
            CorrelationModel::Static(source) => {
                let matrix = self.matrix(|a, b| resolve_correlation(source.as_ref(), a, b, 0.0))?;
                self.decompositions.push(matrix.cholesky()?);
                self.step_decomposition = vec![0; n_steps];
            }
            CorrelationModel::TermStructure(source) => {
                let mut previous: Option<CorrelationMatrix<f64>> = None;
                for i in 0..n_steps {
                    let t = grid.time(i).max(0.0);
                    let matrix =
                        self.matrix(|a, b| resolve_correlation(source.as_ref(), a, b, t))?;
                    if previous.as_ref() != Some(&matrix) {
                        self.decompositions.push(matrix.cholesky()?);
                        previous = Some(matrix);
                    }
                    self.step_decomposition.push(self.decompositions.len() - 1);
                }
            }
            CorrelationModel::PromptDecay { decay, prompts } => {
                let mut prompt_dates = Vec::with_capacity(self.factors.len());
                for factor in &self.factors {
                    let prompt = prompts.get(factor).copied().ok_or_else(|| {
                        SimulationError::InvalidConfig(format!("no prompt date for {}", factor))
                    })?;
                    prompt_dates.push(prompt);
                }
                let day_count = ctx.day_count();
                let mut previous: Option<CorrelationMatrix<f64>> = None;
                for &date in grid.dates() {
                    let n = self.factors.len();
                    let mut data = vec![1.0; n * n];
                    for a in 0..n {
                        for b in (a + 1)..n {
                            let pa = prompt_dates[a].max(date);
                            let pb = prompt_dates[b].max(date);
                            let rho = decay.correlation(day_count.year_fraction(pa, pb).abs());
                            data[a * n + b] = rho;
                            data[b * n + a] = rho;
                        }
                    }
                    let matrix = CorrelationMatrix::new(&data, n)?;
                    if previous.as_ref() != Some(&matrix) {
                        self.decompositions.push(matrix.cholesky()?);
                        previous = Some(matrix);
                    }
                    self.step_decomposition.push(self.decompositions.len() - 1);
                }
            }
        }

        debug!(
            name = %self.name,
            factors = self.factors.len(),
            decompositions = self.decompositions.len(),
            "correlation process finished"
        );
        self.complete = true;
        Ok(())
    }

    fn matrix<F>(&self, rho: F) -> SimulationResult<CorrelationMatrix<f64>>
    where
        F: Fn(&str, &str) -> Result<f64, MarketDataError>,
    {
        let n = self.factors.len();
        let mut data = vec![1.0; n * n];
        for a in 0..n {
            for b in (a + 1)..n {
                let value = rho(&self.factors[a], &self.factors[b])?;
                data[a * n + b] = value;
                data[b * n + a] = value;
            }
        }
        Ok(CorrelationMatrix::new(&data, n)?)
    }

    pub(crate) fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        if !self.complete {
            return Err(not_finished(&self.name));
        }
        let n = self.dims.len();
        let mut z: Vec<Lane> = vec![splat(0.0); n];
        for batch in 0..block.n_batches() {
            for step in 0..block.n_steps() {
                let l = &self.decompositions[self.step_decomposition[step]];
                for (k, &dim) in self.dims.iter().enumerate() {
                    z[k] = block.draws(dim, batch)[step];
                }
                for (i, &dim) in self.dims.iter().enumerate() {
                    let mut w = splat(0.0);
                    for (j, &l_ij) in l.row(i).iter().enumerate() {
                        w = w + splat(l_ij) * z[j];
                    }
                    block.draws_mut(dim, batch)[step] = w;
                }
            }
        }
        Ok(())
    }
}
