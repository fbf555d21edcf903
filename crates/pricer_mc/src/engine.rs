//! Simulation orchestrator.
//!
//! # Overview
//!
//! [`Simulation`] drives one run end to end:
//! 1. `setup` of every process and payoff on the open context
//! 2. context freeze
//! 3. `finish` of every process and payoff
//! 4. regression training on an independent set of paths, if any payoff
//!    needs it
//! 5. block processing, in parallel on the rayon pool when configured
//! 6. aggregation into [`PayoffResults`] and expected exposures
//!
//! Each block draws from its own generator seeded from the run seed and the
//! block index, and writes to disjoint slices of the pre-sized result
//! arenas, so results do not depend on how blocks are scheduled.

use crate::block::PathBlock;
use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::payoff::{ExposureKey, ExposureLedger, Payoff, PayoffResults};
use crate::process::Process;
use crate::rng::PricerRng;
use pricer_core::types::Date;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Mixed into the seed of the regression training paths.
const TRAINING_SALT: u64 = 0x5EED_7A1A_0C0F_FEE5;

/// Slices of every payoff arena owned by one block.
type BlockSlices<'a> = Vec<(&'a mut [f64], &'a mut [i32])>;

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// The frozen context the run used.
    pub context: SimulationContext,
    /// One entry per payoff, in the order added.
    pub results: Vec<PayoffResults>,
    /// Expected monetary value per settlement currency and date.
    pub exposures: BTreeMap<ExposureKey, f64>,
}

impl SimulationOutput {
    /// Results of the payoff labelled `name`.
    pub fn result(&self, name: &str) -> Option<&PayoffResults> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Expected value settling in `currency` on `date`.
    pub fn exposure(&self, currency: &str, date: Date) -> Option<f64> {
        self.exposures.get(&ExposureKey::new(currency, date)).copied()
    }
}

/// A configured Monte Carlo run.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use pricer_core::market_data::{FlatForward, FlatVol};
/// use pricer_core::types::Date;
/// use pricer_mc::payoff::{EuropeanPayoff, OptionType, PayoffTerms};
/// use pricer_mc::process::{LognormalProcess, MarketInputs, Schedule};
/// use pricer_mc::{Simulation, SimulationConfig};
///
/// let today = Date::from_ymd(2025, 1, 1).unwrap();
/// let expiry = Date::from_ymd(2026, 1, 1).unwrap();
/// let config = SimulationConfig::builder().n_paths(4096).seed(7).build().unwrap();
///
/// let mut sim = Simulation::new(config, today);
/// let inputs = MarketInputs::new(Arc::new(FlatForward::new(100.0)), Arc::new(FlatVol::new(0.2)));
/// sim.add_process(LognormalProcess::new("BRENT", inputs, Schedule::new())).unwrap();
/// sim.add_payoff(EuropeanPayoff::new(
///     PayoffTerms::new("BRENT", expiry),
///     OptionType::Call,
///     100.0,
///     expiry,
/// ))
/// .unwrap();
///
/// let output = sim.run().unwrap();
/// let call = &output.results[0];
/// assert_eq!(call.len(), 4096);
/// assert!(call.mean() > 6.0 && call.mean() < 10.0);
/// ```
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    context: SimulationContext,
    processes: Vec<Process>,
    payoffs: Vec<Payoff>,
    prepared: bool,
}

impl Simulation {
    /// Empty run valued on `valuation_date`.
    pub fn new(config: SimulationConfig, valuation_date: Date) -> Self {
        let context = SimulationContext::new(valuation_date, config.day_count());
        Self {
            config,
            context,
            processes: Vec::new(),
            payoffs: Vec::new(),
            prepared: false,
        }
    }

    /// Run configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulation context; frozen once prepared.
    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    /// Appends a process. Processes run in the order added.
    ///
    /// # Errors
    /// `GridFrozen` once the run is prepared.
    pub fn add_process(&mut self, process: impl Into<Process>) -> SimulationResult<usize> {
        let process = process.into();
        if self.prepared {
            return Err(SimulationError::GridFrozen(format!("process {}", process.name())));
        }
        self.processes.push(process);
        Ok(self.processes.len() - 1)
    }

    /// Appends a payoff and returns its result index.
    ///
    /// # Errors
    /// `GridFrozen` once the run is prepared.
    pub fn add_payoff(&mut self, payoff: impl Into<Payoff>) -> SimulationResult<usize> {
        let payoff = payoff.into();
        if self.prepared {
            return Err(SimulationError::GridFrozen(format!("payoff {}", payoff.name())));
        }
        self.payoffs.push(payoff);
        Ok(self.payoffs.len() - 1)
    }

    /// Process at `index`.
    pub fn process(&self, index: usize) -> Option<&Process> {
        self.processes.get(index)
    }

    /// Payoff at `index`.
    pub fn payoff(&self, index: usize) -> Option<&Payoff> {
        self.payoffs.get(index)
    }

    /// Runs setup, freeze, finish and regression training. Idempotent.
    ///
    /// # Errors
    /// Any setup, finish or training failure; nothing is simulated then.
    pub fn prepare(&mut self) -> SimulationResult<()> {
        if self.prepared {
            return Ok(());
        }
        for process in &mut self.processes {
            process.setup(&mut self.context)?;
        }
        for payoff in &mut self.payoffs {
            payoff.setup(&mut self.context)?;
        }
        self.context.freeze();

        for process in &mut self.processes {
            process.finish(&self.context)?;
            debug!(process = process.name(), "process finished");
        }
        for payoff in &mut self.payoffs {
            payoff.finish(&self.context)?;
        }

        if self.payoffs.iter().any(Payoff::needs_training) {
            let blocks = self.training_blocks()?;
            for payoff in &mut self.payoffs {
                payoff.train(&blocks)?;
            }
        }
        self.prepared = true;
        Ok(())
    }

    fn training_blocks(&self) -> SimulationResult<Vec<PathBlock>> {
        let n_paths = self.config.training_paths();
        let block_size = self.config.block_size();
        let seed = self.config.seed() ^ TRAINING_SALT;
        info!(paths = n_paths, "simulating regression training paths");
        (0..n_paths.div_ceil(block_size))
            .map(|index| {
                let start = index * block_size;
                let len = block_size.min(n_paths - start);
                self.generate(seed, index, len, start)
            })
            .collect()
    }

    /// Paths in block `index`.
    fn block_len(&self, index: usize) -> usize {
        let start = index * self.config.block_size();
        self.config.block_size().min(self.config.n_paths().saturating_sub(start))
    }

    fn generate(
        &self,
        seed: u64,
        index: usize,
        n_paths: usize,
        global_path_index: usize,
    ) -> SimulationResult<PathBlock> {
        let mut block = PathBlock::new(
            n_paths,
            self.context.n_steps(),
            self.context.n_factors(),
            global_path_index,
        );
        PricerRng::for_block(seed, index).fill_normal_lanes(block.all_draws_mut());
        for process in &self.processes {
            process.process(&mut block)?;
        }
        Ok(block)
    }

    /// Factor paths of pricing block `index`, as the run would see them.
    ///
    /// # Errors
    /// `GridNotFrozen` before [`prepare`](Self::prepare); `InvalidConfig` for
    /// a block past the end of the run.
    pub fn simulate_block(&self, index: usize) -> SimulationResult<PathBlock> {
        if !self.prepared {
            return Err(SimulationError::GridNotFrozen);
        }
        if index >= self.config.n_blocks() {
            return Err(SimulationError::InvalidConfig(format!(
                "block {} of {}",
                index,
                self.config.n_blocks()
            )));
        }
        self.generate(
            self.config.seed(),
            index,
            self.block_len(index),
            index * self.config.block_size(),
        )
    }

    fn run_block(
        &self,
        index: usize,
        slices: BlockSlices<'_>,
        ledger: &ExposureLedger,
    ) -> SimulationResult<()> {
        let block = self.simulate_block(index)?;
        for (payoff, (values, exercise)) in self.payoffs.iter().zip(slices) {
            payoff.evaluate(&block, values, exercise)?;
            if payoff.is_monetary() {
                ledger.add(payoff.currency(), payoff.settlement_date(), values.iter().sum());
            }
        }
        Ok(())
    }

    /// Prepares if needed, then prices every block.
    ///
    /// # Errors
    /// The first failure of any phase; no partial results are returned.
    pub fn run(&mut self) -> SimulationResult<SimulationOutput> {
        self.prepare()?;
        let n_paths = self.config.n_paths();
        let block_size = self.config.block_size();
        let n_blocks = self.config.n_blocks();
        let started = Instant::now();
        info!(
            paths = n_paths,
            blocks = n_blocks,
            steps = self.context.n_steps(),
            factors = self.context.n_factors(),
            parallel = self.config.parallel(),
            "simulation started"
        );

        let mut arenas: Vec<(Vec<f64>, Vec<i32>)> = self
            .payoffs
            .iter()
            .map(|_| (vec![0.0; n_paths], vec![-1; n_paths]))
            .collect();
        let ledger = ExposureLedger::new(n_paths);

        {
            let mut per_block: Vec<BlockSlices<'_>> =
                (0..n_blocks).map(|_| Vec::with_capacity(arenas.len())).collect();
            for (values, exercise) in arenas.iter_mut() {
                let chunks = values
                    .chunks_mut(block_size)
                    .zip(exercise.chunks_mut(block_size));
                for (slices, chunk) in per_block.iter_mut().zip(chunks) {
                    slices.push(chunk);
                }
            }

            if self.config.parallel() {
                per_block
                    .into_par_iter()
                    .enumerate()
                    .try_for_each(|(index, slices)| self.run_block(index, slices, &ledger))?;
            } else {
                per_block
                    .into_iter()
                    .enumerate()
                    .try_for_each(|(index, slices)| self.run_block(index, slices, &ledger))?;
            }
        }

        let results: Vec<PayoffResults> = self
            .payoffs
            .iter()
            .zip(arenas)
            .map(|(payoff, (values, exercise))| {
                PayoffResults::new(
                    payoff.name(),
                    payoff.settlement_date(),
                    payoff.currency(),
                    values,
                    exercise,
                )
            })
            .collect();
        for r in &results {
            debug!(payoff = %r.name, mean = r.mean(), std_error = r.std_error(), "payoff aggregated");
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation finished"
        );

        Ok(SimulationOutput {
            context: self.context.clone(),
            results,
            exposures: ledger.expected(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payoff::{EuropeanPayoff, OptionType, PayoffTerms};
    use crate::process::{LognormalProcess, MarketInputs, Schedule};
    use pricer_core::market_data::{FlatForward, FlatVol};
    use std::sync::Arc;

    fn simulation(parallel: bool) -> Simulation {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let expiry = today.add_days(182);
        let config = SimulationConfig::builder()
            .n_paths(1000)
            .block_size(256)
            .seed(3)
            .parallel(parallel)
            .build()
            .unwrap();
        let mut sim = Simulation::new(config, today);
        let inputs = MarketInputs::new(Arc::new(FlatForward::new(50.0)), Arc::new(FlatVol::new(0.3)));
        sim.add_process(LognormalProcess::new("X", inputs, Schedule::new())).unwrap();
        sim.add_payoff(EuropeanPayoff::new(PayoffTerms::new("X", expiry), OptionType::Put, 50.0, expiry))
            .unwrap();
        sim
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = simulation(true).run().unwrap();
        let b = simulation(false).run().unwrap();
        assert_eq!(a.results[0].values, b.results[0].values);
        assert_eq!(a.results[0].len(), 1000);
        assert_eq!(a.results[0].exercise, b.results[0].exercise);
    }

    #[test]
    fn test_block_matches_arena_slice() {
        let mut sim = simulation(false);
        let output = sim.run().unwrap();
        let block = sim.simulate_block(3).unwrap();
        assert_eq!(block.n_paths(), 1000 - 3 * 256);
        assert_eq!(block.global_path_index(), 768);

        let mut values = vec![0.0; block.n_paths()];
        let mut exercise = vec![0; block.n_paths()];
        sim.payoff(0).unwrap().evaluate(&block, &mut values, &mut exercise).unwrap();
        assert_eq!(values.as_slice(), &output.results[0].values[768..]);
        assert!(sim.simulate_block(4).is_err());
    }

    #[test]
    fn test_exposure_is_mean_value() {
        let output = simulation(true).run().unwrap();
        let (key, expected) = output.exposures.iter().next().unwrap();
        assert_eq!(key.date, output.results[0].settlement_date);
        assert_eq!(key.currency, output.results[0].currency);
        approx::assert_relative_eq!(*expected, output.results[0].mean(), max_relative = 1e-12);
    }

    #[test]
    fn test_no_additions_after_prepare() {
        let mut sim = simulation(true);
        sim.prepare().unwrap();
        let today = sim.context().valuation_date();
        let extra = EuropeanPayoff::new(PayoffTerms::new("X", today), OptionType::Call, 1.0, today);
        assert!(matches!(sim.add_payoff(extra), Err(SimulationError::GridFrozen(_))));
        assert!(matches!(
            simulation(true).simulate_block(0),
            Err(SimulationError::GridNotFrozen)
        ));
    }
}
