//! Reciprocal FX pair.

use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::splat;
use pricer_core::market_data::correlation::flip_fx_pair;

/// Derives `FOR/DOM` as `1 / (DOM/FOR)` step by step.
///
/// Has no randomness of its own and must run after the source pair's
/// generator.
#[derive(Debug, Clone)]
pub struct FxInverseProcess {
    source: String,
    target: String,
    dims: Option<(usize, usize)>,
}

impl FxInverseProcess {
    /// Inverse of `source`, e.g. `"USD/EUR"` for `"EUR/USD"`.
    ///
    /// # Errors
    /// `InvalidConfig` when `source` is not of the form `X/Y`.
    pub fn new(source: &str) -> SimulationResult<Self> {
        let target = flip_fx_pair(source).ok_or_else(|| {
            SimulationError::InvalidConfig(format!("{} is not an FX pair", source))
        })?;
        Ok(Self {
            source: source.to_string(),
            target,
            dims: None,
        })
    }

    /// Name of the derived pair.
    pub fn name(&self) -> &str {
        &self.target
    }

    /// Name of the source pair.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True once finished.
    pub fn is_complete(&self) -> bool {
        self.dims.is_some()
    }

    pub(crate) fn setup(&mut self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        ctx.add_dimension(&self.source)?;
        ctx.add_dimension(&self.target)?;
        Ok(())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        if self.dims.is_none() {
            self.dims = Some((ctx.dimension(&self.source)?, ctx.dimension(&self.target)?));
        }
        Ok(())
    }

    pub(crate) fn process(&self, block: &mut PathBlock) -> SimulationResult<()> {
        let (source, target) = self
            .dims
            .ok_or_else(|| super::not_finished(&self.target))?;
        let (slab, view) = block.split_factor_mut(target);
        let n_steps = view.n_steps();
        let one = splat(1.0);
        for (batch, path) in slab.chunks_mut(n_steps).enumerate() {
            for (dst, src) in path.iter_mut().zip(view.path(source, batch)) {
                *dst = one / *src;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::Lane;
    use pricer_core::types::{Date, DayCountConvention};

    #[test]
    fn test_inverts_every_step() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        let mut process = FxInverseProcess::new("EUR/USD").unwrap();
        process.setup(&mut ctx).unwrap();
        ctx.add_date(today.add_days(1)).unwrap();
        ctx.freeze();
        process.finish(&ctx).unwrap();
        assert_eq!(process.name(), "USD/EUR");

        let mut block = PathBlock::new(4, 2, 2, 0);
        block.path_mut(0, 0)[0] = Lane::from([1.25, 2.0, 0.5, 4.0]);
        block.path_mut(0, 0)[1] = Lane::splat(0.8);
        process.process(&mut block).unwrap();
        assert_eq!(block.path(1, 0)[0].to_array(), [0.8, 0.5, 2.0, 0.25]);
        assert_eq!(block.lane_value(1, 3, 1), 1.25);
    }

    #[test]
    fn test_rejects_non_pair() {
        assert!(FxInverseProcess::new("BRENT").is_err());
    }
}
