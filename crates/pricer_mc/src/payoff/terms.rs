//! Terms shared by every payoff: underlying, settlement and currency.

use crate::block::PathBlock;
use crate::error::{SimulationError, SimulationResult};
use crate::grid::SimulationContext;
use crate::lanes::{splat, Lane, LANES};
use pricer_core::types::Date;

/// Base currency of FX factor quotes.
pub const BASE_CURRENCY: &str = "USD";

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionType {
    /// Pays `max(0, S − K)`.
    Call,
    /// Pays `max(0, K − S)`.
    Put,
}

impl OptionType {
    /// `max(0, ±(s − k))` lane by lane.
    #[inline]
    pub fn intrinsic(self, s: Lane, k: Lane) -> Lane {
        let zero = splat(0.0);
        match self {
            OptionType::Call => (s - k).max(zero),
            OptionType::Put => (k - s).max(zero),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FxConversion {
    None,
    Multiply(usize),
    Divide(usize),
}

/// Underlying, settlement date, currencies and notional.
///
/// When the settlement currency differs from the asset's currency, one leg
/// must be USD and the payoff is converted with the `USD/<CCY>` factor
/// (quoted as CCY per USD) at the settlement date.
///
/// ```
/// use pricer_core::types::Date;
/// use pricer_mc::payoff::PayoffTerms;
///
/// let terms = PayoffTerms::new("GOLD", Date::from_ymd(2025, 12, 31).unwrap())
///     .with_currency("EUR")
///     .with_notional(100.0);
/// assert_eq!(terms.fx_factor().unwrap().as_deref(), Some("USD/EUR"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffTerms {
    /// Underlying factor name.
    pub asset: String,
    /// Settlement (payment) date.
    pub settlement_date: Date,
    /// Settlement currency.
    pub currency: String,
    /// Currency the asset is quoted in.
    pub asset_currency: String,
    /// Notional multiplier.
    pub notional: f64,
    label: Option<String>,
    asset_dim: usize,
    settlement_index: usize,
    fx: FxConversion,
}

impl PayoffTerms {
    /// USD terms on `asset`, notional one.
    pub fn new(asset: &str, settlement_date: Date) -> Self {
        Self {
            asset: asset.to_string(),
            settlement_date,
            currency: BASE_CURRENCY.to_string(),
            asset_currency: BASE_CURRENCY.to_string(),
            notional: 1.0,
            label: None,
            asset_dim: 0,
            settlement_index: 0,
            fx: FxConversion::None,
        }
    }

    /// Settlement currency.
    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    /// Asset quotation currency.
    pub fn with_asset_currency(mut self, currency: &str) -> Self {
        self.asset_currency = currency.to_string();
        self
    }

    /// Notional.
    pub fn with_notional(mut self, notional: f64) -> Self {
        self.notional = notional;
        self
    }

    /// Result label; defaults to the asset name.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Result label.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.asset)
    }

    /// The FX factor needed for settlement, if any.
    ///
    /// # Errors
    /// `UnsupportedProduct` when neither currency is USD.
    pub fn fx_factor(&self) -> SimulationResult<Option<String>> {
        if self.currency == self.asset_currency {
            Ok(None)
        } else if self.asset_currency == BASE_CURRENCY {
            Ok(Some(format!("{}/{}", BASE_CURRENCY, self.currency)))
        } else if self.currency == BASE_CURRENCY {
            Ok(Some(format!("{}/{}", BASE_CURRENCY, self.asset_currency)))
        } else {
            Err(SimulationError::UnsupportedProduct(format!(
                "settlement in {} of an asset quoted in {}",
                self.currency, self.asset_currency
            )))
        }
    }

    pub(crate) fn setup(&self, ctx: &mut SimulationContext) -> SimulationResult<()> {
        ctx.add_dimension(&self.asset)?;
        ctx.add_date(self.settlement_date)?;
        if let Some(fx) = self.fx_factor()? {
            ctx.add_dimension(&fx)?;
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, ctx: &SimulationContext) -> SimulationResult<()> {
        self.asset_dim = ctx.dimension(&self.asset)?;
        self.settlement_index = ctx.date_index(self.settlement_date)?;
        self.fx = match self.fx_factor()? {
            None => FxConversion::None,
            Some(name) if self.asset_currency == BASE_CURRENCY => {
                FxConversion::Multiply(ctx.dimension(&name)?)
            }
            Some(name) => FxConversion::Divide(ctx.dimension(&name)?),
        };
        Ok(())
    }

    /// Resolved asset factor index.
    #[inline]
    pub fn asset_dim(&self) -> usize {
        self.asset_dim
    }

    /// Resolved settlement step.
    #[inline]
    pub fn settlement_index(&self) -> usize {
        self.settlement_index
    }

    /// Asset path of `batch`.
    #[inline]
    pub(crate) fn asset_path<'a>(&self, block: &'a PathBlock, batch: usize) -> &'a [Lane] {
        block.path(self.asset_dim, batch)
    }

    /// Scales by notional and converts to the settlement currency.
    #[inline]
    pub(crate) fn settle(&self, block: &PathBlock, batch: usize, payoff: Lane) -> Lane {
        let scaled = payoff * splat(self.notional);
        match self.fx {
            FxConversion::None => scaled,
            FxConversion::Multiply(dim) => scaled * block.path(dim, batch)[self.settlement_index],
            FxConversion::Divide(dim) => scaled / block.path(dim, batch)[self.settlement_index],
        }
    }
}

/// Writes one lane of results into the per-path slice.
#[inline]
pub(crate) fn store(values: &mut [f64], batch: usize, lane: Lane) {
    let lanes = lane.to_array();
    let start = batch * lanes.len();
    values[start..start + lanes.len()].copy_from_slice(&lanes);
}

/// Writes one lane of exercise indices.
#[inline]
pub(crate) fn store_exercise(exercise: &mut [i32], batch: usize, indices: [i32; LANES]) {
    let start = batch * LANES;
    exercise[start..start + LANES].copy_from_slice(&indices);
}

/// `0` where the lane pays, `-1` elsewhere.
#[inline]
pub(crate) fn paid_flags(payoff: Lane) -> [i32; LANES] {
    payoff.to_array().map(|v| if v > 0.0 { 0 } else { -1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::DayCountConvention;

    #[test]
    fn test_fx_factor_selection() {
        let d = Date::from_ymd(2025, 6, 30).unwrap();
        assert_eq!(PayoffTerms::new("X", d).fx_factor().unwrap(), None);
        assert_eq!(
            PayoffTerms::new("X", d)
                .with_asset_currency("GBP")
                .fx_factor()
                .unwrap()
                .as_deref(),
            Some("USD/GBP")
        );
        assert!(matches!(
            PayoffTerms::new("X", d)
                .with_asset_currency("GBP")
                .with_currency("EUR")
                .fx_factor(),
            Err(SimulationError::UnsupportedProduct(_))
        ));
    }

    #[test]
    fn test_settle_converts_at_settlement() {
        let today = Date::from_ymd(2025, 1, 1).unwrap();
        let settle = today.add_days(10);
        let mut to_eur = PayoffTerms::new("X", settle).with_currency("EUR").with_notional(2.0);
        let mut from_gbp = PayoffTerms::new("X", settle).with_asset_currency("GBP");
        let mut ctx = SimulationContext::new(today, DayCountConvention::ActualActual365);
        to_eur.setup(&mut ctx).unwrap();
        from_gbp.setup(&mut ctx).unwrap();
        ctx.freeze();
        to_eur.finish(&ctx).unwrap();
        from_gbp.finish(&ctx).unwrap();

        let mut block = PathBlock::new(4, ctx.n_steps(), ctx.n_factors(), 0);
        let eur = ctx.dimension("USD/EUR").unwrap();
        let gbp = ctx.dimension("USD/GBP").unwrap();
        block.path_mut(eur, 0)[1] = splat(0.9);
        block.path_mut(gbp, 0)[1] = splat(0.8);
        let payoff = splat(10.0);
        assert_eq!(to_eur.settle(&block, 0, payoff).to_array()[0], 18.0);
        assert_eq!(from_gbp.settle(&block, 0, payoff).to_array()[0], 12.5);
        assert_eq!(to_eur.label(), "X");
    }

    #[test]
    fn test_intrinsic() {
        let s = Lane::from([90.0, 100.0, 110.0, 0.0]);
        let k = splat(100.0);
        assert_eq!(OptionType::Call.intrinsic(s, k).to_array(), [0.0, 0.0, 10.0, 0.0]);
        assert_eq!(OptionType::Put.intrinsic(s, k).to_array(), [10.0, 0.0, 0.0, 100.0]);
    }
}
