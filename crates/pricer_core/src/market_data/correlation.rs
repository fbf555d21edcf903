//! Pairwise factor correlation sources.
//!
//! A source answers "what is the correlation of factor `a` with factor `b`",
//! optionally at a given time, with *try* semantics: an unknown pair is
//! `None`, not an error. [`resolve_correlation`] layers the lookup order used
//! when assembling a correlation matrix, including FX pair inversion.

use super::error::MarketDataError;
use std::collections::{BTreeMap, HashMap};

/// Pairwise correlation lookup.
pub trait CorrelationSource: Send + Sync {
    /// Correlation of `a` with `b`, if known.
    fn try_correlation(&self, a: &str, b: &str) -> Option<f64>;

    /// Correlation of `a` with `b` at time `t`; defaults to the static value.
    fn try_correlation_at(&self, a: &str, b: &str, t: f64) -> Option<f64> {
        let _ = t;
        self.try_correlation(a, b)
    }
}

/// Inverts an FX pair name: `"EUR/USD"` becomes `"USD/EUR"`.
///
/// Returns `None` for names that are not of the form `X/Y`.
///
/// ```
/// use pricer_core::market_data::correlation::flip_fx_pair;
///
/// assert_eq!(flip_fx_pair("EUR/USD").as_deref(), Some("USD/EUR"));
/// assert_eq!(flip_fx_pair("BRENT"), None);
/// ```
pub fn flip_fx_pair(name: &str) -> Option<String> {
    let (dom, foreign) = name.split_once('/')?;
    if dom.is_empty() || foreign.is_empty() || foreign.contains('/') {
        return None;
    }
    Some(format!("{}/{}", foreign, dom))
}

/// Resolves the correlation of `a` with `b` at time `t`.
///
/// Lookup order: identical names (1), the pair as given, then each
/// FX-inverted form, negating once per inverted leg. Pairs that resolve
/// nowhere are uncorrelated (0).
///
/// # Errors
/// `InvalidCorrelation` when the source yields a value outside `[-1, 1]`
/// or a non-finite one.
///
/// ```
/// use pricer_core::market_data::correlation::{resolve_correlation, CorrelationTable};
///
/// let mut table = CorrelationTable::new();
/// table.set("EUR/USD", "GOLD", 0.3);
/// assert_eq!(resolve_correlation(&table, "USD/EUR", "GOLD", 0.0), Ok(-0.3));
/// assert_eq!(resolve_correlation(&table, "GOLD", "GOLD", 0.0), Ok(1.0));
/// assert_eq!(resolve_correlation(&table, "GOLD", "SILVER", 0.0), Ok(0.0));
///
/// table.set("GOLD", "SILVER", 1.2);
/// assert!(resolve_correlation(&table, "GOLD", "SILVER", 0.0).is_err());
/// ```
pub fn resolve_correlation<S: CorrelationSource + ?Sized>(
    source: &S,
    a: &str,
    b: &str,
    t: f64,
) -> Result<f64, MarketDataError> {
    let rho = lookup(source, a, b, t);
    if rho.is_finite() && (-1.0..=1.0).contains(&rho) {
        Ok(rho)
    } else {
        Err(MarketDataError::InvalidCorrelation {
            a: a.to_string(),
            b: b.to_string(),
            value: rho,
        })
    }
}

fn lookup<S: CorrelationSource + ?Sized>(source: &S, a: &str, b: &str, t: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    if let Some(rho) = source.try_correlation_at(a, b, t) {
        return rho;
    }

    let flipped_a = flip_fx_pair(a);
    let flipped_b = flip_fx_pair(b);

    if let Some(fa) = flipped_a.as_deref() {
        if fa == b {
            return -1.0;
        }
        if let Some(rho) = source.try_correlation_at(fa, b, t) {
            return -rho;
        }
    }
    if let Some(fb) = flipped_b.as_deref() {
        if let Some(rho) = source.try_correlation_at(a, fb, t) {
            return -rho;
        }
    }
    if let (Some(fa), Some(fb)) = (flipped_a.as_deref(), flipped_b.as_deref()) {
        if let Some(rho) = source.try_correlation_at(fa, fb, t) {
            return rho;
        }
    }
    0.0
}

/// Symmetric table of static pairwise correlations.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrelationTable {
    pairs: HashMap<String, HashMap<String, f64>>,
}

impl CorrelationTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correlation of `a` with `b` (and `b` with `a`).
    pub fn set(&mut self, a: &str, b: &str, rho: f64) -> &mut Self {
        self.pairs
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), rho);
        self.pairs
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), rho);
        self
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, a: &str, b: &str, rho: f64) -> Self {
        self.set(a, b, rho);
        self
    }

    /// Number of stored (unordered) pairs.
    pub fn len(&self) -> usize {
        self.pairs.values().map(HashMap::len).sum::<usize>() / 2
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl CorrelationSource for CorrelationTable {
    fn try_correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.pairs.get(a).and_then(|row| row.get(b)).copied()
    }
}

/// Correlation snapshots keyed by time.
///
/// `try_correlation_at(a, b, t)` reads the latest snapshot at or before `t`
/// (the first snapshot for earlier times).
#[derive(Debug, Clone, Default)]
pub struct TermCorrelationTable {
    snapshots: BTreeMap<u64, (f64, CorrelationTable)>,
}

impl TermCorrelationTable {
    /// Empty term table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the snapshot effective from time `t`.
    pub fn insert(&mut self, t: f64, table: CorrelationTable) -> &mut Self {
        self.snapshots.insert(Self::key(t), (t, table));
        self
    }

    fn key(t: f64) -> u64 {
        // Order-preserving map of f64 onto u64.
        let bits = t.to_bits();
        if t.is_sign_negative() {
            !bits
        } else {
            bits | (1 << 63)
        }
    }

    fn snapshot(&self, t: f64) -> Option<&CorrelationTable> {
        self.snapshots
            .range(..=Self::key(t))
            .next_back()
            .or_else(|| self.snapshots.iter().next())
            .map(|(_, (_, table))| table)
    }
}

impl CorrelationSource for TermCorrelationTable {
    fn try_correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.snapshots
            .values()
            .next()
            .and_then(|(_, table)| table.try_correlation(a, b))
    }

    fn try_correlation_at(&self, a: &str, b: &str, t: f64) -> Option<f64> {
        self.snapshot(t).and_then(|table| table.try_correlation(a, b))
    }
}

/// Calendar-distance correlation decay between dated contracts.
///
/// `ρ = exp(−λ·Δt²)` where `Δt` is the distance in years between two
/// contracts' prompt dates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PromptDecayCorrelation {
    /// Decay rate λ
    pub lambda: f64,
}

impl PromptDecayCorrelation {
    /// Decay with rate `lambda`.
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    /// Correlation for a prompt distance of `dt` years.
    #[inline]
    pub fn correlation(&self, dt: f64) -> f64 {
        (-self.lambda * dt * dt).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_is_symmetric() {
        let table = CorrelationTable::new().with("A", "B", 0.4);
        assert_eq!(table.try_correlation("B", "A"), Some(0.4));
        assert_eq!(table.try_correlation("A", "C"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_double_flip_keeps_sign() {
        let table = CorrelationTable::new().with("EUR/USD", "GBP/USD", 0.7);
        assert_eq!(resolve_correlation(&table, "USD/EUR", "USD/GBP", 0.0), Ok(0.7));
        assert_eq!(resolve_correlation(&table, "EUR/USD", "USD/GBP", 0.0), Ok(-0.7));
    }

    #[test]
    fn test_pair_against_its_inverse() {
        let table = CorrelationTable::new();
        assert_eq!(resolve_correlation(&table, "EUR/USD", "USD/EUR", 0.0), Ok(-1.0));
    }

    #[test]
    fn test_out_of_range_correlation_is_rejected() {
        let table = CorrelationTable::new()
            .with("A", "B", -1.5)
            .with("EUR/USD", "C", f64::NAN);
        assert_eq!(
            resolve_correlation(&table, "A", "B", 0.0),
            Err(MarketDataError::InvalidCorrelation {
                a: "A".to_string(),
                b: "B".to_string(),
                value: -1.5,
            })
        );
        assert!(matches!(
            resolve_correlation(&table, "USD/EUR", "C", 0.0),
            Err(MarketDataError::InvalidCorrelation { .. })
        ));
        assert_eq!(resolve_correlation(&table, "A", "A", 0.0), Ok(1.0));
    }

    #[test]
    fn test_term_table_picks_latest_snapshot() {
        let mut term = TermCorrelationTable::new();
        term.insert(0.0, CorrelationTable::new().with("A", "B", 0.1));
        term.insert(1.0, CorrelationTable::new().with("A", "B", 0.5));
        assert_eq!(term.try_correlation_at("A", "B", -0.5), Some(0.1));
        assert_eq!(term.try_correlation_at("A", "B", 0.5), Some(0.1));
        assert_eq!(term.try_correlation_at("A", "B", 1.0), Some(0.5));
        assert_eq!(term.try_correlation_at("A", "B", 3.0), Some(0.5));
    }

    #[test]
    fn test_prompt_decay() {
        let decay = PromptDecayCorrelation::new(2.0);
        assert_eq!(decay.correlation(0.0), 1.0);
        assert_relative_eq!(decay.correlation(0.5), (-0.5_f64).exp(), epsilon = 1e-15);
    }
}
