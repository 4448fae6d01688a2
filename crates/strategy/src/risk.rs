use common::models::Signal;

/// Account figures used to size the trades the generators propose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskProfile {
    pub balance: f64,
    pub risk_per_trade: f64,
    /// Account-currency value of one pip for one unit.
    pub pip_value: f64,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            balance: 10_000.0,
            risk_per_trade: 0.01,
            pip_value: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub stop_pips: f64,
    pub units: f64,
}

impl RiskProfile {
    /// Stop distance and position size of a signal on `symbol`. Signals
    /// without a stop loss cannot be sized.
    pub fn size(&self, signal: &Signal, symbol: &str) -> Option<Sizing> {
        let stop = signal.stop_loss?;
        let stop_pips = stop_distance_pips(signal.entry_price, stop, pip_size(symbol));
        Some(Sizing {
            stop_pips,
            units: position_size(self.balance, self.risk_per_trade, stop_pips, self.pip_value),
        })
    }
}

/// Units to trade so that hitting the stop loses `risk_per_trade` of
/// `balance`, rounded to two decimals. Zero when the stop distance is zero.
pub fn position_size(balance: f64, risk_per_trade: f64, stop_loss_pips: f64, pip_value: f64) -> f64 {
    let per_pip_risk = stop_loss_pips * pip_value;
    if stop_loss_pips == 0.0 || per_pip_risk == 0.0 {
        return 0.0;
    }
    let size = balance * risk_per_trade / per_pip_risk;
    (size * 100.0).round() / 100.0
}

/// Distance between entry and stop in pips of `pip_size` (0.0001 for most
/// pairs, 0.01 for JPY crosses).
pub fn stop_distance_pips(entry: f64, stop: f64, pip_size: f64) -> f64 {
    if pip_size <= 0.0 {
        return 0.0;
    }
    (entry - stop).abs() / pip_size
}

pub fn pip_size(symbol: &str) -> f64 {
    if symbol.ends_with("JPY") { 0.01 } else { 0.0001 }
}
