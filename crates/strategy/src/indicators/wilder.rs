//! ATR, ADX and RSI with Wilder smoothing (`alpha = 1 / window`), in the
//! form the Python indicator packages compute them. The training dataset was
//! built with those numbers, so the classifier, the signal generator and the
//! feature export have to reproduce them exactly.

/// Average true range. TR of the first bar is `high - low`; the average is
/// seeded with the mean of the first `window` true ranges.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    window: usize,
    prev_close: Option<f64>,
    sum: f64,
    count: usize,
    value: Option<f64>,
}

impl AtrIndicator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            sum: 0.0,
            count: 0,
            value: None,
        }
    }

    /// Returns `None` until `window` bars have been seen.
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);

        let n = self.window as f64;
        self.value = match self.value {
            Some(prev) => Some((prev * (n - 1.0) + tr) / n),
            None => {
                self.sum += tr;
                self.count += 1;
                (self.count >= self.window).then(|| self.sum / n)
            }
        };
        self.value
    }
}

fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        None => high - low,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// First bar only sets the previous high/low/close.
    Init,
    /// Summing the first `window` +DM/-DM/TR values.
    Accumulate,
    /// Summing the first `window` DX values to seed the ADX.
    DxAccumulate,
    Warm,
}

/// Average directional index. The first value appears on bar `2 * window - 1`.
#[derive(Debug, Clone)]
pub struct AdxIndicator {
    window: usize,
    prev_high: f64,
    prev_low: f64,
    prev_close: f64,
    smoothed_plus_dm: f64,
    smoothed_minus_dm: f64,
    smoothed_tr: f64,
    dx_sum: f64,
    value: f64,
    count: usize,
    dx_count: usize,
    phase: Phase,
}

impl AdxIndicator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_high: 0.0,
            prev_low: 0.0,
            prev_close: 0.0,
            smoothed_plus_dm: 0.0,
            smoothed_minus_dm: 0.0,
            smoothed_tr: 0.0,
            dx_sum: 0.0,
            value: 0.0,
            count: 0,
            dx_count: 0,
            phase: Phase::Init,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let out = match self.phase {
            Phase::Init => {
                self.phase = Phase::Accumulate;
                None
            }
            Phase::Accumulate => {
                let (plus_dm, minus_dm, tr) = self.directional_move(high, low);
                self.smoothed_plus_dm += plus_dm;
                self.smoothed_minus_dm += minus_dm;
                self.smoothed_tr += tr;
                self.count += 1;

                if self.count >= self.window {
                    self.phase = Phase::DxAccumulate;
                    self.dx_sum = self.dx();
                    self.dx_count = 1;
                    self.seed_if_ready()
                } else {
                    None
                }
            }
            Phase::DxAccumulate => {
                self.wilder_step(high, low);
                self.dx_sum += self.dx();
                self.dx_count += 1;
                self.seed_if_ready()
            }
            Phase::Warm => {
                self.wilder_step(high, low);
                let n = self.window as f64;
                self.value = (self.value * (n - 1.0) + self.dx()) / n;
                Some(self.value)
            }
        };

        self.prev_high = high;
        self.prev_low = low;
        self.prev_close = close;
        out
    }

    fn seed_if_ready(&mut self) -> Option<f64> {
        if self.dx_count < self.window {
            return None;
        }
        self.value = self.dx_sum / self.window as f64;
        self.phase = Phase::Warm;
        Some(self.value)
    }

    fn directional_move(&self, high: f64, low: f64) -> (f64, f64, f64) {
        let up = high - self.prev_high;
        let down = self.prev_low - low;

        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        (plus_dm, minus_dm, true_range(high, low, Some(self.prev_close)))
    }

    // new = prev - prev / n + current
    fn wilder_step(&mut self, high: f64, low: f64) {
        let (plus_dm, minus_dm, tr) = self.directional_move(high, low);
        let n = self.window as f64;
        self.smoothed_plus_dm += plus_dm - self.smoothed_plus_dm / n;
        self.smoothed_minus_dm += minus_dm - self.smoothed_minus_dm / n;
        self.smoothed_tr += tr - self.smoothed_tr / n;
    }

    fn dx(&self) -> f64 {
        if self.smoothed_tr <= 0.0 {
            return 0.0;
        }
        let di_plus = self.smoothed_plus_dm / self.smoothed_tr * 100.0;
        let di_minus = self.smoothed_minus_dm / self.smoothed_tr * 100.0;
        let sum = di_plus + di_minus;
        if sum > 0.0 {
            (di_plus - di_minus).abs() / sum * 100.0
        } else {
            0.0
        }
    }
}

/// Relative strength index over Wilder averages of gains and losses. The
/// averages are bias-adjusted, which is the `ewm(alpha = 1 / window)` default;
/// the adjustment weight is shared by both sides and cancels out of the ratio.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    window: usize,
    prev_close: Option<f64>,
    gains: f64,
    losses: f64,
    count: usize,
}

impl RsiIndicator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            gains: 0.0,
            losses: 0.0,
            count: 0,
        }
    }

    /// First value once `window` price changes have been seen. A window
    /// without any movement reads 50.
    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let decay = 1.0 - 1.0 / self.window as f64;

        self.gains = self.gains * decay + change.max(0.0);
        self.losses = self.losses * decay + (-change).max(0.0);
        self.count += 1;

        if self.count < self.window {
            return None;
        }
        let total = self.gains + self.losses;
        if total <= 0.0 {
            return Some(50.0);
        }
        Some(100.0 * self.gains / total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_uses_wilder_decay() {
        let mut rsi = RsiIndicator::new(2);
        let out: Vec<Option<f64>> = [1.0, 2.0, 1.0, 2.0].iter().map(|&c| rsi.update(c)).collect();

        assert_eq!(&out[..2], &[None, None]);
        // gains 0.5 / losses 1.0, then gains 1.25 / losses 0.5
        assert!((out[2].unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert!((out[3].unwrap() - 100.0 * 1.25 / 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_of_flat_market_is_neutral() {
        let mut rsi = RsiIndicator::new(3);
        let last = (0..6).filter_map(|_| rsi.update(1.2)).last();
        assert_eq!(last, Some(50.0));
    }

    #[test]
    fn test_atr_seed_is_mean_of_first_true_ranges() {
        let mut atr = AtrIndicator::new(3);
        assert_eq!(atr.update(1.10, 1.00, 1.05), None); // TR 0.10
        assert_eq!(atr.update(1.12, 1.06, 1.10), None); // TR 0.07 (1.12 - 1.05)
        let seed = atr.update(1.10, 1.04, 1.08).unwrap(); // TR 0.06
        assert!((seed - 0.23 / 3.0).abs() < 1e-12);

        let next = atr.update(1.20, 1.08, 1.15).unwrap(); // TR 0.12
        assert!((next - (seed * 2.0 + 0.12) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_adx_of_one_way_market_is_one_hundred() {
        let mut adx = AdxIndicator::new(5);
        let out: Vec<Option<f64>> = (0..12)
            .map(|i| {
                let base = 1.0 + i as f64 * 0.01;
                adx.update(base + 0.002, base - 0.002, base)
            })
            .collect();

        assert!(out[..9].iter().all(Option::is_none));
        assert!((out[9].unwrap() - 100.0).abs() < 1e-9);
        assert!((out[11].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_adx_of_flat_market_is_zero() {
        let mut adx = AdxIndicator::new(3);
        let last = (0..10).filter_map(|_| adx.update(1.1, 1.1, 1.1)).last();
        assert_eq!(last, Some(0.0));
    }
}
