//! Latest-value indicators computed from daily bars.

use picks_core::{Quote, TechnicalIndicators};

use crate::DailyBar;

/// Simple moving average of the trailing `period` values
pub fn sma_last(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    Some(data[data.len() - period..].iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series, seeded with the SMA of the first
/// `period` values. Element `i` corresponds to `data[i + period - 1]`.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result.push(prev);
    for value in &data[period..] {
        prev = (value - prev) * multiplier + prev;
        result.push(prev);
    }
    result
}

/// Wilder-smoothed RSI at the last bar
pub fn rsi_last(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let mut avg_gain = changes[..period].iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period]
        .iter()
        .filter(|c| **c < 0.0)
        .map(|c| c.abs())
        .sum::<f64>()
        / period as f64;

    for change in &changes[period..] {
        let (gain, loss) = if *change > 0.0 { (*change, 0.0) } else { (0.0, change.abs()) };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
}

/// MACD line (EMA-12 minus EMA-26) at the last bar
pub fn macd_last(data: &[f64]) -> Option<f64> {
    let fast = ema(data, 12);
    let slow = ema(data, 26);
    Some(fast.last()? - slow.last()?)
}

pub fn indicators_from_bars(bars: &[DailyBar]) -> TechnicalIndicators {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    TechnicalIndicators {
        rsi: rsi_last(&closes, 14),
        sma_20: sma_last(&closes, 20),
        sma_50: sma_last(&closes, 50),
        macd: macd_last(&closes),
        avg_volume: sma_last(&volumes, volumes.len().min(20)),
    }
}

/// Quote for the most recent bar, with change measured against the prior close
/// and the 52-week range taken from the trailing 252 sessions.
pub fn quote_from_bars(ticker: &str, bars: &[DailyBar]) -> Option<Quote> {
    let last = bars.last()?;
    let prev_close = bars
        .len()
        .checked_sub(2)
        .and_then(|i| bars.get(i))
        .map(|b| b.close)
        .unwrap_or(last.open);
    let change = last.close - prev_close;
    let change_percent = if prev_close > 0.0 { change / prev_close * 100.0 } else { 0.0 };

    let year = &bars[bars.len().saturating_sub(252)..];
    let high = year.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = year.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    Some(Quote {
        ticker: ticker.to_string(),
        price: last.close,
        change,
        change_percent,
        volume: last.volume,
        week_52_high: Some(high),
        week_52_low: Some(low),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64, volume: f64) -> DailyBar {
        DailyBar {
            timestamp: 0,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    #[test]
    fn test_sma_last() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma_last(&data, 3), Some(4.0));
        assert_eq!(sma_last(&data, 6), None);
        assert_eq!(sma_last(&data, 0), None);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![2.0, 4.0, 6.0, 8.0];
        let series = ema(&data, 3);
        assert_eq!(series.len(), 2);
        assert!((series[0] - 4.0).abs() < 1e-9);
        // multiplier 0.5: (8 - 4) * 0.5 + 4
        assert!((series[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_bounds() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi_last(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let rsi = rsi_last(&falling, 14).unwrap();
        assert!(rsi < 1.0);

        assert_eq!(rsi_last(&rising[..10], 14), None);
    }

    #[test]
    fn test_macd_needs_slow_window() {
        let short: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(macd_last(&short), None);

        let rising: Vec<f64> = (0..60).map(|i| 50.0 + i as f64).collect();
        assert!(macd_last(&rising).unwrap() > 0.0);
    }

    #[test]
    fn test_quote_from_bars() {
        let bars = vec![bar(100.0, 1_000.0), bar(110.0, 2_000.0)];
        let quote = quote_from_bars("TEST", &bars).unwrap();
        assert_eq!(quote.price, 110.0);
        assert!((quote.change - 10.0).abs() < 1e-9);
        assert!((quote.change_percent - 10.0).abs() < 1e-9);
        assert_eq!(quote.week_52_high, Some(111.0));
        assert_eq!(quote.week_52_low, Some(99.0));

        assert!(quote_from_bars("TEST", &[]).is_none());
    }

    #[test]
    fn test_indicators_from_short_history() {
        let bars: Vec<DailyBar> = (0..5).map(|i| bar(10.0 + i as f64, 100.0)).collect();
        let ind = indicators_from_bars(&bars);
        assert!(ind.rsi.is_none());
        assert!(ind.sma_20.is_none());
        assert_eq!(ind.avg_volume, Some(100.0));
    }
}
