// Risk/return statistics derived from a stored series
//
// Pure functions only: same points and same `now` always give the same
// result.

use super::types::{DataPoint, PoolMetrics};
use chrono::{DateTime, Duration, Utc};

/// Minimum series length, both overall and inside the 90-day window
pub const MIN_DATA_POINTS: usize = 7;

const BASE_WINDOW_DAYS: i64 = 90;
const TVL_WINDOW_DAYS: i64 = 30;

const VOLATILITY_WEIGHT: f64 = 0.1;
const VOLATILITY_KNEE: f64 = 3.0;
const VOLATILITY_EXPONENT: f64 = 1.5;
const INCENTIVE_WEIGHT: f64 = 0.5;

/// Compute metrics for an ascending series, or `None` when it is too short
pub fn calculate(points: &[DataPoint], now: DateTime<Utc>) -> Option<PoolMetrics> {
    if points.len() < MIN_DATA_POINTS {
        return None;
    }

    let base_cutoff = now - Duration::days(BASE_WINDOW_DAYS);
    let window: Vec<&DataPoint> = points
        .iter()
        .filter(|p| p.timestamp >= base_cutoff)
        .collect();
    if window.len() < MIN_DATA_POINTS {
        return None;
    }

    let values: Vec<f64> = window.iter().map(|p| p.base_apy()).collect();
    let base90 = mean(&values);
    let volatility = population_std_dev(&values, base90);

    let organic_pct = organic_percentage(&window);
    let tvl_change_30d = tvl_change(points, now - Duration::days(TVL_WINDOW_DAYS));

    let vol_penalty = volatility * VOLATILITY_WEIGHT
        + (volatility - VOLATILITY_KNEE).max(0.0).powf(VOLATILITY_EXPONENT);
    let incentive_risk = base90 * (1.0 - f64::from(organic_pct) / 100.0) * INCENTIVE_WEIGHT;
    let risk_adjusted_yield = round_to(base90 - vol_penalty - incentive_risk, 2);

    Some(PoolMetrics {
        base90,
        volatility,
        organic_pct,
        tvl_change_30d,
        risk_adjusted_yield,
        data_points: points.len(),
        oldest_date: points[0].timestamp.date_naive(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Average share of total APY that comes from base yield, 0..=100
///
/// Points with non-positive APY are skipped; with none left the pool is
/// treated as fully organic.
fn organic_percentage(window: &[&DataPoint]) -> u8 {
    let ratios: Vec<f64> = window
        .iter()
        .filter(|p| p.apy > 0.0)
        .map(|p| p.base_apy() / p.apy * 100.0)
        .collect();

    if ratios.is_empty() {
        return 100;
    }

    round_to(mean(&ratios), 0).clamp(0.0, 100.0) as u8
}

fn tvl_change(points: &[DataPoint], cutoff: DateTime<Utc>) -> f64 {
    let current = match points.last() {
        Some(point) => point.tvl_usd,
        None => return 0.0,
    };
    let baseline = points
        .iter()
        .find(|p| p.timestamp >= cutoff)
        .map(|p| p.tvl_usd)
        .unwrap_or(current);

    if baseline == 0.0 {
        return 0.0;
    }
    round_to((current - baseline) / baseline * 100.0, 1)
}

/// Round half-up to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor + 0.5).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    /// `count` daily points ending today, built by `make(days_ago)`
    fn daily<F>(count: i64, make: F) -> Vec<DataPoint>
    where
        F: Fn(i64) -> DataPoint,
    {
        (0..count).rev().map(make).collect()
    }

    fn flat(count: i64, apy: f64, apy_base: Option<f64>) -> Vec<DataPoint> {
        daily(count, |ago| {
            DataPoint::new(now() - Duration::days(ago), 1_000.0, apy).with_split(apy_base, None)
        })
    }

    #[test]
    fn test_constant_series_with_rewards() {
        let metrics = calculate(&flat(10, 10.0, Some(8.0)), now()).unwrap();

        assert_eq!(metrics.base90, 8.0);
        assert_eq!(metrics.volatility, 0.0);
        assert_eq!(metrics.organic_pct, 80);
        assert_eq!(metrics.risk_adjusted_yield, 7.2);
        assert_eq!(metrics.tvl_change_30d, 0.0);
        assert_eq!(metrics.data_points, 10);
        assert_eq!(metrics.oldest_date, NaiveDate::from_ymd_opt(2024, 5, 23).unwrap());
    }

    #[test]
    fn test_length_boundary() {
        assert!(calculate(&flat(6, 5.0, None), now()).is_none());
        assert!(calculate(&flat(7, 5.0, None), now()).is_some());
    }

    #[test]
    fn test_too_few_points_inside_window() {
        // 10 points, but only 5 within the last 90 days
        let mut points = daily(5, |ago| {
            DataPoint::new(now() - Duration::days(200 + ago), 1_000.0, 5.0)
        });
        points.extend(flat(5, 5.0, None));
        assert!(calculate(&points, now()).is_none());
    }

    #[test]
    fn test_tvl_change_over_thirty_days() {
        let points = daily(31, |ago| {
            let tvl = if ago == 0 { 1_200_000.0 } else { 1_000_000.0 };
            DataPoint::new(now() - Duration::days(ago), tvl, 5.0)
        });
        let metrics = calculate(&points, now()).unwrap();
        assert_eq!(metrics.tvl_change_30d, 20.0);
    }

    #[test]
    fn test_zero_baseline_tvl() {
        let points = daily(8, |ago| {
            let tvl = if ago == 0 { 500.0 } else { 0.0 };
            DataPoint::new(now() - Duration::days(ago), tvl, 5.0)
        });
        assert_eq!(calculate(&points, now()).unwrap().tvl_change_30d, 0.0);
    }

    #[test]
    fn test_organic_defaults_to_full_without_positive_apy() {
        let metrics = calculate(&flat(7, 0.0, None), now()).unwrap();
        assert_eq!(metrics.organic_pct, 100);
        assert_eq!(metrics.risk_adjusted_yield, 0.0);
    }

    #[test]
    fn test_organic_is_clamped() {
        // Base above total APY would exceed 100%
        let metrics = calculate(&flat(7, 4.0, Some(6.0)), now()).unwrap();
        assert_eq!(metrics.organic_pct, 100);
    }

    #[test]
    fn test_volatility_penalty() {
        // Alternating 0 and 10: mean 5, population std dev 5
        let points = daily(10, |ago| {
            let apy = if ago % 2 == 0 { 0.0 } else { 10.0 };
            DataPoint::new(now() - Duration::days(ago), 1_000.0, apy)
        });
        let metrics = calculate(&points, now()).unwrap();

        assert_eq!(metrics.base90, 5.0);
        assert_eq!(metrics.volatility, 5.0);
        assert_eq!(metrics.organic_pct, 100);
        // 5 - (0.5 + 2^1.5) = 1.67157...
        assert_eq!(metrics.risk_adjusted_yield, 1.67);
    }

    #[test]
    fn test_deterministic() {
        let points = daily(40, |ago| {
            DataPoint::new(now() - Duration::days(ago), 1_000.0 + ago as f64, 3.0 + (ago % 5) as f64)
                .with_split(Some(2.0 + (ago % 3) as f64), Some(1.0))
        });
        assert_eq!(calculate(&points, now()), calculate(&points, now()));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(-2.5, 0), -2.0);
        assert_eq!(round_to(79.5, 0), 80.0);
    }
}
