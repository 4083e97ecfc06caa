//! Simple Moving Average (SMA) over closes.
//!
//! The first defined value is at index `period - 1`.

/// Rolling mean of `closes` over `period` observations.
///
/// Output has the same length as the input; entries are `None` until a full
/// window exists. A zero period yields no defined values.
pub fn sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = closes[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);
    for i in period..n {
        sum += closes[i] - closes[i - period];
        result[i] = Some(sum / period as f64);
    }
    result
}
