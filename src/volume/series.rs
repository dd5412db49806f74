//! Cross-source series alignment

use crate::market::{BucketWidth, Candle};
use chrono::{DateTime, Utc};

/// Volumes of the buckets that had closed by `now`, oldest first
pub fn completed_volumes(candles: &[Candle], width: BucketWidth, now: DateTime<Utc>) -> Vec<f64> {
    candles
        .iter()
        .filter(|c| c.is_closed(width, now))
        .map(|c| c.volume)
        .collect()
}

/// Close time of the newest bucket that had closed by `now`
pub fn latest_close(
    candles: &[Candle],
    width: BucketWidth,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    candles
        .iter()
        .filter(|c| c.is_closed(width, now))
        .map(|c| c.open_time + width.duration())
        .max()
}

/// Whether a series closing at `close` reaches the most recent bucket boundary
///
/// The boundary at or before `now` is the only close inside `(now - width, now]`,
/// so a series ending earlier is at least one bucket behind.
pub fn is_current(close: DateTime<Utc>, width: BucketWidth, now: DateTime<Utc>) -> bool {
    close > now - width.duration() && close <= now
}

/// Sum series bucket-wise after truncating to the shortest one
///
/// Alignment is anchored at the newest bucket: longer series lose their oldest
/// buckets. Returns `None` when there is nothing to combine.
pub fn combine_series(series: &[Vec<f64>]) -> Option<Vec<f64>> {
    let len = series.iter().map(Vec::len).min()?;
    if len == 0 {
        return None;
    }

    let mut total = vec![0.0; len];
    for s in series {
        let tail = &s[s.len() - len..];
        for (acc, v) in total.iter_mut().zip(tail) {
            *acc += v;
        }
    }
    Some(total)
}
