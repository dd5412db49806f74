//! Message rendering

use crate::market::BucketWidth;
use crate::store::SpikeRecord;
use crate::universe::Asset;

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Round to an integer and group thousands with commas
pub fn thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn source_list(record: &SpikeRecord) -> String {
    if record.sources.is_empty() {
        return "-".to_string();
    }
    record
        .sources
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Alert message for an emitted spike
pub fn format_alert(record: &SpikeRecord, width: BucketWidth) -> String {
    format!(
        "⚡️ Volume spike: <b>{name} ({ticker})</b>\n\
         Window: {width} | Sources: {sources}\n\
         Current volume: {current}\n\
         Baseline: mean={mean}, σ={std}\n\
         Δ vs baseline: <b>{pct:+.0}%</b> | z={z:.2}\n\
         Time: {time}",
        name = escape_html(&record.name),
        ticker = escape_html(&record.ticker),
        sources = source_list(record),
        current = thousands(record.current_volume),
        mean = thousands(record.baseline_mean),
        std = thousands(record.baseline_std),
        pct = record.percent_delta,
        z = record.z_score,
        time = record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Recent spikes, newest first
pub fn format_status(records: &[SpikeRecord]) -> String {
    if records.is_empty() {
        return "No spikes yet. Monitoring is running.".to_string();
    }

    let mut lines = vec!["Recent spikes:".to_string()];
    for record in records {
        lines.push(format!(
            "- {}: {:+.0}% (z={:.2}) at {}",
            record.ticker,
            record.percent_delta,
            record.z_score,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    lines.join("\n")
}

/// Ranked universe as a ticker list
pub fn format_universe(assets: &[Asset]) -> String {
    let tickers: Vec<&str> = assets.iter().map(|a| a.ticker.as_str()).collect();
    format!(
        "Top {} by market cap (CoinGecko):\n{}",
        assets.len(),
        tickers.join(", ")
    )
}

/// Degraded-operation warning
pub fn format_warning(message: &str) -> String {
    format!("⚠️ Monitoring loop error: {}", escape_html(message))
}
