use serde::Deserialize;
use tracing::warn;

use crate::errors::MarketError;
use crate::types::{BidLadder, PercentChange, QuoteRow, Snapshot};

/// Marker the provider uses for "no value" in numeric columns.
pub const NO_TRADE_SENTINEL: &str = "-";

/// Numeric field that may arrive either as a JSON number or as a string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|v| v.is_finite())
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim() == NO_TRADE_SENTINEL)
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteTableEnvelope {
    pub data: Option<QuoteTableData>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteTableData {
    #[serde(default)]
    pub diff: Vec<RawQuoteRow>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuoteRow {
    #[serde(rename = "f12")]
    pub code: String,

    #[serde(rename = "f14")]
    pub name: String,

    #[serde(rename = "f3")]
    pub percent_change: Numeric,
}

#[derive(Debug, Deserialize)]
pub struct RawSnapshot {
    pub topprice: Option<Numeric>,
    pub bottomprice: Option<Numeric>,
    pub realtimequote: Option<RawRealtimeQuote>,
    pub fivequote: Option<RawFiveQuote>,
}

#[derive(Debug, Deserialize)]
pub struct RawRealtimeQuote {
    #[serde(rename = "currentPrice")]
    pub current_price: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub struct RawFiveQuote {
    pub buy1_count: Option<Numeric>,
    pub buy2_count: Option<Numeric>,
    pub buy3_count: Option<Numeric>,
    pub buy4_count: Option<Numeric>,
    pub buy5_count: Option<Numeric>,
}

/// Parses the quote-table response into typed rows.
///
/// `data: null` is an empty table. Rows whose percent change is neither a
/// number nor the no-trade sentinel are dropped with a warning.
pub fn parse_quote_table(body: &str) -> Result<Vec<QuoteRow>, MarketError> {
    let envelope: QuoteTableEnvelope = serde_json::from_str(body)?;
    let Some(data) = envelope.data else {
        return Ok(Vec::new());
    };

    let rows = data
        .diff
        .into_iter()
        .filter_map(|raw| {
            let percent_change = if raw.percent_change.is_sentinel() {
                PercentChange::NoTrade
            } else if let Some(v) = raw.percent_change.as_f64() {
                PercentChange::Traded(v)
            } else {
                warn!(code = %raw.code, value = ?raw.percent_change, "unparseable percent change; row dropped");
                return None;
            };

            Some(QuoteRow {
                identifier: raw.code,
                display_name: raw.name,
                percent_change,
            })
        })
        .collect();

    Ok(rows)
}

/// Strips a JSONP wrapper (`callback({...});`) down to the JSON object.
pub fn strip_jsonp(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

/// Parses a snapshot response (JSONP or bare JSON) into a typed snapshot.
pub fn parse_snapshot(body: &str) -> Result<Snapshot, MarketError> {
    let json = strip_jsonp(body)
        .ok_or_else(|| MarketError::InvalidResponse("snapshot body has no JSON object".into()))?;
    let raw: RawSnapshot = serde_json::from_str(json)?;

    let five = raw
        .fivequote
        .ok_or_else(|| MarketError::InvalidResponse("snapshot missing fivequote".into()))?;
    let realtime = raw
        .realtimequote
        .ok_or_else(|| MarketError::InvalidResponse("snapshot missing realtimequote".into()))?;

    let current_price = positive_price("currentPrice", realtime.current_price.as_ref())?;
    let ceiling_price = positive_price("topprice", raw.topprice.as_ref())?;
    let floor_price = positive_price("bottomprice", raw.bottomprice.as_ref())?;

    let bid_quantities = BidLadder(
        [
            &five.buy1_count,
            &five.buy2_count,
            &five.buy3_count,
            &five.buy4_count,
            &five.buy5_count,
        ]
        .map(|q| quantity(q.as_ref())),
    );

    Ok(Snapshot {
        current_price,
        ceiling_price,
        floor_price,
        bid_quantities,
    })
}

fn positive_price(field: &str, value: Option<&Numeric>) -> Result<f64, MarketError> {
    value
        .and_then(Numeric::as_f64)
        .filter(|v| *v > 0.0)
        .ok_or_else(|| MarketError::InvalidResponse(format!("{field} missing or not positive")))
}

// Empty book levels come back as "-" or are omitted; both mean zero.
fn quantity(value: Option<&Numeric>) -> u64 {
    value
        .and_then(Numeric::as_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}
