//! Debezium change envelope for the `products` table.
//!
//! Values are read permissively: unknown fields are ignored, absent fields are
//! null, and a value that cannot be read as its column type invalidates the
//! whole record. Only the `after` row image is materialized.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Scale of the `price` column.
pub const PRICE_SCALE: u32 = 2;
/// Precision of the `price` column.
pub const PRICE_PRECISION: u8 = 10;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One product row image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductRow {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default, deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub description: Option<String>,
    /// Unscaled `DECIMAL(10,2)` value, e.g. `1999` for `19.99`.
    #[serde(default, deserialize_with = "price")]
    pub price: Option<i128>,
    /// Microseconds since the Unix epoch, UTC.
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<i64>,
    /// Microseconds since the Unix epoch, UTC.
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<i64>,
}

/// The `payload` object of an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChangePayload {
    #[serde(default)]
    pub before: Option<ProductRow>,
    #[serde(default)]
    pub after: Option<ProductRow>,
    #[serde(default, deserialize_with = "text")]
    pub op: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub ts_ms: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    payload: Option<ChangePayload>,
}

/// Why an event produced no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Message without a value.
    Tombstone,
    /// Value is not JSON or does not fit the envelope schema.
    Malformed,
    /// `after` is null (deletes, or no payload at all).
    NoAfterImage,
    /// `after.id` is null.
    MissingId,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Tombstone => "tombstone",
            DropReason::Malformed => "malformed",
            DropReason::NoAfterImage => "no after image",
            DropReason::MissingId => "missing id",
        };
        f.write_str(s)
    }
}

/// Parse a message value into its full payload.
pub fn parse_payload(value: &[u8]) -> Result<Option<ChangePayload>, serde_json::Error> {
    let text = String::from_utf8_lossy(value);
    let envelope: Envelope = serde_json::from_str(&text)?;
    Ok(envelope.payload)
}

/// Decode a message value into the row to materialize.
pub fn decode(value: Option<&[u8]>) -> Result<ProductRow, DropReason> {
    let value = value.ok_or(DropReason::Tombstone)?;
    let payload = parse_payload(value).map_err(|_| DropReason::Malformed)?;
    let after = payload
        .and_then(|p| p.after)
        .ok_or(DropReason::NoAfterImage)?;
    if after.id.is_none() {
        return Err(DropReason::MissingId);
    }
    Ok(after)
}

/// Strings as-is; other scalars as their JSON text.
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Ok(Some(other.to_string())),
    }
}

fn price<'de, D>(deserializer: D) -> Result<Option<i128>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => return Err(D::Error::custom(format!("invalid price: {other}"))),
    };
    parse_price(raw.trim())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid DECIMAL(10,2) price: {raw}")))
}

/// Unscaled `DECIMAL(10,2)` value of `raw`, rounded half away from zero.
pub fn parse_price(raw: &str) -> Option<i128> {
    let decimal = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()?;
    let mut rounded =
        decimal.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_SCALE);

    let unscaled = rounded.mantissa();
    let limit = 10_i128.pow(u32::from(PRICE_PRECISION));
    (unscaled.abs() < limit).then_some(unscaled)
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {n}"))),
        Some(Value::String(s)) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {s}"))),
        Some(other) => Err(D::Error::custom(format!("invalid timestamp: {other}"))),
    }
}

/// Microseconds since the epoch for an RFC 3339 or zone-less timestamp.
///
/// Zone-less values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_micros());
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().timestamp_micros())
}
