//! Feed Parser — normalizes a heterogeneous wire message into
//! `(asset_id, FeedEvent)` pairs.

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::model::{AssetId, BookChange, BookSide};

/// The normalized event set a parsed message can produce.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Snapshot {
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
        raw: Value,
    },
    Top {
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        raw: Value,
    },
    Changes {
        changes: Vec<BookChange>,
        raw: Value,
    },
    Unknown {
        raw: Value,
    },
}

/// Fields commonly emitted by prediction-market CLOB feeds for the asset
/// identifier, checked in order; first hit wins.
const ASSET_ID_FIELDS: &[&str] = &["asset_id", "assetId", "token_id", "tokenId"];

pub fn extract_asset_id(value: &Value) -> Option<AssetId> {
    for field in ASSET_ID_FIELDS {
        if let Some(s) = value.get(field).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    None
}

/// Parses one inbound wire frame, which may be a single object, an array
/// of objects (processed element-wise), or a batch wrapper carrying a
/// `price_changes` array whose elements inherit the wrapper's `timestamp`,
/// `market`, and `event_type` fields when absent on the element.
///
/// Returns one `(asset_id, event)` pair per recognized element; elements
/// with no extractable asset id are dropped.
pub fn parse_message(frame: &Value) -> Vec<(AssetId, FeedEvent)> {
    match frame {
        Value::Array(items) => items.iter().flat_map(parse_message).collect(),
        Value::Object(_) => {
            if let Some(batch) = frame.get("price_changes").and_then(Value::as_array) {
                return batch
                    .iter()
                    .map(|elem| inherit_wrapper_fields(frame, elem))
                    .flat_map(|elem| parse_single(&elem).into_iter().collect::<Vec<_>>())
                    .collect();
            }
            parse_single(frame).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn inherit_wrapper_fields(wrapper: &Value, elem: &Value) -> Value {
    let mut merged = elem.clone();
    if let (Some(obj), Value::Object(wrapper_obj)) = (merged.as_object_mut(), wrapper) {
        for field in ["timestamp", "market", "event_type"] {
            if !obj.contains_key(field) {
                if let Some(v) = wrapper_obj.get(field) {
                    obj.insert(field.to_string(), v.clone());
                }
            }
        }
    }
    merged
}

fn parse_single(msg: &Value) -> Option<(AssetId, FeedEvent)> {
    let asset_id = extract_asset_id(msg)?;

    let has_bids_asks = msg.get("bids").is_some_and(Value::is_array)
        && msg.get("asks").is_some_and(Value::is_array);
    let has_top = msg.get("best_bid").is_some() || msg.get("best_ask").is_some();
    let has_changes = msg.get("changes").is_some_and(Value::is_array);

    let event = if has_bids_asks {
        FeedEvent::Snapshot {
            bids: parse_levels(msg.get("bids")),
            asks: parse_levels(msg.get("asks")),
            raw: msg.clone(),
        }
    } else if has_top {
        FeedEvent::Top {
            best_bid: parse_decimal_field(msg.get("best_bid")),
            best_ask: parse_decimal_field(msg.get("best_ask")),
            raw: msg.clone(),
        }
    } else if has_changes {
        FeedEvent::Changes {
            changes: parse_changes(msg.get("changes")),
            raw: msg.clone(),
        }
    } else {
        debug!(asset_id = %asset_id, "unrecognized message shape");
        FeedEvent::Unknown { raw: msg.clone() }
    };

    Some((asset_id, event))
}

fn parse_decimal_field(v: Option<&Value>) -> Option<Decimal> {
    match v {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Book levels may arrive as `[price, size]` pairs or `{price, size|quantity}`
/// objects. Entries that fail to parse are dropped silently (logged).
fn parse_levels(v: Option<&Value>) -> Vec<(Decimal, Decimal)> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items.iter().filter_map(parse_level).collect()
}

fn parse_level(item: &Value) -> Option<(Decimal, Decimal)> {
    match item {
        Value::Array(pair) if pair.len() >= 2 => {
            let price = parse_decimal_any(&pair[0])?;
            let size = parse_decimal_any(&pair[1])?;
            Some((price, size))
        }
        Value::Object(_) => {
            let price = parse_decimal_any(item.get("price")?)?;
            let size = item
                .get("size")
                .or_else(|| item.get("quantity"))
                .and_then(parse_decimal_any)?;
            Some((price, size))
        }
        _ => {
            debug!(level = %item, "dropping unparseable book level");
            None
        }
    }
}

/// Changes may arrive as `[side, price, size]` triples or
/// `{side|type, price, size|quantity}` objects. Unknown side tags are
/// ignored (the whole change entry is dropped).
fn parse_changes(v: Option<&Value>) -> Vec<BookChange> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items.iter().filter_map(parse_change).collect()
}

fn parse_change(item: &Value) -> Option<BookChange> {
    match item {
        Value::Array(tuple) if tuple.len() >= 3 => {
            let side = parse_side(tuple[0].as_str()?)?;
            let price = parse_decimal_any(&tuple[1])?;
            let size = parse_decimal_any(&tuple[2])?;
            Some(BookChange { side, price, size })
        }
        Value::Object(_) => {
            let side_str = item
                .get("side")
                .or_else(|| item.get("type"))
                .and_then(Value::as_str)?;
            let side = parse_side(side_str)?;
            let price = parse_decimal_any(item.get("price")?)?;
            let size = item
                .get("size")
                .or_else(|| item.get("quantity"))
                .and_then(parse_decimal_any)?;
            Some(BookChange { side, price, size })
        }
        _ => None,
    }
}

fn parse_side(s: &str) -> Option<BookSide> {
    match s.to_lowercase().as_str() {
        "buy" | "bid" => Some(BookSide::Bid),
        "sell" | "ask" => Some(BookSide::Ask),
        _ => {
            debug!(side = %s, "ignoring unknown change side tag");
            None
        }
    }
}

fn parse_decimal_any(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}
