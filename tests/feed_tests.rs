//! Feed Parser tests: wire message shapes and the asset-id extraction
//! invariant.

use gamma_basket_arb::feed::{extract_asset_id, parse_message, FeedEvent};
use gamma_basket_arb::model::BookSide;
use serde_json::json;

#[test]
fn asset_id_field_priority() {
    assert_eq!(
        extract_asset_id(&json!({"asset_id": "a", "assetId": "b"})),
        Some("a".to_string()),
        "asset_id wins over assetId"
    );
    assert_eq!(
        extract_asset_id(&json!({"assetId": "b", "token_id": "c"})),
        Some("b".to_string())
    );
    assert_eq!(
        extract_asset_id(&json!({"token_id": "c", "tokenId": "d"})),
        Some("c".to_string())
    );
    assert_eq!(extract_asset_id(&json!({"tokenId": "d"})), Some("d".to_string()));
    assert_eq!(extract_asset_id(&json!({"unrelated": 1})), None);
}

#[test]
fn no_asset_id_field_drops_the_message() {
    let out = parse_message(&json!({"bids": [], "asks": []}));
    assert!(out.is_empty(), "no recognized asset-id field means no event is emitted");
}

#[test]
fn snapshot_shape_with_array_levels() {
    let msg = json!({
        "asset_id": "a1",
        "bids": [["0.48", "100"], ["0.47", "50"]],
        "asks": [["0.52", "100"]],
    });
    let out = parse_message(&msg);
    assert_eq!(out.len(), 1);
    let (asset_id, event) = &out[0];
    assert_eq!(asset_id, "a1");
    match event {
        FeedEvent::Snapshot { bids, asks, .. } => {
            assert_eq!(bids.len(), 2);
            assert_eq!(asks.len(), 1);
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[test]
fn snapshot_shape_with_object_levels_and_quantity_alias() {
    let msg = json!({
        "asset_id": "a1",
        "bids": [{"price": "0.48", "quantity": "100"}],
        "asks": [{"price": "0.52", "size": "10"}],
    });
    let out = parse_message(&msg);
    let (_, event) = &out[0];
    match event {
        FeedEvent::Snapshot { bids, asks, .. } => {
            assert_eq!(bids[0].1, "100".parse().unwrap());
            assert_eq!(asks[0].1, "10".parse().unwrap());
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[test]
fn top_shape_with_only_best_bid() {
    let msg = json!({"asset_id": "a1", "best_bid": "0.48"});
    let out = parse_message(&msg);
    match &out[0].1 {
        FeedEvent::Top { best_bid, best_ask, .. } => {
            assert_eq!(*best_bid, Some("0.48".parse().unwrap()));
            assert_eq!(*best_ask, None);
        }
        other => panic!("expected Top, got {other:?}"),
    }
}

#[test]
fn changes_shape_tuple_and_object_forms() {
    let msg = json!({
        "asset_id": "a1",
        "changes": [
            ["buy", "0.48", "10"],
            {"side": "sell", "price": "0.52", "size": "0"},
            {"type": "bid", "price": "0.47", "quantity": "5"},
        ],
    });
    let out = parse_message(&msg);
    match &out[0].1 {
        FeedEvent::Changes { changes, .. } => {
            assert_eq!(changes.len(), 3);
            assert_eq!(changes[0].side, BookSide::Bid);
            assert_eq!(changes[1].side, BookSide::Ask);
            assert_eq!(changes[2].side, BookSide::Bid);
        }
        other => panic!("expected Changes, got {other:?}"),
    }
}

#[test]
fn unknown_side_tag_drops_that_change_entry() {
    let msg = json!({
        "asset_id": "a1",
        "changes": [["buy", "0.48", "10"], ["weird", "0.40", "10"]],
    });
    let out = parse_message(&msg);
    match &out[0].1 {
        FeedEvent::Changes { changes, .. } => assert_eq!(changes.len(), 1),
        other => panic!("expected Changes, got {other:?}"),
    }
}

#[test]
fn unrecognized_shape_is_unknown() {
    let msg = json!({"asset_id": "a1", "weird_field": 42});
    let out = parse_message(&msg);
    match &out[0].1 {
        FeedEvent::Unknown { .. } => {}
        other => panic!("expected Unknown, got {other:?}"),
    }
}

#[test]
fn batched_price_changes_wrapper_is_flattened_and_inherits_fields() {
    let msg = json!({
        "timestamp": "123",
        "market": "m1",
        "event_type": "price_change",
        "price_changes": [
            {"asset_id": "a1", "best_bid": "0.48"},
            {"asset_id": "a2", "best_bid": "0.30", "timestamp": "999"},
        ],
    });
    let out = parse_message(&msg);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0, "a1");
    assert_eq!(out[1].0, "a2");

    // Element with its own timestamp keeps it; the first inherits the wrapper's.
    if let FeedEvent::Top { raw, .. } = &out[0].1 {
        assert_eq!(raw.get("timestamp").unwrap(), "123");
        assert_eq!(raw.get("market").unwrap(), "m1");
    } else {
        panic!("expected Top event");
    }
    if let FeedEvent::Top { raw, .. } = &out[1].1 {
        assert_eq!(raw.get("timestamp").unwrap(), "999");
    } else {
        panic!("expected Top event");
    }
}

#[test]
fn list_shaped_frame_is_processed_element_wise() {
    let msg = json!([
        {"asset_id": "a1", "best_bid": "0.48"},
        {"asset_id": "a2", "best_bid": "0.30"},
    ]);
    let out = parse_message(&msg);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0, "a1");
    assert_eq!(out[1].0, "a2");
}

#[test]
fn malformed_level_is_dropped_silently() {
    let msg = json!({
        "asset_id": "a1",
        "bids": [["not-a-number", "10"], ["0.48", "10"]],
        "asks": [],
    });
    let out = parse_message(&msg);
    match &out[0].1 {
        FeedEvent::Snapshot { bids, .. } => assert_eq!(bids.len(), 1, "unparseable level is dropped, not fatal"),
        other => panic!("expected Snapshot, got {other:?}"),
    }
}
