#![allow(clippy::float_cmp)]

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::*;

fn record(id: &str, order: i64) -> ContentRecord {
    ContentRecord {
        id: id.to_owned(),
        content: RecordContent { header: Some(format!("h-{id}")), ..RecordContent::default() },
        order_index: order,
        created_at: None,
        updated_at: None,
    }
}

// --- Parsing ---

#[test]
fn parses_api_records() {
    let body = r#"[
        {"id": 7, "content": {"header": "Hello", "text": "World", "color": "blue", "link": "https://x"},
         "order_index": 2, "created_at": "2024-01-01", "updated_at": "2024-01-02"},
        {"id": "abc", "content": {}}
    ]"#;
    let records = parse_records(body).expect("parse");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "7");
    assert_eq!(records[0].header(), "Hello");
    assert_eq!(records[0].body(), "World");
    assert_eq!(records[1].header(), DEFAULT_HEADER);
    assert_eq!(records[1].icon(), DEFAULT_ICON);
    assert_eq!(records[1].body(), "");
}

#[test]
fn rejects_non_array_body() {
    assert!(parse_records(r#"{"error":"nope"}"#).is_err());
}

#[test]
fn rejects_object_id() {
    assert!(parse_records(r#"[{"id": {"x": 1}}]"#).is_err());
}

// --- Fallback ---

#[test]
fn fallback_note_shape() {
    let records = fallback_records();
    assert_eq!(records.len(), 1);
    let note = &records[0];
    assert_eq!(note.id, "fallback-note");
    assert_eq!(note.header(), "API Error");
    assert_eq!(note.body(), "Failed to load notes from API. Check connection.");
    assert_eq!(note.icon(), "\u{26a0}\u{fe0f}");
    assert_eq!(note.content.color.as_deref(), Some("red"));
}

#[test]
fn failure_yields_fallback() {
    let records = records_or_fallback::<&str>(Err("HTTP 500"));
    assert_eq!(records, fallback_records());
}

#[test]
fn success_sorts_by_order_index_stably() {
    let records = records_or_fallback::<&str>(Ok(vec![record("c", 2), record("a", 0), record("b", 2), record("d", 1)]));
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d", "c", "b"]);
}

#[test]
fn empty_success_stays_empty() {
    assert!(records_or_fallback::<&str>(Ok(vec![])).is_empty());
}

// --- Colors ---

#[test]
fn color_map_matches_palette() {
    assert_eq!(NoteColor::from_name("yellow").hex(), "#ffff33");
    assert_eq!(NoteColor::from_name("pink").hex(), "#ffb6c1");
    assert_eq!(NoteColor::from_name("blue").hex(), "#add8e6");
    assert_eq!(NoteColor::from_name("green").hex(), "#90ee90");
    assert_eq!(NoteColor::from_name("orange").hex(), "#ffa500");
    assert_eq!(NoteColor::from_name("purple").hex(), "#dda0dd");
    assert_eq!(NoteColor::from_name("red").hex(), "#ffb6c1");
    assert_eq!(NoteColor::from_name("white").hex(), "#ffffff");
    assert_eq!(NoteColor::from_name("cyan").hex(), "#e0ffff");
    assert_eq!(NoteColor::from_name("lime").hex(), "#f0fff0");
}

#[test]
fn unknown_color_is_yellow() {
    assert_eq!(NoteColor::from_name("chartreuse"), NoteColor::Yellow);
    assert_eq!(NoteColor::from_name(" Blue "), NoteColor::Blue);
}

// --- Sticky notes ---

#[test]
fn from_record_applies_defaults_and_random_style() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut rec = record("n", 4);
    rec.content.link = Some(String::new());
    let note = StickyNote::from_record(&rec, Point::new(10.0, 20.0), (220.0, 180.0), &mut rng);

    assert_eq!(note.id, "n");
    assert_eq!(note.header, "h-n");
    assert_eq!(note.icon, DEFAULT_ICON);
    assert_eq!(note.color, NoteColor::Yellow);
    assert!(note.link.is_none());
    assert_eq!(note.order_index, 4);
    assert_eq!(note.position, Point::new(10.0, 20.0));
    assert!((0.0..10.0).contains(&note.rotation_deg));
}

#[test]
fn rotation_range_holds_across_seeds() {
    for seed in 0..200 {
        let mut rng = StdRng::seed_from_u64(seed);
        let note = StickyNote::from_record(&record("n", 0), Point::new(0.0, 0.0), (1.0, 1.0), &mut rng);
        assert!(note.rotation_deg >= 0.0 && note.rotation_deg < 10.0);
    }
}
