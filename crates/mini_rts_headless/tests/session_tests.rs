//! End-to-end JSON-lines sessions against the stock skirmish.
//!
//! Skirmish ids: nodes 1-5, player base 6, enemy base 7, player workers
//! 8-12, enemy workers 13-17.

use std::io::Cursor;

use mini_rts_headless::{GameSetup, HeadlessRunner};
use serde_json::Value;

fn session(script: &str) -> Vec<Value> {
    let mut setup = GameSetup::skirmish();
    setup.config.ai.enabled = false;
    let sim = setup.simulation().unwrap();
    let mut runner = HeadlessRunner::new(sim);

    let mut output = Vec::new();
    runner.run(Cursor::new(script), &mut output).unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_session_opens_and_closes() {
    let out = session("");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["type"], "ready");
    assert_eq!(out[0]["version"], "1.0");
    assert_eq!(out[0]["tick"], 0);
    assert_eq!(out[1]["type"], "bye");
}

#[test]
fn test_quit_stops_reading() {
    let out = session("{\"cmd\":\"quit\"}\n{\"cmd\":\"tick\"}\n");
    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["ready", "bye"]);
}

#[test]
fn test_bad_lines_do_not_end_session() {
    let out = session("not json\n\n{\"cmd\":\"teleport\"}\n{\"cmd\":\"hash\"}\n");
    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["ready", "error", "error", "state_hash", "bye"]);
}

#[test]
fn test_worker_harvests_over_session() {
    let script = [
        r#"{"cmd":"select","id":8}"#,
        r#"{"cmd":"harvest","node":1}"#,
        r#"{"cmd":"tick","dt":0.5,"count":20}"#,
        r#"{"cmd":"query"}"#,
    ]
    .join("\n");
    let out = session(&script);

    assert_eq!(out[1]["type"], "ack");
    assert_eq!(out[1]["units"], 1);
    assert_eq!(out[2]["type"], "ack");
    assert_eq!(out[2]["cmd"], "harvest");

    assert_eq!(out[3]["type"], "events");
    assert_eq!(out[3]["tick"], 20);
    let harvests = out[3]["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event"] == "harvest_tick")
        .count();
    assert!(harvests > 0);

    assert_eq!(out[4]["type"], "state");
    assert!(out[4]["snapshot"]["player_resources"].as_u64().unwrap() > 0);
}

#[test]
fn test_refusals_carry_codes() {
    let script = [
        r#"{"cmd":"harvest","node":1}"#,
        r#"{"cmd":"select","id":13}"#,
        r#"{"cmd":"produce","building":6,"unit":"soldier"}"#,
    ]
    .join("\n");
    let out = session(&script);

    let codes: Vec<&str> = out[1..4]
        .iter()
        .map(|v| {
            assert_eq!(v["type"], "rejected");
            v["code"].as_str().unwrap()
        })
        .collect();
    assert_eq!(
        codes,
        vec!["no_workers_selected", "not_owned", "cannot_produce_unit"]
    );
}

#[test]
fn test_identical_scripts_give_identical_output() {
    let script = [
        r#"{"cmd":"select_area","from":{"x":200,"y":200},"to":{"x":400,"y":300}}"#,
        r#"{"cmd":"move","x":900,"y":900}"#,
        r#"{"cmd":"tick","count":100}"#,
        r#"{"cmd":"hash"}"#,
    ]
    .join("\n");
    assert_eq!(session(&script), session(&script));
}

#[test]
fn test_oversized_ticks_are_refused_and_session_continues() {
    let script = [
        r#"{"cmd":"tick","dt":2000000000}"#,
        r#"{"cmd":"tick","count":4000000000}"#,
        r#"{"cmd":"tick"}"#,
    ]
    .join("\n");
    let out = session(&script);

    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["ready", "error", "error", "events", "bye"]);
    assert_eq!(out[3]["tick"], 1);
}

#[test]
fn test_move_far_off_map_keeps_ticking() {
    let script = [
        r#"{"cmd":"select","id":8}"#,
        r#"{"cmd":"move","x":-2147483648,"y":0}"#,
        r#"{"cmd":"tick","count":100}"#,
        r#"{"cmd":"query"}"#,
    ]
    .join("\n");
    let out = session(&script);

    assert_eq!(out[2]["type"], "ack");
    assert_eq!(out[3]["type"], "events");
    assert_eq!(out[4]["type"], "state");
    let worker = out[4]["snapshot"]["units"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == 8)
        .unwrap();
    assert!(worker["position"]["x"].as_f64().unwrap() >= 0.0);
}
