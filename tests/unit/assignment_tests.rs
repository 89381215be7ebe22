use std::collections::HashMap;

use helpdesk_bridge::orchestrator::assignment::pick_operator;

fn operators(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

fn counts(entries: &[(&str, usize)]) -> HashMap<String, usize> {
    entries.iter().map(|(n, c)| ((*n).to_owned(), *c)).collect()
}

#[test]
fn picks_least_loaded() {
    let ops = operators(&["alice", "bob", "carol"]);
    let load = counts(&[("alice", 5), ("bob", 2), ("carol", 3)]);
    assert_eq!(pick_operator(&ops, &load), Some("bob"));
}

#[test]
fn ties_keep_configured_order() {
    let ops = operators(&["carol", "alice", "bob"]);
    let load = counts(&[("alice", 1), ("bob", 1), ("carol", 1)]);
    assert_eq!(pick_operator(&ops, &load), Some("carol"));
}

#[test]
fn unknown_operator_counts_as_idle() {
    let ops = operators(&["alice", "newbie"]);
    let load = counts(&[("alice", 1)]);
    assert_eq!(pick_operator(&ops, &load), Some("newbie"));
}

#[test]
fn no_operators_means_no_pick() {
    assert_eq!(pick_operator(&[], &HashMap::new()), None);
}
