//! Property-based tests for site records in the settings store.
//!
//! Any committed tuple written under a host reads back unchanged, and any
//! JSON shape found under a site key reads without failing.

use proptest::prelude::*;
use serde_json::Value;

use typeset::services::editor_form::{commit_numeric, Control};
use typeset::services::settings_store::{SettingsStore, SettingsStoreTrait};
use typeset::types::settings::{Direction, SiteSettings, StyleTuple};

fn arb_host() -> impl Strategy<Value = String> {
    (
        proptest::option::of("[a-z]{2,6}\\."),
        "[a-z][a-z0-9-]{1,12}",
        prop_oneof![Just(".com"), Just(".org"), Just(".ir"), Just(".co.uk")],
    )
        .prop_map(|(sub, name, tld)| format!("{}{}{}", sub.unwrap_or_default(), name, tld))
}

fn arb_numeric(control: Control) -> impl Strategy<Value = Option<f64>> {
    proptest::option::of(-100.0f64..100.0).prop_map(move |v| {
        v.and_then(|v| commit_numeric(control, &v.to_string()))
    })
}

fn arb_tuple() -> impl Strategy<Value = StyleTuple> {
    (
        prop_oneof![
            Just(String::new()),
            Just("Vazirmatn".to_string()),
            Just("Tahoma".to_string()),
            "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,8})?",
        ],
        prop_oneof![Just(Direction::Default), Just(Direction::Rtl), Just(Direction::Ltr)],
        arb_numeric(Control::FontSize),
        arb_numeric(Control::LineHeight),
        prop_oneof![Just(String::new()), Just("bold".to_string()), "[1-9]00"],
        arb_numeric(Control::LetterSpacing),
        arb_numeric(Control::WordSpacing),
    )
        .prop_map(
            |(font, direction, font_size, line_height, font_weight, letter_spacing, word_spacing)| {
                StyleTuple {
                    font,
                    direction,
                    font_size,
                    line_height,
                    font_weight,
                    letter_spacing,
                    word_spacing,
                }
            },
        )
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![
                    Just("font".to_string()),
                    Just("fontSize".to_string()),
                    Just("direction".to_string()),
                    Just("lineHeight".to_string()),
                    "[a-z]{1,6}",
                ],
                inner,
                0..5
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// Property 1: a written record reads back exactly, or as absent when it
// overrides nothing.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn site_record_reads_back(host in arb_host(), tuple in arb_tuple()) {
        let store = SettingsStore::in_memory().expect("store");
        store.set_site(&SiteSettings::new(&host, tuple.clone())).expect("set_site");

        let read = store.get_site(&host).expect("get_site");
        if tuple.is_empty() {
            prop_assert_eq!(read, None);
        } else {
            let record = read.expect("record present");
            prop_assert_eq!(record.host, host);
            prop_assert_eq!(record.style, tuple);
        }
    }

    #[test]
    fn later_write_wins(host in arb_host(), first in arb_tuple(), second in arb_tuple()) {
        let store = SettingsStore::in_memory().expect("store");
        store.set_site(&SiteSettings::new(&host, first)).expect("first write");
        store.set_site(&SiteSettings::new(&host, second.clone())).expect("second write");
        let style = store.get_site(&host).expect("get_site").map(|r| r.style).unwrap_or_default();
        prop_assert_eq!(style, second);
    }
}

// Property 2: stored values are never validated, so any shape must read
// as some tuple.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn arbitrary_stored_value_reads_leniently(value in arb_json()) {
        let record = SiteSettings::from_value(&value);
        for number in [
            record.style.font_size,
            record.style.line_height,
            record.style.letter_spacing,
            record.style.word_spacing,
        ]
        .into_iter()
        .flatten()
        {
            prop_assert!(number.is_finite());
        }
        if !value.is_object() {
            prop_assert!(record.is_empty());
        }
    }
}
