//! Concurrent access to one shared `StateCache`.

use std::thread;

use regolith_core::aggregate::AggregateData;
use regolith_core::cache::StateCache;
use regolith_core::types::{Diagnostic, Location};
use serde_json::json;

fn diag(code: &str) -> Diagnostic {
    Diagnostic::new(code, "violation", Location::new(1, 1))
}

#[test]
fn writers_on_different_stores_do_not_interfere() {
    let cache = StateCache::new();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                cache.set_file_contents(&format!("file:///{i}.rego"), format!("package p{i}\n"));
            }
        });
        s.spawn(|| {
            for i in 0..200 {
                cache.set_successful_parse_line_count(&format!("file:///{i}.rego"), i);
            }
        });
        s.spawn(|| {
            for i in 0..200 {
                let mut data = AggregateData::new();
                data.insert("rule".to_string(), vec![json!(i)]);
                cache.set_file_aggregates(&format!("file:///{i}.rego"), data);
            }
        });
    });

    assert_eq!(cache.get_all_files().len(), 200);
    assert_eq!(cache.get_successful_parse_line_count("file:///7.rego"), Some(7));
    assert_eq!(cache.get_file_aggregates::<&str>(&[]).len(), 200);
}

#[test]
fn partial_diagnostic_updates_are_not_lost() {
    let cache = StateCache::new();
    let uri = "file:///shared.rego";
    cache.set_file_diagnostics(uri, vec![diag("keep-me")]);

    let codes: Vec<String> = (0..16).map(|i| format!("rule-{i}")).collect();
    thread::scope(|s| {
        for code in &codes {
            let cache = &cache;
            s.spawn(move || {
                for _ in 0..25 {
                    cache.set_file_diagnostics_for_rules(uri, &[code.as_str()], vec![diag(code)]);
                }
            });
        }
    });

    let diagnostics = cache.get_file_diagnostics(uri).unwrap();
    assert_eq!(diagnostics[0].code, "keep-me");
    assert_eq!(diagnostics.len(), 1 + codes.len());
    for code in &codes {
        assert_eq!(diagnostics.iter().filter(|d| &d.code == code).count(), 1);
    }
}

#[test]
fn delete_and_rename_race_settles() {
    let cache = StateCache::new();
    for i in 0..100 {
        let uri = format!("file:///{i}.rego");
        cache.set_file_contents(&uri, "package p\n");
        cache.set_file_diagnostics(&uri, vec![diag("x")]);
    }

    thread::scope(|s| {
        s.spawn(|| {
            for i in (0..100).step_by(2) {
                cache.delete(&format!("file:///{i}.rego"));
            }
        });
        s.spawn(|| {
            for i in (1..100).step_by(2) {
                cache.rename(&format!("file:///{i}.rego"), &format!("file:///moved/{i}.rego"));
            }
        });
    });

    assert_eq!(cache.get_all_files().len(), 50);
    assert!(cache.get_file_contents("file:///0.rego").is_none());
    assert!(cache.get_file_diagnostics("file:///0.rego").is_none());
    assert!(cache.get_file_diagnostics("file:///moved/1.rego").is_some());
}
