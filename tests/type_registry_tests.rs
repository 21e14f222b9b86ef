use std::collections::HashSet;
use std::thread;

use replay_logger::type_registry::{register_type, render_custom, set_renderer, type_name};
use replay_logger::LogValue;

#[test]
fn test_concurrent_registration_agrees_on_ids() {
    let names = ["types::A", "types::B", "types::C", "types::D"];

    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(move || names.map(register_type)))
        .collect();
    let results: Vec<[u16; 4]> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for ids in &results {
        assert_eq!(ids, &results[0]);
    }
    let unique: HashSet<u16> = results[0].iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert!(!unique.contains(&0));
    for (name, id) in names.iter().zip(results[0]) {
        assert_eq!(type_name(id), Some(*name));
    }
}

#[test]
fn test_renderer_is_used_for_display() {
    let id = register_type("types::Celsius");
    assert!(set_renderer(id, |bytes| format!("{}°C", bytes.first().copied().unwrap_or(0))));

    let value = LogValue::Custom {
        type_id: id,
        bytes: vec![21],
    };
    assert_eq!(value.to_string(), "21°C");
    assert_eq!(value.type_name(), "types::Celsius");
}

#[test]
fn test_missing_renderer_falls_back() {
    let id = register_type("types::Opaque");
    assert_eq!(render_custom(id, &[1, 2, 3]), "<types::Opaque: 3 bytes>");
    assert_eq!(render_custom(0, &[]), "<unregistered type: 0 bytes>");
    assert_eq!(render_custom(u16::MAX, &[7]), "<unregistered type: 1 bytes>");
}

#[test]
fn test_set_renderer_on_unknown_id() {
    assert!(!set_renderer(0, |_| String::new()));
    assert!(!set_renderer(u16::MAX, |_| String::new()));
    assert_eq!(type_name(0), None);
}
