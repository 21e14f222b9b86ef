use replay_logger::sink::MemorySink;
use replay_logger::type_registry::{register_type, set_renderer};
use replay_logger::{
    log_get, log_info, FlushMode, FromLogValue, LogConfig, LogStream, LogValue, Locator, Loggable,
    Occurrence, QueryError,
};

fn quiet_stream() -> LogStream {
    LogStream::new(
        LogConfig::default()
            .with_flush_mode(FlushMode::Append)
            .with_live_output(false),
    )
    .unwrap()
}

#[test]
fn test_get_field_by_location() {
    let stream = quiet_stream();
    let line = line!(); log_info!(&stream => "sum={sum}, i={i}", 10, 1);

    let here = Locator::at(file!(), line);
    assert_eq!(stream.get_field::<i32>(here, "sum").unwrap(), 10);
    assert_eq!(stream.get_field::<i32>(here, "i").unwrap(), 1);

    let missing = stream.get_field::<i32>(here, "missing").unwrap_err();
    assert!(missing.is_not_found());
    assert!(matches!(missing, QueryError::FieldNotFound { .. }));

    let nowhere = stream.get_field::<i32>(Locator::at(file!(), line + 1000), "sum").unwrap_err();
    assert!(matches!(nowhere, QueryError::RecordNotFound { .. }));
}

#[test]
fn test_type_mismatch_is_checked() {
    let stream = quiet_stream();
    let line = line!(); log_info!(&stream => "ratio={ratio}, name={name}, big={big}", 0.5f32, "node-1", 300i32);
    let record = stream.find(Locator::at(file!(), line), Occurrence::First).unwrap();

    assert_eq!(record.get::<f32>("ratio").unwrap(), 0.5);
    assert_eq!(record.get::<f64>("ratio").unwrap(), 0.5);
    assert_eq!(record.get::<String>("name").unwrap(), "node-1");
    assert_eq!(record.get::<i64>("big").unwrap(), 300);
    assert_eq!(record.get::<u16>("big").unwrap(), 300);

    let err = record.get::<i32>("ratio").unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(
        err,
        QueryError::TypeMismatch {
            field: "ratio".into(),
            expected: "i32",
            found: "f32",
        }
    );
    assert!(record.get::<u8>("big").unwrap_err().is_type_mismatch());
    assert!(record.get::<bool>("name").unwrap_err().is_type_mismatch());
}

#[test]
fn test_occurrences() {
    let stream = quiet_stream();
    let mut line = 0;
    for i in 0..5u32 {
        line = line!(); log_info!(&stream => "attempt {n}", i * 10);
    }
    let here = Locator::at(file!(), line);

    assert_eq!(stream.count(here), 5);
    assert_eq!(stream.get_field_at::<u32>(here, "n", Occurrence::First).unwrap(), 0);
    assert_eq!(stream.get_field_at::<u32>(here, "n", Occurrence::Last).unwrap(), 40);
    assert_eq!(stream.get_field_at::<u32>(here, "n", Occurrence::Nth(2)).unwrap(), 20);
    assert!(stream
        .get_field_at::<u32>(here, "n", Occurrence::Nth(5))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_iter_template_is_restartable() {
    let stream = quiet_stream();
    let mut sum = 0;
    for i in 1..=4 {
        sum += i;
        log_info!(&stream => "sum={sum}, i={i}", sum, i);
        log_info!(&stream => "unrelated {i}", i);
    }

    let mut cursor = stream.iter_template("sum={sum}, i={i}");
    let first: Vec<i32> = cursor.by_ref().map(|r| r.get("sum").unwrap()).collect();
    assert_eq!(first, vec![1, 3, 6, 10]);
    assert!(cursor.next().is_none());

    cursor.restart();
    let second: Vec<i32> = cursor.map(|r| r.get("i").unwrap()).collect();
    assert_eq!(second, vec![1, 2, 3, 4]);

    assert_eq!(stream.records().count(), 8);
}

#[test]
fn test_iter_matching_predicate() {
    let stream = quiet_stream();
    for n in 0..10i64 {
        log_info!(&stream => "value {n}", n);
    }

    let even: Vec<i64> = stream
        .iter_matching(|record| record.get::<i64>("n").map_or(false, |n| n % 2 == 0))
        .map(|record| record.get("n").unwrap())
        .collect();
    assert_eq!(even, vec![0, 2, 4, 6, 8]);
}

#[test]
fn test_cursor_ends_when_stream_is_flushed() {
    let stream = quiet_stream();
    log_info!(&stream => "first");
    log_info!(&stream => "second");

    let mut cursor = stream.records();
    assert!(cursor.next().is_some());
    stream.flush();
    assert!(cursor.next().is_none());

    log_info!(&stream => "third");
    cursor.restart();
    let messages: Vec<String> = cursor.map(|r| r.message().unwrap()).collect();
    assert_eq!(messages, vec!["third"]);
}

#[test]
fn test_message_locator() {
    let stream = quiet_stream();
    log_info!(&stream => "CacheHit: input = {input}", 42u32);
    log_info!(&stream => "CacheMiss: input = {input}", 7u32);

    assert_eq!(log_get!(&stream => "CacheHit", input, u32).unwrap(), 42);
    assert_eq!(log_get!(&stream => "CacheMiss", input, u64).unwrap(), 7);
    assert!(log_get!(&stream => "CacheHit", output, u32).unwrap_err().is_not_found());

    assert_eq!(stream.count(Locator::message(module_path!(), "Cache")), 2);
    assert_eq!(stream.count(Locator::message("query_tests", "CacheHit")), 1);
    assert_eq!(stream.count(Locator::message("elsewhere", "CacheHit")), 0);
}

#[test]
fn test_locate_by_site() {
    let stream = quiet_stream();
    let handle = log_info!(&stream => "id={id}", 5u8).unwrap();
    log_info!(&stream => "id={id}", 6u8);

    let site = handle.site();
    assert_eq!(stream.count(Locator::site(site)), 1);
    let record = stream.record(&handle).unwrap();
    assert_eq!(record.get::<u8>("id").unwrap(), 5);
    assert_eq!(record.get_index::<u8>(0).unwrap(), 5);
    assert!(record.get_index::<u8>(1).unwrap_err().is_not_found());
}

#[test]
fn test_anonymous_placeholders_by_index() {
    let stream = quiet_stream();
    let handle = log_info!(&stream => "{} -> {}", 'a', 'b').unwrap();
    let record = stream.record(&handle).unwrap();

    assert_eq!(record.get_index::<char>(1).unwrap(), 'b');
    assert!(record.get::<char>("").unwrap_err().is_not_found());
    assert_eq!(record.message().unwrap(), "a -> b");
}

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

fn point_type() -> u16 {
    let id = register_type("query_tests::Point");
    set_renderer(id, |bytes| match Point::decode(bytes) {
        Some(p) => format!("({}, {})", p.x, p.y),
        None => "<bad point>".to_owned(),
    });
    id
}

impl Point {
    fn decode(bytes: &[u8]) -> Option<Self> {
        let x = i32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?);
        let y = i32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?);
        Some(Point { x, y })
    }
}

impl Loggable for Point {
    fn to_log_value(&self) -> LogValue {
        let mut bytes = self.x.to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.y.to_le_bytes());
        LogValue::Custom {
            type_id: point_type(),
            bytes,
        }
    }
}

impl FromLogValue for Point {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match value {
            LogValue::Custom { type_id, bytes } if *type_id == point_type() => Point::decode(bytes),
            _ => None,
        }
    }
}

#[test]
fn test_custom_value_type() {
    let lines = MemorySink::new();
    let stream = LogStream::builder().text_sink(lines.clone()).build().unwrap();

    let handle = log_info!(&stream => "moved to {pos}", Point { x: 3, y: -4 }).unwrap();
    let record = stream.record(&handle).unwrap();

    assert_eq!(record.get::<Point>("pos").unwrap(), Point { x: 3, y: -4 });
    let err = record.get::<String>("pos").unwrap_err();
    assert_eq!(
        err,
        QueryError::TypeMismatch {
            field: "pos".into(),
            expected: "alloc::string::String",
            found: "query_tests::Point",
        }
    );
    assert!(lines.lines()[0].ends_with("moved to (3, -4)"));
}
