// Provider/Manager contract checks run against both backends.
use dataio::api::{
    ErrorKind, FieldType, FlatFileOptions, Manager, Metadata, Provider, Row, SqlOptions, Store,
    StoreOptions, StoreRef, Value,
};
use time::macros::datetime;

fn backends(dir: &std::path::Path) -> Vec<(&'static str, Store)> {
    let options = StoreOptions::new()
        .with_flat_file(FlatFileOptions::new())
        .with_sql(SqlOptions::new());
    vec![
        (
            "flat",
            StoreRef::flat_file(dir.join("flat"))
                .open(options)
                .expect("open flat"),
        ),
        (
            "sqlite",
            StoreRef::sqlite(dir.join("store.db"))
                .open(options)
                .expect("open sqlite"),
        ),
    ]
}

fn readings() -> Metadata {
    Metadata::new("weather", "daily")
        .with_field("Station", FieldType::String)
        .with_field("Taken", FieldType::DateTime)
        .with_field("Temp", FieldType::Double)
        .with_field("Count", FieldType::Int32)
        .with_field("Valid", FieldType::Boolean)
        .with_field("Raw", FieldType::Binary)
        .with_desc("daily readings")
        .with_page_size(3)
}

fn reading(i: i64) -> Row {
    vec![
        Value::String(format!("st\t{i}")),
        Value::DateTime(datetime!(2024-03-01 12:00 UTC) + time::Duration::days(i)),
        Value::Double(i as f64 + 0.5),
        Value::Int32(i as i32),
        Value::Boolean(i % 2 == 0),
        Value::Binary(vec![i as u8, 0xff]),
    ]
}

#[test]
fn rows_round_trip_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        let rows: Vec<Row> = (0..7).map(reading).collect();
        store.add_items("weather", "daily", &rows).expect(label);

        let meta = store.get_metadata("weather", "daily").expect(label);
        assert_eq!(meta.item_count, 7, "{label}");
        assert_eq!(meta.desc, "daily readings", "{label}");
        assert!(meta.schema_equals(&readings()), "{label}");

        assert_eq!(store.get_items("weather", "daily", 0, 7).expect(label), rows, "{label}");
        assert_eq!(
            store.get_items("weather", "daily", 2, 4).expect(label),
            rows[2..6].to_vec(),
            "{label}"
        );
        assert_eq!(
            store.get_items("weather", "daily", 5, 100).expect(label),
            rows[5..].to_vec(),
            "{label}"
        );
        assert!(store.get_items("weather", "daily", 9, 3).expect(label).is_empty(), "{label}");
        assert_eq!(store.get_item("weather", "daily", 6).expect(label), rows[6], "{label}");
    }
}

#[test]
fn nulls_are_preserved() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        let row = vec![
            Value::Null,
            Value::Null,
            Value::Double(1.0),
            Value::Null,
            Value::Null,
            Value::Null,
        ];
        store.add_item("weather", "daily", &row).expect(label);
        assert_eq!(store.get_item("weather", "daily", 0).expect(label), row, "{label}");
    }
}

#[test]
fn listing_reflects_datasets() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        assert!(store.list_folders().expect(label).is_empty(), "{label}");
        store.add_file(&readings()).expect(label);
        store
            .add_file(&Metadata::new("weather", "hourly").with_field("T", FieldType::Double))
            .expect(label);
        store
            .add_file(&Metadata::new("lab", "runs").with_field("N", FieldType::Int64))
            .expect(label);

        assert_eq!(store.list_folders().expect(label), vec!["lab", "weather"], "{label}");
        assert_eq!(
            store.list_files("weather").expect(label),
            vec!["daily", "hourly"],
            "{label}"
        );
        assert!(store.list_files("nowhere").expect(label).is_empty(), "{label}");
        assert!(store.file_exists("lab", "runs").expect(label), "{label}");
        assert!(!store.file_exists("lab", "walks").expect(label), "{label}");
    }
}

#[test]
fn clear_items_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        let rows: Vec<Row> = (0..5).map(reading).collect();
        store.add_items("weather", "daily", &rows).expect(label);

        store.clear_items("weather", "daily").expect(label);
        store.clear_items("weather", "daily").expect(label);
        let meta = store.get_metadata("weather", "daily").expect(label);
        assert_eq!(meta.item_count, 0, "{label}");
        assert!(meta.schema_equals(&readings()), "{label}");

        store.add_items("weather", "daily", &rows[..2]).expect(label);
        assert_eq!(store.get_items("weather", "daily", 0, 5).expect(label), rows[..2].to_vec());
    }
}

#[test]
fn edit_with_new_schema_drops_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        store
            .add_items("weather", "daily", &[reading(0), reading(1)])
            .expect(label);

        let relabeled = readings().with_desc("relabeled").with_default_field(2);
        store.edit_file(&relabeled).expect(label);
        let meta = store.get_metadata("weather", "daily").expect(label);
        assert_eq!(meta.item_count, 2, "{label}");
        assert_eq!(meta.desc, "relabeled", "{label}");
        assert_eq!(meta.default_field, 2, "{label}");

        let reshaped = Metadata::new("weather", "daily")
            .with_field("Station", FieldType::String)
            .with_field("Temp", FieldType::Int16);
        store.edit_file(&reshaped).expect(label);
        let meta = store.get_metadata("weather", "daily").expect(label);
        assert_eq!(meta.item_count, 0, "{label}");
        assert!(meta.schema_equals(&reshaped), "{label}");
    }
}

#[test]
fn remove_file_forgets_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        store.add_items("weather", "daily", &[reading(0)]).expect(label);
        store.remove_file("weather", "daily").expect(label);

        assert!(!store.file_exists("weather", "daily").expect(label), "{label}");
        let err = store.get_metadata("weather", "daily").expect_err(label);
        assert_eq!(err.kind(), ErrorKind::NotFound, "{label}");

        store.add_file(&readings()).expect(label);
        assert_eq!(
            store.get_metadata("weather", "daily").expect(label).item_count,
            0,
            "{label}"
        );
    }
}

#[test]
fn contract_errors_use_stable_kinds() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);

        let err = store.add_file(&readings()).expect_err(label);
        assert_eq!(err.kind(), ErrorKind::AlreadyExists, "{label}");
        assert_eq!(err.dataset(), Some("weather/daily"), "{label}");

        let mut weekly = readings();
        weekly.file_name = "weekly".to_string();
        for err in [
            store.get_metadata("weather", "weekly").expect_err(label),
            store.edit_file(&weekly).expect_err(label),
            store.clear_items("weather", "weekly").expect_err(label),
            store.remove_file("weather", "weekly").expect_err(label),
            store.add_items("weather", "weekly", &[reading(0)]).expect_err(label),
        ] {
            assert_eq!(err.kind(), ErrorKind::NotFound, "{label}: {err}");
        }

        let err = store.get_items("weather", "daily", -1, 2).expect_err(label);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{label}");
        let err = store.get_items("weather", "daily", 0, -2).expect_err(label);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{label}");
        let err = store.get_item("weather", "daily", 0).expect_err(label);
        assert_eq!(err.kind(), ErrorKind::OutOfRange, "{label}");

        let empty = Metadata::new("weather", "bare");
        assert_eq!(store.add_file(&empty).expect_err(label).kind(), ErrorKind::InvalidArgument);
        let bad_name = Metadata::new("wea/ther", "x").with_field("N", FieldType::Int64);
        assert_eq!(
            store.add_file(&bad_name).expect_err(label).kind(),
            ErrorKind::InvalidArgument
        );
    }
}

#[test]
fn mistyped_rows_are_reported_and_others_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        let mut bad = reading(1);
        bad[3] = Value::String("three".to_string());
        let err = store
            .add_items("weather", "daily", &[reading(0), bad, reading(2), vec![Value::Null]])
            .expect_err(label);
        assert_eq!(err.kind(), ErrorKind::Aggregate, "{label}");
        assert_eq!(err.failures().len(), 2, "{label}");
        assert!(
            err.failures()
                .iter()
                .all(|failure| failure.kind() == ErrorKind::InvalidArgument),
            "{label}"
        );

        assert_eq!(
            store.get_items("weather", "daily", 0, 10).expect(label),
            vec![reading(0), reading(2)],
            "{label}"
        );
    }
}

#[test]
fn unformattable_timestamps_are_collected_per_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ancient = time::Date::from_calendar_date(-1, time::Month::January, 1)
        .expect("date")
        .midnight()
        .assume_utc();
    for (label, store) in backends(dir.path()) {
        store.add_file(&readings()).expect(label);
        store.add_item("weather", "daily", &reading(0)).expect(label);

        let mut bad = reading(2);
        bad[1] = Value::DateTime(ancient);
        let err = store
            .add_items("weather", "daily", &[reading(1), bad, reading(2)])
            .expect_err(label);
        assert_eq!(err.kind(), ErrorKind::Aggregate, "{label}");
        assert_eq!(err.failures().len(), 1, "{label}");
        assert_eq!(err.failures()[0].kind(), ErrorKind::InvalidArgument, "{label}");
        assert_eq!(err.failures()[0].index(), Some(1), "{label}");
        assert_eq!(
            store.get_metadata("weather", "daily").expect(label).item_count,
            3,
            "{label}"
        );

        store.add_item("weather", "daily", &reading(3)).expect(label);
        let expected: Vec<Row> = (0..4).map(reading).collect();
        assert_eq!(store.get_items("weather", "daily", 0, 10).expect(label), expected, "{label}");
    }
}

#[test]
fn dotted_identities_stay_distinct() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (label, store) in backends(dir.path()) {
        let dotted_file = Metadata::new("a", "b.c").with_field("N", FieldType::Int64);
        store.add_file(&dotted_file).expect(label);
        store
            .add_items("a", "b.c", &[vec![Value::Int64(1)], vec![Value::Int64(2)]])
            .expect(label);

        let dotted_folder = Metadata::new("a.b", "c").with_field("S", FieldType::String);
        let err = store.add_file(&dotted_folder).expect_err(label);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{label}");

        let meta = store.get_metadata("a", "b.c").expect(label);
        assert!(meta.schema_equals(&dotted_file), "{label}");
        assert_eq!(meta.item_count, 2, "{label}");
        assert_eq!(store.list_folders().expect(label), vec!["a"], "{label}");
    }
}
