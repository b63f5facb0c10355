use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv_query::{
    query_csv, ColumnRef, EncodingOption, ErrorKind, IndexCol, ParseOptions, Value,
};
use pretty_assertions::assert_eq;

fn write_fixture(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

fn header_and_rows(table: &csv_query::Table) -> (Vec<String>, Vec<Vec<Value>>) {
    (
        table.column_names().into_iter().map(String::from).collect(),
        table.to_rows(),
    )
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn s(v: &str) -> Value {
    Value::from(v)
}

fn i(v: i64) -> Value {
    Value::Integer(v)
}

const ESCAPE_FORMULAS_CSV: &[u8] = b"foo,bar,baz\nasdf,=nope,True\n=[what],qwerty,\n";

#[test]
fn escape_formulas_true_prefixes_leading_equals() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_escape_formulas.csv", ESCAPE_FORMULAS_CSV);

    let table = query_csv(&path, &ParseOptions::default(), None, true).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["foo", "bar", "baz"]),
            vec![
                vec![s("asdf"), s("'=nope"), Value::Boolean(true)],
                vec![s("'=[what]"), s("qwerty"), Value::Missing],
            ]
        )
    );
}

#[test]
fn escape_formulas_false_leaves_cells_alone() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_escape_formulas.csv", ESCAPE_FORMULAS_CSV);

    let table = query_csv(&path, &ParseOptions::default(), None, false).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["foo", "bar", "baz"]),
            vec![
                vec![s("asdf"), s("=nope"), Value::Boolean(true)],
                vec![s("=[what]"), s("qwerty"), Value::Missing],
            ]
        )
    );
}

#[test]
fn sql_query_selects_and_filters() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_sql_query.csv", b"a,b,c\n1,2,3\n2,3,4\n3,4,5\n");

    let table = query_csv(
        &path,
        &ParseOptions::default(),
        Some("SELECT a,b FROM df WHERE c>3"),
        false,
    )
    .expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (names(&["a", "b"]), vec![vec![i(2), i(3)], vec![i(3), i(4)]])
    );
}

#[test]
fn escaping_applies_to_query_output() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "formulas.csv", b"a,b\n1,x\n2,y\n");

    let table = query_csv(
        &path,
        &ParseOptions::default(),
        Some("SELECT '=' || b AS f FROM df ORDER BY a DESC"),
        true,
    )
    .expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (names(&["f"]), vec![vec![s("'=y")], vec![s("'=x")]])
    );
}

const PARSE_OPTIONS_CSV: &[u8] =
    b"a,b,c\n1,20221003T182105,True\n2,20221003T182106,False\n3,20221003T182107,\n";

#[test]
fn parse_options_baseline_keeps_timestamps_as_text() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_pandas_kwargs.csv", PARSE_OPTIONS_CSV);

    let table = query_csv(&path, &ParseOptions::default(), None, false).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["a", "b", "c"]),
            vec![
                vec![i(1), s("20221003T182105"), Value::Boolean(true)],
                vec![i(2), s("20221003T182106"), Value::Boolean(false)],
                vec![i(3), s("20221003T182107"), Value::Missing],
            ]
        )
    );
}

#[test]
fn parse_dates_converts_listed_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_pandas_kwargs.csv", PARSE_OPTIONS_CSV);
    let options = ParseOptions {
        parse_dates: Some(vec![ColumnRef::from("b")]),
        ..ParseOptions::default()
    };

    let table = query_csv(&path, &options, None, false).expect("query_csv");

    let at = |sec| {
        Value::DateTime(
            NaiveDate::from_ymd_opt(2022, 10, 3)
                .and_then(|d| d.and_hms_opt(18, 21, sec))
                .unwrap(),
        )
    };
    assert_eq!(
        header_and_rows(&table),
        (
            names(&["a", "b", "c"]),
            vec![
                vec![i(1), at(5), Value::Boolean(true)],
                vec![i(2), at(6), Value::Boolean(false)],
                vec![i(3), at(7), Value::Missing],
            ]
        )
    );
}

const EXTRA_COMMAS_CSV: &[u8] = b"a,b,c\n1,2,3,,\n2,3,4,,\n3,4,5,,\n";

#[test]
fn trailing_delimiters_are_ignored_by_default() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_extra_commas.csv", EXTRA_COMMAS_CSV);

    let table = query_csv(&path, &ParseOptions::default(), None, true).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["a", "b", "c"]),
            vec![
                vec![i(1), i(2), i(3)],
                vec![i(2), i(3), i(4)],
                vec![i(3), i(4), i(5)],
            ]
        )
    );
    assert!(table.index().is_empty());
}

#[test]
fn explicit_index_inference_turns_surplus_fields_into_index_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_extra_commas.csv", EXTRA_COMMAS_CSV);
    let options = ParseOptions::from_json(r#"{"index_col": null}"#).expect("options json");

    let table = query_csv(&path, &options, None, true).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["a", "b", "c"]),
            vec![
                vec![i(3), Value::Missing, Value::Missing],
                vec![i(4), Value::Missing, Value::Missing],
                vec![i(5), Value::Missing, Value::Missing],
            ]
        )
    );
    assert_eq!(table.index().len(), 2);
    assert_eq!(table.index()[0].values(), &[i(1), i(2), i(3)]);
    assert_eq!(table.index()[1].values(), &[i(2), i(3), i(4)]);
}

#[test]
fn named_index_column_is_split_off() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "indexed.csv", b"id,v\nx,1\ny,2\n");
    let options = ParseOptions {
        index_col: Some(IndexCol::Column(ColumnRef::from("id"))),
        ..ParseOptions::default()
    };

    let table = query_csv(&path, &options, None, false).expect("query_csv");

    assert_eq!(table.column_names(), vec!["v"]);
    assert_eq!(table.index()[0].name(), "id");
    assert_eq!(table.index()[0].values(), &[s("x"), s("y")]);
}

const LATIN1_CSV: &[u8] = b"a,b\n1,\xfe\n2,\xdf\n3,\xe6\n";

fn thorn_rows() -> (Vec<String>, Vec<Vec<Value>>) {
    (
        names(&["a", "b"]),
        vec![
            vec![i(1), s("þ")],
            vec![i(2), s("ß")],
            vec![i(3), s("æ")],
        ],
    )
}

fn with_encoding(encoding: &str) -> ParseOptions {
    ParseOptions {
        encoding: Some(EncodingOption::from(encoding)),
        ..ParseOptions::default()
    }
}

#[test]
fn latin1_file_read_as_latin1() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_latin1.csv", LATIN1_CSV);

    let table = query_csv(&path, &with_encoding("latin1"), None, false).expect("query_csv");

    assert_eq!(header_and_rows(&table), thorn_rows());
}

#[test]
fn latin1_file_read_as_utf8_fails_with_byte_position() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_latin1.csv", LATIN1_CSV);

    let err = query_csv(&path, &with_encoding("utf-8"), None, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(
        err.to_string(),
        "'utf-8' codec can't decode byte 0xfe in position 6: invalid start byte"
    );
}

#[test]
fn latin1_file_read_with_auto_encoding() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_latin1.csv", LATIN1_CSV);

    let table = query_csv(&path, &with_encoding("auto"), None, false).expect("query_csv");

    assert_eq!(header_and_rows(&table), thorn_rows());
}

#[test]
fn utf8_file_read_with_auto_encoding() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_utf8.csv", "a,b\n1,þ\n2,ß\n3,æ\n".as_bytes());

    let table = query_csv(&path, &with_encoding("auto"), None, false).expect("query_csv");

    assert_eq!(header_and_rows(&table), thorn_rows());
}

#[test]
fn utf8_file_read_as_latin1_is_mojibake() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_utf8.csv", "a,b\n1,þ\n2,ß\n3,æ\n".as_bytes());

    let table = query_csv(&path, &with_encoding("latin-1"), None, false).expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (
            names(&["a", "b"]),
            vec![
                vec![i(1), s("Ã¾")],
                vec![i(2), s("Ã\u{9f}")],
                vec![i(3), s("Ã¦")],
            ]
        )
    );
}

#[test]
fn auto_encoding_does_not_retry_structural_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    // Valid UTF-8, but the second data row is wider than the first.
    let path = write_fixture(dir.path(), "ragged.csv", b"a,b\n1,2\n1,2,3\n");
    let options = ParseOptions {
        encoding: Some(EncodingOption::Auto),
        index_col: Some(IndexCol::Infer),
        ..ParseOptions::default()
    };

    let err = query_csv(&path, &options, None, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseStructure);
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn missing_file_is_an_input_access_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = query_csv(
        dir.path().join("nope.csv"),
        &ParseOptions::default(),
        None,
        false,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputAccess);
}

#[test]
fn query_errors_are_classified() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "q.csv", b"a,b\n1,2\n");
    let options = ParseOptions::default();

    let syntax = query_csv(&path, &options, Some("SELEC a FROM df"), false).unwrap_err();
    assert_eq!(syntax.kind(), ErrorKind::QuerySyntax);

    let table = query_csv(&path, &options, Some("SELECT a FROM other"), false).unwrap_err();
    assert_eq!(table.kind(), ErrorKind::QueryReference);

    let column = query_csv(&path, &options, Some("SELECT z FROM df"), false).unwrap_err();
    assert_eq!(column.kind(), ErrorKind::QueryReference);
}

#[test]
fn named_index_column_is_visible_to_queries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "indexed.csv", b"id,v\nx,1\ny,2\n");
    let options = ParseOptions {
        index_col: Some(IndexCol::Column(ColumnRef::from("id"))),
        ..ParseOptions::default()
    };

    let table = query_csv(&path, &options, Some("SELECT id, v FROM df WHERE v > 1"), false)
        .expect("query_csv");

    assert_eq!(
        header_and_rows(&table),
        (names(&["id", "v"]), vec![vec![s("y"), i(2)]])
    );
}

#[test]
fn multiple_statements_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "q.csv", b"a\n1\n");

    let err = query_csv(
        &path,
        &ParseOptions::default(),
        Some("SELECT a FROM df; DROP TABLE df"),
        false,
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QuerySyntax);
}

#[test]
fn encoding_labels_are_case_sensitive_for_auto() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_fixture(dir.path(), "test_latin1.csv", LATIN1_CSV);

    let err = query_csv(&path, &with_encoding("AUTO"), None, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOption);
}
