use nextstrain_autobuild::dates::normalize_date;

#[test]
fn normalizes_partial_dates() {
    let cases = [
        ("2020-05-14", Some("2020-05-14")),
        ("2020-05", Some("2020-05-XX")),
        ("2020", Some("2020-XX-XX")),
        ("", None),
        ("05/14/2020", None),
        ("20200514", None),
        ("unknown", None),
    ];
    for (raw, expected) in cases {
        assert_eq!(
            normalize_date(raw).as_ref().map(|date| date.as_str()),
            expected,
            "input {raw:?}"
        );
    }
}

#[test]
fn already_normalized_values_are_unchanged() {
    for value in ["2020-05-14", "2020-05-XX", "2020-XX-XX"] {
        assert_eq!(normalize_date(value).unwrap().as_str(), value);
    }
}

#[test]
fn year_prefix_is_exposed() {
    assert_eq!(normalize_date("1999-08").unwrap().year(), "1999");
}

#[test]
fn only_ascii_digits_count() {
    for raw in ["२०२०", "٢٠٢٠-05", "٢٠٢٠-٠٥-١٤", "2020-٠٥", "２０２０"] {
        assert_eq!(normalize_date(raw), None, "input {raw:?}");
    }
}
