use super::*;

#[test]
fn closed_range_is_inclusive() {
    let r = parse_range("bytes=0-99", 1000).unwrap();
    assert_eq!(r, ByteRange { start: 0, end: 99 });
    assert_eq!(r.len(), 100);
    assert_eq!(r.content_range(1000), "bytes 0-99/1000");
}

#[test]
fn open_end_runs_to_last_byte() {
    let r = parse_range("bytes=500-", 1000).unwrap();
    assert_eq!(r, ByteRange { start: 500, end: 999 });
    assert_eq!(r.len(), 500);
}

#[test]
fn end_past_file_is_clamped() {
    let r = parse_range("bytes=900-5000", 1000).unwrap();
    assert_eq!(r.end, 999);
    assert_eq!(r.len(), 100);
}

#[test]
fn suffix_form_counts_from_the_end() {
    assert_eq!(
        parse_range("bytes=-100", 1000).unwrap(),
        ByteRange { start: 900, end: 999 }
    );
    assert_eq!(
        parse_range("bytes=-5000", 1000).unwrap(),
        ByteRange { start: 0, end: 999 }
    );
    assert_eq!(parse_range("bytes=-0", 1000), Err(RangeError::Unsatisfiable));
}

#[test]
fn single_byte_ranges() {
    assert_eq!(parse_range("bytes=0-0", 1).unwrap().len(), 1);
    assert_eq!(parse_range("bytes=999-999", 1000).unwrap().len(), 1);
}

#[test]
fn start_at_or_past_end_is_unsatisfiable() {
    assert_eq!(parse_range("bytes=1000-", 1000), Err(RangeError::Unsatisfiable));
    assert_eq!(parse_range("bytes=0-10", 0), Err(RangeError::Unsatisfiable));
    assert_eq!(parse_range("bytes=-10", 0), Err(RangeError::Unsatisfiable));
    assert_eq!(unsatisfied_content_range(1000), "bytes */1000");
}

#[test]
fn malformed_headers_are_rejected() {
    for header in [
        "",
        "bytes",
        "bytes=",
        "bytes=-",
        "items=0-10",
        "bytes=10-5",
        "bytes=a-b",
        "bytes=+1-5",
        "bytes=0-99,200-299",
        "bytes=99999999999999999999999-",
    ] {
        assert_eq!(
            parse_range(header, 1000),
            Err(RangeError::Malformed),
            "{header:?}"
        );
    }
}

#[test]
fn unit_and_whitespace_are_lenient() {
    assert_eq!(
        parse_range(" Bytes = 10 - 19 ", 1000).unwrap(),
        ByteRange { start: 10, end: 19 }
    );
}
