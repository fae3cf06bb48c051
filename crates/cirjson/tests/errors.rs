mod common;

use cirjson::constraints::StreamReadConstraints;
use cirjson::features::ReadFeature;
use cirjson::io::EmptyReadContext;
use cirjson::{CirJsonFactory, Error, TokenKind, TokenRead};
use common::factory;

fn read_until_error(reader: &mut impl TokenRead) -> Error {
    loop {
        match reader.next_token() {
            Ok(Some(TokenKind::NotAvailable)) => panic!("reader suspended"),
            Ok(Some(_)) => {}
            Ok(None) => panic!("document parsed without error"),
            Err(err) => return err,
        }
    }
}

fn error_for(doc: &str) -> Error {
    let factory = factory();
    let mut reader = factory.reader_for_str(&EmptyReadContext, doc).unwrap();
    read_until_error(&mut reader)
}

fn bytes_error_for(doc: &[u8]) -> Error {
    let factory = factory();
    let mut reader = factory.reader_for_slice(&EmptyReadContext, doc).unwrap();
    read_until_error(&mut reader)
}

#[test]
fn test_missing_object_identity() {
    let err = error_for("{\"x\":1}");
    let msg = err.to_string();
    assert!(msg.contains("__cirJsonId__"), "{msg}");
    assert!(msg.contains("got \"x\""), "{msg}");
    assert!(matches!(err, Error::StreamRead { .. }));
}

#[test]
fn test_empty_object_missing_identity() {
    let err = error_for("{}");
    assert!(err.to_string().contains("__cirJsonId__"), "{}", err);
}

#[test]
fn test_empty_array_missing_identity() {
    let err = error_for("[]");
    let msg = err.to_string();
    assert!(msg.contains("identity"), "{msg}");
    assert!(msg.contains("Array"), "{msg}");
}

#[test]
fn test_non_string_identity_value() {
    let err = error_for("{\"__cirJsonId__\":17}");
    assert!(err.to_string().contains("must be a String"), "{}", err);
}

#[test]
fn test_empty_identity_value_rejected() {
    let err = error_for("{\"__cirJsonId__\":\"\"}");
    assert!(err.to_string().contains("non-empty"), "{}", err);
}

#[test]
fn test_non_string_array_identity() {
    let err = error_for("[1,2]");
    assert!(err.to_string().contains("identity"), "{}", err);
}

#[test]
fn test_unclosed_object_at_eof() {
    let err = error_for("{\"__cirJsonId__\":\"r\",\"a\":1");
    let msg = err.to_string();
    assert!(msg.contains("Unexpected end-of-input"), "{msg}");
    assert!(msg.contains("Object"), "{msg}");
}

#[test]
fn test_unclosed_string_at_eof() {
    let err = error_for("[\"id\",\"unterminated");
    assert!(
        err.to_string().contains("closing quote"),
        "{}",
        err
    );
}

#[test]
fn test_mismatched_close_marker() {
    let err = error_for("{\"__cirJsonId__\":\"r\",\"a\":1]");
    assert!(err.to_string().contains("Unexpected character"), "{}", err);
}

#[test]
fn test_control_character_between_tokens() {
    let err = bytes_error_for(&[0x00; 7]);
    let msg = err.to_string();
    assert!(msg.contains("CTRL-CHAR"), "{msg}");
    assert!(msg.contains("code 0"), "{msg}");
}

#[test]
fn test_utf32_truncated_mid_character() {
    for len in [5, 6, 7] {
        let bytes = &[0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x20][..len];
        let err = bytes_error_for(bytes);
        let msg = err.to_string();
        assert!(msg.contains("Unexpected EOF"), "len {len}: {msg}");
        assert!(msg.contains("4-byte UTF-32 char"), "len {len}: {msg}");
    }
}

#[test]
fn test_utf32_invalid_code_point() {
    let err = bytes_error_for(&[0x00, 0x00, 0x00, 0x20, 0xFE, 0xFF, 0x00, 0x01]);
    assert!(
        err.to_string().contains("Invalid UTF-32 character 0xfeff0001"),
        "{}",
        err
    );
}

#[test]
fn test_charset_detection_can_be_disabled() {
    use cirjson::features::FactoryFeature;

    // With detection on, this parses as UTF-16BE.
    let doc: Vec<u8> = "[\"a\",1]"
        .encode_utf16()
        .flat_map(|u| u.to_be_bytes())
        .collect();
    let with_detection = factory();
    let mut reader = with_detection
        .reader_for_slice(&EmptyReadContext, &doc)
        .unwrap();
    assert!(common::drain_events(&mut reader).is_ok());

    // With detection off the input is taken as UTF-8 and fails on the
    // leading NUL.
    let without = CirJsonFactory::builder()
        .disable_factory(FactoryFeature::CharsetDetection)
        .build()
        .unwrap();
    let mut reader = without.reader_for_slice(&EmptyReadContext, &doc).unwrap();
    let err = read_until_error(&mut reader);
    assert!(err.to_string().contains("CTRL-CHAR"), "{err}");
}

#[test]
fn test_invalid_escape_sequence() {
    let err = error_for("[\"id\",\"bad \\x escape\"]");
    assert!(
        err.to_string().contains("Unrecognized character escape"),
        "{}",
        err
    );
}

#[test]
fn test_split_surrogate_escape() {
    let err = error_for("[\"id\",\"\\uD83D no low\"]");
    assert!(err.to_string().contains("surrogate"), "{}", err);
}

#[test]
fn test_invalid_number_syntax() {
    let err = error_for("[\"id\",1.]");
    assert!(err.to_string().contains("Invalid numeric value"), "{}", err);

    let err = error_for("[\"id\",-]");
    assert!(err.to_string().contains("minus sign"), "{}", err);

    let err = error_for("[\"id\",01]");
    assert!(err.to_string().contains("leading zeroes"), "{}", err);
}

#[test]
fn test_unrecognized_literal() {
    let err = error_for("[\"id\",tru]");
    assert!(err.to_string().contains("Unrecognized token"), "{}", err);
}

#[test]
fn test_duplicate_property_detection() {
    let doc = "{\"__cirJsonId__\":\"r\",\"a\":1,\"a\":2}";

    // Allowed by default: CirJSON readers advertise the
    // duplicate-properties capability.
    let relaxed = factory();
    let mut reader = relaxed.reader_for_str(&EmptyReadContext, doc).unwrap();
    assert!(common::drain_events(&mut reader).is_ok());

    let strict = CirJsonFactory::builder()
        .enable_read(ReadFeature::StrictDuplicateDetection)
        .build()
        .unwrap();
    let mut reader = strict.reader_for_str(&EmptyReadContext, doc).unwrap();
    let err = read_until_error(&mut reader);
    let msg = err.to_string();
    assert!(msg.contains("Duplicate Object property"), "{msg}");
    assert!(msg.contains("\"a\""), "{msg}");
}

#[test]
fn test_nesting_depth_constraint() {
    let factory = CirJsonFactory::builder()
        .stream_read_constraints(StreamReadConstraints::default().with_max_nesting_depth(3))
        .build()
        .unwrap();
    let doc = "[\"1\",[\"2\",[\"3\",[\"4\"]]]]";
    let mut reader = factory.reader_for_str(&EmptyReadContext, doc).unwrap();
    let err = read_until_error(&mut reader);
    assert!(matches!(err, Error::ConstraintViolation { .. }), "{err}");
    assert!(err.to_string().contains("nesting depth"), "{err}");
}

#[test]
fn test_number_length_constraint() {
    let factory = CirJsonFactory::builder()
        .stream_read_constraints(StreamReadConstraints::default().with_max_number_length(5))
        .build()
        .unwrap();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, "[\"id\",1234567]")
        .unwrap();
    let err = read_until_error(&mut reader);
    assert!(matches!(err, Error::ConstraintViolation { .. }), "{err}");
}

#[test]
fn test_string_length_constraint() {
    let factory = CirJsonFactory::builder()
        .stream_read_constraints(StreamReadConstraints::default().with_max_string_length(4))
        .build()
        .unwrap();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, "[\"id\",\"too long to pass\"]")
        .unwrap();
    let err = read_until_error(&mut reader);
    assert!(matches!(err, Error::ConstraintViolation { .. }), "{err}");
}

#[test]
fn test_error_location_is_attached() {
    let err = error_for("{\"x\":1}");
    let location = err.location().expect("stream errors carry a location");
    assert_eq!(location.line, 1);
    assert!(location.column > 1);
    // Source descriptions are redacted unless IncludeSourceInLocation.
    assert_eq!(location.content.description(), "UNKNOWN");
}

#[test]
fn test_source_inclusion_feature() {
    let factory = CirJsonFactory::builder()
        .enable_read(ReadFeature::IncludeSourceInLocation)
        .build()
        .unwrap();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, "{\"x\":1}")
        .unwrap();
    let err = read_until_error(&mut reader);
    let location = err.location().expect("location");
    assert_eq!(location.content.description(), "(String)");
    assert!(err.to_string().contains("[Source: (String);"), "{err}");
}

#[test]
fn test_coercion_error_has_location_and_kind() {
    let factory = factory();
    let mut reader = factory
        .reader_for_str(&EmptyReadContext, "[\"id\",3000000000]")
        .unwrap();
    while reader.next_token().unwrap() != Some(TokenKind::ValueNumberInt) {}
    let err = reader.int_value().unwrap_err();
    match &err {
        Error::InputCoercion { target, .. } => {
            assert_eq!(*target, Some(cirjson::NumberKind::Int));
        }
        other => panic!("expected coercion error, got {other:?}"),
    }
    assert!(err.to_string().contains("out of range of int"), "{err}");
}

#[test]
fn test_trailing_comma_opt_in() {
    use cirjson::features::CirJsonReadFeature;

    let doc = "[\"id\",1,]";
    assert!(matches!(error_for(doc), Error::StreamRead { .. }));

    let relaxed = CirJsonFactory::builder()
        .enable_format_read(CirJsonReadFeature::AllowTrailingComma)
        .build()
        .unwrap();
    let mut reader = relaxed.reader_for_str(&EmptyReadContext, doc).unwrap();
    assert!(common::drain_events(&mut reader).is_ok());
}
