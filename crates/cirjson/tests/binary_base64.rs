mod common;

use cirjson::base64::{MIME, MIME_NO_LINEFEEDS, MODIFIED_FOR_URL, PEM};
use cirjson::io::{EmptyReadContext, EmptyWriteContext};
use cirjson::{TokenKind, TokenRead};
use common::factory;
use quickcheck_macros::quickcheck;

#[test]
fn test_binary_value_with_mime_linefeed() {
    // The encoded payload carries an escaped linefeed between 4-char
    // units, which MIME decoding skips.
    let doc = "[\"id\",\"SGVsbG8g\\nV29ybGQ=\"]";
    let factory = factory();
    let mut reader = factory.reader_for_str(&EmptyReadContext, doc).unwrap();

    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::StartArray));
    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));

    let bytes = reader.binary_value(&MIME).unwrap();
    assert_eq!(bytes, b"Hello World");
}

#[test]
fn test_binary_value_padding_forbidden() {
    let doc = "[\"id\",\"SGVsbG8g\\nV29ybGQ=\"]";
    let factory = factory();
    let mut reader = factory.reader_for_str(&EmptyReadContext, doc).unwrap();
    while reader.next_token().unwrap() != Some(TokenKind::ValueString) {}
    reader.next_token().unwrap(); // the payload string

    let forbidding = MIME.with_padding_forbidden();
    let err = reader.binary_value(&forbidding).unwrap_err();
    assert!(
        err.to_string().contains("Unexpected padding character"),
        "{err}"
    );
}

#[test]
fn test_write_binary_roundtrip() {
    let payload: Vec<u8> = (0u8..=200).collect();
    let factory = factory();
    let mut writer = factory.writer_for_string(&EmptyWriteContext).unwrap();
    writer.write_start_array().unwrap();
    writer.write_binary(&MIME_NO_LINEFEEDS, &payload).unwrap();
    writer.write_end_array().unwrap();
    let doc = writer.into_target().unwrap().into_string();

    let mut reader = factory.reader_for_str(&EmptyReadContext, &doc).unwrap();
    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::StartArray));
    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
    assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
    assert_eq!(reader.binary_value(&MIME_NO_LINEFEEDS).unwrap(), payload);
}

#[test]
fn test_write_binary_mime_linefeeds_are_escaped() {
    // 100 bytes encodes past the 76-char line limit, forcing a linefeed,
    // which must appear escaped inside the emitted string.
    let payload = vec![0x55u8; 100];
    let factory = factory();
    let mut writer = factory.writer_for_string(&EmptyWriteContext).unwrap();
    writer.write_start_array().unwrap();
    writer.write_binary(&MIME, &payload).unwrap();
    writer.write_end_array().unwrap();
    let doc = writer.into_target().unwrap().into_string();

    assert!(doc.contains("\\n"), "{doc}");
    assert!(!doc.contains('\n'), "raw linefeed leaked into output");

    let mut reader = factory.reader_for_str(&EmptyReadContext, &doc).unwrap();
    while reader.next_token().unwrap() != Some(TokenKind::EndArray) {
        if reader.current_token() == Some(TokenKind::ValueString)
            && reader.text().map_or(false, |t| t.len() > 10)
        {
            assert_eq!(reader.binary_value(&MIME).unwrap(), payload);
        }
    }
}

#[test]
fn test_write_binary_from_reader_strict_length() {
    let factory = factory();
    let mut writer = factory.writer_for_string(&EmptyWriteContext).unwrap();
    writer.write_start_array().unwrap();

    let mut short = std::io::Cursor::new(vec![1u8, 2, 3]);
    let err = writer
        .write_binary_from_read(&MIME_NO_LINEFEEDS, &mut short, Some(10))
        .unwrap_err();
    assert!(err.to_string().contains("too few bytes"), "{err}");

    // Without a declared length the stream is consumed to its end.
    let mut all = std::io::Cursor::new(vec![1u8, 2, 3]);
    writer
        .write_binary_from_read(&MIME_NO_LINEFEEDS, &mut all, None)
        .unwrap();
}

#[quickcheck]
fn prop_base64_roundtrip_all_variants(data: Vec<u8>) -> bool {
    [&MIME, &MIME_NO_LINEFEEDS, &PEM, &MODIFIED_FOR_URL]
        .iter()
        .all(|variant| {
            let encoded = variant.encode(&data);
            variant.decode_to_vec(&encoded).map_or(false, |d| d == data)
        })
}
