mod common;

use cirjson::io::{EmptyReadContext, EmptyWriteContext};
use cirjson::num::{format_f64, parse_f64};
use cirjson::{CirJsonFactory, TokenKind, TokenRead};
use cirjson::features::WriteFeature;
use common::factory;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Samples random bit patterns across the full f64 space and verifies
/// that formatting and re-parsing is the identity, on both the fast and
/// fallback paths.
#[test]
fn test_sampled_double_roundtrip() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_cafe);
    let mut checked = 0usize;
    while checked < 20_000 {
        let bits: u64 = rng.gen();
        let value = f64::from_bits(bits);
        if !value.is_finite() {
            continue;
        }
        for fast in [false, true] {
            let text = format_f64(value, fast);
            let back = parse_f64(&text, fast).unwrap();
            assert_eq!(
                back.to_bits(),
                value.to_bits(),
                "fast={fast} text={text}"
            );
        }
        checked += 1;
    }
}

#[test]
fn test_boundary_doubles_roundtrip() {
    for value in [
        0.0,
        -0.0,
        f64::MIN,
        f64::MAX,
        f64::MIN_POSITIVE,
        f64::EPSILON,
        5e-324, // smallest subnormal
        1.0 / 3.0,
        0.1,
        1e16,
        9007199254740993.0, // just past 2^53
    ] {
        for fast in [false, true] {
            let text = format_f64(value, fast);
            assert_eq!(parse_f64(&text, fast).unwrap().to_bits(), value.to_bits());
        }
    }
}

/// End-to-end: values written by the writer come back bit-identical
/// through the reader.
#[test]
fn test_write_then_read_doubles() {
    let mut rng = SmallRng::seed_from_u64(42);
    let values: Vec<f64> = std::iter::from_fn(|| Some(f64::from_bits(rng.gen())))
        .filter(|v| v.is_finite())
        .take(500)
        .collect();

    for fast_writer in [false, true] {
        let factory = CirJsonFactory::builder()
            .configure_write(WriteFeature::UseFastDoubleWriter, fast_writer)
            .build()
            .unwrap();
        let mut writer = factory.writer_for_string(&EmptyWriteContext).unwrap();
        writer.write_start_array().unwrap();
        for v in &values {
            writer.write_number_f64(*v).unwrap();
        }
        writer.write_end_array().unwrap();
        let doc = writer.into_target().unwrap().into_string();

        let mut reader = factory.reader_for_str(&EmptyReadContext, &doc).unwrap();
        assert_eq!(reader.next_token().unwrap(), Some(TokenKind::StartArray));
        assert_eq!(reader.next_token().unwrap(), Some(TokenKind::ValueString));
        for v in &values {
            assert_eq!(
                reader.next_token().unwrap(),
                Some(TokenKind::ValueNumberFloat),
            );
            assert_eq!(
                reader.double_value().unwrap().to_bits(),
                v.to_bits(),
                "fast_writer={fast_writer}"
            );
        }
        assert_eq!(reader.next_token().unwrap(), Some(TokenKind::EndArray));
    }
}

#[test]
fn test_integer_values_write_then_read() {
    let factory = factory();
    let mut writer = factory.writer_for_string(&EmptyWriteContext).unwrap();
    writer.write_start_array().unwrap();
    for v in [0i64, -1, i64::MIN, i64::MAX, 42] {
        writer.write_number_i64(v).unwrap();
    }
    writer.write_end_array().unwrap();
    let doc = writer.into_target().unwrap().into_string();
    assert_eq!(
        doc,
        "[\"0\",0,-1,-9223372036854775808,9223372036854775807,42]"
    );

    let mut reader = factory.reader_for_str(&EmptyReadContext, &doc).unwrap();
    reader.next_token().unwrap();
    reader.next_token().unwrap();
    for v in [0i64, -1, i64::MIN, i64::MAX, 42] {
        reader.next_token().unwrap();
        assert_eq!(reader.long_value().unwrap(), v);
    }
}
