//! Property tests for the primitive formatter
//!
//! Round-trip guarantees: integers re-parse exactly, doubles re-parse
//! within an absolute tolerance of 1e-15 below one and a relative
//! tolerance of 1e-15 at or above one, and the fixed-precision form
//! re-parses within 2 * 10^-digits.

use fluxlog::buffer::{ ByteBuf, CharBuf, LogBuffer };
use fluxlog::formatter::{
    append_char,
    append_f64,
    append_f64_digits,
    append_i32,
    append_i64,
    number_of_digits_i32,
    number_of_digits_i64,
};
use proptest::prelude::*;

fn rendered<F>(f: F) -> String where F: FnOnce(&mut ByteBuf) {
    let mut buf = ByteBuf::new(1024);
    f(&mut buf);
    String::from_utf8(buf.as_slice().to_vec()).unwrap()
}

fn f64_tolerance(v: f64) -> f64 {
    if v.abs() < 1.0 {
        1e-15
    } else {
        1e-15 * v.abs()
    }
}

fn check_f64_round_trip(v: f64) {
    let text = rendered(|buf| append_f64(buf, v).unwrap());
    assert!(!text.contains('e') && !text.contains('E'), "exponent notation in {text:?}");
    let parsed: f64 = text.parse().unwrap();
    assert!(
        (parsed - v).abs() <= f64_tolerance(v),
        "{v:e} rendered as {text:?}, parsed back {parsed:e}"
    );
}

fn check_f64_digits_round_trip(v: f64, digits: usize) {
    let text = rendered(|buf| append_f64_digits(buf, v, digits).unwrap());
    let parsed: f64 = text.parse().unwrap();
    let tolerance = 2.0 * 10f64.powi(-(digits.min(16) as i32));
    assert!(
        (parsed - v).abs() <= tolerance,
        "{v:e} with {digits} digits rendered as {text:?}, parsed back {parsed:e}"
    );
}

// The documented seed set: zeros, range extremes, repeating fractions,
// ulp neighbours of one, and powers of ten across the exponent range.
fn double_seeds() -> Vec<f64> {
    let mut seeds = vec![
        0.0,
        -0.0,
        f64::from_bits(1), // smallest subnormal
        -f64::from_bits(1),
        f64::MIN_POSITIVE, // smallest normal
        -f64::MIN_POSITIVE,
        f64::MAX,
        f64::MIN,
        1.0 / 3.0,
        1.0 / 7.0,
        1.0 - f64::EPSILON,
        1.0 + f64::EPSILON,
        -1.000_000_000_000_001e15,
        -1.000_000_000_000_011e15
    ];
    // v * 10^k for k across the exponent range, step 10
    for k in (-300..=300).step_by(10) {
        let v: f64 = format!("1.7e{k}").parse().unwrap();
        seeds.push(v);
        seeds.push(-v);
    }
    // ulp neighbours of every seed so far
    for i in 0..seeds.len() {
        let v = seeds[i];
        if v.is_finite() && v != 0.0 {
            for neighbour in [f64::from_bits(v.to_bits() + 1), f64::from_bits(v.to_bits() - 1)] {
                if neighbour.is_finite() {
                    seeds.push(neighbour);
                }
            }
        }
    }
    seeds
}

#[test]
fn double_seed_set_round_trips() {
    for v in double_seeds() {
        check_f64_round_trip(v);
    }
}

#[test]
fn double_specials() {
    assert_eq!(rendered(|b| append_f64(b, f64::NAN).unwrap()), "NaN");
    assert_eq!(rendered(|b| append_f64(b, f64::INFINITY).unwrap()), "Infinity");
    assert_eq!(rendered(|b| append_f64(b, f64::NEG_INFINITY).unwrap()), "-Infinity");
    assert_eq!(rendered(|b| append_f64(b, -0.0).unwrap()), "-0.0");
    let reparsed: f64 = rendered(|b| append_f64(b, -0.0).unwrap()).parse().unwrap();
    assert!(reparsed == 0.0 && reparsed.is_sign_negative());
}

#[test]
fn double_precision_seed_set() {
    let seeds = [
        0.0,
        -0.0,
        1.0,
        -1.0,
        1.0 / 3.0,
        1.0 / 7.0,
        123.456,
        -9_876.543_21,
        0.000_001_9,
        31_557_600.0,
    ];
    for v in seeds {
        for digits in [0usize, 1, 2, 3, 10, 16, 19, 20] {
            check_f64_digits_round_trip(v, digits);
        }
    }
}

#[test]
fn double_one_ulp_neighbours() {
    check_f64_round_trip(f64::from_bits((1.0f64).to_bits() - 1));
    check_f64_round_trip(f64::from_bits((1.0f64).to_bits() + 1));
    check_f64_round_trip(-1.000_000_000_000_001e15);
}

#[test]
fn integer_byte_boundaries() {
    let mut samples: Vec<i64> = vec![0, 1, -1, i64::MAX, i64::MIN];
    for shift in [8u32, 16, 24, 32, 40, 48, 56] {
        let boundary = 1i64 << shift;
        for delta in -2..=2 {
            samples.push(boundary + delta);
            samples.push(-(boundary + delta));
        }
    }
    for v in samples {
        let text = rendered(|b| append_i64(b, v).unwrap());
        assert_eq!(text, v.to_string());
        assert_eq!(number_of_digits_i64(v), text.len());
    }
}

#[test]
fn ascii_char_round_trip() {
    for b in 0u8..=127 {
        let c = b as char;

        let mut bytes = ByteBuf::new(4);
        append_char(&mut bytes, c).unwrap();
        assert_eq!(bytes.as_slice(), &[b]);

        let mut chars = CharBuf::new(4);
        append_char(&mut chars, c).unwrap();
        assert_eq!(chars.as_slice(), &[c]);
    }
}

#[test]
fn out_of_range_char_stays_in_bounds() {
    // undefined rendering in single-byte mode, but neighbours are intact
    let mut buf = ByteBuf::new(4);
    buf.put_ascii(b'<');
    append_char(&mut buf, '\u{20AC}').unwrap();
    buf.put_ascii(b'>');
    assert_eq!(buf.position(), 3);
    assert_eq!(buf.as_slice()[0], b'<');
    assert_eq!(buf.as_slice()[2], b'>');
}

proptest! {
    #[test]
    fn prop_i64_round_trip(v in any::<i64>()) {
        let text = rendered(|b| append_i64(b, v).unwrap());
        prop_assert_eq!(text.parse::<i64>().unwrap(), v);
        prop_assert_eq!(number_of_digits_i64(v), text.len());
    }

    #[test]
    fn prop_i32_round_trip(v in any::<i32>()) {
        let text = rendered(|b| append_i32(b, v).unwrap());
        prop_assert_eq!(text.parse::<i32>().unwrap(), v);
        prop_assert_eq!(number_of_digits_i32(v), text.len());
    }

    #[test]
    fn prop_f64_round_trip(
        v in prop::num::f64::POSITIVE
            | prop::num::f64::NEGATIVE
            | prop::num::f64::NORMAL
            | prop::num::f64::SUBNORMAL
            | prop::num::f64::ZERO
    ) {
        check_f64_round_trip(v);
    }

    #[test]
    fn prop_f64_digits_round_trip(
        v in -1.0e9f64..1.0e9f64,
        digits in 0usize..=20
    ) {
        check_f64_digits_round_trip(v, digits);
    }

    #[test]
    fn prop_i64_agrees_in_char_mode(v in any::<i64>()) {
        let mut chars = CharBuf::new(32);
        append_i64(&mut chars, v).unwrap();
        let text: String = chars.as_slice().iter().collect();
        prop_assert_eq!(text, v.to_string());
    }
}
