//! Deterministic byte encoding of ballot content.
//!
//! The output is compact JSON with object keys in byte-wise order at every
//! level. Voters sign exactly these bytes, so any change here invalidates
//! every signature produced against the previous encoding.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::{Ballot, BallotValue};

/// Encode a ballot into its canonical signing bytes.
pub fn encode(ballot: &Ballot) -> Vec<u8> {
    encode_to_string(ballot).into_bytes()
}

/// The canonical encoding as text. It is always valid UTF-8.
pub fn encode_to_string(ballot: &Ballot) -> String {
    let mut out = String::new();
    write_map(&mut out, ballot.fields());
    out
}

fn write_value(out: &mut String, value: &BallotValue) {
    match value {
        BallotValue::Null => out.push_str("null"),
        BallotValue::Bool(true) => out.push_str("true"),
        BallotValue::Bool(false) => out.push_str("false"),
        // Integers print in decimal; floats print in shortest round-trip form.
        BallotValue::Number(n) => out.push_str(&n.to_string()),
        BallotValue::String(s) => write_string(out, s),
        BallotValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        BallotValue::Map(map) => write_map(out, map),
    }
}

fn write_map(out: &mut String, map: &BTreeMap<String, BallotValue>) {
    // `String` ordering is byte-wise over UTF-8, which is also code point order.
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c < '\u{20}' => {
                // Writing to a `String` cannot fail.
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rocket::serde::json::serde_json;

    use super::*;

    fn parse(json: &str) -> Ballot {
        serde_json::from_str(json).unwrap()
    }

    fn encode_str(ballot: &Ballot) -> String {
        let text = encode_to_string(ballot);
        assert_eq!(text.as_bytes(), encode(ballot));
        text
    }

    #[test]
    fn single_choice() {
        assert_eq!(encode_str(&Ballot::example("A")), r#"{"choice":"A"}"#);
    }

    #[test]
    fn field_order_is_irrelevant() {
        let a = parse(r#"{"region": "local", "candidate": "X", "timestamp": 17}"#);
        let b = parse(r#"{"timestamp": 17, "candidate": "X", "region": "local"}"#);
        let c = parse(r#"{"candidate": "X", "timestamp": 17, "region": "local"}"#);

        assert_eq!(encode(&a), encode(&b));
        assert_eq!(encode(&a), encode(&c));
        assert_eq!(
            encode_str(&a),
            r#"{"candidate":"X","region":"local","timestamp":17}"#
        );
    }

    #[test]
    fn nested_maps_are_sorted() {
        let a = parse(r#"{"z": {"b": [{"y": 1, "x": 2}], "a": null}, "a": true}"#);
        let b = parse(r#"{"a": true, "z": {"a": null, "b": [{"x": 2, "y": 1}]}}"#);

        assert_eq!(encode(&a), encode(&b));
        assert_eq!(
            encode_str(&a),
            r#"{"a":true,"z":{"a":null,"b":[{"x":2,"y":1}]}}"#
        );
    }

    #[test]
    fn list_order_is_significant() {
        let a = parse(r#"{"ranking": ["A", "B"]}"#);
        let b = parse(r#"{"ranking": ["B", "A"]}"#);
        assert_ne!(encode(&a), encode(&b));
    }

    #[test]
    fn different_content_differs() {
        let base = parse(r#"{"choice": "A"}"#);
        for other in [
            r#"{"choice": "B"}"#,
            r#"{"Choice": "A"}"#,
            r#"{"choice": ["A"]}"#,
            r#"{"choice": {"A": null}}"#,
            r#"{"choice": "A", "extra": null}"#,
            r#"{"choice": "A "}"#,
        ] {
            assert_ne!(encode(&base), encode(&parse(other)), "{other}");
        }
    }

    #[test]
    fn strings_are_escaped_minimally() {
        let ballot = Ballot::new().with("s", "quote\" slash\\ nl\n tab\t bell\u{07} é ✓ /");
        assert_eq!(
            encode_str(&ballot),
            "{\"s\":\"quote\\\" slash\\\\ nl\\n tab\\t bell\\u0007 é ✓ /\"}"
        );
    }

    #[test]
    fn numbers() {
        let ballot = parse(r#"{"i": -42, "u": 18446744073709551615, "f": 0.1, "e": 2.5e-3}"#);
        assert_eq!(
            encode_str(&ballot),
            r#"{"e":0.0025,"f":0.1,"i":-42,"u":18446744073709551615}"#
        );
    }

    #[test]
    fn integers_beyond_u64_never_collide() {
        let edges = parse(r#"{"hi": 18446744073709551615, "lo": -9223372036854775808}"#);
        assert_eq!(
            encode_str(&edges),
            r#"{"hi":18446744073709551615,"lo":-9223372036854775808}"#
        );

        // Past `u64` these would round to the same float, so they are refused
        // before anything is encoded.
        for json in [
            r#"{"n": 18446744073709551616}"#,
            r#"{"n": 18446744073709551617}"#,
            r#"{"n": 100000000000000000000}"#,
        ] {
            assert!(serde_json::from_str::<Ballot>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn keys_sort_by_code_point() {
        let ballot = parse(r#"{"é": 1, "z": 2, "Z": 3, "a": 4}"#);
        assert_eq!(encode_str(&ballot), r#"{"Z":3,"a":4,"z":2,"é":1}"#);
    }

    #[test]
    fn matches_reference_encoding() {
        // Produced by an independent JSON implementation with sorted keys and
        // compact separators.
        let ballot: Ballot =
            serde_json::from_str(&fs::read_to_string("example_ballots/ballot.json").unwrap())
                .unwrap();
        let expected = fs::read("example_ballots/ballot.canonical").unwrap();
        assert_eq!(encode(&ballot), expected);
    }
}
