use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
pub struct DecodedText {
    pub text: String,
    /// Lower-cased WHATWG encoding name, `utf-8-sig` when a BOM was stripped.
    pub encoding: String,
    pub had_errors: bool,
}

pub fn decode(bytes: &[u8]) -> DecodedText {
    // BOM UTF-8 (EF BB BF)
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let (text, had_errors) = decode_with(UTF_8, rest);
        return DecodedText {
            text,
            encoding: "utf-8-sig".into(),
            had_errors,
        };
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: "utf-8".into(),
            had_errors: false,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (text, had_errors) = decode_with(encoding, bytes);
    DecodedText {
        text,
        encoding: encoding.name().to_lowercase(),
        had_errors,
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> (String, bool) {
    let (text, _, had_errors) = encoding.decode(bytes);
    (text.into_owned(), had_errors)
}
