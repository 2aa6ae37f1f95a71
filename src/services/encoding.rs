use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText<'a> {
    pub text: Cow<'a, str>,
    /// Lowercase encoding name, `utf-8-sig` when a BOM was stripped.
    pub encoding: String,
}

/// Decode source bytes for translation.
///
/// Valid UTF-8 is borrowed as-is (minus a BOM). Anything else goes through
/// `chardetng`; `Err` carries the guessed encoding name when decoding it
/// still produced replacement characters.
pub fn decode(bytes: &[u8]) -> Result<DecodedText<'_>, String> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return Ok(DecodedText {
                text: Cow::Borrowed(text),
                encoding: "utf-8-sig".into(),
            });
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: Cow::Borrowed(text),
            encoding: "utf-8".into(),
        });
    }

    let encoding = guess(bytes);
    let name = encoding.name().to_lowercase();
    let (text, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(name);
    }

    Ok(DecodedText {
        text,
        encoding: name,
    })
}

fn guess(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}
