//! URL percent-encoding.

use crate::error::{HttpError, Result};

fn fromhex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes URL percent-escaping.  Fails if the encoding is bad.
pub fn unescape(path: &[u8], out: &mut Vec<u8>) -> Result<()> {
    // TODO this is such a C approach; mutable index variables are hard to
    // reason about.
    let mut i = 0;
    while i < path.len() {
        let c = path[i];
        i += 1;

        if c == b'%' {
            // Possible valid escape.
            if (path.len() - i) < 2 {
                return Err(HttpError::Malformed);
            }

            if let (Some(a), Some(b)) = (fromhex(path[i]), fromhex(path[i + 1]))
            {
                out.push(a * 16 + b);
                i += 2; // skip consumed hex characters.
            } else {
                return Err(HttpError::Malformed);
            }
        } else {
            out.push(c);
        }
    }
    Ok(())
}

/// Like `unescape`, but also maps `+` to space first, as used by
/// `application/x-www-form-urlencoded` payloads and query strings.
pub fn decode_form(data: &[u8]) -> Result<Vec<u8>> {
    let plus_mapped: Vec<u8> = data
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let mut out = Vec::new();
    unescape(&plus_mapped, &mut out)?;
    Ok(out)
}

/// Percent-encodes `data`: alphanumerics pass through, a space becomes `+`,
/// everything else becomes `%XX` (uppercase hex).
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' => out.push(b),
            b' ' => out.push(b'+'),
            _ => {
                out.push(b'%');
                out.push(hex_digit(b >> 4));
                out.push(hex_digit(b & 0xf));
            }
        }
    }
    out
}

fn hex_digit(n: u8) -> u8 {
    match n {
        0..=9 => b'0' + n,
        _ => b'A' + (n - 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! unescape_case {
        ($input: expr, PASS, $output: expr) => {{
            let path = $input;
            let mut v = Vec::new();
            assert!(unescape(path, &mut v).is_ok());
            assert_eq!($output, &v[..])
        }};
        ($input: expr, FAIL) => {{
            let path = $input;
            let mut v = Vec::new();
            assert!(unescape(path, &mut v).is_err());
        }};
    }

    #[test]
    fn test() {
        unescape_case!(b"", PASS, b"");
        unescape_case!(b"%00%01ab%63%64", PASS, b"\x00\x01abcd");
        unescape_case!(b"foo%XY", FAIL);
        unescape_case!(b"foo%X", FAIL);
        unescape_case!(b"foo%", FAIL);
    }

    #[test]
    fn test_decode_form() {
        assert_eq!(decode_form(b"a+b=1%262").unwrap(), b"a b=1&2");
    }

    #[test]
    fn test_encode_roundtrip_values() {
        let original = b"hello world/foo?bar=1";
        let encoded = encode(original);
        let mut decoded = Vec::new();
        unescape(&encoded, &mut decoded).unwrap();
        // encode() emits '+' for space; unescape() doesn't decode '+', so
        // compare via decode_form which does handle both.
        let decoded_form = decode_form(&encoded).unwrap();
        assert_eq!(&decoded_form[..], &original[..]);
        let _ = decoded;
    }

    #[test]
    fn test_encode_passthrough() {
        assert_eq!(encode(b"abcXYZ019"), b"abcXYZ019");
    }
}
