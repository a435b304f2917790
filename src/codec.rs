//! Conversion between caller strings and native byte strings.
//!
//! Native strings are NUL-terminated byte sequences. Value names use a direct
//! mapping with `\` and `/` exchanged (`\` becomes `//`, `/` becomes `\`) when
//! every character is printable ASCII, and the alternate form otherwise:
//!
//! ```text
//! "/!" + base64url(utf-8 name), each uppercase letter written as "/X"
//! ```
//!
//! The base64 alphabet contains no `/`, and the uppercase escape keeps two
//! different names distinct in the case-insensitive native store.
//!
//! Key paths keep `\` as the structural separator. Only a segment that is not
//! printable ASCII, or that starts with the alternate prefix, is rewritten
//! using the alternate form.
//!
//! Value data goes through the ANSI entry points, so it is a direct
//! Windows-1252 byte mapping in both directions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use encoding_rs::WINDOWS_1252;
use tracing::warn;

const ALT_PREFIX: &[u8] = b"/!";

/// Printable ASCII range accepted by the direct encoding.
fn is_direct(name: &str) -> bool {
    name.chars().all(|ch| ('\u{20}'..='\u{7f}').contains(&ch))
}

fn terminate(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(0);
    bytes
}

/// Bytes up to (not including) the first NUL.
fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

fn alt_encode(name: &str) -> Vec<u8> {
    let encoded = URL_SAFE_NO_PAD.encode(name.as_bytes());
    let mut out = Vec::with_capacity(ALT_PREFIX.len() + encoded.len() * 2);
    out.extend_from_slice(ALT_PREFIX);
    for b in encoded.bytes() {
        if b.is_ascii_uppercase() {
            out.push(b'/');
        }
        out.push(b);
    }
    out
}

/// Reverses [`alt_encode`]. `bytes` must start with the alternate prefix.
///
/// Only the canonical form is accepted: a foreign name that merely starts
/// with the prefix yields `None`.
fn alt_decode(bytes: &[u8]) -> Option<String> {
    let body: Vec<u8> = bytes[ALT_PREFIX.len()..]
        .iter()
        .copied()
        .filter(|&b| b != b'/')
        .collect();
    let raw = URL_SAFE_NO_PAD.decode(body).ok()?;
    let name = String::from_utf8(raw).ok()?;
    (alt_encode(&name) == bytes).then_some(name)
}

/// Encodes a value name into its native form.
pub fn to_native(name: &str) -> Vec<u8> {
    if !is_direct(name) {
        return terminate(alt_encode(name));
    }

    let mut out = Vec::with_capacity(name.len() + 1);
    for b in name.bytes() {
        match b {
            b'\\' => out.extend_from_slice(b"//"),
            b'/' => out.push(b'\\'),
            _ => out.push(b),
        }
    }
    terminate(out)
}

/// Decodes a native value name produced by [`to_native`] or by other writers.
///
/// A `/` that does not start an escape is kept as is.
pub fn from_native_name(bytes: &[u8]) -> String {
    let bytes = until_nul(bytes);
    if bytes.starts_with(ALT_PREFIX) {
        if let Some(name) = alt_decode(bytes) {
            return name;
        }
    }

    let text = from_native(bytes);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                out.push('\\');
            }
            '\\' => out.push('/'),
            _ => out.push(ch),
        }
    }
    out
}

/// Encodes a key path. Segments stay separated by `\`.
pub fn to_native_path(path: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len() + 1);
    for (i, segment) in path.split('\\').enumerate() {
        if i > 0 {
            out.push(b'\\');
        }
        if is_direct(segment) && !segment.as_bytes().starts_with(ALT_PREFIX) {
            out.extend_from_slice(segment.as_bytes());
        } else {
            out.extend(alt_encode(segment));
        }
    }
    terminate(out)
}

/// Decodes a single native key name.
pub fn from_native_key(bytes: &[u8]) -> String {
    let bytes = until_nul(bytes);
    if bytes.starts_with(ALT_PREFIX) {
        if let Some(name) = alt_decode(bytes) {
            return name;
        }
    }
    from_native(bytes)
}

/// Encodes string value data as Windows-1252.
///
/// Characters outside the code page are written as `&#N;` references.
pub fn to_native_value(value: &str) -> Vec<u8> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(value);
    if unmappable {
        warn!("Value text has characters outside Windows-1252");
    }
    terminate(bytes.into_owned())
}

/// Decodes native string data: bytes up to the first NUL, one Windows-1252
/// character per byte.
pub fn from_native(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(until_nul(bytes))
        .0
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_native_plain() {
        assert_eq!(to_native("ProgramFilesDir"), b"ProgramFilesDir\0");
        assert_eq!(to_native(""), b"\0");
    }

    #[test]
    fn test_to_native_swaps_separators() {
        assert_eq!(to_native("a\\b"), b"a//b\0");
        assert_eq!(to_native("a/b"), b"a\\b\0");
    }

    #[test]
    fn test_from_native_name_reverses_swap() {
        assert_eq!(from_native_name(b"a//b\0"), "a\\b");
        assert_eq!(from_native_name(b"a\\b\0"), "a/b");
        // Written by someone else: a lone slash survives.
        assert_eq!(from_native_name(b"text/plain"), "text/plain");
    }

    #[test]
    fn test_backslash_bang_is_not_alternate() {
        let native = to_native("\\!x");
        assert_eq!(native, b"//!x\0");
        assert_eq!(from_native_name(&native), "\\!x");
    }

    #[test]
    fn test_alternate_encoding() {
        let native = to_native("Grüße");
        assert!(native.starts_with(b"/!"));
        assert!(native.iter().all(|b| b.is_ascii()));
        assert_eq!(*native.last().unwrap(), 0);
        assert_eq!(from_native_name(&native), "Grüße");
    }

    #[test]
    fn test_control_characters_use_alternate() {
        let native = to_native("tab\there");
        assert!(native.starts_with(b"/!"));
        assert_eq!(from_native_name(&native), "tab\there");
    }

    #[test]
    fn test_alternate_escapes_uppercase() {
        let native = to_native("ÄÖÜ");
        let body = &native[2..native.len() - 1];
        assert!(body.contains(&b'/'));
        for pair in body.windows(2) {
            if pair[1].is_ascii_uppercase() {
                assert_eq!(pair[0], b'/');
            }
        }
    }

    #[test]
    fn test_path_keeps_separator() {
        assert_eq!(
            to_native_path("Software\\Microsoft\\Windows"),
            b"Software\\Microsoft\\Windows\0"
        );
        assert_eq!(to_native_path(""), b"\0");
    }

    #[test]
    fn test_path_rewrites_non_ascii_segment() {
        let native = to_native_path("Software\\Café");
        assert!(native.starts_with(b"Software\\/!"));
        let leaf = &native[b"Software\\".len()..];
        assert_eq!(from_native_key(leaf), "Café");
    }

    #[test]
    fn test_path_segment_with_alternate_prefix() {
        let native = to_native_path("/!AA");
        assert_ne!(native, b"/!AA\0");
        assert_eq!(from_native_key(&native), "/!AA");
    }

    #[test]
    fn test_from_native_value() {
        assert_eq!(from_native(b"C:\\Program Files\0"), "C:\\Program Files");
        assert_eq!(from_native(b"hello\0garbage"), "hello");
        assert_eq!(from_native(b"no terminator"), "no terminator");
        assert_eq!(from_native(b"caf\xe9\0"), "café");
        // Bytes that happen to be valid UTF-8 still map one byte per character.
        assert_eq!(from_native(b"caf\xc3\xa9\0"), "cafÃ©");
        assert_eq!(from_native(b"\x80 \x9f\0"), "€ Ÿ");
    }

    #[test]
    fn test_value_bytes_are_windows_1252() {
        assert_eq!(to_native_value("café"), b"caf\xe9\0");
        assert_eq!(to_native_value("Grüße €"), b"Gr\xfc\xdfe \x80\0");
        assert_eq!(to_native_value("\u{4e2d}"), b"&#20013;\0");
    }

    #[test]
    fn test_value_round_trip() {
        let value = "C:\\Program Files (x86)";
        assert_eq!(from_native(&to_native_value(value)), value);
        assert_eq!(from_native(&to_native_value("Grüße")), "Grüße");
    }

    #[test]
    fn test_non_canonical_alternate_falls_back_to_direct() {
        assert_eq!(from_native_name(b"/!AB\0"), "/!AB");
        assert_eq!(from_native_key(b"/!AB\0"), "/!AB");
        // Valid base64 of "Grüße" without the uppercase escapes.
        let lowered = b"/!R3LDvMOfZQ\0";
        assert_eq!(from_native_key(lowered), "/!R3LDvMOfZQ");
    }
}
