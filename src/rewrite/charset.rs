//! Body charset handling for the rewriters.
//!
//! Rewriting happens on UTF-8 text; bodies are decoded and encoded back
//! afterwards. The encoding is picked in this order:
//!
//! 1. a byte order mark
//! 2. the `charset` parameter of `Content-Type`
//! 3. an in-document declaration (`<meta>` for HTML, `@charset` for CSS)
//! 4. UTF-8

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, X_USER_DEFINED};

use crate::error::RewriteError;

/// How far into an HTML document a `<meta>` charset declaration is looked for.
const META_SNIFF_BYTES: usize = 1024;

/// Encoding named by the `charset` parameter, if it names a known one.
pub fn declared_encoding(content_type: Option<&str>) -> Option<&'static Encoding> {
    content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}

/// Encoding of an HTML document.
pub fn html_encoding(body: &[u8], content_type: Option<&str>) -> &'static Encoding {
    declared_encoding(content_type)
        .or_else(|| sniff_meta(body).map(in_document))
        .unwrap_or(UTF_8)
}

/// Encoding of a stylesheet.
pub fn css_encoding(body: &[u8], content_type: Option<&str>) -> &'static Encoding {
    declared_encoding(content_type)
        .or_else(|| sniff_at_charset(body).map(in_document))
        .unwrap_or(UTF_8)
}

/// Decode `body`, returning the text and the encoding actually used.
///
/// A BOM overrides `encoding`. Malformed byte sequences are a
/// [`RewriteError::Parse`]: replacing them would change the document.
pub fn decode<'a>(
    body: &'a [u8],
    encoding: &'static Encoding,
) -> Result<(Cow<'a, str>, &'static Encoding), RewriteError> {
    let (text, used, malformed) = encoding.decode(body);
    if malformed {
        return Err(RewriteError::Parse(format!(
            "body is not valid {}",
            used.name()
        )));
    }
    Ok((text, used))
}

/// Encode rewritten text back into `encoding`.
///
/// Fails instead of substituting when a character has no representation.
pub fn encode(text: String, encoding: &'static Encoding) -> Result<Vec<u8>, RewriteError> {
    if encoding == UTF_8 {
        return Ok(text.into_bytes());
    }
    let (encoded, used, unmappable) = encoding.encode(&text);
    if unmappable || used != encoding {
        return Err(RewriteError::Encoding {
            charset: encoding.name(),
        });
    }
    Ok(encoded.into_owned())
}

/// Value of the `charset` parameter of a media type.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// An ASCII-compatible document can't declare itself UTF-16, and
/// `x-user-defined` in a declaration means windows-1252.
fn in_document(encoding: &'static Encoding) -> &'static Encoding {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        UTF_8
    } else if encoding == X_USER_DEFINED {
        WINDOWS_1252
    } else {
        encoding
    }
}

/// Charset declared by a `<meta charset>` or `<meta http-equiv>` tag near
/// the start of the document.
fn sniff_meta(body: &[u8]) -> Option<&'static Encoding> {
    let head = body[..body.len().min(META_SNIFF_BYTES)].to_ascii_lowercase();
    let mut rest = head.as_slice();

    while let Some(start) = find(rest, b"<meta") {
        let tag = &rest[start + 5..];
        let end = tag.iter().position(|&b| b == b'>').unwrap_or(tag.len());
        if let Some(encoding) = charset_attribute(&tag[..end]) {
            return Some(encoding);
        }
        rest = &tag[end..];
    }
    None
}

/// First `charset=<label>` in a tag that names a known encoding.
fn charset_attribute(mut tag: &[u8]) -> Option<&'static Encoding> {
    while let Some(pos) = find(tag, b"charset") {
        tag = &tag[pos + 7..];
        let value = tag.trim_ascii_start();
        let Some(value) = value.strip_prefix(b"=") else {
            continue;
        };
        let value = value.trim_ascii_start();
        let value = value
            .strip_prefix(b"\"")
            .or_else(|| value.strip_prefix(b"'"))
            .unwrap_or(value);
        let end = value
            .iter()
            .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'/') || b.is_ascii_whitespace())
            .unwrap_or(value.len());
        if let Some(encoding) = Encoding::for_label(&value[..end]) {
            return Some(encoding);
        }
    }
    None
}

/// Label of a leading `@charset "...";` rule. The rule only counts when it
/// is the very first thing in the sheet, written exactly like this.
fn sniff_at_charset(body: &[u8]) -> Option<&'static Encoding> {
    let rest = body.strip_prefix(b"@charset \"")?;
    let end = rest.iter().position(|&b| b == b'"')?;
    if rest.get(end + 1) != Some(&b';') {
        return None;
    }
    Encoding::for_label(&rest[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
