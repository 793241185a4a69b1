//! HTML document rewriting.
//!
//! # Responsibilities
//! - Proxy every URL-carrying attribute listed in [`REWRITE_MAP`]
//! - Rewrite `<style>` contents and `style="..."` attributes as CSS
//! - Emit a standard doctype and `<html>` root
//! - Transcode back to the document's charset
//!
//! # Design Decisions
//! - Bytes are decoded once (BOM, then `Content-Type`, then `<meta>`) and
//!   rewritten as UTF-8 by lol_html
//! - Attribute values are rewritten on their decoded text; character
//!   references are resolved first and `&` re-escaped on the way out
//! - Attributes whose value doesn't change are left byte-for-byte alone
//! - An undecodable body or a rewriter failure passes the original bytes
//!   through; only a failed transcode surfaces, since silently losing
//!   characters is worse

use std::borrow::Cow;
use std::cell::Cell;

use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HtmlRewriter, Settings};

use crate::error::RewriteError;
use crate::observability::metrics;
use crate::rewrite::charset;
use crate::rewrite::css::{rewrite_css, rewrite_inline_style};
use crate::rewrite::url::CurrentContext;

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Tags and the attributes on them that carry URLs.
pub const REWRITE_MAP: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("applet", &["codebase"]),
    ("area", &["href"]),
    ("audio", &["src"]),
    ("base", &["href"]),
    ("blockquote", &["cite"]),
    ("body", &["background"]),
    ("button", &["formaction"]),
    ("command", &["icon"]),
    ("del", &["cite"]),
    ("embed", &["src"]),
    ("form", &["action"]),
    ("frame", &["longdesc", "src"]),
    ("head", &["profile"]),
    ("html", &["manifest"]),
    ("iframe", &["longdesc", "src"]),
    ("img", &["longdesc", "src", "usemap"]),
    ("input", &["formaction", "src", "usemap"]),
    ("ins", &["cite"]),
    ("link", &["href"]),
    ("object", &["classid", "codebase", "data", "usemap"]),
    ("q", &["cite"]),
    ("script", &["src"]),
    ("source", &["src"]),
    ("video", &["poster", "src"]),
];

/// Rewrite an HTML document.
///
/// `content_type` is the upstream `Content-Type` value; its `charset`
/// parameter, or failing that a `<meta>` declaration, selects the document
/// encoding.
pub fn rewrite_html(
    body: &[u8],
    content_type: Option<&str>,
    ctx: &CurrentContext<'_>,
) -> Result<Vec<u8>, RewriteError> {
    let encoding = charset::html_encoding(body, content_type);
    let rewritten = charset::decode(body, encoding)
        .and_then(|(source, used)| Ok((rewrite_document(&source, ctx)?, used)));

    match rewritten {
        Ok((document, used)) => charset::encode(document, used),
        Err(e) => {
            tracing::warn!(error = %e, "HTML rewrite failed, passing document through");
            metrics::record_rewrite_fallback("html");
            Ok(body.to_vec())
        }
    }
}

fn rewrite_document(source: &str, ctx: &CurrentContext<'_>) -> Result<String, RewriteError> {
    let has_root = Cell::new(false);
    let mut output = Vec::with_capacity(source.len() + source.len() / 4);

    let mut handlers = Vec::with_capacity(REWRITE_MAP.len() + 3);
    for &(tag, attributes) in REWRITE_MAP {
        handlers.push(element!(tag, move |el| {
            rewrite_attributes(el, attributes, ctx)
        }));
    }
    handlers.push(element!("[style]", move |el| {
        if let Some(style) = attribute_text(el, "style") {
            let rewritten = rewrite_inline_style(&style, ctx);
            if rewritten != style {
                set_attribute_text(el, "style", &rewritten)?;
            }
        }
        Ok(())
    }));
    handlers.push(element!("html", |_| {
        has_root.set(true);
        Ok(())
    }));

    let mut stylesheet = String::new();
    handlers.push(text!("style", move |chunk| {
        stylesheet.push_str(chunk.as_str());
        if chunk.last_in_text_node() {
            chunk.replace(&rewrite_css(&stylesheet, ctx), ContentType::Html);
            stylesheet.clear();
        } else {
            chunk.remove();
        }
        Ok(())
    }));

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter
        .write(strip_doctype(source).as_bytes())
        .and_then(|_| rewriter.end())
        .map_err(|e| RewriteError::Parse(e.to_string()))?;

    let body = String::from_utf8(output).map_err(|e| RewriteError::Parse(e.to_string()))?;
    let document = if has_root.get() {
        format!("{}{}", DOCTYPE, body)
    } else {
        format!("{}<html>{}</html>", DOCTYPE, body)
    };
    Ok(document)
}

fn rewrite_attributes(
    el: &mut Element<'_, '_>,
    attributes: &[&str],
    ctx: &CurrentContext<'_>,
) -> lol_html::HandlerResult {
    for &name in attributes {
        if let Some(value) = attribute_text(el, name) {
            if let Cow::Owned(rewritten) = ctx.rewrite(&value) {
                set_attribute_text(el, name, &rewritten)?;
            }
        }
    }
    Ok(())
}

/// Attribute value with character references resolved.
fn attribute_text(el: &Element<'_, '_>, name: &str) -> Option<String> {
    el.get_attribute(name)
        .map(|raw| html_escape::decode_html_entities(&raw).into_owned())
}

/// Store plain text as an attribute value. lol_html escapes `"` itself.
fn set_attribute_text(el: &mut Element<'_, '_>, name: &str, text: &str) -> lol_html::HandlerResult {
    el.set_attribute(name, &text.replace('&', "&amp;"))?;
    Ok(())
}

/// Drop a leading `<!DOCTYPE ...>` so the canonical one can take its place.
fn strip_doctype(source: &str) -> &str {
    let trimmed = source.trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace());
    let is_doctype = trimmed
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return source;
    }
    match trimmed.find('>') {
        Some(end) => &trimmed[end + 1..],
        None => source,
    }
}
