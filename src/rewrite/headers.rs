//! Response header rewriting.
//!
//! # Responsibilities
//! - Point `Location` / `Content-Location` back through the proxy
//! - Re-scope `Set-Cookie` to the proxy (drop `Domain`, proxy `Path`)
//! - Pass every other header through untouched
//!
//! # Design Decisions
//! - Pure: the upstream map is read, a new map is returned
//! - Multi-valued headers keep their value order
//! - Values that are not visible ASCII are forwarded as received

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::rewrite::url::CurrentContext;

/// Rewrite the response headers of a proxied resource.
pub fn rewrite_headers(headers: &HeaderMap, ctx: &CurrentContext<'_>) -> HeaderMap {
    let mut rewritten = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers.iter() {
        let new_value = if is_location(name) {
            rewrite_value(value, |v| ctx.rewrite(v).into_owned())
        } else if name == header::SET_COOKIE {
            rewrite_value(value, |v| rewrite_set_cookie(v, ctx))
        } else {
            value.clone()
        };
        rewritten.append(name.clone(), new_value);
    }

    rewritten
}

fn is_location(name: &HeaderName) -> bool {
    name == header::LOCATION || name == header::CONTENT_LOCATION
}

fn rewrite_value(value: &HeaderValue, f: impl FnOnce(&str) -> String) -> HeaderValue {
    value
        .to_str()
        .ok()
        .and_then(|v| HeaderValue::from_str(&f(v)).ok())
        .unwrap_or_else(|| value.clone())
}

/// Rewrite a single `Set-Cookie` value.
///
/// The leading `name=value` pair is kept verbatim; of the attributes that
/// follow, `Domain` is removed and `Path` is proxied.
pub fn rewrite_set_cookie(cookie: &str, ctx: &CurrentContext<'_>) -> String {
    let mut out: Vec<String> = Vec::new();

    for (i, component) in cookie.split(';').enumerate() {
        let component = component.trim();
        if component.is_empty() {
            continue;
        }
        if i == 0 {
            out.push(component.to_string());
            continue;
        }

        match component.split_once('=') {
            Some((name, _)) if name.trim().eq_ignore_ascii_case("domain") => {}
            Some((name, value)) if name.trim().eq_ignore_ascii_case("path") => {
                out.push(format!("{}={}", name.trim(), ctx.resolve(value.trim())));
            }
            Some((name, value)) => out.push(format!("{}={}", name.trim(), value.trim())),
            None if component.eq_ignore_ascii_case("domain") => {}
            None => out.push(component.to_string()),
        }
    }

    out.join("; ")
}
