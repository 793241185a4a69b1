//! Stylesheet rewriting.
//!
//! # Responsibilities
//! - Rewrite every `url(...)` value, at any nesting depth
//! - Rewrite `@import "..."` targets
//! - Rewrite bare declaration lists found in `style="..."` attributes
//!
//! # Design Decisions
//! - The sheet is walked as cssparser's nested token/block model and
//!   re-serialized token by token; whitespace and comments survive, so a
//!   sheet without URLs comes back as written (modulo token normalization
//!   such as number formatting)
//! - URL values are always emitted quoted: `url("...")`
//! - Any failure hands back the original text

use std::fmt::{self, Write};

use cssparser::{serialize_string, ParseError, Parser, ParserInput, ToCss, Token};

use crate::error::RewriteError;
use crate::observability::metrics;
use crate::rewrite::charset;
use crate::rewrite::url::CurrentContext;

/// Synthetic rule wrapped around inline declarations.
const INLINE_PREFIX: &str = "element { ";
const INLINE_SUFFIX: &str = " }";

/// Rewrite a stylesheet body, transcoding through its charset.
///
/// A body that doesn't decode cleanly is returned as received.
pub fn rewrite_stylesheet(
    body: &[u8],
    content_type: Option<&str>,
    ctx: &CurrentContext<'_>,
) -> Result<Vec<u8>, RewriteError> {
    let encoding = charset::css_encoding(body, content_type);
    match charset::decode(body, encoding) {
        Ok((source, used)) => charset::encode(rewrite_css(&source, ctx), used),
        Err(e) => {
            tracing::warn!(error = %e, "Stylesheet not decodable, passing it through");
            metrics::record_rewrite_fallback("css");
            Ok(body.to_vec())
        }
    }
}

/// Rewrite the URLs of a stylesheet.
pub fn rewrite_css(source: &str, ctx: &CurrentContext<'_>) -> String {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut out = String::with_capacity(source.len() + source.len() / 4);

    match rewrite_block(&mut parser, ctx, &mut out) {
        Ok(()) => out,
        Err(e) => {
            tracing::warn!(error = ?e.kind, "Stylesheet rewrite failed, passing it through");
            metrics::record_rewrite_fallback("css");
            source.to_string()
        }
    }
}

/// Rewrite the URLs of an inline `style` attribute value.
pub fn rewrite_inline_style(style: &str, ctx: &CurrentContext<'_>) -> String {
    let wrapped = format!("{}{}{}", INLINE_PREFIX, style, INLINE_SUFFIX);
    let rewritten = rewrite_css(&wrapped, ctx);

    match rewritten
        .strip_prefix(INLINE_PREFIX)
        .and_then(|s| s.strip_suffix(INLINE_SUFFIX))
    {
        Some(declarations) => declarations.to_string(),
        None => {
            // The declarations leaked out of the synthetic rule (unbalanced
            // quotes or braces); the wrapper can't be peeled off reliably.
            tracing::debug!(style = %style, "Inline style not round-trippable, keeping original");
            metrics::record_rewrite_fallback("inline_style");
            style.to_string()
        }
    }
}

type CssResult<'i> = Result<(), ParseError<'i, fmt::Error>>;

fn rewrite_block<'i>(
    parser: &mut Parser<'i, '_>,
    ctx: &CurrentContext<'_>,
    out: &mut String,
) -> CssResult<'i> {
    // Set between `@import` and the end of its prelude.
    let mut in_import = false;

    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };

        match token {
            Token::AtKeyword(ref name) if name.eq_ignore_ascii_case("import") => {
                in_import = true;
                write_token(parser, &token, out)?;
            }
            Token::QuotedString(ref value) if in_import => {
                in_import = false;
                serialize_string(&ctx.rewrite(value), out)
                    .map_err(|e| parser.new_custom_error(e))?;
            }
            Token::UnquotedUrl(ref value) => {
                in_import = false;
                write_url(&ctx.rewrite(value), out).map_err(|e| parser.new_custom_error(e))?;
            }
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                in_import = false;
                out.push_str("url(");
                parser.parse_nested_block(|p| rewrite_url_arguments(p, ctx, out))?;
                out.push(')');
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                if matches!(token, Token::CurlyBracketBlock) {
                    in_import = false;
                }
                write_token(parser, &token, out)?;
                parser.parse_nested_block(|p| rewrite_block(p, ctx, out))?;
                out.push(closing(&token));
            }
            Token::Semicolon => {
                in_import = false;
                out.push(';');
            }
            _ => write_token(parser, &token, out)?,
        }
    }
}

/// Contents of a `url(` function whose argument is a quoted string.
fn rewrite_url_arguments<'i>(
    parser: &mut Parser<'i, '_>,
    ctx: &CurrentContext<'_>,
    out: &mut String,
) -> CssResult<'i> {
    let mut seen_target = false;
    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::QuotedString(ref value) if !seen_target => {
                seen_target = true;
                serialize_string(&ctx.rewrite(value), out)
                    .map_err(|e| parser.new_custom_error(e))?;
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                write_token(parser, &token, out)?;
                parser.parse_nested_block(|p| rewrite_block(p, ctx, out))?;
                out.push(closing(&token));
            }
            _ => write_token(parser, &token, out)?,
        }
    }
}

fn write_token<'i>(parser: &Parser<'i, '_>, token: &Token<'_>, out: &mut String) -> CssResult<'i> {
    token.to_css(out).map_err(|e| parser.new_custom_error(e))
}

fn write_url(url: &str, out: &mut String) -> fmt::Result {
    out.write_str("url(")?;
    serialize_string(url, out)?;
    out.write_char(')')
}

fn closing(token: &Token<'_>) -> char {
    match token {
        Token::CurlyBracketBlock => '}',
        Token::SquareBracketBlock => ']',
        _ => ')',
    }
}
