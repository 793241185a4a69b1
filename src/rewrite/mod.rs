//! Rewriting engine.
//!
//! # Data Flow
//! ```text
//! upstream response + CurrentContext
//!     → dispatch.rs (pick ContentKind from Content-Type)
//!         → headers.rs (Location, Content-Location, Set-Cookie)
//!         → html.rs    (attributes, <style>, style="")
//!         → css.rs     (url(), @import)
//!         → pass-through stream
//!     → url.rs  (resolve reference against the current URL)
//!     → path.rs (collapse . and ..)
//!     → UrlGenerator (absolute URL → proxy URL)
//! ```
//!
//! # Design Decisions
//! - No state outlives a request; the current URL is an explicit argument
//! - URL handling is total; malformed markup degrades to pass-through
//! - Only HTML and CSS bodies are buffered

pub mod charset;
pub mod css;
pub mod dispatch;
pub mod headers;
pub mod html;
pub mod path;
pub mod url;

pub use dispatch::{dispatch, ContentKind, ProxiedResponse};
pub use url::{CurrentContext, UrlGenerator, UrlParts};
