//! Converts archived puzzle pages into Markdown.
//!
//! ```
//! let html = r#"<main><article><h2>--- Day 1: Inverse Captcha ---</h2><p>Hi</p></article></main>"#;
//! let page = puzzle_markup::convert_html(html, "https://adventofcode.com/2017/day/1")?;
//! assert_eq!(page.title, "Inverse Captcha");
//! # Ok::<(), puzzle_markup::ConvertError>(())
//! ```

pub mod convert;
pub mod error;
pub mod node;
pub mod url;

pub use convert::{
    convert, convert_html, extract_title, render_children, render_node, ConversionResult,
    RenderContext, Tag,
};
pub use error::{ConvertError, Result};
pub use node::{Element, MarkupNode};
pub use url::{puzzle_url, UrlError};
