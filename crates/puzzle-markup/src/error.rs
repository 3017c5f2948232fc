use thiserror::Error;

/// Reasons a puzzle page cannot be converted.
///
/// Every variant is terminal for the conversion that raised it: the converter
/// never substitutes defaults or drops content it cannot render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The page no longer has the shape the converter expects.
    #[error("page structure changed: no `{missing}` element found")]
    StructuralMismatch { missing: &'static str },
    #[error("`<{tag}>` element is missing its `{attribute}` attribute")]
    MissingAttribute {
        tag: &'static str,
        attribute: &'static str,
    },
    /// A tag outside the supported set, with a snapshot of its content.
    #[error("unsupported markup `<{tag}>`: {inner_html}")]
    UnsupportedMarkup { tag: String, inner_html: String },
}

pub type Result<T> = std::result::Result<T, ConvertError>;
