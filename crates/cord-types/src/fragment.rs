//! Typed execution output.
//!
//! An [`OutputFragment`] is one unit of output produced by the
//! execution engine: a MIME-like type tag plus a value. The tag is
//! what the classifier keys on — `text/html` fragments are "rich"
//! and may render as an image, a classification table, or a viewer
//! card; everything else is plain text.

use serde::{Deserialize, Serialize};

/// MIME type tags used by the execution engine.
pub mod mime {
    /// Plain text output (console writes, return values).
    pub const TEXT: &str = "text/plain";

    /// Rich markup output (formatted objects, images, tables).
    pub const HTML: &str = "text/html";
}

/// Value carried by an [`OutputFragment`].
///
/// Engines usually emit strings, but formatted objects may arrive as
/// structured data. Structured values never match the image or
/// classification shapes; they classify as rich-unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentValue {
    /// A string value (the common case).
    Text(String),

    /// A structured value the engine serialized instead of
    /// formatting.
    Data(serde_json::Value),
}

impl FragmentValue {
    /// Returns the string value, or `None` for structured data.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Data(_) => None,
        }
    }

    /// Renders the value for inclusion in a plain-text payload.
    ///
    /// Strings render as themselves; structured data renders as
    /// compact JSON.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Data(v) => v.to_string(),
        }
    }
}

/// One typed unit of execution output.
///
/// Fragments for one submission arrive in emission order from the
/// engine, keyed by submission id at the callback boundary. The
/// fragment itself carries no id; correlation is the channel
/// registry's job.
///
/// # Example
///
/// ```
/// use cord_types::{mime, OutputFragment};
///
/// let plain = OutputFragment::text("1 + 1 = 2");
/// assert_eq!(plain.mime_type, mime::TEXT);
/// assert!(!plain.is_rich());
///
/// let rich = OutputFragment::html("<img src=\"http://x/y.png\">");
/// assert!(rich.is_rich());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFragment {
    /// MIME-like type tag, e.g. `text/plain` or `text/html`.
    pub mime_type: String,

    /// The produced value.
    pub value: FragmentValue,
}

impl OutputFragment {
    /// Creates a fragment with an explicit type tag.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, value: FragmentValue) -> Self {
        Self {
            mime_type: mime_type.into(),
            value,
        }
    }

    /// Creates a `text/plain` fragment from a string.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(mime::TEXT, FragmentValue::Text(value.into()))
    }

    /// Creates a `text/html` fragment from a markup string.
    #[must_use]
    pub fn html(value: impl Into<String>) -> Self {
        Self::new(mime::HTML, FragmentValue::Text(value.into()))
    }

    /// Creates a `text/html` fragment carrying structured data.
    #[must_use]
    pub fn data(value: serde_json::Value) -> Self {
        Self::new(mime::HTML, FragmentValue::Data(value))
    }

    /// Returns `true` if this fragment is rich markup (`text/html`).
    #[must_use]
    pub fn is_rich(&self) -> bool {
        self.mime_type == mime::HTML
    }

    /// Returns the string value, or `None` for structured data.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}
