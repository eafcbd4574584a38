//! Batch classification.
//!
//! A pure decision tree that maps one batch of fragments to a
//! [`Rendering`]. No side effects; the regexes are compiled once and
//! held in the [`Classifier`] value.
//!
//! # Decision Order (first match wins)
//!
//! 1. Exactly one fragment, rich, string-valued, leading `<img` →
//!    [`Rendering::Image`] with the `src="..."` locator.
//! 2. Exactly one rich string fragment containing the
//!    label/confidence table header → [`Rendering::Classification`]
//!    with the first two inner values.
//! 3. Any rich fragment present (several fragments, structured
//!    values, unrecognized markup) → [`Rendering::RichUnsupported`].
//! 4. Otherwise → [`Rendering::PlainText`], all values joined by
//!    `\r\n` in batch order.
//!
//! Ties default to rich-unsupported: two rich fragments in one batch
//! go to the viewer even if one alone would have been an image. A
//! recognized shape with too few inner values degrades the same way.

use cord_types::OutputFragment;
use regex::Regex;

/// How much of the decision tree to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Full tree: image and classification shapes are recognized.
    Full,

    /// Rich output collapses straight to the viewer card. Used by
    /// flows that only distinguish rich from plain output (help).
    Simple,
}

/// The rendering decision for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering {
    /// A single image; payload is the extracted source locator.
    Image {
        /// Value of the `src` attribute.
        src: String,
    },

    /// A single label/confidence result.
    Classification {
        /// The predicted label.
        label: String,
        /// The confidence value, verbatim.
        confidence: String,
    },

    /// Rich content with no recognized shape; rendered as a viewer
    /// card at most once per submission.
    RichUnsupported,

    /// Plain text; payload is the joined fragment values.
    PlainText {
        /// All values joined by `\r\n` in batch order.
        content: String,
    },
}

/// Compiled decision tree over batches.
///
/// # Example
///
/// ```
/// use cord_runtime::{Classifier, RenderMode, Rendering};
/// use cord_types::OutputFragment;
///
/// let classifier = Classifier::new();
/// let batch = vec![OutputFragment::html("<img src=\"http://x/y.png\">")];
/// assert_eq!(
///     classifier.classify(&batch, RenderMode::Full),
///     Rendering::Image { src: "http://x/y.png".into() },
/// );
/// ```
#[derive(Debug)]
pub struct Classifier {
    image: Regex,
    image_src: Regex,
    table_header: Regex,
    inner_value: Regex,
}

impl Classifier {
    /// Compiles the recognizer patterns.
    #[must_use]
    pub fn new() -> Self {
        // Literal patterns; compilation cannot fail at runtime.
        Self {
            image: Regex::new(r"^<img").expect("literal regex"),
            image_src: Regex::new(r#"(?s)src="(.*?)""#).expect("literal regex"),
            table_header: Regex::new(r"<tr><th>Label</th><th>Confidence</th></tr>")
                .expect("literal regex"),
            inner_value: Regex::new(r#"(?s)dni-plaintext">(.*?)<"#).expect("literal regex"),
        }
    }

    /// Classifies one batch.
    ///
    /// The batch must be non-empty; empty windows never reach the
    /// classifier. An empty slice classifies as empty plain text,
    /// which is harmless.
    #[must_use]
    pub fn classify(&self, batch: &[OutputFragment], mode: RenderMode) -> Rendering {
        if !batch.iter().any(OutputFragment::is_rich) {
            let content = batch
                .iter()
                .map(|f| f.value.render())
                .collect::<Vec<_>>()
                .join("\r\n");
            return Rendering::PlainText { content };
        }

        if mode == RenderMode::Full && batch.len() == 1 {
            // the single fragment is the rich one
            if let Some(value) = batch[0].as_str() {
                if self.image.is_match(value) {
                    if let Some(caps) = self.image_src.captures(value) {
                        return Rendering::Image {
                            src: caps[1].to_string(),
                        };
                    }
                    // image tag without a source: nothing to attach
                    return Rendering::RichUnsupported;
                }
                if self.table_header.is_match(value) {
                    let mut values = self.inner_value.captures_iter(value);
                    if let (Some(label), Some(confidence)) = (values.next(), values.next()) {
                        return Rendering::Classification {
                            label: label[1].to_string(),
                            confidence: confidence[1].to_string(),
                        };
                    }
                    // recognized header but missing inner values
                    return Rendering::RichUnsupported;
                }
            }
        }

        Rendering::RichUnsupported
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(batch: &[OutputFragment]) -> Rendering {
        Classifier::new().classify(batch, RenderMode::Full)
    }

    // === Image ===

    #[test]
    fn single_image_fragment_classifies_as_image() {
        let batch = vec![OutputFragment::html("<img src=\"http://x/y.png\">")];
        assert_eq!(
            classify(&batch),
            Rendering::Image {
                src: "http://x/y.png".into()
            }
        );
    }

    #[test]
    fn img_must_lead_the_markup() {
        let batch = vec![OutputFragment::html("<div><img src=\"http://x/y.png\"></div>")];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    #[test]
    fn image_without_src_degrades() {
        let batch = vec![OutputFragment::html("<img alt=\"no source\">")];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    // === Classification result ===

    #[test]
    fn label_confidence_table_classifies() {
        let markup = "<table><tr><th>Label</th><th>Confidence</th></tr>\
                      <tr><td><span class=\"dni-plaintext\">cat</span></td>\
                      <td><span class=\"dni-plaintext\">0.97</span></td></tr></table>";
        let batch = vec![OutputFragment::html(markup)];
        assert_eq!(
            classify(&batch),
            Rendering::Classification {
                label: "cat".into(),
                confidence: "0.97".into()
            }
        );
    }

    #[test]
    fn table_with_one_inner_value_degrades() {
        let markup = "<tr><th>Label</th><th>Confidence</th></tr>\
                      <span class=\"dni-plaintext\">cat</span>";
        let batch = vec![OutputFragment::html(markup)];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    // === Rich fallback ===

    #[test]
    fn unrecognized_markup_is_rich_unsupported() {
        let batch = vec![OutputFragment::html("<table><tr><td>5</td></tr></table>")];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    #[test]
    fn two_rich_fragments_tie_to_rich_unsupported() {
        // one of these alone would classify as an image
        let batch = vec![
            OutputFragment::html("<img src=\"http://x/y.png\">"),
            OutputFragment::html("<b>more</b>"),
        ];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    #[test]
    fn mixed_rich_and_plain_is_rich_unsupported() {
        let batch = vec![
            OutputFragment::text("line"),
            OutputFragment::html("<b>rich</b>"),
        ];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    #[test]
    fn structured_value_never_matches_a_shape() {
        let batch = vec![OutputFragment::data(json!({"img": "nope"}))];
        assert_eq!(classify(&batch), Rendering::RichUnsupported);
    }

    // === Plain text ===

    #[test]
    fn plain_fragments_join_in_order() {
        let batch = vec![
            OutputFragment::text("one"),
            OutputFragment::text("two"),
            OutputFragment::text("three"),
        ];
        assert_eq!(
            classify(&batch),
            Rendering::PlainText {
                content: "one\r\ntwo\r\nthree".into()
            }
        );
    }

    // === Simple mode ===

    #[test]
    fn simple_mode_collapses_image_to_rich() {
        let classifier = Classifier::new();
        let batch = vec![OutputFragment::html("<img src=\"http://x/y.png\">")];
        assert_eq!(
            classifier.classify(&batch, RenderMode::Simple),
            Rendering::RichUnsupported
        );
    }

    #[test]
    fn simple_mode_keeps_plain_text() {
        let classifier = Classifier::new();
        let batch = vec![OutputFragment::text("plain")];
        assert_eq!(
            classifier.classify(&batch, RenderMode::Simple),
            Rendering::PlainText {
                content: "plain".into()
            }
        );
    }
}
