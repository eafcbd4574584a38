//! In-process demo kernel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cord_types::OutputFragment;
use tracing::debug;

use crate::{ExecCommand, Kernel, KernelError, OutputGateway};

/// A [`Kernel`] that interprets a tiny snippet language in-process.
///
/// Exists so the CLI can demonstrate the full pipeline — batching,
/// classification, viewer cards, terminal notices — without a real
/// language engine. Each line of the source is interpreted on a
/// spawned task:
///
/// | Line | Effect |
/// |------|--------|
/// | `#img <url>` | rich fragment `<img src="<url>">` (renders as image) |
/// | `#classify <label> <confidence>` | rich fragment in the label/confidence table shape |
/// | `#html <markup>` | rich fragment with the raw markup (renders as viewer card) |
/// | `#fail <message>` | terminal failure with the message; stops interpreting |
/// | `#sleep <ms>` | pause before the next line (exercises batch windows) |
/// | anything else | plain text fragment echoing the line |
///
/// After the last line the kernel completes the submission.
///
/// # Example
///
/// A snippet of
///
/// ```text
/// hello
/// #sleep 1500
/// #img http://x/y.png
/// ```
///
/// emits a text batch, then (in a later window) an image batch, then
/// completes.
pub struct LoopbackKernel;

impl LoopbackKernel {
    /// Creates the demo kernel.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopbackKernel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Kernel for LoopbackKernel {
    fn can_execute(&self) -> bool {
        true
    }

    async fn submit(
        &self,
        command: ExecCommand,
        gateway: Arc<dyn OutputGateway>,
    ) -> Result<(), KernelError> {
        debug!(id = %command.submission, language = %command.language, "loopback submit");
        tokio::spawn(interpret(command, gateway));
        Ok(())
    }
}

async fn interpret(command: ExecCommand, gateway: Arc<dyn OutputGateway>) {
    let id = command.submission;
    for line in command.source.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#img ") {
            gateway.publish(id, OutputFragment::html(format!("<img src=\"{}\">", rest.trim())));
        } else if let Some(rest) = line.strip_prefix("#classify ") {
            let mut parts = rest.split_whitespace();
            let label = parts.next().unwrap_or("unknown");
            let confidence = parts.next().unwrap_or("0.0");
            gateway.publish(id, OutputFragment::html(classification_table(label, confidence)));
        } else if let Some(rest) = line.strip_prefix("#html ") {
            gateway.publish(id, OutputFragment::html(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix("#fail ") {
            gateway.fail(id, rest);
            return;
        } else if let Some(rest) = line.strip_prefix("#sleep ") {
            let ms = rest.trim().parse::<u64>().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        } else {
            gateway.publish(id, OutputFragment::text(line.to_string()));
        }
    }
    gateway.complete(id);
}

/// Builds markup in the shape the classifier recognizes as a
/// label/confidence result.
fn classification_table(label: &str, confidence: &str) -> String {
    format!(
        "<table><thead><tr><th>Label</th><th>Confidence</th></tr></thead>\
         <tbody><tr>\
         <td><span class=\"dni-plaintext\">{label}</span></td>\
         <td><span class=\"dni-plaintext\">{confidence}</span></td>\
         </tr></tbody></table>"
    )
}
