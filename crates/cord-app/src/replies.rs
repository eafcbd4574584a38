//! Reply wording.
//!
//! All conversation-facing text lives here so the bot logic stays
//! readable and tests can assert on one source of truth. `marker` is
//! always the sender's mention marker (`<at>{name}</at>`); replies
//! that contain it get the mention annotation attached downstream.

/// Acknowledgement when a new active user submits code, quoting the
/// snippet.
pub fn ack_new_user(marker: &str, code: &str) -> String {
    format!(
        "Hey {marker}, I see that you have written some code!\r\n I got: \r\n```{code}```\r\n Let me run that for you! 😊"
    )
}

/// Rotating encouragement for a repeat active user, chosen by their
/// submission count.
pub fn encouragement(marker: &str, submissions: u32) -> String {
    let lines = [
        format!("Back for more, {marker}? Queuing it up! 🚀"),
        format!("{marker} is on a roll! Running it now 🏃"),
        format!("Another one from {marker}! Let's see what this does 🔍"),
        format!("You're unstoppable, {marker}! On it 💪"),
    ];
    let index = (submissions as usize) % lines.len();
    lines[index].clone()
}

/// The single "execution finished" notice.
pub fn done_notice(marker: &str) -> String {
    format!("Good news, {marker}! I'm all done here 👍")
}

/// Prefix of the single "execution failed" notice; the runner
/// appends the error text in a code fence.
pub fn failed_notice(marker: &str) -> String {
    format!("Hate to break this to you {marker}, but there were some issues... 👎")
}

/// Reply when the engine readiness gate fails.
pub fn unavailable(marker: &str) -> String {
    format!("Sorry {marker}, but I cannot execute your code right now. 😓")
}

/// Confirmation after the session language is set.
pub fn language_set(language: &str) -> String {
    format!("All set. Let's write some {language} code together! 🤘🏻")
}

/// Prompt when a conversation has no session language yet.
pub fn language_prompt() -> String {
    "Before we start, pick a language for this conversation — try `/lang csharp` or `/lang fsharp`."
        .to_string()
}

/// Introduction, sent when the bot joins or is greeted.
pub fn intro() -> String {
    "Hi, I'm cord! 👋 Send me a code snippet and I'll run it and stream the results back here."
        .to_string()
}

/// Fist-bump reply.
pub fn fist_bump(marker: &str) -> String {
    format!("Right back at ya, {marker}! 👊")
}

/// Done notice for the help flow.
pub fn help_done(marker: &str) -> String {
    format!("So, {marker}, anything there look interesting to you?")
}

/// Reflection snippet the help flow submits: lists the topic's
/// properties and public methods.
pub fn help_snippet(topic: &str) -> String {
    format!(
        r#"
using System.ComponentModel;
using System;
using System.Reflection;
Console.WriteLine("Properties: ");
foreach(PropertyDescriptor descriptor in TypeDescriptor.GetProperties({topic}))
{{
        string name=descriptor.Name;
        Console.WriteLine("  {{0}}",name);
}}
Console.WriteLine("Methods: ");
foreach(MethodInfo method in {topic}.GetType().GetMethods(BindingFlags.Static|BindingFlags.Instance|BindingFlags.Public))
{{
        if (!char.IsLower(method.Name[0])) {{
            string name=method.Name;
            Console.WriteLine("  {{0}}",name);
        }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_quotes_the_snippet_and_mentions_the_sender() {
        let text = ack_new_user("<at>Ada</at>", "var x = 1;");
        assert!(text.contains("<at>Ada</at>"));
        assert!(text.contains("```var x = 1;```"));
    }

    #[test]
    fn encouragement_rotates_by_count() {
        let a = encouragement("<at>Ada</at>", 0);
        let b = encouragement("<at>Ada</at>", 1);
        assert_ne!(a, b);
        // wraps around
        assert_eq!(a, encouragement("<at>Ada</at>", 4));
    }

    #[test]
    fn help_snippet_embeds_the_topic() {
        let snippet = help_snippet("roverBody");
        assert!(snippet.contains("TypeDescriptor.GetProperties(roverBody)"));
        assert!(snippet.contains("roverBody.GetType().GetMethods("));
    }
}
