//! Prompt assembly from a task's discussion thread.

/// First line of every comment this system posts.
///
/// Thread messages starting with it are never fed back into a prompt.
pub const COMMENT_HEADER: &str = "vibe project comment";

/// Separator placed between thread messages in an assembled prompt.
pub const PROMPT_DIVIDER: &str = "\n\n---\n\n";

/// Returns `true` for messages previously posted by this system.
#[must_use]
pub fn is_own_comment(message: &str) -> bool {
    message.trim_start().starts_with(COMMENT_HEADER)
}

/// Joins the human-authored messages of a thread into one prompt.
///
/// Blank messages and this system's own comments are dropped. Returns `None`
/// when nothing remains.
#[must_use]
pub fn prompt_from_thread<I, S>(messages: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = messages
        .into_iter()
        .map(|message| message.as_ref().trim().to_owned())
        .filter(|message| !message.is_empty() && !is_own_comment(message))
        .collect();
    (!parts.is_empty()).then(|| parts.join(PROMPT_DIVIDER))
}
