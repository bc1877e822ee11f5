//! Reminder text selection.

use rand::seq::SliceRandom;

use nudge_config::DEFAULT_PROMPT;
use nudge_core::UserId;

/// Pick a prompt uniformly at random (blank entries never win) and, past
/// the first attempt, annotate it with the attempt ordinal.
pub fn compose_reminder(prompts: &[String], attempt: u32, user: &UserId) -> String {
    let usable: Vec<&str> = prompts
        .iter()
        .map(String::as_str)
        .filter(|p| !p.trim().is_empty())
        .collect();
    let base = usable
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_PROMPT);

    if attempt > 1 {
        format!("{base}\n(attempt #{attempt} to reach {user})")
    } else {
        base.to_string()
    }
}
