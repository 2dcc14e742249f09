//! ui::feedback
//!
//! Literal texts of the comments posted in reply to bot commands.
//!
//! Every command invocation produces exactly one of these. The wording is
//! fixed; automation downstream greps for it.

/// Reply to a command name the bot does not know.
pub fn unknown_command(prefix: &str, name: &str) -> String {
    format!(
        "Unknown command: `{name}`\n\n\
         Supported commands:\n\
         - `{prefix} split <sha1>-<sha2>`\n\
         - `{prefix} rebase`"
    )
}

pub fn split_complete(kept: usize, moved: usize, new_pr: u64) -> String {
    format!(
        "Split complete: this PR now has {kept} commit(s); {moved} commit(s) moved to #{new_pr}."
    )
}

pub fn rebased(branch: &str, base: &str, commits: usize) -> String {
    format!("Rebased `{branch}` onto `{base}`: {commits} commit(s).")
}

pub fn rejected(command: &str, reason: &str) -> String {
    format!("Cannot run `{command}`: {reason}")
}

pub fn failed(command: &str, error: &str) -> String {
    format!("Failed to execute command `{command}`: {error}")
}

/// Manual steps after a rebase stopped on conflicts.
pub fn rebase_conflict(remote: &str, branch: &str, base: &str) -> String {
    format!(
        "Rebase failed with conflicts. The branch was left unchanged; rebase it by hand:\n\n\
         ```\n\
         git fetch {remote}\n\
         git checkout {branch}\n\
         git rebase {remote}/{base}\n\
         # resolve the conflicts, then for each file\n\
         git add <file>\n\
         git rebase --continue\n\
         git push --force-with-lease {remote} {branch}\n\
         ```"
    )
}
