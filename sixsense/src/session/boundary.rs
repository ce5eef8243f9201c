//! Inferring command boundaries and meaningful output from shell text.
//!
//! There is no framing on an interactive shell. A command is considered
//! finished once, scanning backwards from the newest line, the learned
//! prompt was seen twice and one of those prompt lines also carried the
//! command echo: echo, output, fresh prompt.
//!
//! This is an approximation. Only the first line of a multi-line command
//! is searched for, including its line break, so multi-line commands
//! never close the boundary and instead resolve on their expected outcome
//! or time out. A prompt string recurring inside command output can also
//! close the boundary early.

use crate::model::collapse_whitespace;

/// Drop lines that belong to earlier commands and report whether the
/// current command has visibly finished.
///
/// With no learned prompt nothing is trimmed and the boundary never closes.
pub fn remove_outdated_chunks(lines: &mut Vec<String>, prompt: &str, command: &str) -> bool {
    if lines.is_empty() || prompt.is_empty() {
        return false;
    }

    let first_line = match command.find('\n') {
        Some(idx) => &command[..=idx],
        None => command,
    };

    let mut first_relevant = 0;
    let mut prompt_score = 0;
    let mut command_score = 0;
    let mut prompt_appears_twice = false;
    let mut command_appears_once = false;

    for (idx, line) in lines.iter().enumerate().rev() {
        if prompt_score + command_score >= 2 {
            break;
        }
        if line.starts_with(prompt) {
            prompt_score += 1;
            first_relevant = idx;
            if line.contains(first_line) {
                command_appears_once = true;
                command_score += 1;
            }
            if prompt_score >= 2 {
                prompt_appears_twice = true;
            }
        }
    }

    lines.drain(..first_relevant);
    command_appears_once && prompt_appears_twice
}

/// Join lines into one user-facing string without echo or prompt.
pub fn filter_raw_output(lines: &[String], prompt: &str, command: &str) -> String {
    let strip = |text: &str| -> String {
        let mut text = text.to_string();
        if !command.is_empty() {
            text = text.replace(command, "");
        }
        if !prompt.is_empty() {
            text = text.replace(prompt, "");
        }
        text
    };

    let joined = lines
        .iter()
        .map(|line| strip(&line.replace("\r\n", " ").replace(['\n', '\r'], " ")))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    strip(&collapse_whitespace(&joined))
}

/// Strip echo and prompt artifacts from a value about to be written to file.
pub fn filter_file_output(value: &str, prompt: &str, command: &str) -> String {
    let mut value = value.to_string();
    if !command.is_empty() {
        value = value.replace(command, "");
    }
    if !prompt.is_empty() {
        value = value.replace(prompt, "");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "user@host:~$";

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_finished_command_closes_boundary() {
        let mut buffer = lines(&[
            "old output",
            "user@host:~$ ls",
            "file",
            "user@host:~$ echo 1",
            "1",
            "user@host:~$ ",
        ]);
        assert!(remove_outdated_chunks(&mut buffer, PROMPT, "echo 1"));
        assert_eq!(buffer, lines(&["user@host:~$ echo 1", "1", "user@host:~$ "]));
    }

    #[test]
    fn test_echo_without_fresh_prompt_stays_open() {
        let mut buffer = lines(&["user@host:~$ ", "user@host:~$ sleep 5"]);
        assert!(!remove_outdated_chunks(&mut buffer, PROMPT, "sleep 5"));
        assert_eq!(buffer, lines(&["user@host:~$ sleep 5"]));
    }

    #[test]
    fn test_two_prompts_without_command_stay_open() {
        let mut buffer = lines(&["user@host:~$ ", "noise", "user@host:~$ "]);
        assert!(!remove_outdated_chunks(&mut buffer, PROMPT, "echo 1"));
        assert_eq!(buffer, lines(&["user@host:~$ ", "noise", "user@host:~$ "]));
    }

    #[test]
    fn test_multi_line_command_never_closes() {
        let mut buffer = lines(&["user@host:~$ echo a", "> echo b", "a", "b", "user@host:~$ "]);
        assert!(!remove_outdated_chunks(&mut buffer, PROMPT, "echo a\necho b"));
    }

    #[test]
    fn test_unknown_prompt_trims_nothing() {
        let mut buffer = lines(&["banner", "$ "]);
        assert!(!remove_outdated_chunks(&mut buffer, "", ""));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_filter_raw_output() {
        let buffer = lines(&["user@host:~$ echo 1", "1", "user@host:~$ "]);
        assert_eq!(filter_raw_output(&buffer, PROMPT, "echo 1"), "1");

        let multi = lines(&["user@host:~$ cat f", "a   b", "", "c", "user@host:~$ "]);
        assert_eq!(filter_raw_output(&multi, PROMPT, "cat f"), "a b c");
    }

    #[test]
    fn test_filter_blank_output() {
        assert_eq!(filter_raw_output(&lines(&["", "", ""]), PROMPT, "x"), "");
    }

    #[test]
    fn test_filter_file_output() {
        assert_eq!(
            filter_file_output("user@host:~$ show run\nconfig", PROMPT, "show run"),
            " \nconfig"
        );
    }
}
