use colored::Colorize;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// The interactive surface the mutation engine talks to.
///
/// Destructive or conflicting operations suspend on [`ask_yes_no`]; status
/// text goes to [`notify`] fire-and-forget. The engine never touches a
/// terminal directly, so tests drive it with [`ScriptedInteraction`].
///
/// [`ask_yes_no`]: Interaction::ask_yes_no
/// [`notify`]: Interaction::notify
pub trait Interaction {
    /// Ask a yes/no question with the stated default and return the answer.
    fn ask_yes_no(&mut self, prompt: &str, default_yes: bool) -> bool;

    /// Deliver a human-readable status line. No acknowledgement.
    fn notify(&mut self, message: &str);
}

/// Real terminal: prompts on stdout, reads answers from stdin.
#[derive(Debug, Default)]
pub struct TerminalInteraction;

impl Interaction for TerminalInteraction {
    fn ask_yes_no(&mut self, prompt: &str, default_yes: bool) -> bool {
        let hint = if default_yes { "(Y/n)" } else { "(y/N)" };
        let stdin = io::stdin();
        loop {
            print!("{} {} ", prompt, hint.dimmed());
            let _ = io::stdout().flush();

            let mut answer = String::new();
            if stdin.lock().read_line(&mut answer).is_err() {
                return default_yes;
            }
            match answer.trim().to_lowercase().as_str() {
                "" => return default_yes,
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => println!("{}", "Please answer y or n.".yellow()),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Canned answers and recorded notifications, for tests and `--yes` runs.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    answers: VecDeque<bool>,
    fallback: Option<bool>,
    pub notices: Vec<String>,
}

impl ScriptedInteraction {
    /// Answer the queued booleans in order; once exhausted, answer with the
    /// question's own default.
    pub fn with_answers(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback: None,
            notices: Vec::new(),
        }
    }

    /// Answer every question the same way, regardless of its default.
    pub fn always(answer: bool) -> Self {
        Self {
            answers: VecDeque::new(),
            fallback: Some(answer),
            notices: Vec::new(),
        }
    }
}

impl Interaction for ScriptedInteraction {
    fn ask_yes_no(&mut self, prompt: &str, default_yes: bool) -> bool {
        self.notices.push(prompt.to_string());
        self.answers
            .pop_front()
            .or(self.fallback)
            .unwrap_or(default_yes)
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_answers_in_order() {
        let mut interaction = ScriptedInteraction::with_answers([true, false]);
        assert!(interaction.ask_yes_no("first?", false));
        assert!(!interaction.ask_yes_no("second?", true));
    }

    #[test]
    fn test_scripted_falls_back_to_default() {
        let mut interaction = ScriptedInteraction::with_answers([]);
        assert!(!interaction.ask_yes_no("delete?", false));
        assert!(interaction.ask_yes_no("continue?", true));
    }

    #[test]
    fn test_scripted_always_overrides_default() {
        let mut interaction = ScriptedInteraction::always(true);
        assert!(interaction.ask_yes_no("delete?", false));
    }

    #[test]
    fn test_scripted_records_notices() {
        let mut interaction = ScriptedInteraction::default();
        interaction.notify("created f.txt");
        interaction.ask_yes_no("sure?", false);
        assert_eq!(interaction.notices, vec!["created f.txt", "sure?"]);
    }
}
