use std::io;

use dialoguer::{Confirm, Input, Password};

/// Interactive user prompts.
pub(crate) trait Prompter {
    /// Ask a yes/no question.
    fn confirm(&self, message: &str, default: bool) -> io::Result<bool>;

    /// Ask for a line of text.
    fn input(&self, message: &str) -> io::Result<String>;

    /// Ask for a secret value without echoing it.
    fn password(&self, message: &str) -> io::Result<String>;
}

/// [`Prompter`] that interacts with the current terminal.
pub(crate) struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str, default: bool) -> io::Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
    }

    fn input(&self, message: &str) -> io::Result<String> {
        Input::<String>::new().with_prompt(message).interact_text()
    }

    fn password(&self, message: &str) -> io::Result<String> {
        Password::new().with_prompt(message).interact()
    }
}
