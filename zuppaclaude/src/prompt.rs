//! Interactive prompts.
//!
//! Commands that need a decision from the user take a [`Prompter`] so they can
//! be driven by a script in tests.

use crate::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};

pub trait Prompter: Send + Sync {
    /// Pick one of `items`, returning its index
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize>;

    /// Yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Terminal prompts
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for DialoguerPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for DialoguerPrompter {
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize> {
        let selection = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?;
        Ok(selection)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(answer)
    }
}
