//! Operator prompts using dialoguer
//!
//! Only the binary's interactive mode reaches these; planning itself never
//! asks anything.

use crate::utils::error::{DiskplanError, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

/// Prompt for text input
pub fn prompt_input(prompt: &str, default: Option<&str>) -> Result<String> {
    let theme = ColorfulTheme::default();
    let mut input = Input::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty(true);

    if let Some(d) = default {
        input = input.default(d.to_string());
    }

    input
        .interact_text()
        .map_err(|_| DiskplanError::UserCancelled)
}

/// Prompt for yes/no confirmation
pub fn prompt_confirm(prompt: &str, default: bool) -> Result<bool> {
    let theme = ColorfulTheme::default();
    Confirm::with_theme(&theme)
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
        .map_err(|e| DiskplanError::Io(std::io::Error::other(e.to_string())))?
        .ok_or(DiskplanError::UserCancelled)
}

/// Prompt for selection from a list
pub fn prompt_select<T: ToString>(prompt: &str, items: &[T], default: usize) -> Result<usize> {
    let theme = ColorfulTheme::default();
    Select::with_theme(&theme)
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact_opt()
        .map_err(|e| DiskplanError::Io(std::io::Error::other(e.to_string())))?
        .ok_or(DiskplanError::UserCancelled)
}
