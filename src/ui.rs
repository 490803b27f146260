use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

/// Menu over `items`. `None` when the user backs out with Esc or q.
pub fn select_from_list(items: &[String], prompt: &str) -> Result<Option<usize>> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()
        .with_context(|| format!("Menu \"{prompt}\" could not be shown"))
}

/// Free-text prompt; blank answers are asked again.
pub fn prompt_input(prompt: &str) -> Result<String> {
    let input = Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|text: &String| {
            if text.trim().is_empty() {
                Err("Please type something")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Could not read input")?;

    Ok(input.trim().to_string())
}

/// Single user-facing line for the outcome of an action.
pub fn notify(message: &str) {
    eprintln!("anistream: {message}");
}

/// Spinner shown while a resolution runs; cleared when dropped.
pub struct Spinner(ProgressBar);

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self(bar)
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}
