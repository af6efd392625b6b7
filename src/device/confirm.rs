use std::io::{self, BufRead, Write};

use crate::error::Result;

pub trait Confirm {
    /// Asks the operator a yes/no question; only an affirmative answer is `true`.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("{} [y/N] ", prompt);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
