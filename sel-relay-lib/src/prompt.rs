//! Interactive input seam.
//!
//! The workflow never reads stdin itself; a front end supplies a
//! [`Prompter`]. Closing the input (EOF) is reported as
//! [`RelayError::Cancelled`].

use async_trait::async_trait;

use crate::constants::CANCEL_TOKEN;
use crate::error::{RelayError, Result};

#[async_trait]
pub trait Prompter: Send {
    /// Show `question` and wait for one line of input, without the newline.
    async fn ask(&mut self, question: &str) -> Result<String>;

    /// Show an informational message.
    fn show(&mut self, _message: &str) {}
}

/// The value of a decimal string of a number greater than zero.
pub fn parse_positive(input: &str) -> Option<u32> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse::<u32>().ok().filter(|n| *n > 0)
}

pub fn is_cancel_token(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(CANCEL_TOKEN)
}

/// Ask for a positive integer until one is given. Typing the cancel token
/// yields `Err(Cancelled)`.
pub async fn ask_positive(prompter: &mut dyn Prompter, question: &str) -> Result<u32> {
    loop {
        let answer = prompter.ask(question).await?;
        if is_cancel_token(&answer) {
            return Err(RelayError::Cancelled(format!("user typed '{CANCEL_TOKEN}'")));
        }
        match parse_positive(&answer) {
            Some(n) => return Ok(n),
            None => prompter.show("Invalid input. Please enter a positive integer."),
        }
    }
}
