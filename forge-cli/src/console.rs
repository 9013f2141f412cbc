//! Line-oriented terminal I/O.

use crate::error::CliError;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub fn say(&self, text: impl AsRef<str>) {
        println!("{}", text.as_ref());
    }

    /// Print `label` and read one line. `None` on end of input.
    pub async fn prompt(&mut self, label: &str) -> Result<Option<String>, CliError> {
        print!("{} ", label);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Yes/no question; a blank answer takes `default`.
    pub async fn confirm(&mut self, question: &str, default: bool) -> Result<bool, CliError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = self.prompt(&format!("{} {}", question, hint)).await?;
        Ok(match answer.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("y") | Some("yes") => true,
            Some("n") | Some("no") => false,
            _ => default,
        })
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
