//! Operator interaction
//!
//! The matching code only sees the [`Operator`] trait; the terminal
//! implementation blocks on stdin, which is acceptable for an
//! operator-supervised batch job.

use std::io::{self, BufRead, Write};

/// Answer to "is A the same person as B?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasAnswer {
    Yes,
    No,
    /// Yes, and remember for the rest of the run
    Always,
    /// Yes, and remember the site-suffixed name for the rest of the run
    AlwaysForSite,
}

impl AliasAnswer {
    pub fn accepted(self) -> bool {
        !matches!(self, AliasAnswer::No)
    }
}

pub trait Operator: Send {
    /// Pick one of `options` (0-based); `None` skips the scene
    fn choose_candidate(&mut self, scene_label: &str, options: &[String]) -> Option<usize>;

    /// Confirm that `remote_name` on `site` is the performer `canonical_name`
    fn confirm_alias(&mut self, remote_name: &str, canonical_name: &str, site: &str) -> AliasAnswer;
}

/// Declines every prompt (unattended runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractiveOperator;

impl Operator for NonInteractiveOperator {
    fn choose_candidate(&mut self, _scene_label: &str, _options: &[String]) -> Option<usize> {
        None
    }

    fn confirm_alias(&mut self, _remote_name: &str, _canonical_name: &str, _site: &str) -> AliasAnswer {
        AliasAnswer::No
    }
}

/// Prompts on a terminal (or any reader/writer pair)
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl TerminalOperator<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        // A broken terminal behaves like end of input
        if write!(self.output, "{}", text).and_then(|_| self.output.flush()).is_err() {
            return None;
        }
        self.read_line()
    }
}

impl<R: BufRead + Send, W: Write + Send> Operator for TerminalOperator<R, W> {
    fn choose_candidate(&mut self, scene_label: &str, options: &[String]) -> Option<usize> {
        let mut menu = format!("\nMultiple results for: {}\n", scene_label);
        for (i, option) in options.iter().enumerate() {
            menu.push_str(&format!("{}: {}\n", i + 1, option));
        }
        menu.push_str("0: None of the above\n");

        loop {
            let answer = self.prompt(&format!("{}Enter selection: ", menu))?;
            match answer.parse::<usize>() {
                Ok(0) => return None,
                Ok(n) if n <= options.len() => return Some(n - 1),
                _ => {
                    menu = format!("Please enter a number between 0 and {}\n", options.len());
                }
            }
        }
    }

    fn confirm_alias(&mut self, remote_name: &str, canonical_name: &str, site: &str) -> AliasAnswer {
        let question = format!(
            "\n{} linked {} to {}.\nIs this the same performer? \
             (y)es / (n)o / (a)lways / always for this (s)ite: ",
            site, remote_name, canonical_name
        );
        loop {
            let Some(answer) = self.prompt(&question) else {
                return AliasAnswer::No;
            };
            match answer.to_lowercase().as_str() {
                "y" | "yes" => return AliasAnswer::Yes,
                "n" | "no" => return AliasAnswer::No,
                "a" | "always" => return AliasAnswer::Always,
                "s" | "site" => return AliasAnswer::AlwaysForSite,
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(input: &str) -> TerminalOperator<io::Cursor<Vec<u8>>, Vec<u8>> {
        TerminalOperator::new(io::Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn selection_is_one_based_and_zero_skips() {
        let options = vec!["first".to_string(), "second".to_string()];
        assert_eq!(operator("2\n").choose_candidate("scene", &options), Some(1));
        assert_eq!(operator("0\n").choose_candidate("scene", &options), None);
        assert_eq!(operator("9\nx\n1\n").choose_candidate("scene", &options), Some(0));
        assert_eq!(operator("").choose_candidate("scene", &options), None);
    }

    #[test]
    fn menu_lists_options() {
        let mut op = operator("1\n");
        op.choose_candidate("my scene", &["Studio Title".to_string()]);
        let printed = String::from_utf8(op.output).unwrap();
        assert!(printed.contains("Multiple results for: my scene"));
        assert!(printed.contains("1: Studio Title"));
        assert!(printed.contains("0: None of the above"));
    }

    #[test]
    fn alias_answers_parse() {
        assert_eq!(operator("y\n").confirm_alias("Alex", "Alex Smith", "Site"), AliasAnswer::Yes);
        assert_eq!(operator("maybe\na\n").confirm_alias("Alex", "Alex Smith", "Site"), AliasAnswer::Always);
        assert_eq!(operator("S\n").confirm_alias("Alex", "Alex Smith", "Site"), AliasAnswer::AlwaysForSite);
        assert_eq!(operator("").confirm_alias("Alex", "Alex Smith", "Site"), AliasAnswer::No);
        assert!(!AliasAnswer::No.accepted());
        assert!(AliasAnswer::AlwaysForSite.accepted());
    }

    #[test]
    fn non_interactive_declines() {
        let mut op = NonInteractiveOperator;
        assert_eq!(op.choose_candidate("s", &["a".into()]), None);
        assert_eq!(op.confirm_alias("a", "b", "c"), AliasAnswer::No);
    }
}
