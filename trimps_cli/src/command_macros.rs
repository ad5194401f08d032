#[macro_use]
pub mod command_macros {
    /// Uses the argument when given, otherwise prompts for it on stdin.
    /// The prompt goes to stderr so stdout only carries command output.
    #[macro_export]
    macro_rules! arg_input {
        ($op:expr, $query:expr) => {
            $crate::arg_input!($op, $query, std::io::stdin().lock(), std::io::stderr())
        };
        ($op:expr, $query:expr, $input:expr, $prompt:expr) => {{
            use std::io::{BufRead, Write};
            let mut arg = String::new();
            if let Some(value) = $op {
                arg = value.to_string();
            } else {
                let mut prompt = $prompt;
                writeln!(prompt, $query)?;
                prompt.flush()?;
                let mut input = $input;
                input.read_line(&mut arg)?;
                if let Some('\n') = arg.chars().next_back() { arg.pop(); }
                if let Some('\r') = arg.chars().next_back() { arg.pop(); }
            }
            arg
        }};
    }

}
