//! Shell completion script generators.
//!
//! Two families of scripts are produced:
//!
//! - **Static** ([`BashV1`], [`Fish`]): the whole command tree is walked at
//!   generation time and baked into the script. Completers that only run
//!   in-process are invisible, except for those exposing fixed candidates.
//! - **Protocol** ([`BashV2`], [`Zsh`], [`PowerShell`]): a fixed script
//!   calls the program back through `__complete` and maps the returned
//!   directive onto the shell's own options.
//!
//! # Examples
//!
//! ```
//! use command_router_core::{Command, CommandTree, NoopAction};
//! use command_router_shells::{Shell, generate};
//!
//! let mut tree = CommandTree::new(Command::new("my-tool")).unwrap();
//! let root = tree.root();
//! tree.add_command(root, Command::new("run").run(NoopAction)).unwrap();
//!
//! let mut script = Vec::new();
//! generate(Shell::Bash, &tree, true, &mut script).unwrap();
//! let script = String::from_utf8(script).unwrap();
//! assert!(script.contains("complete -o default -F __start_my_tool my-tool"));
//! ```

mod bash;
mod bash_v2;
mod error;
mod fish;
mod naming;
mod powershell;
mod zsh;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use command_router_core::CommandTree;

pub use bash::BashV1;
pub use bash_v2::BashV2;
pub use error::{Result, ScriptError};
pub use fish::Fish;
pub use naming::function_name;
pub use powershell::PowerShell;
pub use zsh::Zsh;

/// Supported shell dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Shell {
    /// Bash 4.1+, driven by the completion protocol.
    Bash,
    /// Bash 3.2+, with the tree baked into the script.
    #[cfg_attr(feature = "clap", value(name = "bash-v1"))]
    BashV1,
    Zsh,
    Fish,
    #[cfg_attr(feature = "clap", value(name = "powershell", alias = "pwsh"))]
    PowerShell,
}

impl Shell {
    pub const ALL: [Shell; 5] = [
        Shell::Bash,
        Shell::BashV1,
        Shell::Zsh,
        Shell::Fish,
        Shell::PowerShell,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::BashV1 => "bash-v1",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
            Shell::PowerShell => "powershell",
        }
    }

    /// Whether scripts for this shell call back into the program.
    pub fn uses_protocol(self) -> bool {
        matches!(self, Shell::Bash | Shell::Zsh | Shell::PowerShell)
    }

    /// Generator for this shell.
    pub fn generator(self, with_descriptions: bool) -> Box<dyn ShellGenerator> {
        match self {
            Shell::Bash => Box::new(BashV2::new(with_descriptions)),
            Shell::BashV1 => Box::new(BashV1::new(with_descriptions)),
            Shell::Zsh => Box::new(Zsh::new(with_descriptions)),
            Shell::Fish => Box::new(Fish::new(with_descriptions)),
            Shell::PowerShell => Box::new(PowerShell::new(with_descriptions)),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shell {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bash" | "bash-v2" => Ok(Shell::Bash),
            "bash-v1" => Ok(Shell::BashV1),
            "zsh" => Ok(Shell::Zsh),
            "fish" => Ok(Shell::Fish),
            "powershell" | "pwsh" => Ok(Shell::PowerShell),
            _ => Err(ScriptError::UnknownShell(s.to_string())),
        }
    }
}

/// Renders a completion script for one shell.
pub trait ShellGenerator {
    fn shell(&self) -> Shell;

    /// Writes the script for `tree`; the program name is the root's name.
    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()>;
}

/// Writes the `shell` script for `tree` to `out`.
pub fn generate(
    shell: Shell,
    tree: &CommandTree,
    with_descriptions: bool,
    out: &mut dyn Write,
) -> Result<()> {
    shell.generator(with_descriptions).generate(tree, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_names_round_trip() {
        for shell in Shell::ALL {
            assert_eq!(shell.as_str().parse::<Shell>().unwrap(), shell);
        }
        assert_eq!("pwsh".parse::<Shell>().unwrap(), Shell::PowerShell);
        assert!(matches!(
            "tcsh".parse::<Shell>(),
            Err(ScriptError::UnknownShell(_))
        ));
    }

    #[test]
    fn test_generator_reports_its_shell() {
        for shell in Shell::ALL {
            assert_eq!(shell.generator(true).shell(), shell);
        }
    }
}
