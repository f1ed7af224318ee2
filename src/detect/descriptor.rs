//! Resolved references to the Copilot executable.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the executable is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRef {
    /// Bare command name, looked up on `PATH` when spawned.
    Name(String),
    /// Filesystem path to the executable.
    Path(PathBuf),
    /// A host tool invoked with a subcommand (`gh copilot`).
    Composite { host: String, subcommand: String },
}

/// An executable reference plus the absolute path it resolved to, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    reference: CommandRef,
    resolved: Option<PathBuf>,
}

impl CommandDescriptor {
    /// A bare command name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            reference: CommandRef::Name(name.into()),
            resolved: None,
        }
    }

    /// A filesystem path. The path is also its own resolution.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            resolved: Some(path.clone()),
            reference: CommandRef::Path(path),
        }
    }

    /// A host tool plus subcommand.
    #[must_use]
    pub fn composite(host: impl Into<String>, subcommand: impl Into<String>) -> Self {
        Self {
            reference: CommandRef::Composite {
                host: host.into(),
                subcommand: subcommand.into(),
            },
            resolved: None,
        }
    }

    /// Attach the absolute path the reference resolved to.
    #[must_use]
    pub fn with_resolved(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolved = Some(path.into());
        self
    }

    #[must_use]
    pub fn reference(&self) -> &CommandRef {
        &self.reference
    }

    #[must_use]
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self.reference, CommandRef::Composite { .. })
    }

    /// The program to execute.
    #[must_use]
    pub fn program(&self) -> &OsStr {
        match &self.reference {
            CommandRef::Name(name) => OsStr::new(name),
            CommandRef::Path(path) => path.as_os_str(),
            CommandRef::Composite { host, .. } => OsStr::new(host),
        }
    }

    /// Arguments that must precede any others (the subcommand, if composite).
    #[must_use]
    pub fn leading_args(&self) -> Vec<String> {
        match &self.reference {
            CommandRef::Composite { subcommand, .. } => vec![subcommand.clone()],
            _ => Vec::new(),
        }
    }

    /// Arguments for a `--version` check.
    #[must_use]
    pub fn version_args(&self) -> Vec<String> {
        let mut args = self.leading_args();
        args.push("--version".to_string());
        args
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            CommandRef::Name(name) => f.write_str(name),
            CommandRef::Path(path) => write!(f, "{}", path.display()),
            CommandRef::Composite { host, subcommand } => write!(f, "{host} {subcommand}"),
        }
    }
}

/// Error parsing a command descriptor string.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DescriptorParseError {
    #[error("Empty command")]
    Empty,
    #[error("Too many tokens in command: {0}")]
    TooManyTokens(String),
}

impl FromStr for CommandDescriptor {
    type Err = DescriptorParseError;

    /// `"gh copilot"` is composite, anything with a path separator is a
    /// path, everything else is a bare name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DescriptorParseError::Empty);
        }

        if Path::new(s).components().count() > 1 || s.contains(std::path::MAIN_SEPARATOR) {
            return Ok(Self::path(s));
        }

        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [name] => Ok(Self::named(*name)),
            [host, subcommand] => Ok(Self::composite(*host, *subcommand)),
            _ => Err(DescriptorParseError::TooManyTokens(s.to_string())),
        }
    }
}
