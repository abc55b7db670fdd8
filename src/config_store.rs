//! Named, typed program options that can be overridden on the command line.
//!
//! Options are registered with a default value (which fixes their type), resolved once at startup
//! from `--name=value` style arguments, and read back by the programs afterwards.
//!
//! ```
//! use lamellar_hello::ConfigStore;
//!
//! let mut config = ConfigStore::new();
//! config.register("message", "Hello, world!").unwrap();
//! config.resolve_args(["--message=hiya!"]).unwrap();
//! assert_eq!(config.get_str("message").unwrap(), "hiya!");
//! ```

use crate::error::ConfigError;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of a registered option, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Str,
    Int,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Str => write!(f, "string"),
            ValueKind::Int => write!(f, "integer"),
            ValueKind::Bool => write!(f, "boolean"),
        }
    }
}

/// The value of an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Str(_) => ValueKind::Str,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Bool(_) => ValueKind::Bool,
        }
    }

    /// Parse `raw` as a value of `kind`, `None` if it has the wrong shape.
    pub fn parse(kind: ValueKind, raw: &str) -> Option<ConfigValue> {
        match kind {
            ValueKind::Str => Some(ConfigValue::Str(raw.to_owned())),
            ValueKind::Int => raw.trim().parse::<i64>().ok().map(ConfigValue::Int),
            ValueKind::Bool => parse_bool(raw).map(ConfigValue::Bool),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(s) => write!(f, "{s:?}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Str(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub name: String,
    pub value: ConfigValue,
    pub default: ConfigValue,
    pub help: String,
}

#[derive(Debug, Default)]
struct ParsedArgs {
    overrides: Vec<(String, String)>,
    help: bool,
}

/// Registry of the options a program understands.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    entries: IndexMap<String, ConfigEntry>,
    aliases: IndexMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> ConfigStore {
        Default::default()
    }

    /// Register an option, its type is the type of `default`.
    pub fn register(
        &mut self,
        name: &str,
        default: impl Into<ConfigValue>,
    ) -> Result<(), ConfigError> {
        self.register_with_help(name, default, "")
    }

    /// Register an option along with the text shown by [usage][ConfigStore::usage].
    pub fn register_with_help(
        &mut self,
        name: &str,
        default: impl Into<ConfigValue>,
        help: &str,
    ) -> Result<(), ConfigError> {
        if self.entries.contains_key(name) {
            return Err(ConfigError::DuplicateName(name.to_owned()));
        }
        let default = default.into();
        self.entries.insert(
            name.to_owned(),
            ConfigEntry {
                name: name.to_owned(),
                value: default.clone(),
                default,
                help: help.to_owned(),
            },
        );
        Ok(())
    }

    /// Let `-alias` stand for `--name` on the command line (e.g. `-nl` for `--numLocales`).
    pub fn alias(&mut self, alias: &str, name: &str) -> Result<(), ConfigError> {
        if !self.entries.contains_key(name) {
            return Err(ConfigError::NotFound(name.to_owned()));
        }
        if self.aliases.contains_key(alias) {
            return Err(ConfigError::DuplicateName(alias.to_owned()));
        }
        self.aliases.insert(alias.to_owned(), name.to_owned());
        Ok(())
    }

    /// Apply `(name, raw value)` overrides.
    ///
    /// Names that were never registered are ignored, a value that does not parse as the
    /// registered type is a [TypeMismatch][ConfigError::TypeMismatch].
    pub fn resolve<I, K, V>(&mut self, overrides: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, raw) in overrides {
            let (name, raw) = (name.as_ref(), raw.as_ref());
            let Some(entry) = self.entries.get_mut(name) else {
                tracing::debug!("ignoring unknown option {name}");
                continue;
            };
            let kind = entry.default.kind();
            entry.value =
                ConfigValue::parse(kind, raw).ok_or_else(|| ConfigError::TypeMismatch {
                    name: name.to_owned(),
                    expected: kind,
                    value: raw.to_owned(),
                })?;
        }
        Ok(())
    }

    /// Parse command line arguments (without the program name) and apply them.
    ///
    /// Accepts `--name=value`, `--name value`, a bare `--flag` for booleans and registered aliases
    /// with a single dash. Anything else is ignored.
    pub fn resolve_args<I, S>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let parsed = self.split_args(&args);
        self.resolve(parsed.overrides)
    }

    /// `true` if `-h` or `--help` appears among the arguments in option position.
    ///
    /// A `-h` consumed as the value of another option (`--message -h`) does not count.
    pub fn wants_help<I, S>(&self, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        self.split_args(&args).help
    }

    fn lookup_flag<'a>(&'a self, flag: &'a str) -> Option<&'a str> {
        if let Some(name) = flag.strip_prefix("--") {
            Some(name)
        } else if let Some(alias) = flag.strip_prefix('-') {
            self.aliases.get(alias).map(|n| n.as_str())
        } else {
            None
        }
    }

    fn split_args(&self, args: &[String]) -> ParsedArgs {
        let mut parsed = ParsedArgs::default();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            i += 1;
            if matches!(arg.as_str(), "-h" | "--help") {
                parsed.help = true;
                continue;
            }
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg.as_str(), None),
            };
            let Some(name) = self.lookup_flag(flag) else {
                continue;
            };
            let Some(entry) = self.entries.get(name) else {
                continue;
            };
            let value = match inline {
                Some(value) => value.to_owned(),
                None if entry.default.kind() == ValueKind::Bool => {
                    // a bare boolean flag only consumes the next argument if it is a boolean
                    match args.get(i).and_then(|next| parse_bool(next).map(|_| next)) {
                        Some(next) => {
                            i += 1;
                            next.clone()
                        }
                        None => "true".to_owned(),
                    }
                }
                None => match args.get(i) {
                    Some(next) => {
                        i += 1;
                        next.clone()
                    }
                    None => String::new(),
                },
            };
            parsed.overrides.push((entry.name.clone(), value));
        }
        parsed
    }

    pub fn get(&self, name: &str) -> Result<&ConfigValue, ConfigError> {
        self.entries
            .get(name)
            .map(|e| &e.value)
            .ok_or_else(|| ConfigError::NotFound(name.to_owned()))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ConfigError> {
        match self.get(name)? {
            ConfigValue::Str(s) => Ok(s),
            other => Err(self.mismatch(name, ValueKind::Str, other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ConfigError> {
        match self.get(name)? {
            ConfigValue::Int(i) => Ok(*i),
            other => Err(self.mismatch(name, ValueKind::Int, other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ConfigError> {
        match self.get(name)? {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(self.mismatch(name, ValueKind::Bool, other)),
        }
    }

    /// An integer option that must not be negative, as a count.
    pub fn get_count(&self, name: &str) -> Result<usize, ConfigError> {
        let value = self.get_int(name)?;
        usize::try_from(value).map_err(|_| ConfigError::InvalidValue {
            name: name.to_owned(),
            reason: format!("{value} is negative"),
        })
    }

    fn mismatch(&self, name: &str, expected: ValueKind, found: &ConfigValue) -> ConfigError {
        ConfigError::TypeMismatch {
            name: name.to_owned(),
            expected,
            value: found.to_string(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.values()
    }

    /// A help listing generated from the registered options.
    pub fn usage(&self, program: &str) -> String {
        let mut out = format!("Usage: {program} [OPTIONS]\n\nOptions:\n");
        for entry in self.entries.values() {
            let aliases: Vec<String> = self
                .aliases
                .iter()
                .filter(|(_, name)| **name == entry.name)
                .map(|(alias, _)| format!("-{alias}, "))
                .collect();
            out.push_str(&format!(
                "  {}--{}=<{}>  {} (default: {})\n",
                aliases.concat(),
                entry.name,
                entry.default.kind(),
                entry.help,
                entry.default
            ));
        }
        out.push_str("  -h, --help  print this message\n");
        out
    }
}
