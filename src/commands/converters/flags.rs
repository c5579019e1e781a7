//! Flag-group parsing.
//!
//! A flag group binds the rest of the line as `name: value` pairs (or
//! `--name value`, depending on the syntax). A flag starts at a word
//! boundary; its value runs until the next recognised flag.

use super::ConverterRegistry;
use crate::commands::context::Context;
use crate::commands::params::{ParamDefault, Shape, TypeKey};
use crate::commands::value::Value;
use crate::config::{FlagConfig, UnknownFlags};
use crate::error::{CommandError, UserInputError};
use std::collections::BTreeMap;

/// How flags are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSyntax {
    pub prefix: String,
    pub delimiter: String,
    pub unknown: UnknownFlags,
    pub case_insensitive: bool,
}

impl FlagSyntax {
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            unknown: UnknownFlags::Reject,
            case_insensitive: false,
        }
    }

    /// `--name value` style.
    pub fn dashed() -> Self {
        Self::new("--", " ")
    }

    pub fn unknown(mut self, unknown: UnknownFlags) -> Self {
        self.unknown = unknown;
        self
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.to_lowercase() == b.to_lowercase()
        } else {
            a == b
        }
    }
}

impl Default for FlagSyntax {
    fn default() -> Self {
        Self::from(&FlagConfig::default())
    }
}

impl From<&FlagConfig> for FlagSyntax {
    fn from(config: &FlagConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            delimiter: config.delimiter.clone(),
            unknown: config.unknown,
            case_insensitive: config.case_insensitive,
        }
    }
}

/// One declared flag.
#[derive(Debug, Clone)]
pub struct Flag {
    pub name: String,
    pub aliases: Vec<String>,
    pub shape: Shape,
    pub default: ParamDefault,
    /// Collect every occurrence into a list.
    pub multiple: bool,
    /// Upper bound on occurrences of a multiple flag.
    pub max_args: Option<usize>,
    /// Keep the last occurrences instead of failing on too many.
    pub override_last: bool,
    pub description: Option<String>,
}

impl Flag {
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            shape: shape.into(),
            default: ParamDefault::Required,
            multiple: false,
            max_args: None,
            override_last: false,
            description: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = ParamDefault::Value(value.into());
        self
    }

    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Value + Send + Sync + 'static,
    {
        self.default = ParamDefault::FromContext(std::sync::Arc::new(f));
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn max_args(mut self, max: usize) -> Self {
        self.max_args = Some(max.max(1));
        self
    }

    pub fn override_last(mut self) -> Self {
        self.override_last = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    fn is_bool(&self) -> bool {
        match &self.shape {
            Shape::Of(TypeKey::Bool) => true,
            Shape::Optional(inner) => matches!(**inner, Shape::Of(TypeKey::Bool)),
            _ => false,
        }
    }

    /// Value bound when the flag is absent.
    fn absent(&self, ctx: &Context) -> Option<Value> {
        if let Some(v) = self.default.resolve(ctx) {
            return Some(v);
        }
        if self.multiple {
            return Some(Value::List(Vec::new()));
        }
        self.shape.is_optional().then_some(Value::None)
    }
}

/// A set of named flags bound to one parameter.
#[derive(Debug, Clone, Default)]
pub struct FlagGroup {
    flags: Vec<Flag>,
    syntax: Option<FlagSyntax>,
}

impl FlagGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Override the dispatcher's default flag syntax for this group.
    pub fn syntax(mut self, syntax: FlagSyntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Check names and shapes; returns the reason for the first problem.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<String> = Vec::new();
        for flag in &self.flags {
            for name in flag.names() {
                if name.is_empty() || !name.chars().all(is_name_char) {
                    return Err(format!("flag name {name:?} must be word characters or dashes"));
                }
                let folded = name.to_lowercase();
                if seen.contains(&folded) {
                    return Err(format!("flag name {name:?} is declared twice"));
                }
                seen.push(folded);
            }
            if matches!(flag.shape, Shape::Flags(_) | Shape::Greedy(_)) {
                return Err(format!("flag {:?} cannot have shape {}", flag.name, flag.shape.name()));
            }
        }
        Ok(())
    }

    fn find(&self, syntax: &FlagSyntax, name: &str) -> Option<usize> {
        self.flags
            .iter()
            .position(|flag| flag.names().any(|n| syntax.names_match(n, name)))
    }
}

#[inline]
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// A flag occurrence: where it starts, its name, and where its value starts.
#[derive(Debug, PartialEq, Eq)]
struct Occurrence<'a> {
    start: usize,
    name: &'a str,
    value_start: usize,
}

/// Find every `prefix name delimiter` sequence that starts a word.
fn scan<'a>(text: &'a str, syntax: &FlagSyntax) -> Vec<Occurrence<'a>> {
    let blank_delimiter = syntax.delimiter.trim().is_empty();
    let mut found = Vec::new();
    let mut previous: Option<char> = None;

    for (start, c) in text.char_indices() {
        let at_word_start = previous.is_none_or(char::is_whitespace);
        previous = Some(c);
        if !at_word_start || c.is_whitespace() {
            continue;
        }

        let Some(after_prefix) = text[start..].strip_prefix(syntax.prefix.as_str()) else {
            continue;
        };
        let name_len = after_prefix
            .find(|c: char| !is_name_char(c))
            .unwrap_or(after_prefix.len());
        if name_len == 0 {
            continue;
        }
        let after_name = &after_prefix[name_len..];

        let delimiter_len = if blank_delimiter {
            if !after_name.is_empty() && !after_name.starts_with(char::is_whitespace) {
                continue;
            }
            0
        } else if after_name.starts_with(syntax.delimiter.as_str()) {
            syntax.delimiter.len()
        } else {
            continue;
        };

        let name_start = start + syntax.prefix.len();
        found.push(Occurrence {
            start,
            name: &text[name_start..name_start + name_len],
            value_start: name_start + name_len + delimiter_len,
        });
    }
    found
}

/// Parse `argument` into a [`Value::Flags`] map for `group`.
pub(crate) async fn parse(
    registry: &ConverterRegistry,
    ctx: &Context,
    group: &FlagGroup,
    argument: &str,
) -> Result<Value, CommandError> {
    let syntax = group.syntax.as_ref().unwrap_or_else(|| registry.flag_syntax());

    // Keep recognised flags as boundaries; unknown ones either fail or fold
    // into the surrounding value
    let mut boundaries: Vec<(usize, Occurrence<'_>)> = Vec::new();
    for occurrence in scan(argument, syntax) {
        match group.find(syntax, occurrence.name) {
            Some(index) => boundaries.push((index, occurrence)),
            None if syntax.unknown == UnknownFlags::Reject => {
                let rest = argument[occurrence.value_start..].trim();
                return Err(UserInputError::TooManyFlags {
                    flag: occurrence.name.to_string(),
                    values: vec![rest.to_string()],
                }
                .into());
            }
            None => {}
        }
    }

    let leading_end = boundaries.first().map_or(argument.len(), |(_, o)| o.start);
    let leading = argument[..leading_end].trim();
    if !leading.is_empty() && syntax.unknown == UnknownFlags::Reject {
        return Err(UserInputError::BadArgument(format!("unexpected text before flags: {leading:?}")).into());
    }

    let mut collected: Vec<Vec<&str>> = vec![Vec::new(); group.flags.len()];
    for (i, (index, occurrence)) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).map_or(argument.len(), |(_, next)| next.start);
        collected[*index].push(argument[occurrence.value_start..end].trim());
    }

    let mut values = BTreeMap::new();
    for (flag, mut raw) in group.flags.iter().zip(collected) {
        if raw.is_empty() {
            let value = flag.absent(ctx).ok_or_else(|| UserInputError::MissingRequiredFlag {
                flag: flag.name.clone(),
            })?;
            values.insert(flag.name.clone(), value);
            continue;
        }

        let limit = if flag.multiple { flag.max_args } else { Some(1) };
        if let Some(max) = limit
            && raw.len() > max
        {
            if !flag.override_last {
                return Err(UserInputError::TooManyFlags {
                    flag: flag.name.clone(),
                    values: raw.iter().map(ToString::to_string).collect(),
                }
                .into());
            }
            raw.drain(..raw.len() - max);
        }

        let mut converted = Vec::with_capacity(raw.len());
        for value in raw {
            converted.push(convert_value(registry, ctx, flag, value).await?);
        }
        let value = if flag.multiple {
            Value::List(converted)
        } else {
            converted.pop().unwrap_or(Value::None)
        };
        values.insert(flag.name.clone(), value);
    }

    Ok(Value::Flags(values))
}

async fn convert_value(
    registry: &ConverterRegistry,
    ctx: &Context,
    flag: &Flag,
    value: &str,
) -> Result<Value, CommandError> {
    if value.is_empty() {
        if flag.is_bool() {
            return Ok(Value::Bool(true));
        }
        return Err(UserInputError::MissingFlagArgument {
            flag: flag.name.clone(),
        }
        .into());
    }

    registry
        .convert(ctx, &flag.name, &flag.shape, value)
        .await
        .map_err(|e| {
            UserInputError::BadFlagArgument {
                flag: flag.name.clone(),
                source: Box::new(e),
            }
            .into()
        })
}
