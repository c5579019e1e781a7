//! Converter registry.
//!
//! Maps a declared [`Shape`] to a conversion. Concrete types are handled by
//! a [`Converter`] looked up by [`TypeKey`]; the structural shapes (optional,
//! union, literal, greedy, flags) are interpreted here on top of them.

pub mod domain;
pub mod flags;
pub mod primitives;

pub use flags::{Flag, FlagGroup, FlagSyntax};

use super::context::Context;
use super::params::{Shape, TypeKey};
use super::value::Value;
use crate::error::{BoxError, CommandError, UserInputError};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Failure of a single conversion.
#[derive(Debug)]
pub enum ConvertError {
    /// The argument is bad; surfaces unwrapped.
    Input(UserInputError),
    /// Anything else; surfaces as a conversion error.
    Other(BoxError),
}

impl From<UserInputError> for ConvertError {
    fn from(e: UserInputError) -> Self {
        Self::Input(e)
    }
}

impl ConvertError {
    pub fn other(e: impl Into<BoxError>) -> Self {
        Self::Other(e.into())
    }
}

/// Converts one raw argument into a [`Value`].
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, ctx: &Context, argument: &str) -> Result<Value, ConvertError>;
}

/// Registry of converters by type key.
pub struct ConverterRegistry {
    converters: HashMap<TypeKey, Arc<dyn Converter>>,
    flag_syntax: FlagSyntax,
}

impl ConverterRegistry {
    /// A registry with every built-in converter.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(TypeKey::Str, primitives::StrConverter);
        registry.register(TypeKey::Int, primitives::IntConverter);
        registry.register(TypeKey::Float, primitives::FloatConverter);
        registry.register(TypeKey::Bool, primitives::BoolConverter);
        registry.register(TypeKey::User, domain::UserConverter);
        registry.register(TypeKey::Member, domain::MemberConverter);
        registry.register(TypeKey::Channel, domain::ChannelConverter);
        registry.register(TypeKey::Role, domain::RoleConverter);
        registry
    }

    /// A registry without converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
            flag_syntax: FlagSyntax::default(),
        }
    }

    /// Register a converter, returning the one it replaces.
    pub fn register(
        &mut self,
        key: TypeKey,
        converter: impl Converter + 'static,
    ) -> Option<Arc<dyn Converter>> {
        self.converters.insert(key, Arc::new(converter))
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Arc<dyn Converter>> {
        self.converters.get(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.converters.contains_key(key)
    }

    /// Syntax for flag groups that do not declare their own.
    pub fn flag_syntax(&self) -> &FlagSyntax {
        &self.flag_syntax
    }

    pub fn set_flag_syntax(&mut self, syntax: FlagSyntax) {
        self.flag_syntax = syntax;
    }

    /// Convert `argument` to `shape` for parameter `param`.
    ///
    /// Greedy shapes convert a single token here; repetition is the binder's
    /// job. Flag shapes take the whole rest of the line.
    pub fn convert<'a>(
        &'a self,
        ctx: &'a Context,
        param: &'a str,
        shape: &'a Shape,
        argument: &'a str,
    ) -> BoxFuture<'a, Result<Value, CommandError>> {
        async move {
            match shape {
                Shape::Of(key) => self.convert_key(ctx, param, key, argument).await,
                Shape::Optional(inner) => match self.convert(ctx, param, inner, argument).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_hard_parse_error() => Err(e),
                    Err(_) => Ok(Value::None),
                },
                Shape::Union(alternatives) => {
                    let mut errors = Vec::with_capacity(alternatives.len());
                    for alternative in alternatives {
                        match self.convert(ctx, param, alternative, argument).await {
                            Ok(value) => return Ok(value),
                            Err(e) if e.is_hard_parse_error() => return Err(e),
                            Err(e) => errors.push(e),
                        }
                    }
                    Err(UserInputError::BadUnionArgument {
                        param: param.to_string(),
                        converters: alternatives.iter().map(Shape::name).collect(),
                        errors,
                    }
                    .into())
                }
                Shape::Literal(values) => match_literal(param, values, argument),
                Shape::Greedy(inner) => self.convert(ctx, param, inner, argument).await,
                Shape::Flags(group) => flags::parse(self, ctx, group, argument).await,
            }
        }
        .boxed()
    }

    async fn convert_key(
        &self,
        ctx: &Context,
        param: &str,
        key: &TypeKey,
        argument: &str,
    ) -> Result<Value, CommandError> {
        let Some(converter) = self.converters.get(key) else {
            return Err(CommandError::Conversion {
                param: param.to_string(),
                converter: key.to_string(),
                source: format!("no converter registered for {key}").into(),
            });
        };

        converter.convert(ctx, argument).await.map_err(|e| match e {
            ConvertError::Input(e) => CommandError::UserInput(e),
            ConvertError::Other(source) => CommandError::Conversion {
                param: param.to_string(),
                converter: key.to_string(),
                source,
            },
        })
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Match `argument` against a closed set, coercing it to each member's type.
fn match_literal(param: &str, values: &[Value], argument: &str) -> Result<Value, CommandError> {
    let matched = values.iter().find(|literal| match literal {
        Value::Int(n) => argument.parse::<i64>().is_ok_and(|a| a == *n),
        Value::Float(x) => argument.parse::<f64>().is_ok_and(|a| a == *x),
        Value::Bool(b) => primitives::parse_bool(argument) == Some(*b),
        Value::Str(s) => s == argument,
        _ => false,
    });

    match matched {
        Some(value) => Ok(value.clone()),
        None => Err(UserInputError::BadLiteralArgument {
            param: param.to_string(),
            argument: argument.to_string(),
            literals: values.iter().map(ToString::to_string).collect(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context_for;

    #[tokio::test]
    async fn union_tries_alternatives_in_order() {
        let registry = ConverterRegistry::new();
        let ctx = context_for(1);
        let shape = Shape::union([TypeKey::Int.into(), TypeKey::Str.into()]);

        assert_eq!(registry.convert(&ctx, "x", &shape, "5").await.unwrap(), Value::Int(5));
        assert_eq!(
            registry.convert(&ctx, "x", &shape, "abc").await.unwrap(),
            Value::from("abc")
        );
    }

    #[tokio::test]
    async fn union_failure_names_every_alternative() {
        let registry = ConverterRegistry::new();
        let ctx = context_for(1);
        let shape = Shape::union([TypeKey::Int.into(), TypeKey::Bool.into()]);

        let err = registry.convert(&ctx, "x", &shape, "maybe").await.unwrap_err();
        match err {
            CommandError::UserInput(UserInputError::BadUnionArgument { converters, errors, .. }) => {
                assert_eq!(converters, vec!["int", "bool"]);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn literal_rejects_values_outside_the_set() {
        let registry = ConverterRegistry::new();
        let ctx = context_for(1);
        let shape = Shape::literal(["a", "b"]);

        assert_eq!(registry.convert(&ctx, "m", &shape, "b").await.unwrap(), Value::from("b"));
        let err = registry.convert(&ctx, "m", &shape, "c").await.unwrap_err();
        match err {
            CommandError::UserInput(UserInputError::BadLiteralArgument { argument, literals, .. }) => {
                assert_eq!(argument, "c");
                assert_eq!(literals, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn literal_coerces_to_member_type() {
        let registry = ConverterRegistry::new();
        let ctx = context_for(1);
        let shape = Shape::Literal(vec![Value::Int(1), Value::Int(2), Value::Bool(true)]);

        assert_eq!(registry.convert(&ctx, "m", &shape, "02").await.unwrap(), Value::Int(2));
        assert_eq!(registry.convert(&ctx, "m", &shape, "yes").await.unwrap(), Value::Bool(true));
    }

    #[tokio::test]
    async fn optional_swallows_soft_failures() {
        let registry = ConverterRegistry::new();
        let ctx = context_for(1);
        let shape = Shape::optional(TypeKey::Int.into());
        assert_eq!(registry.convert(&ctx, "n", &shape, "x").await.unwrap(), Value::None);
    }

    #[tokio::test]
    async fn missing_converter_is_conversion_error() {
        let registry = ConverterRegistry::empty();
        let ctx = context_for(1);
        let err = registry
            .convert(&ctx, "n", &TypeKey::custom("duration").into(), "5m")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "conversion_error");
    }

    struct Upper;

    #[async_trait]
    impl Converter for Upper {
        async fn convert(&self, _ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
            if argument.is_empty() {
                return Err(ConvertError::other("empty"));
            }
            Ok(Value::Str(argument.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn custom_converters_are_looked_up_by_name() {
        let mut registry = ConverterRegistry::new();
        assert!(registry.register(TypeKey::custom("upper"), Upper).is_none());
        let ctx = context_for(1);
        let shape: Shape = TypeKey::custom("upper").into();

        assert_eq!(registry.convert(&ctx, "s", &shape, "hi").await.unwrap(), Value::from("HI"));
        let err = registry.convert(&ctx, "s", &shape, "").await.unwrap_err();
        assert!(matches!(err, CommandError::Conversion { ref converter, .. } if converter == "upper"));
    }
}
