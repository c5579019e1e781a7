//! Declared parameters and their shapes.

use super::context::Context;
use super::converters::flags::FlagGroup;
use super::value::Value;
use std::fmt;
use std::sync::Arc;

/// A concrete conversion target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Str,
    Int,
    Float,
    Bool,
    User,
    Member,
    Channel,
    Role,
    /// A converter registered under a name.
    Custom(String),
}

impl TypeKey {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::User => "user",
            Self::Member => "member",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The declared shape of a parameter.
#[derive(Debug, Clone)]
pub enum Shape {
    Of(TypeKey),
    /// Falls back to the default instead of failing.
    Optional(Box<Shape>),
    /// Alternatives tried in declaration order.
    Union(Vec<Shape>),
    /// One of a closed set of values.
    Literal(Vec<Value>),
    /// As many consecutive tokens as convert.
    Greedy(Box<Shape>),
    /// Named flags parsed from the rest of the line.
    Flags(Arc<FlagGroup>),
}

impl Shape {
    pub fn of(key: TypeKey) -> Self {
        Self::Of(key)
    }

    pub fn optional(inner: Shape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn union(alternatives: impl IntoIterator<Item = Shape>) -> Self {
        Self::Union(alternatives.into_iter().collect())
    }

    pub fn literal<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn greedy(inner: Shape) -> Self {
        Self::Greedy(Box::new(inner))
    }

    pub fn flags(group: FlagGroup) -> Self {
        Self::Flags(Arc::new(group))
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    #[inline]
    pub fn is_greedy(&self) -> bool {
        matches!(self, Self::Greedy(_))
    }

    #[inline]
    pub fn is_flags(&self) -> bool {
        matches!(self, Self::Flags(_))
    }

    /// Name used in error messages.
    pub fn name(&self) -> String {
        match self {
            Self::Of(key) => key.name().to_string(),
            Self::Optional(inner) => format!("optional {}", inner.name()),
            Self::Union(alts) => alts.iter().map(Shape::name).collect::<Vec<_>>().join(" or "),
            Self::Literal(values) => values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Greedy(inner) => format!("{}...", inner.name()),
            Self::Flags(_) => "flags".to_string(),
        }
    }
}

impl From<TypeKey> for Shape {
    fn from(key: TypeKey) -> Self {
        Self::Of(key)
    }
}

/// Computes a default from the invocation.
pub type ContextDefault = Arc<dyn Fn(&Context) -> Value + Send + Sync>;

/// What a parameter binds to when no token is supplied.
#[derive(Clone, Default)]
pub enum ParamDefault {
    #[default]
    Required,
    Value(Value),
    FromContext(ContextDefault),
}

impl ParamDefault {
    /// The default for an invocation. `Required` yields `None`.
    pub fn resolve(&self, ctx: &Context) -> Option<Value> {
        match self {
            Self::Required => None,
            Self::Value(v) => Some(v.clone()),
            Self::FromContext(f) => Some(f(ctx)),
        }
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::FromContext(_) => f.write_str("FromContext(..)"),
        }
    }
}

/// A declared command parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub shape: Shape,
    pub default: ParamDefault,
    /// Bind the raw rest of the line instead of one token.
    pub consume_rest: bool,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
            default: ParamDefault::Required,
            consume_rest: false,
            description: None,
        }
    }

    /// Default to a fixed value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = ParamDefault::Value(value.into());
        self
    }

    /// Default to a value derived from the invocation.
    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Value + Send + Sync + 'static,
    {
        self.default = ParamDefault::FromContext(Arc::new(f));
        self
    }

    /// Bind the rest of the line verbatim.
    pub fn rest(mut self) -> Self {
        self.consume_rest = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether binding fails when no token is supplied.
    pub fn is_required(&self) -> bool {
        self.default.is_required() && !self.shape.is_optional()
    }

    /// The value bound when no usable token is supplied.
    pub fn fallback(&self, ctx: &Context) -> Option<Value> {
        match self.default.resolve(ctx) {
            Some(v) => Some(v),
            None if self.shape.is_optional() => Some(Value::None),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context_for;

    #[test]
    fn optional_shape_is_not_required() {
        let p = Parameter::new("n", Shape::optional(TypeKey::Int.into()));
        assert!(!p.is_required());
        assert_eq!(p.fallback(&context_for(1)), Some(Value::None));

        let q = Parameter::new("n", TypeKey::Int);
        assert!(q.is_required());
        assert_eq!(q.fallback(&context_for(1)), None);
    }

    #[test]
    fn context_default_sees_the_author() {
        let p = Parameter::new("who", TypeKey::User).default_with(|ctx| Value::Int(ctx.author.id as i64));
        assert_eq!(p.fallback(&context_for(9)), Some(Value::Int(9)));
        assert!(!p.is_required());
    }

    #[test]
    fn shape_names() {
        let shape = Shape::union([TypeKey::Int.into(), TypeKey::Str.into()]);
        assert_eq!(shape.name(), "int or str");
        assert_eq!(Shape::greedy(TypeKey::Int.into()).name(), "int...");
        assert_eq!(Shape::literal(["a", "b"]).name(), "a | b");
    }
}
