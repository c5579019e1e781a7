//! Converted argument values.

use crate::directory::{Channel, Member, Role, User};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A converted argument.
#[derive(Clone)]
pub enum Value {
    /// No value: an optional parameter that was not supplied.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    User(User),
    Member(Member),
    Channel(Channel),
    Role(Role),
    /// Values of a greedy parameter or a repeatable flag.
    List(Vec<Value>),
    /// Values of a flag group, by flag name.
    Flags(BTreeMap<String, Value>),
    /// Output of a custom converter.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Users, and the user behind a member.
    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            Self::Member(m) => Some(&m.user),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Flags(flags) => Some(flags),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(v) => v.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::User(a), Self::User(b)) => a == b,
            (Self::Member(a), Self::Member(b)) => a == b,
            (Self::Channel(a), Self::Channel(b)) => a == b,
            (Self::Role(a), Self::Role(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Flags(a), Self::Flags(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::User(u) => f.debug_tuple("User").field(u).finish(),
            Self::Member(m) => f.debug_tuple("Member").field(m).finish(),
            Self::Channel(c) => f.debug_tuple("Channel").field(c).finish(),
            Self::Role(r) => f.debug_tuple("Role").field(r).finish(),
            Self::List(values) => f.debug_tuple("List").field(values).finish(),
            Self::Flags(flags) => f.debug_tuple("Flags").field(flags).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Renders the value the way a user would type it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::User(u) => f.write_str(&u.name),
            Self::Member(m) => f.write_str(m.display_name()),
            Self::Channel(c) => write!(f, "#{}", c.name),
            Self::Role(r) => write!(f, "@{}", r.name),
            Self::List(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Self::Flags(flags) => {
                for (i, (name, v)) in flags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                Ok(())
            }
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

/// Bound arguments of one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.get(name).and_then(Value::as_user)
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.get(name).and_then(Value::as_member)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.get(name).and_then(Value::as_channel)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    /// Values of a flag group parameter, keyed by flag name.
    pub fn flags(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.get(name).and_then(Value::as_flags)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_keep_declaration_order() {
        let mut args = Args::new();
        args.push("b", Value::Int(2));
        args.push("a", Value::from("x"));
        let names: Vec<_> = args.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(args.int("b"), Some(2));
        assert_eq!(args.str("a"), Some("x"));
        assert_eq!(args.int("a"), None);
        assert!(args.get("c").is_none());
    }

    #[test]
    fn custom_values_downcast() {
        let v = Value::custom(42u8);
        assert_eq!(v.downcast_ref::<u8>(), Some(&42));
        assert_eq!(v.downcast_ref::<u16>(), None);
        assert_eq!(v, v.clone());
        assert_ne!(v, Value::custom(42u8));
    }

    #[test]
    fn display_joins_lists() {
        let v = Value::List(vec![Value::Int(1), Value::from("two")]);
        assert_eq!(v.to_string(), "1 two");
        assert_eq!(Value::from(None::<i64>), Value::None);
    }
}
