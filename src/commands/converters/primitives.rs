//! Primitive converters.

use super::{ConvertError, Converter};
use crate::commands::context::Context;
use crate::commands::value::Value;
use crate::error::UserInputError;
use async_trait::async_trait;

const TRUTHY: &[&str] = &["yes", "y", "true", "t", "1", "enable", "on"];
const FALSY: &[&str] = &["no", "n", "false", "f", "0", "disable", "off"];

/// Parse a boolean from the fixed vocabulary, case-insensitively.
pub fn parse_bool(argument: &str) -> Option<bool> {
    let lowered = argument.to_lowercase();
    if TRUTHY.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSY.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

pub struct StrConverter;

#[async_trait]
impl Converter for StrConverter {
    async fn convert(&self, _ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        Ok(Value::Str(argument.to_string()))
    }
}

pub struct IntConverter;

#[async_trait]
impl Converter for IntConverter {
    async fn convert(&self, _ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        argument.parse::<i64>().map(Value::Int).map_err(|_| {
            UserInputError::BadArgument(format!("{argument:?} is not a valid integer")).into()
        })
    }
}

pub struct FloatConverter;

#[async_trait]
impl Converter for FloatConverter {
    async fn convert(&self, _ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        match argument.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Float(x)),
            _ => Err(UserInputError::BadArgument(format!("{argument:?} is not a valid number")).into()),
        }
    }
}

pub struct BoolConverter;

#[async_trait]
impl Converter for BoolConverter {
    async fn convert(&self, _ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        parse_bool(argument).map(Value::Bool).ok_or_else(|| {
            UserInputError::BadBoolArgument {
                argument: argument.to_string(),
            }
            .into()
        })
    }
}
