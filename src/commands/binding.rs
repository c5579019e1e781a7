//! Argument binding.
//!
//! Walks a command's declared parameters over the remaining text, pulling
//! tokens from a [`StringView`] and converting them through the
//! [`ConverterRegistry`].

use super::command::Command;
use super::context::Context;
use super::converters::ConverterRegistry;
use super::params::{Parameter, Shape};
use super::value::{Args, Value};
use crate::error::{CommandError, UserInputError};
use slirc_argv::{QuoteSet, StringView};

/// Bind `ctx.remaining` to the parameters of `command`.
pub async fn bind(
    ctx: &Context,
    command: &Command,
    converters: &ConverterRegistry,
    quotes: &QuoteSet,
) -> Result<Args, CommandError> {
    let mut view = StringView::with_quotes(&ctx.remaining, quotes);
    let mut args = Args::new();

    for param in command.params() {
        let value = if param.consume_rest || param.shape.is_flags() {
            bind_rest(ctx, param, converters, &mut view).await?
        } else if let Shape::Greedy(inner) = &param.shape {
            bind_greedy(ctx, param, inner, converters, &mut view).await?
        } else {
            bind_one(ctx, param, converters, &mut view).await?
        };
        args.push(param.name.as_str(), value);
    }

    if !command.ignore_extra() {
        view.skip_ws();
        if !view.is_eof() {
            return Err(UserInputError::TooManyArguments {
                command: command.qualified_name().to_string(),
            }
            .into());
        }
    }
    Ok(args)
}

fn missing(ctx: &Context, param: &Parameter) -> Result<Value, CommandError> {
    param.fallback(ctx).ok_or_else(|| {
        UserInputError::MissingRequiredArgument {
            param: param.name.clone(),
        }
        .into()
    })
}

async fn bind_one(
    ctx: &Context,
    param: &Parameter,
    converters: &ConverterRegistry,
    view: &mut StringView<'_>,
) -> Result<Value, CommandError> {
    let start = view.index();
    let Some(token) = view.get_quoted_word()? else {
        return missing(ctx, param);
    };

    match converters.convert(ctx, &param.name, &param.shape, &token).await? {
        // An optional that did not convert leaves its token for the next parameter
        Value::None if param.shape.is_optional() => {
            view.set_index(start);
            missing(ctx, param)
        }
        value => Ok(value),
    }
}

async fn bind_rest(
    ctx: &Context,
    param: &Parameter,
    converters: &ConverterRegistry,
    view: &mut StringView<'_>,
) -> Result<Value, CommandError> {
    let rest = view.read_rest().trim();
    if rest.is_empty() && !param.shape.is_flags() {
        return missing(ctx, param);
    }

    match converters.convert(ctx, &param.name, &param.shape, rest).await? {
        Value::None if param.shape.is_optional() => missing(ctx, param),
        value => Ok(value),
    }
}

async fn bind_greedy(
    ctx: &Context,
    param: &Parameter,
    inner: &Shape,
    converters: &ConverterRegistry,
    view: &mut StringView<'_>,
) -> Result<Value, CommandError> {
    let mut values = Vec::new();
    loop {
        let start = view.index();
        let Some(token) = view.get_quoted_word()? else {
            break;
        };
        match converters.convert(ctx, &param.name, inner, &token).await {
            Ok(value) => values.push(value),
            Err(e) if e.is_hard_parse_error() => return Err(e),
            Err(_) => {
                view.set_index(start);
                break;
            }
        }
    }

    if values.is_empty() {
        return missing(ctx, param);
    }
    Ok(Value::List(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::command::CommandBuilder;
    use crate::commands::converters::{Flag, FlagGroup};
    use crate::commands::hooks::handler_fn;
    use crate::commands::params::TypeKey;
    use crate::commands::test_support::context_for;

    fn command(params: Vec<Parameter>) -> CommandBuilder {
        params.into_iter().fold(
            Command::builder("cmd").handler(handler_fn(|_, _| async { Ok(()) })),
            CommandBuilder::param,
        )
    }

    async fn bind_text(builder: CommandBuilder, text: &str) -> Result<Args, CommandError> {
        let command = builder.build().unwrap();
        let mut ctx = context_for(1);
        ctx.remaining = text.to_string();
        bind(&ctx, &command, &ConverterRegistry::new(), &QuoteSet::standard()).await
    }

    fn code(result: Result<Args, CommandError>) -> &'static str {
        result.unwrap_err().error_code()
    }

    #[tokio::test]
    async fn positional_and_quoted() {
        let args = bind_text(
            command(vec![Parameter::new("a", TypeKey::Int), Parameter::new("b", TypeKey::Str)]),
            r#"5 "b c""#,
        )
        .await
        .unwrap();
        assert_eq!(args.int("a"), Some(5));
        assert_eq!(args.str("b"), Some("b c"));
    }

    #[tokio::test]
    async fn missing_and_extra_arguments() {
        let one_int = || command(vec![Parameter::new("n", TypeKey::Int)]);
        assert_eq!(code(bind_text(one_int(), "").await), "missing_required_argument");
        assert_eq!(code(bind_text(one_int(), "1 2").await), "too_many_arguments");
        assert_eq!(code(bind_text(one_int(), "x").await), "bad_argument");
        assert!(bind_text(one_int().ignore_extra(), "1 2").await.is_ok());
    }

    #[tokio::test]
    async fn tokenizer_errors_surface() {
        let cmd = command(vec![Parameter::new("s", TypeKey::Str)]);
        assert_eq!(code(bind_text(cmd, r#""open"#).await), "argument_parsing_error");
    }

    #[tokio::test]
    async fn optional_gives_its_token_back() {
        let cmd = command(vec![
            Parameter::new("n", Shape::optional(TypeKey::Int.into())).default_value(10i64),
            Parameter::new("s", TypeKey::Str),
        ]);
        let args = bind_text(cmd, "word").await.unwrap();
        assert_eq!(args.int("n"), Some(10));
        assert_eq!(args.str("s"), Some("word"));
    }

    #[tokio::test]
    async fn rest_keeps_quotes() {
        let cmd = command(vec![Parameter::new("first", TypeKey::Str), Parameter::new("rest", TypeKey::Str).rest()]);
        let args = bind_text(cmd, r#"a  "b c" d "#).await.unwrap();
        assert_eq!(args.str("first"), Some("a"));
        assert_eq!(args.str("rest"), Some(r#""b c" d"#));
    }

    #[tokio::test]
    async fn greedy_stops_at_first_failure() {
        let cmd = || {
            command(vec![
                Parameter::new("nums", Shape::greedy(TypeKey::Int.into())),
                Parameter::new("tail", TypeKey::Str),
            ])
        };
        let args = bind_text(cmd(), "1 2 3 end").await.unwrap();
        assert_eq!(args.list("nums").map(<[Value]>::len), Some(3));
        assert_eq!(args.str("tail"), Some("end"));

        assert_eq!(code(bind_text(cmd(), "end").await), "missing_required_argument");
    }

    #[tokio::test]
    async fn greedy_with_default_may_be_empty() {
        let cmd = command(vec![
            Parameter::new("nums", Shape::greedy(TypeKey::Int.into())).default_value(Value::List(Vec::new())),
            Parameter::new("tail", TypeKey::Str),
        ]);
        let args = bind_text(cmd, "end").await.unwrap();
        assert_eq!(args.list("nums"), Some(&[][..]));
    }

    #[tokio::test]
    async fn flags_take_the_rest() {
        let flags = FlagGroup::new()
            .flag(Flag::new("count", TypeKey::Int).default_value(1i64))
            .flag(Flag::new("reason", TypeKey::Str).default_value("none"));
        let cmd = || {
            command(vec![
                Parameter::new("target", TypeKey::Str),
                Parameter::new("opts", Shape::flags(flags.clone())),
            ])
        };
        let args = bind_text(cmd(), "bob count: 3").await.unwrap();
        let opts = args.get("opts").and_then(Value::as_flags).unwrap();
        assert_eq!(opts["count"], Value::Int(3));
        assert_eq!(opts["reason"], Value::from("none"));

        // Flags still bind when nothing follows
        assert!(bind_text(cmd(), "bob").await.is_ok());
    }
}
