//! Integration tests for cooldown gating through the full dispatch pipeline.

mod common;

use common::{ALICE, BOB, TestBot};
use slirc_dispatch::commands::{Context, handler_fn};
use slirc_dispatch::limits::{BucketType, Cooldown};
use slirc_dispatch::{Command, Parameter, TypeKey};
use std::sync::Arc;
use std::time::Duration;

fn limited(bucket: BucketType) -> TestBot {
    TestBot::new(|d| {
        d.register(
            Command::builder("double")
                .param(Parameter::new("n", TypeKey::Int))
                .cooldown(Cooldown::new(1, Duration::from_secs(5), bucket))
                .handler(handler_fn(|ctx: Arc<Context>, args| async move {
                    let n = args.int("n").unwrap_or_default();
                    ctx.reply((n * 2).to_string()).await?;
                    Ok(())
                }))
                .build()
                .unwrap(),
        )
        .unwrap();
    })
}

#[tokio::test(start_paused = true)]
async fn second_call_inside_window_is_rejected() {
    let bot = limited(BucketType::User);

    assert_eq!(bot.send(ALICE, "!double 21").await, vec!["42"]);
    assert!(bot.send(ALICE, "!double 4").await.is_empty());

    assert_eq!(bot.recorder.completions(), vec!["double"]);
    let errors = bot.recorder.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, "command_on_cooldown");
    let retry = errors[0].retry_after.expect("cooldown carries retry_after");
    assert!(retry > Duration::ZERO && retry <= Duration::from_secs(5), "{retry:?}");
}

#[tokio::test(start_paused = true)]
async fn window_expires() {
    let bot = limited(BucketType::User);

    assert_eq!(bot.send(ALICE, "!double 1").await, vec!["2"]);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(bot.send(ALICE, "!double 2").await, vec!["4"]);
    assert!(bot.recorder.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn buckets_partition_by_author() {
    let bot = limited(BucketType::User);
    assert_eq!(bot.send(ALICE, "!double 1").await, vec!["2"]);
    assert_eq!(bot.send(BOB, "!double 1").await, vec!["2"]);

    let shared = limited(BucketType::Channel);
    assert_eq!(shared.send(ALICE, "!double 1").await, vec!["2"]);
    assert!(shared.send(BOB, "!double 1").await.is_empty());
    assert_eq!(shared.recorder.error_codes(), vec!["command_on_cooldown"]);
}

#[tokio::test(start_paused = true)]
async fn failed_checks_do_not_consume_the_window() {
    let bot = TestBot::new(|d| {
        d.register(
            Command::builder("guarded")
                .check(slirc_dispatch::commands::check_fn(|ctx| ctx.content.ends_with("please")))
                .cooldown(Cooldown::new(1, Duration::from_secs(30), BucketType::User))
                .ignore_extra()
                .handler(handler_fn(|ctx: Arc<Context>, _| async move {
                    ctx.reply("done").await?;
                    Ok(())
                }))
                .build()
                .unwrap(),
        )
        .unwrap();
    });

    assert!(bot.send(ALICE, "!guarded now").await.is_empty());
    assert_eq!(bot.send(ALICE, "!guarded please").await, vec!["done"]);
    assert_eq!(bot.recorder.error_codes(), vec!["check_failure"]);
}

#[tokio::test(start_paused = true)]
async fn reset_cooldown_reopens_the_window() {
    let bot = limited(BucketType::User);
    assert_eq!(bot.send(ALICE, "!double 1").await, vec!["2"]);

    let command = bot.dispatcher.registry().get("double").unwrap();
    let ctx = Context::new(
        common::event(ALICE, "!double 1"),
        Arc::new(common::sample_directory()),
        Arc::default(),
    );
    bot.dispatcher.reset_cooldown(&command, &ctx);

    assert_eq!(bot.send(ALICE, "!double 3").await, vec!["6"]);
}

#[tokio::test(start_paused = true)]
async fn maintenance_evicts_idle_windows() {
    let mut config = common::test_config();
    config.limits.cooldown_retention_secs = 1;
    config.limits.maintenance_interval_secs = 1;
    let bot = TestBot::with_config(config, |d| {
        d.register(
            Command::builder("once")
                .cooldown(Cooldown::new(1, Duration::from_secs(1), BucketType::User))
                .handler(handler_fn(|_, _| async { Ok(()) }))
                .build()
                .unwrap(),
        )
        .unwrap();
    });
    let task = bot.dispatcher.spawn_maintenance();

    bot.send(ALICE, "!once").await;
    assert_eq!(bot.dispatcher.cooldowns().len(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(bot.dispatcher.cooldowns().is_empty());
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn maintenance_survives_unvalidated_zero_interval() {
    let mut config = common::test_config();
    config.limits.cooldown_retention_secs = 0;
    config.limits.maintenance_interval_secs = 0;
    let bot = TestBot::with_config(config, |d| {
        d.register(
            Command::builder("once")
                .cooldown(Cooldown::new(1, Duration::from_secs(1), BucketType::User))
                .handler(handler_fn(|_, _| async { Ok(()) }))
                .build()
                .unwrap(),
        )
        .unwrap();
    });
    let task = bot.dispatcher.spawn_maintenance();

    bot.send(ALICE, "!once").await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!task.is_finished());
    assert!(bot.dispatcher.cooldowns().is_empty());
    task.abort();
}
