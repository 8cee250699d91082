/**
 * Minimal harness for the Vemetric Rust SDK.
 *
 * Point it at a hub via environment variables, then run:
 *
 *   VEMETRIC_TOKEN=... cargo run -p vemetric_demo
 *   VEMETRIC_TOKEN=... VEMETRIC_HOST=http://localhost:4004 cargo run -p vemetric_demo -- --async
 *
 * Set `RUST_LOG=vemetric=debug` to see each delivery.
 */
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vemetric::{properties, Client, Context, DispatchMode, Options, TrackEvent, UpdateUser, UserData};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), vemetric::Error> {
    let use_async = std::env::args().any(|a| a == "--async");

    let mut options = Options::from_env()?;
    if use_async {
        options.mode = DispatchMode::Async;
    }
    info!(mode = ?options.mode, "initializing client");

    let client = Client::new(options)?;
    let ctx = Context::background();

    /*
     * Track an event, setting a user property on the way.
     */
    let mut event = TrackEvent::new("SignupCompleted");
    event.user_identifier = Some("dmmIrnzUzVMJD03tjCiHXTEEgX6xIPJm".into());
    event.custom_data = Some(properties([("plan", "Pro")]));
    event.user_data = Some(UserData {
        set_once: Some(properties([("signupSource", "demo")])),
        ..Default::default()
    });
    client.track_event(&ctx, &event)?;
    info!("event tracked");

    /*
     * Update the same user directly.
     */
    let mut update = UpdateUser::new("dmmIrnzUzVMJD03tjCiHXTEEgX6xIPJm");
    update.user_data = Some(UserData {
        set: Some(properties([("plan", "Business")])),
        unset: Some(vec!["trial".into()]),
        ..Default::default()
    });
    client.update_user(&ctx, &update)?;
    info!("user updated");

    /*
     * In async mode this waits for the queued requests to be attempted.
     */
    client.close();
    info!("done");
    Ok(())
}
