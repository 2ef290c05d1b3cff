use crate::layer::ContextLayer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

/// Dependencies that only get through at WARNING and above.
pub const NOISY_TARGETS: &[&str] = &["hyper", "h2", "reqwest", "tower", "rustls", "opentelemetry"];

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Target filter used by [`init_tracing`].
pub fn default_targets() -> Targets {
    NOISY_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, target| {
            targets.with_target(*target, LevelFilter::WARN)
        })
}

/// Install a global `tracing` subscriber that forwards every event to the
/// process default logging pipeline.
///
/// Level filtering beyond [`NOISY_TARGETS`] is left to the pipeline, so
/// events below its configured level are dropped there.
///
/// **Returns**
/// - `Ok(())` once the bridge is the global subscriber.
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber was set
///   earlier. The existing subscriber stays in place.
pub fn init_tracing() -> Result<(), InitError> {
    let subscriber = Registry::default().with(ContextLayer::global().with_filter(default_targets()));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
