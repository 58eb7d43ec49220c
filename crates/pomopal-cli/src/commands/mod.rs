pub mod config;
pub mod profile;
pub mod run;
pub mod status;

use std::sync::Arc;

use pomopal_core::feedback::FeedbackSink;
use pomopal_core::{CompanionHost, Config, HttpLineGenerator, JsonProfileStore, ProfileStore};

/// Build a host from the on-disk config and profile.
///
/// An unreadable profile is logged and replaced by the default one so the
/// timer always comes up.
pub fn open_host(
    config: &Config,
    feedback: Arc<dyn FeedbackSink>,
) -> Result<CompanionHost, Box<dyn std::error::Error>> {
    let store = Arc::new(JsonProfileStore::open_default()?);
    let profile = store.load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %store.path().display(), "profile unreadable, starting fresh");
        Default::default()
    });

    let api_key = config
        .api_key_from_env()
        .or_else(|| profile.has_credential().then(|| profile.api_key.clone()));
    let generator = HttpLineGenerator::new(
        &config.companion.endpoint,
        config.companion.model.clone(),
        api_key,
        config.request_timeout(),
    )?;

    Ok(CompanionHost::new(
        config,
        profile,
        store,
        Arc::new(generator),
        feedback,
    ))
}
