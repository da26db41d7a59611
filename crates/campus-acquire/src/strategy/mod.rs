//! Acquisition strategies and the chain they form.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PortalConfig;
use crate::dns::FallbackResolver;
use crate::identity::IdentityRotation;
use crate::types::{AttemptError, CookieSet, FetchRequest, Fetched, StrategyKind};

pub mod browser;
pub mod http;

pub use browser::{find_chromium, AutomationHandle, AutomationStrategy, LaunchOptions, RenderStrategy};
pub use http::{AlternateProtocolStrategy, BrowserProfileStrategy, HttpSettings, SessionStrategy};

/// One way of fetching a page.
///
/// `cookies` holds the request's own cookies merged with everything earlier
/// attempts collected.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Upper bound the orchestrator puts on one call to `fetch`.
    fn attempt_timeout(&self) -> Duration;

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError>;
}

/// What the host can run, detected once at startup.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub chromium: Option<PathBuf>,
    pub automation_enabled: bool,
    pub headless: bool,
}

impl Capabilities {
    pub fn detect(config: &PortalConfig) -> Self {
        let chromium = find_chromium(config.chromium_path.as_deref());
        match &chromium {
            Some(path) => tracing::info!(path = %path.display(), "Chromium found"),
            None => tracing::info!("No Chromium binary; browser strategies disabled"),
        }
        Self {
            chromium,
            automation_enabled: config.automation_enabled,
            headless: config.headless,
        }
    }
}

/// Build the fixed strategy order, leaving out anything the host cannot run.
pub fn assemble_chain(
    config: &PortalConfig,
    capabilities: &Capabilities,
    resolver: Arc<FallbackResolver>,
    identity: Arc<IdentityRotation>,
) -> Vec<Box<dyn AcquisitionStrategy>> {
    let settings = HttpSettings {
        timeout: config.request_timeout,
        resolver,
    };

    let mut chain: Vec<Box<dyn AcquisitionStrategy>> = vec![
        Box::new(BrowserProfileStrategy::new(settings.clone(), identity.clone())),
        Box::new(SessionStrategy::new(settings.clone(), identity.clone())),
        Box::new(AlternateProtocolStrategy::new(settings.clone(), identity.clone())),
    ];

    if let Some(chromium) = &capabilities.chromium {
        let launch = LaunchOptions {
            chromium: chromium.clone(),
            headless: capabilities.headless,
        };
        chain.push(Box::new(RenderStrategy::new(
            settings.clone(),
            identity.clone(),
            launch.clone(),
        )));
        if capabilities.automation_enabled {
            chain.push(Box::new(AutomationStrategy::new(
                launch,
                identity,
                config.automation_timeout,
            )));
        }
    }

    let names: Vec<&str> = chain.iter().map(|s| s.kind().name()).collect();
    tracing::info!(strategies = ?names, "Assembled acquisition chain");
    chain
}
