mod config;
mod repos;
mod services;
mod system;

use std::sync::Arc;

use anyhow::Context as _;
pub use config::Config;
pub use repos::{DocDefaults, IReminderRepo, IUserDocRepo, Repos, StoreStats};
pub use services::*;
pub use system::{ISys, RealSys};
use yadavar_utils::config::APP_CONFIG;

/// The context for the application
/// Contains the repositories, configuration, clock and external services
///
/// The clock, parser and transport are abstracted to allow for testing
#[derive(Clone)]
pub struct YadavarContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub parser: Arc<dyn INlParser>,
    pub transport: Arc<dyn INotificationTransport>,
}

/// The parameters to create the context
pub struct ContextParams {
    pub database_url: String,
    pub sys: Arc<dyn ISys>,
    pub parser: Arc<dyn INlParser>,
    pub transport: Arc<dyn INotificationTransport>,
}

impl YadavarContext {
    pub async fn create(params: ContextParams) -> anyhow::Result<Self> {
        let config = Config::new();
        let repos =
            Repos::create_sqlite(&params.database_url, &config, params.sys.clone()).await?;
        Ok(Self {
            repos,
            config,
            sys: params.sys,
            parser: params.parser,
            transport: params.transport,
        })
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> anyhow::Result<YadavarContext> {
    let config = Config::new();
    let sys: Arc<dyn ISys> = Arc::new(RealSys);

    // The parser endpoint key is the one setting with no usable default.
    let key = APP_CONFIG
        .ai
        .key
        .clone()
        .context("YADAVAR__AI__KEY is required to reach the parser endpoint")?;
    let api = ChatApi::new(
        APP_CONFIG.ai.endpoint.clone(),
        key,
        APP_CONFIG.ai.model.clone(),
        APP_CONFIG.ai.temperature,
        std::time::Duration::from_secs(APP_CONFIG.ai.timeout_secs),
    )?;
    let parser: Arc<dyn INlParser> = Arc::new(LlmParser::new(
        Arc::new(api),
        sys.clone(),
        config.max_utterance_length,
        config.max_city_length,
        APP_CONFIG.ai.max_tokens,
        std::time::Duration::from_secs(APP_CONFIG.ai.timeout_secs),
    ));

    let transport: Arc<dyn INotificationTransport> =
        match (&APP_CONFIG.notification.webhook_url, config.notification_strategy.as_str()) {
            (_, "silent") => Arc::new(LogTransport),
            (Some(url), _) => Arc::new(WebhookTransport::new(
                url.clone(),
                APP_CONFIG.notification.webhook_key.clone(),
            )?),
            (None, strategy) => anyhow::bail!(
                "YADAVAR__NOTIFICATION__WEBHOOK_URL is required for the {strategy} strategy"
            ),
        };

    YadavarContext::create(ContextParams {
        database_url: APP_CONFIG.database_url.clone(),
        sys,
        parser,
        transport,
    })
    .await
}
