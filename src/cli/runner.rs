//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, TokenCommand};
use crate::client::ResilientClient;
use crate::config::ClientSettings;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, ReqwestTransport};
use crate::refresh::{FailureSignal, RefreshCoordinator};
use crate::token::{
    FileTokenStore, FnRefresher, RefreshedToken, StoredExpiry, Token, TokenGateway,
    TokenRefresher, TokenStore,
};
use crate::types::{JsonValue, OptionStringExt};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Request {
                method,
                path,
                data,
                headers,
            } => self.request(method, path, data.as_deref(), headers).await,
            Commands::Token { action } => self.token(action).await,
            Commands::Config => self.show_config(),
        }
    }

    /// Load settings from the config file, applying command-line overrides
    fn load_settings(&self) -> Result<ClientSettings> {
        let mut settings = match self.cli.config {
            Some(ref path) => ClientSettings::from_file(path)?,
            None => ClientSettings::default(),
        };

        if let Some(base_url) = self.cli.base_url.clone().none_if_empty() {
            settings.base_url = Some(base_url);
        }
        settings.validate()?;

        Ok(settings)
    }

    /// Open the token store named with `--store`
    fn open_store(&self) -> Result<Option<Arc<FileTokenStore>>> {
        match self.cli.store {
            Some(ref path) => Ok(Some(Arc::new(FileTokenStore::open(path)?))),
            None => Ok(None),
        }
    }

    fn require_store(&self) -> Result<Arc<FileTokenStore>> {
        self.open_store()?
            .ok_or_else(|| Error::config("Token store not specified (use -s flag)"))
    }

    /// Build the refresher from settings, or one that always fails
    fn build_refresher(
        settings: &ClientSettings,
        transport: &ReqwestTransport,
    ) -> Result<Arc<dyn TokenRefresher>> {
        match settings.refresh {
            Some(ref refresh) => Ok(Arc::new(refresh.build(transport.inner().clone())?)),
            None => Ok(Arc::new(FnRefresher(|_old: Option<Token>| async {
                Err::<RefreshedToken, _>(Error::token_refresh(
                    "no refresh endpoint configured",
                ))
            }))),
        }
    }

    fn build_coordinator(
        settings: &ClientSettings,
        store: Arc<dyn TokenStore>,
        transport: &ReqwestTransport,
    ) -> Result<RefreshCoordinator> {
        let gateway = TokenGateway::with_expiry(
            store,
            Arc::new(StoredExpiry::with_skew(settings.expiry_skew())),
        );
        let refresher = Self::build_refresher(settings, transport)?;
        Ok(RefreshCoordinator::with_timeout(
            gateway,
            refresher,
            settings.to_client_config().refresh_timeout,
        ))
    }

    // ========================================================================
    // Request
    // ========================================================================

    async fn request(
        &self,
        method: &str,
        path: &str,
        data: Option<&str>,
        headers: &[String],
    ) -> Result<()> {
        let settings = self.load_settings()?;
        let config = settings.to_client_config();
        let transport = ReqwestTransport::new(&config.user_agent)?;

        let mut client = ResilientClient::with_transport(config, Arc::new(transport.clone()));
        if let Some(store) = self.open_store()? {
            let coordinator = Self::build_coordinator(&settings, store, &transport)?;
            client = client.with_coordinator(coordinator);
        }

        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| Error::config(format!("Invalid HTTP method '{method}': {e}")))?;

        let mut request = HttpRequest::new(method, path);
        for raw in headers {
            let (key, value) = raw.split_once(':').ok_or_else(|| {
                Error::config(format!("Invalid header '{raw}', expected 'Name: value'"))
            })?;
            request = request.header(key.trim(), value.trim());
        }
        if let Some(data) = data {
            let body: JsonValue = serde_json::from_str(data)?;
            request = request.json(&body)?;
        }

        debug!("Sending {} {}", request.method, request.url);
        let response = client.send(request).await?;
        info!("Received {} ({} bytes)", response.status(), response.body().len());

        self.print_response(&response)
    }

    fn print_response(&self, response: &HttpResponse) -> Result<()> {
        match self.cli.format {
            OutputFormat::Raw => println!("{}", response.text()),
            OutputFormat::Json | OutputFormat::Pretty => {
                // Bodies that aren't JSON are printed as a JSON string
                let value: JsonValue = response
                    .json()
                    .unwrap_or_else(|_| JsonValue::String(response.text()));
                self.print_json(&value)?;
            }
        }
        Ok(())
    }

    fn print_json(&self, value: &JsonValue) -> Result<()> {
        let output = match self.cli.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
            _ => serde_json::to_string(value)?,
        };
        println!("{output}");
        Ok(())
    }

    // ========================================================================
    // Token
    // ========================================================================

    async fn token(&self, action: &TokenCommand) -> Result<()> {
        let store = self.require_store()?;
        let gateway = TokenGateway::new(store.clone());

        match action {
            TokenCommand::Show { reveal } => {
                let token = gateway.current_token().await;
                let expires_at = gateway.stored_expiry().await;
                let expired = match token {
                    Some(ref token) => Some(gateway.is_expired(token).await),
                    None => None,
                };

                self.print_json(&json!({
                    "token": token.map(|t| display_token(&t, *reveal)),
                    "expires_at": expires_at.map(|dt| dt.to_rfc3339()),
                    "expired": expired,
                    "store": store.path().display().to_string(),
                }))
            }
            TokenCommand::Set {
                token,
                expires_at,
                expires_in,
            } => {
                let refreshed = match (expires_at, expires_in) {
                    (Some(raw), _) => {
                        RefreshedToken::new(token.as_str(), Some(parse_cli_expiry(raw)?))
                    }
                    (None, Some(seconds)) => {
                        let refreshed = RefreshedToken::expires_in(token.as_str(), *seconds);
                        if refreshed.expires_at.is_none() {
                            return Err(Error::invalid_value(
                                "expires_in",
                                format!("{seconds} seconds is out of range"),
                            ));
                        }
                        refreshed
                    }
                    (None, None) => RefreshedToken::new(token.as_str(), None),
                };
                gateway.store_token(&refreshed).await?;
                info!("Stored token in {}", store.path().display());
                Ok(())
            }
            TokenCommand::Clear => {
                gateway.clear().await?;
                info!("Cleared token in {}", store.path().display());
                Ok(())
            }
            TokenCommand::Refresh => {
                let settings = self.load_settings()?;
                let config = settings.to_client_config();
                let transport = ReqwestTransport::new(&config.user_agent)?;
                let coordinator = Self::build_coordinator(&settings, store.clone(), &transport)?;

                let current = coordinator.gateway().current_token().await;
                let token = coordinator
                    .ensure_fresh_token(FailureSignal::Rejected(current))
                    .await?;

                let expires_at = coordinator.gateway().stored_expiry().await;
                self.print_json(&json!({
                    "token": display_token(&token, false),
                    "expires_at": expires_at.map(|dt| dt.to_rfc3339()),
                }))
            }
        }
    }

    // ========================================================================
    // Config
    // ========================================================================

    fn show_config(&self) -> Result<()> {
        let settings = self.load_settings()?;
        let value = serde_json::to_value(&settings)?;
        self.print_json(&value)
    }
}

/// Token for display, truncated unless `reveal` is set
fn display_token(token: &Token, reveal: bool) -> String {
    let value = token.as_str();
    if reveal || value.len() <= 8 {
        return value.to_string();
    }
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}

fn parse_cli_expiry(raw: &str) -> Result<DateTime<Utc>> {
    crate::token::parse_expiry(raw)
        .ok_or_else(|| Error::invalid_value("expires_at", format!("cannot parse '{raw}'")))
}
