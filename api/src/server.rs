use crate::create_router;
use settings::Components;
use tokio::task::JoinHandle;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create a new API configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

/// Start the API server with the given configuration
pub async fn start_server_with_config(
    components: Components,
    config: ApiConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(&components);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on {}", addr);
    info!("Serving {} configured routes", components.routes.len());

    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the API server with default configuration
pub async fn start_server(
    components: Components,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_config(components, ApiConfig::default()).await
}

/// Start the API server in a background task
pub fn spawn_server(components: Components, config: ApiConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = start_server_with_config(components, config).await {
            tracing::error!("API server error: {}", e);
        }
    })
}
