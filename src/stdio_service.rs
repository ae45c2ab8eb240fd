use rmcp::{model::*, ServiceExt};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Settings;
use crate::mcp::{run_search_tool, search_tool_schema, SEARCH_TOOL, SEARCH_TOOL_DESCRIPTION};
use crate::AppState;

/// Client id used for rate limiting stdio callers.
const STDIO_CLIENT: &str = "stdio";

#[derive(Clone, Debug)]
pub struct McpService {
    pub state: Arc<AppState>,
}

impl McpService {
    pub fn new() -> anyhow::Result<Self> {
        // stdout carries the protocol, so logs go to stderr
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();

        let _ = dotenvy::dotenv();
        let settings = Settings::from_env();
        info!("Starting volunteer-finder MCP service");
        info!(sources = ?settings.enabled_sources, "configured sources");

        let state = Arc::new(AppState::from_settings(settings)?);
        Ok(Self::with_state(state))
    }

    pub fn with_state(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl rmcp::ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Finds volunteer opportunities near a location by aggregating several listing sites. Results are ranked by distance and fall back to sample listings when no source responds.".to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _page: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let input_schema = match search_tool_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };
        let tools = vec![Tool {
            name: Cow::Borrowed(SEARCH_TOOL),
            description: Some(Cow::Borrowed(SEARCH_TOOL_DESCRIPTION)),
            input_schema,
            output_schema: None,
            annotations: None,
        }];

        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);

        if request.name.as_ref() != SEARCH_TOOL {
            return Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unknown tool: {}", request.name),
                None,
            ));
        }

        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);

        match run_search_tool(&self.state, STDIO_CLIENT, arguments).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => {
                error!("Search tool error: {}", e);
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Search failed: {}",
                    e
                ))]))
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let service = McpService::new()?;
    let sweeper = service.state.cache.clone().spawn_sweeper();
    let server = service.serve(rmcp::transport::stdio()).await?;
    info!("MCP stdio server running");
    let _quit_reason = server.waiting().await?;
    sweeper.abort();
    Ok(())
}
