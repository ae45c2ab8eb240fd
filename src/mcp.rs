use crate::error::SearchError;
use crate::types::*;
use crate::{search, AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

pub const SEARCH_TOOL: &str = "search_opportunities";
pub const SEARCH_TOOL_DESCRIPTION: &str = "Find volunteer opportunities near a location. Aggregates several listing sites, ranks results by distance and filters by category, keywords and remote availability.";

#[derive(Debug, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallResponse {
    pub content: Vec<McpContent>,
    pub is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// JSON schema of the tool input, derived from the wire request type.
pub fn search_tool_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(SearchRequest);
    serde_json::to_value(&schema).unwrap_or_else(|e| {
        error!("failed to serialize tool schema: {}", e);
        serde_json::json!({ "type": "object" })
    })
}

/// Validate tool arguments and run a search on behalf of `client_id`.
pub async fn run_search_tool(
    state: &Arc<AppState>,
    client_id: &str,
    arguments: serde_json::Value,
) -> Result<String, SearchError> {
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };
    let request: SearchRequest = serde_json::from_value(arguments)
        .map_err(|e| SearchError::InvalidInput(format!("bad arguments: {}", e)))?;
    let criteria = SearchCriteria::from_request(&request)?;
    let response = search::search_opportunities(state, client_id, &criteria).await?;
    Ok(format_response(&response))
}

/// Plain-text rendering for tool output.
pub fn format_response(response: &SearchResponse) -> String {
    if response.opportunities.is_empty() {
        return format!(
            "No volunteer opportunities found near {}.",
            response.location
        );
    }
    let mut text = format!(
        "Found {} volunteer opportunities near {}",
        response.total, response.location
    );
    if response.degraded {
        text.push_str(" (sample listings, live sources unavailable)");
    }
    text.push_str(":\n\n");
    for (i, o) in response.opportunities.iter().enumerate() {
        let distance = o
            .distance_miles
            .map(|d| format!("{:.1} mi", d))
            .unwrap_or_else(|| "distance unknown".to_string());
        text.push_str(&format!(
            "{}. **{}** ({})\n   {} | {} | {}\n   {}\n",
            i + 1,
            o.title,
            o.category,
            o.organization,
            o.address,
            distance,
            o.description.chars().take(200).collect::<String>()
        ));
        if let Some(link) = &o.website {
            text.push_str(&format!("   {}\n", link));
        }
        text.push('\n');
    }
    if !response.sources.is_empty() {
        text.push_str(&format!("Sources: {}\n", response.sources.join(", ")));
    }
    for warning in &response.warnings {
        text.push_str(&format!("Note: {}\n", warning));
    }
    text
}

pub async fn list_tools() -> Json<McpToolsResponse> {
    let tools = vec![McpTool {
        name: SEARCH_TOOL.to_string(),
        description: SEARCH_TOOL_DESCRIPTION.to_string(),
        input_schema: search_tool_schema(),
    }];

    Json(McpToolsResponse { tools })
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);

    if request.name != SEARCH_TOOL {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Unknown tool: {}", request.name),
                retry_after_secs: None,
            }),
        ));
    }

    let (text, is_error) = match run_search_tool(&state, "mcp-http", request.arguments).await {
        Ok(text) => (text, false),
        Err(e) => {
            error!("Search tool error: {}", e);
            (format!("Search failed: {}", e), true)
        }
    };

    Ok(Json(McpCallResponse {
        content: vec![McpContent {
            content_type: "text".to_string(),
            text,
        }],
        is_error,
    }))
}
