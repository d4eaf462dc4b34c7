//! Tool definitions
//!
//! Eight consolidated tools, each dispatching on an `action` argument. The
//! action enums in the schemas come straight from the action types, so the
//! advertised set and the accepted set cannot drift apart.

use serde_json::{json, Map, Value};

use crate::actions::ToolName;
use crate::protocol::{InputSchema, Tool};

/// Create a tool definition with the given name, description, and schema properties
fn tool(name: ToolName, description: &str, properties: Value, required: Vec<&str>) -> Tool {
    let props = properties.as_object().cloned().unwrap_or_default();
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties: props,
            required: required.into_iter().map(|s| s.to_string()).collect(),
        },
    }
}

/// A tool with an `action` enum merged into its other properties
fn action_tool(name: ToolName, summary: &str, properties: Value) -> Tool {
    let actions = name.actions();
    let mut props = Map::new();
    props.insert(
        "action".to_string(),
        json!({
            "type": "string",
            "description": "Action to perform",
            "enum": &actions,
        }),
    );
    if let Some(extra) = properties.as_object() {
        props.extend(extra.clone());
    }
    let description = format!("{}. Actions: {}", summary, actions.join(", "));
    tool(name, &description, Value::Object(props), vec!["action"])
}

fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn boolean(description: &str) -> Value {
    json!({"type": "boolean", "description": description})
}

fn integer(description: &str, minimum: u64, maximum: u64) -> Value {
    json!({
        "type": "integer",
        "minimum": minimum,
        "maximum": maximum,
        "description": description,
    })
}

fn string_list(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "string"},
        "description": description,
    })
}

/// Every tool the gateway exposes
pub fn all_tools() -> Vec<Tool> {
    vec![
        // =========================================================================
        // SERVER - catalog and installed servers
        // =========================================================================
        action_tool(
            ToolName::Server,
            "Manage MCP servers: browse the registry, install, remove and define custom servers",
            json!({
                "name": string("Server name (info, install, uninstall, create, edit)"),
                "query": string("Search text (search)"),
                "type": {
                    "type": "string",
                    "enum": ["stdio", "streamable-http"],
                    "description": "Transport (create, edit)"
                },
                "command": string("Command to launch (create, edit; stdio)"),
                "args": string_list("Command arguments (create, edit)"),
                "url": string("Endpoint (create, edit; streamable-http)"),
                "env": {
                    "type": "object",
                    "description": "Environment variables, or \"K=V,K2=V2\" (create, edit)"
                },
                "description": string("Human description (create, edit)")
            }),
        ),

        // =========================================================================
        // PROFILE - named server groups
        // =========================================================================
        action_tool(
            ToolName::Profile,
            "Manage profiles (named groups of servers) and restart their processes",
            json!({
                "name": string("Profile name (create, edit, delete)"),
                "servers": string_list("Servers in the new profile (create)"),
                "new_name": string("Rename to (edit)"),
                "add_servers": string_list("Servers to add (edit)"),
                "remove_servers": string_list("Servers to remove (edit)"),
                "path": string("Project directory (suggest)"),
                "testing": boolean("Include the testing profile (suggest)"),
                "profile": string("Profile to restart; omit to restart the daemon (restart)")
            }),
        ),

        // =========================================================================
        // CLIENT - MCP client applications
        // =========================================================================
        action_tool(
            ToolName::Client,
            "List MCP client applications and change which servers or profiles they load",
            json!({
                "name": string("Client name (edit)"),
                "add_servers": string_list("Servers to add (edit)"),
                "remove_servers": string_list("Servers to remove (edit)"),
                "add_profiles": string_list("Profiles to add (edit)"),
                "remove_profiles": string_list("Profiles to remove (edit)")
            }),
        ),

        // =========================================================================
        // CONFIG - package manager settings
        // =========================================================================
        action_tool(
            ToolName::Config,
            "Read and write package manager settings, migrate legacy config, \
             export or import a snapshot",
            json!({
                "key": string("Setting key (get, set)"),
                "value": {"description": "Setting value (set)"},
                "redact": boolean("Redact secret values, default true (export)"),
                "payload": {
                    "description": "Exported snapshot, as an object or JSON string (import)"
                }
            }),
        ),

        // =========================================================================
        // PROJECT - repository inspection and setup
        // =========================================================================
        action_tool(
            ToolName::Project,
            "Inspect a project directory, show its diff, install DevOps scaffolding \
             or run its tests",
            json!({
                "path": string("Project directory, relative to the project root (all)"),
                "staged": boolean("Show the staged diff (diff)"),
                "project_type": string("Language for templates: python, go, node, rust (devops)"),
                "force": boolean("Overwrite existing configs (devops)"),
                "enable_ai_review": boolean("Add the PR review workflow (devops)"),
                "languages": string_list("Languages to test; detected when omitted (test)")
            }),
        ),

        // =========================================================================
        // SYSTEM - container lifecycle
        // =========================================================================
        action_tool(
            ToolName::System,
            "Run the gateway's container stack: bootstrap, restart, rebuild, start, stop, \
             logs and status",
            json!({
                "services": string_list(
                    "Compose services; all when omitted (restart, rebuild, stop, start, build)"
                ),
                "no_cache": boolean("Build without cache (rebuild, build)"),
                "service": string("Service to read logs from (docker_logs)"),
                "lines": integer("Log lines, default 100 (docker_logs)", 1, 500)
            }),
        ),

        // =========================================================================
        // SHARE - expose a server over a tunnel
        // =========================================================================
        action_tool(
            ToolName::Share,
            "Share a local server through a tunnel, stop sharing, or list active shares",
            json!({
                "name": string("Server name (start, stop)"),
                "port": integer("Local port (start)", 1, 65535),
                "no_auth": boolean("Disable tunnel authentication (start)")
            }),
        ),

        // =========================================================================
        // STATUS - one-shot health summary
        // =========================================================================
        tool(
            ToolName::Status,
            "Report gateway health: package manager, containers and supervised processes",
            json!({}),
            vec![],
        ),
    ]
}
