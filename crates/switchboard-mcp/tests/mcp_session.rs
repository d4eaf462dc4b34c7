//! A full MCP session over an in-memory stream

use serde_json::{json, Value};

use switchboard_core::GatewayConfig;
use switchboard_mcp::{Dispatcher, McpServer};
use switchboard_test::FakeBackends;

#[tokio::test]
async fn test_session_initialize_list_and_call() {
    let fakes = FakeBackends::new().with_packages(|p| p.with_installed(&["alpha"]));
    let dispatcher = Dispatcher::new(fakes.backends(), GatewayConfig::with_root("/work"));
    let mut server = McpServer::new(dispatcher);

    let info = |id: u64, name: &str| {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": "server", "arguments": {"action": "info", "name": name}}
        })
        .to_string()
    };
    let input = [
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05"}
        })
        .to_string(),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
        String::new(),
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#.to_string(),
        info(3, "alpha"),
        info(4, "ghost"),
    ]
    .join("\n");

    let mut output: Vec<u8> = Vec::new();
    server.run_with(input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    // The notification and the blank line produce nothing
    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "switchboard");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);

    let found = &responses[2]["result"];
    assert!(found.get("isError").is_none());
    let text = found["content"][0]["text"].as_str().unwrap();
    let record: Value = serde_json::from_str(text).unwrap();
    assert_eq!(record["name"], "alpha");
    assert_eq!(found["structuredContent"]["data"]["name"], "alpha");

    let missing = &responses[3]["result"];
    assert_eq!(missing["isError"], true);
    assert_eq!(missing["content"][0]["text"], "[NOT_FOUND] server 'ghost' not found");
    assert_eq!(missing["structuredContent"]["error"]["code"], "NOT_FOUND");
    assert_eq!(missing["structuredContent"]["error"]["message"], "server 'ghost' not found");
    assert!(missing["structuredContent"].get("data").is_none());
    assert_eq!(fakes.packages.call_count("info"), 2);
}
