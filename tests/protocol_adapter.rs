mod common;
use common::{harness, ok};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

async fn call(adapter: &webposto_mcp::mcp::adapter::ProtocolAdapter, request: Value) -> Value {
    let line = adapter
        .handle(&request.to_string())
        .await
        .expect("response expected");
    serde_json::from_str(&line).expect("response is JSON")
}

#[tokio::test]
async fn initialize_advertises_capabilities() {
    let h = harness(vec![]);
    let response = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    )
    .await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], "webposto-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert!(response["result"]["capabilities"]["prompts"].is_object());
}

#[tokio::test]
async fn tools_list_exposes_the_whole_registry() {
    let h = harness(vec![]);
    let response = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": "t", "method": "tools/list"}),
    )
    .await;
    let tools = response["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), 144);
    let vendas = tools
        .iter()
        .find(|t| t["name"] == "vendas_periodo")
        .expect("vendas_periodo");
    assert_eq!(vendas["inputSchema"]["additionalProperties"], false);
}

#[tokio::test]
async fn tools_call_wraps_the_envelope() {
    let h = harness(vec![ok(json!([{"codigo": 1}]))]);
    let response = call(
        &h.adapter,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "consultar_empresas", "arguments": {}}
        }),
    )
    .await;
    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["success"], true);
    assert_eq!(result["structuredContent"]["payload"], json!([{"codigo": 1}]));
    let text = result["content"][0]["text"].as_str().expect("text");
    let from_text: Value = serde_json::from_str(text).expect("text is JSON");
    assert_eq!(from_text, result["structuredContent"]);
}

#[tokio::test]
async fn failed_tool_call_is_a_result_not_a_protocol_error() {
    let h = harness(vec![]);
    let response = call(
        &h.adapter,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "consultar_venda", "arguments": {"data_inicial": "31-01-2025"}}
        }),
    )
    .await;
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["structuredContent"]["error"]["kind"],
        "MalformedDate"
    );
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let h = harness(vec![]);

    let line = h.adapter.handle("{not json").await.expect("response");
    let parsed: Value = serde_json::from_str(&line).expect("json");
    assert_eq!(parsed["error"]["code"], -32700);
    assert_eq!(parsed["id"], Value::Null);

    let missing_method = call(&h.adapter, json!({"jsonrpc": "2.0", "id": 2})).await;
    assert_eq!(missing_method["error"]["code"], -32600);
    assert_eq!(missing_method["id"], 2);

    let unknown = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/explode"}),
    )
    .await;
    assert_eq!(unknown["error"]["code"], -32601);

    let no_name = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {}}),
    )
    .await;
    assert_eq!(no_name["error"]["code"], -32602);

    let bad_args = call(
        &h.adapter,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "consultar_empresas", "arguments": [1]}
        }),
    )
    .await;
    assert_eq!(bad_args["error"]["code"], -32602);
}

#[tokio::test]
async fn notifications_get_no_response() {
    let h = harness(vec![]);
    let out = h
        .adapter
        .handle(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    assert!(out.is_none());
}

#[tokio::test]
async fn resources_and_prompts_are_served() {
    let h = harness(vec![]);
    let listed = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}),
    )
    .await;
    assert_eq!(listed["result"]["resources"].as_array().map(Vec::len), Some(2));

    let read = call(
        &h.adapter,
        json!({"jsonrpc": "2.0", "id": 2, "method": "resources/read", "params": {"uri": "schema://tools"}}),
    )
    .await;
    let text = read["result"]["contents"][0]["text"].as_str().expect("text");
    let summary: Value = serde_json::from_str(text).expect("json");
    assert_eq!(summary["total"], 144);

    let prompt = call(
        &h.adapter,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "prompts/get",
            "params": {"name": "analise_abastecimento", "arguments": {"periodo": "ontem"}}
        }),
    )
    .await;
    let text = prompt["result"]["messages"][0]["content"]["text"]
        .as_str()
        .expect("text");
    assert!(text.contains("ontem"));
    assert!(text.contains("bomba: todas"));
}

#[tokio::test]
async fn stdio_loop_answers_every_request_line() {
    let h = harness(vec![]);
    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, client_out) = tokio::io::duplex(1024 * 1024);

    let server = tokio::spawn(webposto_mcp::mcp::server::serve(
        h.adapter.clone(),
        server_in,
        server_out,
    ));

    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        String::new(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "prompts/list"}).to_string(),
    ]
    .join("\n");
    client_in.write_all(input.as_bytes()).await.expect("write");
    client_in.write_all(b"\n").await.expect("write");
    drop(client_in);

    server.await.expect("join").expect("serve");

    let mut lines = BufReader::new(client_out).lines();
    let mut ids = Vec::new();
    while let Some(line) = lines.next_line().await.expect("read") {
        let value: Value = serde_json::from_str(&line).expect("json line");
        ids.push(value["id"].clone());
    }
    ids.sort_by_key(|id| id.as_i64());
    assert_eq!(ids, vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn non_utf8_line_is_answered_and_the_loop_keeps_going() {
    let h = harness(vec![]);
    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, client_out) = tokio::io::duplex(64 * 1024);

    let server = tokio::spawn(webposto_mcp::mcp::server::serve(
        h.adapter.clone(),
        server_in,
        server_out,
    ));

    client_in
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\xfe\"}\n")
        .await
        .expect("write");
    let ping = json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}).to_string();
    client_in.write_all(ping.as_bytes()).await.expect("write");
    client_in.write_all(b"\n").await.expect("write");
    drop(client_in);

    server.await.expect("join").expect("serve survives bad bytes");

    let mut lines = BufReader::new(client_out).lines();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line().await.expect("read") {
        responses.push(serde_json::from_str::<Value>(&line).expect("json line"));
    }
    assert_eq!(responses.len(), 2);
    let parse_error = responses
        .iter()
        .find(|r| r["id"].is_null())
        .expect("parse error response");
    assert_eq!(parse_error["error"]["code"], -32700);
    let pong = responses.iter().find(|r| r["id"] == 2).expect("ping answered");
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test]
async fn wrong_json_rpc_version_is_an_invalid_request() {
    let h = harness(vec![]);
    let response = call(
        &h.adapter,
        json!({"jsonrpc": "1.0", "id": 7, "method": "ping"}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 7);
}
