//! Tests for failure classification and formatting.

use copilot_bridge::error::{classify, format_error, ErrorKind, FailureSignal};
use serde_json::json;

#[test]
fn network_codes_and_text() {
    for signal in [
        json!({"code": "ECONNREFUSED", "message": "connect ECONNREFUSED"}),
        json!({"code": "ENOTFOUND", "message": "getaddrinfo ENOTFOUND api.github.com"}),
        json!({"code": "ETIMEDOUT", "message": "connect ETIMEDOUT"}),
        json!({"message": "Network unreachable"}),
    ] {
        let err = classify(&signal);
        assert_eq!(err.kind, ErrorKind::Network, "signal: {signal}");
        assert!(err.recoverable);
    }
}

#[test]
fn auth_from_message_and_stderr() {
    let err = classify(json!({"message": "You are not logged in"}));
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.recovery_action.as_deref(), Some("Run: gh auth login"));

    let err = classify(json!({"message": "request failed", "stderr": "bad token provided"}));
    assert_eq!(err.kind, ErrorKind::Auth);

    let err = classify(json!({"message": "401 Unauthorized"}));
    assert_eq!(err.kind, ErrorKind::Auth);
}

#[test]
fn not_found_from_enoent_and_text() {
    let err = classify(json!({"code": "ENOENT", "message": "spawn copilot ENOENT"}));
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(err.hint.as_deref().unwrap().contains("npm install -g @github/copilot"));

    let err = classify("copilot: command not found");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn io_not_found_is_not_found() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
    assert_eq!(classify(&io).kind, ErrorKind::NotFound);
}

#[test]
fn permission_from_code_and_text() {
    let err = classify(json!({"code": "EACCES", "message": "spawn EACCES"}));
    assert_eq!(err.kind, ErrorKind::Permission);
    assert!(!err.recoverable);

    let err = classify("Permission denied (publickey)");
    assert_eq!(err.kind, ErrorKind::Permission);
}

#[test]
fn timeout_text() {
    let err = classify("Command timeout after 3000ms");
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(err.recoverable);
}

#[test]
fn process_start_text() {
    let err = classify("Failed to start process");
    assert_eq!(err.kind, ErrorKind::ProcessStart);
    assert!(!err.recoverable);
}

#[test]
fn mcp_protocol_text() {
    for message in ["MCP handshake rejected", "protocol violation", "invalid message received"] {
        assert_eq!(classify(message).kind, ErrorKind::McpProtocol, "{message}");
    }
}

#[test]
fn invalid_response_from_parse_failure() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    assert_eq!(classify(parse).kind, ErrorKind::InvalidResponse);

    let err = classify(json!({"name": "SyntaxError", "message": "Unexpected token"}));
    assert_eq!(err.kind, ErrorKind::InvalidResponse);
}

#[test]
fn process_exit_interpolates_code() {
    let err = classify(json!({"exitCode": 137}));
    assert_eq!(err.kind, ErrorKind::ProcessExit);
    assert!(err.message.contains("137"));
    assert!(err.recoverable);
    assert_eq!(err.recovery_action.as_deref(), Some("Restart Copilot"));

    let err = classify(FailureSignal::default().with_code(2));
    assert_eq!(err.kind, ErrorKind::ProcessExit);
    assert!(err.message.contains("code: 2"));
}

#[test]
fn os_code_alone_is_process_exit() {
    let err = classify(json!({"code": "EPIPE"}));
    assert_eq!(err.kind, ErrorKind::ProcessExit);
    assert!(err.message.contains("EPIPE"));
}

#[test]
fn unstructured_input_is_unknown() {
    for signal in [json!(null), json!(42), json!(true), json!({})] {
        let err = classify(&signal);
        assert_eq!(err.kind, ErrorKind::Unknown, "signal: {signal}");
        assert_eq!(err.message, "An unknown error occurred");
    }

    let err = classify("something odd happened");
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert_eq!(err.message, "something odd happened");
}

#[test]
fn format_hides_cause_unless_debug() {
    let err = classify(json!({"message": "connect ECONNREFUSED 127.0.0.1", "code": "ECONNREFUSED"}));

    let plain = format_error(&err, false);
    assert!(plain.contains("Network connection failed"));
    assert!(plain.contains("internet connection"));
    assert!(!plain.contains("127.0.0.1"));

    let debug = format_error(&err, true);
    assert!(debug.contains("127.0.0.1"));
}
