//! Common test utilities.
//!
//! `FAKE_SERVER` is a small MCP server written in POSIX sh. It answers the
//! handshake, `tools/list`, and a few canned tools, echoing the request id:
//!
//! - `get_repository`, `get_issues`: fixed text
//! - `whoami`: the token it received through its environment
//! - `chatty`: a `notifications/message` log line, then fixed text
//! - `hang`: never answers
//! - `crash`: exits without answering
//! - anything else: a JSON-RPC error

#![allow(dead_code)]

use ghbridge_core::{AccessToken, ServerConfig};

pub const FAKE_SERVER: &str = r##"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-github","version":"0.0.1"}}}\n' "$id" ;;
    *'"method":"notifications/initialized"'*)
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"get_repository","description":"Get a repository"},{"name":"get_issues"},{"name":"create_issue"},{"name":"search_repositories"}]}}\n' "$id" ;;
    *'"name":"get_repository"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"repo info"}]}}\n' "$id" ;;
    *'"name":"get_issues"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"#1 First issue"}]}}\n' "$id" ;;
    *'"name":"whoami"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s"}]}}\n' "$id" "$GITHUB_PERSONAL_ACCESS_TOKEN" ;;
    *'"name":"chatty"'*)
      printf '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"working"}}\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"chatty done"}]}}\n' "$id" ;;
    *'"name":"hang"'*)
      sleep 5 ;;
    *'"name":"crash"'*)
      exit 3 ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"##;

/// Token handed to the fake server.
pub const TEST_TOKEN: &str = "ghp_fake_token_for_tests";

/// Server config running `FAKE_SERVER` under `sh` instead of docker.
pub fn fake_server_config() -> ServerConfig {
    ServerConfig {
        command: "sh".to_string(),
        args: Some(vec!["-c".to_string(), FAKE_SERVER.to_string()]),
        read_timeout_secs: 5,
        shutdown_timeout_secs: 2,
        ..ServerConfig::default()
    }
}

pub fn test_token() -> AccessToken {
    AccessToken::new(TEST_TOKEN)
}
