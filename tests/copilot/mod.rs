//! Protocol session tests against scripted stand-ins for the CLI.

mod client_test;
mod session_test;

use copilot_bridge::detect::CommandDescriptor;
use tempfile::TempDir;

/// Write `body` to a shell script and describe it as `sh <script>`.
///
/// Running through `sh` means the file needs no exec bit. The composite
/// form appends `chat`, which the scripts ignore.
pub fn script(body: &str) -> (TempDir, CommandDescriptor) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake-copilot.sh");
    std::fs::write(&path, body).unwrap();
    let command = CommandDescriptor::composite("sh", path.to_string_lossy().into_owned());
    (dir, command)
}

pub const SILENT: &str = "exec sleep 30\n";

pub const READY_THEN_IDLE: &str = "echo '{\"type\":\"ready\"}'\nexec sleep 30\n";

/// Answers every input line with an assistant message, then exits on EOF.
pub const ECHO: &str = r#"echo '{"type":"ready"}'
while IFS= read -r line; do
  case "$line" in
    *'"type":"abort"'*) echo '{"type":"error","error":"aborted"}' ;;
    *) echo '{"type":"assistant_message","text":"ack"}' ;;
  esac
done
"#;

pub const EXIT_3: &str = "exit 3\n";

/// Ignores SIGTERM, so only a kill stops it.
pub const IGNORES_TERM: &str = "trap '' TERM\necho '{\"type\":\"ready\"}'\nwhile :; do sleep 1; done\n";
