//! Incremental stream capture and run-output layout.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::types::RunRequest;

/// Maximum bytes kept in memory per stream (10 MiB).
///
/// Anything beyond is still read from the pipe so the child never blocks on
/// a full buffer, but it is discarded.
pub(crate) const MAX_CAPTURE_BYTES: usize = 10 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

pub(crate) const RULE: &str = "---------------------";

/// Bytes collected from one child stream.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub bytes: Vec<u8>,
    /// Number of bytes read past [`MAX_CAPTURE_BYTES`] and dropped.
    pub dropped: usize,
}

impl Captured {
    pub fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[... {} bytes truncated ...]\n", self.dropped));
        }
        text
    }
}

/// Read `handle` chunk by chunk until EOF.
///
/// Read errors end the capture early; whatever was collected is kept.
pub(crate) async fn drain<R: AsyncRead + Unpin>(handle: Option<R>, stream: &'static str) -> Captured {
    let mut captured = Captured::default();
    let Some(mut reader) = handle else {
        return captured;
    };

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                trace!(stream, bytes = n, "captured chunk");
                let room = MAX_CAPTURE_BYTES.saturating_sub(captured.bytes.len());
                let keep = n.min(room);
                captured.bytes.extend_from_slice(&chunk[..keep]);
                captured.dropped += n - keep;
            }
            Err(e) => {
                trace!(stream, error = %e, "stream read failed");
                break;
            }
        }
    }
    captured
}

/// Assemble the human-readable run transcript.
///
/// ```text
/// Running script: {name} (ID: {id})
/// Type: {type}
/// Path: {path}
/// ---------------------
/// {stdout}
/// ---------------------
/// Script finished with exit code {code}
///
/// Errors:
/// {stderr}
/// ```
///
/// The `Errors:` section only appears when stderr carried any text.
pub(crate) fn render(request: &RunRequest, stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut output = format!(
        "Running script: {} (ID: {})\nType: {}\nPath: {}\n{RULE}\n",
        request.name,
        request.script_id,
        request.script_type,
        request.path.display(),
    );
    output.push_str(stdout);
    output.push_str(&format!(
        "\n{RULE}\nScript finished with exit code {exit_code}\n"
    ));
    if !stderr.is_empty() {
        output.push_str("\nErrors:\n");
        output.push_str(stderr);
    }
    output
}
