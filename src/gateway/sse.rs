// SSE (Server-Sent Events) wire framing
//
// The streaming completion path speaks SSE on both legs: the engine decodes
// the backend's frames, and the dispatcher re-emits chunks in the same wire
// format toward the client. Each frame is
//
// ```
// data: <compact-json>\n\n
// ```
//
// A clean stream ends with exactly one `data: [DONE]\n\n` sentinel. A
// failed stream ends with one terminal error frame instead (the status
// line is already on the wire, so the error must ride inside the stream);
// `[DONE]` is never emitted after an error, so clients see exactly one of
// the two terminators.

use serde_json::Value;

/// Terminal frame for a cleanly completed stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

// ============================================================================
// Frame Emission
// ============================================================================

/// Render one chunk as a wire frame. `Value`'s Display is compact JSON.
pub fn data_frame(value: &Value) -> String {
    format!("data: {value}\n\n")
}

/// Render the terminal error frame for a stream that failed mid-flight.
pub fn error_frame(message: &str) -> String {
    let payload = serde_json::json!({"error": {"message": message}});
    format!("data: {payload}\n\n")
}

// ============================================================================
// Frame Parsing
// ============================================================================

/// Check whether a line is the `[DONE]` sentinel
pub fn is_done_frame(line: &str) -> bool {
    line.strip_prefix("data:")
        .map(|rest| rest.trim() == "[DONE]")
        .unwrap_or(false)
}

/// Parse an SSE "data:" line into JSON
///
/// Returns None if:
/// - Line doesn't start with "data:"
/// - Data is empty or "[DONE]"
/// - JSON parsing fails
pub fn parse_data_line(line: &str) -> Option<Value> {
    let json_str = line.strip_prefix("data:")?.trim();
    if json_str.is_empty() || json_str == "[DONE]" {
        return None;
    }
    serde_json::from_str(json_str).ok()
}
