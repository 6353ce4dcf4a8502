//! Human-readable revert reasons from node error messages

use alloy::hex;
use alloy::sol_types::decode_revert_reason;

/// Parse revert reason from an RPC error message
///
/// Gas estimation of a call that would revert comes back as a JSON-RPC
/// error whose message or data carries the reason, either as text or as
/// ABI-encoded `Error(string)` / `Panic(uint256)` bytes.
pub fn parse_revert_reason(error: &str) -> String {
    if !error.contains("execution reverted") {
        return error.to_string();
    }

    if let Some(start) = error.find("revert: ") {
        let reason = &error[start + 8..];
        if let Some(end) = reason.find('"') {
            return reason[..end].to_string();
        }
        return reason.to_string();
    }

    // Addresses may appear earlier in the message; the payload follows `data`
    let payload = error.find("data").map_or(error, |at| &error[at..]);
    if let Some(start) = payload.find("0x") {
        let hex_data = &payload[start..];
        let end = hex_data[2..]
            .find(|c: char| !c.is_ascii_hexdigit())
            .map(|i| i + 2)
            .unwrap_or(hex_data.len());
        let data = &hex_data[..end];
        if let Some(reason) = hex::decode(&data[2..])
            .ok()
            .and_then(|bytes| decode_revert_reason(&bytes))
        {
            return reason;
        }
        if data.len() > 2 {
            return format!("Reverted with data: {}", data);
        }
    }

    "execution reverted".to_string()
}
