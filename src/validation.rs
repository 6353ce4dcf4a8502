//! Input predicates applied before any network interaction

use serde_json::Value;

/// Length of a `0x`-prefixed 20-byte hex address
pub const ADDRESS_LEN: usize = 42;

/// Checks that an address has 42 characters and a `0x` prefix
///
/// Hex content and checksum casing are not inspected; see
/// [`is_valid_hex_address`] for the strict form.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN && address.starts_with("0x")
}

/// Checks the address shape and that the 40 trailing characters are hex digits
pub fn is_valid_hex_address(address: &str) -> bool {
    is_valid_address(address) && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checks that a value is a JSON number strictly greater than zero
///
/// Numeric strings such as `"1000"` are rejected.
pub fn is_valid_value(value: &Value) -> bool {
    value
        .as_f64()
        .map(|v| v.is_finite() && v > 0.0)
        .unwrap_or(false)
}
