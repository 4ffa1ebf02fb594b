// Utility functions
// ----------------
// Common utility functions for the protocol library

use std::time::{SystemTime, UNIX_EPOCH};
use std::net::IpAddr;
use std::str::FromStr;

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0) // Fallback to 0 if system time is before epoch (unlikely but safe)
}

/// Validate if a string is a valid IP address
pub fn is_valid_ip(ip_str: &str) -> bool {
    IpAddr::from_str(ip_str).is_ok()
}

/// Extract IP address from various formats
pub fn extract_ip(input: &str) -> Option<String> {
    // Try to extract IP from formats like "192.168.1.1:8080"
    if let Some(colon_pos) = input.find(':') {
        let ip_part = &input[..colon_pos];
        if is_valid_ip(ip_part) {
            return Some(ip_part.to_string());
        }
    }
    
    // Try the input as-is
    if is_valid_ip(input) {
        return Some(input.to_string());
    }
    
    None
}

/// Sanitize string for logging (remove potentially dangerous characters)
pub fn sanitize_for_log(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_control() {
                '.'
            } else {
                c
            }
        })
        .collect()
}

/// Extract domain from URL
pub fn extract_domain(url: &str) -> Option<String> {
    if let Ok(parsed_url) = url::Url::parse(url) {
        parsed_url.host_str().map(|s| s.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ip() {
        assert!(is_valid_ip("192.168.1.1"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("invalid.ip"));
    }

    #[test]
    fn test_extract_ip() {
        assert_eq!(extract_ip("192.168.1.1:8080"), Some("192.168.1.1".to_string()));
        assert_eq!(extract_ip("192.168.1.1"), Some("192.168.1.1".to_string()));
        assert_eq!(extract_ip("invalid"), None);
    }

}
