use crate::error::{ModelError, Result};

/// Parses a Kubernetes-style capacity string (`"1Gi"`, `"512Mi"`, `"2G"`, `"100"`)
/// into a byte count. Used for PersistentVolume/Claim capacity (spec.md §3:
/// "capacity string parses to bytes").
pub fn parse_capacity(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ModelError::InvalidCapacity(s.to_string()));
    }

    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split_at);
    let value: u64 = digits
        .parse()
        .map_err(|_| ModelError::InvalidCapacity(s.to_string()))?;

    let multiplier: u64 = match suffix {
        "" | "B" => 1,
        "K" => 1_000,
        "Ki" => 1024,
        "M" => 1_000_000,
        "Mi" => 1024 * 1024,
        "G" => 1_000_000_000,
        "Gi" => 1024 * 1024 * 1024,
        "T" => 1_000_000_000_000,
        "Ti" => 1024_u64.pow(4),
        _ => return Err(ModelError::InvalidCapacity(s.to_string())),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| ModelError::InvalidCapacity(s.to_string()))
}

/// Renders a byte count back into the largest whole binary unit, for display.
pub fn format_capacity(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1024_u64.pow(4), "Ti"),
        (1024 * 1024 * 1024, "Gi"),
        (1024 * 1024, "Mi"),
        (1024, "Ki"),
    ];
    for (unit, suffix) in UNITS {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_suffixes() {
        assert_eq!(parse_capacity("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_capacity("512Mi").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_capacity("100").unwrap(), 100);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_capacity("").is_err());
        assert!(parse_capacity("Gi").is_err());
        assert!(parse_capacity("1Xi").is_err());
    }

    #[test]
    fn round_trips_common_sizes() {
        assert_eq!(format_capacity(parse_capacity("1Gi").unwrap()), "1Gi");
    }
}
