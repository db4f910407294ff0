//! Health metric calculator — turns raw guest telemetry into a short
//! report with memory/swap pressure and a thrashing warning.

use serde_json::Value;

use pvegate_core::guest::GuestKind;

/// Usage percentage at which memory or swap counts as under pressure.
pub const PRESSURE_THRESHOLD: u64 = 90;

const GB: f64 = 1e9;
const MB: f64 = 1e6;

/// One telemetry fetch for a guest. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub status: Option<String>,
    pub mem: Option<u64>,
    pub maxmem: Option<u64>,
    pub swap: Option<u64>,
    pub maxswap: Option<u64>,
    pub diskread: Option<u64>,
    pub diskwrite: Option<u64>,
    pub uptime: Option<u64>,
}

impl HealthSnapshot {
    /// Read a snapshot from the `data` object of a `status/current` reply.
    ///
    /// Missing, negative, or non-numeric fields are treated as absent.
    pub fn from_data(data: &Value) -> Self {
        Self {
            status: data.get("status").and_then(Value::as_str).map(str::to_string),
            mem: field_u64(data, "mem"),
            maxmem: field_u64(data, "maxmem"),
            swap: field_u64(data, "swap"),
            maxswap: field_u64(data, "maxswap"),
            diskread: field_u64(data, "diskread"),
            diskwrite: field_u64(data, "diskwrite"),
            uptime: field_u64(data, "uptime"),
        }
    }

    /// Memory usage in whole percent; 0 when `maxmem` is zero or absent.
    pub fn memory_percent(&self) -> u64 {
        percent(self.mem.unwrap_or(0), self.maxmem.unwrap_or(0)).unwrap_or(0)
    }

    /// Swap usage in whole percent; `None` when the guest has no swap.
    pub fn swap_percent(&self) -> Option<u64> {
        percent(self.swap.unwrap_or(0), self.maxswap.unwrap_or(0))
    }

    /// Thrashing warning, if memory or swap is at or above the threshold.
    pub fn thrashing_warning(&self) -> Option<String> {
        let mut reasons = Vec::new();

        let mem_pct = self.memory_percent();
        if mem_pct >= PRESSURE_THRESHOLD {
            reasons.push(format!("high memory ({}%)", mem_pct));
        }
        if let Some(swap_pct) = self.swap_percent().filter(|p| *p >= PRESSURE_THRESHOLD) {
            reasons.push(format!("swap nearly full ({}%)", swap_pct));
        }

        if reasons.is_empty() {
            None
        } else {
            Some(format!("⚠️ Thrashing risk: {}", reasons.join(" and ")))
        }
    }
}

fn field_u64(data: &Value, key: &str) -> Option<u64> {
    let value = data.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

fn percent(used: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some((used as f64 / total as f64 * 100.0).round() as u64)
}

/// Human-readable byte count.
///
/// `>= 1e9` renders as GB and `>= 1e6` as MB, both decimal with one
/// decimal place. Anything smaller renders as whole KB: bytes / 1024,
/// rounded to nearest (so 999 is "1 KB" and 999_999 is "977 KB").
pub fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= GB {
        format!("{:.1} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{} KB", (b / 1024.0).round() as u64)
    }
}

/// Build the fixed-order health report for one guest.
pub fn summarize(snapshot: &HealthSnapshot, vmid: &str, node: &str, kind: GuestKind) -> String {
    let mut lines = vec![format!(
        "VMID {} ({}) on {} — {}",
        vmid,
        kind,
        node,
        snapshot.status.as_deref().unwrap_or("unknown")
    )];

    lines.push(format!(
        "Memory: {} / {} ({}%)",
        format_bytes(snapshot.mem.unwrap_or(0)),
        format_bytes(snapshot.maxmem.unwrap_or(0)),
        snapshot.memory_percent()
    ));

    if let Some(swap_pct) = snapshot.swap_percent() {
        lines.push(format!(
            "Swap: {} / {} ({}%)",
            format_bytes(snapshot.swap.unwrap_or(0)),
            format_bytes(snapshot.maxswap.unwrap_or(0)),
            swap_pct
        ));
    }

    lines.push(format!(
        "Disk I/O: read {}, write {}",
        format_bytes(snapshot.diskread.unwrap_or(0)),
        format_bytes(snapshot.diskwrite.unwrap_or(0))
    ));

    if let Some(uptime) = snapshot.uptime.filter(|s| *s > 0) {
        lines.push(format!("Uptime: {}h", uptime / 3600));
    }

    if let Some(warning) = snapshot.thrashing_warning() {
        lines.push(warning);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_bytes_tiers() {
        assert_eq!(format_bytes(0), "0 KB");
        assert_eq!(format_bytes(999), "1 KB");
        assert_eq!(format_bytes(999_999), "977 KB");
        assert_eq!(format_bytes(1_500_000), "1.5 MB");
        assert_eq!(format_bytes(2_000_000_000), "2.0 GB");
    }

    #[test]
    fn test_format_bytes_boundaries() {
        assert_eq!(format_bytes(1_000_000), "1.0 MB");
        assert_eq!(format_bytes(1_000_000_000), "1.0 GB");
        assert_eq!(format_bytes(999_999_999), "1000.0 MB");
    }

    #[test]
    fn test_memory_percent() {
        let snap = HealthSnapshot {
            mem: Some(900),
            maxmem: Some(1000),
            ..Default::default()
        };
        assert_eq!(snap.memory_percent(), 90);
        assert_eq!(snap.thrashing_warning().unwrap(), "⚠️ Thrashing risk: high memory (90%)");

        let empty = HealthSnapshot {
            mem: Some(500),
            maxmem: Some(0),
            ..Default::default()
        };
        assert_eq!(empty.memory_percent(), 0);
        assert!(empty.thrashing_warning().is_none());
    }

    #[test]
    fn test_swap_omitted_without_maxswap() {
        let snap = HealthSnapshot {
            status: Some("running".into()),
            mem: Some(100),
            maxmem: Some(1000),
            swap: Some(5_000_000),
            maxswap: Some(0),
            ..Default::default()
        };
        assert_eq!(snap.swap_percent(), None);
        let report = summarize(&snap, "101", "pve", GuestKind::Container);
        assert!(!report.contains("Swap"));
        assert!(snap.thrashing_warning().is_none());
    }

    #[test]
    fn test_both_warnings_joined() {
        let snap = HealthSnapshot {
            mem: Some(95),
            maxmem: Some(100),
            swap: Some(92),
            maxswap: Some(100),
            ..Default::default()
        };
        assert_eq!(
            snap.thrashing_warning().unwrap(),
            "⚠️ Thrashing risk: high memory (95%) and swap nearly full (92%)"
        );

        let swap_only = HealthSnapshot {
            mem: Some(10),
            maxmem: Some(100),
            swap: Some(90),
            maxswap: Some(100),
            ..Default::default()
        };
        assert_eq!(
            swap_only.thrashing_warning().unwrap(),
            "⚠️ Thrashing risk: swap nearly full (90%)"
        );
    }

    #[test]
    fn test_full_report_order() {
        let data = json!({
            "status": "running",
            "mem": 2_147_483_648u64,
            "maxmem": 4_294_967_296u64,
            "swap": 268_435_456u64,
            "maxswap": 536_870_912u64,
            "diskread": 1_500_000,
            "diskwrite": 512,
            "uptime": 7_300
        });
        let report = summarize(&HealthSnapshot::from_data(&data), "200", "node2", GuestKind::Vm);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "VMID 200 (vm) on node2 — running",
                "Memory: 2.1 GB / 4.3 GB (50%)",
                "Swap: 268.4 MB / 536.9 MB (50%)",
                "Disk I/O: read 1.5 MB, write 1 KB",
                "Uptime: 2h",
            ]
        );
    }

    #[test]
    fn test_missing_fields_are_tolerated() {
        let snap = HealthSnapshot::from_data(&json!({"mem": -3, "maxmem": "lots", "uptime": 0}));
        assert_eq!(snap.mem, None);
        assert_eq!(snap.maxmem, None);
        assert_eq!(snap.uptime, Some(0));

        let report = summarize(&snap, "1", "pve", GuestKind::Container);
        assert_eq!(
            report,
            "VMID 1 (container) on pve — unknown\nMemory: 0 KB / 0 KB (0%)\nDisk I/O: read 0 KB, write 0 KB"
        );
    }
}
