// ============================================================================
// File: src/resources.rs
// System resource probing (RAM, CPU, GPU inventory)
// ============================================================================

use std::process::Command;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{debug, warn};

const BYTES_PER_GB: f64 = 1_073_741_824.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_gb: f64,
    /// Percent
    pub utilization: f64,
}

/// Hardware as seen at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub ram_gb: f64,
    pub cpu_count: usize,
    pub cpu_freq_ghz: f64,
    pub gpus: Vec<GpuInfo>,
}

pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> ResourceSnapshot;
}

/// Reads RAM and CPU through sysinfo and NVIDIA GPUs through `nvidia-smi`
#[derive(Debug, Default)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        let mut sys = System::new_all();
        sys.refresh_all();

        let ram_gb = sys.total_memory() as f64 / BYTES_PER_GB;
        let cpu_count = sys.cpus().len();
        let cpu_freq_mhz = sys.cpus().iter().map(|c| c.frequency()).max().unwrap_or(0);

        let snapshot = ResourceSnapshot {
            ram_gb,
            cpu_count,
            cpu_freq_ghz: cpu_freq_mhz as f64 / 1000.0,
            gpus: detect_nvidia_gpus(),
        };

        debug!(
            ram_gb = snapshot.ram_gb,
            cpus = snapshot.cpu_count,
            gpus = snapshot.gpus.len(),
            "Captured resource snapshot"
        );
        snapshot
    }
}

fn detect_nvidia_gpus() -> Vec<GpuInfo> {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total,utilization.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            warn!(status = %output.status, "nvidia-smi failed, GPU detection disabled");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "nvidia-smi not available, GPU detection disabled");
            Vec::new()
        }
    }
}

/// Parse `name, memory MiB, utilization %` rows; malformed rows are skipped
pub fn parse_nvidia_smi(output: &str) -> Vec<GpuInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.rsplitn(3, ',').map(str::trim);
            let utilization = fields.next()?.parse::<f64>().ok()?;
            let memory_mib = fields.next()?.parse::<f64>().ok()?;
            let name = fields.next()?;
            if name.is_empty() {
                return None;
            }
            Some(GpuInfo {
                name: name.to_string(),
                memory_gb: memory_mib / 1024.0,
                utilization,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nvidia_smi_rows() {
        let output = "NVIDIA GeForce RTX 4090, 24564, 3\nTesla T4, 15360, 87\n";
        let gpus = parse_nvidia_smi(output);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].name, "NVIDIA GeForce RTX 4090");
        assert!((gpus[0].memory_gb - 23.988).abs() < 0.01);
        assert_eq!(gpus[1].utilization, 87.0);
        assert_eq!(gpus[1].memory_gb, 15.0);
    }

    #[test]
    fn skips_malformed_rows() {
        let output = "garbage\nGPU, [N/A], 0\n, 8192, 0\nRTX, 8192, 10\n";
        let gpus = parse_nvidia_smi(output);
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].memory_gb, 8.0);
    }

    #[test]
    fn name_may_contain_commas() {
        let gpus = parse_nvidia_smi("Vendor, Model X, 4096, 50");
        assert_eq!(gpus[0].name, "Vendor, Model X");
        assert_eq!(gpus[0].memory_gb, 4.0);
    }
}
