use std::env::consts::ARCH;

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};

/// Feature every supported device is assumed to have.
pub const IMPLICIT_FEATURE: &str = "android.hardware.touchscreen";

pub const DEFAULT_API_LEVEL: u32 = 34;

/// Describes the device releases are checked against when choosing which
/// release of a product to suggest.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct DeviceProfile {
    /// Android API level of the device.
    /// Default: 34
    pub api_level: Option<u32>,

    /// Hardware and software features the device provides, e.g.
    /// "android.hardware.camera". The touchscreen feature is always implied.
    pub features: Option<Vec<String>>,

    /// Native ABIs the device can run, in order of preference.
    /// Default: derived from the host architecture
    pub platforms: Option<Vec<String>>,
}

impl DeviceProfile {
    pub fn host() -> Self {
        Self {
            api_level: Some(DEFAULT_API_LEVEL),
            features: Some(Vec::new()),
            platforms: Some(host_platforms()),
        }
    }

    pub fn api_level(&self) -> u32 {
        self.api_level.unwrap_or(DEFAULT_API_LEVEL)
    }

    /// Declared features plus [`IMPLICIT_FEATURE`], without duplicates.
    pub fn features(&self) -> Vec<String> {
        let mut features = self.features.clone().unwrap_or_default();
        if !features.iter().any(|f| f == IMPLICIT_FEATURE) {
            features.push(IMPLICIT_FEATURE.to_string());
        }
        features
    }

    pub fn platforms(&self) -> Vec<String> {
        match &self.platforms {
            Some(platforms) if !platforms.is_empty() => platforms.clone(),
            _ => host_platforms(),
        }
    }
}

/// Android ABI names the current build architecture can execute.
pub fn host_platforms() -> Vec<String> {
    let abis: &[&str] = match ARCH {
        "x86_64" => &["x86_64", "x86"],
        "x86" => &["x86"],
        "aarch64" => &["arm64-v8a", "armeabi-v7a", "armeabi"],
        "arm" => &["armeabi-v7a", "armeabi"],
        _ => &[],
    };
    abis.iter().map(|abi| abi.to_string()).collect()
}
