//! Release compatibility and suggested release selection.

use std::collections::HashSet;

use fdsync_config::device::DeviceProfile;

use crate::model::{Incompatibility, Product, Release};

/// What the device the catalog is evaluated for supports.
pub trait HostEnvironment: Send + Sync {
    fn supported_features(&self) -> HashSet<String>;

    fn supported_platforms(&self) -> HashSet<String>;

    fn device_api_level(&self) -> i32;
}

impl HostEnvironment for DeviceProfile {
    fn supported_features(&self) -> HashSet<String> {
        self.features().into_iter().collect()
    }

    fn supported_platforms(&self) -> HashSet<String> {
        self.platforms().into_iter().collect()
    }

    fn device_api_level(&self) -> i32 {
        i32::try_from(self.api_level()).unwrap_or(i32::MAX)
    }
}

/// Host capabilities captured once per sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub api_level: i32,
    pub features: HashSet<String>,
    pub platforms: HashSet<String>,
}

impl DeviceSnapshot {
    pub fn capture(host: &dyn HostEnvironment) -> Self {
        Self {
            api_level: host.device_api_level(),
            features: host.supported_features(),
            platforms: host.supported_platforms(),
        }
    }

    /// Reasons `release` cannot run here, in a fixed order.
    pub fn incompatibilities(&self, release: &Release) -> Vec<Incompatibility> {
        let mut reasons = Vec::new();
        if release.min_sdk_version > 0 && self.api_level < release.min_sdk_version {
            reasons.push(Incompatibility::MinSdk);
        }
        if release.max_sdk_version > 0 && self.api_level > release.max_sdk_version {
            reasons.push(Incompatibility::MaxSdk);
        }
        if !release.platforms.is_empty()
            && !release
                .platforms
                .iter()
                .any(|platform| self.platforms.contains(platform))
        {
            reasons.push(Incompatibility::Platform);
        }

        let mut missing: Vec<&String> = release
            .features
            .iter()
            .filter(|feature| !self.features.contains(*feature))
            .collect();
        missing.sort();
        missing.dedup();
        reasons.extend(
            missing
                .into_iter()
                .map(|feature| Incompatibility::Feature(feature.clone())),
        );
        reasons
    }
}

/// Normalizes the releases of `product` and marks the one to suggest.
///
/// Releases are deduplicated by identifier keeping the first, ordered by
/// version code with the newest first, and annotated with their
/// incompatibilities. A release is eligible when unstable releases are
/// allowed, the product suggests no version, or it is not newer than the
/// suggested one. The first compatible eligible release is selected, or the
/// first eligible one when none is compatible.
pub fn transform(mut product: Product, device: &DeviceSnapshot, allow_unstable: bool) -> Product {
    let mut seen = HashSet::new();
    let mut releases: Vec<Release> = std::mem::take(&mut product.releases)
        .into_iter()
        .filter(|release| seen.insert(release.identifier()))
        .collect();
    releases.sort_by(|a, b| b.version_code.cmp(&a.version_code));

    for release in &mut releases {
        release.incompatibilities = device.incompatibilities(release);
        release.selected = false;
    }

    let suggested = product.suggested_version_code;
    let eligible = |release: &Release| {
        allow_unstable || suggested <= 0 || release.version_code <= suggested
    };
    let selected = releases
        .iter()
        .position(|release| eligible(release) && release.incompatibilities.is_empty())
        .or_else(|| releases.iter().position(eligible));
    if let Some(index) = selected {
        releases[index].selected = true;
    }

    product.releases = releases;
    product
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceSnapshot {
        DeviceSnapshot {
            api_level: 28,
            features: ["android.hardware.touchscreen".to_string()].into(),
            platforms: ["arm64-v8a".to_string(), "armeabi-v7a".to_string()].into(),
        }
    }

    fn release(code: i64, hash: &str) -> Release {
        Release {
            version_code: code,
            hash: hash.into(),
            ..Default::default()
        }
    }

    fn product(releases: Vec<Release>, suggested: i64) -> Product {
        Product {
            suggested_version_code: suggested,
            releases,
            ..Product::new(1, "org.example")
        }
    }

    fn selected_code(product: &Product) -> Option<i64> {
        product.selected_release().map(|r| r.version_code)
    }

    #[test]
    fn test_incompatibility_order() {
        let many = Release {
            min_sdk_version: 30,
            max_sdk_version: 0,
            platforms: vec!["x86".into()],
            features: vec![
                "android.hardware.nfc".into(),
                "android.hardware.camera".into(),
                "android.hardware.touchscreen".into(),
            ],
            ..release(1, "a")
        };
        assert_eq!(
            device().incompatibilities(&many),
            vec![
                Incompatibility::MinSdk,
                Incompatibility::Platform,
                Incompatibility::Feature("android.hardware.camera".into()),
                Incompatibility::Feature("android.hardware.nfc".into()),
            ]
        );

        let old = Release {
            max_sdk_version: 27,
            ..release(1, "b")
        };
        assert_eq!(device().incompatibilities(&old), vec![Incompatibility::MaxSdk]);

        let fine = Release {
            min_sdk_version: 28,
            max_sdk_version: 28,
            platforms: vec!["armeabi-v7a".into()],
            ..release(1, "c")
        };
        assert!(device().incompatibilities(&fine).is_empty());
    }

    #[test]
    fn test_dedupe_and_sort() {
        let mut first = release(2, "x");
        first.version = "first".into();
        let mut second = release(2, "x");
        second.version = "second".into();

        let result = transform(
            product(vec![release(1, "a"), first, release(3, "b"), second], 0),
            &device(),
            false,
        );
        let codes: Vec<i64> = result.releases.iter().map(|r| r.version_code).collect();
        assert_eq!(codes, vec![3, 2, 1]);
        assert_eq!(result.releases[1].version, "first");
    }

    #[test]
    fn test_selects_newest_compatible_within_suggested() {
        let incompatible = Release {
            min_sdk_version: 33,
            ..release(4, "d")
        };
        let result = transform(
            product(
                vec![release(5, "e"), incompatible, release(3, "c"), release(2, "b")],
                4,
            ),
            &device(),
            false,
        );
        assert_eq!(selected_code(&result), Some(3));
        assert_eq!(result.releases.iter().filter(|r| r.selected).count(), 1);
    }

    #[test]
    fn test_allow_unstable() {
        let result = transform(
            product(vec![release(3, "c"), release(5, "e")], 3),
            &device(),
            true,
        );
        assert_eq!(selected_code(&result), Some(5));
    }

    #[test]
    fn test_falls_back_to_first_eligible() {
        let releases = vec![
            Release {
                min_sdk_version: 40,
                ..release(2, "b")
            },
            Release {
                min_sdk_version: 40,
                ..release(1, "a")
            },
        ];
        let result = transform(product(releases, 0), &device(), false);
        assert_eq!(selected_code(&result), Some(2));
        assert!(!result.compatible());
    }

    #[test]
    fn test_nothing_eligible() {
        let result = transform(product(vec![release(9, "z")], 3), &device(), false);
        assert_eq!(selected_code(&result), None);
        assert!(result.releases.iter().all(|r| !r.selected));

        let empty = transform(product(Vec::new(), 0), &device(), false);
        assert!(empty.releases.is_empty());
    }

    #[test]
    fn test_clears_stale_selection() {
        let stale = Release {
            selected: true,
            ..release(1, "a")
        };
        let result = transform(product(vec![stale, release(2, "b")], 0), &device(), false);
        let flags: Vec<bool> = result.releases.iter().map(|r| r.selected).collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_device_profile_environment() {
        let profile = DeviceProfile {
            api_level: Some(30),
            features: Some(vec!["android.hardware.camera".into()]),
            platforms: Some(vec!["x86_64".into()]),
        };
        let snapshot = DeviceSnapshot::capture(&profile);
        assert_eq!(snapshot.api_level, 30);
        assert!(snapshot.features.contains("android.hardware.touchscreen"));
        assert!(snapshot.features.contains("android.hardware.camera"));
        assert_eq!(snapshot.platforms, ["x86_64".to_string()].into());
    }
}
