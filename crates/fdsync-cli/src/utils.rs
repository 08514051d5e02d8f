use std::{
    fmt::Display,
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use nu_ansi_term::Color;

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static PROGRESS: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn progress_enabled() -> bool {
    *PROGRESS.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn set_color(enabled: bool) {
    *COLOR.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub fn set_progress(enabled: bool) {
    *PROGRESS.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = *COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Renders the time since `then_ms` in its largest whole unit, e.g. `3h ago`.
/// `0` means never.
pub fn format_age(then_ms: i64, now_ms: i64) -> String {
    if then_ms <= 0 {
        return "never".to_string();
    }
    let secs = (now_ms - then_ms).max(0) / 1000;
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 60 * 60 => format!("{}m ago", s / 60),
        s if s < 24 * 60 * 60 => format!("{}h ago", s / (60 * 60)),
        s => format!("{}d ago", s / (24 * 60 * 60)),
    }
}

/// Whether a repository last synced at `updated_ms` is due under `interval`.
pub fn sync_due(updated_ms: i64, now_ms: i64, interval: Duration) -> bool {
    if interval == Duration::MAX {
        return false;
    }
    let elapsed = u64::try_from(now_ms.saturating_sub(updated_ms)).unwrap_or(0);
    updated_ms <= 0 || Duration::from_millis(elapsed) >= interval
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 60 * 60 * 1000;

    #[test]
    fn test_format_age() {
        let now = 1_700_000_000_000;
        assert_eq!(format_age(0, now), "never");
        assert_eq!(format_age(now - 5_000, now), "just now");
        assert_eq!(format_age(now - 3 * HOUR, now), "3h ago");
        assert_eq!(format_age(now - 50 * HOUR, now), "2d ago");
        assert_eq!(format_age(now + HOUR, now), "just now");
    }

    #[test]
    fn test_sync_due() {
        let now = 1_700_000_000_000;
        let three_hours = Duration::from_secs(3 * 60 * 60);
        assert!(sync_due(0, now, three_hours));
        assert!(sync_due(now - 4 * HOUR, now, three_hours));
        assert!(!sync_due(now - HOUR, now, three_hours));
        assert!(sync_due(now, now, Duration::ZERO));
        assert!(!sync_due(0, now, Duration::MAX));
    }
}
