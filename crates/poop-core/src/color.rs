//! Hue to colour conversion and the bounded per-degree colour cache.

use std::collections::HashMap;

use poop_host::Rgb;
use tracing::warn;

/// Number of integer hue buckets, and the cache's size bound.
pub const HUE_BUCKETS: usize = 360;

/// Standard HSV → RGB conversion (chroma, hue sector, match value).
///
/// `hue` is in degrees and wrapped into `[0, 360)`; `saturation` and `value`
/// are clamped into `[0, 1]`.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let h = hue.rem_euclid(360.0);
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    let chroma = v * s;
    let sector = h / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = v - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb::new(channel(r), channel(g), channel(b))
}

/// Integer bucket of a hue: nearest whole degree, wrapped into `0..360`.
#[inline]
pub fn hue_bucket(hue: f64) -> u16 {
    (hue.round() as i64).rem_euclid(HUE_BUCKETS as i64) as u16
}

/// Fully saturated colours keyed by whole hue degree.
#[derive(Debug, Clone, Default)]
pub struct HueColorCache {
    entries: HashMap<u16, Rgb>,
}

impl HueColorCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(HUE_BUCKETS),
        }
    }

    /// Colour of `hue`, computing and caching it on a miss.
    pub fn resolve(&mut self, hue: f64) -> Rgb {
        let bucket = hue_bucket(hue);
        if let Some(color) = self.entries.get(&bucket) {
            return *color;
        }
        if self.entries.len() >= HUE_BUCKETS {
            // Unreachable with 360 buckets, kept as a hard bound.
            warn!(len = self.entries.len(), "hue colour cache over capacity, clearing");
            self.entries.clear();
        }
        let color = hsv_to_rgb(f64::from(bucket), 1.0, 1.0);
        self.entries.insert(bucket, color);
        color
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_and_secondary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(60.0, 1.0, 1.0), Rgb::new(255, 255, 0));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(hsv_to_rgb(180.0, 1.0, 1.0), Rgb::new(0, 255, 255));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb::new(0, 0, 255));
        assert_eq!(hsv_to_rgb(300.0, 1.0, 1.0), Rgb::new(255, 0, 255));
    }

    #[test]
    fn intermediate_hue() {
        // 30° is halfway between red and yellow.
        assert_eq!(hsv_to_rgb(30.0, 1.0, 1.0), Rgb::new(255, 128, 0));
        assert_eq!(hsv_to_rgb(330.0, 1.0, 1.0), Rgb::new(255, 0, 128));
    }

    #[test]
    fn hue_wraps() {
        assert_eq!(hsv_to_rgb(360.0, 1.0, 1.0), hsv_to_rgb(0.0, 1.0, 1.0));
        assert_eq!(hsv_to_rgb(-60.0, 1.0, 1.0), hsv_to_rgb(300.0, 1.0, 1.0));
    }

    #[test]
    fn zero_saturation_is_grey() {
        assert_eq!(hsv_to_rgb(200.0, 0.0, 0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn bucket_rounds_and_wraps() {
        assert_eq!(hue_bucket(0.4), 0);
        assert_eq!(hue_bucket(0.5), 1);
        assert_eq!(hue_bucket(359.6), 0);
        assert_eq!(hue_bucket(180.2), 180);
    }

    #[test]
    fn cache_is_deterministic_and_bounded() {
        let mut cache = HueColorCache::new();
        assert!(cache.is_empty());
        let first = cache.resolve(42.3);
        assert_eq!(cache.resolve(41.7), first);
        assert_eq!(cache.len(), 1);
        for step in 0..3_600 {
            cache.resolve(step as f64 * 0.1);
        }
        assert_eq!(cache.len(), HUE_BUCKETS);
        assert_eq!(cache.resolve(42.0), first);
    }
}
