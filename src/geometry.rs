use crate::error::{PlatemarkError, PlatemarkResult};

/// Canvas or element size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// Uniformly scaled copy, rounded, never collapsing below 1x1.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            width: ((f64::from(self.width) * factor).round() as u32).max(1),
            height: ((f64::from(self.height) * factor).round() as u32).max(1),
        }
    }
}

/// Target width:height ratio used to crop a source frame before scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    pub num: u32,
    pub den: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio { num: 1, den: 1 };
    pub const VERTICAL: AspectRatio = AspectRatio { num: 9, den: 16 };
    pub const WIDESCREEN: AspectRatio = AspectRatio { num: 16, den: 9 };

    pub fn new(num: u32, den: u32) -> PlatemarkResult<Self> {
        if num == 0 || den == 0 {
            return Err(PlatemarkError::validation(
                "aspect ratio num/den must be > 0",
            ));
        }
        Ok(Self { num, den })
    }

    pub fn ratio(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }
}

impl serde::Serialize for AspectRatio {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{}:{}", self.num, self.den))
    }
}

impl<'de> serde::Deserialize<'de> for AspectRatio {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Pair { num: u32, den: u32 },
            Arr(Vec<u32>),
        }

        let (num, den) = match Repr::deserialize(deserializer)? {
            Repr::Text(s) => parse_ratio_text(&s).map_err(serde::de::Error::custom)?,
            Repr::Pair { num, den } => (num, den),
            Repr::Arr(v) => {
                if v.len() == 2 {
                    (v[0], v[1])
                } else {
                    return Err(serde::de::Error::custom(
                        "aspect ratio array must have len 2 ([num, den])",
                    ));
                }
            }
        };
        AspectRatio::new(num, den).map_err(serde::de::Error::custom)
    }
}

fn parse_ratio_text(s: &str) -> Result<(u32, u32), String> {
    let mut parts = s.trim().split(':');
    let bad = || format!("aspect ratio must be \"W:H\" with positive integers, got \"{s}\"");
    let num = parts
        .next()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .ok_or_else(bad)?;
    let den = parts
        .next()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok((num, den))
}

/// Signed placement percentage in [-100, 100].
///
/// 0 centers the element; -100 pins it flush to the leading edge (top/left);
/// +100 flush to the trailing edge; values in between interpolate linearly
/// over the free space (extent minus element extent).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PositionSpec(pub f64);

impl PositionSpec {
    pub const CENTERED: PositionSpec = PositionSpec(0.0);

    pub fn new(percent: f64) -> Self {
        Self(percent)
    }

    pub fn in_range(&self) -> bool {
        self.0.is_finite() && (-100.0..=100.0).contains(&self.0)
    }
}

/// Centered sub-rectangle of a source frame, in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(source: Dimensions) -> Self {
        Self {
            x: 0,
            y: 0,
            width: source.width,
            height: source.height,
        }
    }
}

/// Ratios closer than this are treated as already matching (no crop).
const ASPECT_TOLERANCE: f64 = 1e-6;

/// Pixel offset of an element along one axis of its containing extent.
///
/// `floor((E-X)/2 + spec/100 * (E-X)/2)`. No clamping: when the element is
/// larger than the extent the result goes negative and the caller accepts the
/// overhang.
pub fn resolve_offset(spec: PositionSpec, extent: u32, element_extent: u32) -> i64 {
    let half = (f64::from(extent) - f64::from(element_extent)) / 2.0;
    (half + spec.0 / 100.0 * half).floor() as i64
}

/// Largest centered rectangle of the requested ratio that fits in the source.
///
/// Wider sources are trimmed left/right symmetrically, taller sources
/// top/bottom. Sources already at the requested ratio (within tolerance) come
/// back uncropped.
pub fn resolve_crop(source: Dimensions, ratio: f64) -> CropRect {
    if source.width == 0 || source.height == 0 || ratio <= 0.0 {
        return CropRect::full(source);
    }

    let sw = f64::from(source.width);
    let sh = f64::from(source.height);
    if (sw / sh - ratio).abs() <= ASPECT_TOLERANCE {
        return CropRect::full(source);
    }

    if sw / sh > ratio {
        let crop_w = ((ratio * sh).round() as u32).clamp(1, source.width);
        CropRect {
            x: (source.width - crop_w) / 2,
            y: 0,
            width: crop_w,
            height: source.height,
        }
    } else {
        let crop_h = ((sw / ratio).round() as u32).clamp(1, source.height);
        CropRect {
            x: 0,
            y: (source.height - crop_h) / 2,
            width: source.width,
            height: crop_h,
        }
    }
}

/// Uniform factor that fits `content` inside `bounds` without upscaling.
pub fn fit_scale(content: Dimensions, bounds: Dimensions) -> f64 {
    if content.width == 0 || content.height == 0 {
        return 1.0;
    }
    let sx = f64::from(bounds.width) / f64::from(content.width);
    let sy = f64::from(bounds.height) / f64::from(content.height);
    sx.min(sy).min(1.0)
}

/// Percentage of an extent in whole pixels. Both render paths size bands,
/// icons, and line segments through this so they agree on rounding.
pub fn pct_px(extent: u32, pct: f64) -> u32 {
    (f64::from(extent) * pct / 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_center_and_extremes() {
        for (extent, element) in [(1000u32, 400u32), (1920, 500), (10, 4)] {
            let free = i64::from(extent) - i64::from(element);
            assert_eq!(
                resolve_offset(PositionSpec(0.0), extent, element),
                free / 2
            );
            assert_eq!(resolve_offset(PositionSpec(-100.0), extent, element), 0);
            assert_eq!(resolve_offset(PositionSpec(100.0), extent, element), free);
        }
    }

    #[test]
    fn offset_floors_fractional_midpoints() {
        // free space 5 -> half 2.5, spec 0 floors to 2, spec 50 floors 3.75 to 3.
        assert_eq!(resolve_offset(PositionSpec(0.0), 10, 5), 2);
        assert_eq!(resolve_offset(PositionSpec(50.0), 10, 5), 3);
    }

    #[test]
    fn offset_allows_overhang() {
        assert_eq!(resolve_offset(PositionSpec(0.0), 100, 150), -25);
    }

    #[test]
    fn crop_trims_wider_sources_symmetrically() {
        let rect = resolve_crop(Dimensions::new(200, 100), 1.0);
        assert_eq!(
            rect,
            CropRect {
                x: 50,
                y: 0,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn crop_trims_taller_sources_symmetrically() {
        let rect = resolve_crop(Dimensions::new(100, 200), 1.0);
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 50,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn crop_is_identity_for_matching_ratios() {
        let src = Dimensions::new(1080, 1920);
        assert_eq!(
            resolve_crop(src, AspectRatio::VERTICAL.ratio()),
            CropRect::full(src)
        );
        // Within tolerance counts as matching.
        assert_eq!(resolve_crop(src, 0.5625 + 1e-9), CropRect::full(src));
    }

    #[test]
    fn crop_ratio_is_within_one_pixel_and_inside_source() {
        let src = Dimensions::new(1920, 1080);
        let ratio = AspectRatio::VERTICAL.ratio();
        let rect = resolve_crop(src, ratio);
        assert!(rect.width <= src.width && rect.height <= src.height);
        let err = f64::from(rect.width) - ratio * f64::from(rect.height);
        assert!(err.abs() <= 1.0);
    }

    #[test]
    fn fit_scale_never_upscales() {
        let bounds = Dimensions::new(1000, 1000);
        assert_eq!(fit_scale(Dimensions::new(2000, 1000), bounds), 0.5);
        assert_eq!(fit_scale(Dimensions::new(500, 500), bounds), 1.0);
    }

    #[test]
    fn pct_px_rounds_to_nearest_pixel() {
        assert_eq!(pct_px(1000, 40.0), 400);
        assert_eq!(pct_px(1920, 15.0), 288);
        assert_eq!(pct_px(1080, 40.0), 432);
        assert_eq!(pct_px(3, 50.0), 2);
    }

    #[test]
    fn aspect_ratio_accepts_text_pair_and_array() {
        let a: AspectRatio = serde_json::from_str("\"9:16\"").unwrap();
        assert_eq!(a, AspectRatio::VERTICAL);

        let a: AspectRatio = serde_json::from_str("{\"num\": 16, \"den\": 9}").unwrap();
        assert_eq!(a, AspectRatio::WIDESCREEN);

        let a: AspectRatio = serde_json::from_str("[1, 1]").unwrap();
        assert_eq!(a, AspectRatio::SQUARE);

        assert!(serde_json::from_str::<AspectRatio>("\"16x9\"").is_err());
        assert!(serde_json::from_str::<AspectRatio>("\"0:9\"").is_err());
    }

    #[test]
    fn aspect_ratio_serializes_as_text() {
        let s = serde_json::to_string(&AspectRatio::VERTICAL).unwrap();
        assert_eq!(s, "\"9:16\"");
    }

    #[test]
    fn scaled_dimensions_round_and_stay_positive() {
        let d = Dimensions::new(1080, 1920).scaled(0.33);
        assert_eq!(d, Dimensions::new(356, 634));
        assert_eq!(Dimensions::new(1, 1).scaled(0.01), Dimensions::new(1, 1));
    }
}
