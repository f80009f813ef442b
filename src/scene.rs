use crate::{
    color::Color,
    error::{PlatemarkError, PlatemarkResult},
    geometry::{AspectRatio, Dimensions, PositionSpec},
};

/// Immutable description of one render job: target canvas, crop ratio and the
/// ordered layer stack (paint order = list order, back to front).
///
/// A `Scene` is built fresh from validated input for every render request and
/// consumed by both the preview compositor and the filter-graph compiler.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub canvas: Dimensions,
    pub aspect: AspectRatio,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Layer {
    Video(VideoLayer),
    Band(BandLayer),
    Icon(IconLayer),
    Line(LineLayer),
    Text(TextRun),
}

/// Treatment of the base media stream.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoLayer {
    /// Percent of the canvas the frame is scaled to occupy, 50..=100.
    #[serde(default = "default_video_scale")]
    pub scale_pct: f64,
    #[serde(default)]
    pub placement: VideoPlacement,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VideoPlacement {
    Top,
    #[default]
    Center,
    Bottom,
}

fn default_video_scale() -> f64 {
    100.0
}

impl Default for VideoLayer {
    fn default() -> Self {
        Self {
            scale_pct: default_video_scale(),
            placement: VideoPlacement::default(),
        }
    }
}

/// Full-width translucent black rectangle.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BandLayer {
    /// Band height as a percent of canvas height, 0..=100.
    pub height_pct: f64,
    /// Blend opacity percent, 0..=100.
    pub opacity: f64,
    #[serde(default)]
    pub anchor: BandAnchor,
    /// Free placement override; the band keeps its full width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<PixelOffset>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BandAnchor {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelOffset {
    pub x: i64,
    pub y: i64,
}

/// Brand icon, sized relative to the canvas and placed via percentage specs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IconLayer {
    /// Provider reference (relative path key), resolved at render time.
    pub asset: String,
    /// Target width as a percent of canvas width, (0, 100].
    pub width_pct: f64,
    /// Target height as a percent of canvas height; None keeps the icon's
    /// own aspect ratio from the resolved width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_pct: Option<f64>,
    pub x: PositionSpec,
    pub y: PositionSpec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineKind {
    Solid,
    Dashed,
    Gradient,
}

/// Decorative horizontal line pair flanking the icon bounds.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LineLayer {
    pub kind: LineKind,
    pub color: Color,
    /// Second gradient endpoint; required when kind is Gradient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_end: Option<Color>,
    #[serde(default = "default_line_thickness")]
    pub thickness: u32,
    /// Blend opacity percent, 0..=100.
    pub opacity: f64,
    pub y: PositionSpec,
}

fn default_line_thickness() -> u32 {
    5
}

/// Translucent box painted behind a text run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextBoxStyle {
    pub color: Color,
    /// Blend opacity percent, 0..=100.
    pub opacity: f64,
}

/// One line of styled text, optionally carrying inline color markup of the
/// form `<name>...</name>`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Font provider reference; None uses the built-in default family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    pub size_px: f64,
    #[serde(default)]
    pub color: Color,
    pub y: PositionSpec,
    /// Pixel delta applied after horizontal centering, -100..=100.
    #[serde(default)]
    pub x_offset_px: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxed: Option<TextBoxStyle>,
    #[serde(default)]
    pub outline: bool,
    #[serde(default)]
    pub shadow: bool,
}

impl Scene {
    /// Parse and fully validate a scene; invalid scenes are never constructed.
    pub fn from_json(json: &str) -> PlatemarkResult<Self> {
        let scene: Scene = serde_json::from_str(json)
            .map_err(|e| PlatemarkError::serde(format!("scene json: {e}")))?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn to_json(&self) -> PlatemarkResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlatemarkError::serde(format!("scene json: {e}")))
    }

    pub fn video(&self) -> Option<&VideoLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Video(v) => Some(v),
            _ => None,
        })
    }

    pub fn icon(&self) -> Option<&IconLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Icon(i) => Some(i),
            _ => None,
        })
    }

    /// First-violation range and structure checks. Layer order is preserved
    /// exactly as supplied; nothing is reordered or dropped.
    pub fn validate(&self) -> PlatemarkResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PlatemarkError::validation(
                "canvas width/height must be > 0",
            ));
        }
        if self.aspect.num == 0 || self.aspect.den == 0 {
            return Err(PlatemarkError::validation("aspect num/den must be > 0"));
        }

        let mut videos = 0usize;
        let mut icons = 0usize;
        for (idx, layer) in self.layers.iter().enumerate() {
            match layer {
                Layer::Video(v) => {
                    videos += 1;
                    if videos > 1 {
                        return Err(PlatemarkError::validation(
                            "at most one video layer is supported",
                        ));
                    }
                    if idx != 0 {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (video): must be the first layer"
                        )));
                    }
                    if !in_range(v.scale_pct, 50.0, 100.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (video): scale_pct must be within 50..=100"
                        )));
                    }
                }
                Layer::Band(b) => {
                    if !in_range(b.height_pct, 0.0, 100.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (band): height_pct must be within 0..=100"
                        )));
                    }
                    if !in_range(b.opacity, 0.0, 100.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (band): opacity must be within 0..=100"
                        )));
                    }
                }
                Layer::Icon(i) => {
                    icons += 1;
                    if icons > 1 {
                        return Err(PlatemarkError::validation(
                            "at most one icon layer is supported",
                        ));
                    }
                    if i.asset.trim().is_empty() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (icon): asset reference must be non-empty"
                        )));
                    }
                    if !in_range_open_low(i.width_pct, 0.0, 100.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (icon): width_pct must be within (0, 100]"
                        )));
                    }
                    if let Some(h) = i.height_pct
                        && !in_range_open_low(h, 0.0, 100.0)
                    {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (icon): height_pct must be within (0, 100]"
                        )));
                    }
                    if !i.x.in_range() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (icon): x must be within -100..=100"
                        )));
                    }
                    if !i.y.in_range() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (icon): y must be within -100..=100"
                        )));
                    }
                }
                Layer::Line(l) => {
                    if icons == 0 {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (line): requires an icon layer earlier in the scene"
                        )));
                    }
                    if l.thickness == 0 {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (line): thickness must be > 0"
                        )));
                    }
                    if !in_range(l.opacity, 0.0, 100.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (line): opacity must be within 0..=100"
                        )));
                    }
                    if !l.y.in_range() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (line): y must be within -100..=100"
                        )));
                    }
                    if l.kind == LineKind::Gradient && l.gradient_end.is_none() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (line): gradient lines require gradient_end"
                        )));
                    }
                }
                Layer::Text(t) => {
                    if t.text.is_empty() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): text must be non-empty"
                        )));
                    }
                    if t.text.contains('\n') {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): text must be a single line"
                        )));
                    }
                    if !(t.size_px.is_finite() && t.size_px > 0.0) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): size_px must be > 0"
                        )));
                    }
                    if !t.y.in_range() {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): y must be within -100..=100"
                        )));
                    }
                    if !(-100..=100).contains(&t.x_offset_px) {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): x_offset_px must be within -100..=100"
                        )));
                    }
                    if let Some(boxed) = &t.boxed
                        && !in_range(boxed.opacity, 0.0, 100.0)
                    {
                        return Err(PlatemarkError::validation(format!(
                            "layer {idx} (text): boxed.opacity must be within 0..=100"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn in_range(v: f64, lo: f64, hi: f64) -> bool {
    v.is_finite() && v >= lo && v <= hi
}

fn in_range_open_low(v: f64, lo: f64, hi: f64) -> bool {
    v.is_finite() && v > lo && v <= hi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_scene() -> Scene {
        Scene {
            canvas: Dimensions::new(1080, 1920),
            aspect: AspectRatio::VERTICAL,
            layers: vec![
                Layer::Video(VideoLayer::default()),
                Layer::Band(BandLayer {
                    height_pct: 15.0,
                    opacity: 70.0,
                    anchor: BandAnchor::Top,
                    offset: None,
                }),
                Layer::Icon(IconLayer {
                    asset: "logo.png".to_string(),
                    width_pct: 40.0,
                    height_pct: None,
                    x: PositionSpec(0.0),
                    y: PositionSpec(-75.0),
                }),
                Layer::Line(LineLayer {
                    kind: LineKind::Solid,
                    color: Color::rgb(255, 0, 0),
                    gradient_end: None,
                    thickness: 5,
                    opacity: 100.0,
                    y: PositionSpec(-50.0),
                }),
                Layer::Text(TextRun {
                    text: "fresh <red>drop</red>".to_string(),
                    font: None,
                    size_px: 48.0,
                    color: Color::WHITE,
                    y: PositionSpec(60.0),
                    x_offset_px: 0,
                    boxed: None,
                    outline: false,
                    shadow: false,
                }),
            ],
        }
    }

    #[test]
    fn json_roundtrip() {
        let scene = basic_scene();
        let s = scene.to_json().unwrap();
        let de = Scene::from_json(&s).unwrap();
        assert_eq!(de.canvas, scene.canvas);
        assert_eq!(de.layers.len(), scene.layers.len());
    }

    #[test]
    fn valid_scene_passes() {
        assert!(basic_scene().validate().is_ok());
    }

    #[test]
    fn validate_rejects_second_icon() {
        let mut scene = basic_scene();
        scene.layers.push(Layer::Icon(IconLayer {
            asset: "other.png".to_string(),
            width_pct: 10.0,
            height_pct: None,
            x: PositionSpec(0.0),
            y: PositionSpec(0.0),
        }));
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("at most one icon"), "{err}");
    }

    #[test]
    fn validate_rejects_line_before_icon() {
        let mut scene = basic_scene();
        scene.layers.swap(2, 3);
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("requires an icon layer"), "{err}");
    }

    #[test]
    fn validate_rejects_out_of_range_percentages() {
        let mut scene = basic_scene();
        if let Layer::Icon(icon) = &mut scene.layers[2] {
            icon.width_pct = 0.0;
        }
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("layer 2 (icon): width_pct"), "{err}");

        let mut scene = basic_scene();
        if let Layer::Band(band) = &mut scene.layers[1] {
            band.opacity = 140.0;
        }
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("layer 1 (band): opacity"), "{err}");
    }

    #[test]
    fn validate_rejects_multiline_text() {
        let mut scene = basic_scene();
        if let Layer::Text(run) = &mut scene.layers[4] {
            run.text = "two\nlines".to_string();
        }
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("single line"), "{err}");
    }

    #[test]
    fn validate_rejects_video_after_other_layers() {
        let mut scene = basic_scene();
        scene.layers.swap(0, 1);
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("must be the first layer"), "{err}");
    }

    #[test]
    fn validate_rejects_gradient_without_endpoint() {
        let mut scene = basic_scene();
        if let Layer::Line(line) = &mut scene.layers[3] {
            line.kind = LineKind::Gradient;
        }
        let err = scene.validate().unwrap_err().to_string();
        assert!(err.contains("gradient_end"), "{err}");
    }

    #[test]
    fn from_json_validates() {
        let json = r#"{
            "canvas": {"width": 1080, "height": 1920},
            "aspect": "9:16",
            "layers": [{"Band": {"height_pct": 300.0, "opacity": 50.0}}]
        }"#;
        assert!(Scene::from_json(json).is_err());
    }
}
