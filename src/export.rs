//! Export: rasterize the concept map and package it for download
//!
//! The graph is drawn onto an RGB canvas sized to its bounding box, then
//! either encoded as a JPEG or wrapped in a single-page PDF whose page matches
//! the image's dimensions.

use crate::graph::{Graph, Node, StatusClass};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Rendered node box, in canvas units
pub const NODE_WIDTH: f64 = 150.0;
pub const NODE_HEIGHT: f64 = 40.0;
const MARGIN: f64 = 20.0;
const FONT_SIZE: f32 = 12.0;
/// Refuse to allocate canvases beyond this many pixels per side
const MAX_SIDE: u32 = 16_384;
/// Refuse canvases beyond this many pixels in total (120 MB of RGB)
const MAX_PIXELS: f64 = 40_000_000.0;

const NODE_FILL: Rgb<u8> = Rgb([255, 255, 255]);
const EDGE_COLOR: Rgb<u8> = Rgb([177, 177, 183]);
const TEXT_COLOR: Rgb<u8> = Rgb([34, 34, 34]);
pub const UNCHECKED_COLOR: Rgb<u8> = Rgb([26, 25, 43]);
pub const VERIFIED_COLOR: Rgb<u8> = Rgb([22, 163, 74]);
pub const UNVERIFIED_COLOR: Rgb<u8> = Rgb([202, 138, 4]);

/// Errors from rendering and packaging
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to capture: the concept map is empty")]
    EmptyCapture,

    #[error("capture too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("PDF assembly failed: {0}")]
    Pdf(String),

    #[error("cannot load label font: {0}")]
    Font(String),
}

/// Artifact kinds offered for download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Jpeg,
}

impl ExportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Pdf => "mindmap.pdf",
            Self::Jpeg => "mindmap.jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Pixels per canvas unit
    pub scale: f64,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Canvas colour as RGB
    pub background: [u8; 3],
    /// TrueType/OpenType font for node labels; labels are omitted without one
    pub font_path: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: 2.0,
            jpeg_quality: 92,
            background: [255, 255, 255],
            font_path: None,
        }
    }
}

fn status_color(status: StatusClass) -> Rgb<u8> {
    match status {
        StatusClass::Unchecked => UNCHECKED_COLOR,
        StatusClass::Verified => VERIFIED_COLOR,
        StatusClass::Unverified => UNVERIFIED_COLOR,
    }
}

/// Renders graphs and packages the result.
pub struct Exporter {
    settings: ExportSettings,
    font: Option<FontVec>,
}

impl Exporter {
    /// Build an exporter, loading the label font if one is configured.
    pub fn new(settings: ExportSettings) -> Result<Self, ExportError> {
        let font = match &settings.font_path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| ExportError::Font(format!("{}: {}", path.display(), e)))?;
                let font = FontVec::try_from_vec(bytes)
                    .map_err(|e| ExportError::Font(format!("{}: {}", path.display(), e)))?;
                Some(font)
            }
            None => None,
        };
        Ok(Self { settings, font })
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Render and package in one step.
    pub fn export(&self, graph: &Graph, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let image = self.render(graph)?;
        let bytes = match format {
            ExportFormat::Jpeg => to_jpeg(&image, self.settings.jpeg_quality)?,
            ExportFormat::Pdf => to_pdf(&image, self.settings.jpeg_quality)?,
        };
        tracing::info!(
            format = format.file_name(),
            width = image.width(),
            height = image.height(),
            bytes = bytes.len(),
            "concept map exported"
        );
        Ok(bytes)
    }

    /// Draw the graph onto a canvas sized to its bounding box.
    pub fn render(&self, graph: &Graph) -> Result<RgbImage, ExportError> {
        if graph.is_empty() {
            return Err(ExportError::EmptyCapture);
        }
        let scale = if self.settings.scale.is_finite() && self.settings.scale > 0.0 {
            self.settings.scale
        } else {
            1.0
        };

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for node in graph.nodes() {
            min_x = min_x.min(node.position.x);
            min_y = min_y.min(node.position.y);
            max_x = max_x.max(node.position.x + NODE_WIDTH);
            max_y = max_y.max(node.position.y + NODE_HEIGHT);
        }

        let width = ((max_x - min_x + 2.0 * MARGIN) * scale).ceil();
        let height = ((max_y - min_y + 2.0 * MARGIN) * scale).ceil();
        if !(width >= 1.0 && height >= 1.0) {
            return Err(ExportError::EmptyCapture);
        }
        if width > MAX_SIDE as f64 || height > MAX_SIDE as f64 || width * height > MAX_PIXELS {
            return Err(ExportError::TooLarge {
                width: width.min(u32::MAX as f64) as u32,
                height: height.min(u32::MAX as f64) as u32,
            });
        }

        let mut image = RgbImage::from_pixel(
            width as u32,
            height as u32,
            Rgb(self.settings.background),
        );
        let to_canvas = |x: f64, y: f64| -> (f32, f32) {
            (
                ((x - min_x + MARGIN) * scale) as f32,
                ((y - min_y + MARGIN) * scale) as f32,
            )
        };

        let stroke = scale.round().max(1.0) as i32;
        for edge in graph.edges() {
            let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target))
            else {
                continue;
            };
            let start = to_canvas(
                source.position.x + NODE_WIDTH / 2.0,
                source.position.y + NODE_HEIGHT / 2.0,
            );
            let end = to_canvas(
                target.position.x + NODE_WIDTH / 2.0,
                target.position.y + NODE_HEIGHT / 2.0,
            );
            for offset in 0..stroke {
                let d = offset as f32 - (stroke - 1) as f32 / 2.0;
                draw_line_segment_mut(&mut image, (start.0, start.1 + d), (end.0, end.1 + d), EDGE_COLOR);
                draw_line_segment_mut(&mut image, (start.0 + d, start.1), (end.0 + d, end.1), EDGE_COLOR);
            }
        }

        for node in graph.nodes() {
            let (x, y) = to_canvas(node.position.x, node.position.y);
            let w = (NODE_WIDTH * scale).round() as u32;
            let h = (NODE_HEIGHT * scale).round() as u32;
            let (x, y) = (x.round() as i32, y.round() as i32);

            draw_filled_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), NODE_FILL);
            let color = status_color(node.status);
            for inset in 0..stroke {
                let side_w = w.saturating_sub(2 * inset as u32);
                let side_h = h.saturating_sub(2 * inset as u32);
                if side_w == 0 || side_h == 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut image,
                    Rect::at(x + inset, y + inset).of_size(side_w, side_h),
                    color,
                );
            }

            self.draw_label(&mut image, node, (x, y, w, h), scale);
        }

        Ok(image)
    }

    fn draw_label(&self, image: &mut RgbImage, node: &Node, bounds: (i32, i32, u32, u32), scale: f64) {
        let Some(font) = &self.font else {
            return;
        };
        let (x, y, w, h) = bounds;
        let px = PxScale::from(FONT_SIZE * scale as f32);

        let mut label = node.label().to_string();
        while !label.is_empty() && text_size(px, font, &label).0 > w.saturating_sub(8) {
            label.pop();
        }
        let (tw, th) = text_size(px, font, &label);
        let tx = x + (w.saturating_sub(tw) / 2) as i32;
        let ty = y + (h.saturating_sub(th) / 2) as i32;
        draw_text_mut(image, TEXT_COLOR, tx, ty, px, font, &label);
    }
}

/// Lossy-compress the capture for direct download.
pub fn to_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode_image(image)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Wrap the capture in a one-page PDF sized to the image.
///
/// The page is landscape exactly when the image is wider than tall; one
/// image pixel maps to one PDF unit.
pub fn to_pdf(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyCapture);
    }
    let jpeg = to_jpeg(image, quality)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(out)
}
