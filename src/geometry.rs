//! Box and canvas geometry.
//!
//! Catalogued instances arrive as `[x, y, width, height]` in image pixels.
//! Solutions are stored as `[x1, y1, x2, y2]` corners. The canvas shows the
//! image scaled to fit its container, so drawn points have to be mapped back
//! into image space before they become a box.

use serde::{Deserialize, Serialize};

/// Instance box in `[x, y, width, height]` image-pixel form.
pub type BoxXywh = [f64; 4];

/// Box in `[x1, y1, x2, y2]` absolute image-pixel form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corners(pub [f64; 4]);

impl Corners {
    /// Create corners from explicit coordinates.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self([x1, y1, x2, y2])
    }

    /// Convert an `[x, y, width, height]` instance box into corners.
    pub fn from_xywh(bbox: BoxXywh) -> Self {
        let [x, y, w, h] = bbox;
        Self([x, y, x + w, y + h])
    }

    pub fn x1(&self) -> f64 {
        self.0[0]
    }

    pub fn y1(&self) -> f64 {
        self.0[1]
    }

    pub fn x2(&self) -> f64 {
        self.0[2]
    }

    pub fn y2(&self) -> f64 {
        self.0[3]
    }

    pub fn width(&self) -> f64 {
        self.x2() - self.x1()
    }

    pub fn height(&self) -> f64 {
        self.y2() - self.y1()
    }
}

/// Normalize a solution box into a fixed `0..=scale` coordinate space.
///
/// Each coordinate becomes `round(coord / dimension * scale)`. The result is
/// clamped to `[0, scale]`; a zero dimension maps to 0.
pub fn normalize_solution(corners: &Corners, width: u32, height: u32, scale: u32) -> [u32; 4] {
    let norm = |value: f64, dimension: u32| -> u32 {
        if dimension == 0 {
            return 0;
        }
        let scaled = (value / f64::from(dimension) * f64::from(scale)).round();
        scaled.clamp(0.0, f64::from(scale)) as u32
    };

    [
        norm(corners.x1(), width),
        norm(corners.y1(), height),
        norm(corners.x2(), width),
        norm(corners.y2(), height),
    ]
}

/// A point in canvas space (CSS pixels relative to the canvas origin).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Target canvas size for displaying an image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

/// Fit an image into a container, preserving aspect ratio without cropping.
///
/// A wider-than-container image spans the full container width; otherwise it
/// spans the full height. Degenerate inputs produce a zero-sized canvas.
pub fn fit_canvas(
    image_width: f64,
    image_height: f64,
    container_width: f64,
    container_height: f64,
) -> CanvasSize {
    if image_width <= 0.0 || image_height <= 0.0 || container_width <= 0.0 || container_height <= 0.0
    {
        log::warn!(
            "Cannot fit {}x{} image into {}x{} container",
            image_width,
            image_height,
            container_width,
            container_height
        );
        return CanvasSize::default();
    }

    let image_ratio = image_width / image_height;
    let container_ratio = container_width / container_height;

    if image_ratio > container_ratio {
        CanvasSize {
            width: container_width,
            height: container_width / image_ratio,
        }
    } else {
        CanvasSize {
            width: container_height * image_ratio,
            height: container_height,
        }
    }
}

/// Mapping between canvas space and image-pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasScale {
    /// Image width in pixels
    pub image_width: f64,
    /// Image height in pixels
    pub image_height: f64,
    /// Displayed canvas size
    pub canvas: CanvasSize,
}

impl CanvasScale {
    pub fn new(image_width: f64, image_height: f64, canvas: CanvasSize) -> Self {
        Self {
            image_width,
            image_height,
            canvas,
        }
    }

    /// Image pixels per canvas pixel along x.
    pub fn x_factor(&self) -> f64 {
        if self.canvas.width > 0.0 {
            self.image_width / self.canvas.width
        } else {
            1.0
        }
    }

    /// Image pixels per canvas pixel along y.
    pub fn y_factor(&self) -> f64 {
        if self.canvas.height > 0.0 {
            self.image_height / self.canvas.height
        } else {
            1.0
        }
    }

    /// Map two dragged canvas points to an ordered, clamped image-space box.
    ///
    /// Coordinates are rounded to whole pixels and clamped to the image
    /// bounds, since a drag can run past the canvas edge.
    pub fn drag_to_corners(&self, start: CanvasPoint, end: CanvasPoint) -> Corners {
        let (fx, fy) = (self.x_factor(), self.y_factor());
        let clamp_x = |v: f64| (v * fx).round().clamp(0.0, self.image_width.max(0.0));
        let clamp_y = |v: f64| (v * fy).round().clamp(0.0, self.image_height.max(0.0));

        Corners::new(
            clamp_x(start.x.min(end.x)),
            clamp_y(start.y.min(end.y)),
            clamp_x(start.x.max(end.x)),
            clamp_y(start.y.max(end.y)),
        )
    }
}
