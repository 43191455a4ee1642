//! Graph coordinates are `(x, y)`; the canvas is addressed `(row, col) = (y, x)`.
//! Every conversion between the two goes through this module.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanvasPoint {
    pub row: f64,
    pub col: f64,
}

pub fn graph_to_canvas(x: f64, y: f64) -> CanvasPoint {
    CanvasPoint { row: y, col: x }
}

pub fn canvas_to_graph(p: CanvasPoint) -> (f64, f64) {
    (p.col, p.row)
}

/// Canvas bounds of a `width x height` map: `[[0, 0], [height, width]]`.
pub fn canvas_bounds(width: f64, height: f64) -> [CanvasPoint; 2] {
    [
        CanvasPoint { row: 0.0, col: 0.0 },
        graph_to_canvas(width, height),
    ]
}

/// Screen mapping at a zoom level: one canvas unit spans `2^zoom` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub origin: CanvasPoint,
}

impl Viewport {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            origin: CanvasPoint { row: 0.0, col: 0.0 },
        }
    }

    pub fn scale(&self) -> f64 {
        2f64.powf(self.zoom)
    }

    pub fn to_screen(&self, p: CanvasPoint) -> [f64; 2] {
        let s = self.scale();
        [(p.col - self.origin.col) * s, (p.row - self.origin.row) * s]
    }

    pub fn from_screen(&self, px: [f64; 2]) -> CanvasPoint {
        let s = self.scale();
        CanvasPoint {
            row: px[1] / s + self.origin.row,
            col: px[0] / s + self.origin.col,
        }
    }
}
