//! Diagnostic plot: tile imagery, raster extent, coastline and tile outlines
//! on one canvas.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Coord, Line, Rect};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::classify::{Category, Classification};
use crate::error::ExportError;
use crate::tile::{Tile, TileId};
use crate::vector::Coastline;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);

/// Blank border around the raster extent, in canvas pixels.
const MARGIN: u32 = 8;

fn category_color(category: Category) -> Rgb<u8> {
    match category {
        Category::Intersecting => RED,
        Category::Adjacent => ORANGE,
        Category::Other => BLACK,
    }
}

/// Everything drawn on the plot.
pub struct PlotScene<'a> {
    /// Raster extent in the raster CRS.
    pub extent: Rect<f64>,
    pub tiles: &'a [Tile],
    pub classification: &'a Classification,
    pub coastline: &'a Coastline,
    /// Rendered tile images, pasted at their tile's extent.
    pub images: &'a BTreeMap<TileId, RgbImage>,
}

/// World-to-canvas mapping: uniform scale, y flipped.
struct Viewport {
    extent: Rect<f64>,
    scale: f64,
}

impl Viewport {
    fn new(extent: Rect<f64>, plot_size: u32) -> Self {
        let longest = extent.width().max(extent.height());
        let scale = if longest > 0.0 && longest.is_finite() {
            f64::from(plot_size) / longest
        } else {
            1.0
        };
        Self { extent, scale }
    }

    fn canvas_size(&self) -> (u32, u32) {
        let w = (self.extent.width() * self.scale).ceil().max(1.0) as u32;
        let h = (self.extent.height() * self.scale).ceil().max(1.0) as u32;
        (w + 2 * MARGIN, h + 2 * MARGIN)
    }

    fn to_canvas(&self, c: Coord<f64>) -> (f32, f32) {
        let x = (c.x - self.extent.min().x) * self.scale + f64::from(MARGIN);
        let y = (self.extent.max().y - c.y) * self.scale + f64::from(MARGIN);
        (x as f32, y as f32)
    }

    fn draw_rect(&self, canvas: &mut RgbImage, rect: &Rect<f64>, color: Rgb<u8>) {
        for line in rect.to_polygon().exterior().lines() {
            self.draw_line(canvas, line, color);
        }
    }

    fn draw_line(&self, canvas: &mut RgbImage, line: Line<f64>, color: Rgb<u8>) {
        draw_line_segment_mut(canvas, self.to_canvas(line.start), self.to_canvas(line.end), color);
    }
}

/// Render the plot with its longest extent side spanning `plot_size` pixels.
pub fn render_plot(scene: &PlotScene<'_>, plot_size: u32) -> RgbImage {
    let view = Viewport::new(scene.extent, plot_size);
    let (width, height) = view.canvas_size();
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);

    for tile in scene.tiles {
        if let Some(image) = scene.images.get(&tile.id) {
            paste_tile(&mut canvas, &view, tile, image);
        }
    }

    view.draw_rect(&mut canvas, &scene.extent, BLACK);

    // Only the part of the coastline inside the extent is drawn
    for segment in scene.coastline.boundary_segments(&scene.extent) {
        if let Some(clipped) = clip_segment(segment, &scene.extent) {
            view.draw_line(&mut canvas, clipped, BLUE);
        }
    }

    // Other first so coastal outlines stay visible where edges are shared
    for category in [Category::Other, Category::Adjacent, Category::Intersecting] {
        for tile in scene.tiles {
            if scene.classification.category(tile.id) == Some(category) && tile.has_usable_bbox() {
                view.draw_rect(&mut canvas, &tile.bbox, category_color(category));
            }
        }
    }

    canvas
}

fn paste_tile(canvas: &mut RgbImage, view: &Viewport, tile: &Tile, image: &RgbImage) {
    if !tile.has_usable_bbox() {
        return;
    }
    let (x0, y0) = view.to_canvas(Coord {
        x: tile.bbox.min().x,
        y: tile.bbox.max().y,
    });
    let (x1, y1) = view.to_canvas(Coord {
        x: tile.bbox.max().x,
        y: tile.bbox.min().y,
    });
    let (left, top) = (x0.round() as i64, y0.round() as i64);
    let w = (x1.round() as i64 - left).max(1) as u32;
    let h = (y1.round() as i64 - top).max(1) as u32;

    let resized = imageops::resize(image, w, h, FilterType::Triangle);
    imageops::overlay(canvas, &resized, left, top);
}

/// Liang-Barsky clip of a segment to an axis-aligned rectangle.
fn clip_segment(line: Line<f64>, rect: &Rect<f64>) -> Option<Line<f64>> {
    let (min, max) = (rect.min(), rect.max());
    let d = line.delta();
    let checks = [
        (-d.x, line.start.x - min.x),
        (d.x, max.x - line.start.x),
        (-d.y, line.start.y - min.y),
        (d.y, max.y - line.start.y),
    ];

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| Coord {
        x: line.start.x + t * d.x,
        y: line.start.y + t * d.y,
    };
    Some(Line::new(at(t0), at(t1)))
}

pub fn write_plot<P: AsRef<Path>>(path: P, scene: &PlotScene<'_>, plot_size: u32) -> Result<(), ExportError> {
    render_plot(scene, plot_size).save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Affine;
    use crate::classify::{classify, AcceptAll};
    use crate::tile::planner::plan_tiles;
    use crate::vector::{extent, ring};
    use approx::assert_relative_eq;
    use geo::{coord, Polygon};

    fn scene_parts() -> (Vec<Tile>, Coastline) {
        let tiles = plan_tiles(&Affine::north_up(0.0, 20.0, 1.0, 1.0), (20, 40), 10).unwrap();
        let island = Polygon::new(ring(&[(13.0, 3.0), (17.0, 3.0), (17.0, 7.0), (13.0, 7.0)]), vec![]);
        (tiles, Coastline::from_polygons(vec![island]))
    }

    #[test]
    fn test_canvas_size_follows_aspect() {
        let view = Viewport::new(extent((0.0, 0.0), (40.0, 20.0)), 400);
        assert_eq!(view.canvas_size(), (400 + 2 * MARGIN, 200 + 2 * MARGIN));
    }

    #[test]
    fn test_to_canvas_flips_y() {
        let view = Viewport::new(extent((0.0, 0.0), (40.0, 20.0)), 400);
        let (x, y) = view.to_canvas(coord! { x: 0.0, y: 20.0 });
        assert_relative_eq!(x, MARGIN as f32);
        assert_relative_eq!(y, MARGIN as f32);
        let (x, y) = view.to_canvas(coord! { x: 40.0, y: 0.0 });
        assert_relative_eq!(x, 400.0 + MARGIN as f32);
        assert_relative_eq!(y, 200.0 + MARGIN as f32);
    }

    #[test]
    fn test_clip_segment() {
        let rect = extent((0.0, 0.0), (10.0, 10.0));
        let crossing = Line::new(coord! { x: -10.0, y: 5.0 }, coord! { x: 20.0, y: 5.0 });
        let clipped = clip_segment(crossing, &rect).unwrap();
        assert_relative_eq!(clipped.start.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(clipped.end.x, 10.0, epsilon = 1e-9);

        let outside = Line::new(coord! { x: -10.0, y: 15.0 }, coord! { x: 20.0, y: 15.0 });
        assert!(clip_segment(outside, &rect).is_none());

        let inside = Line::new(coord! { x: 1.0, y: 1.0 }, coord! { x: 2.0, y: 3.0 });
        assert_eq!(clip_segment(inside, &rect), Some(inside));
    }

    #[test]
    fn test_render_colors() {
        let (tiles, coast) = scene_parts();
        let classification = classify(&tiles, &coast, &AcceptAll);
        let mut images = BTreeMap::new();
        images.insert(TileId::new(1, 1), RgbImage::from_pixel(10, 10, Rgb([0, 200, 0])));
        let scene = PlotScene {
            extent: extent((0.0, 0.0), (40.0, 20.0)),
            tiles: &tiles,
            classification: &classification,
            coastline: &coast,
            images: &images,
        };
        let plot = render_plot(&scene, 400);
        assert_eq!(plot.dimensions(), (416, 216));

        // Tile (1, 1) spans x 10..20, y 0..10: its pasted imagery fills the interior
        assert_eq!(plot.get_pixel(MARGIN + 150, MARGIN + 180), &Rgb([0, 200, 0]));
        // Island outline (x = 13) is blue
        assert_eq!(plot.get_pixel(MARGIN + 130, MARGIN + 150), &BLUE);
        // Tile (1, 3) is other and has no image: background stays white
        assert_eq!(plot.get_pixel(MARGIN + 350, MARGIN + 150), &WHITE);
        // Left edge of tile (1, 3) at x = 30 belongs to adjacent tile (1, 2) too
        assert_eq!(plot.get_pixel(MARGIN + 300, MARGIN + 150), &ORANGE);
        // Tile (1, 1) outline is red
        assert_eq!(plot.get_pixel(MARGIN + 100, MARGIN + 150), &RED);
    }

    #[test]
    fn test_write_plot_file() {
        let (tiles, coast) = scene_parts();
        let classification = classify(&tiles, &coast, &AcceptAll);
        let images = BTreeMap::new();
        let scene = PlotScene {
            extent: extent((0.0, 0.0), (40.0, 20.0)),
            tiles: &tiles,
            classification: &classification,
            coastline: &coast,
            images: &images,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coastline_tiles_plot.png");
        write_plot(&path, &scene, 100).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgb8().dimensions(), (116, 66));
    }
}
