use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::Polygon;
use ndarray::Array3;

use coastal_tiles::affine::Affine;
use coastal_tiles::classify::{classify, AcceptAll, RasterContent};
use coastal_tiles::content::ContentValidator;
use coastal_tiles::raster::InMemoryRaster;
use coastal_tiles::tile::planner::plan_tiles;
use coastal_tiles::vector::{ring, Coastline};

/// UTM-like north-up transform with 10 m pixels.
fn transform() -> Affine {
    Affine::north_up(500_000.0, 6_600_000.0, 10.0, 10.0)
}

/// A jagged coastline crossing the raster diagonally, as one big landmass
/// polygon with `vertices` shoreline points.
fn make_coastline(size: usize, vertices: usize) -> Coastline {
    let (x0, y1) = (500_000.0, 6_600_000.0);
    let extent = size as f64 * 10.0;
    let mut points = vec![(x0 - 1_000.0, y1 + 1_000.0)];
    for i in 0..=vertices {
        let t = i as f64 / vertices as f64;
        let wiggle = if i % 2 == 0 { 150.0 } else { -150.0 };
        points.push((x0 + t * extent + wiggle, y1 - t * extent));
    }
    points.push((x0 - 1_000.0, y1 - extent - 1_000.0));
    Coastline::from_polygons(vec![Polygon::new(ring(&points), vec![])])
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_tiles");
    for (size, tile) in [(20_000, 512), (100_000, 256)] {
        group.bench_function(format!("{size}px_tile{tile}"), |b| {
            b.iter(|| plan_tiles(black_box(&transform()), black_box((size, size)), black_box(tile)).unwrap())
        });
    }
    group.finish();
}

fn bench_classify_geometry(c: &mut Criterion) {
    let size = 50_000;
    let tiles = plan_tiles(&transform(), (size, size), 256).unwrap();
    let coastline = make_coastline(size, 5_000);

    c.bench_function("classify_geometry_38k_tiles", |b| {
        b.iter(|| classify(black_box(&tiles), black_box(&coastline), &AcceptAll))
    });
}

fn bench_classify_with_content(c: &mut Criterion) {
    let size = 4_096;
    let data = Array3::from_elem((3, size, size), 100.0);
    let raster = InMemoryRaster::new(data, transform()).unwrap();
    let tiles = plan_tiles(&transform(), (size, size), 256).unwrap();
    let coastline = make_coastline(size, 500);
    let content = RasterContent::new(&raster, ContentValidator::default());

    c.bench_function("classify_content_4096px", |b| {
        b.iter(|| classify(black_box(&tiles), black_box(&coastline), &content))
    });
}

criterion_group!(benches, bench_plan, bench_classify_geometry, bench_classify_with_content);
criterion_main!(benches);
