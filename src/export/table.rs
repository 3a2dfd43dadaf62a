//! Tile listing as CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::classify::{Category, Classification};
use crate::error::ExportError;
use crate::tile::Tile;

pub const HEADER: &str = "tile,row,col,category,intersects,minx,miny,maxx,maxy";

/// Write one row per tile: intersecting first, then adjacent, then other,
/// row-major within each category. `tile` is the tile's GeoTIFF file name.
pub fn write_table_to<W: Write>(
    mut writer: W,
    tiles: &[Tile],
    classification: &Classification,
) -> Result<usize, ExportError> {
    let mut ordered: Vec<(Category, &Tile)> = tiles
        .iter()
        .filter_map(|t| classification.category(t.id).map(|c| (c, t)))
        .collect();
    ordered.sort_by_key(|(category, tile)| (*category, tile.id));

    writeln!(writer, "{HEADER}")?;
    for (category, tile) in &ordered {
        let intersects = classification.get(tile.id).is_some_and(|c| c.intersects);
        let (min, max) = (tile.bbox.min(), tile.bbox.max());
        writeln!(
            writer,
            "{}.tif,{},{},{},{},{},{},{},{}",
            tile.id.file_stem(),
            tile.id.row,
            tile.id.col,
            category,
            intersects,
            min.x,
            min.y,
            max.x,
            max.y
        )?;
    }
    writer.flush()?;
    Ok(ordered.len())
}

pub fn write_table<P: AsRef<Path>>(
    path: P,
    tiles: &[Tile],
    classification: &Classification,
) -> Result<usize, ExportError> {
    let file = File::create(path)?;
    write_table_to(BufWriter::new(file), tiles, classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Affine;
    use crate::classify::{classify, AcceptAll};
    use crate::tile::planner::plan_tiles;
    use crate::vector::{ring, Coastline};
    use geo::Polygon;

    #[test]
    fn test_rows_grouped_by_category() {
        let tiles = plan_tiles(&Affine::north_up(0.0, 30.0, 1.0, 1.0), (30, 30), 10).unwrap();
        // Island inside tile (0, 2)
        let island = Polygon::new(ring(&[(23.0, 23.0), (27.0, 23.0), (27.0, 27.0), (23.0, 27.0)]), vec![]);
        let classification = classify(&tiles, &Coastline::from_polygons(vec![island]), &AcceptAll);

        let mut out = Vec::new();
        let written = write_table_to(&mut out, &tiles, &classification).unwrap();
        assert_eq!(written, 9);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "tile_0_2.tif,0,2,intersecting,true,20,20,30,30");
        assert!(lines[2].starts_with("tile_0_1.tif,0,1,adjacent,false,"));
        assert!(lines[3].starts_with("tile_1_1.tif,1,1,adjacent,"));
        assert!(lines[4].starts_with("tile_1_2.tif,1,2,adjacent,"));
        assert!(lines[5].starts_with("tile_0_0.tif,0,0,other,false,"));
        assert!(lines[9].starts_with("tile_2_2.tif,2,2,other,"));
    }

    #[test]
    fn test_write_table_file() {
        let tiles = plan_tiles(&Affine::identity(), (4, 4), 2).unwrap();
        let classification = classify(&tiles, &Coastline::empty(), &AcceptAll);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.csv");
        write_table(&path, &tiles, &classification).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.lines().skip(1).all(|l| l.contains(",other,false,")));
    }
}
