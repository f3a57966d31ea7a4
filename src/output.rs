// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image output.
//!
//! Two formats: a plain-text pixmap (`P3`) with one line per raster
//! row, matching the reference renderings, and a compact binary
//! graymap written through the `image` crate.

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ColorType, ImageEncoder};
use itertools::Itertools;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::kernel::BOUNDARY;
use crate::raster::RasterBuffer;

/// Map an iteration count onto a grey level, `round(255 * count /
/// max_iter)`.
pub fn grey_level(count: u32, max_iter: u32) -> u8 {
    let level = (255.0 * f64::from(count) / f64::from(max_iter)).round();
    num::clamp(level, 0.0, 255.0) as u8
}

fn rgb(count: u32, max_iter: u32) -> String {
    if count == BOUNDARY {
        "255 0 0".to_string()
    } else {
        let g = grey_level(count, max_iter);
        format!("{} {} {}", g, g, g)
    }
}

/// Write `raster` as a plain-text pixmap.  Boundary rows are drawn red.
pub fn write_ppm<W: Write>(out: W, raster: &RasterBuffer, max_iter: u32) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(out, "P3")?;
    writeln!(out, "{} {}", raster.width(), raster.height())?;
    writeln!(out, "255")?;
    for (_, counts) in raster.iter_rows() {
        writeln!(out, "{}", counts.iter().map(|&c| rgb(c, max_iter)).join(" "))?;
    }
    out.flush()
}

/// Create `path` and write `raster` to it as a plain-text pixmap.
pub fn save_ppm(path: &Path, raster: &RasterBuffer, max_iter: u32) -> Result<()> {
    let resource = |cause| Error::Resource {
        path: path.display().to_string(),
        cause,
    };
    let file = File::create(path).map_err(resource)?;
    write_ppm(file, raster, max_iter).map_err(resource)
}

/// Create `path` and write `raster` to it as a binary graymap.
/// Boundary rows are drawn white.
pub fn save_graymap(path: &Path, raster: &RasterBuffer, max_iter: u32) -> Result<()> {
    let pixels: Vec<u8> = raster
        .as_slice()
        .iter()
        .map(|&c| if c == BOUNDARY { 255 } else { grey_level(c, max_iter) })
        .collect();
    let output = File::create(path).map_err(|cause| Error::Resource {
        path: path.display().to_string(),
        cause,
    })?;
    let encoder = PnmEncoder::new(BufWriter::new(output))
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary));
    encoder
        .write_image(
            &pixels,
            raster.width() as u32,
            raster.height() as u32,
            ColorType::L8,
        )
        .map_err(|cause| Error::Encode {
            path: path.display().to_string(),
            cause,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::RowRange;
    use std::fs;

    fn sample() -> RasterBuffer {
        let mut raster = RasterBuffer::new(3, RowRange::new(0, 2)).unwrap();
        raster
            .as_mut_slice()
            .copy_from_slice(&[BOUNDARY, BOUNDARY, BOUNDARY, 0, 50, 100]);
        raster
    }

    #[test]
    fn grey_levels_round() {
        assert_eq!(grey_level(0, 100), 0);
        assert_eq!(grey_level(100, 100), 255);
        assert_eq!(grey_level(50, 100), 128);
        assert_eq!(grey_level(1, 1000), 0);
        assert_eq!(grey_level(2, 1000), 1);
    }

    #[test]
    fn pixmap_has_one_line_per_row() {
        let mut out = vec![];
        write_ppm(&mut out, &sample(), 100).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "P3\n3 2\n255\n255 0 0 255 0 0 255 0 0\n0 0 0 128 128 128 255 255 255\n"
        );
    }

    #[test]
    fn unwritable_paths_are_resource_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("julia.ppm");
        let err = save_ppm(&path, &sample(), 100).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
    }

    #[test]
    fn graymap_is_binary_pnm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("julia.pgm");
        save_graymap(&path, &sample(), 100).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P5"));
        assert_eq!(&bytes[bytes.len() - 6..], &[255, 255, 255, 0, 128, 255]);
    }
}
