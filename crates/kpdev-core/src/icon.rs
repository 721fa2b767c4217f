//! Default plugin icon.
//!
//! A 56x56 RGBA image: vertical blue gradient, transparent rounded corners
//! and a white "P" glyph.

use std::path::Path;

use tracing::info;

pub const ICON_SIZE: u32 = 56;
const CORNER_RADIUS: i32 = 8;
const WHITE: [u8; 4] = [255, 255, 255, 255];
const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// Rectangles (inclusive x0, y0, x1, y1) that make up the "P".
const GLYPH: [(u32, u32, u32, u32); 4] = [
    (18, 16, 22, 40), // stem
    (22, 16, 34, 20), // top bar
    (22, 26, 34, 30), // middle bar
    (34, 20, 38, 26), // bowl
];

/// Raw RGBA pixels, row-major.
pub fn default_icon_pixels() -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut px = vec![0u8; size * size * 4];

    let mut set = |x: u32, y: u32, rgba: [u8; 4]| {
        let i = (y as usize * size + x as usize) * 4;
        px[i..i + 4].copy_from_slice(&rgba);
    };

    for y in 0..ICON_SIZE {
        let shade = [(70 + y) as u8, (130 + y / 2) as u8, 220, 255];
        for x in 0..ICON_SIZE {
            set(x, y, shade);
        }
    }

    let last = ICON_SIZE - 1;
    for y in 0..CORNER_RADIUS {
        for x in 0..CORNER_RADIUS {
            let dx = CORNER_RADIUS - x - 1;
            let dy = CORNER_RADIUS - y - 1;
            if dx * dx + dy * dy > CORNER_RADIUS * CORNER_RADIUS {
                let (x, y) = (x as u32, y as u32);
                set(x, y, CLEAR);
                set(last - x, y, CLEAR);
                set(x, last - y, CLEAR);
                set(last - x, last - y, CLEAR);
            }
        }
    }

    for (x0, y0, x1, y1) in GLYPH {
        for y in y0..=y1 {
            for x in x0..=x1 {
                set(x, y, WHITE);
            }
        }
    }

    px
}

/// Encode the default icon as PNG.
pub fn default_icon_png() -> Result<Vec<u8>, png::EncodingError> {
    let pixels = default_icon_pixels();
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, ICON_SIZE, ICON_SIZE);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Write the default icon to `path` unless a file is already there.
///
/// Returns `true` when an icon was generated.
pub fn ensure_icon(path: &Path) -> Result<bool, crate::assembler::AssembleError> {
    if path.exists() {
        return Ok(false);
    }

    let bytes = default_icon_png()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| crate::assembler::AssembleError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| crate::assembler::AssembleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "generated default icon");
    Ok(true)
}
