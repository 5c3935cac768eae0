//! 4-connected flood fill.

use image::{Rgba, RgbaImage};

/// Cost of a flood fill traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Pixels recolored, including pixels rewritten with an identical value.
    pub filled: usize,
    /// Largest size the work stack reached.
    pub max_stack: usize,
}

/// Recolor the connected region of exactly `target`-colored pixels containing `(x, y)`.
///
/// The fill color is always written fully opaque. Every pixel is pushed at
/// most once (the visited mask is marked on push), so the work stack never
/// outgrows the pixel count, even when the fill color equals the target.
pub(crate) fn flood_fill(img: &mut RgbaImage, x: u32, y: u32, fill: Rgba<u8>) -> FillReport {
    let (w, h) = img.dimensions();
    if x >= w || y >= h {
        return FillReport::default();
    }

    let fill = Rgba([fill[0], fill[1], fill[2], 255]);
    let target = *img.get_pixel(x, y);
    let wu = w as usize;

    let mut visited = vec![false; wu * h as usize];
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    let seed = y as usize * wu + x as usize;
    visited[seed] = true;
    stack.push(seed);

    let mut report = FillReport {
        filled: 0,
        max_stack: 1,
    };

    while let Some(idx) = stack.pop() {
        let px = (idx % wu) as u32;
        let py = (idx / wu) as u32;
        img.put_pixel(px, py, fill);
        report.filled += 1;

        let neighbors = [
            (px > 0).then(|| (px - 1, py)),
            (px + 1 < w).then(|| (px + 1, py)),
            (py > 0).then(|| (px, py - 1)),
            (py + 1 < h).then(|| (px, py + 1)),
        ];
        for (nx, ny) in neighbors.into_iter().flatten() {
            let ni = ny as usize * wu + nx as usize;
            if !visited[ni] && *img.get_pixel(nx, ny) == target {
                visited[ni] = true;
                stack.push(ni);
            }
        }
        report.max_stack = report.max_stack.max(stack.len());
    }

    report
}
