//! Square spiral of cell offsets, nearest rings first.

/// Offsets covering the square of the given radius, ordered by ring.
///
/// Ring 0 is the origin. Ring `r` walks the perimeter of the square with
/// Chebyshev radius `r`, starting at its north-west corner and going clockwise.
/// Every offset appears exactly once.
pub fn spiral(radius: i32) -> Vec<(i32, i32)> {
    let radius = radius.max(0);
    let side = (2 * radius + 1) as usize;
    let mut offsets = Vec::with_capacity(side * side);
    offsets.push((0, 0));

    for r in 1..=radius {
        // North edge, west to east
        for dx in -r..=r {
            offsets.push((dx, -r));
        }
        // East edge, excluding corners
        for dy in (-r + 1)..r {
            offsets.push((r, dy));
        }
        // South edge, east to west
        for dx in (-r..=r).rev() {
            offsets.push((dx, r));
        }
        // West edge, excluding corners
        for dy in ((-r + 1)..r).rev() {
            offsets.push((-r, dy));
        }
    }

    offsets
}
