/// Area centroid of a simple polygon given by its vertices in order (either
/// orientation; the closing edge is implicit).
///
/// Returns `None` for fewer than three distinct vertices, zero area or any
/// non-finite coordinate.
pub fn polygon_centroid(vertices: &[[f64; 2]]) -> Option<[f64; 2]> {
    if vertices.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }
    let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(vertices.len());
    for &v in vertices {
        if distinct.last() != Some(&v) {
            distinct.push(v);
        }
    }
    while distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return None;
    }

    // Shift to the first vertex to keep the cross products well scaled.
    let [ox, oy] = distinct[0];
    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in distinct.iter().enumerate() {
        let b = distinct[(i + 1) % distinct.len()];
        let (ax, ay) = (a[0] - ox, a[1] - oy);
        let (bx, by) = (b[0] - ox, b[1] - oy);
        let cross = ax * by - bx * ay;
        twice_area += cross;
        cx += (ax + bx) * cross;
        cy += (ay + by) * cross;
    }
    if twice_area == 0.0 || !twice_area.is_finite() {
        return None;
    }
    let scale = 3.0 * twice_area;
    Some([cx / scale + ox, cy / scale + oy])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 2], b: [f64; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9
    }

    #[test]
    fn test_unit_square() {
        let sq = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(close(polygon_centroid(&sq).unwrap(), [0.5, 0.5]));
        let mut rev = sq;
        rev.reverse();
        assert!(close(polygon_centroid(&rev).unwrap(), [0.5, 0.5]));
    }

    #[test]
    fn test_triangle() {
        let tri = [[0.0, 0.0], [6.0, 0.0], [0.0, 3.0]];
        assert!(close(polygon_centroid(&tri).unwrap(), [2.0, 1.0]));
    }

    #[test]
    fn test_far_from_origin() {
        let tri = [[700.0, 100.0], [710.0, 100.0], [705.0, 40.0]];
        assert!(close(polygon_centroid(&tri).unwrap(), [705.0, 80.0]));
    }

    #[test]
    fn test_explicitly_closed_ring() {
        let ring = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]];
        assert!(close(polygon_centroid(&ring).unwrap(), [1.0, 1.0]));
    }

    #[test]
    fn test_degenerate() {
        assert!(polygon_centroid(&[]).is_none());
        assert!(polygon_centroid(&[[1.0, 1.0], [2.0, 2.0]]).is_none());
        assert!(polygon_centroid(&[[1.0, 1.0], [1.0, 1.0], [2.0, 2.0]]).is_none());
        // Collinear: zero area.
        assert!(polygon_centroid(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_none());
        assert!(polygon_centroid(&[[0.0, 0.0], [1.0, f64::NAN], [2.0, 0.0]]).is_none());
    }
}
