//! Tolerance-aware predicates and constructions over `Vec2`.
//!
//! Everything here is pure and deterministic: the same inputs give the same
//! answer on every platform that implements IEEE-754 `f64`.

use super::types::{AngleClass, GeomCfg, Orientation, Vec2};
use crate::error::GeomError;

#[inline]
pub(crate) fn cross(u: Vec2, v: Vec2) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Twice the signed area of `abc` (positive for a CCW triple).
#[inline]
pub fn orient2d(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    cross(b - a, c - a)
}

#[inline]
pub fn squared_distance(a: Vec2, b: Vec2) -> f64 {
    (a - b).norm_squared()
}

#[inline]
pub fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
    (a + b) * 0.5
}

#[inline]
pub fn centroid(a: Vec2, b: Vec2, c: Vec2) -> Vec2 {
    (a + b + c) / 3.0
}

fn longest_side_sq(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    squared_distance(a, b).max(squared_distance(b, c)).max(squared_distance(c, a))
}

/// Orientation of `c` relative to the directed line `a → b`.
///
/// The triple is collinear when the height over its longest side is at most
/// `eps_orient` times that side (coincident points are collinear).
pub fn orientation(a: Vec2, b: Vec2, c: Vec2, cfg: &GeomCfg) -> Orientation {
    let det = orient2d(a, b, c);
    let tol = cfg.eps_orient * longest_side_sq(a, b, c);
    if det > tol {
        Orientation::Left
    } else if det < -tol {
        Orientation::Right
    } else {
        Orientation::Collinear
    }
}

/// Cosine of the angle at `apex` between the rays to `p` and `q`.
/// `None` for a zero-length ray.
fn corner_cos(apex: Vec2, p: Vec2, q: Vec2) -> Option<f64> {
    let u = p - apex;
    let v = q - apex;
    let den = u.norm() * v.norm();
    if den <= 0.0 || !den.is_finite() {
        return None;
    }
    Some((u.dot(&v) / den).clamp(-1.0, 1.0))
}

/// Classify the corner at `apex`.
pub fn classify_angle(apex: Vec2, p: Vec2, q: Vec2, cfg: &GeomCfg) -> AngleClass {
    match corner_cos(apex, p, q) {
        Some(c) if c < -cfg.eps_angle => AngleClass::Obtuse,
        Some(c) if c <= cfg.eps_angle => AngleClass::Right,
        _ => AngleClass::Acute,
    }
}

/// Triangle class by its largest angle. Right angles are not obtuse.
pub fn triangle_class(a: Vec2, b: Vec2, c: Vec2, cfg: &GeomCfg) -> AngleClass {
    let corners = [
        classify_angle(a, b, c, cfg),
        classify_angle(b, c, a, cfg),
        classify_angle(c, a, b, cfg),
    ];
    corners.into_iter().max().unwrap_or(AngleClass::Acute)
}

#[inline]
pub fn is_obtuse(a: Vec2, b: Vec2, c: Vec2, cfg: &GeomCfg) -> bool {
    triangle_class(a, b, c, cfg) == AngleClass::Obtuse
}

/// Corner index (0 → `a`, 1 → `b`, 2 → `c`) of the largest angle and its
/// cosine. Ties go to the lowest index.
pub fn largest_angle_vertex(a: Vec2, b: Vec2, c: Vec2) -> (usize, f64) {
    let cosines = [
        corner_cos(a, b, c).unwrap_or(1.0),
        corner_cos(b, c, a).unwrap_or(1.0),
        corner_cos(c, a, b).unwrap_or(1.0),
    ];
    let mut best = 0;
    for k in 1..3 {
        if cosines[k] < cosines[best] {
            best = k;
        }
    }
    (best, cosines[best])
}

/// Largest interior angle in radians.
pub fn largest_angle(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    largest_angle_vertex(a, b, c).1.acos()
}

pub fn circumcenter(a: Vec2, b: Vec2, c: Vec2, cfg: &GeomCfg) -> Result<Vec2, GeomError> {
    if orientation(a, b, c, cfg) == Orientation::Collinear {
        return Err(GeomError::DegenerateGeometry("circumcenter of a collinear triple"));
    }
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * cross(ab, ac);
    let (ab2, ac2) = (ab.norm_squared(), ac.norm_squared());
    let ux = (ac.y * ab2 - ab.y * ac2) / d;
    let uy = (ab.x * ac2 - ac.x * ab2) / d;
    let center = a + Vec2::new(ux, uy);
    if !(center.x.is_finite() && center.y.is_finite()) {
        return Err(GeomError::DegenerateGeometry("circumcenter is not finite"));
    }
    Ok(center)
}

/// Orthogonal projection of `p` onto the line through `a` and `b`
/// (the altitude foot when `p` is the opposite corner).
pub fn projection_onto_line(p: Vec2, a: Vec2, b: Vec2) -> Result<Vec2, GeomError> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 || !len2.is_finite() {
        return Err(GeomError::DegenerateGeometry("projection onto a zero-length line"));
    }
    let t = (p - a).dot(&ab) / len2;
    Ok(a + ab * t)
}

/// Euclidean distance from `p` to the closed segment `ab`.
pub fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// True when `p` lies on the closed segment `ab` (within the collinearity
/// tolerance). Endpoints count.
pub fn point_on_segment(p: Vec2, a: Vec2, b: Vec2, cfg: &GeomCfg) -> bool {
    if orientation(a, b, p, cfg) != Orientation::Collinear {
        return false;
    }
    let ab = b - a;
    let t = (p - a).dot(&ab);
    t >= 0.0 && t <= ab.norm_squared()
}

/// True when `p` lies strictly between `a` and `b` on segment `ab`.
pub fn point_in_segment_interior(p: Vec2, a: Vec2, b: Vec2, cfg: &GeomCfg) -> bool {
    if orientation(a, b, p, cfg) != Orientation::Collinear {
        return false;
    }
    let ab = b - a;
    let len2 = ab.norm_squared();
    let t = (p - a).dot(&ab);
    let slack = cfg.eps_coincide * len2;
    t > slack && t < len2 - slack
}

/// Proper crossing of the open segments `p1p2` and `q1q2`. Shared endpoints,
/// touching and collinear overlap are not crossings.
pub fn segments_cross(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2, cfg: &GeomCfg) -> bool {
    let o1 = orientation(p1, p2, q1, cfg);
    let o2 = orientation(p1, p2, q2, cfg);
    let o3 = orientation(q1, q2, p1, cfg);
    let o4 = orientation(q1, q2, p2, cfg);
    if [o1, o2, o3, o4].contains(&Orientation::Collinear) {
        return false;
    }
    o1 != o2 && o3 != o4
}

/// Incircle test for a CCW triangle `abc`: positive when `d` lies strictly
/// inside the circumcircle, beyond a scale-relative tolerance.
pub fn in_circumcircle(a: Vec2, b: Vec2, c: Vec2, d: Vec2, cfg: &GeomCfg) -> bool {
    let (ad, bd, cd) = (a - d, b - d, c - d);
    let (a2, b2, c2) = (ad.norm_squared(), bd.norm_squared(), cd.norm_squared());
    let det = a2 * cross(bd, cd) + b2 * cross(cd, ad) + c2 * cross(ad, bd);
    let scale = a2.max(b2).max(c2);
    det > cfg.eps_orient * scale * scale
}

/// Radius-to-height ratio ρ = R / h, with `R` the circumradius and `h` the
/// height onto the longest side. ρ ≥ 1 exactly when the triangle is not acute.
pub fn radius_to_height(a: Vec2, b: Vec2, c: Vec2, cfg: &GeomCfg) -> Result<f64, GeomError> {
    let center = circumcenter(a, b, c, cfg)?;
    let radius = (a - center).norm();
    let longest = longest_side_sq(a, b, c).sqrt();
    let height = orient2d(a, b, c).abs() / longest;
    if height <= 0.0 {
        return Err(GeomError::DegenerateGeometry("zero-height triangle"));
    }
    Ok(radius / height)
}
