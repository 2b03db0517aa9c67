// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Closed-interval envelope helpers over [`kurbo::Rect`].
//!
//! Envelopes use `x` for longitude and `y` for latitude: `x0..=x1` is `min_lon..=max_lon`
//! and `y0..=y1` is `min_lat..=max_lat`. Unlike [`Rect::contains`], every test here treats the
//! envelope as closed on all four sides, so a point on a shared boundary belongs to both
//! neighbours. Float inputs are assumed to be finite; comparisons involving NaN are false.

use core::cmp::Ordering;

use kurbo::{Point, Rect};

/// Axis along which a node is bisected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Split along longitude (`x`).
    Lon,
    /// Split along latitude (`y`).
    Lat,
}

/// Whether the closed envelope contains the point.
pub fn contains(env: &Rect, pt: Point) -> bool {
    le(env.x0, pt.x) && le(env.y0, pt.y) && le(pt.x, env.x1) && le(pt.y, env.y1)
}

/// Whether two closed envelopes share at least one point.
pub fn intersects(a: &Rect, b: &Rect) -> bool {
    le(a.x0, b.x1) && le(b.x0, a.x1) && le(a.y0, b.y1) && le(b.y0, a.y1)
}

/// Whether `outer` fully contains `inner` (boundaries included).
pub fn covers(outer: &Rect, inner: &Rect) -> bool {
    le(outer.x0, inner.x0)
        && le(outer.y0, inner.y0)
        && le(inner.x1, outer.x1)
        && le(inner.y1, outer.y1)
}

/// Move `pt` to the nearest point of the closed envelope.
pub fn clamp(env: &Rect, pt: Point) -> Point {
    Point::new(
        min_t(max_t(pt.x, env.x0), env.x1),
        min_t(max_t(pt.y, env.y0), env.y1),
    )
}

/// Split an envelope in two halves along `axis`: `[lower, upper]`.
pub fn bisect(env: &Rect, axis: Axis) -> [Rect; 2] {
    match axis {
        Axis::Lon => {
            let mid = mid(env.x0, env.x1);
            [
                Rect::new(env.x0, env.y0, mid, env.y1),
                Rect::new(mid, env.y0, env.x1, env.y1),
            ]
        }
        Axis::Lat => {
            let mid = mid(env.y0, env.y1);
            [
                Rect::new(env.x0, env.y0, env.x1, mid),
                Rect::new(env.x0, mid, env.x1, env.y1),
            ]
        }
    }
}

/// Split an envelope in four quadrants, indexed `(upper_lat << 1) | upper_lon`:
/// `[south-west, south-east, north-west, north-east]`.
pub fn quarter(env: &Rect) -> [Rect; 4] {
    let mx = mid(env.x0, env.x1);
    let my = mid(env.y0, env.y1);
    [
        Rect::new(env.x0, env.y0, mx, my),
        Rect::new(mx, env.y0, env.x1, my),
        Rect::new(env.x0, my, mx, env.y1),
        Rect::new(mx, my, env.x1, env.y1),
    ]
}

/// Area of the envelope; zero for inverted envelopes.
pub fn area(env: &Rect) -> f64 {
    let w = max_t(env.x1 - env.x0, 0.0);
    let h = max_t(env.y1 - env.y0, 0.0);
    w * h
}

/// Smallest envelope containing both inputs.
pub fn union(a: &Rect, b: &Rect) -> Rect {
    Rect::new(
        min_t(a.x0, b.x0),
        min_t(a.y0, b.y0),
        max_t(a.x1, b.x1),
        max_t(a.y1, b.y1),
    )
}

/// True if the envelope is inverted (no extent on some axis). Assumes no NaN.
pub fn is_inverted(env: &Rect) -> bool {
    lt(env.x1, env.x0) || lt(env.y1, env.y0)
}

#[inline]
fn mid(a: f64, b: f64) -> f64 {
    0.5 * (a + b)
}

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_boundaries_contain() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(contains(&r, Point::new(0.0, 0.0)));
        assert!(contains(&r, Point::new(10.0, 10.0)));
        assert!(!contains(&r, Point::new(10.0001, 5.0)));
        assert!(!contains(&r, Point::new(f64::NAN, 5.0)));
    }

    #[test]
    fn touching_envelopes_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        let c = Rect::new(10.5, 0.0, 20.0, 10.0);
        assert!(intersects(&a, &b));
        assert!(!intersects(&a, &c));
    }

    #[test]
    fn clamp_moves_outside_points_to_boundary() {
        let r = Rect::new(-180.0, -90.0, 180.0, 90.0);
        assert_eq!(clamp(&r, Point::new(200.0, -100.0)), Point::new(180.0, -90.0));
        assert_eq!(clamp(&r, Point::new(1.0, 2.0)), Point::new(1.0, 2.0));
    }

    #[test]
    fn bisect_and_quarter_tile_the_input() {
        let r = Rect::new(-180.0, -90.0, 180.0, 90.0);
        let [lo, hi] = bisect(&r, Axis::Lon);
        assert_eq!(union(&lo, &hi), r);
        assert_eq!(area(&lo) + area(&hi), area(&r));

        let q = quarter(&r);
        let total: f64 = q.iter().map(area).sum();
        assert_eq!(total, area(&r));
        assert_eq!(q[3], Rect::new(0.0, 0.0, 180.0, 90.0));
        assert!(q.iter().all(|c| covers(&r, c)));
    }
}
