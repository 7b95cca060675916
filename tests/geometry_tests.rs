//! Geometric properties of tracks and connections.

use marklin_sim::geometry::{CubicBezier, Point2D};
use marklin_sim::track::{BezierTrack, Track, TrackError};
use marklin_sim::Layout;
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f64> {
    -500.0..500.0f64
}

fn point() -> impl Strategy<Value = Point2D> {
    (coord(), coord()).prop_map(|(x, y)| Point2D::new(x, y))
}

fn curve() -> impl Strategy<Value = CubicBezier> {
    (point(), point(), point(), point()).prop_map(|(a, b, c, d)| CubicBezier::new(a, b, c, d))
}

proptest! {
    #[test]
    fn straight_ends_are_exact(start in point(), end in point()) {
        prop_assume!(start.distance(end) > 1e-3);
        let track = Track::straight(1, start, end);
        prop_assert_eq!(track.position_at(0.0).unwrap(), start);
        prop_assert_eq!(track.position_at(track.length()).unwrap(), end);
    }

    #[test]
    fn straight_interpolates_linearly(start in point(), end in point(), f in 0.0..1.0f64) {
        prop_assume!(start.distance(end) > 1e-3);
        let track = Track::straight(1, start, end);
        let d = f * track.length();
        let expected = start + (end - start) * (d / track.length());
        prop_assert!(track.position_at(d).unwrap().distance(expected) < 1e-9);
    }

    #[test]
    fn bezier_ends_are_exact(curve in curve()) {
        let track = Track::bezier(1, curve);
        prop_assume!(track.length() > 1.0);
        prop_assert_eq!(track.position_at(0.0).unwrap(), curve.start());
        prop_assert_eq!(track.position_at(track.length()).unwrap(), curve.end());
    }

    #[test]
    fn distance_to_t_reproduces_arc_length(curve in curve(), f in 0.01..0.99f64) {
        let track = BezierTrack::new(curve);
        prop_assume!(track.length() > 1.0);
        let d = f * track.length();
        let t = track.distance_to_t(d).unwrap();
        let back = curve.length_to(t);
        prop_assert!((back - d).abs() <= 1e-6 * d, "d = {}, back = {}", d, back);
    }

    #[test]
    fn distance_to_t_is_monotonic(curve in curve(), f in 0.0..0.85f64) {
        let track = BezierTrack::new(curve);
        prop_assume!(track.length() > 1.0);
        let near = track.distance_to_t(f * track.length()).unwrap();
        let far = track.distance_to_t((f + 0.1) * track.length()).unwrap();
        prop_assert!(near < far);
    }

    #[test]
    fn touching_tracks_connect_symmetrically(a in point(), joint in point(), b in point()) {
        prop_assume!(a.distance(joint) > 1.0 && b.distance(joint) > 1.0);
        let mut layout = Layout::new();
        layout.insert(Track::straight(1, a, joint));
        layout.insert(Track::straight(2, joint, b));
        layout.connect(1, false, 2, true).unwrap();

        let next = layout.get(1).unwrap().next().unwrap();
        let previous = layout.get(2).unwrap().previous().unwrap();
        prop_assert_eq!((next.track, next.head), (2, true));
        prop_assert_eq!((previous.track, previous.head), (1, false));
    }

    #[test]
    fn separated_tracks_never_connect(a in point(), joint in point(), gap in 1e-6..10.0f64) {
        prop_assume!(a.distance(joint) > 1.0);
        let mut layout = Layout::new();
        layout.insert(Track::straight(1, a, joint));
        layout.insert(Track::straight(2, joint + Point2D::new(gap, 0.0), joint + Point2D::new(50.0, 50.0)));
        prop_assert_eq!(
            layout.connect(1, false, 2, true),
            Err(TrackError::ConnectionMismatch { a: 1, b: 2 })
        );
    }
}

#[test]
fn connect_within_tolerance() {
    let mut layout = Layout::new();
    layout.insert(Track::straight(1, Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0)));
    layout.insert(Track::straight(
        2,
        Point2D::new(10.0 + 1e-9, 0.0),
        Point2D::new(20.0, 0.0),
    ));
    layout.connect_auto(1, 2).unwrap();
    assert_eq!(layout.get(2).unwrap().previous().unwrap().track, 1);
}

#[test]
fn out_of_range_distance_is_rejected() {
    let track = Track::straight(7, Point2D::ORIGIN, Point2D::new(10.0, 0.0));
    assert_eq!(
        track.position_at(-1.0),
        Err(TrackError::InvalidDistance {
            track: 7,
            distance: -1.0,
            length: 10.0
        })
    );
    assert!(track.position_at(10.5).is_err());
}
