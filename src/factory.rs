//! Shorthand constructors for building layouts by hand.
//!
//! Coordinates are plain numbers so layout tables read like drawings. Sensor
//! names follow the contact-module convention: a module letter `A`-`E` and a
//! contact number `1`-`16`, giving ids `0..80`.

use crate::config::SensorConfig;
use crate::geometry::{CubicBezier, Point2D};
use crate::sensor::{Sensor, SensorId};
use crate::track::{Track, TrackError, TrackId};

/// Control-point distance for a cubic approximation of a unit quarter circle.
const QUARTER_CIRCLE: f64 = 0.55191502449;

const MODULES: &[u8] = b"ABCDE";
const CONTACTS_PER_MODULE: u32 = 16;

/// Straight track from `(x1, y1)` to `(x2, y2)`.
pub fn straight(id: TrackId, x1: f64, y1: f64, x2: f64, y2: f64) -> Track {
    Track::straight(id, Point2D::new(x1, y1), Point2D::new(x2, y2))
}

/// Curved track from four control points given as `[x0, y0, .., x3, y3]`.
pub fn bezier(id: TrackId, coords: [f64; 8]) -> Track {
    let [x0, y0, x1, y1, x2, y2, x3, y3] = coords;
    Track::bezier(
        id,
        CubicBezier::new(
            Point2D::new(x0, y0),
            Point2D::new(x1, y1),
            Point2D::new(x2, y2),
            Point2D::new(x3, y3),
        ),
    )
}

/// Counter-clockwise quarter circle from `(x1, y1)` to `(x2, y2)`.
///
/// The chord spans the quadrant, so the radius is `|chord| / sqrt(2)` and the
/// control points sit `QUARTER_CIRCLE * radius` along the end tangents.
pub fn quadrant(id: TrackId, x1: f64, y1: f64, x2: f64, y2: f64) -> Track {
    let k = QUARTER_CIRCLE / 2.0;
    let (dx, dy) = (x2 - x1, y2 - y1);
    bezier(
        id,
        [
            x1,
            y1,
            x1 + (dx + dy) * k,
            y1 + (dy - dx) * k,
            x2 + (dy - dx) * k,
            y2 - (dx + dy) * k,
            x2,
            y2,
        ],
    )
}

/// Switch at `(x, y)`, named after its id.
pub fn switch(id: TrackId, x: f64, y: f64) -> Track {
    Track::switch(id, Point2D::new(x, y))
}

/// Id for a contact name such as `C13`.
pub fn sensor_id(name: &str) -> Result<SensorId, TrackError> {
    let invalid = || TrackError::InvalidSensorName(name.to_string());
    let (module, contact) = name.split_at_checked(1).ok_or_else(invalid)?;
    let module = MODULES
        .iter()
        .position(|&m| module.as_bytes() == [m])
        .ok_or_else(invalid)? as u32;
    let contact: u32 = contact.parse().map_err(|_| invalid())?;
    if !(1..=CONTACTS_PER_MODULE).contains(&contact) {
        return Err(invalid());
    }
    Ok(module * CONTACTS_PER_MODULE + contact - 1)
}

/// Sensor named `name`, `distance_to_head` from the head of its track
/// (negative counts from the tail).
pub fn sensor(
    name: &str,
    distance_to_head: f64,
    forward: bool,
    config: &SensorConfig,
) -> Result<Sensor, TrackError> {
    if !distance_to_head.is_finite() {
        return Err(TrackError::InvalidSensorName(name.to_string()));
    }
    Ok(Sensor::new(
        sensor_id(name)?,
        name,
        distance_to_head,
        forward,
        config.trigger_width,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_names() {
        assert_eq!(sensor_id("A1").unwrap(), 0);
        assert_eq!(sensor_id("A16").unwrap(), 15);
        assert_eq!(sensor_id("C13").unwrap(), 44);
        assert_eq!(sensor_id("E16").unwrap(), 79);
    }

    #[test]
    fn malformed_sensor_names() {
        for name in ["", "A", "A0", "A17", "F1", "a1", "AA", "A-1", "ÄA1"] {
            assert_eq!(
                sensor_id(name),
                Err(TrackError::InvalidSensorName(name.to_string())),
                "{name}"
            );
        }
    }

    #[test]
    fn sensor_uses_configured_width() {
        let config = SensorConfig::default().with_trigger_width(4.0);
        let contact = sensor("B2", -3.0, false, &config).unwrap();
        assert_eq!(contact.id, 17);
        assert_eq!(contact.trigger_width, 4.0);
        assert!(sensor("B2", f64::NAN, false, &config).is_err());
    }

    #[test]
    fn quadrant_approximates_circle() {
        // centre (0, 50), radius 50
        let track = quadrant(1, 0.0, 0.0, 50.0, 50.0);
        assert_eq!(track.start(), Point2D::new(0.0, 0.0));
        assert_eq!(track.end(), Point2D::new(50.0, 50.0));

        let centre = Point2D::new(0.0, 50.0);
        let length = track.length();
        for i in 0..=8 {
            let p = track.position_at(length * i as f64 / 8.0).unwrap();
            assert!((p.distance(centre) - 50.0).abs() < 0.02, "{p}");
        }
        assert!((length - 25.0 * core::f64::consts::PI).abs() < 0.05);
    }

    #[test]
    fn quadrant_leaves_along_chord_rotation() {
        let track = quadrant(1, 0.0, 0.0, 50.0, 50.0);
        let tangent = track.tangent_at(0.0).unwrap();
        assert!((tangent.x - 1.0).abs() < 1e-9);
        assert!(tangent.y.abs() < 1e-9);
    }
}
