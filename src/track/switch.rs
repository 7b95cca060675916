//! Switch (turnout) state machine.
//!
//! A switch is a zero-length track whose `previous` side (the branch) is fixed
//! and whose `next` side is one of two pre-bound routes. Changing direction
//! only flips which slot is online; both connections stay bound.
//!
//! | Direction | Online route | Offline route |
//! |-----------|--------------|---------------|
//! | `Straight` | straight slot | curve slot |
//! | `Curve` | curve slot | straight slot |

use serde::{Deserialize, Serialize};

use super::Connection;
use crate::config::{label, Label};
use crate::geometry::Point2D;

/// Route selected by a switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchDirection {
    /// The straight route is online.
    #[default]
    Straight,
    /// The diverging route is online.
    Curve,
}

impl SwitchDirection {
    /// The other direction.
    pub fn toggled(self) -> Self {
        match self {
            Self::Straight => Self::Curve,
            Self::Curve => Self::Straight,
        }
    }
}

/// Switch-specific state of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct Switch {
    position: Point2D,
    name: Label,
    direction: SwitchDirection,
    straight: Option<Connection>,
    curve: Option<Connection>,
    direction_dirty: bool,
}

impl Switch {
    /// A switch at `position`, set straight, with no routes bound yet.
    ///
    /// A fresh switch starts dirty so the first delta snapshot reports it.
    pub fn new(position: Point2D) -> Self {
        Self {
            position,
            name: Label::new(),
            direction: SwitchDirection::Straight,
            straight: None,
            curve: None,
            direction_dirty: true,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = label(name);
        self
    }

    /// Physical position (start and end of the zero-length track).
    pub fn position(&self) -> Point2D {
        self.position
    }

    pub(crate) fn position_ref(&self) -> &Point2D {
        &self.position
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current direction.
    pub fn direction(&self) -> SwitchDirection {
        self.direction
    }

    /// Switch to `direction`. Returns `false` (and changes nothing) when the
    /// switch already points that way.
    pub fn change_direction(&mut self, direction: SwitchDirection) -> bool {
        if self.direction == direction {
            return false;
        }
        self.direction = direction;
        self.direction_dirty = true;
        true
    }

    /// The route bound to `direction`, whether online or not.
    pub fn route(&self, direction: SwitchDirection) -> Option<Connection> {
        match direction {
            SwitchDirection::Straight => self.straight,
            SwitchDirection::Curve => self.curve,
        }
    }

    /// The connection currently acting as `next`.
    pub fn online(&self) -> Option<Connection> {
        self.route(self.direction)
    }

    /// The parked connection.
    pub fn offline(&self) -> Option<Connection> {
        self.route(self.direction.toggled())
    }

    /// Bind the route for `direction`.
    pub(crate) fn bind(&mut self, direction: SwitchDirection, connection: Connection) {
        match direction {
            SwitchDirection::Straight => self.straight = Some(connection),
            SwitchDirection::Curve => self.curve = Some(connection),
        }
    }

    /// Whether the direction changed since it was last reported.
    pub fn is_direction_dirty(&self) -> bool {
        self.direction_dirty
    }

    /// Clear the dirty flag, returning its previous value.
    pub fn take_direction_dirty(&mut self) -> bool {
        core::mem::take(&mut self.direction_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_switch() -> Switch {
        let mut sw = Switch::new(Point2D::new(5.0, 5.0));
        sw.bind(
            SwitchDirection::Straight,
            Connection {
                track: 10,
                head: true,
            },
        );
        sw.bind(
            SwitchDirection::Curve,
            Connection {
                track: 11,
                head: false,
            },
        );
        sw
    }

    #[test]
    fn online_follows_direction() {
        let mut sw = bound_switch();
        assert_eq!(sw.online().map(|c| c.track), Some(10));
        assert_eq!(sw.offline().map(|c| c.track), Some(11));

        assert!(sw.change_direction(SwitchDirection::Curve));
        assert_eq!(sw.online().map(|c| c.track), Some(11));
        assert_eq!(sw.offline().map(|c| c.track), Some(10));
    }

    #[test]
    fn change_direction_is_idempotent() {
        let mut sw = bound_switch();
        sw.take_direction_dirty();

        assert!(sw.change_direction(SwitchDirection::Curve));
        assert!(sw.take_direction_dirty());

        assert!(!sw.change_direction(SwitchDirection::Curve));
        assert!(!sw.is_direction_dirty());
        assert_eq!(sw.online().map(|c| c.track), Some(11));
    }

    #[test]
    fn new_switch_is_dirty() {
        let mut sw = Switch::new(Point2D::ORIGIN).with_name("S1");
        assert_eq!(sw.name(), "S1");
        assert!(sw.take_direction_dirty());
        assert!(!sw.take_direction_dirty());
    }
}
