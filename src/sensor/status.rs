use std::fmt;

/// Represents the status of a sensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// A sensor of this type has never been brought up. It is likely that a
    /// sensor of this type is not connected.
    Missing,

    /// The sensor is connected and healthy.
    Up,

    /// The sensor has previously been brought up successfully, but it is no
    /// longer healthy.
    Down,
}

impl Status {
    /// Whether the sensor needs to be (re)initialized before it is polled.
    #[must_use]
    pub fn needs_bringup(self) -> bool {
        self != Status::Up
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Missing => "missing",
            Status::Up => "up",
            Status::Down => "down",
        })
    }
}
