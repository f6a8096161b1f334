//! Identity types for cars on the road

use std::fmt;

/// Car identity - an opaque caller-chosen string, unique while the car is on the road
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarId(String);

impl CarId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        CarId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CarId {
    #[inline]
    fn from(id: &str) -> Self {
        CarId(id.to_owned())
    }
}

impl From<String> for CarId {
    #[inline]
    fn from(id: String) -> Self {
        CarId(id)
    }
}

impl AsRef<str> for CarId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Car({})", self.0)
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
