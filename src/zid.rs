use std::fmt::{Debug, Display, Formatter};

/// Identifier of a live relay connection.
///
/// Assigned uniformly at random on accept and advertised to the client in the
/// announce frame. It is opaque and non-enumerable: it carries no ordering or
/// addressing semantics and is valid only while the connection it names is
/// registered.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Zid(pub u32);

impl Display for Zid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for Zid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Zid({:08x})", self.0)
    }
}

impl From<u32> for Zid {
    fn from(raw: u32) -> Self {
        Zid(raw)
    }
}
