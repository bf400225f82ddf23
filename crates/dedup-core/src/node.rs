//! Node identity.

use crate::error::{Error, Result};

/// A small positive integer assigned at node startup, embedded in every
/// fingerprint record the node advertises so the client can attribute
/// matches back to the node that owns them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdentity(i32);

impl NodeIdentity {
    pub fn new(id: i32) -> Result<Self> {
        if id <= 0 {
            return Err(Error::config(format!(
                "node id must be a positive integer, got {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_ids() {
        assert!(NodeIdentity::new(0).is_err());
        assert!(NodeIdentity::new(-1).is_err());
        assert!(NodeIdentity::new(1).is_ok());
    }
}
