use serde::Deserialize;

/// Location permissions held by the process. Either kind is enough to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LocationPermissions {
    /// Precise (GPS-grade) location
    #[serde(default = "default_granted")]
    pub fine: bool,
    /// Approximate (network/IP) location
    #[serde(default = "default_granted")]
    pub coarse: bool,
}

fn default_granted() -> bool {
    true
}

impl Default for LocationPermissions {
    fn default() -> Self {
        Self {
            fine: true,
            coarse: true,
        }
    }
}

impl LocationPermissions {
    #[cfg(test)]
    pub fn denied() -> Self {
        Self {
            fine: false,
            coarse: false,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.fine || self.coarse
    }
}

/// Answers whether location may be read right now
pub trait PermissionCheck: Send + Sync {
    fn location_permissions(&self) -> LocationPermissions;
}

impl PermissionCheck for LocationPermissions {
    fn location_permissions(&self) -> LocationPermissions {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_either_permission_is_sufficient() {
        let fine_only = LocationPermissions {
            fine: true,
            coarse: false,
        };
        let coarse_only = LocationPermissions {
            fine: false,
            coarse: true,
        };

        assert!(fine_only.is_granted());
        assert!(coarse_only.is_granted());
        assert!(LocationPermissions::default().is_granted());
        assert!(!LocationPermissions::denied().is_granted());
    }

    #[test]
    fn test_missing_fields_default_to_granted() {
        let perms: LocationPermissions = serde_json::from_str(r#"{"fine": false}"#).unwrap();
        assert!(!perms.fine);
        assert!(perms.coarse);
    }
}
