//! Capture permission model.
//!
//! Authorization state lives in the platform, not in this crate: every check
//! queries the live status, and an undetermined status triggers the
//! platform's interactive prompt. Nothing here caches the answer, so a grant
//! or revocation in the system settings is picked up on the next check.

use std::fmt;

use crate::platform::CapturePlatform;

/// A capture capability the platform guards behind user consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Video capture from a physical camera.
    Camera,
    /// Audio capture from the microphone.
    Microphone,
}

impl Capability {
    /// Human-readable name for log and status messages.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Camera => "camera",
            Capability::Microphone => "microphone",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Platform authorization status for one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// The user has not been asked yet; a prompt is required.
    NotDetermined,
    /// Access is blocked by policy (e.g. parental controls); prompting
    /// cannot change it.
    Restricted,
    /// The user explicitly declined access.
    Denied,
    /// Access granted.
    Authorized,
}

impl Authorization {
    /// True only for [`Authorization::Authorized`].
    pub fn is_granted(self) -> bool {
        matches!(self, Authorization::Authorized)
    }

    /// True when the interactive prompt has not been shown yet.
    pub fn needs_prompt(self) -> bool {
        matches!(self, Authorization::NotDetermined)
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::NotDetermined => write!(f, "not determined"),
            Authorization::Restricted => write!(f, "restricted"),
            Authorization::Denied => write!(f, "denied"),
            Authorization::Authorized => write!(f, "authorized"),
        }
    }
}

/// Resolve the authorization for a capability, prompting if needed.
///
/// Queries the live status first; when it is still undetermined, shows the
/// platform's permission dialog and waits for the user's decision. Start
/// operations chain on this so capture is never negotiated before
/// authorization settles.
pub async fn resolve(platform: &dyn CapturePlatform, capability: Capability) -> Authorization {
    let status = platform.authorization_status(capability);
    if !status.needs_prompt() {
        return status;
    }

    log::info!("requesting {} access", capability);
    let resolved = platform.request_access(capability).await;
    log::debug!("{} access request resolved: {}", capability, resolved);
    resolved
}
