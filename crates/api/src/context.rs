use gatepass_auth::{JwtClaims, Role};
use gatepass_bookings::BookerContact;
use gatepass_core::UserId;

/// Principal context for a request (authenticated identity + role).
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    role: Role,
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            name: claims.name.clone(),
            phone: claims.phone.clone(),
            email: claims.email.clone(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Contact snapshot recorded on bookings made by this caller.
    pub fn booker_contact(&self) -> BookerContact {
        BookerContact {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}
