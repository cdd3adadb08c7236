//! Payment provider boundary.
//!
//! Real gateway integration is out of scope; the trait keeps the seam so a
//! webhook-driven provider can replace the mock without touching the
//! booking engine.

use thiserror::Error;

use gatepass_bookings::BookingId;

#[derive(Debug, Error)]
pub enum PaymentProviderError {
    #[error("payment provider refused: {0}")]
    Refused(String),
}

/// Boundary to the external payment gateway.
pub trait PaymentProvider: Send + Sync {
    /// Open a payment for a booking; returns the provider's reference.
    fn initiate(&self, booking_id: BookingId, amount: u64)
    -> Result<String, PaymentProviderError>;

    /// Confirm a previously initiated payment.
    fn confirm(&self, provider_ref: &str) -> Result<(), PaymentProviderError>;
}

/// Simulated gateway that always succeeds.
///
/// The reference is derived from the booking id's random tail, so retries
/// of the same logical booking produce the same reference.
#[derive(Debug, Default)]
pub struct MockPaymentProvider;

impl PaymentProvider for MockPaymentProvider {
    fn initiate(
        &self,
        booking_id: BookingId,
        _amount: u64,
    ) -> Result<String, PaymentProviderError> {
        let simple = booking_id.0.as_uuid().simple().to_string();
        Ok(format!("mock_{}", &simple[24..]))
    }

    fn confirm(&self, _provider_ref: &str) -> Result<(), PaymentProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::AggregateId;

    #[test]
    fn reference_is_stable_per_booking() {
        let provider = MockPaymentProvider;
        let booking_id = BookingId::new(AggregateId::new());

        let a = provider.initiate(booking_id, 1_000).unwrap();
        let b = provider.initiate(booking_id, 1_000).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("mock_"));
    }

    #[test]
    fn references_differ_between_bookings() {
        let provider = MockPaymentProvider;
        let a = provider
            .initiate(BookingId::new(AggregateId::new()), 1_000)
            .unwrap();
        let b = provider
            .initiate(BookingId::new(AggregateId::new()), 1_000)
            .unwrap();
        assert_ne!(a, b);
    }
}
