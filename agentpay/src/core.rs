//! Core traits shared by the payment schemes.

use crate::transport::{PaymentOption, PaymentPayload};

/// A payment authorization scheme, e.g. `exact`.
pub trait Scheme {
    /// The scheme-specific body of the `X-PAYMENT` payload.
    type Payload;
    /// Scheme name as it appears in `PaymentOption::scheme`.
    const SCHEME_NAME: &'static str;

    /// Whether a challenge option asks for this scheme.
    fn accepts(option: &PaymentOption) -> bool {
        option.scheme.eq_ignore_ascii_case(Self::SCHEME_NAME)
    }
}

/// The full `X-PAYMENT` value for scheme `S`.
pub type SchemePayload<S> = PaymentPayload<<S as Scheme>::Payload>;
