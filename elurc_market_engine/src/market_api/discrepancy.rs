//! Payment discrepancy detection.
//!
//! A confirmed payment is compared against the order total. Overpayments are always accepted. Underpayments no
//! larger than the configured tolerance are accepted too, and anything short beyond that is held for an admin.
use elurc_common::Lamports;

use crate::db_types::{DiscrepancyResolution, DiscrepancyType, PaymentDiscrepancy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAssessment {
    Exact(PaymentDiscrepancy),
    /// The amount differs, but not enough to need a human.
    AutoAccepted(PaymentDiscrepancy),
    /// Underpaid beyond the tolerance. The order stays unpaid until an admin approves or rejects it.
    NeedsReview(PaymentDiscrepancy),
}

impl PaymentAssessment {
    /// Whether the order can be marked as paid straight away.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PaymentAssessment::NeedsReview(_))
    }

    pub fn discrepancy(&self) -> &PaymentDiscrepancy {
        match self {
            PaymentAssessment::Exact(d) | PaymentAssessment::AutoAccepted(d) | PaymentAssessment::NeedsReview(d) => d,
        }
    }

    pub fn into_discrepancy(self) -> PaymentDiscrepancy {
        match self {
            PaymentAssessment::Exact(d) | PaymentAssessment::AutoAccepted(d) | PaymentAssessment::NeedsReview(d) => d,
        }
    }
}

pub fn assess_payment(expected: Lamports, received: Lamports, tolerance: Lamports) -> PaymentAssessment {
    let difference = received - expected;
    if difference == Lamports::default() {
        return PaymentAssessment::Exact(PaymentDiscrepancy::exact(received));
    }
    let (discrepancy_type, resolution) = if difference.is_negative() {
        let resolution = if difference.abs() <= tolerance {
            DiscrepancyResolution::AutoAccepted
        } else {
            DiscrepancyResolution::Pending
        };
        (DiscrepancyType::Underpayment, resolution)
    } else {
        (DiscrepancyType::Overpayment, DiscrepancyResolution::AutoAccepted)
    };
    let discrepancy = PaymentDiscrepancy {
        has_discrepancy: true,
        discrepancy_type: Some(discrepancy_type),
        difference_amount: difference.abs(),
        received_amount: Some(received),
        resolution: Some(resolution),
        resolution_notes: None,
    };
    match resolution {
        DiscrepancyResolution::Pending => PaymentAssessment::NeedsReview(discrepancy),
        _ => PaymentAssessment::AutoAccepted(discrepancy),
    }
}
