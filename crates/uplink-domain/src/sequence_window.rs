//! Delivery success-rate from a bounded window of sequence numbers.

use crate::error::{DomainError, DomainResult};
use crate::types::SEQUENCE_NUMBER_MAX;

/// How many recent messages feed the success-rate computation
pub const SUCCESS_RATE_WINDOW: usize = 100;

/// Compute the delivery success-rate, as a percentage rounded to two
/// decimals, from a window of sequence numbers ordered newest first.
///
/// The expected message count is `newest - oldest + 1`; when the window
/// wrapped past the sequence boundary (oldest > newest) a full cycle minus
/// one is added back. The rate is the fraction of expected messages actually
/// present in the window.
///
/// Fails with `InsufficientWindow` under two entries (rate undefined) and
/// with `SequenceAnomaly` when malformed sequence numbers make the expected
/// count non-positive.
pub fn compute_success_rate(sequence_numbers_newest_first: &[u16]) -> DomainResult<f64> {
    let received = sequence_numbers_newest_first.len();
    if received < 2 {
        return Err(DomainError::InsufficientWindow(received));
    }

    let (newest, oldest) = match (
        sequence_numbers_newest_first.first(),
        sequence_numbers_newest_first.last(),
    ) {
        (Some(&newest), Some(&oldest)) => (newest, oldest),
        _ => return Err(DomainError::InsufficientWindow(received)),
    };

    let mut expected = i64::from(newest) - i64::from(oldest) + 1;
    if oldest > newest {
        expected += i64::from(SEQUENCE_NUMBER_MAX);
    }

    if expected <= 0 {
        return Err(DomainError::SequenceAnomaly { newest, oldest });
    }

    let rate = (received as f64 / expected as f64) * 100.0;
    Ok((rate * 100.0).round() / 100.0)
}
