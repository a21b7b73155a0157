// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Traits for checksum calculation and manipulation

use std::fmt::Debug;

/// A trait for checksum calculation and manipulation.
///
/// This trait is used to calculate and manipulate checksums in various headers.
pub trait Checksum {
    /// The error type for the header.
    ///
    /// This is used to represent the error type in case of failure.
    type Error;
    /// The payload type for the header.
    ///
    /// This is used to calculate the checksum.
    type Payload<'a>: ?Sized
    where
        Self: 'a;
    /// The checksum type.
    ///
    /// This is used to represent the checksum value.
    type Checksum: Eq + Copy + Sized + Debug + From<u16> + Into<u16>;

    /// Get the checksum value from the header
    ///
    /// # Returns
    ///
    /// Returns `None` if the checksum is not present.
    fn checksum(&self) -> Option<Self::Checksum>;

    /// Compute the checksum value from the header and payload
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if checksum computation fails.
    fn compute_checksum(&self, payload: &Self::Payload<'_>) -> Result<Self::Checksum, Self::Error>;

    /// Set the checksum value in the header.
    ///
    /// # Safety
    ///
    /// The validity of the checksum is not checked.
    ///
    /// The contract of the [`Checksum`] trait _does not_ require that the implementation of this
    /// function be free of panics.
    /// "Normal" input should never cause this trait to panic, but truly exceptional conditions
    /// such as wildly out of the ordinary MTU values (e.g., 2^32) may not be possible to handle
    /// without a panic.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if checksum computation fails or if the checksum is invalid.
    fn set_checksum(&mut self, checksum: Self::Checksum) -> Result<&mut Self, Self::Error>;

    /// Validate the checksum value in the header.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if checksum computation fails or if the checksum is invalid.
    fn validate_checksum(
        &self,
        payload: &Self::Payload<'_>,
    ) -> Result<Self::Checksum, ChecksumError<Self>> {
        let checksum_result = self.compute_checksum(payload);
        let expected = match checksum_result {
            Ok(checksum) => checksum,
            Err(error) => return Err(ChecksumError::Compute { error }),
        };
        let Some(actual) = self.checksum() else {
            return Err(ChecksumError::NotPresent);
        };
        if expected == actual {
            Ok(expected)
        } else {
            Err(ChecksumError::Mismatch { expected, actual })
        }
    }

    /// Update the checksum value in the header.
    ///
    /// The post-condition of this function is that the checksum is valid.
    /// I.e., the `validate_checksum` function will not return an `Err` variant when given the same
    /// value for `payload` as was passed into this function.
    ///
    /// # Errors
    ///
    /// Returns a [`ChecksumError`] if checksum computation fails, if setting the checksum fails,
    /// or if the checksum is invalid.
    fn update_checksum(&mut self, payload: &Self::Payload<'_>) -> Result<&mut Self, Self::Error> {
        let ret = self.set_checksum(self.compute_checksum(payload)?)?;
        #[cfg(debug_assertions)]
        #[allow(clippy::panic)] // this is basically a debug_assert
        match ret.validate_checksum(payload) {
            Ok(_) => {}
            Err(ChecksumError::Mismatch { expected, actual }) => {
                panic!(
                    "checksum implementation is faulty: expected: {expected:?}, actual: {actual:?}",
                );
            }
            Err(ChecksumError::Compute { error }) => {
                return Err(error);
            }
            Err(ChecksumError::NotPresent) => {
                unreachable!() // We managed to compute the checksum at the beginning of the function
            }
        }
        Ok(ret)
    }

    /// Perform an incremental update of the checksum in the header, to account for the change of a
    /// 16-bit value in the header, without recomputing the whole checksum but using the algorithm
    /// described in RFC 1624 "Computation of the Internet Checksum via Incremental Update"
    //
    // Implement this as a default method rather than relying on individual's Self::Checksum types
    // implementations, because etherparse currendly doesn't offer a way to compute incremental
    // updates for checksums.
    fn increment_update_checksum(
        &mut self,
        current_checksum: Self::Checksum,
        old_value: u16,
        new_value: u16,
    ) -> Self::Checksum {
        // From RFC 1624:
        //
        // Given the following notation:
        //
        //     HC  - old checksum in header
        //     C   - one's complement sum of old header
        //     HC' - new checksum in header
        //     C'  - one's complement sum of new header
        //     m   - old value of a 16-bit field
        //     m'  - new value of a 16-bit field
        //
        // [...]
        //
        //     HC' = ~(C + (-m) + m')    --    [Eqn. 3]
        //         = ~(~HC + ~m + m')
        //
        // [...] the two additional instructions can be eliminated by subtracting complements with
        // borrow [...]:
        //
        //     HC' = HC - ~m - m'    --    [Eqn. 4]

        // First subtraction: HC - ~m
        let (mut tmp, borrow) = current_checksum.into().overflowing_sub(!old_value);
        if borrow {
            tmp = tmp.wrapping_sub(1);
        }

        // Second subtraction: tmp - m'
        let (mut result, borrow) = tmp.overflowing_sub(new_value);
        if borrow {
            result = result.wrapping_sub(1);
        }

        result.into()
    }

    /// Perform an incremental update of the checksum in the header, like `increment_update_checksum`
    /// but for a 32-bit value change.
    fn increment_update_checksum_32bit(
        &mut self,
        current_checksum: Self::Checksum,
        old_value: u32,
        new_value: u32,
    ) -> Self::Checksum {
        let old_value_first_half = (old_value >> 16) as u16;
        #[allow(clippy::cast_possible_truncation)] // truncation is intentional
        let old_value_second_half = old_value as u16;
        let new_value_first_half = (new_value >> 16) as u16;
        #[allow(clippy::cast_possible_truncation)] // truncation is intentional
        let new_value_second_half = new_value as u16;

        let intermediary_checksum = self.increment_update_checksum(
            current_checksum,
            old_value_first_half,
            new_value_first_half,
        );
        self.increment_update_checksum(
            intermediary_checksum,
            old_value_second_half,
            new_value_second_half,
        )
    }
}

/// An error resulting from a checksum mismatch.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError<T: Checksum + ?Sized> {
    /// The checksum in the header does not match the computed checksum.
    #[error("checksum mismatch: expected {expected:?}, actual {actual:?}")]
    Mismatch {
        /// The expected (computed) checksum.
        expected: T::Checksum,
        /// The actual checksum in the header.
        actual: T::Checksum,
    },
    /// The checksum computation failed.
    #[error("checksum computation failed: {error:?}")]
    Compute {
        /// The error that occurred during checksum computation.
        error: T::Error,
    },
    /// The checksum is not present in the header.
    #[error("checksum not present")]
    NotPresent,
}

#[cfg(test)]
mod tests {
    use crate::checksum::{Checksum, ChecksumError};

    /// A minimal header carrying a 32-bit value and its one's-complement checksum, used only to
    /// exercise the default trait methods above.
    #[derive(Debug, Clone, Copy, Default, bolero::TypeGenerator)]
    struct ToyHeader {
        value: u32,
        checksum: u16,
    }

    fn ones_complement_sum(value: u32) -> u16 {
        let hi = (value >> 16) as u16;
        #[allow(clippy::cast_possible_truncation)]
        let lo = value as u16;
        let (sum, carry) = hi.overflowing_add(lo);
        !if carry { sum + 1 } else { sum }
    }

    impl Checksum for ToyHeader {
        type Error = std::convert::Infallible;
        type Payload<'a> = ();
        type Checksum = u16;

        fn checksum(&self) -> Option<Self::Checksum> {
            Some(self.checksum)
        }

        fn compute_checksum(&self, _payload: &()) -> Result<Self::Checksum, Self::Error> {
            Ok(ones_complement_sum(self.value))
        }

        fn set_checksum(&mut self, checksum: Self::Checksum) -> Result<&mut Self, Self::Error> {
            self.checksum = checksum;
            Ok(self)
        }
    }

    fn update_and_check_checksum(header: &ToyHeader, new_value: u32) {
        let mut header = *header;

        header.update_checksum(&()).expect("update checksum failed");
        header
            .validate_checksum(&())
            .expect("expected valid checksum after initial update");

        let checksum = header.checksum().unwrap();
        let old_value = header.value;
        header.value = new_value;

        let new_checksum = header.increment_update_checksum_32bit(checksum, old_value, new_value);
        header
            .set_checksum(new_checksum)
            .expect("set checksum failed");
        header
            .validate_checksum(&())
            .expect("expected valid checksum after value change");
    }

    #[test]
    fn test_increment_update_checksum() {
        bolero::check!()
            .with_type()
            .for_each(|(header, new_value): &(ToyHeader, u32)| {
                update_and_check_checksum(header, *new_value);
            });
    }

    #[test]
    fn mismatch_is_detected() {
        let mut header = ToyHeader {
            value: 0xdead_beef,
            checksum: 0,
        };
        header.update_checksum(&()).unwrap();
        header.checksum = header.checksum.wrapping_add(1);
        match header.validate_checksum(&()) {
            Err(ChecksumError::Mismatch { .. }) => {}
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
