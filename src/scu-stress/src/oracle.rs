use std::fmt;
use std::sync::OnceLock;

use scu_api::misc::BuildInfoResponse;
use scu_api::rm::MemoryRegion;
use scu_api::seco::SecvioWords;

use crate::error::Mismatch;

/// A probe result. Results are compared by their bytes, not by meaning.
pub trait ProbeValue: Clone + fmt::Display + Send + Sync {
    fn to_bytes(&self) -> Vec<u8>;
}

impl ProbeValue for BuildInfoResponse {
    fn to_bytes(&self) -> Vec<u8> {
        [self.build, self.commit]
            .into_iter()
            .flat_map(u32::to_le_bytes)
            .collect()
    }
}

impl ProbeValue for MemoryRegion {
    fn to_bytes(&self) -> Vec<u8> {
        vec![self.0]
    }
}

impl ProbeValue for SecvioWords {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.into_iter().flat_map(u32::to_le_bytes).collect()
    }
}

/// Outcome of a successful [`Oracle::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// This call supplied the reference result.
    Recorded,
    /// The result equals the reference.
    Matched,
}

/// Remembers the first result of a probe and holds every later result to it.
///
/// The reference is written at most once for the life of the oracle. When several threads race on
/// an empty oracle exactly one of them records its value; the others are compared against it.
pub struct Oracle<T> {
    probe: &'static str,
    expected: OnceLock<T>,
}

impl<T: ProbeValue> Oracle<T> {
    pub fn new(probe: &'static str) -> Self {
        Oracle {
            probe,
            expected: OnceLock::new(),
        }
    }

    pub fn check(&self, observed: T) -> Result<Verdict, Mismatch> {
        let mut recorded = false;
        let expected = self.expected.get_or_init(|| {
            recorded = true;
            observed.clone()
        });

        if recorded {
            tracing::info!(probe = self.probe, value = %expected, "first result recorded");
            return Ok(Verdict::Recorded);
        }

        if expected.to_bytes() == observed.to_bytes() {
            Ok(Verdict::Matched)
        } else {
            Err(Mismatch {
                probe: self.probe,
                expected: expected.to_string(),
                observed: observed.to_string(),
            })
        }
    }

    #[inline]
    pub fn expected(&self) -> Option<&T> {
        self.expected.get()
    }

    #[inline]
    pub fn probe(&self) -> &'static str {
        self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(build: u32, commit: u32) -> BuildInfoResponse {
        BuildInfoResponse { build, commit }
    }

    #[test]
    fn first_result_is_recorded_once() {
        let oracle = Oracle::new("build-info");
        assert!(oracle.expected().is_none());
        assert_eq!(oracle.check(info(1, 2)), Ok(Verdict::Recorded));
        assert_eq!(oracle.check(info(1, 2)), Ok(Verdict::Matched));
        assert_eq!(oracle.expected(), Some(&info(1, 2)));
    }

    #[test]
    fn divergent_result_reports_both_values() {
        let oracle = Oracle::new("build-info");
        oracle.check(info(0x1f4a, 0xabc)).unwrap();
        let err = oracle.check(info(0x1f4b, 0xabc)).unwrap_err();
        assert_eq!(
            err,
            Mismatch {
                probe: "build-info",
                expected: "00001f4a 00000abc".to_owned(),
                observed: "00001f4b 00000abc".to_owned(),
            }
        );
        // the reference survives a mismatch
        assert_eq!(oracle.expected(), Some(&info(0x1f4a, 0xabc)));
        assert_eq!(oracle.check(info(0x1f4a, 0xabc)), Ok(Verdict::Matched));
    }

    #[test]
    fn byte_comparison() {
        let oracle = Oracle::new("find-memreg");
        oracle.check(MemoryRegion(3)).unwrap();
        assert!(oracle.check(MemoryRegion(4)).is_err());

        let oracle = Oracle::new("secvio-config");
        oracle.check(SecvioWords([1, 2, 3, 4, 5])).unwrap();
        // same words in a different order are a different result
        assert!(oracle.check(SecvioWords([2, 1, 3, 4, 5])).is_err());
    }
}
