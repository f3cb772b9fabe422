//! Two-attempt color fallback

use crate::processing::color::ColorProfile;
use crate::processing::segmentation::Detection;

/// Where the policy is in its two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    TryConfiguredColor,
    TryDefaultColor,
    Exhausted,
}

impl FallbackState {
    /// Advance after an attempt. A found region ends the search.
    fn next(self, found: bool) -> Self {
        match (self, found) {
            (_, true) => FallbackState::Exhausted,
            (FallbackState::TryConfiguredColor, false) => FallbackState::TryDefaultColor,
            (_, false) => FallbackState::Exhausted,
        }
    }
}

/// Result of running the policy: the last attempt made and how many were
/// needed.
#[derive(Debug)]
pub struct FallbackOutcome<S> {
    pub result: S,
    pub profile: ColorProfile,
    pub attempts: u8,
}

impl<S: AsRef<Detection>> FallbackOutcome<S> {
    pub fn detection(&self) -> &Detection {
        self.result.as_ref()
    }
}

/// Try the configured profile first, then black once. The second attempt
/// runs even when the configured profile already is black.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    configured: ColorProfile,
}

impl FallbackPolicy {
    pub fn new(configured: ColorProfile) -> Self {
        Self { configured }
    }

    pub fn configured(&self) -> ColorProfile {
        self.configured
    }

    pub fn run<S, E, F>(&self, mut attempt: F) -> Result<FallbackOutcome<S>, E>
    where
        S: AsRef<Detection>,
        F: FnMut(ColorProfile) -> Result<S, E>,
    {
        let mut state = FallbackState::TryConfiguredColor;
        let mut attempts = 0u8;
        loop {
            let profile = match state {
                FallbackState::TryConfiguredColor => self.configured,
                _ => ColorProfile::DEFAULT,
            };

            let result = attempt(profile)?;
            attempts += 1;
            state = state.next(result.as_ref().is_found());

            if state == FallbackState::Exhausted {
                return Ok(FallbackOutcome {
                    result,
                    profile,
                    attempts,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Point;

    fn hit() -> Detection {
        Detection::Found {
            centroid: Point::new(10, 2),
            area: 50.0,
        }
    }

    #[test]
    fn test_configured_hit_stops_after_one_attempt() {
        let policy = FallbackPolicy::new(ColorProfile::Green);
        let mut tried = Vec::new();
        let outcome = policy
            .run(|profile| {
                tried.push(profile);
                Ok::<_, ()>(hit())
            })
            .unwrap();
        assert_eq!(tried, vec![ColorProfile::Green]);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.profile, ColorProfile::Green);
    }

    #[test]
    fn test_falls_back_to_black() {
        let policy = FallbackPolicy::new(ColorProfile::Green);
        let mut tried = Vec::new();
        let outcome = policy
            .run(|profile| {
                tried.push(profile);
                Ok::<_, ()>(if profile == ColorProfile::Black {
                    hit()
                } else {
                    Detection::NotFound
                })
            })
            .unwrap();
        assert_eq!(tried, vec![ColorProfile::Green, ColorProfile::Black]);
        assert_eq!(outcome.profile, ColorProfile::Black);
        assert_eq!(*outcome.detection(), hit());
    }

    #[test]
    fn test_both_miss_is_not_found() {
        let policy = FallbackPolicy::new(ColorProfile::Blue);
        let outcome = policy.run(|_| Ok::<_, ()>(Detection::NotFound)).unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(*outcome.detection(), Detection::NotFound);
    }

    #[test]
    fn test_black_is_retried_as_black() {
        let policy = FallbackPolicy::new(ColorProfile::Black);
        let mut tried = Vec::new();
        policy
            .run(|profile| {
                tried.push(profile);
                Ok::<_, ()>(Detection::NotFound)
            })
            .unwrap();
        assert_eq!(tried, vec![ColorProfile::Black, ColorProfile::Black]);
    }

    #[test]
    fn test_error_stops_policy() {
        let policy = FallbackPolicy::new(ColorProfile::Red);
        let mut calls = 0;
        let result: Result<FallbackOutcome<Detection>, &str> = policy.run(|_| {
            calls += 1;
            Err("cv failure")
        });
        assert_eq!(result.unwrap_err(), "cv failure");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(FallbackState::TryConfiguredColor.next(false), FallbackState::TryDefaultColor);
        assert_eq!(FallbackState::TryConfiguredColor.next(true), FallbackState::Exhausted);
        assert_eq!(FallbackState::TryDefaultColor.next(false), FallbackState::Exhausted);
        assert_eq!(FallbackState::TryDefaultColor.next(true), FallbackState::Exhausted);
    }
}
