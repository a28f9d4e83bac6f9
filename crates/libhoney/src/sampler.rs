// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use crate::event::ValidatedEvent;

/// Source of uniform draws in `[0, 1)`. Injected so sampling can be made deterministic.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

impl<F> RandomSource for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn next_f64(&self) -> f64 {
        self()
    }
}

/// Draws from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Keeps roughly one out of every `sample_rate` events.
pub struct Sampler {
    random: Box<dyn RandomSource>,
}

impl Sampler {
    #[must_use]
    pub fn new(random: Box<dyn RandomSource>) -> Self {
        Self { random }
    }

    #[must_use]
    pub fn should_send(&self, event: &ValidatedEvent) -> bool {
        should_send_with(event.sample_rate(), self.random.next_f64())
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(Box::new(ThreadRandom))
    }
}

impl Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sampler")
    }
}

fn should_send_with(sample_rate: u32, draw: f64) -> bool {
    if sample_rate <= 1 {
        return true;
    }
    draw < 1.0 / f64::from(sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use proptest::prelude::*;

    fn event(sample_rate: u32) -> ValidatedEvent {
        Event::new("http://localhost", "key", "ds")
            .with_sample_rate(sample_rate)
            .validate()
            .expect("valid event")
    }

    #[test]
    fn test_boundary_draws() {
        let keep = Sampler::new(Box::new(|| 0.0999));
        let drop = Sampler::new(Box::new(|| 0.1));
        assert!(keep.should_send(&event(10)));
        assert!(!drop.should_send(&event(10)));
    }

    #[test]
    fn test_unsampled_events_ignore_the_draw() {
        let sampler = Sampler::new(Box::new(|| 0.999_999));
        assert!(sampler.should_send(&event(1)));
    }

    #[test]
    fn test_rate_converges() {
        let sampler = Sampler::default();
        let ev = event(4);
        let kept = (0..40_000).filter(|_| sampler.should_send(&ev)).count();
        let ratio = kept as f64 / 40_000.0;
        assert!((ratio - 0.25).abs() < 0.02, "ratio was {ratio}");
    }

    proptest! {
        #[test]
        fn prop_rate_one_or_less_always_sends(draw in 0.0f64..1.0) {
            prop_assert!(should_send_with(0, draw));
            prop_assert!(should_send_with(1, draw));
        }

        #[test]
        fn prop_decision_matches_threshold(rate in 2u32..10_000, draw in 0.0f64..1.0) {
            prop_assert_eq!(should_send_with(rate, draw), draw < 1.0 / f64::from(rate));
        }
    }
}
