//! Soft-404 body fingerprinting.
//!
//! A [`Signature`] is an opaque summary of a response body used by the
//! custom-404 detector to decide whether a later body "looks like" a
//! directory's known not-found page. The implementation favors three
//! invariants over any particular similarity metric: `refine` is
//! idempotent and commutative, and `similar?` is symmetric.
//!
//! The body is tokenized into a set of lowercase words; `refine`
//! intersects token sets (monotone and idempotent by construction, and
//! commutative because set intersection is), and `similar?` compares
//! two signatures by Jaccard distance (symmetric by construction)
//! against a configurable threshold.

use std::collections::BTreeSet;

/// Default relative-difference threshold used by `similar?` when none
/// is supplied explicitly: <=10% token difference counts as the same
/// page.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// A fingerprint derived from a response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    tokens: BTreeSet<String>,
    threshold: f64,
}

impl Signature {
    /// Builds a signature from a raw body using the given similarity
    /// threshold (relative Jaccard distance, 0.0 = identical required).
    pub fn new(body: &[u8], threshold: f64) -> Self {
        Self {
            tokens: tokenize(body),
            threshold,
        }
    }

    /// Builds a signature using [`DEFAULT_THRESHOLD`].
    pub fn with_default_threshold(body: &[u8]) -> Self {
        Self::new(body, DEFAULT_THRESHOLD)
    }

    /// Returns a signature that matches *at least* everything `self`
    /// and `body` have in common.
    ///
    /// Monotone: the result's token set is a subset of `self`'s, so
    /// anything it refused to match before it still refuses now.
    /// Idempotent: refining with a body whose tokens are already a
    /// subset of `self` returns `self` unchanged. Commutative over a
    /// sequence of similar bodies: set intersection does not depend on
    /// the order bodies are folded in.
    pub fn refine(&self, body: &[u8]) -> Signature {
        let other = tokenize(body);
        Signature {
            tokens: self.tokens.intersection(&other).cloned().collect(),
            threshold: self.threshold,
        }
    }

    /// True if `self` and `other` are within the configured relative
    /// distance of one another.
    ///
    /// An empty signature (e.g. from a failed probe or an empty body)
    /// carries no information and matches nothing, not even another
    /// empty signature — otherwise a single flaky, empty-bodied probe
    /// would make a directory's fingerprint match every later body.
    ///
    /// Symmetric by construction (the Jaccard distance of two sets does
    /// not depend on argument order).
    pub fn similar(&self, other: &Signature) -> bool {
        if self.tokens.is_empty() || other.tokens.is_empty() {
            return false;
        }

        let intersection = self.tokens.intersection(&other.tokens).count();
        let union = self.tokens.union(&other.tokens).count();

        let distance = 1.0 - (intersection as f64 / union as f64);
        let threshold = self.threshold.max(other.threshold);
        distance <= threshold
    }

    /// Number of distinct tokens retained by this signature. Exposed
    /// mainly for diagnostics and tests.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

fn tokenize(body: &[u8]) -> BTreeSet<String> {
    let text = String::from_utf8_lossy(body);
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.len() >= 3)
        .map(|tok| tok.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_is_idempotent() {
        let sig = Signature::with_default_threshold(b"Page Not Found on this server");
        let once = sig.refine(b"Page Not Found on this server");
        let twice = once.refine(b"Page Not Found on this server");
        assert_eq!(once, twice);
    }

    #[test]
    fn refine_is_commutative_over_similar_bodies() {
        let base = Signature::with_default_threshold(b"error not found missing page");
        let a = base.refine(b"error not found missing resource");
        let a_then_b = a.refine(b"error not found absent page");

        let b = base.refine(b"error not found absent page");
        let b_then_a = b.refine(b"error not found missing resource");

        assert_eq!(a_then_b, b_then_a);
    }

    #[test]
    fn similar_is_symmetric() {
        let a = Signature::with_default_threshold(b"not found error 404 missing page");
        let b = Signature::with_default_threshold(b"not found error 404 missing content");
        assert_eq!(a.similar(&b), b.similar(&a));
    }

    #[test]
    fn similar_bodies_within_threshold_match() {
        let a = Signature::with_default_threshold(b"the requested page could not be found here");
        let b = a.refine(b"the requested page could not be located here");
        assert!(a.similar(&a.refine(b"the requested page could not be found here")));
        assert!(b.similar(&a.refine(b"the requested page could not be located here")));
    }

    #[test]
    fn dissimilar_bodies_do_not_match() {
        let a = Signature::with_default_threshold(b"not found error missing page gone");
        let b = Signature::with_default_threshold(b"welcome to the dashboard overview panel");
        assert!(!a.similar(&b));
    }

    #[test]
    fn empty_signature_matches_nothing_not_even_another_empty_one() {
        let empty = Signature::with_default_threshold(b"");
        let other_empty = Signature::with_default_threshold(b"");
        let non_empty = Signature::with_default_threshold(b"not found error missing page gone");
        assert!(!empty.similar(&other_empty));
        assert!(!empty.similar(&non_empty));
        assert!(!non_empty.similar(&empty));
    }
}
