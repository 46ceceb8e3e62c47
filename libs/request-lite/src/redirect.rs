//! Redirect policy.
//!
//! Only `301` and `302` responses carrying a `Location` header are redirect
//! candidates. A candidate is then cancelled when the method is not `GET`
//! (unless all redirects are followed), when the redirect limit is reached,
//! or when a caller predicate declines it.

use crate::prepared::{FollowRedirect, PreparedRequest};
use crate::response::ResponseHead;
use http::{Method, StatusCode};
use std::fmt;

/// Lifecycle of a single attempt
///
/// `Dispatched -> AwaitingBody -> Completed`, or
/// `Dispatched -> Redirecting -> Dispatched` for the next attempt.
/// `Failed` is terminal and can be reached from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Dispatched,
    AwaitingBody,
    Redirecting,
    Completed,
    Failed,
}

impl AttemptState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatched => "dispatched",
            Self::AwaitingBody => "awaiting_body",
            Self::Redirecting => "redirecting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a response is delivered instead of followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Redirect following is turned off
    Disabled,
    /// Not a 301/302, or no `Location` header
    NotRedirect,
    /// Non-GET request without `follow_all_redirects`
    MethodNotGet,
    /// `redirect_count` reached `max_redirects`
    LimitReached,
    /// The caller predicate returned false
    PredicateDeclined,
}

/// Outcome of evaluating a response head
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Follow the contained `Location` value
    Follow(String),
    /// Deliver this response
    Stop(StopReason),
}

/// Decide whether the response described by `head` should be followed
///
/// The predicate is only consulted once every other check has passed.
#[must_use]
pub fn evaluate(head: &ResponseHead, request: &PreparedRequest) -> RedirectDecision {
    if matches!(request.follow_redirect(), FollowRedirect::Never) {
        return RedirectDecision::Stop(StopReason::Disabled);
    }

    let location = match head.location() {
        Some(location)
            if matches!(
                head.status(),
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
            ) =>
        {
            location
        }
        _ => return RedirectDecision::Stop(StopReason::NotRedirect),
    };

    if request.method() != Method::GET && !request.follow_all_redirects() {
        return RedirectDecision::Stop(StopReason::MethodNotGet);
    }
    if request.redirect_count() >= request.max_redirects() {
        return RedirectDecision::Stop(StopReason::LimitReached);
    }
    if let FollowRedirect::When(predicate) = request.follow_redirect()
        && !predicate.allows(head)
    {
        return RedirectDecision::Stop(StopReason::PredicateDeclined);
    }

    RedirectDecision::Follow(location.to_owned())
}
