//! Fan-out/fan-in aggregation of a user's profile and posts.
//!
//! One call runs the user fetch and the posts fetch concurrently under a
//! single derived [`RequestContext`]. The first failure wins the
//! [`FirstFailure`] slot and cancels the context, so the sibling stops at
//! its next suspension point. A partial summary is never returned.

mod first_failure;

pub use first_failure::FirstFailure;

use crate::context::RequestContext;
use crate::error::{Resource, SummaryError};
use crate::fetcher::Fetcher;
use crate::models::{Post, UserProfile, UserSummary};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Used when no positive overall timeout is configured or requested.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub type UserFetcher = Arc<dyn Fetcher<Output = UserProfile>>;
pub type PostsFetcher = Arc<dyn Fetcher<Output = Vec<Post>>>;

/// Merges the user and posts upstreams into one [`UserSummary`].
#[derive(Clone)]
pub struct Aggregator {
    users: UserFetcher,
    posts: PostsFetcher,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(users: UserFetcher, posts: PostsFetcher, timeout: Duration) -> Self {
        Self {
            users,
            posts,
            timeout: effective_timeout(Some(timeout), DEFAULT_TIMEOUT),
        }
    }

    /// Build the summary for `user_id`.
    ///
    /// The call's deadline is the earlier of the parent's and `timeout`
    /// (falling back to the configured timeout when `timeout` is unset or
    /// zero). Non-positive ids fail before any upstream call is made.
    pub async fn get_user_summary(
        &self,
        parent: &RequestContext,
        user_id: i64,
        timeout: Option<Duration>,
    ) -> Result<UserSummary, SummaryError> {
        if user_id <= 0 {
            return Err(SummaryError::InvalidArgument(user_id));
        }

        let timeout = effective_timeout(timeout, self.timeout);
        let budget = call_budget(parent, timeout);
        let ctx = parent.with_timeout(timeout);
        let failure = FirstFailure::new(ctx.token().clone());
        let started = Instant::now();

        debug!(
            user_id,
            remaining_ms = ctx.remaining().map(|d| d.as_millis() as u64),
            "Fetching user summary"
        );

        let user_branch = async {
            match self.users.fetch(user_id, &ctx).await {
                Ok(user) => Some(user),
                Err(error) => {
                    warn!(user_id, error = %error, "User branch failed");
                    failure.record(SummaryError::from_branch(Resource::User, error, budget));
                    None
                }
            }
        };
        let posts_branch = async {
            match self.posts.fetch(user_id, &ctx).await {
                Ok(posts) => Some(posts),
                Err(error) => {
                    warn!(user_id, error = %error, "Posts branch failed");
                    failure.record(SummaryError::from_branch(Resource::Posts, error, budget));
                    None
                }
            }
        };

        // Fetchers observe the context themselves; the outer guard covers
        // any that block past the deadline anyway.
        let joined = match ctx.deadline() {
            Some(deadline) => {
                tokio::time::timeout_at(deadline, async { tokio::join!(user_branch, posts_branch) })
                    .await
                    .ok()
            }
            None => Some(tokio::join!(user_branch, posts_branch)),
        };

        let (user, posts) = match joined {
            Some(results) => results,
            None => {
                failure.record(SummaryError::DeadlineExceeded(budget));
                (None, None)
            }
        };
        ctx.cancel();

        if let Some(error) = failure.into_inner() {
            return Err(error);
        }

        match (user, posts) {
            (Some(user), Some(posts)) => {
                let summary = UserSummary::merge(user, &posts);
                info!(
                    user_id,
                    post_count = summary.post_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "User summary ready"
                );
                Ok(summary)
            }
            _ => Err(SummaryError::Cancelled),
        }
    }
}

/// Time the call actually gets: `timeout`, or what is left of an earlier
/// parent deadline rounded up to whole milliseconds.
fn call_budget(parent: &RequestContext, timeout: Duration) -> Duration {
    match parent.remaining() {
        Some(left) if left < timeout => {
            Duration::from_millis(left.as_nanos().div_ceil(1_000_000) as u64)
        }
        _ => timeout,
    }
}

/// A positive `requested` timeout, else `fallback`, else [`DEFAULT_TIMEOUT`].
fn effective_timeout(requested: Option<Duration>, fallback: Duration) -> Duration {
    match requested {
        Some(timeout) if !timeout.is_zero() => timeout,
        _ if !fallback.is_zero() => fallback,
        _ => DEFAULT_TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::stub::{john_doe, two_posts, StubFetcher, StubOutcome};
    use crate::fetcher::{HttpPostsFetcher, HttpUserFetcher, RetryPolicy};
    use std::sync::atomic::Ordering;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_ok() -> StubFetcher<UserProfile> {
        StubFetcher::new(Resource::User, StubOutcome::Ok(john_doe()))
    }

    fn posts_ok() -> StubFetcher<Vec<Post>> {
        StubFetcher::new(Resource::Posts, StubOutcome::Ok(two_posts()))
    }

    fn aggregator(
        users: StubFetcher<UserProfile>,
        posts: StubFetcher<Vec<Post>>,
        timeout: Duration,
    ) -> Aggregator {
        Aggregator::new(Arc::new(users), Arc::new(posts), timeout)
    }

    #[tokio::test]
    async fn test_summary_success() {
        let agg = aggregator(user_ok(), posts_ok(), Duration::from_secs(2));
        let summary = assert_ok!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert_eq!(summary.display_name, "John Doe");
        assert_eq!(summary.email, "john@example.com");
        assert_eq!(summary.post_count, 2);
    }

    #[tokio::test]
    async fn test_post_count_trusts_upstream_scoping() {
        let posts = StubFetcher::new(
            Resource::Posts,
            StubOutcome::Ok(vec![
                Post { owner_user_id: 1 },
                Post { owner_user_id: 1 },
                Post { owner_user_id: 2 },
            ]),
        );
        let agg = aggregator(user_ok(), posts, Duration::from_secs(2));
        let summary = assert_ok!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert_eq!(summary.post_count, 3);
    }

    #[tokio::test]
    async fn test_invalid_user_id_makes_no_calls() {
        for user_id in [0, -1, i64::MIN] {
            let users = user_ok();
            let posts = posts_ok();
            let user_calls = users.calls();
            let post_calls = posts.calls();
            let agg = aggregator(users, posts, Duration::from_secs(2));

            let err = assert_err!(
                agg.get_user_summary(&RequestContext::background(), user_id, None)
                    .await
            );

            assert!(matches!(err, SummaryError::InvalidArgument(id) if id == user_id));
            assert!(err.to_string().starts_with("invalid user ID"));
            assert_eq!(user_calls.load(Ordering::SeqCst), 0);
            assert_eq!(post_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_user_failure_cancels_posts_branch() {
        let users = StubFetcher::new(Resource::User, StubOutcome::Status(404));
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let posts_interrupted = posts.interrupted();
        let agg = aggregator(users, posts, Duration::from_secs(5));

        let started = Instant::now();
        let err = assert_err!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert!(err.to_string().starts_with("fetching user:"), "{}", err);
        assert!(matches!(err, SummaryError::UpstreamUser(_)));
        assert_eq!(posts_interrupted.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_posts_failure_is_labeled() {
        let posts = StubFetcher::new(Resource::Posts, StubOutcome::Status(500));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(2));

        let err = assert_err!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert!(err.to_string().starts_with("fetching posts:"), "{}", err);
        assert!(matches!(err, SummaryError::UpstreamPosts(_)));
    }

    #[tokio::test]
    async fn test_first_failure_wins_when_both_fail() {
        let users = StubFetcher::new(Resource::User, StubOutcome::Status(500));
        let posts =
            StubFetcher::new(Resource::Posts, StubOutcome::Status(500)).with_delay(Duration::from_millis(200));
        let agg = aggregator(users, posts, Duration::from_secs(2));

        let err = assert_err!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert!(matches!(err, SummaryError::UpstreamUser(_)));
    }

    #[tokio::test]
    async fn test_deadline_exceeded_within_margin() {
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(1));

        let started = Instant::now();
        let err = assert_err!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );
        let elapsed = started.elapsed();

        assert!(matches!(err, SummaryError::DeadlineExceeded(t) if t == Duration::from_secs(1)));
        assert!(elapsed >= Duration::from_millis(900), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1800), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_per_call_timeout_overrides_default() {
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(10));

        let started = Instant::now();
        let err = assert_err!(
            agg.get_user_summary(
                &RequestContext::background(),
                1,
                Some(Duration::from_millis(200))
            )
            .await
        );

        assert!(matches!(err, SummaryError::DeadlineExceeded(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_parent_deadline_is_respected() {
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(10));
        let parent = RequestContext::background().with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = assert_err!(agg.get_user_summary(&parent, 1, None).await);

        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            SummaryError::DeadlineExceeded(budget) => {
                assert!(budget <= Duration::from_millis(200), "budget {:?}", budget);
                assert!(budget > Duration::from_millis(100), "budget {:?}", budget);
            }
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_reports_requested_timeout_when_parent_is_later() {
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(10));
        let parent = RequestContext::background().with_timeout(Duration::from_secs(30));

        let err = assert_err!(
            agg.get_user_summary(&parent, 1, Some(Duration::from_millis(150)))
                .await
        );

        assert!(matches!(
            err,
            SummaryError::DeadlineExceeded(budget) if budget == Duration::from_millis(150)
        ));
        assert!(err.to_string().ends_with("within 150ms"));
    }

    #[tokio::test]
    async fn test_parent_cancellation() {
        let posts = posts_ok().with_delay(Duration::from_secs(3));
        let agg = aggregator(user_ok(), posts, Duration::from_secs(10));
        let parent = RequestContext::background();
        parent.cancel();

        let err = assert_err!(agg.get_user_summary(&parent, 1, None).await);

        assert!(matches!(err, SummaryError::Cancelled));
    }

    #[test]
    fn test_zero_timeout_falls_back_to_default() {
        let agg = aggregator(user_ok(), posts_ok(), Duration::ZERO);
        assert_eq!(agg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            effective_timeout(Some(Duration::ZERO), Duration::from_secs(2)),
            Duration::from_secs(2)
        );
        assert_eq!(
            effective_timeout(None, Duration::from_millis(300)),
            Duration::from_millis(300)
        );
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"id":1,"name":"John Doe","email":"john@example.com"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .and(query_param("userId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"userId":1},{"userId":1}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let retry = RetryPolicy::default();
        let agg = Aggregator::new(
            Arc::new(HttpUserFetcher::new(client.clone(), format!("{}/users", server.uri()), retry)),
            Arc::new(HttpPostsFetcher::new(client, format!("{}/posts", server.uri()), retry)),
            Duration::from_secs(2),
        );

        let summary = assert_ok!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert_eq!(
            summary,
            UserSummary {
                display_name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                post_count: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_http_user_failure_stops_posts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;
        // Posts keep failing; with a long backoff the sibling failure must
        // cut the retry loop short after the first attempt.
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(50)))
            .expect(0..=1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let retry = RetryPolicy::new(3, Duration::from_secs(2));
        let agg = Aggregator::new(
            Arc::new(HttpUserFetcher::new(client.clone(), format!("{}/users", server.uri()), retry)),
            Arc::new(HttpPostsFetcher::new(client, format!("{}/posts", server.uri()), retry)),
            Duration::from_secs(5),
        );

        let started = Instant::now();
        let err = assert_err!(
            agg.get_user_summary(&RequestContext::background(), 1, None)
                .await
        );

        assert!(err.to_string().starts_with("fetching user: decoding user response"), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
