mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Reply, blog_reply, client, fast_policy, settings, spawn_provider};
use content_guard::content::{BrandProfile, ContentGenerator, WordLimits};
use content_guard::models::{ContentKind, ContentRequest};
use content_guard::{ErrorKind, GuardError, LlmClient, RateLimiter};

#[tokio::test]
async fn transient_failure_is_retried() {
    let (url, fake) = spawn_provider(vec![
        Reply::provider_error(529, "overloaded_error", "Overloaded"),
        Reply::text("hello"),
    ])
    .await;
    let client = client(&url, fast_policy(3));

    let text = client.complete("be brief", "say hello", None).await.unwrap();

    assert_eq!(text, "hello");
    assert_eq!(fake.hits(), 2);
    assert_eq!(fake.last_api_key().as_deref(), Some("test-key"));

    let request = fake.last_request().unwrap();
    assert_eq!(request["model"], "test-model");
    assert_eq!(request["max_tokens"], 256);
    assert_eq!(request["system"], "be brief");
    assert_eq!(request["messages"][0]["role"], "user");
    assert_eq!(request["messages"][0]["content"], "say hello");
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let (url, fake) = spawn_provider(vec![Reply::provider_error(
        401,
        "authentication_error",
        "invalid x-api-key",
    )])
    .await;
    let client = client(&url, fast_policy(5));

    let err = client.complete("", "hi", None).await.unwrap_err();

    assert_eq!(
        err,
        GuardError::Authentication("401 (authentication_error): invalid x-api-key".into())
    );
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn exhausted_retries_return_last_error() {
    let (url, fake) = spawn_provider(vec![
        Reply::status(500, "first"),
        Reply::status(502, "second"),
        Reply::status(503, "third"),
    ])
    .await;
    let client = client(&url, fast_policy(3));

    let err = client.complete("", "hi", None).await.unwrap_err();

    assert_eq!(err, GuardError::Transient("503: third".into()));
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn provider_retry_after_is_honoured() {
    let (url, fake) = spawn_provider(vec![
        Reply::provider_error(429, "rate_limit_error", "slow down").with_retry_after("1"),
        Reply::text("done"),
    ])
    .await;
    let client = client(&url, fast_policy(2));
    let start = Instant::now();

    let text = client.complete("", "hi", None).await.unwrap();

    assert_eq!(text, "done");
    assert_eq!(fake.hits(), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn malformed_reply_is_not_retried_by_default() {
    let (url, fake) = spawn_provider(vec![Reply::status(200, "<html>gateway</html>")]).await;
    let client = client(&url, fast_policy(3));

    let err = client.complete("", "hi", None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn malformed_reply_retried_when_policy_opts_in() {
    let (url, fake) = spawn_provider(vec![
        Reply::status(200, r#"{"content": []}"#),
        Reply::text("recovered"),
    ])
    .await;
    let client = client(&url, fast_policy(3).also_retry(ErrorKind::MalformedResponse));

    let text = client.complete("", "hi", None).await.unwrap();

    assert_eq!(text, "recovered");
    assert_eq!(fake.hits(), 2);
}

#[tokio::test]
async fn bad_request_is_rejected_once() {
    let (url, fake) = spawn_provider(vec![Reply::provider_error(
        400,
        "invalid_request_error",
        "max_tokens too large",
    )])
    .await;
    let client = client(&url, fast_policy(3));

    let err = client.complete("", "hi", None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn every_attempt_spends_a_permit() {
    let (url, fake) = spawn_provider(vec![
        Reply::status(503, "busy"),
        Reply::status(503, "busy"),
        Reply::text("ok"),
    ])
    .await;
    let limiter = Arc::new(RateLimiter::new(10).unwrap());
    let client = LlmClient::new(settings(&url), Arc::clone(&limiter), fast_policy(3)).unwrap();

    client.complete("", "hi", None).await.unwrap();

    assert_eq!(fake.hits(), 3);
    let left = limiter.available().await;
    assert!((7.0..7.5).contains(&left), "{left}");
}

#[tokio::test]
async fn unreachable_provider_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}/v1/messages"), fast_policy(2));
    let err = client.complete("", "hi", None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn empty_prompt_never_reaches_provider() {
    let (url, fake) = spawn_provider(vec![Reply::text("unused")]).await;
    let client = client(&url, fast_policy(3));

    let err = client.complete("", "   ", None).await.unwrap_err();

    assert_eq!(err, GuardError::Validation("Prompt cannot be empty".into()));
    assert_eq!(fake.hits(), 0);
}

#[tokio::test]
async fn generator_parses_fenced_blog_reply() {
    let (url, fake) = spawn_provider(vec![blog_reply("Five Knife Skills")]).await;
    let brand = BrandProfile {
        name: "Acme Kitchen".into(),
        tagline: "Sharp and simple".into(),
        voice: "warm".into(),
        audience: "home cooks".into(),
        categories: vec!["knives".into(), "shears".into()],
    };
    let generator = ContentGenerator::new(
        client(&url, fast_policy(3)),
        brand,
        WordLimits { min: 800, max: 1500 },
    );
    let request = ContentRequest {
        content_type: ContentKind::BlogPost,
        topic: "Knife skills".into(),
        keywords: vec!["knife skills".into(), "chef knife".into()],
        word_count: Some(1200),
        platform: None,
        product_details: None,
    };

    let content = generator.generate(&request).await.unwrap();

    assert_eq!(content.title, "Five Knife Skills");
    assert_eq!(content.keywords, vec!["knife skills".to_string()]);
    assert_eq!(content.word_count, 7);
    assert_eq!(fake.hits(), 1);

    let sent = fake.last_request().unwrap();
    let system = sent["system"].as_str().unwrap();
    assert!(system.contains("Acme Kitchen"));
    assert!(system.contains("knives, shears"));
    let prompt = sent["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("1200 words"));
    assert!(prompt.contains("knife skills, chef knife"));
}

#[tokio::test]
async fn batch_keeps_going_after_a_failed_item() {
    let (url, fake) = spawn_provider(vec![
        blog_reply("Honing Basics"),
        Reply::provider_error(401, "authentication_error", "invalid x-api-key"),
        blog_reply("Cutting Boards"),
    ])
    .await;
    let brand = BrandProfile {
        name: "Acme Kitchen".into(),
        tagline: "Sharp and simple".into(),
        voice: "warm".into(),
        audience: "home cooks".into(),
        categories: vec!["knives".into()],
    };
    let generator = ContentGenerator::new(
        client(&url, fast_policy(3)),
        brand,
        WordLimits { min: 800, max: 1500 },
    );
    let requests: Vec<ContentRequest> = ["Honing", "Storage", "Boards"]
        .into_iter()
        .map(|topic| ContentRequest {
            content_type: ContentKind::BlogPost,
            topic: topic.into(),
            keywords: vec!["knife care".into()],
            word_count: None,
            platform: None,
            product_details: None,
        })
        .collect();

    let results = generator.generate_batch(&requests).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().title, "Honing Basics");
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Authentication);
    assert_eq!(results[2].as_ref().unwrap().title, "Cutting Boards");
    assert_eq!(fake.hits(), 3);
}
