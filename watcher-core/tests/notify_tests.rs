use reqwest::Client;
use url::Url;
use watcher_core::config::PushoverConfig;
use watcher_core::notify::{new_post_message, NEW_POST_TITLE};
use watcher_core::{Notification, Notifier, PushoverNotifier, WatchError};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notifier(server: &MockServer) -> PushoverNotifier {
    let config = PushoverConfig {
        token: "app-token".into(),
        user_key: "user-key".into(),
        endpoint: Url::parse(&format!("{}/1/messages.json", server.uri())).unwrap(),
    };
    PushoverNotifier::new(Client::new(), &config)
}

fn omega() -> Notification {
    Notification {
        title: "Omega Seamaster".into(),
        link: "https://uhrforum.de/threads/1/".into(),
    }
}

#[test]
fn new_post_message_has_title_and_link_lines() {
    assert_eq!(
        new_post_message(&omega()),
        "New Post: Omega Seamaster\nLink: https://uhrforum.de/threads/1/"
    );
}

#[tokio::test]
async fn posts_the_message_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/messages.json"))
        .and(body_string_contains("token=app-token"))
        .and(body_string_contains("user=user-key"))
        .and(body_string_contains("title=New+UhrForum+Post"))
        .and(body_string_contains("Omega+Seamaster"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":1,"request":"5042853c-402d-4a18-abcb-168734a801de"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .send_new_post(&omega())
        .await
        .expect("delivered");
    assert_eq!(NEW_POST_TITLE, "New UhrForum Post");
}

#[tokio::test]
async fn unreadable_reply_still_counts_as_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server).send_startup().await.expect("delivered");
}

#[tokio::test]
async fn non_200_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = notifier(&server)
        .send_error("boom")
        .await
        .expect_err("rejected");
    match err {
        WatchError::NotifyStatus { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other}"),
    }
}
