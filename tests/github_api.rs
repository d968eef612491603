// tests/github_api.rs
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use postcast::config::Token;
use postcast::github::{
    create_repo, import_issue_links, CreateRepo, GithubClient, GithubError, IssueRef, LinksFile,
};

fn client(server: &MockServer) -> GithubClient {
    GithubClient::with_base(Token::new("t0ken"), &server.uri()).unwrap()
}

fn req(owner: &str, private: bool) -> CreateRepo {
    CreateRepo {
        owner: owner.into(),
        name: "notes".into(),
        private,
        description: "daily notes".into(),
    }
}

async fn mount_user(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer t0ken"))
        .and(header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "login": "me" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn issue_links_are_collected_from_body_and_comments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/issues/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": "Feeds: https://blog.test/rss and https://github.com/a/b."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/issues/7/comments"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "body": "dup https://blog.test/rss" },
            { "body": null },
            { "body": "paper (https://arxiv.org/abs/2405.00001)" }
        ])))
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let issue = IssueRef {
        owner: "o".into(),
        repo: "r".into(),
        number: 7,
    };
    let res = import_issue_links(&client(&server), &issue, out.path())
        .await
        .unwrap();
    assert_eq!(res.count, 3);

    let name = res.json_path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("issue-o-r-7-") && name.ends_with(".links.json"));

    let file: LinksFile =
        serde_json::from_str(&std::fs::read_to_string(&res.json_path).unwrap()).unwrap();
    assert_eq!(file.issue, issue);
    let pairs: Vec<(&str, &str)> = file
        .links
        .iter()
        .map(|l| (l.url.as_str(), l.kind.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("https://blog.test/rss", "feed"),
            ("https://github.com/a/b", "github"),
            ("https://arxiv.org/abs/2405.00001", "arxiv"),
        ]
    );

    let txt = std::fs::read_to_string(&res.txt_path).unwrap();
    assert_eq!(
        txt,
        "https://blog.test/rss\nhttps://github.com/a/b\nhttps://arxiv.org/abs/2405.00001\n"
    );
}

#[tokio::test]
async fn issue_fetch_failure_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/issues/1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let issue = IssueRef {
        owner: "o".into(),
        repo: "r".into(),
        number: 1,
    };
    let err = import_issue_links(&client(&server), &issue, out.path())
        .await
        .unwrap_err();
    match err.downcast_ref::<GithubError>() {
        Some(GithubError::Api { status, .. }) => assert_eq!(*status, 404),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn existing_repo_is_reported_without_creating() {
    let server = MockServer::start().await;
    mount_user(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/repos/me/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ssh_url": "git@github.com:me/notes.git",
            "html_url": "https://github.com/me/notes"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let urls = create_repo(&client(&server), &req("me", false)).await.unwrap();
    assert_eq!(urls.ssh_url, "git@github.com:me/notes.git");
    assert_eq!(urls.html_url, "https://github.com/me/notes");
}

#[tokio::test]
async fn missing_repo_is_created_under_the_user() {
    let server = MockServer::start().await;
    mount_user(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/repos/me/notes"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .and(body_partial_json(json!({ "name": "notes", "private": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ssh_url": "git@github.com:me/notes.git",
            "html_url": "https://github.com/me/notes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let urls = create_repo(&client(&server), &req("me", true)).await.unwrap();
    assert_eq!(urls.html_url, "https://github.com/me/notes");
}

#[tokio::test]
async fn org_repo_is_created_under_the_org() {
    let server = MockServer::start().await;
    mount_user(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/notes"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ssh_url": "git@github.com:acme/notes.git",
            "html_url": "https://github.com/acme/notes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let urls = create_repo(&client(&server), &req("acme", false)).await.unwrap();
    assert_eq!(urls.ssh_url, "git@github.com:acme/notes.git");
}

#[tokio::test]
async fn rejected_token_stops_before_any_repo_call() {
    let server = MockServer::start().await;
    mount_user(&server, 401).await;
    Mock::given(method("GET"))
        .and(path("/repos/me/notes"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = create_repo(&client(&server), &req("me", false))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GithubError>(),
        Some(GithubError::TokenRejected { status: 401, .. })
    ));
}

#[tokio::test]
async fn unexpected_existence_status_is_an_error() {
    let server = MockServer::start().await;
    mount_user(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/repos/me/notes"))
        .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = create_repo(&client(&server), &req("me", false))
        .await
        .unwrap_err();
    match err.downcast_ref::<GithubError>() {
        Some(e @ GithubError::ExistenceCheck { status: 403, .. }) => {
            assert_eq!(e.body(), "rate limited")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn failed_create_carries_status_and_body() {
    let server = MockServer::start().await;
    mount_user(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/repos/me/notes"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(422).set_body_string("name already exists"))
        .mount(&server)
        .await;

    let err = create_repo(&client(&server), &req("me", false))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GithubError>(),
        Some(GithubError::CreateFailed { status: 422, .. })
    ));
}
