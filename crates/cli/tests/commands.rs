//! End-to-end command runs against a temporary key directory and a mocked
//! JSON-RPC node.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chainauth_cli::{App, Cli, Command, ServiceConfig};
use chainauth_resolver::testutil::{SignedTransaction, signed_transaction};
use clap::Parser;
use mockito::{Server, ServerGuard};
use rstest::rstest;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TX: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

fn app(dir: &TempDir, endpoint: Option<&str>) -> App {
    let config = ServiceConfig::default()
        .with_overrides(Some(dir.path().to_path_buf()), endpoint)
        .unwrap();
    App::new(config)
}

async fn node(server: &mut ServerGuard, tx: &SignedTransaction) -> mockito::Mock {
    server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": tx.result }).to_string())
        .create_async()
        .await
}

async fn run(app: &App, command: Command) -> anyhow::Result<String> {
    app.run(command, &CancellationToken::new()).await
}

#[tokio::test]
async fn init_then_rotate_prints_max_id() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, None);

    assert_eq!(run(&app, Command::Init).await.unwrap(), "0001");
    assert_eq!(run(&app, Command::Init).await.unwrap(), "0001");
    assert_eq!(run(&app, Command::Rotate).await.unwrap(), "0002");

    let keys: Value = serde_json::from_str(&run(&app, Command::Keys).await.unwrap()).unwrap();
    assert_eq!(keys["maxid"], "0002");
    assert_eq!(keys["keys"].as_array().unwrap().len(), 2);
    assert_eq!(keys["keys"][0]["alg"], "ES256");
}

#[tokio::test]
async fn issue_and_verify_round_trip() {
    let dir = TempDir::new().unwrap();
    let tx = signed_transaction(0x41, 1, 0);
    let mut server = Server::new_async().await;
    let mock = node(&mut server, &tx).await;
    let app = app(&dir, Some(&server.url()));
    run(&app, Command::Init).await.unwrap();
    run(&app, Command::Rotate).await.unwrap();

    let issued: Value = serde_json::from_str(
        &run(&app, Command::Issue { tx: tx.hash.clone(), kid: Some("0001".into()) })
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(issued["token_type"], "Bearer");
    mock.assert_async().await;

    let token = issued["access_token"].as_str().unwrap().to_owned();
    let claims: Value =
        serde_json::from_str(&run(&app, Command::Verify { token }).await.unwrap()).unwrap();
    assert_eq!(claims["uid"], tx.sender.to_checksum());
    assert_eq!(claims["exp"], issued["expires_in"]);
    assert_eq!(claims["md"], "hkopendata");
}

#[tokio::test]
async fn issue_defaults_to_newest_key() {
    let dir = TempDir::new().unwrap();
    let tx = signed_transaction(0x42, 1, 0);
    let mut server = Server::new_async().await;
    node(&mut server, &tx).await;
    let app = app(&dir, Some(&server.url()));
    for _ in 0..3 {
        run(&app, Command::Rotate).await.unwrap();
    }

    let issued: Value =
        serde_json::from_str(&run(&app, Command::Issue { tx: tx.hash, kid: None }).await.unwrap())
            .unwrap();
    let header = chainauth_authn::jwt::decode_token_header(issued["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(header.kid.as_deref(), Some("0003"));
}

#[tokio::test]
async fn issue_rejects_sender_the_signature_does_not_back() {
    let dir = TempDir::new().unwrap();
    let mut tx = signed_transaction(0x43, 1, 0);
    tx.result["from"] = json!(signed_transaction(0x44, 1, 0).sender.to_checksum().to_lowercase());
    let mut server = Server::new_async().await;
    node(&mut server, &tx).await;
    let app = app(&dir, Some(&server.url()));
    run(&app, Command::Init).await.unwrap();

    let err = run(&app, Command::Issue { tx: tx.hash, kid: None }).await.unwrap_err();
    assert!(format!("{err:#}").contains("recovery"), "got {err:#}");
}

#[tokio::test]
async fn issue_on_empty_store_fails() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, None);

    let err = run(&app, Command::Issue { tx: TX.into(), kid: None }).await.unwrap_err();
    assert!(err.to_string().contains("chainauth init"), "got {err:#}");
}

#[tokio::test]
async fn cancelled_issue_does_not_call_the_node() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new_async().await;
    let mock = server.mock("POST", "/").expect(0).create_async().await;
    let app = app(&dir, Some(&server.url()));
    run(&app, Command::Init).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = app.run(Command::Issue { tx: TX.into(), kid: Some("0001".into()) }, &cancel).await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[rstest]
#[case::init(&["chainauth", "init"])]
#[case::issue(&["chainauth", "issue", "--tx", TX, "--kid", "0001"])]
#[case::verify(&["chainauth", "--key-dir", "/tmp/k", "verify", "--token", "a.b.c"])]
fn cli_parses(#[case] argv: &[&str]) {
    assert!(Cli::try_parse_from(argv).is_ok());
}

#[test]
fn issue_requires_tx() {
    assert!(Cli::try_parse_from(["chainauth", "issue", "--kid", "0001"]).is_err());
}
