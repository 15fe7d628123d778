//! End-to-end tests of the assembled runtime against a local HTTP server:
//! real webhook client, real store client, real session and watcher. Only
//! the remote endpoints are mocked.

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};

use zapconecta::{
    ConnectionFacade, PairingMethod, PairingPayload, SessionSnapshot, SessionState, ShellEvent,
    UserId, ZapConecta,
};
use zc_core::config::AppConfig;
use zc_core::ports::NoticeLevel;
use zc_core::settings::{FeedStrategy, Settings};
use zc_infra::LoadedConfig;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(server: &ServerGuard) -> LoadedConfig {
    init_tracing();
    let mut settings = Settings::default();
    settings.sync.feed_strategy = FeedStrategy::Polling;

    LoadedConfig {
        app: AppConfig {
            pairing_webhook_url: format!("{}/webhook/pair", server.url()),
            disconnect_webhook_url: format!("{}/webhook/disconnect", server.url()),
            store_url: server.url(),
            store_api_key: "anon-key".to_string(),
            store_table: "whatsapp_conections".to_string(),
            feed_url: String::new(),
        },
        settings,
    }
}

async fn wait_for_snapshot(
    runtime: &ZapConecta,
    accept: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    for _ in 0..100 {
        let snapshot = runtime.session().snapshot().await;
        if accept(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session never reached the expected state");
}

async fn next_shell_event(rx: &mut tokio::sync::mpsc::Receiver<ShellEvent>) -> ShellEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("shell event in time")
        .expect("shell channel open")
}

#[tokio::test]
async fn pairing_reaches_result_with_a_displayable_qr() {
    let mut server = Server::new_async().await;

    let _rows = server
        .mock("GET", "/rest/v1/whatsapp_conections")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let pair = server
        .mock("POST", "/webhook/pair")
        .match_header("content-type", "application/json")
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": {"base64": "iVBORw0KGgoAAAANSUhEUg=="}}"#)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, _shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.session().open().await.unwrap();
    runtime.session().set_phone("+5511946617052").await.unwrap();
    runtime
        .session()
        .submit_phone(PairingMethod::QrCode)
        .await
        .unwrap();

    let snapshot = wait_for_snapshot(&runtime, |s| {
        matches!(s.state, SessionState::Result { .. })
    })
    .await;

    match snapshot.state {
        SessionState::Result {
            payload: PairingPayload::QrCode { ref image_uri },
        } => {
            assert!(image_uri.starts_with("data:image/png;base64,"));
        }
        ref other => panic!("unexpected state: {other:?}"),
    }
    assert!(snapshot.time_left >= 89);
    assert!(!snapshot.is_processing);
    pair.assert_async().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn short_phone_input_never_calls_the_webhook() {
    let mut server = Server::new_async().await;

    let pair = server
        .mock("POST", "/webhook/pair")
        .expect(0)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, _shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.session().open().await.unwrap();
    runtime.session().set_phone("+55119466").await.unwrap();
    runtime
        .session()
        .submit_phone(PairingMethod::QrCode)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = runtime.session().snapshot().await;
    assert_eq!(snapshot.state, SessionState::Phone);
    pair.assert_async().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn rejected_pairing_surfaces_the_service_message() {
    let mut server = Server::new_async().await;

    let _rows = server
        .mock("GET", "/rest/v1/whatsapp_conections")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let _pair = server
        .mock("POST", "/webhook/pair")
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": false, "message": "Número inválido"}"#)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, mut shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.session().open().await.unwrap();
    runtime.session().set_phone("+5511946617052").await.unwrap();
    runtime
        .session()
        .submit_phone(PairingMethod::QrCode)
        .await
        .unwrap();

    let event = next_shell_event(&mut shell).await;
    match event {
        ShellEvent::Notice(notice) => {
            assert_eq!(notice.level, NoticeLevel::Error);
            assert_eq!(notice.message, "Número inválido. Tente novamente.");
        }
        other => panic!("unexpected shell event: {other:?}"),
    }

    let snapshot = runtime.session().snapshot().await;
    assert_eq!(snapshot.state, SessionState::Phone);
    assert!(!snapshot.is_processing);

    runtime.shutdown().await;
}

#[tokio::test]
async fn polling_promotes_an_open_session_when_the_store_reports_connected() {
    let mut server = Server::new_async().await;

    let _rows = server
        .mock("GET", "/rest/v1/whatsapp_conections")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "conn-1", "status": "conectado", "phone": "+5511946617052"}]"#)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, mut shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.session().open().await.unwrap();
    runtime.start().await;

    let snapshot = wait_for_snapshot(&runtime, |s| s.state == SessionState::Success).await;
    assert!(snapshot.linked);
    assert_eq!(snapshot.linked_phone.as_deref(), Some("+5511946617052"));

    let event = next_shell_event(&mut shell).await;
    match event {
        ShellEvent::Notice(notice) => {
            assert_eq!(notice.level, NoticeLevel::Success);
            assert_eq!(notice.message, "WhatsApp conectado com sucesso!");
        }
        other => panic!("unexpected shell event: {other:?}"),
    }

    runtime.shutdown().await;
}

#[tokio::test]
async fn disconnect_keeps_the_link_unless_the_service_says_true() {
    let mut server = Server::new_async().await;

    let _rows = server
        .mock("GET", "/rest/v1/whatsapp_conections")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "conn-1", "status": "connected", "phone": "+5511946617052"}]"#)
        .create_async()
        .await;

    let refused = server
        .mock("POST", "/webhook/disconnect")
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": false}"#)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, mut shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.start().await;
    wait_for_snapshot(&runtime, |s| s.linked).await;

    runtime.session().request_disconnect().await.unwrap();

    let event = next_shell_event(&mut shell).await;
    match event {
        ShellEvent::Notice(notice) => {
            assert_eq!(notice.level, NoticeLevel::Error);
            assert_eq!(notice.message, "Erro ao desconectar. Tente novamente.");
        }
        other => panic!("unexpected shell event: {other:?}"),
    }

    let snapshot = runtime.session().snapshot().await;
    assert!(snapshot.linked);
    refused.assert_async().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn accepted_disconnect_clears_state_and_requests_a_refresh() {
    let mut server = Server::new_async().await;

    let _rows = server
        .mock("GET", "/rest/v1/whatsapp_conections")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "conn-1", "status": "connected", "phone": "+5511946617052"}]"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let accepted = server
        .mock("POST", "/webhook/disconnect")
        .match_body(Matcher::JsonString(
            r#"{"solicitacao": "desconectar", "id_user": "user-1"}"#.to_string(),
        ))
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": true}"#)
        .create_async()
        .await;

    let loaded = test_config(&server);
    let (runtime, mut shell) = ZapConecta::build(UserId::from("user-1"), &loaded).unwrap();

    runtime.start().await;
    wait_for_snapshot(&runtime, |s| s.linked).await;
    // The watcher would re-link the session on its next poll; stop it so
    // the disconnect outcome stays observable.
    runtime.shutdown().await;

    runtime.session().request_disconnect().await.unwrap();

    match next_shell_event(&mut shell).await {
        ShellEvent::Notice(notice) => {
            assert_eq!(notice.level, NoticeLevel::Success);
            assert_eq!(notice.message, "Desconectado com sucesso!");
        }
        other => panic!("unexpected shell event: {other:?}"),
    }

    // The refresh signal follows after the configured one-second delay.
    assert_eq!(
        next_shell_event(&mut shell).await,
        ShellEvent::RefreshRequested
    );

    let snapshot = runtime.session().snapshot().await;
    assert!(!snapshot.linked);
    assert_eq!(snapshot.linked_phone, None);
    accepted.assert_async().await;

    runtime.session().shutdown().await;
}
