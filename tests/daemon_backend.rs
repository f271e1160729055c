use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dlt_example_user::{
    backend::{BackendError, SystemConnector},
    config::SessionConfig,
    entry::{LogArg, LogEntry},
    injection::InjectionEvent,
    record::{ControlFrame, Frame, FrameEnvelope},
    session::{
        events::SessionEvent,
        handle::{OutputTarget, SessionError, SessionHandle, spawn_session},
    },
    types::{ContextId, LogLevel},
};

fn config(addr: SocketAddr) -> SessionConfig {
    SessionConfig {
        daemon_addr: addr,
        drain_period: Duration::ZERO,
        ..SessionConfig::default()
    }
}

async fn register(session: &SessionHandle, cfg: &SessionConfig) {
    session
        .select_output_target(OutputTarget::Daemon)
        .await
        .expect("target");
    session
        .register_application(cfg.app_id.clone(), cfg.app_description.clone())
        .await
        .expect("app");
    session
        .register_context(cfg.context_id.clone(), cfg.context_description.clone())
        .await
        .expect("context");
}

/// Accepts one client, answers the first log frame with an injection and
/// returns every frame kind received until the application unregisters.
fn spawn_fake_daemon(listener: TcpListener) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut writer = stream.try_clone().expect("clone");
        let reader = BufReader::new(stream);
        let mut kinds = Vec::new();
        let mut injected = false;

        for line in reader.lines() {
            let Ok(line) = line else { break };
            let env: FrameEnvelope = serde_json::from_str(&line).expect("frame");
            let kind = match &env.frame {
                Frame::RegisterApp { .. } => "register_app",
                Frame::RegisterContext { .. } => "register_context",
                Frame::Log { .. } => "log",
                Frame::UnregisterContext { .. } => "unregister_context",
                Frame::UnregisterApp { .. } => "unregister_app",
            };
            kinds.push(kind.to_string());

            if kind == "log" && !injected {
                injected = true;
                let control = ControlFrame::Injection {
                    context_id: ContextId::new("TEST").expect("id"),
                    service_id: 0xFFF,
                    payload: b"go\x01".to_vec(),
                };
                let mut text = serde_json::to_string(&control).expect("encode");
                text.push('\n');
                writer.write_all(text.as_bytes()).expect("write control");
            }
            if kind == "unregister_app" {
                break;
            }
        }
        kinds
    })
}

#[tokio::test]
async fn daemon_receives_lifecycle_frames_and_relays_injection() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let daemon = spawn_fake_daemon(listener);

    let cfg = config(addr);
    let session = spawn_session(Box::new(SystemConnector::new(addr)), &cfg);
    let mut events = session.subscribe();
    register(&session, &cfg).await;

    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    session
        .register_injection_callback(
            0xFFF,
            Arc::new(move |evt: &InjectionEvent| {
                let _ = seen_tx.send(evt.payload.clone());
                0
            }),
        )
        .await
        .expect("callback");

    session
        .emit(LogEntry::verbose(
            LogLevel::Warn,
            vec![LogArg::Int(0), LogArg::String("hi".to_string())],
        ))
        .await
        .expect("emit");

    let payload = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .expect("injection timeout")
        .expect("payload");
    assert_eq!(payload, b"go\x01".to_vec());

    let handled = loop {
        let evt = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event timeout")
            .expect("recv");
        if let SessionEvent::InjectionHandled { service_id, code } = evt {
            break (service_id, code);
        }
    };
    assert_eq!(handled, (0xFFF, 0));

    session.teardown().await.expect("teardown");
    let kinds = daemon.join().expect("daemon thread");
    assert_eq!(
        kinds,
        vec![
            "register_app",
            "register_context",
            "log",
            "unregister_context",
            "unregister_app"
        ]
    );
}

#[tokio::test]
async fn unreachable_daemon_makes_emits_fail_without_aborting() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };

    let cfg = config(addr);
    let session = spawn_session(Box::new(SystemConnector::new(addr)), &cfg);
    register(&session, &cfg).await;

    let res = session
        .emit(LogEntry::verbose(LogLevel::Warn, vec![LogArg::Int(0)]))
        .await;
    assert!(matches!(
        res,
        Err(SessionError::Backend(BackendError::Disconnected))
    ));
    let res = session
        .emit(LogEntry::verbose(LogLevel::Warn, vec![LogArg::Int(1)]))
        .await;
    assert!(res.is_err());

    let report = session.teardown().await.expect("teardown");
    assert!(report.backend_released);
    assert_eq!(session.status().await.expect("status").records, 2);
}
