mod common;

use common::{wait_until, MockSink};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};
use wavelink::audio::{AudioFormat, VolumeState};
use wavelink::player::{EngineConfig, PlayerEngine, PlayerHandle};
use wavelink::{ConnectionState, Session, SessionConfig, SessionIdentity};

type ServerWs = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn session_fixture(
    auth_token: Option<&str>,
    reconnect_delay: Duration,
) -> (Session, std::sync::Arc<MockSink>, PlayerHandle, VolumeState) {
    let sink = MockSink::new();
    let volume = VolumeState::default();
    let player = PlayerEngine::spawn(sink.clone(), volume.clone(), EngineConfig::default());
    let mut config = SessionConfig::new(SessionIdentity::generate("test-speaker"));
    config.auth_token = auth_token.map(String::from);
    config.reconnect_delay = reconnect_delay;
    config.hello_timeout = Duration::from_secs(2);
    let session = Session::new(config, player.clone(), volume.clone());
    (session, sink, player, volume)
}

async fn recv_control(ws: &mut ServerWs) -> Value {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a control message")
            .expect("socket closed")
            .expect("socket error")
        {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Close(_) => panic!("unexpected close"),
            _ => {}
        }
    }
}

async fn send_control(ws: &mut ServerWs, value: Value) {
    ws.send(WsMessage::Text(value.to_string())).await.unwrap();
}

fn audio_frame(timestamp_micros: i64, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![4u8];
    frame.extend_from_slice(&timestamp_micros.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Accept one connection and drive the server side of the handshake,
/// asserting the client's message order along the way
async fn accept_and_handshake(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let hello = recv_control(&mut ws).await;
    assert_eq!(hello["type"], "client/hello");

    send_control(
        &mut ws,
        json!({
            "type": "server/hello",
            "payload": {"name": "test-server", "version": 1, "active_roles": ["player"]}
        }),
    )
    .await;

    let state = recv_control(&mut ws).await;
    assert_eq!(state["type"], "client/state", "state report must follow hello");
    let time = recv_control(&mut ws).await;
    assert_eq!(time["type"], "client/time", "clock sample must follow state");

    ws
}

#[tokio::test]
async fn handshake_completes_in_protocol_order() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let hello = recv_control(&mut ws).await;
        assert_eq!(hello["type"], "client/hello");
        let payload = &hello["payload"];
        assert!(!payload["client_id"].as_str().unwrap().is_empty());
        assert_eq!(payload["name"], "test-speaker");
        assert_eq!(payload["version"], 1);
        assert!(payload["supported_roles"]
            .as_array()
            .unwrap()
            .contains(&json!("player")));
        let formats = payload["player_support"]["supported_formats"]
            .as_array()
            .unwrap();
        assert_eq!(formats[0]["codec"], "pcm");
        assert_eq!(formats[0]["sample_rate"], 48000);

        send_control(
            &mut ws,
            json!({
                "type": "server/hello",
                "payload": {"name": "test-server", "version": 1}
            }),
        )
        .await;

        let state = recv_control(&mut ws).await;
        assert_eq!(state["type"], "client/state");
        assert_eq!(state["payload"]["player"]["state"], "synchronized");
        assert_eq!(state["payload"]["player"]["volume"], 100);
        assert_eq!(state["payload"]["player"]["muted"], false);

        let time = recv_control(&mut ws).await;
        assert_eq!(time["type"], "client/time");
        assert!(time["payload"]["client_transmitted"].is_i64());
    });

    session.connect(&url).await.unwrap();
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let mut ws = accept_and_handshake(&listener).await;
        send_control(&mut ws, json!({"type": "ping", "payload": {}})).await;
        let reply = recv_control(&mut ws).await;
        assert_eq!(reply["type"], "pong");
    });

    session.connect(&url).await.unwrap();
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn volume_command_is_applied_and_reported() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let mut ws = accept_and_handshake(&listener).await;
        send_control(&mut ws, json!({"type": "volume", "payload": {"level": 30}})).await;
        let report = recv_control(&mut ws).await;
        assert_eq!(report["type"], "client/state");
        assert_eq!(report["payload"]["player"]["volume"], 30);
    });

    session.connect(&url).await.unwrap();
    server.await.unwrap();
    assert_eq!(volume.snapshot(), (30, false));
    session.dispose().await;
}

#[tokio::test]
async fn audio_frames_flow_to_the_sink_in_order() {
    let (listener, url) = bind().await;
    let (session, sink, player, _volume) = session_fixture(None, Duration::from_secs(5));
    player.initialize(AudioFormat::default()).await.unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_and_handshake(&listener).await;
        send_control(&mut ws, json!({"type": "stream/start", "payload": {}})).await;
        for i in 0..3i64 {
            let pcm: Vec<u8> = (0..1920u32).map(|b| (b as u8).wrapping_add(i as u8)).collect();
            ws.send(WsMessage::Binary(audio_frame(i * 10_000, &pcm)))
                .await
                .unwrap();
        }
        // Hold the socket open until the client is done
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    session.connect(&url).await.unwrap();

    let sink_for_wait = sink.clone();
    wait_until("audio reached the sink", Duration::from_secs(2), move || {
        sink_for_wait.feed_count() == 3
    })
    .await;

    // First fed sample of the first chunk: bytes [0, 1] as little-endian i16
    let fed = sink.fed_samples();
    assert_eq!(fed[0], wavelink::Sample::from_i16(i16::from_le_bytes([0, 1])));
    assert_eq!(fed.len(), 3 * 960);

    server.abort();
    session.dispose().await;
}

#[tokio::test]
async fn auth_token_exchange_precedes_hello() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) =
        session_fixture(Some("secret-token"), Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let auth = recv_control(&mut ws).await;
        assert_eq!(auth["type"], "auth", "auth must be the first message");
        assert_eq!(auth["payload"]["token"], "secret-token");
        send_control(&mut ws, json!({"type": "auth_ok", "payload": {}})).await;

        let hello = recv_control(&mut ws).await;
        assert_eq!(hello["type"], "client/hello");
        send_control(
            &mut ws,
            json!({
                "type": "server/hello",
                "payload": {"name": "test-server", "version": 1}
            }),
        )
        .await;
        recv_control(&mut ws).await; // client/state
        recv_control(&mut ws).await; // client/time
    });

    session.connect(&url).await.unwrap();
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn unknown_and_malformed_messages_do_not_kill_the_connection() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let mut ws = accept_and_handshake(&listener).await;
        send_control(
            &mut ws,
            json!({"type": "metrics/report", "payload": {"cpu": 0.5}}),
        )
        .await;
        ws.send(WsMessage::Text("{not json at all".to_string()))
            .await
            .unwrap();
        // The connection must still answer after both
        send_control(&mut ws, json!({"type": "ping", "payload": {}})).await;
        let reply = recv_control(&mut ws).await;
        assert_eq!(reply["type"], "pong");
    });

    session.connect(&url).await.unwrap();
    server.await.unwrap();
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    session.dispose().await;
}

#[tokio::test]
async fn server_time_reply_improves_clock_quality() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        recv_control(&mut ws).await; // client/hello
        send_control(
            &mut ws,
            json!({
                "type": "server/hello",
                "payload": {"name": "test-server", "version": 1}
            }),
        )
        .await;
        recv_control(&mut ws).await; // client/state
        let time = recv_control(&mut ws).await;
        let t1 = time["payload"]["client_transmitted"].as_i64().unwrap();
        send_control(
            &mut ws,
            json!({
                "type": "server/time",
                "payload": {
                    "client_transmitted": t1,
                    "server_received": t1 + 500,
                    "server_transmitted": t1 + 1_000,
                }
            }),
        )
        .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    use wavelink::sync::SyncQuality;
    assert_eq!(session.clock_quality(), SyncQuality::Lost);

    session.connect(&url).await.unwrap();
    let session_for_wait = session.clone();
    wait_until("clock sample applied", Duration::from_secs(2), move || {
        session_for_wait.clock_quality() == SyncQuality::Good
    })
    .await;

    server.abort();
    session.dispose().await;
}

#[tokio::test]
async fn graceful_disconnect_sends_goodbye_and_skips_reconnect() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_millis(100));

    let server = tokio::spawn(async move {
        let mut ws = accept_and_handshake(&listener).await;
        let goodbye = recv_control(&mut ws).await;
        assert_eq!(goodbye["type"], "client/goodbye");

        // No reconnect attempt may land after a graceful close
        let second =
            tokio::time::timeout(Duration::from_millis(400), listener.accept()).await;
        assert!(second.is_err(), "unexpected reconnect after graceful close");
    });

    session.connect(&url).await.unwrap();
    session.disconnect().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn lost_connection_reconnects_to_the_last_url() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_millis(100));

    let server = tokio::spawn(async move {
        let ws = accept_and_handshake(&listener).await;
        // Simulate a server crash
        drop(ws);
        // The client retries the same URL after its delay
        accept_and_handshake(&listener).await;
    });

    session.connect(&url).await.unwrap();

    let mut states = session.connection_states();
    wait_until("disconnect observed", Duration::from_secs(2), {
        let session = session.clone();
        move || session.connection_state() == ConnectionState::Disconnected
    })
    .await;

    loop {
        if *states.borrow_and_update() == ConnectionState::Connected {
            break;
        }
        tokio::time::timeout(Duration::from_secs(2), states.changed())
            .await
            .expect("timed out waiting for reconnect")
            .unwrap();
    }
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn reconnect_does_not_duplicate_heartbeats() {
    let (listener, url) = bind().await;
    let sink = MockSink::new();
    let volume = VolumeState::default();
    let player = PlayerEngine::spawn(sink, volume.clone(), EngineConfig::default());
    let mut config = SessionConfig::new(SessionIdentity::generate("test-speaker"));
    config.heartbeat_interval = Duration::from_millis(200);
    config.reconnect_delay = Duration::from_millis(10);
    config.hello_timeout = Duration::from_secs(2);
    let session = Session::new(config, player, volume);

    let server = tokio::spawn(async move {
        let ws = accept_and_handshake(&listener).await;
        // Simulate a server crash; the client reconnects almost immediately
        drop(ws);
        let mut ws = accept_and_handshake(&listener).await;

        // A single 200ms heartbeat loop can produce at most 6 samples in
        // this window; a leaked pre-reconnect loop would double that
        let deadline = tokio::time::Instant::now() + Duration::from_millis(1_100);
        let mut heartbeats = 0;
        loop {
            let Some(remaining) = deadline.checked_duration_since(tokio::time::Instant::now())
            else {
                break;
            };
            match tokio::time::timeout(remaining, ws.next()).await {
                Ok(Some(Ok(WsMessage::Text(text)))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if value["type"] == "client/time" {
                        heartbeats += 1;
                    }
                }
                Ok(Some(Ok(_))) => {}
                Ok(_) => break,
                Err(_) => break,
            }
        }
        assert!(
            (1..=6).contains(&heartbeats),
            "saw {} heartbeats in 1.1s",
            heartbeats
        );
    });

    session.connect(&url).await.unwrap();
    server.await.unwrap();
    session.dispose().await;
}

#[tokio::test]
async fn repeated_connect_is_a_no_op_when_connected() {
    let (listener, url) = bind().await;
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));

    let server = tokio::spawn(async move {
        let ws = accept_and_handshake(&listener).await;
        // A second handshake attempt would hang the test; none may arrive
        let second =
            tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(second.is_err(), "duplicate connect opened a second socket");
        drop(ws);
    });

    session.connect(&url).await.unwrap();
    session.connect(&url).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn connect_failure_reports_error_state() {
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));
    let err = session.connect("ws://127.0.0.1:9").await;
    assert!(err.is_err());
    assert_eq!(session.connection_state(), ConnectionState::Error);
    session.dispose().await;
}

#[tokio::test]
async fn connect_after_dispose_is_rejected() {
    let (session, _sink, _player, _volume) = session_fixture(None, Duration::from_secs(5));
    session.dispose().await;
    assert!(session.connect("ws://127.0.0.1:9").await.is_err());
}
