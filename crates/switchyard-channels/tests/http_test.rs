use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard_channels::http::router;
use switchyard_channels::{
    ChannelError, DeliveryChannel, GrpcChannel, GrpcChannelConfig, HttpChannel,
    HttpChannelConfig, MessageHandler, MqttChannel, MqttChannelConfig,
};
use switchyard_types::{Command, DispatchContext, DispatchResult, Message, Target};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Records every message and answers with one `echo` command.
#[derive(Default)]
struct RecordingHandler {
    messages: Mutex<Vec<Message>>,
    deadlines: Mutex<Vec<Option<Duration>>>,
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: Message, ctx: DispatchContext) -> DispatchResult {
        let mut result = DispatchResult::new(message.id.clone());
        result.transcript = message.text.clone();
        result.commands.push(Command::new("echo"));
        self.deadlines.lock().unwrap().push(ctx.remaining());
        self.messages.lock().unwrap().push(message);
        result
    }
}

fn test_router(handler: Arc<RecordingHandler>) -> Router {
    router(handler, CancellationToken::new(), Duration::from_secs(30))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_dispatch_json_message() {
    let handler = Arc::new(RecordingHandler::default());
    let request = Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"id":"msg-1","source":"phone","text":"turn on the lights","instruction":{"response_mode":"text"}}"#,
        ))
        .unwrap();

    let response = test_router(handler.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["message_id"], "msg-1");
    assert_eq!(json["transcript"], "turn on the lights");
    assert_eq!(json["commands"][0]["action"], "echo");

    let messages = handler.messages.lock().unwrap();
    assert_eq!(messages[0].source, "phone");
    assert_eq!(messages[0].instruction.response_mode, "text");

    let deadlines = handler.deadlines.lock().unwrap();
    let remaining = deadlines[0].expect("request runs under a deadline");
    assert!(remaining <= Duration::from_secs(30));
}

#[tokio::test]
async fn test_dispatch_raw_audio_with_headers() {
    let handler = Arc::new(RecordingHandler::default());
    let request = Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header("content-type", "audio/wav")
        .header("x-switchyard-source", "robot-arm-01")
        .header(
            "x-switchyard-instruction",
            r#"{"targets":[{"service_name":"ha","endpoint":"http://ha:8123/api","protocol":"http"}]}"#,
        )
        .body(Body::from(vec![7u8; 2048]))
        .unwrap();

    let response = test_router(handler.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = handler.messages.lock().unwrap();
    let message = &messages[0];
    assert_eq!(message.source, "robot-arm-01");
    assert_eq!(message.audio.len(), 2048);
    assert_eq!(message.content_type.as_deref(), Some("audio/wav"));
    assert_eq!(message.instruction.targets[0].service_name, "ha");
}

#[tokio::test]
async fn test_dispatch_invalid_json_is_bad_request() {
    let handler = Arc::new(RecordingHandler::default());
    let request = Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = test_router(handler.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid json"));
    assert!(handler.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dispatch_invalid_instruction_header_is_bad_request() {
    let handler = Arc::new(RecordingHandler::default());
    let request = Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header("content-type", "audio/ogg")
        .header("x-switchyard-instruction", "{broken")
        .body(Body::from(vec![1u8; 16]))
        .unwrap();

    let response = test_router(handler).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("invalid instruction header"));
}

#[tokio::test]
async fn test_websocket_not_implemented() {
    let request = Request::builder().uri("/ws").body(Body::empty()).unwrap();
    let response = test_router(Arc::new(RecordingHandler::default()))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_health_check_returns_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = test_router(Arc::new(RecordingHandler::default()))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

/// Loopback receiver that records delivered JSON bodies.
async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                (status, "receiver says no")
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hook", addr), received)
}

fn target(endpoint: String) -> Target {
    Target {
        service_name: "ha".to_string(),
        endpoint,
        protocol: "http".to_string(),
        format_template: None,
    }
}

#[tokio::test]
async fn test_send_posts_json_payload() {
    let (endpoint, received) = spawn_receiver(StatusCode::OK).await;
    let channel = HttpChannel::new(HttpChannelConfig::default());

    let payload = serde_json::to_vec(&DispatchResult::new("msg-9")).unwrap();
    channel.send(&target(endpoint), &payload).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["message_id"], "msg-9");
}

#[tokio::test]
async fn test_send_rejected_status_is_error() {
    let (endpoint, _received) = spawn_receiver(StatusCode::SERVICE_UNAVAILABLE).await;
    let channel = HttpChannel::new(HttpChannelConfig::default());

    let err = channel
        .send(&target(endpoint), b"{}")
        .await
        .unwrap_err();
    match err {
        ChannelError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "receiver says no");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let channel = Arc::new(HttpChannel::new(HttpChannelConfig::default()));
    let shutdown = CancellationToken::new();

    let server = {
        let channel = channel.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            channel
                .serve(listener, Arc::new(RecordingHandler::default()), shutdown)
                .await
        })
    };

    let response = reqwest::Client::new()
        .post(format!("http://{}/dispatch", addr))
        .header("content-type", "application/json")
        .body(r#"{"text":"hello"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["transcript"], "hello");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_close_stops_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = Arc::new(HttpChannel::new(HttpChannelConfig::default()));

    let server = {
        let channel = channel.clone();
        tokio::spawn(async move {
            channel
                .serve(
                    listener,
                    Arc::new(RecordingHandler::default()),
                    CancellationToken::new(),
                )
                .await
        })
    };

    channel.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after close")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_placeholder_channels() {
    let mqtt = MqttChannel::new(MqttChannelConfig::default());
    let grpc = GrpcChannel::new(GrpcChannelConfig::default());
    let robot = Target {
        service_name: "robot".to_string(),
        endpoint: "robots/arm".to_string(),
        protocol: "mqtt".to_string(),
        format_template: None,
    };

    for channel in [&mqtt as &dyn DeliveryChannel, &grpc as &dyn DeliveryChannel] {
        let err = channel.send(&robot, b"{}").await.unwrap_err();
        assert!(matches!(err, ChannelError::Unsupported(ref name) if name == channel.name()));
        channel.close().await.unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        channel
            .listen(Arc::new(RecordingHandler::default()), shutdown)
            .await
            .unwrap();
    }
}
