//! Synthesize sessions over in-memory duplex pipes.

use serde_json::json;
use switchyard_voice::piper::run_session;
use switchyard_voice::wyoming::{read_event, write_event, Event};
use switchyard_voice::{VoiceError, WavInfo};
use tokio::io::{duplex, BufReader};

#[tokio::test]
async fn test_session_over_duplex() {
    let (client, server) = duplex(64 * 1024);

    let piper = tokio::spawn(async move {
        let mut server = BufReader::new(server);
        let request = read_event(&mut server).await.unwrap();
        let start = Event::new("audio-start").with_data(
            json!({"rate": 24000, "width": 2, "channels": 2})
                .as_object()
                .cloned()
                .unwrap(),
        );
        write_event(&mut server, &start).await.unwrap();
        for byte in [3u8, 4, 5] {
            let chunk = Event::new("audio-chunk").with_payload(vec![byte; 1000]);
            write_event(&mut server, &chunk).await.unwrap();
        }
        write_event(&mut server, &Event::new("audio-stop")).await.unwrap();
        request
    });

    let mut client = BufReader::new(client);
    let audio = run_session(&mut client, "Guten Tag", "de_DE-thorsten-medium")
        .await
        .unwrap();

    let request = piper.await.unwrap();
    assert_eq!(request.data_str("text"), Some("Guten Tag"));
    assert_eq!(request.data["voice"]["name"], "de_DE-thorsten-medium");

    assert_eq!(audio.sample_rate, 24000);
    assert_eq!(audio.channels, 2);
    let info = WavInfo::parse(&audio.audio).unwrap();
    assert_eq!(info.data_len, 3000);
    assert_eq!(info.block_align, 4);
    assert_eq!(info.byte_rate, 96000);
    assert_eq!(audio.audio[44], 3);
    assert_eq!(audio.audio[44 + 2999], 5);
}

#[tokio::test]
async fn test_session_reports_server_error() {
    let (client, server) = duplex(4096);

    tokio::spawn(async move {
        let mut server = BufReader::new(server);
        read_event(&mut server).await.unwrap();
        let error = Event::new("error").with_data(
            json!({"text": "voice not found"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        write_event(&mut server, &error).await.unwrap();
    });

    let mut client = BufReader::new(client);
    let err = run_session(&mut client, "hello", "xx_XX-missing")
        .await
        .unwrap_err();
    match err {
        VoiceError::Protocol(message) => assert_eq!(message, "piper error: voice not found"),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_session_fails_when_peer_hangs_up() {
    let (client, server) = duplex(4096);

    tokio::spawn(async move {
        let mut server = BufReader::new(server);
        read_event(&mut server).await.unwrap();
        let start = Event::new("audio-start");
        write_event(&mut server, &start).await.unwrap();
        // Dropping the pipe ends the stream before audio-stop.
    });

    let mut client = BufReader::new(client);
    let err = run_session(&mut client, "hello", "en_US-lessac-medium")
        .await
        .unwrap_err();
    assert!(matches!(err, VoiceError::Protocol(_)), "{:?}", err);
}
