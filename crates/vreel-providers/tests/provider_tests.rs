//! Provider client tests against a mocked HTTP server.

use base64::Engine as _;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vreel_providers::{AsrClient, MusicClient, PlannerClient, StockClient, TtsClient, TtsProvider};

fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

fn plan_json() -> String {
    json!({
        "video_title": "Why Octopuses Dream",
        "segments": [
            {
                "kind": "hook",
                "narration_text": "This animal dreams in color.",
                "visual_search_query": "octopus close up dark water",
                "keywords_for_highlighting": ["dreams"],
                "duration_estimate_seconds": 2.5
            },
            {
                "kind": "section",
                "narration_text": "Scientists recorded their skin changing while asleep.",
                "visual_search_query": "octopus changing color",
                "keywords_for_highlighting": ["skin"]
            },
            {
                "kind": "call_to_action",
                "narration_text": "Follow for more deep sea facts!"
            }
        ],
        "background_music_suggestion": "calm ambient"
    })
    .to_string()
}

/// Test the creator/critic planning flow end to end.
#[tokio::test]
async fn test_planner_generates_and_refines_plan() {
    let server = MockServer::start().await;

    // Models often wrap JSON in markdown fences; the client must cope.
    let content = format!("```json\n{}\n```", plan_json());
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(
            json!({"response_format": {"type": "json_object"}}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": content}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = PlannerClient::new("test-key", http_client(), "gpt-4o-mini", "gpt-4o")
        .with_base_url(server.uri());

    let drafts = client
        .generate_plan("octopus dreams", "an educational science channel")
        .await
        .expect("planning should succeed");

    assert!(drafts.was_refined);
    assert_eq!(drafts.refined.video_title, "Why Octopuses Dream");
    assert_eq!(drafts.refined.segments.len(), 3);
    assert_eq!(drafts.draft.video_title, drafts.refined.video_title);
}

/// Test that a plan failing validation is not accepted.
#[tokio::test]
async fn test_planner_rejects_invalid_plan() {
    let server = MockServer::start().await;

    // Valid JSON, invalid plan: no segments.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"video_title\": \"T\", \"segments\": []}"}}]
        })))
        .mount(&server)
        .await;

    let client = PlannerClient::new("test-key", http_client(), "gpt-4o-mini", "gpt-4o")
        .with_base_url(server.uri());

    let result = client.generate_plan("topic", "persona").await;
    assert!(result.is_err());
}

/// Test OpenAI speech synthesis writes the returned bytes as mp3.
#[tokio::test]
async fn test_openai_tts_writes_mp3() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(
            json!({"model": "tts-1-hd", "voice": "shimmer", "input": "Hello world"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fakeaudio".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = TtsClient::new(TtsProvider::OpenAi, "test-key", "shimmer", http_client())
        .with_base_url(server.uri());

    let written = client
        .synthesize("Hello world", &dir.path().join("scene_0"))
        .await
        .expect("synthesis should succeed");

    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("mp3"));
    let bytes = tokio::fs::read(&written).await.unwrap();
    assert_eq!(bytes, b"ID3fakeaudio");
}

/// Test Speechify synthesis decodes the base64 payload into a wav file.
#[tokio::test]
async fn test_speechify_tts_decodes_base64_wav() {
    let server = MockServer::start().await;

    let encoded = base64::engine::general_purpose::STANDARD.encode(b"RIFFfakewav");
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(
            json!({"voice_id": "Matthew", "audio_format": "wav"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audio_data": encoded})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = TtsClient::new(TtsProvider::Speechify, "test-key", "Matthew", http_client())
        .with_base_url(server.uri());

    let written = client
        .synthesize("Hello world", &dir.path().join("scene_1"))
        .await
        .expect("synthesis should succeed");

    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("wav"));
    let bytes = tokio::fs::read(&written).await.unwrap();
    assert_eq!(bytes, b"RIFFfakewav");
}

/// Test word-level transcription parsing.
#[tokio::test]
async fn test_asr_returns_word_timings() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": "transcribe",
            "text": "hello world",
            "words": [
                {"word": "hello", "start": 0.0, "end": 0.42},
                {"word": "world", "start": 0.42, "end": 0.9}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("narration.mp3");
    tokio::fs::write(&audio, b"ID3fakeaudio").await.unwrap();

    let client = AsrClient::new("test-key", http_client()).with_base_url(server.uri());
    let words = client.transcribe_words(&audio).await.unwrap();

    assert_eq!(words.len(), 2);
    assert_eq!(words[0].word, "hello");
    assert!((words[1].end - 0.9).abs() < 1e-9);
}

/// Test that a transcription without word granularity yields no timings.
#[tokio::test]
async fn test_asr_tolerates_missing_words_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": "transcribe",
            "text": "hello world"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("narration.mp3");
    tokio::fs::write(&audio, b"ID3fakeaudio").await.unwrap();

    let client = AsrClient::new("test-key", http_client()).with_base_url(server.uri());
    let words = client.transcribe_words(&audio).await.unwrap();
    assert!(words.is_empty());
}

/// Test stock search picks the best mp4 rendition and downloads it.
#[tokio::test]
async fn test_stock_search_downloads_best_mp4() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .and(header("authorization", "stock-key"))
        .and(query_param("query", "ocean waves"))
        .and(query_param("orientation", "portrait"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{
                "id": 42,
                "duration": 15,
                "video_files": [
                    {"file_type": "video/mp4", "height": 720,
                     "link": format!("{}/files/low.mp4", server.uri())},
                    {"file_type": "video/mp4", "height": 1920,
                     "link": format!("{}/files/clip.mp4", server.uri())},
                    {"file_type": "video/webm", "height": 2160,
                     "link": format!("{}/files/clip.webm", server.uri())}
                ]
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fakevideo".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = StockClient::new("stock-key", http_client()).with_base_url(server.uri());

    let clip = client
        .search_and_download("ocean waves", dir.path())
        .await
        .expect("download should succeed");

    assert_eq!(
        clip.file_name().and_then(|n| n.to_str()),
        Some("pexels_42.mp4")
    );
    let bytes = tokio::fs::read(&clip).await.unwrap();
    assert_eq!(bytes, b"fakevideo");
}

/// Test stock search retries a transient server error.
#[tokio::test]
async fn test_stock_search_retries_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{
                "id": 7,
                "video_files": [
                    {"file_type": "video/mp4", "height": 1080,
                     "link": format!("{}/files/clip.mp4", server.uri())}
                ]
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fakevideo".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = StockClient::new("stock-key", http_client()).with_base_url(server.uri());

    let clip = client
        .search_and_download("city timelapse", dir.path())
        .await
        .expect("retry should recover");
    assert!(clip.ends_with("pexels_7.mp4"));
}

/// Test music search filters short tracks and downloads a usable one.
#[tokio::test]
async fn test_music_search_skips_short_tracks() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "calm ambient"))
        .and(query_param("key", "music-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [
                {"id": 8, "duration": 12.0,
                 "downloadURL": format!("{}/music/short.mp3", server.uri())},
                {"id": 7, "duration": 120.0,
                 "downloadURL": format!("{}/music/track.mp3", server.uri())}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/music/track.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20_000]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = MusicClient::new("music-key", http_client()).with_base_url(server.uri());

    let track = client
        .search_and_download("calm ambient", dir.path())
        .await
        .expect("download should succeed");
    assert!(track.ends_with("pixabay_music_7.mp3"));
}

/// Test that a suspiciously small music download is rejected.
#[tokio::test]
async fn test_music_rejects_tiny_download() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [{"id": 3, "duration": 90.0,
                      "downloadURL": format!("{}/music/bad.mp3", server.uri())}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/music/bad.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>err</html>".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = MusicClient::new("music-key", http_client()).with_base_url(server.uri());

    let result = client.search_and_download("lofi", dir.path()).await;
    let err = result.expect_err("tiny file must be rejected");
    assert!(err.to_string().contains("too small"));
}

/// Test the music fallback chain moves past an empty result.
#[tokio::test]
async fn test_music_fallback_chain_recovers() {
    let server = MockServer::start().await;

    // The suggestion has no library matches; the generic query does.
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "xylophone quartet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "background music"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [{"id": 11, "duration": 95.0,
                      "downloadURL": format!("{}/music/ok.mp3", server.uri())}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/music/ok.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20_000]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = MusicClient::new("music-key", http_client()).with_base_url(server.uri());

    let track = client
        .fetch_with_fallbacks(Some("xylophone quartet"), dir.path())
        .await;
    assert!(track.is_some_and(|p| p.ends_with("pixabay_music_11.mp3")));
}

/// Test that music failure is absorbed, never escalated.
#[tokio::test]
async fn test_music_all_queries_failing_yields_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = MusicClient::new("music-key", http_client()).with_base_url(server.uri());

    let track = client.fetch_with_fallbacks(Some("anything"), dir.path()).await;
    assert!(track.is_none());
}
