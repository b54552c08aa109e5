// Integration tests for the session client. A tiny canned-response HTTP
// server on a loopback socket stands in for the website, so every exchange
// (including cookie capture and redirects) is exercised without touching
// the real farm.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::Duration;

use sheepit_cli::job::{FrameSplit, JobOptions, RenderDevices, RenderFrames};
use sheepit_cli::{Error, SheepitClient};

/// Build one raw HTTP/1.1 response. `Connection: close` forces the client
/// onto a fresh connection for every exchange, so the canned responses are
/// consumed in order.
fn response(status: &str, extra_headers: &[&str], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for header in extra_headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    out.push_str("Connection: close\r\n\r\n");
    out.push_str(body);
    out
}

fn ok(body: &str) -> String {
    response("200 OK", &[], body)
}

/// Serve the given responses one connection at a time. Returns the base URL
/// to point the client at and a receiver yielding each raw request.
fn spawn_server(responses: Vec<String>) -> (String, Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = channel();
    thread::spawn(move || {
        for raw in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let request = read_request(&mut stream);
            let _ = tx.send(request);
            let _ = stream.write_all(raw.as_bytes());
        }
    });
    (format!("http://{}", addr), rx)
}

/// Read a full request: headers, then a Content-Length or chunked body.
fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut tmp) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
        }
    }

    let header_end = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .unwrap_or(buf.len());
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();

    if let Some(idx) = headers.find("content-length:") {
        let length: usize = headers[idx + "content-length:".len()..]
            .lines()
            .next()
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        while buf.len() - header_end < length {
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
    } else if headers.contains("transfer-encoding: chunked") {
        while !buf.ends_with(b"0\r\n\r\n") {
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

#[test]
fn login_ok_captures_session_cookies() {
    let (base, requests) = spawn_server(vec![response(
        "200 OK",
        &["Set-Cookie: PHPSESSID=deadbeef; Path=/; HttpOnly"],
        "OK",
    )]);
    let mut client = SheepitClient::new(base).unwrap();

    client.login("user", "good").unwrap();

    let cookies = client.export_session();
    assert_eq!(cookies.get("PHPSESSID").map(String::as_str), Some("deadbeef"));

    let request = requests.recv().unwrap();
    assert!(request.contains("POST /ajax.php"));
    assert!(request.contains("do_login=do_login"));
    assert!(request.contains("account_login=account_login"));
}

#[test]
fn login_rejected_is_login_error() {
    let (base, _requests) = spawn_server(vec![ok("Wrong password")]);
    let mut client = SheepitClient::new(base).unwrap();

    let err = client.login("user", "bad").unwrap_err();
    assert!(matches!(err, Error::Login(_)));
    assert!(client.export_session().is_empty());
}

#[test]
fn cookies_ride_along_on_later_requests() {
    let (base, requests) = spawn_server(vec![
        response("200 OK", &["Set-Cookie: PHPSESSID=deadbeef"], "OK"),
        ok("<dl><dt>Points</dt><dd>1234</dd></dl>"),
    ]);
    let mut client = SheepitClient::new(base).unwrap();

    client.login("user", "good").unwrap();
    let profile = client.get_profile().unwrap();
    assert_eq!(profile.points.as_deref(), Some("1234"));

    let _login = requests.recv().unwrap();
    let profile_request = requests.recv().unwrap().to_lowercase();
    assert!(profile_request.contains("cookie: phpsessid=deadbeef"));
}

#[test]
fn empty_jar_short_circuits_login_probe() {
    // A closed port: any request would fail with a network error, so an
    // Ok(false) proves no request was made.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = SheepitClient::new(format!("http://{}", addr)).unwrap();
    assert!(!client.is_logged_in().unwrap());
}

#[test]
fn login_probe_follows_redirect_to_root() {
    let (base, _requests) = spawn_server(vec![
        response("302 Found", &["Location: /"], ""),
        ok("<html>home</html>"),
    ]);
    let mut client = SheepitClient::new(base).unwrap();
    client.import_session(HashMap::from([("PHPSESSID".into(), "x".into())]));

    assert!(client.is_logged_in().unwrap());
}

#[test]
fn login_probe_without_redirect_means_logged_out() {
    let (base, _requests) = spawn_server(vec![ok("<html>login form</html>")]);
    let mut client = SheepitClient::new(base).unwrap();
    client.import_session(HashMap::from([("PHPSESSID".into(), "x".into())]));

    assert!(!client.is_logged_in().unwrap());
}

#[test]
fn session_round_trips_through_export() {
    let mut cookies = HashMap::new();
    cookies.insert("PHPSESSID".to_string(), "abc".to_string());
    cookies.insert("remember".to_string(), "1".to_string());

    let mut client = SheepitClient::new("https://www.sheepit-renderfarm.com").unwrap();
    client.import_session(cookies.clone());
    assert_eq!(client.export_session(), cookies);
}

#[test]
fn token_scraped_from_get_started_page() {
    let (base, _requests) = spawn_server(vec![ok(
        r#"<form><input type="hidden" name="token" value="abc123"></form>"#,
    )]);
    let mut client = SheepitClient::new(base).unwrap();

    assert_eq!(client.request_upload_token().unwrap(), "abc123");
}

#[test]
fn missing_token_is_upload_limit() {
    let (base, _requests) = spawn_server(vec![ok("<html><p>Too many projects.</p></html>")]);
    let mut client = SheepitClient::new(base).unwrap();

    let err = client.request_upload_token().unwrap_err();
    assert!(matches!(err, Error::UploadLimit(_)));
}

#[test]
fn upload_streams_multipart_with_token() {
    let file = std::env::temp_dir().join("sheepit-cli-upload-test.blend");
    std::fs::write(&file, b"not really a blend file").unwrap();

    let (base, requests) = spawn_server(vec![ok("")]);
    let mut client = SheepitClient::new(base).unwrap();
    client.upload_file("tok42", &file).unwrap();

    let request = requests.recv().unwrap();
    assert!(request.contains("POST /jobs.php"));
    assert!(request.to_lowercase().contains("prefer: respond-async"));
    assert!(request.contains("name=\"addjob_archive\""));
    assert!(request.contains("tok42"));
    assert!(request.contains("PHP_SESSION_UPLOAD_PROGRESS"));

    let _ = std::fs::remove_file(file);
}

#[test]
fn upload_progress_returns_ratio() {
    let (base, _requests) = spawn_server(vec![ok(
        r#"{"bytes_processed": 512, "content_length": 1024}"#,
    )]);
    let mut client = SheepitClient::new(base).unwrap();

    let progress = client.upload_progress("tok").unwrap();
    assert_eq!(progress, Some(0.5));
}

#[test]
fn upload_progress_not_ready_is_none_not_error() {
    let (base, _requests) = spawn_server(vec![ok("")]);
    let mut client = SheepitClient::new(base).unwrap();

    assert_eq!(client.upload_progress("tok").unwrap(), None);
}

#[test]
fn add_job_merges_scraped_defaults_with_options() {
    let step2 = r#"<form>
        <input id="addjob_engine_0" value="CYCLES">
        <input id="addjob_archive_0" value="archive-9f3.zip">
        <input id="addjob_path_0" value="//scene.blend">
        <input id="addjob_framerate_0" value="25">
        <input id="addjob_cycles_samples_0" value="128">
        <input id="addjob_samples_pixel_0" value="64">
        <input id="addjob_image_extension_0" value="png">
    </form>"#;
    let (base, requests) = spawn_server(vec![ok(step2), ok("")]);
    let mut client = SheepitClient::new(base).unwrap();

    let options = JobOptions {
        devices: RenderDevices { cpu: true, cuda: false, opencl: true },
        frames: RenderFrames::Animation { start: 1, end: 250, step: 1 },
        split: FrameSplit::Tiles(2),
        public: true,
        mp4: false,
    };
    client.add_job("tok42", &options).unwrap();

    let step2_request = requests.recv().unwrap();
    assert!(step2_request.contains("GET /jobs.php?mode=add&step=2&token=tok42"));

    let submit = requests.recv().unwrap();
    assert!(submit.contains("POST /ajax.php"));
    assert!(submit.contains("do_addjob=do_addjob"));
    assert!(submit.contains("compute_method=5"));
    assert!(submit.contains("engine=CYCLES"));
    assert!(submit.contains("type=animation"));
    assert!(submit.contains("start_frame=1"));
    assert!(submit.contains("end_frame=250"));
    assert!(submit.contains("split_tiles=2"));
    assert!(submit.contains("public_render=1"));
    assert!(submit.contains("generate_mp4=0"));
    assert!(!submit.contains("split_samples"));
}

#[test]
fn add_job_single_frame_with_layer_split() {
    let step2 = r#"<input id="addjob_engine_0" value="BLENDER_EEVEE">"#;
    let (base, requests) = spawn_server(vec![ok(step2), ok("")]);
    let mut client = SheepitClient::new(base).unwrap();

    let options = JobOptions {
        devices: RenderDevices { cpu: true, cuda: true, opencl: false },
        frames: RenderFrames::SingleFrame(17),
        split: FrameSplit::Layers(32),
        public: false,
        mp4: false,
    };
    client.add_job("tok", &options).unwrap();

    let _step2 = requests.recv().unwrap();
    let submit = requests.recv().unwrap();
    assert!(submit.contains("type=singleframe"));
    assert!(submit.contains("start_frame=17"));
    // Eevee drops CPU from the mask: cpu+cuda -> cuda only.
    assert!(submit.contains("compute_method=2"));
    assert!(submit.contains("split_tiles=-1"));
    assert!(submit.contains("split_samples=32"));
    assert!(submit.contains("public_render=0"));
}

#[test]
fn connection_failure_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = SheepitClient::new(format!("http://{}", addr)).unwrap();
    let err = client.get_profile().unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[test]
fn timeout_is_network_error() {
    // Accept the connection, read the request, and never answer.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = read_request(&mut stream);
            thread::sleep(Duration::from_secs(10));
        }
    });

    let mut client = SheepitClient::new(format!("http://{}", addr)).unwrap();
    let err = client.get_profile().unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[test]
fn logout_clears_cookies_even_when_request_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = SheepitClient::new(format!("http://{}", addr)).unwrap();
    client.import_session(HashMap::from([("PHPSESSID".into(), "x".into())]));

    let err = client.logout().unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert!(client.export_session().is_empty());
}

#[test]
fn logout_clears_cookies_on_success_too() {
    let (base, _requests) = spawn_server(vec![ok("bye")]);
    let mut client = SheepitClient::new(base).unwrap();
    client.import_session(HashMap::from([("PHPSESSID".into(), "x".into())]));

    client.logout().unwrap();
    assert!(client.export_session().is_empty());
}
