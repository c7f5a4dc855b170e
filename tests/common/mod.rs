//! Shared fixtures for integration tests: an in-process stand-in for the
//! Blender add-on socket server.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sceneloop::host::HostConfig;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Tiny PNG header; enough to look like an image payload
pub const FAKE_PNG: &str = "iVBORw0KGgoAAAANSUhEUg";

/// Fake host that answers `execute` commands over TCP
pub struct FakeBlender {
    pub config: HostConfig,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeBlender {
    /// Start listening; `fail_user_code` makes every non-query program fail
    pub async fn start(fail_user_code: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = received.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = log.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    loop {
                        let mut line = String::new();
                        match reader.read_line(&mut line).await {
                            Ok(0) | Err(_) => break,
                            Ok(_) => {}
                        }
                        let request: Value = serde_json::from_str(line.trim()).unwrap_or(Value::Null);
                        let code = request["code"].as_str().unwrap_or_default().to_string();
                        let response = respond(&code, fail_user_code);
                        log.lock().unwrap().push(code);
                        let mut out = response.to_string();
                        out.push('\n');
                        if reader.get_mut().write_all(out.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let config = HostConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs: 5,
        };
        Self { config, received }
    }

    /// Every program received so far, in order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Programs that were neither queries nor camera moves
    pub fn user_programs(&self) -> Vec<String> {
        self.received().into_iter().filter(|code| !is_query(code)).collect()
    }
}

fn is_query(code: &str) -> bool {
    code.contains("def scene_bounds")
        || code.contains("def get_scene_info")
        || code.contains("screenshot_area")
        || code.contains("cam.rotation_euler = (")
}

fn success(stdout: Value) -> Value {
    json!({"status": "success", "output": stdout.to_string(), "errors": []})
}

fn respond(code: &str, fail_user_code: bool) -> Value {
    if code.contains("def scene_bounds") {
        success(json!({
            "status": "success",
            "objects": [{"name": "Cube", "min": [-1.0, -1.0, 0.0], "max": [1.0, 1.0, 2.0]}],
            "camera": {"name": "Camera", "fov": 0.785}
        }))
    } else if code.contains("def get_scene_info") {
        success(json!({
            "status": "success",
            "scene_info": {"objects": [{"name": "Cube", "type": "MESH"}], "lights": [], "cameras": [], "materials": []}
        }))
    } else if code.contains("screenshot_area") {
        success(json!({"status": "success", "image_data": FAKE_PNG, "format": "png", "width": 8, "height": 6}))
    } else if code.contains("cam.rotation_euler = (") {
        success(json!({"status": "success", "camera": "Camera"}))
    } else if fail_user_code {
        json!({"status": "error", "output": "", "errors": ["Traceback: NameError: name 'bpyy' is not defined"]})
    } else {
        json!({"status": "success", "output": "created Cube\n", "errors": []})
    }
}
