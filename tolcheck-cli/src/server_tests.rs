#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fmt::Write as _;
    use std::path::Path;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::server::{AppState, ServerConfig, router, sanitize_file_name};

    const BOUNDARY: &str = "tolcheck-test-boundary";

    const CH1: &str = "Time,Voltage\n0.1,-2.501\n0.2,-2.499\n0.3,-2.500\n";
    const CH2: &str = "Time,Voltage\n0.1,-2.40\n0.2,-2.41\n";
    const VT: &str = "66.0   VT2816_1_Ch1::CurVoltage    10.001\n\
                      66.1   VT2816_1_Ch2::CurVoltage    9.999\n";

    fn app(workdir: &Path) -> Router {
        let config = ServerConfig {
            workdir: workdir.to_path_buf(),
            ..ServerConfig::default()
        };
        router(AppState::new(config), 0)
    }

    /// Multipart body from `(field, file name, content)` parts.
    fn multipart(parts: &[(&str, &str, &str)]) -> Body {
        let mut body = String::new();
        for (field, file, content) in parts {
            write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{file}\"\r\nContent-Type: application/octet-stream\r\n\r\n\
                 {content}\r\n"
            )
            .unwrap();
        }
        write!(body, "--{BOUNDARY}--\r\n").unwrap();
        Body::from(body)
    }

    fn multipart_request(uri: &str, parts: &[(&str, &str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(parts))
            .unwrap()
    }

    fn json_request(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn upload_bench(app: &Router) -> Value {
        let request = multipart_request(
            "/api/upload",
            &[
                ("files", "PSU_m2V5_R10V_CH1.csv", CH1),
                ("files", "bench/PSU_m2V5_R10V_CH2.csv", CH2),
                ("files", "VT2816A_10V_R10V_1000x.txt", VT),
                ("files", "notes.pdf", "ignored"),
            ],
        );
        let (status, body) = send_json(app, request).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a.csv").as_deref(), Some("a.csv"));
        assert_eq!(sanitize_file_name("dir/a.csv").as_deref(), Some("a.csv"));
        assert_eq!(sanitize_file_name("C:\\x\\a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_file_name("../"), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());

        let (status, body) = send_json(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, page) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(page).unwrap().contains("/api/upload"));
    }

    #[tokio::test]
    async fn test_upload_stores_batch_and_proposes_configs() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());

        let body = upload_bench(&app).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["files_count"], 3);
        assert_eq!(body["csv_count"], 2);
        assert_eq!(body["txt_count"], 1);
        assert_eq!(body["unit"], "V");
        assert_eq!(body["measurement_types"], json!({}));

        let configs = body["test_configs"].as_array().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0]["io_type"], "Output");
        assert_eq!(configs[0]["range_setting"], "10V");
        assert_eq!(configs[1]["io_type"], "Input");

        let batch = body["batch_id"].as_str().unwrap();
        let stored = tmp.path().join("uploads").join(batch);
        assert!(stored.join("PSU_m2V5_R10V_CH2.csv").is_file());
        assert!(!stored.join("notes.pdf").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_missing_or_invalid_files() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());

        let request = multipart_request("/api/upload", &[("files", "notes.pdf", "x")]);
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No valid CSV or TXT files found");

        let request = multipart_request("/api/upload", &[("other", "a.csv", "x")]);
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No files provided");

        let leftovers = std::fs::read_dir(tmp.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_process_download_view_reset() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());
        let uploaded = upload_bench(&app).await;
        let batch = uploaded["batch_id"].as_str().unwrap().to_owned();

        let request = json_request(
            "/api/process",
            &json!({
                "batch_id": batch,
                "measurement_types": {},
                "configs": uploaded["test_configs"],
            }),
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["excel_file"], format!("{batch}.xlsx"));
        assert_eq!(body["html_file"], format!("{batch}_report.html"));
        assert_eq!(body["total_entries"], 4);
        assert_eq!(body["all_passed"], false);

        let response = app
            .clone()
            .oneshot(get(&format!("/download/{batch}/{batch}.xlsx")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("attachment"));

        let response = app
            .clone()
            .oneshot(get(&format!("/view/{batch}/{batch}_report.html")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert!(!response.headers().contains_key(header::CONTENT_DISPOSITION));

        let (status, body) = send_json(&app, json_request(&format!("/api/reset/{batch}"), &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(!tmp.path().join("uploads").join(&batch).exists());
        assert!(!tmp.path().join("outputs").join(&batch).exists());
    }

    #[tokio::test]
    async fn test_process_rejects_bad_batches() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());

        let request = json_request("/api/process", &json!({ "batch_id": "../etc" }));
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid batch id"));

        let unknown = uuid::Uuid::new_v4();
        let request = json_request("/api/process", &json!({ "batch_id": unknown }));
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No files uploaded");

        let request = json_request("/api/process", &json!("not an object"));
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());
        let batch = uuid::Uuid::new_v4();

        let (status, body) = send_json(&app, get(&format!("/download/{batch}/missing.xlsx"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "File not found");

        let (status, _) = send_json(&app, get("/download/not-a-uuid/missing.xlsx")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let tmp = TempDir::new().unwrap();
        let app = app(tmp.path());
        let batch = uuid::Uuid::new_v4();
        let config = json!({
            "unit": "V",
            "configurations": [{
                "test_value": -2.5,
                "range_setting": "10V",
                "io_type": "Output",
                "range_input": "10V",
                "reference": "-2,5",
                "tolerance": 0.02
            }]
        });

        let (status, body) =
            send_json(&app, json_request(&format!("/api/save-config/{batch}"), &config)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "test_config.json");
        let saved = tmp
            .path()
            .join("outputs")
            .join(batch.to_string())
            .join("test_config.json");
        assert!(saved.is_file());

        let (status, body) = send_json(
            &app,
            json_request(&format!("/api/save-config/{batch}"), &json!([1, 2])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let content = std::fs::read_to_string(&saved).unwrap();
        let request = multipart_request("/api/load-config", &[("file", "test_config.json", &content)]);
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["unit"], "V");
        assert_eq!(body["config"]["configurations"][0]["reference"], "-2,5");

        let request = multipart_request("/api/load-config", &[("other", "x.json", "{}")]);
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");
    }
}
