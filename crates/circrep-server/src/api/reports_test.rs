use std::io::Cursor;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::Router;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::api::{build_app, test_support};

const BOUNDARY: &str = "circrep-test-boundary";

const SHEET: &str = "NodeID,Interface ID,กระทรวง / สังกัด,กรม / สังกัด,จังหวัด,ชื่อหน่วยงาน,Node Name\n\
1201,44,Interior,Provincial Admin,Chiang Mai,District Office,CM-01\n";

const SOAP_RESPONSE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<SOAP-ENV:Envelope xmlns:SOAP-ENV=\"http://schemas.xmlsoap.org/soap/envelope/\">\
<SOAP-ENV:Body><ns1:circuitStatusResponse xmlns:ns1=\"urn:test\">\
<return>[{&quot;Customer_Curcuit_ID&quot;:&quot;CID-1201&quot;,\
&quot;Address&quot;:&quot;District Office&quot;,\
&quot;Timestamp&quot;:{&quot;date&quot;:&quot;2024-02-10 08:00:00.000000&quot;},\
&quot;Bandwidth&quot;:&quot;100Mbps&quot;,\
&quot;In_Averagebps&quot;:1234567,&quot;Out_Averagebps&quot;:10}]</return>\
</ns1:circuitStatusResponse></SOAP-ENV:Body></SOAP-ENV:Envelope>";

fn multipart_request(field: &str, file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/v1/reports")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json parse"))
}

async fn wait_until_finished(app: &Router, job_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/reports/{job_id}");
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let (status, json) = call(app, get(&uri)).await;
            assert_eq!(status, StatusCode::OK);
            if json["data"]["completed"] == true {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("job should finish")
}

#[tokio::test]
async fn upload_runs_job_and_serves_archive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<nodID>1201</nodID>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SOAP_RESPONSE))
        .mount(&server)
        .await;

    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state(
        &format!("{}/soap.php", server.uri()),
        &dirs,
    ));

    let (status, json) = call(&app, multipart_request("excel_file", "circuits.csv", SHEET)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = json["data"]["job_id"].as_str().expect("job id").to_string();

    let done = wait_until_finished(&app, &job_id).await;
    assert_eq!(done["data"]["status"], "completed");
    assert_eq!(done["data"]["total"], 1);
    assert_eq!(done["data"]["processed"], 1);
    assert!(done["data"]["error"].is_null());
    assert_eq!(done["data"]["outcomes"][0]["csv_success"], true);
    assert_eq!(done["data"]["outcomes"][0]["pdf_success"], true);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/reports/{job_id}/download")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(
        disposition.starts_with("attachment; filename=\"CustomerReport(Hourly)_"),
        "{disposition}"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("zip archive");
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(
        &"CSV/Interior/Provincial Admin/Chiang Mai/District Office/CM-01.csv".to_string()
    ));
}

#[tokio::test]
async fn logs_are_drained_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SOAP_RESPONSE))
        .mount(&server)
        .await;

    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state(&server.uri(), &dirs));
    let (_, json) = call(&app, multipart_request("excel_file", "c.csv", SHEET)).await;
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();
    wait_until_finished(&app, &job_id).await;

    let uri = format!("/api/v1/reports/{job_id}/logs");
    let (status, first) = call(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let logs = first["data"]["logs"].as_array().expect("logs array");
    assert!(logs
        .iter()
        .any(|l| l.as_str().unwrap().contains("processing NodeID 1201")));

    let (_, second) = call(&app, get(&uri)).await;
    assert_eq!(second["data"]["logs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn cancel_of_finished_job_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SOAP_RESPONSE))
        .mount(&server)
        .await;

    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state(&server.uri(), &dirs));
    let (_, json) = call(&app, multipart_request("excel_file", "c.csv", SHEET)).await;
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();
    wait_until_finished(&app, &job_id).await;

    let (status, json) = call(&app, post(&format!("/api/v1/reports/{job_id}/cancel"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["job_id"], job_id.as_str());
}

#[tokio::test]
async fn missing_upload_field_is_bad_request() {
    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state("http://127.0.0.1:9", &dirs));

    let (status, json) = call(&app, multipart_request("document", "c.csv", SHEET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("excel_file"));
}

#[tokio::test]
async fn empty_file_name_is_bad_request() {
    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state("http://127.0.0.1:9", &dirs));

    let (status, json) = call(&app, multipart_request("excel_file", "", SHEET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "no file selected");
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state("http://127.0.0.1:9", &dirs));
    let unknown = Uuid::new_v4();

    for uri in [
        format!("/api/v1/reports/{unknown}"),
        format!("/api/v1/reports/{unknown}/logs"),
        format!("/api/v1/reports/{unknown}/download"),
        "/api/v1/reports/not-a-uuid".to_string(),
    ] {
        let (status, json) = call(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json["error"]["code"], "not_found");
        assert!(json["meta"]["request_id"].is_string());
    }

    let (status, _) = call(&app, post(&format!("/api/v1/reports/{unknown}/cancel"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_of_failed_job_is_not_found() {
    let dirs = tempfile::tempdir().unwrap();
    let app = build_app(test_support::state("http://127.0.0.1:9", &dirs));

    let (status, json) = call(
        &app,
        multipart_request("excel_file", "c.csv", "NodeID,Node Name\n1,a\n"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = json["data"]["job_id"].as_str().unwrap().to_string();

    let done = wait_until_finished(&app, &job_id).await;
    assert_eq!(done["data"]["status"], "failed");
    assert!(done["data"]["error"]
        .as_str()
        .unwrap()
        .contains("Interface ID"));

    let (status, _) = call(&app, get(&format!("/api/v1/reports/{job_id}/download"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
