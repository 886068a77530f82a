use diskmirror_core::{DiskClient, DiskError, ResourceType};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_disk_info_includes_oauth_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_space": 1024,
            "used_space": 256,
            "trash_size": 0
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let info = client.get_disk_info().await.unwrap();

    assert_eq!(info.total_space, 1024);
    assert_eq!(info.used_space, 256);
}

#[tokio::test]
async fn find_resource_returns_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Backups/Hello World.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "disk:/Backups/Hello World.txt",
            "name": "Hello World.txt",
            "type": "file",
            "size": 12,
            "modified": "2024-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let resource = client
        .find_resource("disk:/Backups/Hello World.txt")
        .await
        .unwrap()
        .expect("resource should exist");

    assert_eq!(resource.resource_type, ResourceType::File);
    assert_eq!(resource.size, Some(12));
}

#[tokio::test]
async fn find_resource_maps_not_found_to_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "DiskNotFoundError"
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    assert!(client.find_resource("disk:/Missing").await.unwrap().is_none());
}

#[tokio::test]
async fn find_resource_surfaces_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.find_resource("disk:/Docs").await.unwrap_err();

    assert!(matches!(err, DiskError::Api { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn list_directory_all_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 1,
                "offset": 0,
                "total": 2,
                "items": [
                    { "path": "disk:/A.txt", "name": "A.txt", "type": "file" }
                ]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 1,
                "offset": 1,
                "total": 2,
                "items": [
                    { "path": "disk:/Backups", "name": "Backups", "type": "dir" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let items = client.list_directory_all("disk:/", 1).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "A.txt");
    assert_eq!(items[1].resource_type, ResourceType::Dir);
}

#[tokio::test]
async fn list_directory_without_embedded_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "disk:/A.txt",
            "name": "A.txt",
            "type": "file"
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .list_directory("disk:/A.txt", Some(10), Some(0))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::MissingEmbedded));
}

#[tokio::test]
async fn create_folder_uses_put() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Archive/proj"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "href": "https://cloud-api.yandex.net/v1/disk/resources?path=disk%3A%2FArchive%2Fproj",
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = client.create_folder("disk:/Archive/proj").await.unwrap();

    assert_eq!(link.method, "GET");
}

#[tokio::test]
async fn get_upload_link_sends_overwrite_flag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .and(query_param("path", "disk:/Backups/notes.txt"))
        .and(query_param("overwrite", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": "https://upload.example/notes.txt",
            "method": "PUT",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = client
        .get_upload_link("disk:/Backups/notes.txt", false)
        .await
        .unwrap();

    assert_eq!(link.href.as_str(), "https://upload.example/notes.txt");
    assert_eq!(link.method, "PUT");
}
