//! End-to-end tests: a collector cycle feeding an HTTPS scrape endpoint.

use async_trait::async_trait;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};
use std::io::Write;
use std::net::SocketAddr;
use tempfile::NamedTempFile;

use s3exporter::metrics::{FILE_LAST_MODIFIED, FILE_LIST};
use s3exporter::{
    load_tls, BasicAuth, Collector, ExporterError, FailureReason, FileMetrics, Lister,
    ListingResult, ScrapeServer,
};

struct CannedLister(ListingResult);

#[async_trait]
impl Lister for CannedLister {
    async fn list(&self) -> ListingResult {
        self.0.clone()
    }
}

fn private_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn self_signed(key: &PKey<Private>) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn pem_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file
}

/// Certificate and key files for localhost, kept alive by the caller.
fn tls_files() -> (NamedTempFile, NamedTempFile) {
    let key = private_key();
    let cert = self_signed(&key);
    (
        pem_file(&cert.to_pem().unwrap()),
        pem_file(&key.private_key_to_pem_pkcs8().unwrap()),
    )
}

async fn start_server(metrics: FileMetrics) -> (SocketAddr, axum_server::Handle) {
    let (cert, key) = tls_files();
    let acceptor = load_tls(Some(cert.path()), Some(key.path())).unwrap();

    let server = ScrapeServer::new(metrics, BasicAuth::new("prometheus", "s3cret"));
    let handle = axum_server::Handle::new();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

    let server_handle = handle.clone();
    tokio::spawn(async move {
        server
            .serve_with_handle(addr, acceptor, server_handle)
            .await
            .unwrap();
    });

    let bound = handle.listening().await.expect("server failed to bind");
    (bound, handle)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
}

#[test]
fn test_tls_loads_matching_pair() {
    let (cert, key) = tls_files();
    assert!(load_tls(Some(cert.path()), Some(key.path())).is_ok());
}

#[test]
fn test_tls_rejects_foreign_key() {
    let key = private_key();
    let cert = pem_file(&self_signed(&key).to_pem().unwrap());
    let other_key = pem_file(&private_key().private_key_to_pem_pkcs8().unwrap());

    match load_tls(Some(cert.path()), Some(other_key.path())) {
        Err(ExporterError::Tls { details }) => assert!(!details.is_empty()),
        Err(other) => panic!("expected TLS error, got {}", other),
        Ok(_) => panic!("expected TLS error"),
    }
}

#[test]
fn test_tls_rejects_garbage_certificate() {
    let (_, key) = tls_files();
    let cert = pem_file(b"not a certificate");

    let err = load_tls(Some(cert.path()), Some(key.path())).err().unwrap();
    assert!(err.to_string().contains("cannot load certificate"));
}

#[tokio::test]
async fn test_collected_listing_is_scraped_over_https() {
    let metrics = FileMetrics::new().unwrap();
    let collector = Collector::new(
        CannedLister(ListingResult::Success(
            "     1024 2023-04-01 12:30:45.123456 reports/april.csv\n\
             oops\n\
             \x20      12 2023-04-02 06:00:00.5 logs/app log.txt\n"
                .to_string(),
        )),
        metrics.clone(),
        std::time::Duration::from_secs(60),
    );

    let report = collector.run_cycle().await;
    assert_eq!(report.applied, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(
        metrics.value(FILE_LAST_MODIFIED, "reports/april.csv"),
        Some(1680352245.0)
    );

    let (addr, handle) = start_server(metrics).await;
    let url = format!("https://{}/metrics", addr);

    let response = client()
        .get(&url)
        .basic_auth("prometheus", Some("s3cret"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("s3_file_list{filename=\"reports/april.csv\"} 1"));
    assert!(body.contains("s3_file_list{filename=\"logs/app log.txt\"} 1"));
    assert!(body.contains("s3_file_last_modified{filename=\"reports/april.csv\"} 1680352245"));

    handle.shutdown();
}

#[tokio::test]
async fn test_https_rejects_bad_credentials_and_unknown_paths() {
    let metrics = FileMetrics::new().unwrap();
    let (addr, handle) = start_server(metrics).await;
    let client = client();

    let anonymous = client
        .get(format!("https://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(
        anonymous.headers()["www-authenticate"],
        "Basic realm=\"S3 Exporter\""
    );

    let wrong = client
        .get(format!("https://{}/metrics", addr))
        .basic_auth("prometheus", Some("guess"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);

    let missing = client
        .get(format!("https://{}/index.html", addr))
        .basic_auth("prometheus", Some("s3cret"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(missing.text().await.unwrap().is_empty());

    handle.shutdown();
}

#[tokio::test]
async fn test_failed_listing_keeps_previous_metrics() {
    let metrics = FileMetrics::new().unwrap();
    metrics.set_file_seen("kept.txt");
    metrics.set_last_modified("kept.txt", 42);
    let before = metrics.samples();

    let collector = Collector::new(
        CannedLister(ListingResult::failure(
            FailureReason::NonZeroExit,
            "Failed to lsl: directory not found",
        )),
        metrics.clone(),
        std::time::Duration::from_secs(60),
    );

    let report = collector.run_cycle().await;

    assert_eq!(
        report.failure.map(|f| f.reason),
        Some(FailureReason::NonZeroExit)
    );
    assert_eq!(metrics.samples(), before);
    assert_eq!(metrics.value(FILE_LIST, "kept.txt"), Some(1.0));
}
