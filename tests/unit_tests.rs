//! Unit tests for individual components

use axum::http::StatusCode;
use docbits::{
    config::Config,
    encoding::{
        encode_bytes, encode_image, encode_text, narrow_code_points, normalize_image, normalize_text,
        tensor_to_bytes, BitString, EncodingOptions, NarrowingPolicy,
    },
    error::AppError,
    middleware::RateLimiter,
    models::ProcessedFile,
    services::{artifact_name_for, manifest_name_for, ArtifactStore, FsArtifactStore, MemoryArtifactStore},
};
use image::{Rgb, RgbImage};
use std::env;

#[test]
fn test_config_from_env() {
    env::set_var("MAX_FILE_SIZE_MB", "5");
    env::set_var("MAX_CONCURRENT_REQUESTS", "50");
    env::set_var("SERVER_PORT", "9090");
    env::set_var("OUTPUT_DIR", "artifacts");
    env::set_var("CODE_POINT_POLICY", "reject");
    env::set_var("TEXT_LENGTH", "not-a-number");

    let config = Config::from_env().unwrap();
    assert_eq!(config.max_file_size_mb, 5);
    assert_eq!(config.max_concurrent_requests, 50);
    assert_eq!(config.server_port, 9090);
    assert_eq!(config.output_dir, std::path::PathBuf::from("artifacts"));
    assert_eq!(config.code_point_policy, NarrowingPolicy::Reject);
    // Unparseable values fall back to the default
    assert_eq!(config.text_length, 500);
    assert_eq!(config.image_size, 128);

    // A mistyped policy is a startup error, never a silent fallback to mask
    env::set_var("CODE_POINT_POLICY", "rejct");
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("CODE_POINT_POLICY"));

    for var in [
        "MAX_FILE_SIZE_MB",
        "MAX_CONCURRENT_REQUESTS",
        "SERVER_PORT",
        "OUTPUT_DIR",
        "CODE_POINT_POLICY",
        "TEXT_LENGTH",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn test_config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_file_size_bytes(), 10 * 1024 * 1024);

    let options = config.encoding_options();
    assert_eq!(options, EncodingOptions::default());

    let bad = Config {
        text_length: 0,
        ..Config::default()
    };
    assert!(bad.validate().is_err());

    let bad = Config {
        worker_threads: 0,
        ..Config::default()
    };
    assert!(bad.validate().is_err());
}

#[test]
fn test_narrowing_policy_parsing() {
    assert_eq!("mask".parse::<NarrowingPolicy>().unwrap(), NarrowingPolicy::Mask);
    assert_eq!(" Reject ".parse::<NarrowingPolicy>().unwrap(), NarrowingPolicy::Reject);
    assert!("clamp".parse::<NarrowingPolicy>().is_err());
    assert_eq!(NarrowingPolicy::default(), NarrowingPolicy::Mask);
    assert_eq!(NarrowingPolicy::Reject.to_string(), "reject");
}

#[test]
fn test_error_codes_and_status() {
    assert_eq!(AppError::extraction("x").error_code(), "EXTRACTION_ERROR");
    assert_eq!(AppError::extraction("x").status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(AppError::Encoding { code_point: 0x263A, position: 3 }.error_code(), "ENCODING_ERROR");
    assert_eq!(AppError::not_found("a").status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::storage("disk full").error_code(), "STORAGE_ERROR");
    assert_eq!(AppError::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(AppError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(AppError::InvalidApiKey.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::FileTooLarge { size: 20, limit: 10 }.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_encoding_error_message_names_code_point() {
    let err = AppError::Encoding { code_point: 0x263A, position: 3 };
    assert_eq!(err.to_string(), "Code point U+263A at position 3 does not fit in one byte");
}

#[test]
fn test_error_conversions() {
    let app_error: AppError = anyhow::anyhow!("Test error").into();
    match app_error {
        AppError::Internal { message } => assert!(message.contains("Test error")),
        _ => panic!("Expected Internal error"),
    }

    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let app_error: AppError = io_error.into();
    match app_error {
        AppError::Storage { message } => assert!(message.contains("IO error")),
        _ => panic!("Expected Storage error"),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
    let app_error: AppError = json_error.into();
    assert!(matches!(app_error, AppError::ValidationError { .. }));

    let pdf_error = match lopdf::Document::load_mem(b"not a pdf") {
        Err(e) => e,
        Ok(_) => panic!("Expected lopdf to reject garbage"),
    };
    let app_error: AppError = pdf_error.into();
    assert!(matches!(app_error, AppError::Extraction { .. }));
}

#[test]
fn test_text_padding_with_spaces() {
    let codes = normalize_text("", 500);
    assert_eq!(codes.len(), 500);
    assert!(codes.iter().all(|&c| c == 32));

    let bits = encode_text(&codes, NarrowingPolicy::Mask).unwrap();
    assert_eq!(bits.len(), 500 * 8);
    assert_eq!(bits.as_str(), "00100000".repeat(500));
}

#[test]
fn test_text_truncation() {
    let long = "A".repeat(600);
    let exact = "A".repeat(500);
    let a = encode_text(&normalize_text(&long, 500), NarrowingPolicy::Mask).unwrap();
    let b = encode_text(&normalize_text(&exact, 500), NarrowingPolicy::Mask).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "01000001".repeat(500));
}

#[test]
fn test_text_counts_characters_not_bytes() {
    let codes = normalize_text("héllo", 3);
    assert_eq!(codes, vec!['h' as u32, 0xE9, 'l' as u32]);
}

#[test]
fn test_short_text_keeps_content_then_pads() {
    let codes = normalize_text("hi", 5);
    assert_eq!(codes, vec![104, 105, 32, 32, 32]);
}

#[test]
fn test_mask_policy_keeps_low_byte() {
    // U+263A WHITE SMILING FACE -> 0x3A
    let bytes = narrow_code_points(&[0x263A, 65, 0x1F600], NarrowingPolicy::Mask).unwrap();
    assert_eq!(bytes, vec![0x3A, 65, 0x00]);
}

#[test]
fn test_reject_policy_names_first_offender() {
    let err = narrow_code_points(&[65, 255, 256, 0x263A], NarrowingPolicy::Reject).unwrap_err();
    match err {
        AppError::Encoding { code_point, position } => {
            assert_eq!(code_point, 256);
            assert_eq!(position, 2);
        }
        other => panic!("Expected Encoding error, got {:?}", other),
    }
    assert_eq!(narrow_code_points(&[0, 255], NarrowingPolicy::Reject).unwrap(), vec![0, 255]);
}

#[test]
fn test_encode_bytes_msb_first() {
    assert_eq!(encode_bytes(&[0x00, 0xFF, 0x80, 0x01, 0x41]).as_str(), "0000000011111111100000000000000101000001");
    assert!(encode_bytes(&[]).is_empty());
}

#[test]
fn test_bitstring_round_trips_to_bytes() {
    let mut bits = BitString::new();
    bits.push_bytes(&[1, 2, 250]);
    bits.push_byte(32);
    assert_eq!(bits.byte_len(), 4);
    assert_eq!(bits.len() % 8, 0);
    assert_eq!(bits.to_bytes(), vec![1, 2, 250, 32]);
}

#[test]
fn test_solid_black_image_encodes_to_zero_bytes() {
    let black = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
    let tensor = normalize_image(&black, (128, 128));
    assert_eq!(tensor.shape(), (128, 128, 3));

    let bits = encode_image(&tensor);
    assert_eq!(bits.len(), 128 * 128 * 3 * 8);
    assert!(bits.as_str().bytes().all(|b| b == b'0'));
}

#[test]
fn test_solid_white_image_encodes_to_full_bytes() {
    let white = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
    let tensor = normalize_image(&white, (128, 128));
    assert!(tensor.values().iter().all(|&v| v == 1.0));

    let bits = encode_image(&tensor);
    assert_eq!(bits.len(), 128 * 128 * 3 * 8);
    assert!(bits.as_str().bytes().all(|b| b == b'1'));
}

#[test]
fn test_image_values_in_unit_range_for_any_aspect_ratio() {
    let img = RgbImage::from_fn(300, 7, |x, y| Rgb([(x % 256) as u8, (y * 30) as u8, 128]));
    let tensor = normalize_image(&img, (128, 128));
    assert_eq!(tensor.shape(), (128, 128, 3));
    assert_eq!(tensor.values().len(), 128 * 128 * 3);
    assert!(tensor.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn test_same_size_image_bytes_are_preserved() {
    let img = RgbImage::from_fn(4, 3, |x, y| Rgb([(x * 60) as u8, (y * 100) as u8, (x * y * 17) as u8]));
    let tensor = normalize_image(&img, (4, 3));
    assert_eq!(tensor.shape(), (3, 4, 3));
    assert_eq!(tensor_to_bytes(&tensor), img.as_raw().clone());
    // Row-major (row, column, channel)
    assert_eq!(tensor.get(2, 1, 1), Some(200.0 / 255.0));
    assert_eq!(tensor.get(3, 0, 0), None);
}

#[test]
fn test_expected_bits_formula() {
    let options = EncodingOptions::default();
    assert_eq!(options.image_segment_bytes(), 49152);
    assert_eq!(options.text_segment_bytes(), 500);
    assert_eq!(options.expected_bits(1, 1), 397216);
    assert_eq!(options.expected_bits(0, 0), 0);
}

#[test]
fn test_artifact_names_strip_extension_and_directories() {
    assert_eq!(artifact_name_for("report.pdf").unwrap(), "report_encoded.txt");
    assert_eq!(artifact_name_for("uploads/2024/report.pdf").unwrap(), "report_encoded.txt");
    assert_eq!(artifact_name_for(r"C:\docs\report.PDF").unwrap(), "report_encoded.txt");
    assert_eq!(artifact_name_for("archive.v2.pdf").unwrap(), "archive.v2_encoded.txt");
    assert_eq!(artifact_name_for("noext").unwrap(), "noext_encoded.txt");
    assert_eq!(manifest_name_for("report.pdf").unwrap(), "report_manifest.json");
    assert!(artifact_name_for("").is_err());
    assert!(artifact_name_for("../").is_err());
    assert!(artifact_name_for("..").is_err());
}

#[test]
fn test_memory_store_save_load_overwrite() {
    let store = MemoryArtifactStore::new();
    let name = store.save("report.pdf", &encode_bytes(&[1])).unwrap();
    assert_eq!(name, "report_encoded.txt");
    assert_eq!(store.load(&name).unwrap().as_ref(), b"00000001");

    store.save("other/report.pdf", &encode_bytes(&[2])).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.load(&name).unwrap().as_ref(), b"00000010");
}

#[test]
fn test_memory_store_not_found() {
    let store = MemoryArtifactStore::new();
    assert!(matches!(store.load("missing_encoded.txt"), Err(AppError::NotFound { .. })));
    assert!(matches!(store.load("../etc/passwd"), Err(AppError::NotFound { .. })));
    assert!(store.is_available());
}

#[test]
fn test_fs_store_writes_plain_text_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path().join("output")).unwrap();
    assert!(store.is_available());

    let name = store.save("report.pdf", &encode_bytes(&[0x41, 0x42])).unwrap();
    let on_disk = std::fs::read_to_string(store.root().join(&name)).unwrap();
    assert_eq!(on_disk, "0100000101000010");

    store.save("report.pdf", &encode_bytes(&[0xFF])).unwrap();
    assert_eq!(store.load(&name).unwrap().as_ref(), b"11111111");

    // Only the artifact remains; temporary files were renamed away
    let entries: Vec<_> = std::fs::read_dir(store.root()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_fs_store_not_found_and_traversal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
    let store = FsArtifactStore::new(dir.path().join("output")).unwrap();

    assert!(matches!(store.load("never_saved_encoded.txt"), Err(AppError::NotFound { .. })));
    assert!(matches!(store.load("../secret.txt"), Err(AppError::NotFound { .. })));
    assert!(matches!(store.load(""), Err(AppError::NotFound { .. })));
    assert!(store.save_named("../escape.txt", b"0").is_err());
}

#[test]
fn test_processed_file_pdf_detection() {
    assert!(ProcessedFile::new("a.PDF", vec![1]).is_pdf());
    assert!(ProcessedFile::new("upload.bin", b"%PDF-1.5".to_vec()).is_pdf());
    assert!(ProcessedFile::new("upload.bin", vec![1]).with_mime_type("application/pdf").is_pdf());
    assert!(!ProcessedFile::new("notes.txt", b"hello".to_vec()).with_mime_type("text/plain").is_pdf());
}

#[test]
fn test_rate_limiter_counts_and_releases_permits() {
    let limiter = RateLimiter::new(1);
    let permit = limiter.try_acquire().unwrap();
    assert!(matches!(limiter.try_acquire(), Err(AppError::RateLimitExceeded)));
    drop(permit);
    assert!(limiter.try_acquire().is_ok());
    assert_eq!(limiter.metrics(), (3, 1, 1));
}

#[test]
fn test_store_remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let fs_store = FsArtifactStore::new(dir.path()).unwrap();
    let memory = MemoryArtifactStore::new();
    let stores: [&dyn ArtifactStore; 2] = [&fs_store, &memory];

    for store in stores {
        store.save_named("doc_encoded.txt", b"0101").unwrap();
        store.remove("doc_encoded.txt").unwrap();
        assert!(matches!(store.load("doc_encoded.txt"), Err(AppError::NotFound { .. })));
        store.remove("doc_encoded.txt").unwrap();
    }
}
