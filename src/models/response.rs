use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub data: SubmissionData,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionData {
    pub artifact_name: String,
    pub manifest_name: String,
    pub download_url: String,
    pub bit_length: usize,
    pub images: usize,
    pub texts: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub services: ServiceStatus,
    pub rate_limiting: RateLimitStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub pdf_extractor: bool,
    pub artifact_store: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub available_permits: usize,
    pub rejection_rate: f64,
}

impl SubmissionResponse {
    pub fn new(data: SubmissionData, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data,
            processing_time_ms,
        }
    }
}

impl RateLimitStatus {
    pub fn new(total_requests: u64, rejected_requests: u64, available_permits: usize) -> Self {
        let rejection_rate = if total_requests > 0 {
            (rejected_requests as f64 / total_requests as f64 * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total_requests,
            rejected_requests,
            available_permits,
            rejection_rate,
        }
    }
}
