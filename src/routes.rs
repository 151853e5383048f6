use std::{
    fs,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::{response::HttpResponse, router::Router, thread_pool};

pub fn register_defaults(router: &mut Router) {
    router.register("/", get_index);
    router.register("/time", get_time);
    router.register("/health", get_health);
    router.register("/stats", get_stats);
}

pub fn get_index(_request_line: &str) -> Result<HttpResponse> {
    let now = Local::now().format("%d-%m-%Y %H:%M:%S");
    let body = format!(
        "<h1>Hello World! Welcome to the http server</h1>\
         <p>Current time: {now}</p>\
         <p>Try these routes:</p>\
         <ul>\
         <li><a href='/time'>/time</a> - Get current time in JSON</li>\
         <li><a href='/health'>/health</a> - Server health check</li>\
         <li><a href='/stats'>/stats</a> - Server statistics</li>\
         </ul>"
    );

    Ok(HttpResponse::html(&body))
}

#[derive(Serialize)]
struct TimePayload {
    time: String,
}

pub fn get_time(_request_line: &str) -> Result<HttpResponse> {
    let payload = TimePayload {
        time: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
    };

    HttpResponse::json(&payload)
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    uptime: String,
}

pub fn get_health(_request_line: &str) -> Result<HttpResponse> {
    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_millis();

    let payload = HealthPayload {
        status: "healthy",
        uptime: epoch_millis.to_string(),
    };

    HttpResponse::json(&payload)
}

#[derive(Serialize)]
struct StatsPayload {
    #[serde(rename = "activeThreads")]
    active_threads: usize,
    #[serde(rename = "freeMemory")]
    free_memory: u64,
}

pub fn get_stats(_request_line: &str) -> Result<HttpResponse> {
    let payload = StatsPayload {
        active_threads: thread_pool::active_jobs(),
        free_memory: free_memory_bytes().unwrap_or(0),
    };

    HttpResponse::json(&payload)
}

// Best effort, Linux only. Reports 0 where /proc is unavailable.
fn free_memory_bytes() -> Option<u64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    let kilobytes: u64 = meminfo
        .lines()
        .find(|line| line.starts_with("MemFree:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()?;

    Some(kilobytes * 1024)
}
