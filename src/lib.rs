//! Web front end that hands media URLs to yt-dlp and ffmpeg and streams the
//! resulting file back to the browser.

pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod tools;
pub mod web;
